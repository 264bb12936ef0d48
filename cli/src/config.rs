use std::path::Path;

use factscript::Limits;
use serde::Deserialize;

/// Limit overrides read from a TOML file. Missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_depth: usize,
    pub min_sleep: f64,
    pub max_sleep: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        LimitsConfig {
            max_depth: limits.max_depth,
            min_sleep: limits.min_sleep,
            max_sleep: limits.max_sleep,
        }
    }
}

impl LimitsConfig {
    /// Read `path`, or fall back to the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let Some(path) = path else {
            return Ok(LimitsConfig::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config '{}': {}", path.display(), e))?;
        let config = Self::from_toml(&text)
            .map_err(|e| format!("invalid config '{}': {}", path.display(), e))?;
        tracing::debug!(?config, "loaded limits");
        Ok(config)
    }

    fn from_toml(text: &str) -> Result<Self, String> {
        let config: LimitsConfig = toml::from_str(text).map_err(|e| e.to_string())?;
        for (key, value) in [("min_sleep", config.min_sleep), ("max_sleep", config.max_sleep)] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", key, value));
            }
        }
        if config.min_sleep > config.max_sleep {
            return Err(format!(
                "min_sleep ({}) is greater than max_sleep ({})",
                config.min_sleep, config.max_sleep
            ));
        }
        Ok(config)
    }

    pub fn into_limits(self) -> Limits {
        Limits {
            max_depth: self.max_depth,
            min_sleep: self.min_sleep,
            max_sleep: self.max_sleep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_keep_defaults() {
        let config = LimitsConfig::from_toml("max_depth = 3").unwrap();
        let limits = config.into_limits();
        assert_eq!(limits.max_depth, 3);
        assert_eq!(limits.min_sleep, Limits::default().min_sleep);
        assert_eq!(limits.max_sleep, Limits::default().max_sleep);
    }

    #[test]
    fn inverted_sleep_bounds_are_rejected() {
        assert!(LimitsConfig::from_toml("min_sleep = 10.0\nmax_sleep = 1.0").is_err());
        assert!(LimitsConfig::from_toml("max_dept = 3").is_err());
    }

    #[test]
    fn non_finite_sleep_bounds_are_rejected() {
        for text in ["min_sleep = nan", "max_sleep = inf", "min_sleep = -inf", "min_sleep = -1.0"] {
            let err = LimitsConfig::from_toml(text).unwrap_err();
            assert!(err.contains("must be a non-negative number"), "{}: {}", text, err);
        }
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.toml");
        std::fs::write(&path, "max_sleep = 60.0\n").unwrap();

        let config = LimitsConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_sleep, 60.0);
        assert_eq!(LimitsConfig::load(None).unwrap(), LimitsConfig::default());
        assert!(LimitsConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
