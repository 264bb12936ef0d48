use std::fmt;

/// Type of a value stored in template memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Integer,
    Timestamp,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => f.write_str("String"),
            ValueType::Integer => f.write_str("Integer"),
            ValueType::Timestamp => f.write_str("Timestamp"),
        }
    }
}

/// The table of variable names a template may reference, with their types.
///
/// The parser accepts a bare identifier only if it is listed here, and the
/// executor refuses to run unless the root scope it builds matches the table
/// exactly. Both sides read the same static data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySchema {
    entries: &'static [(&'static str, ValueType)],
}

const INITIAL_MEMORY: &[(&str, ValueType)] = &[
    // interaction target
    ("user", ValueType::String),
    ("user.id", ValueType::Integer),
    ("user.name", ValueType::String),
    ("user.account", ValueType::String),
    ("user.created_at", ValueType::Timestamp),
    ("user.roles", ValueType::Integer),
    ("user.mutual_guilds", ValueType::Integer),
    // the bot itself
    ("self", ValueType::String),
    ("self.id", ValueType::Integer),
    ("self.name", ValueType::String),
    ("self.account", ValueType::String),
    ("self.created_at", ValueType::Timestamp),
    ("self.roles", ValueType::Integer),
    // location
    ("channel", ValueType::String),
    ("channel.id", ValueType::Integer),
    ("channel.name", ValueType::String),
    ("channel.created_at", ValueType::Timestamp),
    ("channel.jump_url", ValueType::String),
    ("guild", ValueType::String),
    ("guild.id", ValueType::Integer),
    ("guild.name", ValueType::String),
    ("guild.created_at", ValueType::Timestamp),
    ("guild.members", ValueType::Integer),
    ("guild.roles", ValueType::Integer),
    // guild owner
    ("owner", ValueType::String),
    ("owner.id", ValueType::Integer),
    ("owner.name", ValueType::String),
    ("owner.account", ValueType::String),
    ("owner.created_at", ValueType::Timestamp),
    ("owner.roles", ValueType::Integer),
    ("owner.mutual_guilds", ValueType::Integer),
    // triggering message
    ("message", ValueType::Integer),
    ("message.jump_url", ValueType::String),
    // fact store
    ("local_facts", ValueType::Integer),
    ("global_facts", ValueType::Integer),
    ("total_facts", ValueType::Integer),
];

impl MemorySchema {
    /// The schema of the root scope every execution starts from.
    pub const fn initial() -> Self {
        MemorySchema {
            entries: INITIAL_MEMORY,
        }
    }

    pub fn get(&self, key: &str) -> Option<ValueType> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, ty)| *ty)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn entries(&self) -> &'static [(&'static str, ValueType)] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemorySchema {
    fn default() -> Self {
        MemorySchema::initial()
    }
}

/// Whether `text` has the shape of a memory variable name (`guild.name`, `total_facts`).
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !text.ends_with('.')
        && !text.contains("..")
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
