//! The chat client and fact storage, as seen by the executor.
//!
//! Both collaborators live outside this crate; the executor talks to them
//! only through [`ChatContext`] and [`FactStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use factscript::{MentionPolicy, UserAttribute};
use thiserror::Error;

use crate::environment::Scope;
use crate::runtime_value::RuntimeValue;

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("cannot execute instructions outside of guild context")]
    OutsideGuild,
    #[error("missing context data: {0}")]
    MissingData(String),
    #[error("failed to send message: {0}")]
    Send(String),
    #[error("{0}")]
    Unavailable(String),
}

/// A user or guild member.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub id: u64,
    /// Display name (nickname where set).
    pub name: String,
    /// Account (user) name.
    pub account: String,
    pub created_at: DateTime<Utc>,
    pub roles: u64,
    pub mutual_guilds: u64,
}

impl UserInfo {
    /// Render one attribute the way `tru(num, attr)` appends it.
    pub fn attribute(&self, attribute: UserAttribute) -> String {
        match attribute {
            UserAttribute::Id => self.id.to_string(),
            UserAttribute::Name => self.name.clone(),
            UserAttribute::Account => self.account.clone(),
            UserAttribute::CreatedAt => RuntimeValue::Timestamp(self.created_at).to_string(),
            UserAttribute::Roles => self.roles.to_string(),
            UserAttribute::MutualGuilds => self.mutual_guilds.to_string(),
        }
    }
}

pub type Member = UserInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub jump_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuildInfo {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub member_count: u64,
    pub roles: u64,
    pub owner: UserInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageInfo {
    pub id: u64,
    pub jump_url: String,
}

/// Everything the root scope is built from, captured once per execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    /// The user who triggered the template.
    pub user: UserInfo,
    /// The bot itself.
    pub me: UserInfo,
    pub channel: ChannelInfo,
    /// `None` outside of a guild (direct messages).
    pub guild: Option<GuildInfo>,
    pub message: MessageInfo,
}

fn integer(key: &str, value: u64) -> Result<RuntimeValue, ContextError> {
    i64::try_from(value)
        .map(RuntimeValue::Integer)
        .map_err(|_| ContextError::MissingData(format!("`{}` value {} out of range", key, value)))
}

impl ContextSnapshot {
    /// Build the root scope. Fails outside of a guild.
    pub fn into_scope(self, local_facts: u64, global_facts: u64) -> Result<Scope, ContextError> {
        let guild = self.guild.ok_or(ContextError::OutsideGuild)?;
        let mut scope = Scope::new();

        let mut user = |prefix: &str, info: &UserInfo, mutual: bool| -> Result<(), ContextError> {
            scope.set_variable(prefix, info.name.as_str());
            scope.set_variable(&format!("{}.name", prefix), info.name.as_str());
            scope.set_variable(&format!("{}.account", prefix), info.account.as_str());
            scope.set_variable(&format!("{}.created_at", prefix), info.created_at);
            let id_key = format!("{}.id", prefix);
            scope.set_variable(&id_key, integer(&id_key, info.id)?);
            let roles_key = format!("{}.roles", prefix);
            scope.set_variable(&roles_key, integer(&roles_key, info.roles)?);
            if mutual {
                let mutual_key = format!("{}.mutual_guilds", prefix);
                scope.set_variable(&mutual_key, integer(&mutual_key, info.mutual_guilds)?);
            }
            Ok(())
        };
        user("user", &self.user, true)?;
        user("self", &self.me, false)?;
        user("owner", &guild.owner, true)?;

        scope.set_variable("channel", self.channel.name.as_str());
        scope.set_variable("channel.name", self.channel.name.as_str());
        scope.set_variable("channel.id", integer("channel.id", self.channel.id)?);
        scope.set_variable("channel.created_at", self.channel.created_at);
        scope.set_variable("channel.jump_url", self.channel.jump_url);

        scope.set_variable("guild", guild.name.as_str());
        scope.set_variable("guild.name", guild.name.as_str());
        scope.set_variable("guild.id", integer("guild.id", guild.id)?);
        scope.set_variable("guild.created_at", guild.created_at);
        scope.set_variable("guild.members", integer("guild.members", guild.member_count)?);
        scope.set_variable("guild.roles", integer("guild.roles", guild.roles)?);

        scope.set_variable("message", integer("message", self.message.id)?);
        scope.set_variable("message.jump_url", self.message.jump_url);

        scope.set_variable("local_facts", integer("local_facts", local_facts)?);
        scope.set_variable("global_facts", integer("global_facts", global_facts)?);
        let total = local_facts.saturating_add(global_facts);
        scope.set_variable("total_facts", integer("total_facts", total)?);

        Ok(scope)
    }
}

/// Releases a composing ("typing") indicator when dropped.
pub struct ComposingGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ComposingGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        ComposingGuard {
            release: Some(Box::new(release)),
        }
    }

    /// A guard with nothing to release.
    pub fn noop() -> Self {
        ComposingGuard { release: None }
    }
}

impl Drop for ComposingGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ComposingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposingGuard")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// The hosting chat client, scoped to the interaction that triggered a template.
#[async_trait]
pub trait ChatContext: Send + Sync {
    async fn snapshot(&self) -> Result<ContextSnapshot, ContextError>;

    /// Members of the current guild.
    async fn members(&self) -> Result<Vec<Member>, ContextError>;

    /// Send `content` to the interaction's channel. `fresh` opens a new
    /// message; otherwise the message continues the conversation (a reply
    /// or follow-up).
    async fn send(
        &self,
        content: &str,
        mention: MentionPolicy,
        fresh: bool,
    ) -> Result<(), ContextError>;

    /// Show the composing indicator until the returned guard is dropped.
    async fn composing(&self) -> Result<ComposingGuard, ContextError>;
}

/// Narrow read access to stored facts.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Number of facts local to `guild_id`, or global facts for `None`.
    async fn fact_count(&self, guild_id: Option<u64>) -> Result<u64, ContextError>;
}
