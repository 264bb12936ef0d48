//! Side-effect-free execution used to preview and validate templates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use factscript::{Instruction, MentionPolicy};

use crate::context::{
    ChannelInfo, ComposingGuard, ContextError, ContextSnapshot, GuildInfo, Member, MessageInfo,
    UserInfo,
};
use crate::effects::Effects;
use crate::environment::Scope;
use crate::error::{ExecutionError, RuntimeError};
use crate::executor::Executor;

const PLACEHOLDER_MEMBERS: usize = 3;

/// Records every side effect as an annotation in a trace string.
#[derive(Debug, Default)]
pub struct DebugEffects {
    trace: String,
}

/// Executor whose output is a trace rather than sent messages.
pub type DebugExecutor = Executor<DebugEffects>;

impl DebugEffects {
    pub fn new() -> Self {
        DebugEffects::default()
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }

    pub fn take_trace(&mut self) -> String {
        std::mem::take(&mut self.trace)
    }
}

fn placeholder_user(name: &str, account: &str) -> UserInfo {
    UserInfo {
        id: 0,
        name: name.to_string(),
        account: account.to_string(),
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        roles: 0,
        mutual_guilds: 0,
    }
}

/// A deterministic context that satisfies the memory schema.
pub fn placeholder_snapshot() -> ContextSnapshot {
    ContextSnapshot {
        user: placeholder_user("user", "useraccount"),
        me: placeholder_user("self", "selfaccount"),
        channel: ChannelInfo {
            id: 0,
            name: "channel".to_string(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            jump_url: "channelurl".to_string(),
        },
        guild: Some(GuildInfo {
            id: 0,
            name: "guild".to_string(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            member_count: PLACEHOLDER_MEMBERS as u64,
            roles: 0,
            owner: placeholder_user("owner", "owneraccount"),
        }),
        message: MessageInfo {
            id: 0,
            jump_url: "messageurl".to_string(),
        },
    }
}

#[async_trait]
impl Effects for DebugEffects {
    async fn root_scope(&mut self) -> Result<Scope, ContextError> {
        placeholder_snapshot().into_scope(1, 1)
    }

    async fn members(&mut self) -> Result<Vec<Member>, RuntimeError> {
        Ok((1..=PLACEHOLDER_MEMBERS)
            .map(|n| UserInfo {
                id: n as u64,
                ..placeholder_user(&format!("member{}", n), &format!("member{}account", n))
            })
            .collect())
    }

    async fn send(
        &mut self,
        content: String,
        mention: MentionPolicy,
        fresh: bool,
    ) -> Result<(), RuntimeError> {
        self.trace.push_str(&content);
        self.trace
            .push_str(&format!("{{PUSH;fresh={},mention={}}}", fresh, mention));
        Ok(())
    }

    async fn sleep(&mut self, seconds: f64, carry: &mut String) -> Result<(), RuntimeError> {
        carry.push_str(&format!("{{SLEEP;time={}}}", seconds));
        Ok(())
    }

    async fn begin_writing(&mut self, carry: &mut String) -> Result<ComposingGuard, RuntimeError> {
        carry.push_str("{WRITING;start}");
        Ok(ComposingGuard::noop())
    }

    fn end_writing(&mut self, carry: &mut String) {
        carry.push_str("{WRITING;end}");
    }

    fn begin_choice(&mut self, index: usize, carry: &mut String) {
        carry.push_str(&format!("{{CHOICE[{}];start}}", index));
    }

    fn end_choice(&mut self, index: usize, carry: &mut String) {
        carry.push_str(&format!("{{CHOICE[{}];end}}", index));
    }

    fn leftover_annotations(&mut self, annotations: String) {
        self.trace.push_str(&annotations);
    }
}

impl Executor<DebugEffects> {
    pub fn debug() -> Self {
        Executor::new(DebugEffects::new())
    }

    /// Execute without side effects and return the annotated trace.
    pub async fn preview(&mut self, instructions: &[Instruction]) -> Result<String, ExecutionError> {
        self.effects_mut().take_trace();
        self.run(instructions).await?;
        Ok(self.effects_mut().take_trace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factscript::MemorySchema;

    #[test]
    fn placeholder_context_satisfies_schema() {
        let scope = placeholder_snapshot()
            .into_scope(1, 1)
            .expect("guild present");
        assert_eq!(scope.conform(&MemorySchema::initial()), Ok(()));
    }
}
