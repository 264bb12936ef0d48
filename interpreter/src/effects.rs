use std::time::Duration;

use async_trait::async_trait;
use factscript::MentionPolicy;

use crate::context::{ChatContext, ComposingGuard, ContextError, FactStore, Member};
use crate::environment::Scope;
use crate::error::RuntimeError;

/// The side-effecting primitives of an execution.
///
/// The executor owns control flow; implementations decide what a send, a
/// sleep or a composing span actually does. [`LiveEffects`] talks to the
/// chat client, [`crate::debug::DebugEffects`] records a trace instead.
///
/// Hooks that receive `carry` may append annotations to the pending text.
/// Annotations travel with the next send but never count as content.
#[async_trait]
pub trait Effects: Send {
    /// Build the root scope for a new top-level execution.
    async fn root_scope(&mut self) -> Result<Scope, ContextError>;

    async fn members(&mut self) -> Result<Vec<Member>, RuntimeError>;

    async fn send(
        &mut self,
        content: String,
        mention: MentionPolicy,
        fresh: bool,
    ) -> Result<(), RuntimeError>;

    async fn sleep(&mut self, seconds: f64, carry: &mut String) -> Result<(), RuntimeError>;

    /// Called before a `writing` body runs; the guard is held for its duration.
    async fn begin_writing(&mut self, carry: &mut String) -> Result<ComposingGuard, RuntimeError>;

    /// Called after a `writing` body ran, before its guard is released.
    fn end_writing(&mut self, _carry: &mut String) {}

    fn begin_choice(&mut self, _index: usize, _carry: &mut String) {}

    fn end_choice(&mut self, _index: usize, _carry: &mut String) {}

    /// Receives annotations still pending when an execution ends with
    /// nothing to send.
    fn leftover_annotations(&mut self, _annotations: String) {}
}

/// Effects backed by a live chat client and fact store.
pub struct LiveEffects<C, F> {
    context: C,
    facts: F,
}

impl<C: ChatContext, F: FactStore> LiveEffects<C, F> {
    pub fn new(context: C, facts: F) -> Self {
        LiveEffects { context, facts }
    }
}

#[async_trait]
impl<C: ChatContext, F: FactStore> Effects for LiveEffects<C, F> {
    async fn root_scope(&mut self) -> Result<Scope, ContextError> {
        let snapshot = self.context.snapshot().await?;
        let guild_id = snapshot
            .guild
            .as_ref()
            .map(|guild| guild.id)
            .ok_or(ContextError::OutsideGuild)?;
        let local_facts = self.facts.fact_count(Some(guild_id)).await?;
        let global_facts = self.facts.fact_count(None).await?;
        snapshot.into_scope(local_facts, global_facts)
    }

    async fn members(&mut self) -> Result<Vec<Member>, RuntimeError> {
        Ok(self.context.members().await?)
    }

    async fn send(
        &mut self,
        content: String,
        mention: MentionPolicy,
        fresh: bool,
    ) -> Result<(), RuntimeError> {
        tracing::debug!(bytes = content.len(), %mention, fresh, "sending message");
        self.context.send(&content, mention, fresh).await?;
        Ok(())
    }

    async fn sleep(&mut self, seconds: f64, _carry: &mut String) -> Result<(), RuntimeError> {
        tracing::debug!(seconds, "sleeping");
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        Ok(())
    }

    async fn begin_writing(&mut self, _carry: &mut String) -> Result<ComposingGuard, RuntimeError> {
        Ok(self.context.composing().await?)
    }
}
