use std::future::Future;
use std::pin::Pin;

use factscript::{Instruction, InstructionKind, Limits, MemorySchema, MentionPolicy, SleepTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::context::{ChatContext, FactStore, Member};
use crate::effects::{Effects, LiveEffects};
use crate::environment::{Scope, ScopeStack};
use crate::error::{ExecutionError, RuntimeError};

type Pending<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text accumulated since the last push.
///
/// Effects may write annotations into the text (see [`Effects`]); those do
/// not count as content, so a `push` with only annotations still fails.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Carry {
    text: String,
    has_content: bool,
}

impl Carry {
    pub fn new() -> Self {
        Carry::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether instruction output (not just annotations) is pending.
    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn push_content(&mut self, content: &str) {
        self.has_content |= !content.is_empty();
        self.text.push_str(content);
    }

    fn annotations(&mut self) -> &mut String {
        &mut self.text
    }

    fn take(&mut self) -> String {
        self.has_content = false;
        std::mem::take(&mut self.text)
    }
}

/// Interprets compiled instruction lists.
///
/// All per-execution state (RNG, member cache, the fresh-message flag) lives
/// here, so concurrent executions never share anything mutable. Reuse an
/// executor for several runs if convenient; each [`Executor::run`] starts
/// from a clean slate apart from the RNG stream.
pub struct Executor<E> {
    effects: E,
    limits: Limits,
    rng: StdRng,
    /// Shuffled guild members, fetched on first `tru` use.
    members: Option<Vec<Member>>,
    /// Whether the next send opens a new message.
    fresh: bool,
}

/// Executor that talks to a live chat client.
pub type InstructionExecutor<C, F> = Executor<LiveEffects<C, F>>;

impl<C: ChatContext, F: FactStore> Executor<LiveEffects<C, F>> {
    pub fn live(context: C, facts: F) -> Self {
        Executor::new(LiveEffects::new(context, facts))
    }
}

impl<E: Effects> Executor<E> {
    pub fn new(effects: E) -> Self {
        Executor {
            effects,
            limits: Limits::default(),
            rng: StdRng::from_entropy(),
            members: None,
            fresh: true,
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Make random choices reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut E {
        &mut self.effects
    }

    /// Run a top-level instruction list: build and audit the root scope,
    /// execute, and flush whatever text is left.
    ///
    /// The returned leftover is always empty, since the final flush sends it.
    pub async fn run(&mut self, instructions: &[Instruction]) -> Result<String, ExecutionError> {
        self.members = None;
        self.fresh = true;

        let root = self
            .effects
            .root_scope()
            .await
            .map_err(ExecutionError::Setup)?;
        root.conform(&MemorySchema::initial()).inspect_err(|violation| {
            tracing::error!(%violation, "root scope does not match the memory schema")
        })?;

        let mut scopes = ScopeStack::with_root(root);
        self.run_nested(instructions, 0, Carry::new(), true, &mut scopes)
            .await
            .map(Carry::into_text)
            .inspect_err(|e| {
                tracing::debug!(error_type = e.error_type(), error = %e, "execution failed")
            })
    }

    /// Run `instructions` in a fresh innermost scope, starting from `carry`.
    ///
    /// Returns the carry left over; it is empty when `flush_final` is set,
    /// since the leftover has been sent.
    pub fn run_nested<'a>(
        &'a mut self,
        instructions: &'a [Instruction],
        depth: usize,
        carry: Carry,
        flush_final: bool,
        scopes: &'a mut ScopeStack,
    ) -> Pending<'a, Result<Carry, ExecutionError>> {
        Box::pin(async move {
            if depth > self.limits.max_depth {
                return Err(ExecutionError::RecursionLimitExceeded {
                    pending: instructions.iter().map(ToString::to_string).collect(),
                    depth,
                    limit: self.limits.max_depth,
                });
            }

            scopes.push_scope(Scope::new());
            let result = self
                .run_list(instructions, depth, carry, flush_final, scopes)
                .await;
            scopes.pop_scope();
            result
        })
    }

    async fn run_list(
        &mut self,
        instructions: &[Instruction],
        depth: usize,
        mut carry: Carry,
        flush_final: bool,
        scopes: &mut ScopeStack,
    ) -> Result<Carry, ExecutionError> {
        for (index, instruction) in instructions.iter().enumerate() {
            tracing::trace!(index, depth, kind = %instruction.kind(), "executing instruction");
            carry = self
                .execute_instruction(index, instruction, depth, carry, scopes)
                .await?;
        }

        if !flush_final {
            return Ok(carry);
        }
        if !carry.has_content() {
            self.effects.leftover_annotations(carry.take());
            return Ok(carry);
        }

        self.flush(carry.take(), MentionPolicy::None)
            .await
            .map_err(|cause| ExecutionError::Failure {
                index: instructions.len(),
                kind: InstructionKind::Push,
                options: format!("mention={} (final flush)", MentionPolicy::None),
                cause,
            })?;
        Ok(carry)
    }

    async fn execute_instruction(
        &mut self,
        index: usize,
        instruction: &Instruction,
        depth: usize,
        mut carry: Carry,
        scopes: &mut ScopeStack,
    ) -> Result<Carry, ExecutionError> {
        let fail = |cause| ExecutionError::failure(index, instruction, cause);

        match instruction {
            Instruction::Build { content } => carry.push_content(content),
            Instruction::Push { mention } => {
                if !carry.has_content() {
                    return Err(fail(RuntimeError::EmptyPush));
                }
                self.flush(carry.take(), *mention)
                    .await
                    .map_err(fail)?;
            }
            Instruction::Sleep { time } => {
                let seconds = self.sleep_seconds(time, scopes).map_err(fail)?;
                self.effects
                    .sleep(seconds, carry.annotations())
                    .await
                    .map_err(fail)?;
            }
            Instruction::BasicReplace { key } => {
                let value = scopes
                    .get_variable(key)
                    .ok_or_else(|| fail(RuntimeError::UndefinedVariable(key.clone())))?;
                carry.push_content(&value.to_string());
            }
            Instruction::Writing { instructions } => {
                let guard = self
                    .effects
                    .begin_writing(carry.annotations())
                    .await
                    .map_err(fail)?;
                carry = self
                    .run_nested(instructions, depth + 1, carry, false, scopes)
                    .await?;
                self.effects.end_writing(carry.annotations());
                drop(guard);
            }
            Instruction::Choice { branches } => {
                if branches.len() < 2 {
                    return Err(fail(RuntimeError::TooFewBranches(branches.len())));
                }
                let picked = self.rng.gen_range(0..branches.len());
                tracing::trace!(picked, branches = branches.len(), "choice");
                self.effects.begin_choice(picked, carry.annotations());
                carry = self
                    .run_nested(&branches[picked], depth + 1, carry, false, scopes)
                    .await?;
                self.effects.end_choice(picked, carry.annotations());
            }
            Instruction::RandomRange { lower, upper } => {
                let value = self.rng.gen_range(*lower..=*upper);
                carry.push_content(&value.to_string());
            }
            Instruction::RandomUser {
                index: position,
                attribute,
            } => {
                let member = self.random_member(*position).await.map_err(fail)?;
                carry.push_content(&member.attribute(*attribute));
            }
        }

        Ok(carry)
    }

    async fn flush(&mut self, content: String, mention: MentionPolicy) -> Result<(), RuntimeError> {
        self.effects.send(content, mention, self.fresh).await?;
        self.fresh = false;
        Ok(())
    }

    fn sleep_seconds(&self, time: &SleepTime, scopes: &ScopeStack) -> Result<f64, RuntimeError> {
        let seconds = match time {
            SleepTime::Seconds(seconds) => *seconds,
            SleepTime::Variable(name) => {
                let value = scopes
                    .get_variable(name)
                    .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone()))?;
                let seconds = value.as_integer().ok_or_else(|| {
                    RuntimeError::InvalidSleep(format!(
                        "`{}` is a {}, expected Integer",
                        name,
                        value.value_type()
                    ))
                })?;
                seconds as f64
            }
        };

        if !self.limits.sleep_in_bounds(seconds) {
            return Err(RuntimeError::InvalidSleep(format!(
                "{} seconds is outside of [{}, {}]",
                seconds, self.limits.min_sleep, self.limits.max_sleep
            )));
        }
        Ok(seconds)
    }

    /// The member at `index` of this execution's shuffled member list.
    async fn random_member(&mut self, index: usize) -> Result<&Member, RuntimeError> {
        if self.members.is_none() {
            let mut members = self.effects.members().await?;
            members.shuffle(&mut self.rng);
            self.members = Some(members);
        }

        let members = self.members.as_deref().unwrap_or_default();
        if members.is_empty() {
            return Err(RuntimeError::NoMembers);
        }
        Ok(&members[index % members.len()])
    }
}
