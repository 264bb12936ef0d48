use std::fmt;

/// Who may be pinged by a pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MentionPolicy {
    #[default]
    None,
    /// Only the author of the triggering interaction.
    Author,
    Everyone,
}

impl MentionPolicy {
    pub fn from_digit(digit: &str) -> Option<Self> {
        match digit {
            "0" => Some(MentionPolicy::None),
            "1" => Some(MentionPolicy::Author),
            "2" => Some(MentionPolicy::Everyone),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MentionPolicy::None => "none",
            MentionPolicy::Author => "author",
            MentionPolicy::Everyone => "everyone",
        }
    }
}

impl fmt::Display for MentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Duration argument of a `sleep` instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum SleepTime {
    /// Seconds, already bound-checked at parse time.
    Seconds(f64),
    /// An integer memory variable, resolved and bound-checked at run time.
    Variable(String),
}

impl fmt::Display for SleepTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepTime::Seconds(s) => write!(f, "{}", s),
            SleepTime::Variable(name) => f.write_str(name),
        }
    }
}

/// Member attributes readable through `tru(num, attr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserAttribute {
    Id,
    #[default]
    Name,
    Account,
    CreatedAt,
    Roles,
    MutualGuilds,
}

impl UserAttribute {
    pub const ALL: [UserAttribute; 6] = [
        UserAttribute::Id,
        UserAttribute::Name,
        UserAttribute::Account,
        UserAttribute::CreatedAt,
        UserAttribute::Roles,
        UserAttribute::MutualGuilds,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserAttribute::Id => "id",
            UserAttribute::Name => "name",
            UserAttribute::Account => "account",
            UserAttribute::CreatedAt => "created_at",
            UserAttribute::Roles => "roles",
            UserAttribute::MutualGuilds => "mutual_guilds",
        }
    }
}

impl fmt::Display for UserAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single executable instruction parsed from a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Literal text appended to the pending message.
    Build { content: String },
    /// Send the pending message.
    Push { mention: MentionPolicy },
    /// Suspend execution.
    Sleep { time: SleepTime },
    /// Run the nested instructions while the composing indicator is shown.
    Writing { instructions: Vec<Instruction> },
    /// Run one of the branches, picked uniformly at random.
    Choice { branches: Vec<Vec<Instruction>> },
    /// Append a random integer in `lower..=upper`.
    RandomRange { lower: i64, upper: i64 },
    /// Append an attribute of a pseudo-random guild member.
    RandomUser { index: usize, attribute: UserAttribute },
    /// Append the value of a memory variable.
    BasicReplace { key: String },
}

/// Discriminant of [`Instruction`], used in diagnostics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Build,
    Push,
    Sleep,
    Writing,
    Choice,
    RandomRange,
    RandomUser,
    BasicReplace,
}

impl InstructionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionKind::Build => "BUILD",
            InstructionKind::Push => "PUSH",
            InstructionKind::Sleep => "SLEEP",
            InstructionKind::Writing => "WRITING",
            InstructionKind::Choice => "CHOICE",
            InstructionKind::RandomRange => "RANDOM_RANGE",
            InstructionKind::RandomUser => "RANDOM_USER",
            InstructionKind::BasicReplace => "BASIC_REPLACE",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Instruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Build { .. } => InstructionKind::Build,
            Instruction::Push { .. } => InstructionKind::Push,
            Instruction::Sleep { .. } => InstructionKind::Sleep,
            Instruction::Writing { .. } => InstructionKind::Writing,
            Instruction::Choice { .. } => InstructionKind::Choice,
            Instruction::RandomRange { .. } => InstructionKind::RandomRange,
            Instruction::RandomUser { .. } => InstructionKind::RandomUser,
            Instruction::BasicReplace { .. } => InstructionKind::BasicReplace,
        }
    }

    /// Render the instruction's options as `key=value` pairs.
    pub fn options(&self) -> String {
        match self {
            Instruction::Build { content } => format!("content={:?}", content),
            Instruction::Push { mention } => format!("mention={}", mention),
            Instruction::Sleep { time } => format!("time={}", time),
            Instruction::Writing { instructions } => {
                format!("instructions={}", instructions.len())
            }
            Instruction::Choice { branches } => format!("branches={}", branches.len()),
            Instruction::RandomRange { lower, upper } => {
                format!("lower={}, upper={}", lower, upper)
            }
            Instruction::RandomUser { index, attribute } => {
                format!("index={}, attribute={}", index, attribute)
            }
            Instruction::BasicReplace { key } => format!("key={}", key),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.options())
    }
}
