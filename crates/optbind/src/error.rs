//! Error taxonomy.
//!
//! - [`ConfigError`]: raised by registration calls; a parse never produces one.
//! - [`UsageError`]: bad user input found while parsing.
//! - [`ResponseFileError`]: an `@file` could not be expanded.
//!
//! [`ParseError`] is what `Registry::parse` returns and carries the last two.

use std::fmt;

use thiserror::Error;

/// Invalid registration. Always a programming mistake in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid option name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("short name '-{short}' maps to both '{first}' and '{second}' in command '{command}'")]
    DuplicateShort {
        command: String,
        short: char,
        first: String,
        second: String,
    },

    #[error("long name '--{long}' maps to both '{first}' and '{second}' in command '{command}'")]
    DuplicateLong {
        command: String,
        long: String,
        first: String,
        second: String,
    },

    #[error("option '{name}' is declared twice in command '{command}'")]
    DuplicateOption { command: String, name: String },

    #[error("'{name}' cannot be inverted: only boolean flags take a --no- spelling")]
    InvertOnNonFlag { name: String },

    #[error("'{name}': {reason}")]
    InvalidCombination { name: String, reason: &'static str },

    #[error("command '{command}' declares more than one variable-size operand ('{first}', '{second}')")]
    MultipleVariableOperands {
        command: String,
        first: String,
        second: String,
    },

    #[error("required operand '{name}' follows {after} operand '{previous}'")]
    OperandOrder {
        name: String,
        previous: String,
        after: &'static str,
    },

    #[error("invalid default '{value}' for '{name}': {reason}")]
    InvalidDefault {
        name: String,
        value: String,
        reason: String,
    },

    #[error("command '{name}' is already defined under '{parent}'")]
    DuplicateCommand { parent: String, name: String },

    #[error("alias conflict: '{alias}' refers to both '{first}' and '{second}'")]
    AliasConflict {
        alias: String,
        first: String,
        second: String,
    },

    #[error("unknown command id {0}")]
    UnknownCommand(usize),
}

/// What went wrong with the user's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageErrorKind {
    UnknownOption,
    MissingValue,
    InvalidValue,
    TooManyOperands,
    MissingRequiredOperand,
    MissingRequiredOption,
}

impl UsageErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownOption => "unknown option",
            Self::MissingValue => "missing value",
            Self::InvalidValue => "invalid value",
            Self::TooManyOperands => "too many operands",
            Self::MissingRequiredOperand => "missing required operand",
            Self::MissingRequiredOption => "missing required option",
        }
    }
}

impl fmt::Display for UsageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected argument vector.
///
/// `token` is the offending literal (or the option spelling / operand name when
/// nothing was typed), `option` names the definition involved, and `position`
/// is the argv index the token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    pub kind: UsageErrorKind,
    pub token: String,
    pub option: Option<String>,
    pub position: Option<usize>,
    pub detail: Option<String>,
}

impl UsageError {
    pub fn new(kind: UsageErrorKind, token: impl Into<String>) -> Self {
        Self {
            kind,
            token: token.into(),
            option: None,
            position: None,
            detail: None,
        }
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.option) {
            (UsageErrorKind::InvalidValue, Some(option)) => {
                write!(f, "invalid value '{}' for {}", self.token, option)?
            }
            _ => write!(f, "{}: {}", self.kind, self.token)?,
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for UsageError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseFileError {
    #[error("cannot read response file '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("response file '{path}' exceeds the nesting limit of {limit}")]
    DepthExceeded { path: String, limit: usize },

    #[error("unterminated quote in response file '{path}'")]
    Unterminated { path: String },
}

impl ResponseFileError {
    pub fn path(&self) -> &str {
        match self {
            Self::Unreadable { path, .. }
            | Self::DepthExceeded { path, .. }
            | Self::Unterminated { path } => path,
        }
    }
}

/// Coarse error class, for callers that map failures to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Usage,
    ResponseFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    ResponseFile(#[from] ResponseFileError),
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) => ErrorKind::Usage,
            Self::ResponseFile(_) => ErrorKind::ResponseFile,
        }
    }

    /// The usage error kind, if this is a usage error.
    pub fn usage_kind(&self) -> Option<UsageErrorKind> {
        match self {
            Self::Usage(e) => Some(e.kind),
            Self::ResponseFile(_) => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_error_display_names_the_token() {
        let err = UsageError::new(UsageErrorKind::UnknownOption, "--bogus").at(2);
        assert_eq!(err.to_string(), "unknown option: --bogus");
        assert_eq!(err.position, Some(2));
    }

    #[test]
    fn invalid_value_display_names_the_option() {
        let err = UsageError::new(UsageErrorKind::InvalidValue, "x7")
            .with_option("-i")
            .with_detail("invalid digit found in string");
        assert_eq!(
            err.to_string(),
            "invalid value 'x7' for -i (invalid digit found in string)"
        );
    }

    #[test]
    fn parse_error_reports_kind() {
        let err: ParseError = ResponseFileError::DepthExceeded {
            path: "a.rsp".to_string(),
            limit: 4,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ResponseFile);
        assert_eq!(err.usage_kind(), None);
    }
}
