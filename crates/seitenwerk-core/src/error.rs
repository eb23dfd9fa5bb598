// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Seitenwerk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all pipeline operations.
#[derive(Debug, Error)]
pub enum SeitenwerkError {
    // -- Caller errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("incorrect password")]
    InvalidPassword,

    // -- Codec / strategy errors --
    #[error("PDF operation failed: {0}")]
    CodecFailure(String),

    #[error("{operation} failed: {}", join_failures(.failures))]
    StrategiesExhausted {
        operation: String,
        failures: Vec<StrategyFailure>,
    },

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("format conversion failed: {0}")]
    Conversion(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SeitenwerkError {
    /// Shorthand for the most common codec mapping.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::CodecFailure(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Which side of the boundary caused this failure.
    pub fn class(&self) -> ErrorClass {
        classify_error(self)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SeitenwerkError>;

/// Whether a failure is the caller's fault or ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Bad parameters or a wrong password. Map to a 4xx-style response.
    Client,
    /// Codec, I/O or internal failure. Map to a 5xx-style response.
    Server,
}

/// One strategy's failure, kept so the aggregated error can list every cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFailure {
    pub strategy: String,
    pub message: String,
    pub class: ErrorClass,
    /// True when the underlying error was [`SeitenwerkError::InvalidPassword`].
    pub password_rejected: bool,
}

impl StrategyFailure {
    pub fn new(strategy: impl Into<String>, err: &SeitenwerkError) -> Self {
        Self {
            strategy: strategy.into(),
            message: err.to_string(),
            class: err.class(),
            password_rejected: matches!(err, SeitenwerkError::InvalidPassword),
        }
    }
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.strategy, self.message)
    }
}

fn join_failures(failures: &[StrategyFailure]) -> String {
    if failures.is_empty() {
        return "no strategies were attempted".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map an error to the caller-facing class.
///
/// `StrategiesExhausted` is a server error unless every recorded failure was a
/// client error.
pub fn classify_error(err: &SeitenwerkError) -> ErrorClass {
    match err {
        SeitenwerkError::InvalidInput(_) | SeitenwerkError::InvalidPassword => ErrorClass::Client,
        SeitenwerkError::StrategiesExhausted { failures, .. }
            if !failures.is_empty() && failures.iter().all(|f| f.class == ErrorClass::Client) =>
        {
            ErrorClass::Client
        }
        _ => ErrorClass::Server,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_and_input_errors_are_client_side() {
        assert_eq!(classify_error(&SeitenwerkError::InvalidPassword), ErrorClass::Client);
        assert_eq!(
            SeitenwerkError::invalid("page order is empty").class(),
            ErrorClass::Client
        );
    }

    #[test]
    fn codec_errors_are_server_side() {
        let err = SeitenwerkError::codec("xref table is damaged");
        assert_eq!(err.class(), ErrorClass::Server);
    }

    #[test]
    fn exhausted_message_lists_every_strategy() {
        let failures = vec![
            StrategyFailure::new("set-rotation-flag", &SeitenwerkError::codec("no page dict")),
            StrategyFailure::new("quarter-turns", &SeitenwerkError::codec("missing /Pages")),
        ];
        let err = SeitenwerkError::StrategiesExhausted {
            operation: "rotate".into(),
            failures,
        };
        let message = err.to_string();
        assert!(message.starts_with("rotate failed: "));
        assert!(message.contains("set-rotation-flag: PDF operation failed: no page dict"));
        assert!(message.contains("quarter-turns: PDF operation failed: missing /Pages"));
        assert_eq!(err.class(), ErrorClass::Server);
    }

    #[test]
    fn exhausted_with_only_client_failures_is_client_side() {
        let err = SeitenwerkError::StrategiesExhausted {
            operation: "decrypt".into(),
            failures: vec![StrategyFailure::new("rebuild", &SeitenwerkError::InvalidPassword)],
        };
        assert_eq!(err.class(), ErrorClass::Client);
    }
}
