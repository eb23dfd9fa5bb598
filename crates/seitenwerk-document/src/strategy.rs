// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Strategy executor: run alternative implementations of one operation in
// order until one succeeds, keeping every failure for the final report.

use seitenwerk_core::error::{ErrorClass, Result, SeitenwerkError, StrategyFailure};
use tracing::{debug, warn};

type Strategy<'a, T> = Box<dyn FnOnce() -> Result<T> + 'a>;

/// An ordered list of named strategies for one operation.
///
/// ```ignore
/// let bytes = StrategyChain::new("rotate")
///     .strategy("set-rotation-flag", || set_flags(&doc))
///     .strategy("quarter-turns", || turn_pages(&doc))
///     .run()?;
/// ```
pub struct StrategyChain<'a, T> {
    operation: String,
    strategies: Vec<(String, Strategy<'a, T>)>,
}

impl<'a, T> StrategyChain<'a, T> {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            strategies: Vec::new(),
        }
    }

    /// Append a strategy; strategies run in insertion order.
    pub fn strategy(
        mut self,
        name: impl Into<String>,
        attempt: impl FnOnce() -> Result<T> + 'a,
    ) -> Self {
        self.strategies.push((name.into(), Box::new(attempt)));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run strategies in order and return the first success.
    pub fn run(self) -> Result<T> {
        let mut attempts = Attempts::new(self.operation);
        for (name, attempt) in self.strategies {
            match attempt() {
                Ok(value) => return Ok(attempts.succeeded(&name, value)),
                Err(err) => attempts.failed(name, err),
            }
        }
        Err(attempts.exhausted())
    }
}

/// Try the same attempt against each candidate in turn, e.g. every available
/// page renderer. `name_of` labels a candidate for the failure report.
pub fn try_each<C, T>(
    operation: &str,
    candidates: impl IntoIterator<Item = C>,
    name_of: impl Fn(&C) -> String,
    mut attempt: impl FnMut(C) -> Result<T>,
) -> Result<T> {
    let mut attempts = Attempts::new(operation.to_string());
    for candidate in candidates {
        let name = name_of(&candidate);
        match attempt(candidate) {
            Ok(value) => return Ok(attempts.succeeded(&name, value)),
            Err(err) => attempts.failed(name, err),
        }
    }
    Err(attempts.exhausted())
}

/// Failure bookkeeping shared by both entry points.
struct Attempts {
    operation: String,
    failures: Vec<StrategyFailure>,
    first_invalid_input: Option<String>,
}

impl Attempts {
    fn new(operation: String) -> Self {
        Self {
            operation,
            failures: Vec::new(),
            first_invalid_input: None,
        }
    }

    fn succeeded<T>(&self, name: &str, value: T) -> T {
        debug!(
            operation = %self.operation,
            strategy = name,
            failed_before = self.failures.len(),
            "Strategy succeeded"
        );
        value
    }

    fn failed(&mut self, name: String, err: SeitenwerkError) {
        warn!(
            operation = %self.operation,
            strategy = %name,
            error = %err,
            "Strategy failed, trying next"
        );
        if let SeitenwerkError::InvalidInput(message) = &err
            && self.first_invalid_input.is_none()
        {
            self.first_invalid_input = Some(message.clone());
        }
        self.failures.push(StrategyFailure::new(name, &err));
    }

    /// The error to surface once nothing is left to try.
    ///
    /// Client-side causes survive aggregation: all-wrong-password becomes
    /// `InvalidPassword`, all-invalid-input becomes the first `InvalidInput`.
    fn exhausted(self) -> SeitenwerkError {
        if self.failures.is_empty() {
            return SeitenwerkError::invalid(format!(
                "{}: no strategy available",
                self.operation
            ));
        }
        if self.failures.iter().all(|f| f.password_rejected) {
            return SeitenwerkError::InvalidPassword;
        }
        if self.failures.iter().all(|f| f.class == ErrorClass::Client)
            && let Some(message) = self.first_invalid_input
        {
            return SeitenwerkError::InvalidInput(message);
        }
        SeitenwerkError::StrategiesExhausted {
            operation: self.operation,
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn first_success_wins_and_later_strategies_do_not_run() {
        let second_ran = Cell::new(false);
        let value = StrategyChain::new("demo")
            .strategy("primary", || Ok(1))
            .strategy("fallback", || {
                second_ran.set(true);
                Ok(2)
            })
            .run()
            .unwrap();
        assert_eq!(value, 1);
        assert!(!second_ran.get());
    }

    #[test]
    fn fallback_runs_after_failure() {
        let value = StrategyChain::new("demo")
            .strategy("primary", || Err(SeitenwerkError::codec("broken xref")))
            .strategy("fallback", || Ok("ok"))
            .run()
            .unwrap();
        assert_eq!(value, "ok");
    }

    #[test]
    fn exhaustion_reports_every_failure() {
        let err = StrategyChain::<()>::new("compress")
            .strategy("raster", || Err(SeitenwerkError::ImageError("no renderer".into())))
            .strategy("streams", || Err(SeitenwerkError::codec("bad stream")))
            .run()
            .unwrap_err();
        match err {
            SeitenwerkError::StrategiesExhausted { operation, failures } => {
                assert_eq!(operation, "compress");
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].strategy, "raster");
                assert_eq!(failures[1].strategy, "streams");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn all_wrong_passwords_surface_invalid_password() {
        let err = StrategyChain::<()>::new("decrypt")
            .strategy("a", || Err(SeitenwerkError::InvalidPassword))
            .strategy("b", || Err(SeitenwerkError::InvalidPassword))
            .run()
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidPassword));
    }

    #[test]
    fn mixed_password_and_codec_failure_is_aggregated() {
        let err = StrategyChain::<()>::new("decrypt")
            .strategy("a", || Err(SeitenwerkError::InvalidPassword))
            .strategy("b", || Err(SeitenwerkError::codec("truncated")))
            .run()
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::StrategiesExhausted { .. }));
    }

    #[test]
    fn invalid_input_survives_aggregation() {
        let err = StrategyChain::<()>::new("derasterize")
            .strategy("a", || Err(SeitenwerkError::invalid("no valid images")))
            .strategy("b", || Err(SeitenwerkError::invalid("still none")))
            .run()
            .unwrap_err();
        match err {
            SeitenwerkError::InvalidInput(message) => assert_eq!(message, "no valid images"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_chain_is_invalid_input() {
        let err = StrategyChain::<()>::new("nothing").run().unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }

    #[test]
    fn try_each_walks_candidates() {
        let seen = std::cell::RefCell::new(Vec::new());
        let value = try_each(
            "render",
            ["pdfium", "layers"],
            |name| name.to_string(),
            |name| {
                seen.borrow_mut().push(name);
                if name == "pdfium" {
                    Err(SeitenwerkError::codec("library missing"))
                } else {
                    Ok(name.len())
                }
            },
        )
        .unwrap();
        assert_eq!(value, 6);
        assert_eq!(*seen.borrow(), vec!["pdfium", "layers"]);
    }
}
