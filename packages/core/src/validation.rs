//! Static checks on a [`Script`] and result checks on a decoded payload.

use std::collections::HashSet;

use thiserror::Error;

use crate::render::DecodedPayload;
use crate::types::{Expect, Script};

/// Errors returned when a [`Script`] is not well formed.
#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("script contains no steps")]
    Empty,

    #[error("step at index {0} has an empty id")]
    EmptyId(usize),

    #[error("duplicate step id {0:?}")]
    DuplicateId(String),

    #[error("step {0:?} has an empty transaction name")]
    EmptyTransaction(String),

    #[error("step {step:?} requires {required:?}, which is not an earlier step")]
    UnresolvedRequirement { step: String, required: String },
}

/// Errors returned when a decoded result does not meet a step's [`Expect`].
#[derive(Debug, Error, PartialEq)]
pub enum ExpectationError {
    #[error("result is not valid JSON: {0}")]
    NotJson(String),

    #[error("expected result {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// Validate a [`Script`] before any call is issued.
///
/// Returns the first problem found, in step order. A `requires` entry must
/// name a step that appears *before* the requiring step; forward and
/// self references are rejected because execution is strictly sequential.
pub fn validate_script(script: &Script) -> Result<(), ScriptError> {
    if script.is_empty() {
        return Err(ScriptError::Empty);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(script.len());
    for (i, step) in script.iter().enumerate() {
        if step.id.trim().is_empty() {
            return Err(ScriptError::EmptyId(i));
        }
        if step.transaction.trim().is_empty() {
            return Err(ScriptError::EmptyTransaction(step.id.clone()));
        }
        for required in &step.requires {
            if !seen.contains(required.as_str()) {
                return Err(ScriptError::UnresolvedRequirement {
                    step: step.id.clone(),
                    required: required.clone(),
                });
            }
        }
        if !seen.insert(step.id.as_str()) {
            return Err(ScriptError::DuplicateId(step.id.clone()));
        }
    }

    Ok(())
}

/// Check a decoded payload against an expectation.
pub fn check_expectation(expect: &Expect, payload: &DecodedPayload) -> Result<(), ExpectationError> {
    match expect {
        Expect::Any => Ok(()),
        Expect::Json => payload.json_value().map(|_| ()),
        Expect::Equals(expected) => {
            let actual = payload.json_value()?;
            if actual == expected {
                Ok(())
            } else {
                Err(ExpectationError::Mismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Step;

    fn two_steps() -> Script {
        Script::new(vec![
            Step::submit("create", "CreateUser").with_args(["a", "a@example.com", "h"]),
            Step::evaluate("read", "GetUser").with_args(["user0"]).requires(["create"]),
        ])
    }

    #[test]
    fn well_formed_script_passes() {
        assert_eq!(validate_script(&two_steps()), Ok(()));
    }

    #[test]
    fn empty_script_rejected() {
        assert_eq!(validate_script(&Script::default()), Err(ScriptError::Empty));
    }

    #[test]
    fn forward_requirement_rejected() {
        let mut script = two_steps();
        script.steps.reverse();
        assert_eq!(
            validate_script(&script),
            Err(ScriptError::UnresolvedRequirement {
                step: "read".into(),
                required: "create".into(),
            })
        );
    }

    #[test]
    fn self_requirement_rejected() {
        let script = Script::new(vec![Step::submit("init", "Init").requires(["init"])]);
        assert!(matches!(
            validate_script(&script),
            Err(ScriptError::UnresolvedRequirement { .. })
        ));
    }

    #[test]
    fn duplicate_id_rejected() {
        let script = Script::new(vec![
            Step::evaluate("count", "GetUserCount"),
            Step::evaluate("count", "GetUserCount"),
        ]);
        assert_eq!(validate_script(&script), Err(ScriptError::DuplicateId("count".into())));
    }

    #[test]
    fn blank_fields_rejected() {
        let script = Script::new(vec![Step::evaluate(" ", "GetUserCount")]);
        assert_eq!(validate_script(&script), Err(ScriptError::EmptyId(0)));

        let script = Script::new(vec![Step::evaluate("count", "")]);
        assert_eq!(
            validate_script(&script),
            Err(ScriptError::EmptyTransaction("count".into()))
        );
    }

    #[test]
    fn expectations() {
        let three = DecodedPayload::decode(b"3");
        let text = DecodedPayload::decode(b"not json");

        assert_eq!(check_expectation(&Expect::Any, &text), Ok(()));
        assert_eq!(check_expectation(&Expect::Json, &three), Ok(()));
        assert!(matches!(
            check_expectation(&Expect::Json, &text),
            Err(ExpectationError::NotJson(_))
        ));
        assert_eq!(check_expectation(&Expect::Equals(3.into()), &three), Ok(()));
        assert_eq!(
            check_expectation(&Expect::Equals(4.into()), &three),
            Err(ExpectationError::Mismatch {
                expected: "4".into(),
                actual: "3".into(),
            })
        );
    }
}
