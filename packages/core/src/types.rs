//! Call descriptors for a scripted ledger run.
//!
//! A [`Script`] is an ordered list of [`Step`]s. Each step names one
//! contract transaction, the literal arguments passed to it, how it is
//! invoked ([`CallKind`]), which earlier steps it depends on, and what the
//! decoded result is expected to look like ([`Expect`]). Arguments are
//! opaque strings; the contract on the ledger is the only thing that
//! interprets them.
//!
//! All types serialise to JSON so scripts can be stored next to a
//! deployment and loaded instead of the built-in demo sequence.

use serde::{Deserialize, Serialize};

/// How a step reaches the ledger.
///
/// Serialises as a snake_case string (e.g. `"submit_async"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Read-only query against one endorsing peer. Never mutates state.
    Evaluate,
    /// Endorse, order and wait for commit before returning the result.
    Submit,
    /// Endorse and order; the result is available before commit, and the
    /// commit status is awaited afterwards.
    SubmitAsync,
}

impl CallKind {
    /// `true` for the kinds that change ledger state.
    pub fn is_write(&self) -> bool {
        !matches!(self, CallKind::Evaluate)
    }

    /// The verb used in the run transcript (`Evaluate` or `Submit`).
    pub fn verb(&self) -> &'static str {
        match self {
            CallKind::Evaluate => "Evaluate",
            CallKind::Submit | CallKind::SubmitAsync => "Submit",
        }
    }
}

/// Formats the kind as its snake_case wire-format string.
impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Evaluate => write!(f, "evaluate"),
            CallKind::Submit => write!(f, "submit"),
            CallKind::SubmitAsync => write!(f, "submit_async"),
        }
    }
}

impl std::str::FromStr for CallKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evaluate" => Ok(CallKind::Evaluate),
            "submit" => Ok(CallKind::Submit),
            "submit_async" => Ok(CallKind::SubmitAsync),
            _ => Err(format!(
                "unknown call kind {:?}; expected one of: evaluate, submit, submit_async",
                s
            )),
        }
    }
}

/// What a step's decoded result must look like for the run to continue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expect {
    /// Any payload, including an empty one.
    #[default]
    Any,
    /// The payload must parse as JSON.
    Json,
    /// The payload must parse as JSON and equal this value.
    Equals(serde_json::Value),
}

/// One call in a [`Script`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Unique identifier within the script, used by `requires`.
    pub id: String,

    pub kind: CallKind,

    /// Contract transaction name, e.g. `"CreateUser"`.
    pub transaction: String,

    /// Literal arguments, passed through unchanged and in order.
    #[serde(default)]
    pub args: Vec<String>,

    /// Ids of earlier steps whose ledger effects this step relies on.
    ///
    /// Program order alone enforces these at run time; declaring them lets
    /// [`validate_script`](crate::validate_script) reject a reordered
    /// script before anything is sent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    #[serde(default)]
    pub expect: Expect,

    /// Free-form note appended to the transcript header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Step {
    /// A read-only step with no arguments.
    pub fn evaluate(id: impl Into<String>, transaction: impl Into<String>) -> Self {
        Self::new(id, CallKind::Evaluate, transaction)
    }

    /// A synchronous write step with no arguments.
    pub fn submit(id: impl Into<String>, transaction: impl Into<String>) -> Self {
        Self::new(id, CallKind::Submit, transaction)
    }

    pub fn new(id: impl Into<String>, kind: CallKind, transaction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            transaction: transaction.into(),
            args: Vec::new(),
            requires: Vec::new(),
            expect: Expect::Any,
            description: None,
        }
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Declare dependencies on earlier steps.
    pub fn requires<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An ordered list of steps, executed strictly in sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by id.
    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_kind_parses_wire_names() {
        assert_eq!("evaluate".parse::<CallKind>(), Ok(CallKind::Evaluate));
        assert_eq!("submit_async".parse::<CallKind>(), Ok(CallKind::SubmitAsync));
        assert!("query".parse::<CallKind>().is_err());
    }

    #[test]
    fn only_evaluate_is_read_only() {
        assert!(!CallKind::Evaluate.is_write());
        assert!(CallKind::Submit.is_write());
        assert!(CallKind::SubmitAsync.is_write());
        assert_eq!(CallKind::SubmitAsync.verb(), "Submit");
    }

    #[test]
    fn step_deserialises_with_defaults() {
        let json = r#"{"id":"count","kind":"evaluate","transaction":"GetUserCount"}"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step, Step::evaluate("count", "GetUserCount"));
        assert_eq!(step.expect, Expect::Any);
    }

    #[test]
    fn expect_equals_serialises_tagged() {
        let step = Step::evaluate("count", "GetUserCount").expect(Expect::Equals(3.into()));
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["expect"]["kind"], "equals");
        assert_eq!(value["expect"]["value"], 3);
        assert!(value.get("requires").is_none());
    }

    #[test]
    fn script_lookup_by_id() {
        let script = Script::new(vec![
            Step::submit("init", "Init"),
            Step::evaluate("status", "GetInitStatus").requires(["init"]),
        ]);
        assert_eq!(script.len(), 2);
        assert_eq!(script.get("status").unwrap().requires, vec!["init"]);
        assert!(script.get("missing").is_none());
    }
}
