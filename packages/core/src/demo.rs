//! The demonstration sequence run by `utopia-demo`.
//!
//! Creates three users, a project, and a project transaction, validates the
//! transaction, and extends the project team, reading counts and entities
//! back between writes.
//!
//! # Fixture identifiers
//!
//! The contract assigns ids sequentially (`user0`, `project0`,
//! `transaction0`, …). The script refers to the entities it creates by
//! those literal ids, which only line up with what this run created when
//! the ledger started empty. On a ledger that already holds projects or
//! transactions, `project_id` and `transaction_id` name *older* entities.
//! Both are therefore parameters rather than derived values.

use serde_json::json;

use crate::types::{Expect, Script, Step};

/// Key hash passed as proof of ownership on every write of the demo run.
pub const DEFAULT_KEY_HASH: &str =
    "57db1253b68b6802b59a969f750fa32b60cb5cc8a3cb19b87dac28f541dc4e2a";

const USERS: [(&str, &str); 3] = [
    ("Phillipe", "philippe@example.com"),
    ("Guy", "guy@example.com"),
    ("Satoshi Nakamoto", "sat@example.com"),
];

/// Literal identifiers and values used by [`demo_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParams {
    pub key_hash: String,
    /// The acting user: owner of the project and author of every write.
    pub user_id: String,
    pub project_id: String,
    pub transaction_id: String,
    /// User added to the project as contributor and validator.
    pub new_member_id: String,
    /// Unix timestamp (seconds) attached to timestamped writes.
    pub timestamp: String,
    pub updated_email: String,
}

impl Default for ScriptParams {
    fn default() -> Self {
        Self {
            key_hash: DEFAULT_KEY_HASH.into(),
            user_id: "user0".into(),
            project_id: "project0".into(),
            transaction_id: "transaction0".into(),
            new_member_id: "user2".into(),
            timestamp: "1688516687".into(),
            updated_email: "philippeChange@example.com".into(),
        }
    }
}

/// Build the demonstration script.
pub fn demo_script(params: &ScriptParams) -> Script {
    let p = params;
    let payload = demo_transaction_payload().to_string();
    let mut steps = vec![
        Step::submit("init", "Init"),
        Step::evaluate("init-status", "GetInitStatus")
            .requires(["init"])
            .expect(Expect::Json)
            .describe("function returns contract status"),
        count_step("user-count-0", "GetUserCount", "user count"),
    ];

    for (i, (name, email)) in USERS.iter().enumerate() {
        steps.push(
            Step::submit(format!("create-user-{i}"), "CreateUser")
                .with_args([*name, *email, p.key_hash.as_str()])
                .requires(["init"])
                .describe("creates new user"),
        );
        steps.push(count_step(
            &format!("user-count-{}", i + 1),
            "GetUserCount",
            "user count",
        ));
    }

    steps.extend([
        get_step("get-user-0", "GetUser", &p.user_id, "user attributes").requires(["create-user-0"]),
        Step::submit("update-email", "UpdateEmail")
            .with_args([p.user_id.as_str(), p.key_hash.as_str(), p.updated_email.as_str()])
            .requires(["create-user-0"])
            .describe("changes the email of a user"),
        get_step("get-user-1", "GetUser", &p.user_id, "user attributes").requires(["update-email"]),
        count_step("project-count-0", "GetProjectCount", "projects count"),
        Step::submit("create-project", "CreateProject")
            .with_args([
                "project one",
                "1672531200",
                "1704067200",
                "Example description",
                p.user_id.as_str(),
                "user0,user1,user2",
                p.user_id.as_str(),
                p.key_hash.as_str(),
                p.timestamp.as_str(),
            ])
            .requires(["create-user-0", "create-user-1", "create-user-2"])
            .describe("creates new project"),
        count_step("project-count-1", "GetProjectCount", "projects count"),
        get_step("get-project-0", "GetProject", &p.project_id, "project attributes")
            .requires(["create-project"]),
        count_step("transaction-count-0", "GetTransactionCount", "transactions count"),
        Step::submit("create-transaction", "CreateTransaction")
            .with_args([
                p.project_id.as_str(),
                p.user_id.as_str(),
                p.key_hash.as_str(),
                payload.as_str(),
                p.timestamp.as_str(),
            ])
            .requires(["create-project"])
            .describe("creates new transaction"),
        count_step("transaction-count-1", "GetTransactionCount", "transactions count"),
        get_step("get-transaction-0", "GetTransaction", &p.transaction_id, "transaction attributes")
            .requires(["create-transaction"]),
        get_step("get-project-1", "GetProject", &p.project_id, "project attributes")
            .requires(["create-transaction"]),
        Step::submit("validate-transaction", "ValidateTransaction")
            .with_args([
                p.transaction_id.as_str(),
                p.user_id.as_str(),
                p.key_hash.as_str(),
                p.timestamp.as_str(),
            ])
            .requires(["create-transaction"])
            .describe("validates transaction"),
        get_step("get-transaction-1", "GetTransaction", &p.transaction_id, "transaction attributes")
            .requires(["validate-transaction"]),
        get_step("get-project-2", "GetProject", &p.project_id, "project attributes")
            .requires(["validate-transaction"]),
        Step::submit("add-contributor", "AddContributor")
            .with_args(member_args(p))
            .requires(["create-project", "create-user-2"])
            .describe("adds project contributor"),
        Step::submit("add-validator", "AddValidator")
            .with_args(member_args(p))
            .requires(["create-project", "create-user-2"])
            .describe("adds project validator"),
        get_step("get-project-3", "GetProject", &p.project_id, "project attributes")
            .requires(["add-contributor", "add-validator"]),
    ]);

    Script::new(steps)
}

fn count_step(id: &str, transaction: &str, what: &str) -> Step {
    Step::evaluate(id, transaction)
        .expect(Expect::Json)
        .describe(format!("function returns {what}"))
}

fn get_step(id: &str, transaction: &str, entity: &str, what: &str) -> Step {
    Step::evaluate(id, transaction)
        .with_args([entity])
        .expect(Expect::Json)
        .describe(format!("function returns {what}"))
}

fn member_args(p: &ScriptParams) -> [&str; 4] {
    [
        p.project_id.as_str(),
        p.user_id.as_str(),
        p.key_hash.as_str(),
        p.new_member_id.as_str(),
    ]
}

/// The JSON payload recorded by the demo `CreateTransaction` step.
pub fn demo_transaction_payload() -> serde_json::Value {
    json!({ "time": "1 hour" })
}
