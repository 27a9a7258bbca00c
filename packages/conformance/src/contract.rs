//! In-memory `utopiamaker` contract.
//!
//! Enough of the contract's behaviour to drive the demo script end to end:
//! sequential ids, key-hash ownership checks, project membership, and
//! not-found errors. World state is a plain value so the ledger can execute
//! against a copy and keep or discard the result.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// A contract-level rejection, returned to the client as a non-OK status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ContractError(pub String);

type Outcome = Result<Vec<u8>, ContractError>;

fn reject<T>(msg: impl Into<String>) -> Result<T, ContractError> {
    Err(ContractError(msg.into()))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    key_hash: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: String,
    pub owner: String,
    pub contributors: Vec<String>,
    pub validators: Vec<String>,
    pub transactions: Vec<String>,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub project: String,
    pub author: String,
    pub payload: Value,
    pub created: String,
    pub validations: Vec<Validation>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Validation {
    pub validator: String,
    pub timestamp: String,
}

/// The contract's world state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtopiaState {
    pub initialized: bool,
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub transactions: Vec<Transaction>,
}

impl UtopiaState {
    /// Execute `function` with `args`, mutating `self` on success.
    ///
    /// On error `self` may be partially modified; callers execute against a
    /// copy.
    pub fn invoke(&mut self, function: &str, args: &[String]) -> Outcome {
        match function {
            "Init" => {
                arity(function, args, 0)?;
                self.initialized = true;
                Ok(Vec::new())
            }
            "GetInitStatus" => {
                arity(function, args, 0)?;
                to_json(&json!({ "initialized": self.initialized }))
            }
            "GetUserCount" => count(function, args, self.users.len()),
            "GetProjectCount" => count(function, args, self.projects.len()),
            "GetTransactionCount" => count(function, args, self.transactions.len()),
            "CreateUser" => self.create_user(args),
            "GetUser" => {
                arity(function, args, 1)?;
                to_json(self.user(&args[0])?)
            }
            "UpdateEmail" => self.update_email(args),
            "CreateProject" => self.create_project(args),
            "GetProject" => {
                arity(function, args, 1)?;
                to_json(self.project(&args[0])?)
            }
            "CreateTransaction" => self.create_transaction(args),
            "GetTransaction" => {
                arity(function, args, 1)?;
                to_json(self.transaction(&args[0])?)
            }
            "ValidateTransaction" => self.validate_transaction(args),
            "AddContributor" => self.add_member(args, Role::Contributor),
            "AddValidator" => self.add_member(args, Role::Validator),
            other => reject(format!("function {other} does not exist")),
        }
    }

    fn ensure_initialized(&self) -> Result<(), ContractError> {
        if self.initialized {
            Ok(())
        } else {
            reject("contract is not initialized")
        }
    }

    fn user(&self, id: &str) -> Result<&User, ContractError> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| ContractError(format!("user {id} does not exist")))
    }

    fn project(&self, id: &str) -> Result<&Project, ContractError> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ContractError(format!("project {id} does not exist")))
    }

    fn transaction(&self, id: &str) -> Result<&Transaction, ContractError> {
        self.transactions
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ContractError(format!("transaction {id} does not exist")))
    }

    fn authenticate(&self, user_id: &str, key_hash: &str) -> Result<(), ContractError> {
        if self.user(user_id)?.key_hash == key_hash {
            Ok(())
        } else {
            reject(format!("key hash does not match user {user_id}"))
        }
    }

    fn create_user(&mut self, args: &[String]) -> Outcome {
        arity("CreateUser", args, 3)?;
        self.ensure_initialized()?;
        let (name, email, key_hash) = (&args[0], &args[1], &args[2]);
        if self.users.iter().any(|u| &u.email == email) {
            return reject(format!("a user with email {email} already exists"));
        }
        let id = format!("user{}", self.users.len());
        self.users.push(User {
            id: id.clone(),
            name: name.clone(),
            email: email.clone(),
            key_hash: key_hash.clone(),
        });
        Ok(id.into_bytes())
    }

    fn update_email(&mut self, args: &[String]) -> Outcome {
        arity("UpdateEmail", args, 3)?;
        let (user_id, key_hash, email) = (&args[0], &args[1], &args[2]);
        self.authenticate(user_id, key_hash)?;
        if let Some(user) = self.users.iter_mut().find(|u| &u.id == user_id) {
            user.email = email.clone();
        }
        Ok(Vec::new())
    }

    fn create_project(&mut self, args: &[String]) -> Outcome {
        arity("CreateProject", args, 9)?;
        self.ensure_initialized()?;
        let owner = &args[4];
        self.authenticate(owner, &args[7])?;

        let contributors = split_ids(&args[5]);
        let validators = split_ids(&args[6]);
        for member in contributors.iter().chain(&validators) {
            self.user(member)?;
        }

        let id = format!("project{}", self.projects.len());
        self.projects.push(Project {
            id: id.clone(),
            title: args[0].clone(),
            start: args[1].clone(),
            end: args[2].clone(),
            description: args[3].clone(),
            owner: owner.clone(),
            contributors,
            validators,
            transactions: Vec::new(),
            created: args[8].clone(),
        });
        Ok(id.into_bytes())
    }

    fn create_transaction(&mut self, args: &[String]) -> Outcome {
        arity("CreateTransaction", args, 5)?;
        let (project_id, user_id, key_hash) = (&args[0], &args[1], &args[2]);
        self.authenticate(user_id, key_hash)?;
        let project = self.project(project_id)?;
        if &project.owner != user_id && !project.contributors.contains(user_id) {
            return reject(format!("user {user_id} is not a contributor of {project_id}"));
        }
        let payload: Value = serde_json::from_str(&args[3])
            .map_err(|e| ContractError(format!("transaction payload is not JSON: {e}")))?;

        let id = format!("transaction{}", self.transactions.len());
        self.transactions.push(Transaction {
            id: id.clone(),
            project: project_id.clone(),
            author: user_id.clone(),
            payload,
            created: args[4].clone(),
            validations: Vec::new(),
        });
        if let Some(project) = self.projects.iter_mut().find(|p| &p.id == project_id) {
            project.transactions.push(id.clone());
        }
        Ok(id.into_bytes())
    }

    fn validate_transaction(&mut self, args: &[String]) -> Outcome {
        arity("ValidateTransaction", args, 4)?;
        let (tx_id, user_id, key_hash) = (&args[0], &args[1], &args[2]);
        self.authenticate(user_id, key_hash)?;
        let project_id = self.transaction(tx_id)?.project.clone();
        if !self.project(&project_id)?.validators.contains(user_id) {
            return reject(format!("user {user_id} is not a validator of {project_id}"));
        }
        if let Some(tx) = self.transactions.iter_mut().find(|t| &t.id == tx_id) {
            if tx.validations.iter().any(|v| &v.validator == user_id) {
                return reject(format!("user {user_id} already validated {tx_id}"));
            }
            tx.validations.push(Validation {
                validator: user_id.clone(),
                timestamp: args[3].clone(),
            });
        }
        Ok(Vec::new())
    }

    fn add_member(&mut self, args: &[String], role: Role) -> Outcome {
        arity(role.function(), args, 4)?;
        let (project_id, user_id, key_hash, member) = (&args[0], &args[1], &args[2], &args[3]);
        self.authenticate(user_id, key_hash)?;
        self.user(member)?;
        if &self.project(project_id)?.owner != user_id {
            return reject(format!("user {user_id} does not own {project_id}"));
        }
        if let Some(project) = self.projects.iter_mut().find(|p| &p.id == project_id) {
            let members = match role {
                Role::Contributor => &mut project.contributors,
                Role::Validator => &mut project.validators,
            };
            if !members.contains(member) {
                members.push(member.clone());
            }
        }
        Ok(Vec::new())
    }
}

#[derive(Clone, Copy)]
enum Role {
    Contributor,
    Validator,
}

impl Role {
    fn function(self) -> &'static str {
        match self {
            Role::Contributor => "AddContributor",
            Role::Validator => "AddValidator",
        }
    }
}

fn arity(function: &str, args: &[String], expected: usize) -> Result<(), ContractError> {
    if args.len() == expected {
        Ok(())
    } else {
        reject(format!(
            "{function} expects {expected} arguments, got {}",
            args.len()
        ))
    }
}

fn count(function: &str, args: &[String], n: usize) -> Outcome {
    arity(function, args, 0)?;
    to_json(&n)
}

fn to_json<T: Serialize>(value: &T) -> Outcome {
    serde_json::to_vec(value).map_err(|e| ContractError(format!("failed to encode result: {e}")))
}

fn split_ids(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn seeded() -> UtopiaState {
        let mut s = UtopiaState::default();
        s.invoke("Init", &[]).unwrap();
        s.invoke("CreateUser", &args(&["Ann", "ann@example.com", "k0"])).unwrap();
        s.invoke("CreateUser", &args(&["Bob", "bob@example.com", "k1"])).unwrap();
        s
    }

    #[test]
    fn users_get_sequential_ids() {
        let mut s = seeded();
        let id = s
            .invoke("CreateUser", &args(&["Cy", "cy@example.com", "k2"]))
            .unwrap();
        assert_eq!(id, b"user2");
        assert_eq!(s.invoke("GetUserCount", &[]).unwrap(), b"3");
    }

    #[test]
    fn create_user_requires_init() {
        let mut s = UtopiaState::default();
        let err = s
            .invoke("CreateUser", &args(&["Ann", "ann@example.com", "k0"]))
            .unwrap_err();
        assert!(err.0.contains("not initialized"));
    }

    #[test]
    fn get_user_hides_key_hash() {
        let mut s = seeded();
        let out = s.invoke("GetUser", &args(&["user0"])).unwrap();
        let v: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v["email"], "ann@example.com");
        assert!(v.get("key_hash").is_none());
    }

    #[test]
    fn missing_user_is_not_found() {
        let mut s = seeded();
        let err = s.invoke("GetUser", &args(&["nonexistent"])).unwrap_err();
        assert_eq!(err.0, "user nonexistent does not exist");

        let boxed: Box<dyn std::error::Error> = err.into();
        assert_eq!(boxed.to_string(), "user nonexistent does not exist");
    }

    #[test]
    fn wrong_key_hash_is_rejected() {
        let mut s = seeded();
        let err = s
            .invoke("UpdateEmail", &args(&["user0", "k1", "x@example.com"]))
            .unwrap_err();
        assert!(err.0.contains("key hash"));
    }

    #[test]
    fn only_validators_validate() {
        let mut s = seeded();
        s.invoke(
            "CreateProject",
            &args(&["p", "0", "1", "d", "user0", "user0,user1", "user0", "k0", "5"]),
        )
        .unwrap();
        s.invoke(
            "CreateTransaction",
            &args(&["project0", "user1", "k1", r#"{"time":"1 hour"}"#, "6"]),
        )
        .unwrap();

        let err = s
            .invoke("ValidateTransaction", &args(&["transaction0", "user1", "k1", "7"]))
            .unwrap_err();
        assert!(err.0.contains("not a validator"));

        s.invoke("ValidateTransaction", &args(&["transaction0", "user0", "k0", "7"]))
            .unwrap();
        let tx: Value =
            serde_json::from_slice(&s.invoke("GetTransaction", &args(&["transaction0"])).unwrap())
                .unwrap();
        assert_eq!(tx["validations"][0]["validator"], "user0");
        assert_eq!(tx["payload"]["time"], "1 hour");
    }

    #[test]
    fn adding_a_member_twice_keeps_one_entry() {
        let mut s = seeded();
        s.invoke(
            "CreateProject",
            &args(&["p", "0", "1", "d", "user0", "user0", "user0", "k0", "5"]),
        )
        .unwrap();
        for _ in 0..2 {
            s.invoke("AddValidator", &args(&["project0", "user0", "k0", "user1"]))
                .unwrap();
        }
        assert_eq!(s.projects[0].validators, vec!["user0", "user1"]);
    }

    #[test]
    fn unknown_function_is_rejected() {
        let mut s = UtopiaState::default();
        assert!(s.invoke("Nope", &[]).is_err());
    }
}
