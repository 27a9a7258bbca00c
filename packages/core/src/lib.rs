//! Pure-logic call scripts for the utopiamaker ledger client.
//!
//! This crate has **no I/O**: no networking, no filesystem, no async
//! runtime. It describes *what* a client run does against the ledger
//! contract and how results are shown; the `utopia-gateway` crate does the
//! signing and the network round trips, and the `utopia-demo` binary wires
//! the two together.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Call descriptors: [`Step`], [`CallKind`], [`Expect`], [`Script`] |
//! | [`validation`] | Static script checks via [`validate_script`], result checks via [`check_expectation`] |
//! | [`demo`] | The fixed demonstration sequence, parameterised by [`ScriptParams`] |
//! | [`render`] | Payload decoding ([`DecodedPayload`]) and transcript rendering |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use utopia_core::{demo_script, validate_script, ScriptParams};
//!
//! let script = demo_script(&ScriptParams::default());
//! validate_script(&script).expect("demo script is well formed");
//! for step in script.iter() {
//!     println!("{} {}", step.kind, step.transaction);
//! }
//! ```

pub mod demo;
pub mod render;
pub mod types;
pub mod validation;

pub use demo::{demo_script, ScriptParams, DEFAULT_KEY_HASH};
pub use render::DecodedPayload;
pub use types::{CallKind, Expect, Script, Step};
pub use validation::{check_expectation, validate_script, ExpectationError, ScriptError};
