#![cfg_attr(docsrs, feature(doc_cfg))]
//! # callrelay
//!
//! Scripted interaction testing for async Rust.
//!
//! callrelay runs a piece of code under test on its own Tokio task and
//! replaces the things it calls out to with stand-ins. Every call a stand-in
//! receives is relayed to the test, which asserts on it and decides what
//! the caller gets back: values, or a panic. The test then asserts on how
//! the code under test finished.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use callrelay::*;
//!
//! #[tokio::main]
//! async fn main() -> Result {
//!     let mut test = Harness::default();
//!     let get = test.mimic(Dependency::method::<(String,), (String, Option<String>)>("Store", "get"))?;
//!
//!     let fetch = Target::from_fn("fetch", move |(id,): (String,)| {
//!         let get = get.clone();
//!         async move { get.invoke::<(String, Option<String>)>((id,)).await }
//!     });
//!     let handle = test.start(&fetch, (String::from("42"),));
//!
//!     test.expect_call("Store.get")
//!         .with_args((String::from("42"),))
//!         .await?
//!         .inject_return((String::from("hello"), None::<String>))?;
//!
//!     handle.expect_return((String::from("hello"), None::<String>)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Harness`] | Owns the relay, hands out stand-ins, matches calls |
//! | [`Dependency`] | Identity and signature of something the code under test calls |
//! | [`StandIn`] | Controllable substitute for a dependency |
//! | [`Target`] | The code under test |
//! | [`CallHandle`] | Observes how a started target finishes |
//! | [`Call`] | A pending dependency call, answered by the test |
//! | [`Matcher`] | Predicate over arguments, returns, or panic payloads |
//! | [`Value`] / [`Values`] | Type-erased values crossing the relay |
//!
//! ## Ordered and Eventually
//!
//! [`Harness::expect_call`] insists the very next call is the expected one.
//! [`Harness::eventually`] accepts the expected call whenever it shows up,
//! leaving unrelated calls pending for later expectations:
//!
//! ```rust,ignore
//! let write = test.eventually().expect_call("Log.write").await?;
//! let read = test.expect_call("Store.get").await?; // arrived before Log.write
//! ```
//!
//! ## Failures
//!
//! Assertion mismatches and timeouts are returned as [`Error`]. Misuse of the
//! harness, such as calling a stand-in with arguments of the wrong type or
//! answering the same call twice, panics.
//!
//! ## Features
//!
//! - **`serde`** - `Serialize`/`Deserialize` for [`HarnessConfig`] and [`CallableId`]

mod activity;
mod call;
mod call_expectation;
mod call_handle;
mod call_id;
mod callable_id;
mod config;
mod dependency;
mod error;
mod harness;
mod matcher;
mod signature;
mod stand_in;
mod target;
mod type_spec;
mod value;
mod values;

mod internal;

pub use activity::{Activity, CallResponse, Outcome};
pub use call::Call;
pub use call_expectation::{CallExpectation, CallTarget, Eventually, QuietExpectation};
pub use call_handle::{CallHandle, OutcomeExpectation};
pub use call_id::CallId;
pub use callable_id::CallableId;
pub use config::HarnessConfig;
pub use dependency::Dependency;
pub use error::Error;
pub use harness::Harness;
pub use matcher::Matcher;
pub use signature::Signature;
pub use stand_in::StandIn;
pub use target::Target;
pub use type_spec::{TypeList, TypeSpec};
pub use value::{Opaque, Value, ValueType};
pub use values::{FromValues, IntoValues, Values};

/// Convenience alias for `Result<T, callrelay::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
