//! Record/replay of Cumulocity REST traffic.
//!
//! A [`controller::Controller`] sits between a client and a Cumulocity
//! tenant. In record mode it forwards requests and stores every
//! request/response pair in the selected [`pact::Pact`]; in apply mode it
//! answers requests from the stored records without contacting the tenant.
//! Pacts are kept as JSON files by a [`adapter::PactAdapter`].
//!
//! The matching side ([`matching`], [`schema`]) compares live traffic with
//! recorded pacts and is used by the `c8y-pact-verify` tool.

// ===== Pact model and storage =====
pub mod adapter;
pub mod pact;

// ===== Record processing and matching =====
pub mod keypath;
pub mod matching;
pub mod preprocessor;
pub mod schema;

// ===== Controller =====
pub mod config;
pub mod controller;
pub mod logging;

mod error;

pub use error::{PactError, Result};
