#![forbid(unsafe_code)]
//! cadence-core: record model, ids, schema, configuration and cancellation.
//!
//! Everything here is pure data or trait surface. Memory accounting lives in
//! `cadence-mem`, cursors and operators in `cadence-operators`.

pub mod budget;
pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod record;
pub mod schema;
pub mod timestamp;
pub mod types;
