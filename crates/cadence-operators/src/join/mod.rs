//! Temporal joins.

pub mod lt;

pub use lt::LtJoinLightFactory;
