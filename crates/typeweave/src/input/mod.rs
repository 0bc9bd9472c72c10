//! Input oracles.
//!
//! The converter only depends on [`TypeOracle`](crate::oracle::TypeOracle);
//! this module provides the in-memory unit loaded from JSON.

mod unit;

pub use unit::{Unit, UnitBuilder};
