//! Core server-side pipeline
//!
//! Holds the adapter that turns a client's conversation into a provider call.

mod adapter;

pub use adapter::{AdapterError, TurnAdapter};
