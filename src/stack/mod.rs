//! Stack core.
//!
//! This module handles:
//! - The bounded LIFO of `i32` values and its resize rules
//! - Serializing every primitive behind a single exclusive lock

mod bounded;
mod shared;

pub use bounded::IntStack;
#[cfg(test)]
pub(crate) use bounded::alloc_fault;
pub use shared::SharedStack;
