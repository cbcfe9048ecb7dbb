//! Shared types used across the order coordination crates.

mod types;

pub use types::{Money, OrderId, ProductId};
