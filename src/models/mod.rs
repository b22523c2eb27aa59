//! Data models for the sale tracker.

mod change;
mod product;

pub use change::{ChangeEvent, ChangeMap};
pub use product::{discount_percent, Category, ProductRecord, Snapshot};
