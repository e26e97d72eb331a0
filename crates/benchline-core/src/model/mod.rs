//! Unit and batch records as consumed from the issue tracker.

pub mod batch;
pub mod timestamp;
pub mod unit;

pub use batch::{Batch, BatchMeta};
pub use unit::{Comment, StatusChange, Unit, UnitKind, UnitRef};
