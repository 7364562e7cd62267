//! Joins fragments sharing a correlation id into completed events.

mod bucket;
mod table;

pub use bucket::Bucket;
pub use table::{BucketRef, MessageAccumulator};
