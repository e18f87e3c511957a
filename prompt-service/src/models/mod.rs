//! Domain models for the prompt service.

pub mod record;

pub use record::{ListRecords, Record, Variant};
