//! HTTP request and response bodies.

pub mod generation;

pub use generation::{
    ExplainRequest, GenerateRequest, GenerationResponse, ListRecordsQuery, RecordListResponse,
    RecordResponse,
};
