//! HTTP handlers for the prompt service.

pub mod generation;
pub mod health;

pub use generation::{
    explain, generate, get_explanation, get_generation, list_explanations, list_generations,
};
pub use health::{health_check, metrics_endpoint, readiness_check, root};
