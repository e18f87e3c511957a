//! prompt-service: forwards prompts and code snippets to a generative text
//! model and keeps a record of every request and its response.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
