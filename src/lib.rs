//! SENTINEL — Open-Interest Surge Alert Agent
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod market;
pub mod tickers;
pub mod scanner;
pub mod pool;
pub mod engine;
pub mod llm;
pub mod notify;
pub mod orchestrator;
