//! Screenfolio — screener-driven portfolio construction.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod collector;
pub mod strategy;
pub mod storage;
pub mod engine;
