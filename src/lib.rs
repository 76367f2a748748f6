//! LinkHub - URL shortening core with asynchronous click analytics
//!
//! The hot redirect path resolves a short code through a read-through
//! cache and answers with a 302, while click events flow through a
//! bounded queue into durable storage, fully decoupled from request
//! latency.
//!
//! # Architecture
//! - `keygen`: short code generation and custom alias validation
//! - `cache`: redirect cache (moka in-process or Redis)
//! - `storage`: SeaORM storage backend and data access
//! - `analytics`: click pipeline, classification and aggregation
//! - `services`: business logic (links, redirect, auth, geoip)
//! - `api`: HTTP services and middleware
//! - `config`: configuration management
//! - `system`: logging and process-level utilities

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod keygen;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
