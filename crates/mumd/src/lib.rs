//! mum daemon - channel engine, session registry and HTTP relay server
//!
//! This crate provides the core infrastructure for the mum daemon:
//! - `config` - Defaults, TOML file and environment overrides
//! - `engine` - Channels, sessions and the periodic task table
//! - `relay` - Actor owning the engine, plus its cloneable handle
//! - `server` - axum HTTP endpoints and the `/update` stream
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        mumd daemon                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   HttpServer    │────▶│        RelayActor           │    │
//! │  │     (axum)      │     │   (RelayState owner)        │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │                   │
//! │           │ /recv parks on oneshot      │ NDJSON lines      │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  JSON responses │     │   /update body streams      │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod engine;
pub mod relay;
pub mod server;
