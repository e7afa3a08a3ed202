//! # huddle-server
//!
//! Axum HTTP + server-sent events gateway for the Huddle poll.
//!
//! - `GET /`: static UI shell
//! - `GET /event`: snapshot stream, current state first, then one frame per change
//! - `POST /api`: apply one action, broadcast the new snapshot
//! - `GET /health`: liveness and connection count
//! - Fan-out over bounded per-connection queues; failing clients are dropped
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod fanout;
pub mod health;
pub mod hub;
pub mod logging;
pub mod server;
pub mod shell;
pub mod shutdown;
