//! Task Pilot server library.
//!
//! Exposes the task store, the reminder scheduler and the HTTP API for use
//! in tests and embedding. The binary in `main.rs` wires them together from
//! a resolved [`config::ServerConfig`].

pub mod api;
pub mod config;
pub mod mailer;
pub mod scheduler;
pub mod store;
