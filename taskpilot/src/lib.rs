//! Task Pilot client library: session, cached task board and API client.

pub mod commands;
pub mod config;
pub mod net;
pub mod session;
pub mod tasks;
pub mod workspace;
