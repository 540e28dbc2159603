//! Shared definitions for Task Pilot: the task model, due-date rules and
//! the HTTP API envelope.

pub mod api;
pub mod due;
pub mod task;
