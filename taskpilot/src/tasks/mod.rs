//! Client-side task state.
//!
//! [`TaskBoard`] caches the task list fetched from the server and derives
//! the view the user sees. [`Notice`] is the transient feedback shown after
//! every mutating action.

pub mod board;
pub mod notice;

pub use board::TaskBoard;
pub use notice::{Notice, NoticeLevel};
