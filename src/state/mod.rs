//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SessionStatus`: lifecycle of a crawl session (pending, running, completed, failed, partial)
//! - `TaskStatus`: lifecycle of one source task inside a session
//! - `SessionTotals`: found/new/duplicate/updated/errors counters

mod session_status;
mod task_status;
mod totals;

pub use session_status::SessionStatus;
pub use task_status::TaskStatus;
pub use totals::SessionTotals;
