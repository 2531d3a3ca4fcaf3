pub mod client;
pub mod task;

pub use client::{TaskSource, TodoistClient};
pub use task::{normalize, normalize_all, Due, NormalizedTask, Priority, RawTask, TaskId};
