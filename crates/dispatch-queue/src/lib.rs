//! The in-process priority queue that backs asynchronous dispatch.

pub mod error;
pub mod item;
pub mod queue;

pub use error::{QueueError, Result};
pub use item::QueueItem;
pub use queue::{InMemoryQueue, Queue};
