//! Shared data model, error taxonomy, and ambient plumbing for dispatchkit.
//!
//! This crate is intentionally thin on behavior: selection strategies, the
//! retry/circuit-breaker/rate-limit pipeline, and the HTTP provider shell
//! live in `dispatch-pipeline`, and queueing lives in `dispatch-queue`. What
//! lives here is the vocabulary both depend on.

pub mod account;
pub mod classifier;
pub mod context;
pub mod error;
pub mod http;
pub mod logging;
pub mod message;
pub mod options;

pub use account::{normalize_weight, Account, ProviderConfig, StrategyType};
pub use context::{DispatchContext, Metadata, RouteInfo};
pub use error::{CoreError, Result};
pub use http::{BodyType, HttpRequestSpec, SendResult};
pub use logging::{init_default_logging, init_logging};
pub use message::{ChannelType, GenericMessage, Message, MessageHeader};
pub use options::{AfterHook, BeforeHook, Callback, RetryPolicy, SendOptions, SendOptionsSnapshot};
