//! cats-ssr - Server-rendered cat viewer
//!
//! The interesting part of this crate is the request state transfer core in
//! [`state`]: a coordinator that wraps an asynchronous request with
//! loading/data/error tracking and hands a result computed during the
//! server render (origin context) over to the browser hydration (target
//! context) so the request is not repeated.
//!
//! ```text
//! ┌──────────────── origin pass ────────────────┐     ┌──────── target pass ────────┐
//! │ StateSync::run ──► request ──► TransferSlot │ ──► │ TransferSlot ──► state      │
//! │        │                          (set)     │json │   (take, no loading flash)  │
//! │        ▼                                    │     │                             │
//! │  ObservableState { data, loading, error }   │     │  ObservableState            │
//! └─────────────────────────────────────────────┘     └─────────────────────────────┘
//! ```
//!
//! Everything in [`cats`] and [`server`] is application glue that calls into
//! the core.

pub mod cats;
pub mod config;
pub mod error;
#[cfg(feature = "server")]
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, ConfigError};
pub use state::{
    transfer_key, AsyncRequestState, ExecutionContext, ObservableState, StateConfig, StateKey,
    StateSync, TransferSlot,
};
