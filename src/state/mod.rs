//! Request state transfer core
//!
//! - [`AsyncRequestState`] - the `{ data, loading, error }` triple of one fetch
//! - [`StateSync`] - runs a request (once, or on every trigger emission with
//!   switch-to-latest semantics) and publishes its state
//! - [`TransferSlot`] - one-shot keyed handoff from the origin pass to the
//!   target pass
//! - [`ObservableState`] - the continuously readable result of a run

mod context;
mod observable;
mod request_state;
mod sync;
mod transfer;

pub use context::ExecutionContext;
pub use observable::{from_future, ObservableState};
pub use request_state::AsyncRequestState;
pub use sync::{StateConfig, StateSync};
pub use transfer::{transfer_key, StateKey, TransferSlot, TRANSFER_KEY_PREFIX};
