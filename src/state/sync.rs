//! StateSync - request execution with origin-to-target handoff.
//!
//! ## Flow
//!
//! ```text
//! StateConfig ──► StateSync::run ──► validate (ConfigError)
//!                      │
//!        only_browser && origin ──► constant seed, request never runs
//!                      │
//!                      ▼
//!                   Driver ── trigger emission ──► start(args)
//!                      │                             │
//!                      │        target + key + slot hit ──► success, no loading
//!                      │                             │
//!                      │                  otherwise loading=true, request(args)
//!                      ▼                             │
//!            watch::Sender<AsyncRequestState> ◄── finish (current generation only)
//! ```
//!
//! ## Switch to latest
//!
//! A triggered driver keeps at most one attempt in flight. A new emission
//! drops the previous attempt's future, so its completion can never reach
//! the state or the callbacks. Every attempt also carries a generation id
//! that is checked before anything is written.
//!
//! ## Seed loading flag
//!
//! The seed is `loading: true` only for a target-context run with no
//! trigger and no transfer key. Every other combination seeds
//! `loading: false` and flips to `true` when an attempt actually starts.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info_span, warn, Instrument};

use super::context::ExecutionContext;
use super::observable::ObservableState;
use super::request_state::AsyncRequestState;
use super::transfer::{transfer_key, StateKey, TransferSlot};
use crate::error::ConfigError;

type RequestFn<R, E, A> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<R, E>> + Send + Sync>;
type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

enum Trigger<A> {
    /// No trigger: exactly one attempt at setup
    Once(A),
    /// One attempt per emission
    Stream(BoxStream<'static, A>),
}

/// Configuration for one [`StateSync::run`]
///
/// Two flavours share the same semantics:
/// - [`StateConfig::new`] - fixed request, optional `()` trigger
/// - [`StateConfig::action`] - the trigger's emissions are passed to the request
pub struct StateConfig<R, E, A = ()> {
    request: RequestFn<R, E, A>,
    trigger: Trigger<A>,
    initial_value: Option<R>,
    only_browser: bool,
    transfer_key: Option<String>,
    on_success: Option<Callback<R>>,
    on_error: Option<Callback<E>>,
}

impl<R: 'static, E: 'static> StateConfig<R, E, ()> {
    /// Fixed request, issued once at setup unless a trigger is added
    pub fn new<F, Fut>(request: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let request: RequestFn<R, E, ()> = Arc::new(move |()| request().boxed());
        Self::with_trigger(request, Trigger::Once(()))
    }

    /// Re-issue the request on every emission instead of once at setup
    pub fn trigger<S>(mut self, trigger: S) -> Self
    where
        S: Stream<Item = ()> + Send + 'static,
    {
        self.trigger = Trigger::Stream(trigger.boxed());
        self
    }
}

impl<R, E, A> StateConfig<R, E, A> {
    /// Request built from the arguments carried by each trigger emission
    pub fn action<F, Fut, S>(request: F, trigger: S) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        S: Stream<Item = A> + Send + 'static,
        R: 'static,
        E: 'static,
        A: 'static,
    {
        let request: RequestFn<R, E, A> = Arc::new(move |args| request(args).boxed());
        Self::with_trigger(request, Trigger::Stream(trigger.boxed()))
    }

    fn with_trigger(request: RequestFn<R, E, A>, trigger: Trigger<A>) -> Self {
        Self {
            request,
            trigger,
            initial_value: None,
            only_browser: false,
            transfer_key: None,
            on_success: None,
            on_error: None,
        }
    }

    /// Value shown as `data` before the first attempt settles
    pub fn initial_value(mut self, value: R) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Never execute in the origin context
    pub fn only_browser(mut self, only_browser: bool) -> Self {
        self.only_browser = only_browser;
        self
    }

    /// Hand the origin result to the target context under `"ct-state-" + key`
    pub fn transfer_key(mut self, key: impl Into<String>) -> Self {
        self.transfer_key = Some(key.into());
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&R) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    fn validate(&self) -> Result<Option<StateKey<R>>, ConfigError> {
        match self.transfer_key.as_deref() {
            Some(_) if self.only_browser => Err(ConfigError::TransferKeyWithOnlyBrowser),
            Some(name) => transfer_key(name).map(Some),
            None => Ok(None),
        }
    }
}

/// Count of attempts in flight across one coordinator
#[derive(Clone)]
struct PendingAttempts(Arc<watch::Sender<usize>>);

impl PendingAttempts {
    fn new() -> Self {
        Self(Arc::new(watch::Sender::new(0)))
    }

    fn enter(&self) -> PendingGuard {
        self.0.send_modify(|count| *count += 1);
        PendingGuard(self.0.clone())
    }

    fn count(&self) -> usize {
        *self.0.borrow()
    }

    async fn idle(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

/// Decrements the pending count when the attempt settles or is dropped
struct PendingGuard(Arc<watch::Sender<usize>>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

struct Attempt<R, E> {
    generation: u64,
    outcome: BoxFuture<'static, Result<R, E>>,
    _pending: PendingGuard,
}

/// Coordinator for one rendering pass.
///
/// Holds the injected execution context and transfer slot; every
/// [`StateSync::run`] made through it shares them.
#[derive(Clone)]
pub struct StateSync {
    context: ExecutionContext,
    slot: TransferSlot,
    pending: PendingAttempts,
}

impl StateSync {
    pub fn new(context: ExecutionContext, slot: TransferSlot) -> Self {
        Self {
            context,
            slot,
            pending: PendingAttempts::new(),
        }
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn slot(&self) -> &TransferSlot {
        &self.slot
    }

    /// Number of attempts currently in flight
    pub fn pending(&self) -> usize {
        self.pending.count()
    }

    /// Resolve once no attempt started through this coordinator is in flight.
    ///
    /// Triggers that have not been picked up by their driver yet are not
    /// counted; wait on the state itself for those.
    pub async fn when_stable(&self) {
        self.pending.idle().await
    }

    /// Start tracking a request.
    ///
    /// Fails only on invalid configuration; request failures end up in the
    /// `error` field of the returned state.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, unless nothing needs to be
    /// spawned: an `only_browser` state in the origin context, or a state
    /// without a trigger served straight from the transfer slot.
    pub fn run<R, E, A>(
        &self,
        config: StateConfig<R, E, A>,
    ) -> Result<ObservableState<R, E>, ConfigError>
    where
        R: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        A: Send + 'static,
    {
        let key = config.validate()?;
        let StateConfig {
            request,
            trigger,
            initial_value,
            only_browser,
            transfer_key: _,
            on_success,
            on_error,
        } = config;

        let seed_loading =
            self.context.is_target() && matches!(trigger, Trigger::Once(_)) && key.is_none();
        let seed = AsyncRequestState::initial(seed_loading, initial_value, None);

        if only_browser && self.context.is_origin() {
            debug!("only_browser state skipped in origin context");
            return Ok(ObservableState::constant(seed));
        }

        let span = info_span!(
            "state_sync",
            context = %self.context,
            key = key.as_ref().map(StateKey::as_str).unwrap_or("-"),
        );
        let (state, rx) = watch::channel(seed);
        let mut driver = Driver {
            context: self.context,
            slot: self.slot.clone(),
            key,
            request,
            on_success,
            on_error,
            state,
            pending: self.pending.clone(),
            generation: 0,
        };

        match trigger {
            Trigger::Once(args) => {
                // Started synchronously so a slot hit is visible on return
                // and `when_stable` already counts the attempt.
                let attempt = span.in_scope(|| driver.start(args));
                if let Some(attempt) = attempt {
                    tokio::spawn(driver.run_once(attempt).instrument(span));
                }
            }
            Trigger::Stream(triggers) => {
                tokio::spawn(driver.run_triggered(triggers).instrument(span));
            }
        }

        Ok(ObservableState::new(rx))
    }
}

struct Driver<R, E, A> {
    context: ExecutionContext,
    slot: TransferSlot,
    key: Option<StateKey<R>>,
    request: RequestFn<R, E, A>,
    on_success: Option<Callback<R>>,
    on_error: Option<Callback<E>>,
    state: watch::Sender<AsyncRequestState<R, E>>,
    pending: PendingAttempts,
    generation: u64,
}

impl<R, E, A> Driver<R, E, A>
where
    R: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Begin a new attempt. Returns `None` when served from the transfer slot.
    fn start(&mut self, args: A) -> Option<Attempt<R, E>> {
        self.generation += 1;

        if self.context.is_target() {
            if let Some(key) = &self.key {
                if let Some(value) = self.slot.take(key) {
                    debug!(generation = self.generation, "Hydrated from transfer slot");
                    self.succeed(value);
                    return None;
                }
            }
        }

        debug!(generation = self.generation, "Request started");
        self.state.send_if_modified(AsyncRequestState::begin_loading);

        Some(Attempt {
            generation: self.generation,
            outcome: (self.request)(args),
            _pending: self.pending.enter(),
        })
    }

    fn finish(&self, generation: u64, outcome: Result<R, E>) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Stale attempt discarded");
            return;
        }

        match outcome {
            Ok(value) => {
                if let Some(key) = &self.key {
                    match self.context {
                        ExecutionContext::Origin => self.slot.set(key, &value),
                        ExecutionContext::Target => self.slot.remove(key),
                    }
                }
                debug!(generation, "Request succeeded");
                self.succeed(value);
            }
            Err(error) => {
                warn!(generation, "Request failed");
                if let Some(callback) = &self.on_error {
                    callback(&error);
                }
                self.state.send_replace(AsyncRequestState::failure(error));
            }
        }
    }

    fn succeed(&self, value: R) {
        if let Some(callback) = &self.on_success {
            callback(&value);
        }
        self.state.send_replace(AsyncRequestState::success(value));
    }

    async fn run_once(self, attempt: Attempt<R, E>) {
        let Attempt {
            generation,
            outcome,
            _pending,
        } = attempt;
        let outcome = outcome.await;
        self.finish(generation, outcome);
    }

    async fn run_triggered(mut self, mut triggers: BoxStream<'static, A>) {
        let mut in_flight: Option<Attempt<R, E>> = None;
        let mut triggers_done = false;

        loop {
            if triggers_done && in_flight.is_none() {
                debug!("Trigger stream ended");
                break;
            }

            tokio::select! {
                biased;

                _ = self.state.closed() => {
                    debug!("All observers dropped, stopping");
                    break;
                }

                next = triggers.next(), if !triggers_done => match next {
                    Some(args) => {
                        if let Some(previous) = in_flight.take() {
                            debug!(generation = previous.generation, "Superseded by new trigger");
                        }
                        in_flight = self.start(args);
                    }
                    None => triggers_done = true,
                },

                outcome = settle(&mut in_flight) => {
                    if let Some(attempt) = in_flight.take() {
                        self.finish(attempt.generation, outcome);
                    }
                }
            }
        }
    }
}

async fn settle<R, E>(in_flight: &mut Option<Attempt<R, E>>) -> Result<R, E> {
    match in_flight {
        Some(attempt) => attempt.outcome.as_mut().await,
        None => std::future::pending().await,
    }
}
