//! Continuously readable request state.
//!
//! Backed by a `tokio::sync::watch` channel: the producer publishes a
//! snapshot on every transition and readers can look at the latest one at
//! any time or wait for the next.

use std::fmt;
use std::future::Future;
use tokio::sync::watch;

use super::request_state::AsyncRequestState;

/// Read side of a running request state
pub struct ObservableState<R, E> {
    rx: watch::Receiver<AsyncRequestState<R, E>>,
}

impl<R, E> ObservableState<R, E> {
    pub(crate) fn new(rx: watch::Receiver<AsyncRequestState<R, E>>) -> Self {
        Self { rx }
    }

    /// A state that never changes
    pub fn constant(state: AsyncRequestState<R, E>) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    /// Borrow the latest state without cloning
    pub fn borrow(&self) -> watch::Ref<'_, AsyncRequestState<R, E>> {
        self.rx.borrow()
    }

    /// Raw receiver, e.g. for `tokio::select!` loops
    pub fn subscribe(&self) -> watch::Receiver<AsyncRequestState<R, E>> {
        self.rx.clone()
    }

    /// False once the producer has finished and no further transitions can happen
    pub fn is_live(&self) -> bool {
        self.rx.has_changed().is_ok()
    }
}

impl<R: Clone, E: Clone> ObservableState<R, E> {
    /// Snapshot of the latest state
    pub fn get(&self) -> AsyncRequestState<R, E> {
        self.rx.borrow().clone()
    }

    /// Wait for the next transition.
    ///
    /// Returns `None` once the producer is gone and nothing new was published.
    pub async fn changed(&mut self) -> Option<AsyncRequestState<R, E>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the state satisfies `predicate` (checked against the current state first).
    ///
    /// Returns `None` if the producer finishes without ever satisfying it.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<AsyncRequestState<R, E>>
    where
        F: FnMut(&AsyncRequestState<R, E>) -> bool,
    {
        let state = self.rx.wait_for(|state| predicate(state)).await.ok()?;
        Some(state.clone())
    }

    /// Wait until the state is not loading and holds data or an error
    pub async fn settled(&mut self) -> Option<AsyncRequestState<R, E>> {
        self.wait_for(AsyncRequestState::is_settled).await
    }
}

impl<R, E> Clone for ObservableState<R, E> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<R: fmt::Debug, E: fmt::Debug> fmt::Debug for ObservableState<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableState")
            .field("state", &*self.rx.borrow())
            .finish()
    }
}

/// Track a single future as request state.
///
/// Seeds `{ data: initial_value, loading: show_initial_loading, error: None }`,
/// then publishes the settled success or failure.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn from_future<F, R, E>(
    future: F,
    initial_value: Option<R>,
    show_initial_loading: bool,
) -> ObservableState<R, E>
where
    F: Future<Output = Result<R, E>> + Send + 'static,
    R: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(AsyncRequestState::initial(
        show_initial_loading,
        initial_value,
        None,
    ));

    tokio::spawn(async move {
        let settled = match future.await {
            Ok(data) => AsyncRequestState::success(data),
            Err(error) => AsyncRequestState::failure(error),
        };
        tx.send_replace(settled);
    });

    ObservableState::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_constant_never_changes() {
        let mut state: ObservableState<u8, String> =
            ObservableState::constant(AsyncRequestState::initial(false, Some(1), None));

        assert_eq!(state.get().data, Some(1));
        assert!(!state.is_live());
        assert!(state.changed().await.is_none());
        assert!(state.settled().await.is_some());
    }

    #[tokio::test]
    async fn test_from_future_success() {
        let (tx, rx) = oneshot::channel::<u32>();
        let mut state: ObservableState<u32, String> = from_future(
            async move { rx.await.map_err(|e| e.to_string()) },
            Some(1),
            true,
        );

        assert_eq!(state.get(), AsyncRequestState::initial(true, Some(1), None));

        tx.send(42).unwrap();
        let settled = state.settled().await.unwrap();
        assert_eq!(settled, AsyncRequestState::success(42));
    }

    #[tokio::test]
    async fn test_from_future_failure_drops_initial_value() {
        let mut state: ObservableState<u32, String> =
            from_future(async { Err("offline".to_string()) }, Some(5), false);

        let settled = state.settled().await.unwrap();
        assert_eq!(settled.data, None);
        assert_eq!(settled.error.as_deref(), Some("offline"));
        assert!(!settled.loading);
    }
}
