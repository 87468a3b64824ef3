use serde::{Deserialize, Serialize};

/// Lifecycle of one asynchronous fetch
///
/// `data` and `error` are not mutually exclusive across history: a previous
/// success stays in `data` while a later attempt is loading. A completed
/// failure always clears `data` and `loading`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncRequestState<R, E> {
    /// Last successfully fetched value
    pub data: Option<R>,
    /// A request is in flight
    pub loading: bool,
    /// Error of the last completed attempt
    pub error: Option<E>,
}

impl<R, E> AsyncRequestState<R, E> {
    /// Build a state from its parts
    pub fn initial(loading: bool, data: Option<R>, error: Option<E>) -> Self {
        Self {
            data,
            loading,
            error,
        }
    }

    /// Settled success
    pub fn success(data: R) -> Self {
        Self::initial(false, Some(data), None)
    }

    /// Settled failure
    pub fn failure(error: E) -> Self {
        Self::initial(false, None, Some(error))
    }

    /// Not loading and holding either a value or an error
    pub fn is_settled(&self) -> bool {
        !self.loading && (self.data.is_some() || self.error.is_some())
    }

    /// Mark an attempt as started, keeping previous data visible.
    ///
    /// Returns `true` if anything changed.
    pub(crate) fn begin_loading(&mut self) -> bool {
        let changed = !self.loading || self.error.is_some();
        self.loading = true;
        self.error = None;
        changed
    }

    /// Convert the error with `f`, e.g. to render it as a string
    pub fn map_err<F, E2>(self, f: F) -> AsyncRequestState<R, E2>
    where
        F: FnOnce(E) -> E2,
    {
        AsyncRequestState {
            data: self.data,
            loading: self.loading,
            error: self.error.map(f),
        }
    }
}

impl<R, E> Default for AsyncRequestState<R, E> {
    fn default() -> Self {
        Self::initial(false, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = AsyncRequestState<u32, String>;

    #[test]
    fn test_initial_defaults() {
        let state = State::default();
        assert_eq!(state.data, None);
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert!(!state.is_settled());

        let seeded = State::initial(true, Some(7), None);
        assert!(seeded.loading);
        assert_eq!(seeded.data, Some(7));
    }

    #[test]
    fn test_begin_loading_keeps_data_and_clears_error() {
        let mut state = State::success(3);
        assert!(state.begin_loading());
        assert_eq!(state, State::initial(true, Some(3), None));

        // Already loading: no change to report
        assert!(!state.begin_loading());

        let mut failed = State::failure("boom".to_string());
        assert!(failed.begin_loading());
        assert_eq!(failed.error, None);
    }

    #[test]
    fn test_failure_is_settled_without_data() {
        let state = State::failure("nope".to_string());
        assert!(state.is_settled());
        assert!(!state.loading);
        assert_eq!(state.data, None);
    }

    #[test]
    fn test_map_err_and_json_shape() {
        let state: AsyncRequestState<u32, std::io::Error> = AsyncRequestState::failure(
            std::io::Error::new(std::io::ErrorKind::Other, "disk"),
        );
        let rendered = state.map_err(|e| e.to_string());

        let json = serde_json::to_value(&rendered).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "data": null, "loading": false, "error": "disk" })
        );
    }
}
