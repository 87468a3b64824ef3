//! Page-level cat state
//!
//! - [`CatViewer`] - single-cat page, re-fetched whenever the requested cat id changes
//! - [`home_cat_state`] - one random cat for the home page

use futures::channel::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use super::api::CatApi;
use super::model::Cat;
use crate::error::{ApiError, ConfigError};
use crate::state::{ObservableState, StateConfig, StateSync};

/// Transfer key of the single-cat page
pub const CAT_TRANSFER_KEY: &str = "cat";
/// Transfer key of the home page cat
pub const HOME_CAT_TRANSFER_KEY: &str = "home-cat";

pub type CatState = ObservableState<Cat, ApiError>;

/// State of the single-cat page.
///
/// Each [`CatViewer::refresh`] requests a cat by id (or a random one for
/// `None`); only the latest request is ever shown. After a successful load
/// in the target context the canonical location `/cat?catId=<id>` is
/// recorded so the browser URL can be replaced.
pub struct CatViewer {
    state: CatState,
    trigger: mpsc::UnboundedSender<Option<String>>,
    location: Arc<Mutex<Option<String>>>,
}

impl CatViewer {
    pub fn new(sync: &StateSync, api: Arc<dyn CatApi>) -> Result<Self, ConfigError> {
        let (trigger, triggers) = mpsc::unbounded();
        let location = Arc::new(Mutex::new(None));

        let context = sync.context();
        let recorded = location.clone();
        let config = StateConfig::action(
            move |cat_id: Option<String>| {
                let api = api.clone();
                async move {
                    match cat_id.filter(|id| !id.is_empty()) {
                        Some(id) => api.cat_by_id(&id).await,
                        None => api.random_cat().await,
                    }
                }
            },
            triggers,
        )
        .transfer_key(CAT_TRANSFER_KEY)
        .on_success(move |cat: &Cat| {
            if context.is_target() {
                let mut location = recorded.lock().unwrap_or_else(PoisonError::into_inner);
                *location = Some(cat_location(&cat.id));
            }
        });

        Ok(Self {
            state: sync.run(config)?,
            trigger,
            location,
        })
    }

    /// Load the cat with `cat_id`, or a random one
    pub fn refresh(&self, cat_id: Option<String>) {
        if self.trigger.unbounded_send(cat_id).is_err() {
            debug!("Cat viewer driver stopped, refresh ignored");
        }
    }

    pub fn state(&self) -> CatState {
        self.state.clone()
    }

    /// Canonical location of the last cat loaded in the target context
    pub fn location(&self) -> Option<String> {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Random cat for the home page, fetched once per pass
pub fn home_cat_state(sync: &StateSync, api: Arc<dyn CatApi>) -> Result<CatState, ConfigError> {
    let config = StateConfig::new(move || {
        let api = api.clone();
        async move { api.random_cat().await }
    })
    .transfer_key(HOME_CAT_TRANSFER_KEY);

    sync.run(config)
}

/// Location of the cat page for `cat_id`, with the id query-encoded
pub fn cat_location(cat_id: &str) -> String {
    format!("/cat?catId={}", urlencoding::encode(cat_id))
}
