//! Cat domain glue
//!
//! These are the collaborators that call into [`crate::state`]: the HTTP
//! client for the cat API, the per-page state builders and the small text
//! helper used when displaying a cat's source.

mod api;
mod beautify;
mod model;
mod viewer;

pub use api::{resolve_url, CatApi, HttpCatApi};
pub use beautify::beautify_url;
pub use model::Cat;
pub use viewer::{
    cat_location, home_cat_state, CatState, CatViewer, CAT_TRANSFER_KEY, HOME_CAT_TRANSFER_KEY,
};
