//! zipstream-api — HTTP surface for zipstream.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Index page |
//! | GET | `/archive/:handle/` | Streamed `archive.zip` of the handle's directory |

pub mod body;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use zipstream_core::{ArchiveProxy, Archiver};

pub use body::BodySink;

/// Shared state for handlers.
pub struct ApiState<A> {
    /// Resource root; handles resolve to its direct children.
    pub root: PathBuf,
    /// HTML file served at `/`.
    pub index_page: PathBuf,
    pub proxy: Arc<ArchiveProxy<A>>,
    /// Cancelled on server shutdown; every stream runs under a child token.
    pub shutdown: CancellationToken,
}

impl<A> Clone for ApiState<A> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            index_page: self.index_page.clone(),
            proxy: Arc::clone(&self.proxy),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Build the router.
pub fn build_router<A: Archiver>(state: ApiState<A>) -> Router {
    Router::new()
        .route("/", get(handlers::index_page::<A>))
        .route("/archive/{handle}/", get(handlers::download_archive::<A>))
        .route("/archive/{handle}", get(handlers::download_archive::<A>))
        .with_state(state)
}
