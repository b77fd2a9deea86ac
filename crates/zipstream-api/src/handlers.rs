//! HTTP handlers.
//!
//! The archive handler resolves the handle, hands the proxy a
//! [`BodySink`] in its own task and waits only for the headers. Everything
//! after that point is reported by aborting the body, never by a status.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, info, warn};

use zipstream_core::archiver::Archiver;
use zipstream_core::resolver;
use zipstream_core::sink::AttachmentHeaders;

use crate::ApiState;
use crate::body::BodySink;

/// Body of the not-found response.
pub const NOT_FOUND_TEXT: &str = "The archive does not exist";

// ── Index ──────────────────────────────────────────────────────

/// GET /
pub async fn index_page<A: Archiver>(State(state): State<ApiState<A>>) -> Response {
    match tokio::fs::read_to_string(&state.index_page).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!(path = %state.index_page.display(), error = %e, "failed to read index page");
            (StatusCode::NOT_FOUND, "Index page is not available").into_response()
        }
    }
}

// ── Archives ───────────────────────────────────────────────────

/// GET /archive/:handle/
pub async fn download_archive<A: Archiver>(
    State(state): State<ApiState<A>>,
    Path(handle): Path<String>,
) -> Response {
    let source = match resolver::resolve(&state.root, &handle) {
        Ok(source) => source,
        Err(e) => {
            info!(handle = %handle, error = %e, "archive request rejected");
            return (StatusCode::NOT_FOUND, NOT_FOUND_TEXT).into_response();
        }
    };

    let cancel = state.shutdown.child_token();
    let (mut sink, head, body) = BodySink::channel(cancel.clone());
    let proxy = Arc::clone(&state.proxy);

    info!(handle = %handle, "archive download started");
    let task = tokio::spawn(async move { proxy.stream(&source, &mut sink, &cancel).await });

    if let Ok(headers) = head.await {
        return attachment(headers, body);
    }

    // The sink was dropped unprepared: the stream failed before any header
    // was committed, so a status can still be sent.
    match task.await {
        Ok(Err(e)) => {
            error!(handle = %handle, error = %e, "archive stream failed before response");
        }
        Ok(Ok(_)) => {
            error!(handle = %handle, "archive stream ended without a response");
        }
        Err(e) => {
            error!(handle = %handle, error = %e, "archive task panicked");
        }
    }
    (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create the archive").into_response()
}

fn attachment(headers: AttachmentHeaders, body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, headers.content_type.to_string()),
            (header::CONTENT_DISPOSITION, headers.content_disposition),
        ],
        body,
    )
        .into_response()
}
