//! Blog content endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Uri, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;

use crate::error::ApiError;
use crate::pipeline::content_type;
use crate::state::AppState;

/// Handle GET {blog}/*path.
pub(crate) async fn get_blog(State(state): State<Arc<AppState>>, uri: Uri) -> Result<Response, ApiError> {
    let url = percent_decode_str(uri.path()).decode_utf8_lossy();
    let item = state.pipeline.handle(&url).await?;
    Ok((
        [(header::CONTENT_TYPE, content_type(&item))],
        item.rendered().to_vec(),
    )
        .into_response())
}
