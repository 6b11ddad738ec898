//! Search API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use eb_search::SearcherInfo;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string of GET {api}/search.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    keyword: Option<String>,
    num: Option<String>,
    #[serde(rename = "searchType")]
    search_type: Option<String>,
}

fn search_key(search_type: &str, num: usize, keyword: &str) -> String {
    format!("search:{search_type}:{num}:{keyword}")
}

/// Handle GET {api}/search.
///
/// Responds with blog URLs, best match first.
pub(crate) async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let keyword = query
        .keyword
        .filter(|k| !k.is_empty())
        .ok_or(ApiError::BadRequest("keyword is empty"))?;
    let num = match query.num.as_deref() {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::BadRequest("num must be int"))?,
        None => state.default_num,
    };
    let search_type = query.search_type.filter(|t| !t.is_empty()).unwrap_or_else(|| "title".to_owned());
    let searcher = state
        .registry
        .get(&search_type)
        .ok_or(ApiError::BadRequest("search type not found"))?;

    let key = search_key(&search_type, num, &keyword);
    if let Some(urls) = state.search_cache.get(&key) {
        tracing::debug!(search_type, keyword, "Search cache hit");
        return Ok(Json(urls));
    }

    let task_keyword = keyword.clone();
    let paths = tokio::task::spawn_blocking(move || searcher.search(&task_keyword, num))
        .await
        .map_err(|e| ApiError::Internal(format!("search task failed: {e}")))?
        .map_err(|e| {
            tracing::warn!(search_type, keyword, error = %e, "Search failed");
            ApiError::Internal(e.to_string())
        })?;

    let mapper = &state.pipeline.mapper;
    let urls: Vec<String> = paths.iter().filter_map(|path| mapper.path_to_url(path)).collect();
    tracing::debug!(search_type, keyword, results = urls.len(), "Searched");
    state.search_cache.set(key, urls.clone());
    Ok(Json(urls))
}

/// Handle GET {api}/searchers.
pub(crate) async fn searchers(State(state): State<Arc<AppState>>) -> Json<Vec<SearcherInfo>> {
    Json(state.registry.list())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_separates_parameters() {
        assert_ne!(search_key("title", 1, "a"), search_key("title", 12, "a"));
        assert_ne!(search_key("title", 1, "a"), search_key("content", 1, "a"));
        assert_eq!(search_key("title", 3, "rust"), "search:title:3:rust");
    }
}
