//! Resource Fetcher
//!
//! Follows the continuation-token protocol of the Databricks list APIs
//! (`next_page_token` + `has_more`) and aggregates every page into one
//! [`ResourceCollection`].

use super::collection::ResourceCollection;
use crate::databricks::http::ApiClient;
use crate::error::{HaltError, Result};
use serde_json::Value;
use std::collections::HashSet;

/// Query parameter carrying the continuation token
pub const PAGE_TOKEN_PARAM: &str = "page_token";

/// Build owned query parameters from string pairs
pub fn query_params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Continuation state reported by one page
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageCursor {
    has_more: bool,
    next_token: Option<String>,
}

impl PageCursor {
    fn from_response(response: &Value) -> Self {
        let next_token = response
            .get("next_page_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        // Some list endpoints only send the token; treat a bare token as "more"
        let has_more = match response.get("has_more").and_then(Value::as_bool) {
            Some(flag) => flag,
            None => next_token.is_some(),
        };

        Self {
            has_more,
            next_token,
        }
    }
}

fn available_keys(response: &Value) -> String {
    response
        .as_object()
        .map(|map| map.keys().cloned().collect::<Vec<_>>().join(", "))
        .unwrap_or_default()
}

fn set_param(params: &mut Vec<(String, String)>, name: &str, value: &str) {
    match params.iter_mut().find(|(k, _)| k == name) {
        Some((_, v)) => *v = value.to_string(),
        None => params.push((name.to_string(), value.to_string())),
    }
}

/// Fetch all pages of a list endpoint (auto-paginate)
///
/// Items under `aggregate_key` are concatenated in arrival order. A page that
/// belongs to a multi-page listing but lacks `aggregate_key`, a `has_more`
/// without a token, or a token seen twice is a [`HaltError::Protocol`].
/// Any non-200 response aborts the whole fetch.
pub async fn fetch_collection(
    http: &ApiClient,
    url: &str,
    aggregate_key: &str,
    params: &[(String, String)],
) -> Result<ResourceCollection> {
    let mut params = params.to_vec();

    let first = http.get(url, &params).await?;
    let mut cursor = PageCursor::from_response(&first);

    if cursor.has_more && first.get(aggregate_key).is_none() {
        return Err(HaltError::Protocol(format!(
            "Expected key '{}' not found in response from {}. Available keys: [{}]",
            aggregate_key,
            url,
            available_keys(&first)
        )));
    }

    let mut collection =
        ResourceCollection::from_document(aggregate_key, first).ok_or_else(|| {
            HaltError::Protocol(format!(
                "Response from {} has no '{}' array",
                url, aggregate_key
            ))
        })?;

    let mut seen_tokens = HashSet::new();
    let mut pages = 1usize;

    while cursor.has_more {
        let Some(token) = cursor.next_token.take() else {
            return Err(HaltError::Protocol(format!(
                "Response from {} reports more pages but carries no next_page_token",
                url
            )));
        };
        if !seen_tokens.insert(token.clone()) {
            return Err(HaltError::Protocol(format!(
                "Continuation token repeated while listing {}",
                url
            )));
        }

        set_param(&mut params, PAGE_TOKEN_PARAM, &token);
        let page = http.get(url, &params).await?;

        let Some(items) = page.get(aggregate_key).and_then(Value::as_array) else {
            return Err(HaltError::Protocol(format!(
                "Expected key '{}' not found in page {} from {}. Available keys: [{}]",
                aggregate_key,
                pages + 1,
                url,
                available_keys(&page)
            )));
        };

        collection.extend(items.clone());
        cursor = PageCursor::from_response(&page);
        pages += 1;

        tracing::debug!(
            "Fetched page {} of {} ({} {} so far)",
            pages,
            url,
            collection.len(),
            aggregate_key
        );
    }

    tracing::info!(
        "Fetched {} {} from {} in {} page(s)",
        collection.len(),
        aggregate_key,
        url,
        pages
    );

    Ok(collection)
}
