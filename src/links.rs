use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::pagination::PageWindow;

/// Links
///
/// Navigation URIs attached to a non-empty list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// RequestUri
///
/// The URI the client actually called. Nested routers rewrite `Parts::uri`, so
/// the `OriginalUri` extension is preferred. When a `Host` header is present the
/// URI is made absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUri(pub String);

impl RequestUri {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The request URI with its query string removed, used to build `Location` headers.
    pub fn without_query(&self) -> &str {
        self.0.split_once('?').map_or(self.0.as_str(), |(path, _)| path)
    }

    pub fn child(&self, id: impl std::fmt::Display) -> String {
        format!("{}/{}", self.without_query().trim_end_matches('/'), id)
    }
}

impl<S> FromRequestParts<S> for RequestUri
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        if uri.scheme().is_some() {
            return Ok(RequestUri(uri.to_string()));
        }

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok());

        let uri = match host {
            Some(host) => {
                let scheme = parts
                    .headers
                    .get("x-forwarded-proto")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("http");
                format!("{scheme}://{host}{path_and_query}")
            }
            None => path_and_query,
        };

        Ok(RequestUri(uri))
    }
}

/// build_links
///
/// Derives the navigation links of a page from the request URI. Returns `None`
/// for an empty collection.
pub fn build_links(request_uri: &str, window: &PageWindow) -> Option<Links> {
    if window.is_empty() {
        return None;
    }

    let mut links = Links {
        self_: request_uri.to_string(),
        ..Links::default()
    };

    if window.has_previous() {
        links.first = Some(with_page(request_uri, 1));
        links.previous = Some(with_page(request_uri, window.page - 1));
    }
    if window.has_next() {
        links.next = Some(with_page(request_uri, window.page + 1));
        links.last = Some(with_page(request_uri, window.page_count));
    }

    Some(links)
}

/// with_page
///
/// Rewrites the `page` query parameter in place, or appends it after the
/// existing parameters. Nothing else in the URI is touched.
pub fn with_page(uri: &str, page: i64) -> String {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) if !query.is_empty() => (path, query),
        Some((path, _)) => return format!("{path}?page={page}"),
        None => return format!("{uri}?page={page}"),
    };

    let mut replaced = false;
    let mut params: Vec<String> = query
        .split('&')
        .map(|param| {
            let key = param.split_once('=').map_or(param, |(key, _)| key);
            if key == "page" {
                replaced = true;
                format!("page={page}")
            } else {
                param.to_string()
            }
        })
        .collect();

    if !replaced {
        params.push(format!("page={page}"));
    }

    format!("{path}?{}", params.join("&"))
}
