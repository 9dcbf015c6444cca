//! Path variables captured by the router for `{name}` route templates.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::request::Parts;

use crate::binding::error::BindError;

/// Path variables of one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the variables the router matched for this request.
    ///
    /// Values arrive percent-decoded. Outside a router there is nothing to read and
    /// the extractor rejection is reported as [`BindError::InvalidPathParams`].
    pub async fn from_parts(parts: &mut Parts) -> Result<Self, BindError> {
        let raw = RawPathParams::from_request_parts(parts, &())
            .await
            .map_err(|rejection| BindError::InvalidPathParams {
                reason: rejection.to_string(),
            })?;
        Ok(raw.iter().collect())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Value of a placeholder; `None` when the route declares no such placeholder.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[test]
    fn test_collect_and_lookup() {
        let params: PathParams = [("group", "tools"), ("item", "a b")].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("item"), Some("a b"));
        assert_eq!(params.get("name"), None);
    }

    #[tokio::test]
    async fn test_unrouted_request_is_rejected() {
        let (mut parts, _) = Request::builder().uri("/widgets/1").body(()).unwrap().into_parts();
        let err = PathParams::from_parts(&mut parts).await.unwrap_err();
        assert!(matches!(err, BindError::InvalidPathParams { .. }));
    }
}
