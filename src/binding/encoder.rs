//! Client-side request encoding.
//!
//! # Data Flow
//! ```text
//! &R
//!   → Record::validate (unless the record opts out on the client)
//!   → base URL + RouteInfo::path
//!   → whole-record JSON body, when the record is one
//!   → field walk into Outbound
//!   → reqwest::Request
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use url::Url;

use crate::binding::directive::{Directive, Location};
use crate::binding::error::BindError;
use crate::binding::schema::{self, missing, Endpoint};
use crate::binding::decoder::short_type_name;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the outbound request for `record` against `base_url`.
pub fn encode<R: Endpoint>(base_url: &str, record: &R) -> Result<reqwest::Request, BindError> {
    if R::client_validation() {
        record.validate()?;
    }

    let info = R::info();
    let mut out = Outbound::new(info.path);

    if let Some(codec) = R::json_body() {
        let body = codec.encode(record).map_err(|source| BindError::MalformedBody {
            name: short_type_name::<R>().to_string(),
            source,
        })?;
        out.replace_body(body);
    }
    schema::encode_fields(record, &mut out)?;

    out.build(base_url, info.method)
}

/// Join a base URL and a relative route path with exactly one slash.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Request under construction; owned by a single encode call.
pub(crate) struct Outbound {
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl Outbound {
    fn new(template: &str) -> Self {
        Self {
            path: template.to_string(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    /// Write one text value. `None` means the value is absent.
    pub(crate) fn write(&mut self, directive: &Directive, text: Option<String>) -> Result<(), BindError> {
        let text = match text {
            Some(text) if !text.is_empty() => text,
            _ if directive.required && directive.location != Location::Body => {
                return Err(missing(directive));
            }
            Some(text) => text,
            None if directive.location == Location::Path => String::new(),
            None => return Ok(()),
        };

        let name = directive.name.as_str();
        match directive.location {
            Location::Path => {
                let placeholder = format!("{{{name}}}");
                if !self.path.contains(&placeholder) {
                    return Err(BindError::MissingPlaceholder {
                        name: name.to_string(),
                        path: self.path.clone(),
                    });
                }
                let segment = if directive.url_encode {
                    text
                } else {
                    urlencoding::encode(&text).into_owned()
                };
                self.path = self.path.replace(&placeholder, &segment);
            }
            Location::Query => self.query.push((name.to_string(), text)),
            Location::Cookie => self.cookies.push((name.to_string(), text)),
            Location::Header => {
                let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid_header(name, e))?;
                let value = HeaderValue::from_str(&text).map_err(|e| invalid_header(name, e))?;
                self.headers.append(header, value);
            }
            Location::Body => self.replace_body(text.into_bytes()),
        }
        Ok(())
    }

    pub(crate) fn replace_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    fn build(self, base_url: &str, method: reqwest::Method) -> Result<reqwest::Request, BindError> {
        let full = join_url(base_url, &self.path);
        let mut url = Url::parse(&full).map_err(|e| BindError::InvalidUrl {
            url: full.clone(),
            reason: e.to_string(),
        })?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        let mut request = reqwest::Request::new(method, url);
        *request.headers_mut() = self.headers;

        if !self.cookies.is_empty() {
            let line = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::from_str(&line).map_err(|e| invalid_header(COOKIE.as_str(), e))?;
            request.headers_mut().insert(COOKIE, value);
        }

        if let Some(body) = self.body {
            request
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            *request.body_mut() = Some(body.into());
        }

        Ok(request)
    }
}

fn invalid_header(name: &str, e: impl std::fmt::Display) -> BindError {
    BindError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::schema::{Field, Record, RouteInfo};
    use crate::binding::ValidationError;
    use crate::service::ServiceRequest;
    use axum::http::Method;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default)]
    struct Fetch {
        id: String,
        verbose: bool,
        token: String,
        session: Option<String>,
        limit: Option<u32>,
    }

    impl ServiceRequest for Fetch {}

    impl Record for Fetch {
        fn fields() -> Vec<Field<Self>> {
            vec![
                Field::scalar("id", r#"path:"id" required:"true""#, |f: &Self| &f.id, |f| &mut f.id),
                Field::scalar("verbose", r#"query:"verbose""#, |f: &Self| &f.verbose, |f| &mut f.verbose),
                Field::scalar("token", r#"header:"X-Token" required:"true""#, |f: &Self| &f.token, |f| &mut f.token),
                Field::scalar("session", r#"cookie:"session""#, |f: &Self| &f.session, |f| &mut f.session),
                Field::scalar("limit", r#"query:"limit""#, |f: &Self| &f.limit, |f| &mut f.limit),
            ]
        }
    }

    impl Endpoint for Fetch {
        fn info() -> RouteInfo {
            RouteInfo {
                name: "fetch",
                method: Method::GET,
                path: "/items/{id}",
                description: "Fetch one item",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Orphan {
        id: String,
    }

    impl ServiceRequest for Orphan {}

    impl Record for Orphan {
        fn fields() -> Vec<Field<Self>> {
            vec![Field::scalar("id", r#"path:"id""#, |o: &Self| &o.id, |o| &mut o.id)]
        }
    }

    impl Endpoint for Orphan {
        fn info() -> RouteInfo {
            RouteInfo {
                name: "orphan",
                method: Method::GET,
                path: "/orphans",
                description: "",
            }
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Create {
        name: String,
    }

    impl ServiceRequest for Create {}

    impl Record for Create {
        fn json_body() -> Option<crate::binding::JsonBody<Self>> {
            Some(crate::binding::JsonBody::new())
        }

        fn validate(&self) -> Result<(), ValidationError> {
            if self.name.is_empty() {
                return Err(ValidationError::new("name is required"));
            }
            Ok(())
        }
    }

    impl Endpoint for Create {
        fn info() -> RouteInfo {
            RouteInfo {
                name: "create",
                method: Method::POST,
                path: "items",
                description: "",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Unchecked {
        name: String,
    }

    impl ServiceRequest for Unchecked {}

    impl Record for Unchecked {
        fn fields() -> Vec<Field<Self>> {
            vec![Field::scalar("name", r#"query:"name""#, |u: &Self| &u.name, |u| &mut u.name)]
        }

        fn validate(&self) -> Result<(), ValidationError> {
            Err(ValidationError::new("never valid"))
        }

        fn client_validation() -> bool {
            false
        }
    }

    impl Endpoint for Unchecked {
        fn info() -> RouteInfo {
            RouteInfo {
                name: "unchecked",
                method: Method::GET,
                path: "/unchecked",
                description: "",
            }
        }
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://host/", "/a"), "http://host/a");
        assert_eq!(join_url("http://host", "a"), "http://host/a");
        assert_eq!(join_url("http://host/api//", "//a/b"), "http://host/api/a/b");
        assert_eq!(join_url("http://host/", ""), "http://host");
    }

    #[test]
    fn test_encode_text_locations() {
        let record = Fetch {
            id: "a b".into(),
            verbose: true,
            token: "secret".into(),
            session: Some("abc".into()),
            limit: None,
        };
        let request = encode("http://localhost:8080/", &record).unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().path(), "/items/a%20b");
        assert_eq!(request.url().query(), Some("verbose=true"));
        assert_eq!(request.headers()["X-Token"], "secret");
        assert_eq!(request.headers()[COOKIE], "session=abc");
        assert!(request.body().is_none());
    }

    #[test]
    fn test_encode_required_missing() {
        let record = Fetch {
            id: "1".into(),
            ..Default::default()
        };
        let err = encode("http://localhost", &record).unwrap_err();
        assert!(matches!(
            err,
            BindError::RequiredValueMissing { ref name, location: Location::Header } if name == "X-Token"
        ));
    }

    #[test]
    fn test_encode_missing_placeholder() {
        let err = encode("http://localhost", &Orphan { id: "1".into() }).unwrap_err();
        assert!(matches!(err, BindError::MissingPlaceholder { ref name, .. } if name == "id"));
    }

    #[test]
    fn test_encode_json_body_record() {
        let request = encode("http://localhost", &Create { name: "w".into() }).unwrap();
        assert_eq!(request.url().as_str(), "http://localhost/items");
        assert_eq!(request.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"name":"w"}"#);
    }

    #[test]
    fn test_validation_runs_before_build() {
        let err = encode("http://localhost", &Create::default()).unwrap_err();
        assert!(matches!(err, BindError::ValidationFailure(_)));
    }

    #[test]
    fn test_client_validation_opt_out() {
        let request = encode("http://localhost", &Unchecked { name: "x".into() }).unwrap();
        assert_eq!(request.url().query(), Some("name=x"));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = encode("not a url", &Unchecked::default()).unwrap_err();
        assert!(matches!(err, BindError::InvalidUrl { .. }));
    }
}
