//! Server-side request decoding.
//!
//! # Responsibilities
//! - Build a fresh record from an inbound HTTP request and its path variables
//! - Read the body only when the record needs it, honouring a byte ceiling
//! - Run the record's self-validation after a successful walk
//!
//! # Design Decisions
//! - A failed decode still hands back the partially populated record
//! - Query strings and cookies are parsed once per request, not per field

use std::any::type_name;
use std::marker::PhantomData;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::Request;
use http_body_util::LengthLimitError;

use crate::binding::directive::{Directive, Location};
use crate::binding::error::BindError;
use crate::binding::path::PathParams;
use crate::binding::schema::{self, Record};

/// A decode failure together with whatever was bound before it.
#[derive(Debug)]
pub struct Rejected<R> {
    pub record: R,
    pub error: BindError,
}

/// Turns one routed inbound request into a record.
///
/// [`RequestDecoder`] is the field-table implementation; endpoints that need to
/// read the wire themselves mount their own through
/// [`HttpServer::mount_with_decoder`](crate::http::HttpServer::mount_with_decoder).
#[async_trait]
pub trait DecodeRequest<R>: Send + Sync + 'static {
    async fn decode_request(&self, request: Request<Body>) -> Result<R, Rejected<R>>;
}

/// Decoder for one record type.
pub struct RequestDecoder<R> {
    body_limit: Option<usize>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for RequestDecoder<R> {
    fn clone(&self) -> Self {
        Self {
            body_limit: self.body_limit,
            _record: PhantomData,
        }
    }
}

impl<R: Record> RequestDecoder<R> {
    /// Check every directive of `R` up front so broken tables fail at mount time.
    pub fn new() -> Result<Self, BindError> {
        if R::json_body().is_none() {
            schema::check_fields::<R>()?;
        }
        Ok(Self {
            body_limit: None,
            _record: PhantomData,
        })
    }

    /// Maximum body size in bytes; `None` reads without a ceiling.
    pub fn with_body_limit(mut self, limit: Option<usize>) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn body_limit(&self) -> Option<usize> {
        self.body_limit
    }

    /// Decode `request` into a fresh `R`.
    pub async fn decode(&self, request: Request<Body>, params: &PathParams) -> Result<R, Rejected<R>> {
        let mut record = R::default();
        let (parts, body) = request.into_parts();

        if let Some(codec) = R::json_body() {
            let bytes = match read_body(body, self.body_limit).await {
                Ok(bytes) => bytes,
                Err(error) => return Err(Rejected { record, error }),
            };
            if !is_blank(&bytes) {
                record = match codec.decode(&bytes) {
                    Ok(decoded) => decoded,
                    Err(source) => {
                        let error = BindError::MalformedBody {
                            name: short_type_name::<R>().to_string(),
                            source,
                        };
                        return Err(Rejected { record, error });
                    }
                };
            }
            return finish(record);
        }

        let bytes = if schema::needs_body::<R>() {
            match read_body(body, self.body_limit).await {
                Ok(bytes) => Some(bytes),
                Err(error) => return Err(Rejected { record, error }),
            }
        } else {
            None
        };

        let source = Inbound::new(&parts, params, bytes.as_deref());
        if let Err(error) = schema::decode_fields(&mut record, &source) {
            tracing::debug!(
                record = short_type_name::<R>(),
                error = %error,
                "Request decode failed"
            );
            return Err(Rejected { record, error });
        }

        finish(record)
    }

    /// Decode a request that went through the router, using its captured path variables.
    pub async fn decode_routed(&self, request: Request<Body>) -> Result<R, Rejected<R>> {
        let (mut parts, body) = request.into_parts();
        let params = match PathParams::from_parts(&mut parts).await {
            Ok(params) => params,
            Err(error) => {
                return Err(Rejected {
                    record: R::default(),
                    error,
                })
            }
        };
        self.decode(Request::from_parts(parts, body), &params).await
    }
}

#[async_trait]
impl<R: Record> DecodeRequest<R> for RequestDecoder<R> {
    async fn decode_request(&self, request: Request<Body>) -> Result<R, Rejected<R>> {
        self.decode_routed(request).await
    }
}

fn finish<R: Record>(record: R) -> Result<R, Rejected<R>> {
    match record.validate() {
        Ok(()) => Ok(record),
        Err(e) => Err(Rejected {
            record,
            error: e.into(),
        }),
    }
}

/// Read the whole body, mapping the ceiling overflow to `too_large`.
pub(crate) async fn read_body(body: Body, limit: Option<usize>) -> Result<Bytes, BindError> {
    axum::body::to_bytes(body, limit.unwrap_or(usize::MAX))
        .await
        .map_err(|e| {
            let reason = e.to_string();
            let inner = e.into_inner();
            let too_large = inner.is::<LengthLimitError>()
                || inner.source().is_some_and(|s| s.is::<LengthLimitError>());
            BindError::BodyReadFailure { reason, too_large }
        })
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

pub(crate) fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Read-only view of one inbound request, shared by the field walk.
pub(crate) struct Inbound<'a> {
    parts: &'a Parts,
    params: &'a PathParams,
    query: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Option<&'a [u8]>,
}

impl<'a> Inbound<'a> {
    pub(crate) fn new(parts: &'a Parts, params: &'a PathParams, body: Option<&'a [u8]>) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let cookies = parts
            .headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                Some((name.trim().to_string(), value.to_string()))
            })
            .collect();

        Self {
            parts,
            params,
            query,
            cookies,
            body,
        }
    }

    /// Raw wire text for a text location. `None` means the value is absent.
    pub(crate) fn text(&self, directive: &Directive) -> Result<Option<&str>, BindError> {
        let name = directive.name.as_str();
        match directive.location {
            Location::Path => match self.params.get(name) {
                Some(value) => Ok(Some(value)),
                None if directive.required => Err(schema::missing(directive)),
                None => Err(BindError::MissingPlaceholder {
                    name: name.to_string(),
                    path: self.parts.uri.path().to_string(),
                }),
            },
            Location::Query => Ok(first(&self.query, name)),
            Location::Cookie => Ok(first(&self.cookies, name)),
            Location::Header => match self.parts.headers.get(name) {
                Some(value) => value.to_str().map(Some).map_err(|e| BindError::InvalidHeader {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
                None => Ok(None),
            },
            Location::Body => Ok(None),
        }
    }

    pub(crate) fn body(&self) -> Option<&'a [u8]> {
        self.body
    }
}

fn first<'v>(pairs: &'v [(String, String)], name: &str) -> Option<&'v str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
