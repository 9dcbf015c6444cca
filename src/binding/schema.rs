//! Record descriptors and the field walker.
//!
//! # Responsibilities
//! - Describe each bindable record as an ordered table of [`Field`]s
//! - Walk that table in both directions, resolving directives per field
//! - Flatten nested and embedded records into the parent walk
//!
//! # Design Decisions
//! - Descriptor tables are plain values returned by [`Record::fields`]; no runtime
//!   type inspection
//! - Optional chains are allocated down to the leaf when decoding
//! - A nested record never stops the walk: fields declared after it are still bound

use std::any::type_name;
use std::marker::PhantomData;

use axum::http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::binding::decoder::Inbound;
use crate::binding::directive::{self, Directive, Location};
use crate::binding::encoder::Outbound;
use crate::binding::error::{BindError, ValidationError};
use crate::binding::scalar::{ConversionError, Scalar, ScalarKind};
use crate::service::ServiceRequest;

/// Written in place of a document that failed to serialize at a text location.
pub(crate) const JSON_ERROR_PLACEHOLDER: &str = r#"{ "error": "JSON parse error" }"#;

/// Route metadata of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Unique name used in logs and metrics.
    pub name: &'static str,
    pub method: Method,
    /// Relative path, e.g. `/widgets/{id}`.
    pub path: &'static str,
    pub description: &'static str,
}

/// A record whose fields map onto HTTP request locations.
pub trait Record: Default + Send + Sync + 'static {
    /// Field table, in declaration order.
    fn fields() -> Vec<Field<Self>> {
        Vec::new()
    }

    /// When set, the whole record is the JSON request body.
    fn json_body() -> Option<JsonBody<Self>> {
        None
    }

    /// Self-check run after decoding and before encoding.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Whether [`Record::validate`] also runs on the client side.
    fn client_validation() -> bool {
        true
    }
}

/// A record that is addressable as a route.
pub trait Endpoint: Record + ServiceRequest {
    fn info() -> RouteInfo;
}

/// Whole-record JSON codec, see [`Record::json_body`].
pub struct JsonBody<R> {
    decode: fn(&[u8]) -> serde_json::Result<R>,
    encode: fn(&R) -> serde_json::Result<Vec<u8>>,
}

impl<R: Serialize + DeserializeOwned> JsonBody<R> {
    pub fn new() -> Self {
        Self {
            decode: |bytes| serde_json::from_slice(bytes),
            encode: |record| serde_json::to_vec(record),
        }
    }
}

impl<R: Serialize + DeserializeOwned> Default for JsonBody<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> JsonBody<R> {
    pub(crate) fn decode(&self, bytes: &[u8]) -> serde_json::Result<R> {
        (self.decode)(bytes)
    }

    pub(crate) fn encode(&self, record: &R) -> serde_json::Result<Vec<u8>> {
        (self.encode)(record)
    }
}

/// A value that can be flattened into its parent: a record, or an optional chain
/// ending in one.
pub trait Embeddable: Send + Sync + 'static {
    type Target: Record;

    /// The record, when every level of the chain is present.
    fn target(&self) -> Option<&Self::Target>;

    /// The record, allocating absent levels on the way down.
    fn target_mut(&mut self) -> &mut Self::Target;
}

impl<T: Record> Embeddable for T {
    type Target = T;

    fn target(&self) -> Option<&T> {
        Some(self)
    }

    fn target_mut(&mut self) -> &mut T {
        self
    }
}

impl<T: Embeddable + Default> Embeddable for Option<T> {
    type Target = T::Target;

    fn target(&self) -> Option<&Self::Target> {
        self.as_ref().and_then(T::target)
    }

    fn target_mut(&mut self) -> &mut Self::Target {
        self.get_or_insert_with(T::default).target_mut()
    }
}

/// One entry of a record's descriptor table.
pub struct Field<R> {
    name: &'static str,
    tags: &'static str,
    slot: Slot<R>,
}

enum Slot<R> {
    Scalar(Box<dyn ScalarSlot<R>>),
    Document(Box<dyn DocumentSlot<R>>),
    Nested(Box<dyn NestedSlot<R>>),
    Hidden,
}

impl<R: Record> Field<R> {
    /// A field converted to and from wire text.
    pub fn scalar<V, G, M>(name: &'static str, tags: &'static str, get: G, get_mut: M) -> Self
    where
        V: Scalar,
        G: Fn(&R) -> &V + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut V + Send + Sync + 'static,
    {
        Self {
            name,
            tags,
            slot: Slot::Scalar(Box::new(Access {
                get,
                get_mut,
                _value: PhantomData::<fn() -> V>,
            })),
        }
    }

    /// A structured field carried as one JSON document.
    pub fn document<V, G, M>(name: &'static str, tags: &'static str, get: G, get_mut: M) -> Self
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        G: Fn(&R) -> &V + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut V + Send + Sync + 'static,
    {
        Self {
            name,
            tags,
            slot: Slot::Document(Box::new(Access {
                get,
                get_mut,
                _value: PhantomData::<fn() -> V>,
            })),
        }
    }

    /// A named, untagged record field whose own fields bind as if declared here.
    pub fn nested<V, G, M>(name: &'static str, get: G, get_mut: M) -> Self
    where
        V: Record,
        G: Fn(&R) -> &V + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut V + Send + Sync + 'static,
    {
        Self::flattened::<V, G, M>(name, get, get_mut)
    }

    /// An anonymous (embedded) record, possibly behind optional levels.
    pub fn embedded<V, G, M>(name: &'static str, get: G, get_mut: M) -> Self
    where
        V: Embeddable,
        G: Fn(&R) -> &V + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut V + Send + Sync + 'static,
    {
        Self::flattened::<V, G, M>(name, get, get_mut)
    }

    /// A private field. Skipped, unless it carries a directive.
    pub fn hidden(name: &'static str, tags: &'static str) -> Self {
        Self {
            name,
            tags,
            slot: Slot::Hidden,
        }
    }

    fn flattened<V, G, M>(name: &'static str, get: G, get_mut: M) -> Self
    where
        V: Embeddable,
        G: Fn(&R) -> &V + Send + Sync + 'static,
        M: Fn(&mut R) -> &mut V + Send + Sync + 'static,
    {
        Self {
            name,
            tags: "",
            slot: Slot::Nested(Box::new(Access {
                get,
                get_mut,
                _value: PhantomData::<fn() -> V>,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolved directive; `None` for unbound and flattened fields.
    pub fn directive(&self) -> Result<Option<Directive>, BindError> {
        match self.slot {
            Slot::Nested(_) => Ok(None),
            _ => directive::resolve(self.name, self.tags),
        }
    }
}

struct Access<G, M, V> {
    get: G,
    get_mut: M,
    _value: PhantomData<fn() -> V>,
}

trait ScalarSlot<R>: Send + Sync {
    fn kind(&self) -> ScalarKind;
    fn render(&self, record: &R, url_encode: bool) -> Option<String>;
    fn assign(&self, record: &mut R, text: &str) -> Result<(), ConversionError>;
}

impl<R, V, G, M> ScalarSlot<R> for Access<G, M, V>
where
    V: Scalar,
    G: Fn(&R) -> &V + Send + Sync,
    M: Fn(&mut R) -> &mut V + Send + Sync,
{
    fn kind(&self) -> ScalarKind {
        V::kind()
    }

    fn render(&self, record: &R, url_encode: bool) -> Option<String> {
        (self.get)(record).render(url_encode)
    }

    fn assign(&self, record: &mut R, text: &str) -> Result<(), ConversionError> {
        *(self.get_mut)(record) = V::from_wire(text)?;
        Ok(())
    }
}

trait DocumentSlot<R>: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn to_json(&self, record: &R) -> serde_json::Result<Vec<u8>>;
    fn from_json(&self, record: &mut R, bytes: &[u8]) -> serde_json::Result<()>;
}

impl<R, V, G, M> DocumentSlot<R> for Access<G, M, V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    G: Fn(&R) -> &V + Send + Sync,
    M: Fn(&mut R) -> &mut V + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        type_name::<V>()
    }

    fn to_json(&self, record: &R) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec((self.get)(record))
    }

    fn from_json(&self, record: &mut R, bytes: &[u8]) -> serde_json::Result<()> {
        *(self.get_mut)(record) = serde_json::from_slice(bytes)?;
        Ok(())
    }
}

trait NestedSlot<R>: Send + Sync {
    fn check(&self) -> Result<(), BindError>;
    fn needs_body(&self) -> bool;
    fn decode(&self, record: &mut R, source: &Inbound<'_>) -> Result<(), BindError>;
    fn encode(&self, record: &R, out: &mut Outbound) -> Result<(), BindError>;
}

impl<R, V, G, M> NestedSlot<R> for Access<G, M, V>
where
    V: Embeddable,
    G: Fn(&R) -> &V + Send + Sync,
    M: Fn(&mut R) -> &mut V + Send + Sync,
{
    fn check(&self) -> Result<(), BindError> {
        flattenable::<V::Target>()?;
        check_fields::<V::Target>()
    }

    fn needs_body(&self) -> bool {
        needs_body::<V::Target>()
    }

    fn decode(&self, record: &mut R, source: &Inbound<'_>) -> Result<(), BindError> {
        flattenable::<V::Target>()?;
        decode_fields((self.get_mut)(record).target_mut(), source)
    }

    fn encode(&self, record: &R, out: &mut Outbound) -> Result<(), BindError> {
        flattenable::<V::Target>()?;
        match (self.get)(record).target() {
            Some(target) => encode_fields(target, out),
            // Absent chains encode as the zero record so required fields still fail.
            None => encode_fields(&V::Target::default(), out),
        }
    }
}

fn flattenable<T: Record>() -> Result<(), BindError> {
    if T::json_body().is_some() {
        return Err(BindError::InvalidTarget {
            type_name: type_name::<T>(),
        });
    }
    Ok(())
}

/// Resolve every directive of `R` (recursively) without touching any data.
pub(crate) fn check_fields<R: Record>() -> Result<(), BindError> {
    for field in R::fields() {
        match &field.slot {
            Slot::Nested(nested) => nested.check()?,
            slot => {
                let Some(directive) = directive::resolve(field.name, field.tags)? else {
                    continue;
                };
                match slot {
                    Slot::Hidden => return Err(BindError::UnexportedField { field: field.name }),
                    Slot::Scalar(_) if directive.location == Location::Body => {
                        return Err(body_on_scalar(field.name));
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Whether any field of `R` (recursively) is bound to the request body.
pub(crate) fn needs_body<R: Record>() -> bool {
    R::fields().iter().any(|field| match &field.slot {
        Slot::Nested(nested) => nested.needs_body(),
        _ => matches!(
            field.directive(),
            Ok(Some(Directive {
                location: Location::Body,
                ..
            }))
        ),
    })
}

/// Populate `record` from the inbound source.
pub(crate) fn decode_fields<R: Record>(record: &mut R, source: &Inbound<'_>) -> Result<(), BindError> {
    for field in R::fields() {
        let Field { name, tags, slot } = field;
        if let Slot::Nested(nested) = &slot {
            nested.decode(record, source)?;
            continue;
        }
        let Some(directive) = directive::resolve(name, tags)? else {
            continue;
        };

        match slot {
            Slot::Hidden => return Err(BindError::UnexportedField { field: name }),
            Slot::Nested(_) => {}
            Slot::Scalar(slot) => {
                if directive.location == Location::Body {
                    return Err(body_on_scalar(name));
                }
                let Some(text) = present(source.text(&directive)?, &directive)? else {
                    continue;
                };
                slot.assign(record, text).map_err(|e| BindError::ConversionFailure {
                    name: directive.name.clone(),
                    text: text.to_string(),
                    kind: slot.kind(),
                    reason: e.reason,
                })?;
            }
            Slot::Document(slot) => {
                if directive.location == Location::Body {
                    let body = source.body().unwrap_or_default();
                    if body.iter().all(u8::is_ascii_whitespace) {
                        if directive.required {
                            return Err(missing(&directive));
                        }
                        continue;
                    }
                    slot.from_json(record, body)
                        .map_err(|e| BindError::MalformedBody {
                            name: directive.name.clone(),
                            source: e,
                        })?;
                    continue;
                }
                let text = present(source.text(&directive)?, &directive)?.unwrap_or_default();
                if !text.is_empty() {
                    return Err(BindError::UnsupportedType {
                        type_name: slot.type_name(),
                        text: text.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Write every bound field of `record` into the outbound request.
pub(crate) fn encode_fields<R: Record>(record: &R, out: &mut Outbound) -> Result<(), BindError> {
    for field in R::fields() {
        let Field { name, tags, slot } = field;
        if let Slot::Nested(nested) = &slot {
            nested.encode(record, out)?;
            continue;
        }
        let Some(directive) = directive::resolve(name, tags)? else {
            continue;
        };

        match slot {
            Slot::Hidden => return Err(BindError::UnexportedField { field: name }),
            Slot::Nested(_) => {}
            Slot::Scalar(slot) => {
                if directive.location == Location::Body {
                    return Err(body_on_scalar(name));
                }
                // The query serializer encodes on its own.
                let url_encode = directive.url_encode && directive.location != Location::Query;
                out.write(&directive, slot.render(record, url_encode))?;
            }
            Slot::Document(slot) => {
                if directive.location == Location::Body {
                    let body = slot.to_json(record).map_err(|source| BindError::MalformedBody {
                        name: directive.name.clone(),
                        source,
                    })?;
                    out.replace_body(body);
                    continue;
                }
                let text = match slot.to_json(record) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        tracing::warn!(
                            field = name,
                            error = %e,
                            "Document field failed to serialize, writing placeholder"
                        );
                        JSON_ERROR_PLACEHOLDER.to_string()
                    }
                };
                out.write(&directive, Some(text))?;
            }
        }
    }
    Ok(())
}

/// Raw wire text after the required check. Absent optional values leave the field
/// untouched; present-but-empty values still convert to the zero value.
fn present<'a>(raw: Option<&'a str>, directive: &Directive) -> Result<Option<&'a str>, BindError> {
    match raw {
        Some(text) if !text.is_empty() => Ok(Some(text)),
        _ if directive.required => Err(missing(directive)),
        other => Ok(other),
    }
}

pub(crate) fn missing(directive: &Directive) -> BindError {
    BindError::RequiredValueMissing {
        name: directive.name.clone(),
        location: directive.location,
    }
}

fn body_on_scalar(field: &'static str) -> BindError {
    BindError::InvalidDirective {
        field,
        directive: "form (body binding needs a document field)".to_string(),
    }
}
