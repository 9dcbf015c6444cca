//! Field directive resolution.
//!
//! # Responsibilities
//! - Parse struct-tag style metadata (`key:"value" key2:"value2"`)
//! - Resolve wire location, wire name, required and url-encode flags
//!
//! # Design Decisions
//! - Short-hand location tags (`path`, `query`, `header`, `cookie`, `formData`) win
//!   over the generic `request` tag when both are present
//! - Name precedence: explicit alias, then structural alias, then declared name
//! - Malformed tag text stops parsing; pairs read before it are kept

use std::fmt;

use crate::binding::error::BindError;

/// Wire location of a bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl Location {
    /// Parse a generic `request` keyword (without the `!` suffix).
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "path" => Some(Location::Path),
            "query" => Some(Location::Query),
            "header" => Some(Location::Header),
            "cookie" => Some(Location::Cookie),
            "form" => Some(Location::Body),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Path => "path",
            Location::Query => "query",
            Location::Header => "header",
            Location::Cookie => "cookie",
            Location::Body => "body",
        };
        f.write_str(s)
    }
}

/// Resolved binding instruction for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub location: Location,
    pub name: String,
    pub required: bool,
    pub url_encode: bool,
}

/// Parsed `key:"value"` pairs of one field, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pairs: Vec<(String, String)>,
}

impl Tags {
    /// Parse a tag string such as `header:"X-Token" required:"true"`.
    pub fn parse(raw: &str) -> Self {
        let mut pairs = Vec::new();
        let mut rest = raw.trim_start();

        while !rest.is_empty() {
            let Some(colon) = rest.find(':') else { break };
            let key = &rest[..colon];
            if key.is_empty() || key.contains(|c: char| c.is_whitespace() || c == '"') {
                break;
            }
            let Some(quoted) = rest[colon + 1..].strip_prefix('"') else {
                break;
            };

            let mut value = String::new();
            let mut chars = quoted.char_indices();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        end = Some(i);
                        break;
                    }
                    _ => value.push(c),
                }
            }
            let Some(end) = end else { break };

            pairs.push((key.to_string(), value));
            rest = quoted[end + 1..].trim_start();
        }

        Self { pairs }
    }

    /// First value stored under `key`, if present.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

const SHORT_HAND: [(&str, Location); 5] = [
    ("path", Location::Path),
    ("query", Location::Query),
    ("formData", Location::Body),
    ("cookie", Location::Cookie),
    ("header", Location::Header),
];

/// Resolve the directive of one field. `Ok(None)` means the field is not bound.
pub fn resolve(field: &'static str, raw_tags: &str) -> Result<Option<Directive>, BindError> {
    let tags = Tags::parse(raw_tags);
    let url_encode = tags.lookup("urlEncode").map(parse_bool).unwrap_or(false);

    if let Some(directive) = resolve_short_hand(field, &tags, url_encode) {
        return Ok(Some(directive));
    }

    let Some(request) = tags.lookup("request").filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let (keyword, required) = match request.strip_suffix('!') {
        Some(keyword) => (keyword, true),
        None => (request, false),
    };
    let location = Location::from_keyword(keyword).ok_or_else(|| BindError::InvalidDirective {
        field,
        directive: request.to_string(),
    })?;

    let structural = tags.lookup("json").and_then(json_alias);
    let name = tags
        .lookup("alias")
        .filter(|a| !a.is_empty())
        .or(structural)
        .unwrap_or(field)
        .to_string();

    Ok(Some(Directive {
        location,
        name,
        required,
        url_encode,
    }))
}

fn resolve_short_hand(field: &'static str, tags: &Tags, url_encode: bool) -> Option<Directive> {
    let required = match tags.lookup("required") {
        Some("") => true,
        Some(value) => parse_bool(value),
        None => false,
    };

    // Last matching short-hand tag wins.
    let (alias, location) = SHORT_HAND
        .iter()
        .filter_map(|(key, location)| tags.lookup(key).map(|alias| (alias, *location)))
        .last()?;

    let name = if alias.is_empty() { field } else { alias };
    Some(Directive {
        location,
        name: name.to_string(),
        required: required && location != Location::Body,
        url_encode,
    })
}

/// Default alias contributed by a `json` tag; `-` and `-,` suppress it.
fn json_alias(tag: &str) -> Option<&str> {
    if tag == "-," {
        return None;
    }
    match tag.split(',').next() {
        Some("-") | Some("") | None => None,
        Some(name) => Some(name),
    }
}

/// Boolean parsing with the accepted spellings of the wire format.
pub(crate) fn parse_bool(text: &str) -> bool {
    matches!(text, "1" | "t" | "T" | "TRUE" | "true" | "True")
}
