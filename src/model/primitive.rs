//! The closed set of primitive kinds and their wire classification.

use once_cell::sync::Lazy;
use regex::Regex;

/// Primitive datatype kinds.
///
/// The boolean and numeric kinds encode as unquoted JSON tokens; every other
/// kind encodes as a quoted, escaped string. Anything outside this set is
/// rejected as an unsupported element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Integer,
    Decimal,
    UnsignedInt,
    PositiveInt,
    String,
    Uri,
    Url,
    Canonical,
    Base64Binary,
    Instant,
    Date,
    DateTime,
    Time,
    Code,
    Oid,
    Id,
    Markdown,
    Uuid,
}

static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static UNSIGNED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(0|[1-9]\d*)$").unwrap());
static POSITIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9]\d*$").unwrap());
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?(0|[1-9]\d*)(\.\d+)?([eE][+-]?\d+)?$").unwrap());
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12]\d|3[01]))?)?$").unwrap());
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:([0-5]\d|60)(\.\d+)?$").unwrap());
static DATE_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12]\d|3[01])(T([01]\d|2[0-3]):[0-5]\d:([0-5]\d|60)(\.\d+)?(Z|[+-]((0\d|1[0-3]):[0-5]\d|14:00))?)?)?)?$",
    )
    .unwrap()
});
static INSTANT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])T([01]\d|2[0-3]):[0-5]\d:([0-5]\d|60)(\.\d+)?(Z|[+-]((0\d|1[0-3]):[0-5]\d|14:00))$",
    )
    .unwrap()
});
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").unwrap());
static OID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^urn:oid:[0-2](\.(0|[1-9]\d*))+$").unwrap());
static UUID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^urn:uuid:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap());
static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s]+( [^\s]+)*$").unwrap());
static BASE64_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/\s]*={0,2}$").unwrap());

impl PrimitiveKind {
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "decimal" => Self::Decimal,
            "unsignedInt" => Self::UnsignedInt,
            "positiveInt" => Self::PositiveInt,
            "string" => Self::String,
            "uri" => Self::Uri,
            "url" => Self::Url,
            "canonical" => Self::Canonical,
            "base64Binary" => Self::Base64Binary,
            "instant" => Self::Instant,
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            "time" => Self::Time,
            "code" => Self::Code,
            "oid" => Self::Oid,
            "id" => Self::Id,
            "markdown" => Self::Markdown,
            "uuid" => Self::Uuid,
            _ => return None,
        })
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::UnsignedInt => "unsignedInt",
            Self::PositiveInt => "positiveInt",
            Self::String => "string",
            Self::Uri => "uri",
            Self::Url => "url",
            Self::Canonical => "canonical",
            Self::Base64Binary => "base64Binary",
            Self::Instant => "instant",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Time => "time",
            Self::Code => "code",
            Self::Oid => "oid",
            Self::Id => "id",
            Self::Markdown => "markdown",
            Self::Uuid => "uuid",
        }
    }

    /// Whether this kind serializes as an unquoted JSON token.
    pub fn is_json_literal(&self) -> bool {
        matches!(
            self,
            Self::Boolean | Self::Integer | Self::Decimal | Self::UnsignedInt | Self::PositiveInt
        )
    }

    /// Check a textual value against the kind's lexical rules.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Boolean => value == "true" || value == "false",
            Self::Integer => INTEGER_RE.is_match(value),
            Self::UnsignedInt => UNSIGNED_RE.is_match(value),
            Self::PositiveInt => POSITIVE_RE.is_match(value),
            Self::Decimal => DECIMAL_RE.is_match(value),
            Self::Date => DATE_RE.is_match(value),
            Self::DateTime => DATE_TIME_RE.is_match(value),
            Self::Time => TIME_RE.is_match(value),
            Self::Instant => INSTANT_RE.is_match(value),
            Self::Id => ID_RE.is_match(value),
            Self::Oid => OID_RE.is_match(value),
            Self::Uuid => UUID_RE.is_match(value),
            Self::Code => CODE_RE.is_match(value),
            Self::Base64Binary => BASE64_RE.is_match(value),
            // string, uri, url, canonical, markdown accept any non-empty text
            _ => !value.is_empty(),
        }
    }
}
