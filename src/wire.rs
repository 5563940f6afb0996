//! The tagged wire format of the backing table.
//!
//! Every stored value travels as a JSON object with exactly one
//! discriminator key: `S` (string), `N` (number as decimal text),
//! `BOOL`, `NULL`, `B` (base64 bytes), `L` (list), `M` (map), and the
//! typed sets `SS`/`NS`/`BS`. This layout is the persisted record
//! format and must stay exact so that other readers of the same table
//! keep interoperating.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map as JsonMap, Value as Json};
use thiserror::Error;

use crate::value::{Number, SetError, SetKind, SetMember, Value, ValueSet};

/// The partition key attribute of every stored record.
pub const KEY_ATTR: &str = "key";
/// The attribute holding the encoded value of a record.
pub const VALUE_ATTR: &str = "value";
/// Optional Unix-epoch-seconds attribute after which the backend may
/// autonomously remove a record. Expiry is never enforced client-side.
pub const TTL_ATTR: &str = "ttl";

/// A stored record: attribute name to wire value.
pub type Item = HashMap<String, WireValue>;

/// Errors raised while converting between values and wire values.
#[derive(Error, Debug, PartialEq)]
pub enum WireError {
    #[error(transparent)]
    Set(#[from] SetError),
    #[error("expected wire value to have exactly one discriminator key, found {0}")]
    Discriminators(usize),
    #[error("expected wire value to be an object")]
    NotAnObject,
    #[error("malformed payload for {tag} wire value")]
    Malformed { tag: &'static str },
    #[error("invalid decimal text {0:?} in N wire value")]
    Number(String),
    #[error("invalid base64 payload in {tag} wire value")]
    Base64 { tag: &'static str },
}

/// One value in the backend's tagged external representation.
///
/// Numeric payloads are kept as their decimal text and byte payloads
/// as their base64 text, exactly as they appear on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    S(String),
    N(String),
    Bool(bool),
    Null,
    B(String),
    L(Vec<WireValue>),
    M(HashMap<String, WireValue>),
    Ss(Vec<String>),
    Ns(Vec<String>),
    Bs(Vec<String>),
}

impl WireValue {
    /// The discriminator key this value is tagged with.
    pub fn tag(&self) -> &'static str {
        match self {
            WireValue::S(_) => "S",
            WireValue::N(_) => "N",
            WireValue::Bool(_) => "BOOL",
            WireValue::Null => "NULL",
            WireValue::B(_) => "B",
            WireValue::L(_) => "L",
            WireValue::M(_) => "M",
            WireValue::Ss(_) => "SS",
            WireValue::Ns(_) => "NS",
            WireValue::Bs(_) => "BS",
        }
    }

    /// Renders the single-discriminator JSON object for this value.
    pub fn to_json(&self) -> Json {
        match self {
            WireValue::S(s) => json!({ "S": s }),
            WireValue::N(n) => json!({ "N": n }),
            WireValue::Bool(b) => json!({ "BOOL": b }),
            WireValue::Null => json!({ "NULL": true }),
            WireValue::B(b) => json!({ "B": b }),
            WireValue::L(elements) => {
                Json::Object(single("L", Json::Array(elements.iter().map(WireValue::to_json).collect())))
            }
            WireValue::M(entries) => {
                let object: JsonMap<String, Json> = entries
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect();
                Json::Object(single("M", Json::Object(object)))
            }
            WireValue::Ss(members) => json!({ "SS": members }),
            WireValue::Ns(members) => json!({ "NS": members }),
            WireValue::Bs(members) => json!({ "BS": members }),
        }
    }

    /// Reads a wire value back out of its JSON form.
    ///
    /// The object must carry exactly one recognized discriminator key;
    /// zero or two-plus recognized keys is a decode error. Byte
    /// payloads accept base64 text or an already-decoded byte array,
    /// so re-reading material a transport has eagerly decoded stays
    /// lossless.
    pub fn from_json(json: &Json) -> Result<Self, WireError> {
        let object = json.as_object().ok_or(WireError::NotAnObject)?;

        const TAGS: [&str; 10] = ["S", "N", "BOOL", "NULL", "B", "L", "M", "SS", "NS", "BS"];
        let mut recognized = object.keys().filter(|key| TAGS.contains(&key.as_str()));

        let tag = match (recognized.next(), recognized.next()) {
            (Some(tag), None) => tag.as_str(),
            (None, _) => return Err(WireError::Discriminators(0)),
            (Some(_), Some(_)) => return Err(WireError::Discriminators(2 + recognized.count())),
        };
        let payload = &object[tag];

        match tag {
            "S" => as_string(payload, "S").map(WireValue::S),
            "N" => as_string(payload, "N").map(WireValue::N),
            "BOOL" => payload
                .as_bool()
                .map(WireValue::Bool)
                .ok_or(WireError::Malformed { tag: "BOOL" }),
            "NULL" => Ok(WireValue::Null),
            "B" => as_base64(payload, "B").map(WireValue::B),
            "L" => {
                let elements = payload.as_array().ok_or(WireError::Malformed { tag: "L" })?;
                let elements: Result<Vec<_>, _> = elements.iter().map(WireValue::from_json).collect();
                Ok(WireValue::L(elements?))
            }
            "M" => {
                let entries = payload.as_object().ok_or(WireError::Malformed { tag: "M" })?;
                let entries: Result<HashMap<_, _>, _> = entries
                    .iter()
                    .map(|(name, value)| WireValue::from_json(value).map(|v| (name.clone(), v)))
                    .collect();
                Ok(WireValue::M(entries?))
            }
            "SS" => as_string_array(payload, "SS").map(WireValue::Ss),
            "NS" => as_string_array(payload, "NS").map(WireValue::Ns),
            "BS" => {
                let members = payload.as_array().ok_or(WireError::Malformed { tag: "BS" })?;
                let members: Result<Vec<_>, _> =
                    members.iter().map(|m| as_base64(m, "BS")).collect();
                Ok(WireValue::Bs(members?))
            }
            _ => unreachable!("tag filtered against the recognized set"),
        }
    }
}

impl Serialize for WireValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WireValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        WireValue::from_json(&json).map_err(D::Error::custom)
    }
}

fn single(tag: &str, payload: Json) -> JsonMap<String, Json> {
    let mut object = JsonMap::with_capacity(1);
    object.insert(tag.to_string(), payload);
    object
}

fn as_string(payload: &Json, tag: &'static str) -> Result<String, WireError> {
    payload
        .as_str()
        .map(str::to_string)
        .ok_or(WireError::Malformed { tag })
}

fn as_string_array(payload: &Json, tag: &'static str) -> Result<Vec<String>, WireError> {
    let members = payload.as_array().ok_or(WireError::Malformed { tag })?;
    members.iter().map(|m| as_string(m, tag)).collect()
}

/// Accepts base64 text as-is, or an already-decoded byte array which is
/// re-encoded so the in-memory wire value stays in its wire shape.
fn as_base64(payload: &Json, tag: &'static str) -> Result<String, WireError> {
    match payload {
        Json::String(text) => Ok(text.clone()),
        Json::Array(bytes) => {
            let bytes: Option<Vec<u8>> = bytes
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            let bytes = bytes.ok_or(WireError::Malformed { tag })?;
            Ok(BASE64.encode(bytes))
        }
        _ => Err(WireError::Malformed { tag }),
    }
}

/// Encodes a value into its tagged wire representation.
///
/// Set homogeneity is guaranteed by [`ValueSet`] construction, so the
/// conversion itself cannot fail: the whole value domain has a wire
/// form.
pub fn encode(value: &Value) -> WireValue {
    match value {
        Value::String(s) => WireValue::S(s.clone()),
        Value::Number(n) => WireValue::N(n.to_string()),
        Value::Bool(b) => WireValue::Bool(*b),
        Value::Null => WireValue::Null,
        Value::Bytes(b) => WireValue::B(BASE64.encode(b)),
        Value::List(elements) => WireValue::L(elements.iter().map(encode).collect()),
        Value::Map(entries) => WireValue::M(
            entries
                .iter()
                .map(|(name, value)| (name.clone(), encode(value)))
                .collect(),
        ),
        Value::Set(set) => encode_set(set),
    }
}

fn encode_set(set: &ValueSet) -> WireValue {
    match set.kind() {
        SetKind::String => WireValue::Ss(
            set.members()
                .iter()
                .map(|m| match m {
                    SetMember::String(s) => s.clone(),
                    _ => unreachable!("ValueSet construction validates homogeneity"),
                })
                .collect(),
        ),
        SetKind::Number => WireValue::Ns(
            set.members()
                .iter()
                .map(|m| match m {
                    SetMember::Number(n) => n.to_string(),
                    _ => unreachable!("ValueSet construction validates homogeneity"),
                })
                .collect(),
        ),
        SetKind::Bytes => WireValue::Bs(
            set.members()
                .iter()
                .map(|m| match m {
                    SetMember::Bytes(b) => BASE64.encode(b),
                    _ => unreachable!("ValueSet construction validates homogeneity"),
                })
                .collect(),
        ),
    }
}

/// Decodes a tagged wire value back into the value domain.
pub fn decode(wire: &WireValue) -> Result<Value, WireError> {
    match wire {
        WireValue::S(s) => Ok(Value::String(s.clone())),
        WireValue::N(text) => parse_number(text).map(Value::Number),
        WireValue::Bool(b) => Ok(Value::Bool(*b)),
        WireValue::Null => Ok(Value::Null),
        WireValue::B(b) => decode_base64(b, "B").map(|b| Value::Bytes(Bytes::from(b))),
        WireValue::L(elements) => {
            let elements: Result<Vec<_>, _> = elements.iter().map(decode).collect();
            Ok(Value::List(elements?))
        }
        WireValue::M(entries) => {
            let entries: Result<HashMap<_, _>, _> = entries
                .iter()
                .map(|(name, value)| decode(value).map(|v| (name.clone(), v)))
                .collect();
            Ok(Value::Map(entries?))
        }
        WireValue::Ss(members) => {
            let members = members.iter().map(|m| SetMember::String(m.clone())).collect();
            Ok(Value::Set(ValueSet::new(members)?))
        }
        WireValue::Ns(members) => {
            let members: Result<Vec<_>, _> = members
                .iter()
                .map(|m| parse_number(m).map(SetMember::Number))
                .collect();
            Ok(Value::Set(ValueSet::new(members?)?))
        }
        WireValue::Bs(members) => {
            let members: Result<Vec<_>, _> = members
                .iter()
                .map(|m| decode_base64(m, "BS").map(|b| SetMember::Bytes(Bytes::from(b))))
                .collect();
            Ok(Value::Set(ValueSet::new(members?)?))
        }
    }
}

fn parse_number(text: &str) -> Result<Number, WireError> {
    Number::parse(text).map_err(|_| WireError::Number(text.to_string()))
}

fn decode_base64(text: &str, tag: &'static str) -> Result<Vec<u8>, WireError> {
    BASE64.decode(text).map_err(|_| WireError::Base64 { tag })
}

/// Builds the key item `{ key: { S: <key> } }` addressing one record.
pub fn key_item(key: &str) -> Item {
    let mut item = Item::with_capacity(1);
    item.insert(KEY_ATTR.to_string(), WireValue::S(key.to_string()));
    item
}

/// Builds a full record item: key, encoded value and optional TTL.
pub fn record(key: &str, value: &Value, ttl: Option<u64>) -> Item {
    let mut item = Item::with_capacity(3);
    item.insert(KEY_ATTR.to_string(), WireValue::S(key.to_string()));
    item.insert(VALUE_ATTR.to_string(), encode(value));
    if let Some(ttl) = ttl {
        item.insert(TTL_ATTR.to_string(), WireValue::N(ttl.to_string()));
    }
    item
}

/// Decodes the `value` attribute of a record, if the record and the
/// attribute are both present.
pub fn decode_value_attr(item: &Item) -> Result<Option<Value>, WireError> {
    item.get(VALUE_ATTR).map(decode).transpose()
}
