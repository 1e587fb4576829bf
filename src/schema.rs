//! Native forms of the credential composer messages and their adapters to
//! and from [`Value`].
//!
//! Expressions see the request as a typed message. Results are accepted
//! either as the typed response message or as a map keyed by field names,
//! and are converted field by field so that every failure names the
//! offending path.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as Json};

use crate::value::json::{from_json_object, to_json_object};
use crate::value::{ConversionError, ConversionResult, FieldPath, MapKey, MessageValue, Value};

pub const PACKAGE: &str = "spire.plugin.server.credentialcomposer.v1";
pub const REQUEST_TYPE: &str =
    "spire.plugin.server.credentialcomposer.v1.ComposeWorkloadJWTSVIDRequest";
pub const RESPONSE_TYPE: &str =
    "spire.plugin.server.credentialcomposer.v1.ComposeWorkloadJWTSVIDResponse";
pub const ATTRIBUTES_TYPE: &str = "spire.plugin.server.credentialcomposer.v1.JWTSVIDAttributes";
pub const STRUCT_TYPE: &str = "google.protobuf.Struct";

/// Claims of a JWT-SVID about to be signed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtSvidAttributes {
    #[serde(default)]
    pub claims: JsonMap<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeWorkloadJwtSvidRequest {
    #[serde(default)]
    pub spiffe_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<JwtSvidAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeWorkloadJwtSvidResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<JwtSvidAttributes>,
}

impl From<&JwtSvidAttributes> for Value {
    fn from(attributes: &JwtSvidAttributes) -> Self {
        Value::message(
            MessageValue::new(ATTRIBUTES_TYPE)
                .with_field("claims", Value::map(from_json_object(&attributes.claims))),
        )
    }
}

impl From<&ComposeWorkloadJwtSvidRequest> for Value {
    fn from(request: &ComposeWorkloadJwtSvidRequest) -> Self {
        let mut message = MessageValue::new(REQUEST_TYPE)
            .with_field("spiffe_id", Value::String(request.spiffe_id.clone()));
        if let Some(attributes) = &request.attributes {
            message = message.with_field("attributes", Value::from(attributes));
        }
        Value::message(message)
    }
}

impl From<&ComposeWorkloadJwtSvidResponse> for Value {
    fn from(response: &ComposeWorkloadJwtSvidResponse) -> Self {
        let mut message = MessageValue::new(RESPONSE_TYPE);
        if let Some(attributes) = &response.attributes {
            message = message.with_field("attributes", Value::from(attributes));
        }
        Value::message(message)
    }
}

impl TryFrom<&Value> for ComposeWorkloadJwtSvidRequest {
    type Error = ConversionError;

    fn try_from(value: &Value) -> ConversionResult<Self> {
        let path = FieldPath::root();
        let fields = message_fields(value, REQUEST_TYPE, &["spiffe_id", "attributes"], &path)?;
        let spiffe_id = match fields.get("spiffe_id") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(unexpected(&path.field("spiffe_id"), "string", other)),
        };
        Ok(Self {
            spiffe_id,
            attributes: optional_attributes(fields.get("attributes"), &path.field("attributes"))?,
        })
    }
}

impl TryFrom<&Value> for ComposeWorkloadJwtSvidResponse {
    type Error = ConversionError;

    fn try_from(value: &Value) -> ConversionResult<Self> {
        let path = FieldPath::root();
        let fields = message_fields(value, RESPONSE_TYPE, &["attributes"], &path)?;
        Ok(Self {
            attributes: optional_attributes(fields.get("attributes"), &path.field("attributes"))?,
        })
    }
}

impl TryFrom<&Value> for JwtSvidAttributes {
    type Error = ConversionError;

    fn try_from(value: &Value) -> ConversionResult<Self> {
        attributes_at(value, &FieldPath::root())
    }
}

fn optional_attributes(
    value: Option<&Value>,
    path: &FieldPath,
) -> ConversionResult<Option<JwtSvidAttributes>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => attributes_at(value, path).map(Some),
    }
}

fn attributes_at(value: &Value, path: &FieldPath) -> ConversionResult<JwtSvidAttributes> {
    let fields = message_fields(value, ATTRIBUTES_TYPE, &["claims"], path)?;
    let claims = match fields.get("claims") {
        None | Some(Value::Null) => JsonMap::new(),
        Some(Value::Map(map)) => to_json_object(map, &path.field("claims"))?,
        Some(other) => return Err(unexpected(&path.field("claims"), STRUCT_TYPE, other)),
    };
    Ok(JwtSvidAttributes { claims })
}

/// Collects the fields of either a typed message named `type_name` or a map
/// keyed by field names. Fields outside `known` are rejected.
fn message_fields(
    value: &Value,
    type_name: &str,
    known: &[&str],
    path: &FieldPath,
) -> ConversionResult<IndexMap<String, Value>> {
    let fields: IndexMap<String, Value> = match value {
        Value::Message(msg) if msg.type_name() == type_name => msg
            .fields()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| match k {
                MapKey::String(name) => Ok((name.clone(), v.clone())),
                other => Err(ConversionError::NonStringKey {
                    path: path.clone(),
                    key: other.to_string(),
                }),
            })
            .collect::<ConversionResult<_>>()?,
        Value::Error(fault) => {
            return Err(ConversionError::ErrorValue {
                path: path.clone(),
                message: fault.to_string(),
            })
        }
        other => return Err(unexpected(path, type_name, other)),
    };

    if let Some(name) = fields.keys().find(|name| !known.contains(&name.as_str())) {
        return Err(ConversionError::UnknownField {
            path: path.field(name),
            type_name: type_name.to_string(),
        });
    }
    Ok(fields)
}

fn unexpected(path: &FieldPath, expected: &str, found: &Value) -> ConversionError {
    match found {
        Value::Error(fault) => ConversionError::ErrorValue {
            path: path.clone(),
            message: fault.to_string(),
        },
        _ => ConversionError::UnexpectedType {
            path: path.clone(),
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        },
    }
}
