//! Wire codec.
//!
//! Translates a typed [`Descriptor`] into the JSON body an OPNsense controller
//! expects, and an API answer back into typed attributes. This is the only
//! place that knows about string booleans, dotted or hyphenated keys, and
//! option-selection maps. All of it is driven by the kind's [`KindSchema`].
//!
//! [`KindSchema`]: crate::schema::KindSchema

use crate::schema::{Encoding, FieldSpec};
use crate::types::{Attributes, Descriptor, FieldType, FieldValue, ResourceKind};
use serde_json::{Map, Value, json};

/// Build the request body for an `add_*` or `set_*` call.
///
/// Pure and total: fields are visited in table order, so when two attributes
/// share a wire key the later one wins. Computed attributes are never sent.
/// Absent attributes with a default send the default.
///
/// ```
/// use opnsense::{Attributes, Descriptor, ResourceKind, codec};
///
/// let rule = Descriptor::new(ResourceKind::FirewallRule, Attributes::new())
///     .with("enabled", false)
///     .with("log", true)
///     .with("categories", vec!["a".to_string(), String::new(), "b".to_string()]);
/// let body = codec::encode(&rule);
/// assert_eq!(body["rule"]["enabled"], "0");
/// assert_eq!(body["rule"]["log"], "1");
/// assert_eq!(body["rule"]["category"], "a,b");
/// ```
#[must_use]
pub fn encode(descriptor: &Descriptor) -> Value {
    let schema = descriptor.kind.schema();
    let mut fields = Map::new();

    for field in schema.fields {
        if !field.presence.is_settable() {
            continue;
        }
        let wire = match descriptor.attributes.get(field.name) {
            Some(value) => encode_value(field, value),
            None => field.default.map(|text| Value::String(text.to_string())),
        };
        if let Some(wire) = wire {
            fields.insert(field.wire.to_string(), wire);
        }
    }

    let mut body = Map::new();
    body.insert(schema.envelope.to_string(), Value::Object(fields));
    Value::Object(body)
}

/// Wire form of one attribute value, `None` when the key must be omitted.
#[must_use]
pub fn encode_value(field: &FieldSpec, value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Bool(b) => match field.encoding {
            Encoding::Inverted => Some(bool_text(!*b)),
            Encoding::FlagWhenTrue => b.then(|| bool_text(true)),
            Encoding::Plain | Encoding::KeaOptionData => Some(bool_text(*b)),
        },
        FieldValue::Int(i) => Some(Value::String(i.to_string())),
        FieldValue::String(s) => Some(Value::String(s.clone())),
        FieldValue::List(items) => {
            let joined = join_list(items);
            (!joined.is_empty()).then_some(Value::String(joined))
        }
        FieldValue::Map(map) => {
            let encoded: Map<String, Value> = match field.encoding {
                Encoding::KeaOptionData => map
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.replace('-', "_"),
                            json!({ "": { "value": v, "selected": 1 } }),
                        )
                    })
                    .collect(),
                _ => map
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            };
            Some(Value::Object(encoded))
        }
    }
}

/// Extract typed attributes from an API answer.
///
/// Reads the object under the kind's envelope key, or the top level when the
/// envelope is missing. Keys that are absent or carry unparsable text are
/// skipped. The result is a partial update; apply it with [`merge`].
#[must_use]
pub fn decode(kind: ResourceKind, response: &Value) -> Attributes {
    let schema = kind.schema();
    let source = match response.get(schema.envelope) {
        Some(Value::Object(inner)) => inner,
        _ => match response {
            Value::Object(top) => top,
            _ => return Attributes::new(),
        },
    };

    let mut update = Attributes::new();
    for field in schema.fields {
        if field.encoding == Encoding::KeaOptionData {
            continue;
        }
        let Some(text) = source.get(field.wire).and_then(wire_text) else {
            continue;
        };
        if let Some(value) = decode_text(field, &text) {
            update.insert(field.name.to_string(), value);
        }
    }
    update
}

/// Apply a decoded update onto a descriptor.
///
/// Attributes missing from `update` keep their tracked value. Deprecated
/// aliases are only refreshed when the descriptor already tracks them.
pub fn merge(descriptor: &mut Descriptor, update: Attributes) {
    let schema = descriptor.kind.schema();
    for (name, value) in update {
        let Some(field) = schema.field(&name) else {
            continue;
        };
        if field.deprecated && !descriptor.attributes.contains_key(&name) {
            continue;
        }
        descriptor.attributes.insert(name, value);
    }
}

/// Copy of an encoded body with sensitive wire keys masked, for logging.
#[must_use]
pub fn redact(kind: ResourceKind, body: &Value) -> Value {
    let schema = kind.schema();
    let mut redacted = body.clone();
    if let Some(Value::Object(fields)) = redacted.get_mut(schema.envelope) {
        for field in schema.fields.iter().filter(|f| f.sensitive) {
            if let Some(value) = fields.get_mut(field.wire) {
                *value = Value::String("********".to_string());
            }
        }
    }
    redacted
}

/// Canonical value of an attribute for comparison, falling back to the
/// field default when unset.
#[must_use]
pub fn effective(field: &FieldSpec, attributes: &Attributes) -> Option<FieldValue> {
    match attributes.get(field.name) {
        Some(FieldValue::List(items)) => Some(FieldValue::List(
            items.iter().filter(|s| !s.is_empty()).cloned().collect(),
        )),
        Some(FieldValue::Int(i)) if field.ty == FieldType::String => {
            Some(FieldValue::String(i.to_string()))
        }
        Some(value) => Some(value.clone()),
        None => field.default.and_then(|text| decode_text(field, text)),
    }
}

/// Whether a deprecated alias is overwritten on the wire by a later field
/// sharing its key, so its own value never reaches the appliance.
#[must_use]
pub fn shadowed(kind: ResourceKind, field: &FieldSpec, attributes: &Attributes) -> bool {
    if !field.deprecated {
        return false;
    }
    kind.schema()
        .fields
        .iter()
        .skip_while(|f| f.name != field.name)
        .skip(1)
        .any(|later| later.wire == field.wire && effective(later, attributes).is_some())
}

/// Typed value from wire text.
fn decode_text(field: &FieldSpec, text: &str) -> Option<FieldValue> {
    match field.ty {
        FieldType::String => Some(FieldValue::String(text.to_string())),
        FieldType::Bool => {
            let raw = match text {
                "1" => true,
                "0" => false,
                _ => return None,
            };
            Some(FieldValue::Bool(match field.encoding {
                Encoding::Inverted => !raw,
                _ => raw,
            }))
        }
        FieldType::Int => text.trim().parse().ok().map(FieldValue::Int),
        FieldType::List => Some(FieldValue::List(
            text.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        FieldType::Map => None,
    }
}

/// Flatten a wire value to text.
///
/// OPNsense answers `get_*` calls with option maps for select fields:
/// `{"lan": {"value": "LAN", "selected": 1}, ...}`. Those flatten to the
/// comma-joined selected keys.
fn wire_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(options) => Some(
            options
                .iter()
                .filter(|(key, option)| !key.is_empty() && is_selected(option))
                .map(|(key, _)| key.as_str())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null => None,
    }
}

fn is_selected(option: &Value) -> bool {
    match option.get("selected") {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "1",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

fn bool_text(b: bool) -> Value {
    Value::String(if b { "1" } else { "0" }.to_string())
}

fn join_list(items: &[String]) -> String {
    items
        .iter()
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
