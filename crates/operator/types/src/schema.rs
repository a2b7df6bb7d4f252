//! Structural schema for operator inputs and outputs
//!
//! A [`Property`] wraps a [`PropertyType`] with requiredness, a default,
//! view metadata and an optional custom invalid flag. Types form a tree:
//! objects hold named properties, lists hold an element type, and so on.
//!
//! JSON decoding goes through a flat table of type names ([`TYPE_TABLE`]),
//! one decoder per tag. Adding a type means adding a variant and a row.
//!
//! Wire shape of a property:
//!
//! ```json
//! {
//!   "type": { "name": "Object", "properties": { "count": { "type": { "name": "Number" } } } },
//!   "required": true,
//!   "default": null,
//!   "view": { "label": "Count" }
//! }
//! ```

use crate::error::{OperatorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Types ────────────────────────────────────────────────────────────

/// Object type: ordered named child properties
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectType {
    pub properties: Vec<(String, Property)>,
}

impl ObjectType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named property
    pub fn with_property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.define(name, property);
        self
    }

    /// Add (or replace) a named property in place
    pub fn define(&mut self, name: impl Into<String>, property: Property) {
        let name = name.into();
        match self.properties.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = property,
            None => self.properties.push((name, property)),
        }
    }

    pub fn str(self, name: impl Into<String>, required: bool) -> Self {
        self.with_property(name, Property::new(PropertyType::String).required(required))
    }

    pub fn number(self, name: impl Into<String>, required: bool) -> Self {
        self.with_property(name, Property::new(PropertyType::number()).required(required))
    }

    pub fn boolean(self, name: impl Into<String>, required: bool) -> Self {
        self.with_property(name, Property::new(PropertyType::Boolean).required(required))
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, property)| property)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Numeric type with optional bounds
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberType {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub int: bool,
    pub float: bool,
}

/// Homogeneous list type with optional cardinality bounds
#[derive(Clone, Debug, PartialEq)]
pub struct ListType {
    pub element_type: Box<PropertyType>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

/// Closed set of allowed values
#[derive(Clone, Debug, PartialEq)]
pub struct EnumType {
    pub values: Vec<Value>,
}

/// A structural type node
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyType {
    Void,
    Object(ObjectType),
    String,
    Boolean,
    Number(NumberType),
    List(ListType),
    Enum(EnumType),
    OneOf(Vec<PropertyType>),
    Tuple(Vec<PropertyType>),
    Map {
        key_type: Box<PropertyType>,
        value_type: Box<PropertyType>,
    },
}

impl PropertyType {
    pub fn number() -> Self {
        PropertyType::Number(NumberType::default())
    }

    pub fn list(element_type: PropertyType) -> Self {
        PropertyType::List(ListType {
            element_type: Box::new(element_type),
            min_items: None,
            max_items: None,
        })
    }

    pub fn bounded_list(
        element_type: PropertyType,
        min_items: Option<usize>,
        max_items: Option<usize>,
    ) -> Self {
        PropertyType::List(ListType {
            element_type: Box::new(element_type),
            min_items,
            max_items,
        })
    }

    pub fn enumeration<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        PropertyType::Enum(EnumType {
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Tag used on the wire
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyType::Void => "Void",
            PropertyType::Object(_) => "Object",
            PropertyType::String => "String",
            PropertyType::Boolean => "Boolean",
            PropertyType::Number(_) => "Number",
            PropertyType::List(_) => "List",
            PropertyType::Enum(_) => "Enum",
            PropertyType::OneOf(_) => "OneOf",
            PropertyType::Tuple(_) => "Tuple",
            PropertyType::Map { .. } => "Map",
        }
    }

    /// Decode a type node by looking its `name` up in [`TYPE_TABLE`]
    pub fn from_json(value: &Value, path: &str) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| OperatorError::malformed(path, "type must be an object"))?;
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| OperatorError::malformed(path, "type is missing its name"))?;

        let decode = TYPE_TABLE
            .iter()
            .find(|(tag, _)| *tag == name)
            .map(|(_, decode)| *decode)
            .ok_or_else(|| OperatorError::UnknownType(name.to_string()))?;

        decode(object, path)
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("name".into(), Value::from(self.type_name()));
        match self {
            PropertyType::Void | PropertyType::String | PropertyType::Boolean => {}
            PropertyType::Object(obj) => {
                let properties: Map<String, Value> = obj
                    .properties
                    .iter()
                    .map(|(name, property)| (name.clone(), property.to_json()))
                    .collect();
                object.insert("properties".into(), Value::Object(properties));
            }
            PropertyType::Number(number) => {
                if let Some(min) = number.min {
                    object.insert("min".into(), Value::from(min));
                }
                if let Some(max) = number.max {
                    object.insert("max".into(), Value::from(max));
                }
                object.insert("int".into(), Value::Bool(number.int));
                object.insert("float".into(), Value::Bool(number.float));
            }
            PropertyType::List(list) => {
                object.insert("element_type".into(), list.element_type.to_json());
                if let Some(min) = list.min_items {
                    object.insert("min_items".into(), Value::from(min));
                }
                if let Some(max) = list.max_items {
                    object.insert("max_items".into(), Value::from(max));
                }
            }
            PropertyType::Enum(enumeration) => {
                object.insert("values".into(), Value::Array(enumeration.values.clone()));
            }
            PropertyType::OneOf(types) => {
                object.insert(
                    "types".into(),
                    Value::Array(types.iter().map(PropertyType::to_json).collect()),
                );
            }
            PropertyType::Tuple(items) => {
                object.insert(
                    "items".into(),
                    Value::Array(items.iter().map(PropertyType::to_json).collect()),
                );
            }
            PropertyType::Map {
                key_type,
                value_type,
            } => {
                object.insert("key_type".into(), key_type.to_json());
                object.insert("value_type".into(), value_type.to_json());
            }
        }
        Value::Object(object)
    }
}

// ── Type table ───────────────────────────────────────────────────────

type TypeDecoder = fn(&Map<String, Value>, &str) -> Result<PropertyType>;

/// Tag → decoder table used by [`PropertyType::from_json`]
pub const TYPE_TABLE: &[(&str, TypeDecoder)] = &[
    ("Void", decode_void),
    ("Object", decode_object),
    ("String", decode_string),
    ("Boolean", decode_boolean),
    ("Number", decode_number),
    ("List", decode_list),
    ("Enum", decode_enum),
    ("OneOf", decode_one_of),
    ("Tuple", decode_tuple),
    ("Map", decode_map),
];

fn child_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

fn decode_void(_: &Map<String, Value>, _: &str) -> Result<PropertyType> {
    Ok(PropertyType::Void)
}

fn decode_string(_: &Map<String, Value>, _: &str) -> Result<PropertyType> {
    Ok(PropertyType::String)
}

fn decode_boolean(_: &Map<String, Value>, _: &str) -> Result<PropertyType> {
    Ok(PropertyType::Boolean)
}

fn decode_object(object: &Map<String, Value>, path: &str) -> Result<PropertyType> {
    let mut obj = ObjectType::new();
    match object.get("properties") {
        None | Some(Value::Null) => {}
        Some(Value::Object(properties)) => {
            for (name, raw) in properties {
                let property = Property::from_json(raw, &child_path(path, name))?;
                obj.define(name.clone(), property);
            }
        }
        Some(_) => return Err(OperatorError::malformed(path, "properties must be an object")),
    }
    Ok(PropertyType::Object(obj))
}

fn decode_number(object: &Map<String, Value>, _path: &str) -> Result<PropertyType> {
    Ok(PropertyType::Number(NumberType {
        min: object.get("min").and_then(Value::as_f64),
        max: object.get("max").and_then(Value::as_f64),
        int: object.get("int").and_then(Value::as_bool).unwrap_or(false),
        float: object.get("float").and_then(Value::as_bool).unwrap_or(false),
    }))
}

fn decode_list(object: &Map<String, Value>, path: &str) -> Result<PropertyType> {
    let element = object
        .get("element_type")
        .ok_or_else(|| OperatorError::malformed(path, "list is missing element_type"))?;
    Ok(PropertyType::List(ListType {
        element_type: Box::new(PropertyType::from_json(element, path)?),
        min_items: object.get("min_items").and_then(Value::as_u64).map(|n| n as usize),
        max_items: object.get("max_items").and_then(Value::as_u64).map(|n| n as usize),
    }))
}

fn decode_enum(object: &Map<String, Value>, path: &str) -> Result<PropertyType> {
    match object.get("values") {
        Some(Value::Array(values)) => Ok(PropertyType::Enum(EnumType {
            values: values.clone(),
        })),
        _ => Err(OperatorError::malformed(path, "enum values must be an array")),
    }
}

fn decode_type_array(object: &Map<String, Value>, key: &str, path: &str) -> Result<Vec<PropertyType>> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| PropertyType::from_json(item, path))
            .collect(),
        _ => Err(OperatorError::malformed(path, format!("{} must be an array", key))),
    }
}

fn decode_one_of(object: &Map<String, Value>, path: &str) -> Result<PropertyType> {
    decode_type_array(object, "types", path).map(PropertyType::OneOf)
}

fn decode_tuple(object: &Map<String, Value>, path: &str) -> Result<PropertyType> {
    decode_type_array(object, "items", path).map(PropertyType::Tuple)
}

fn decode_map(object: &Map<String, Value>, path: &str) -> Result<PropertyType> {
    let key_type = match object.get("key_type") {
        Some(raw) => PropertyType::from_json(raw, path)?,
        None => PropertyType::String,
    };
    let value_type = object
        .get("value_type")
        .ok_or_else(|| OperatorError::malformed(path, "map is missing value_type"))?;
    Ok(PropertyType::Map {
        key_type: Box::new(key_type),
        value_type: Box::new(PropertyType::from_json(value_type, path)?),
    })
}

// ── Property ─────────────────────────────────────────────────────────

/// Presentation hints attached to a property
///
/// The core only carries these through; rendering belongs to the host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One input/output field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Property {
    pub property_type: PropertyType,
    pub required: bool,
    pub default: Option<Value>,
    /// Set by custom resolvers; always reported, even with schema validation off
    pub invalid: bool,
    pub error_message: Option<String>,
    pub view: Option<View>,
}

impl Property {
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            required: false,
            default: None,
            invalid: false,
            error_message: None,
            view: None,
        }
    }

    /// An object property with no fields
    pub fn empty_object() -> Self {
        Self::new(PropertyType::Object(ObjectType::new()))
    }

    pub fn object(object: ObjectType) -> Self {
        Self::new(PropertyType::Object(object))
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.view = Some(view);
        self
    }

    /// Mark the property invalid with a custom message
    pub fn invalidate(mut self, message: impl Into<String>) -> Self {
        self.invalid = true;
        self.error_message = Some(message.into());
        self
    }

    /// Decode a property (and its whole subtree)
    pub fn from_json(value: &Value, path: &str) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| OperatorError::malformed(path, "property must be an object"))?;
        let raw_type = object
            .get("type")
            .ok_or_else(|| OperatorError::malformed(path, "property is missing its type"))?;

        let view = match object.get("view") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value(raw.clone())
                    .map_err(|e| OperatorError::malformed(path, e.to_string()))?,
            ),
        };

        Ok(Self {
            property_type: PropertyType::from_json(raw_type, path)?,
            required: object.get("required").and_then(Value::as_bool).unwrap_or(false),
            default: object.get("default").filter(|v| !v.is_null()).cloned(),
            invalid: object.get("invalid").and_then(Value::as_bool).unwrap_or(false),
            error_message: object
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::to_string),
            view,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("type".into(), self.property_type.to_json());
        object.insert("required".into(), Value::Bool(self.required));
        if let Some(default) = &self.default {
            object.insert("default".into(), default.clone());
        }
        if self.invalid {
            object.insert("invalid".into(), Value::Bool(true));
        }
        if let Some(message) = &self.error_message {
            object.insert("error_message".into(), Value::from(message.as_str()));
        }
        if let Some(view) = &self.view {
            if let Ok(raw) = serde_json::to_value(view) {
                object.insert("view".into(), raw);
            }
        }
        Value::Object(object)
    }

    /// Child properties when this is an object
    pub fn as_object(&self) -> Option<&ObjectType> {
        match &self.property_type {
            PropertyType::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl TryFrom<Value> for Property {
    type Error = OperatorError;

    fn try_from(value: Value) -> Result<Self> {
        Property::from_json(&value, "")
    }
}

impl From<Property> for Value {
    fn from(property: Property) -> Self {
        property.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_nested_object() {
        let raw = json!({
            "type": {
                "name": "Object",
                "properties": {
                    "name": { "type": { "name": "String" }, "required": true },
                    "tags": {
                        "type": {
                            "name": "List",
                            "element_type": { "name": "String" },
                            "min_items": 1
                        }
                    },
                    "mode": { "type": { "name": "Enum", "values": ["fast", "slow"] }, "default": "fast" }
                }
            },
            "view": { "label": "Export", "componentsProps": { "x": 1 } }
        });

        let property = Property::from_json(&raw, "").unwrap();
        let object = property.as_object().unwrap();
        assert_eq!(object.properties.len(), 3);
        assert!(object.get("name").unwrap().required);

        match &object.get("tags").unwrap().property_type {
            PropertyType::List(list) => {
                assert_eq!(list.min_items, Some(1));
                assert_eq!(*list.element_type, PropertyType::String);
            }
            other => panic!("expected list, got {:?}", other),
        }
        assert_eq!(object.get("mode").unwrap().default, Some(json!("fast")));

        let view = property.view.unwrap();
        assert_eq!(view.label.as_deref(), Some("Export"));
        assert!(view.extra.contains_key("componentsProps"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let raw = json!({ "type": { "name": "Matrix" } });
        let err = Property::from_json(&raw, "").unwrap_err();
        assert!(matches!(err, OperatorError::UnknownType(name) if name == "Matrix"));
    }

    #[test]
    fn test_malformed_reports_path() {
        let raw = json!({
            "type": {
                "name": "Object",
                "properties": { "inner": { "type": { "name": "List" } } }
            }
        });
        match Property::from_json(&raw, "").unwrap_err() {
            OperatorError::MalformedSchema { path, .. } => assert_eq!(path, "inner"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_every_table_entry_has_matching_tag() {
        let samples = [
            PropertyType::Void,
            PropertyType::Object(ObjectType::new()),
            PropertyType::String,
            PropertyType::Boolean,
            PropertyType::number(),
            PropertyType::list(PropertyType::Boolean),
            PropertyType::enumeration(["a"]),
            PropertyType::OneOf(vec![PropertyType::String]),
            PropertyType::Tuple(vec![PropertyType::String, PropertyType::number()]),
            PropertyType::Map {
                key_type: Box::new(PropertyType::String),
                value_type: Box::new(PropertyType::number()),
            },
        ];
        assert_eq!(samples.len(), TYPE_TABLE.len());
        for sample in samples {
            let decoded = PropertyType::from_json(&sample.to_json(), "").unwrap();
            assert_eq!(decoded.type_name(), sample.type_name());
        }
    }

    #[test]
    fn test_define_replaces_existing() {
        let object = ObjectType::new()
            .str("a", false)
            .with_property("a", Property::new(PropertyType::Boolean));
        assert_eq!(object.properties.len(), 1);
        assert_eq!(object.get("a").unwrap().property_type, PropertyType::Boolean);
    }

    #[test]
    fn test_serde_goes_through_wire_shape() {
        let property: Property =
            serde_json::from_value(json!({ "type": { "name": "String" }, "invalid": true, "error_message": "taken" }))
                .unwrap();
        assert!(property.invalid);
        assert_eq!(property.error_message.as_deref(), Some("taken"));
        let back = serde_json::to_value(&property).unwrap();
        assert_eq!(back["type"]["name"], "String");
    }
}
