//! Structural validation of params against a resolved schema
//!
//! Validation never fails with an `Err`; it produces a [`ValidationContext`]
//! listing every problem found. `disable_schema_validation` suppresses the
//! structural checks but never a property's own `invalid` flag.

use crate::schema::{ListType, Property, PropertyType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single validation problem
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub reason: String,
    /// Dotted path to the offending value (`""` for the root)
    pub path: String,
    /// Raised by a custom resolver rather than by the schema
    #[serde(default)]
    pub custom: bool,
    #[serde(skip)]
    pub property: Option<Property>,
}

/// Result of one validation pass
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    pub invalid: bool,
    pub errors: Vec<ValidationError>,
    #[serde(skip)]
    disable_schema_validation: bool,
}

impl ValidationContext {
    /// Validate `params` against `root`
    pub fn validate(params: &Value, root: &Property, disable_schema_validation: bool) -> Self {
        let mut ctx = Self {
            invalid: false,
            errors: Vec::new(),
            disable_schema_validation,
        };
        ctx.validate_property("", root, params);
        ctx
    }

    /// A context with no errors
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid
    }

    /// Errors at an exact path
    pub fn errors_at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ValidationError> + 'a {
        self.errors.iter().filter(move |error| error.path == path)
    }

    fn validate_property(&mut self, path: &str, property: &Property, value: &Value) {
        if property.invalid {
            let reason = property
                .error_message
                .clone()
                .unwrap_or_else(|| "Invalid property".to_string());
            self.add_error(reason, property, path, true);
        }

        if property.required && value.is_null() {
            self.add_error("Required property", property, path, false);
            return;
        }

        match &property.property_type {
            PropertyType::Enum(enumeration) => {
                if !value.is_null() && !enumeration.values.contains(value) {
                    self.add_error("Invalid enum value", property, path, false);
                }
            }
            PropertyType::Object(object) => {
                if value.is_null() {
                    return;
                }
                let Some(map) = value.as_object() else {
                    self.add_error("Expected an object", property, path, false);
                    return;
                };
                for (name, child) in &object.properties {
                    let child_value = map.get(name).unwrap_or(&Value::Null);
                    self.validate_property(&join(path, name), child, child_value);
                }
            }
            PropertyType::List(list) => self.validate_list(path, property, list, value),
            PropertyType::String => {
                if !value.is_null() && !value.is_string() {
                    self.add_error("Expected a string", property, path, false);
                }
            }
            PropertyType::Number(_) => {
                if !value.is_null() && !value.is_number() {
                    self.add_error("Expected a number", property, path, false);
                }
            }
            PropertyType::Boolean => {
                if !value.is_null() && !value.is_boolean() {
                    self.add_error("Expected a boolean", property, path, false);
                }
            }
            PropertyType::Void
            | PropertyType::OneOf(_)
            | PropertyType::Tuple(_)
            | PropertyType::Map { .. } => {}
        }
    }

    fn validate_list(&mut self, path: &str, property: &Property, list: &ListType, value: &Value) {
        if value.is_null() {
            if list.min_items.is_some() {
                self.add_error("Required list", property, path, false);
            }
            return;
        }

        let Some(items) = value.as_array() else {
            self.add_error("Expected a list", property, path, false);
            return;
        };

        let too_few = list.min_items.is_some_and(|min| items.len() < min);
        let too_many = list.max_items.is_some_and(|max| items.len() > max);
        if too_few || too_many {
            self.add_error("Invalid number of items", property, path, false);
        }

        let element = Property::new((*list.element_type).clone());
        for (index, item) in items.iter().enumerate() {
            self.validate_property(&join(path, &index.to_string()), &element, item);
        }
    }

    fn add_error(&mut self, reason: impl Into<String>, property: &Property, path: &str, custom: bool) {
        if self.disable_schema_validation && !custom {
            return;
        }
        self.errors.push(ValidationError {
            reason: reason.into(),
            path: path.to_string(),
            custom,
            property: Some(property.clone()),
        });
        self.invalid = true;
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}
