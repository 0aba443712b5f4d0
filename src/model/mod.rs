//! Model synthesis: one descriptor table per resource drives decoding,
//! defaulting and serialization for every resource through the same code.

mod record;
mod value;

pub use record::Record;
pub use value::{now, FieldType, FieldValue};

use crate::config::ResourceDefinition;
use crate::error::ValidationError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the identifier field every resource declares.
pub const ID_FIELD: &str = "id";

#[derive(Clone, Debug, PartialEq)]
pub enum FieldDefault {
    Literal(FieldValue),
    GenerateUuid,
    /// Set on create.
    Now,
    /// Set on create and refreshed on every patch.
    NowOnUpdate,
}

impl FieldDefault {
    fn produce(&self) -> FieldValue {
        match self {
            FieldDefault::Literal(v) => v.clone(),
            FieldDefault::GenerateUuid => FieldValue::Uuid(Uuid::new_v4()),
            FieldDefault::Now | FieldDefault::NowOnUpdate => FieldValue::Timestamp(now()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub nullable: bool,
    pub default: Option<FieldDefault>,
}

impl Field {
    pub fn is_secret(&self) -> bool {
        self.ty == FieldType::Secret
    }

    pub fn is_id(&self) -> bool {
        self.name == ID_FIELD
    }

    fn coerce(&self, v: &Value) -> Result<FieldValue, ValidationError> {
        if v.is_null() {
            return if self.nullable {
                Ok(FieldValue::Null)
            } else {
                Err(ValidationError::new(&self.name, "must not be null"))
            };
        }
        self.ty
            .coerce(v)
            .map_err(|reason| ValidationError::new(&self.name, reason))
    }
}

#[derive(Clone, Debug)]
pub struct Model {
    fields: Arc<[Field]>,
}

impl Model {
    pub fn for_resource(def: &ResourceDefinition) -> Self {
        Model {
            fields: def.fields.clone(),
        }
    }

    /// Decode a POST body. Every declared field is taken from the body or defaulted;
    /// undeclared keys are dropped.
    pub fn decode_create(&self, body: &Value) -> Result<Instance, ValidationError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ValidationError::new("body", "must be a JSON object"))?;
        let mut values = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            // An explicit null on a defaulted, non-nullable field asks for the default.
            let supplied = obj
                .get(&field.name)
                .filter(|v| !(v.is_null() && !field.nullable && field.default.is_some()));
            let v = match (supplied, &field.default) {
                (Some(v), _) => field.coerce(v)?,
                (None, Some(default)) => default.produce(),
                (None, None) if field.nullable => FieldValue::Null,
                (None, None) => return Err(ValidationError::new(&field.name, "is required")),
            };
            values.push(v);
        }
        Ok(Instance {
            fields: self.fields.clone(),
            values,
        })
    }

    /// Decode a PATCH body into the declared fields it supplies. `id` never changes.
    pub fn decode_patch(&self, body: &Value) -> Result<Changeset, ValidationError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ValidationError::new("body", "must be a JSON object"))?;
        let mut entries = Vec::new();
        for (idx, field) in self.fields.iter().enumerate() {
            if field.is_id() {
                continue;
            }
            match obj.get(&field.name) {
                Some(v) => entries.push((idx, field.coerce(v)?)),
                None if field.default == Some(FieldDefault::NowOnUpdate) => {
                    entries.push((idx, FieldValue::Timestamp(now())))
                }
                None => {}
            }
        }
        Ok(Changeset {
            fields: self.fields.clone(),
            entries,
        })
    }

    /// Project a stored record onto the declared fields.
    pub fn from_record(&self, record: &Record) -> Result<Instance, ValidationError> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            let v = record
                .get(&field.name)
                .ok_or_else(|| ValidationError::new(&field.name, "missing from stored record"))?;
            if v.is_null() && !field.nullable {
                return Err(ValidationError::new(&field.name, "stored value is null"));
            }
            if !field.ty.accepts(v) {
                return Err(ValidationError::new(
                    &field.name,
                    format!("stored value is not of type {}", field.ty),
                ));
            }
            values.push(v.clone());
        }
        Ok(Instance {
            fields: self.fields.clone(),
            values,
        })
    }

    pub fn parse_id(&self, raw: &str) -> Result<Uuid, ValidationError> {
        Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::new(ID_FIELD, "must be a UUID"))
    }
}

/// A fully decoded record: one value per declared field, in declaration order.
#[derive(Clone, PartialEq)]
pub struct Instance {
    fields: Arc<[Field]>,
    values: Vec<FieldValue>,
}

impl Instance {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| &self.values[i])
    }

    pub fn id(&self) -> Option<Uuid> {
        self.get(ID_FIELD).and_then(FieldValue::as_uuid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &FieldValue)> {
        self.fields.iter().zip(self.values.iter())
    }
}

impl Serialize for Instance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(&field.name, value)?;
        }
        map.end()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        redacted(f, self.iter())
    }
}

/// The declared fields a PATCH supplies, in declaration order.
#[derive(Clone)]
pub struct Changeset {
    fields: Arc<[Field]>,
    entries: Vec<(usize, FieldValue)>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &FieldValue)> {
        self.entries.iter().map(|(i, v)| (&self.fields[*i], v))
    }
}

impl fmt::Debug for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        redacted(f, self.iter())
    }
}

fn redacted<'a>(
    f: &mut fmt::Formatter<'_>,
    entries: impl Iterator<Item = (&'a Field, &'a FieldValue)>,
) -> fmt::Result {
    let mut m = f.debug_map();
    for (field, value) in entries {
        if field.is_secret() {
            m.entry(&field.name, &"<redacted>");
        } else {
            m.entry(&field.name, value);
        }
    }
    m.finish()
}
