//! Raw specification types matching the JSON spec file.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Specification {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub driver: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password; wins over `password`.
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("name", &self.name)
            .field("type", &self.type_)
            .field("driver", &self.driver)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub table_name: String,
    pub methods: Vec<String>,
    pub model: ModelConfig,
    pub backing_service: String,
    /// Path segment override; defaults to the lowercased resource name.
    #[serde(default)]
    pub path: Option<String>,
}

/// Field declarations in the order they appear in the spec file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ModelConfig(pub Vec<(String, FieldSpec)>);

impl<'de> Deserialize<'de> for ModelConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedFields;

        impl<'de> Visitor<'de> for OrderedFields {
            type Value = ModelConfig;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field name to field type")
            }

            fn visit_map<A>(self, mut access: A) -> Result<ModelConfig, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields: Vec<(String, FieldSpec)> = Vec::new();
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    if fields.iter().any(|(n, _)| *n == name) {
                        return Err(serde::de::Error::custom(format!(
                            "field '{}' declared twice",
                            name
                        )));
                    }
                    fields.push((name, spec));
                }
                Ok(ModelConfig(fields))
            }
        }

        deserializer.deserialize_map(OrderedFields)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub type_: String,
    pub nullable: bool,
    pub default: Option<serde_json::Value>,
    pub generated: Option<String>,
}

impl<'de> Deserialize<'de> for FieldSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => Ok(FieldSpec {
                type_: s,
                ..FieldSpec::default()
            }),
            serde_json::Value::Object(mut obj) => {
                let type_ = match obj.remove("type") {
                    Some(serde_json::Value::String(s)) => s,
                    _ => {
                        return Err(serde::de::Error::custom(
                            "field object must carry a string \"type\"",
                        ))
                    }
                };
                let nullable = match obj.remove("nullable") {
                    None => false,
                    Some(serde_json::Value::Bool(b)) => b,
                    Some(_) => return Err(serde::de::Error::custom("\"nullable\" must be a boolean")),
                };
                let generated = match obj.remove("generated") {
                    None => None,
                    Some(serde_json::Value::String(s)) => Some(s),
                    Some(_) => return Err(serde::de::Error::custom("\"generated\" must be a string")),
                };
                let default = obj.remove("default");
                if let Some(key) = obj.keys().next() {
                    return Err(serde::de::Error::custom(format!(
                        "unknown field attribute '{}'",
                        key
                    )));
                }
                Ok(FieldSpec {
                    type_,
                    nullable,
                    default,
                    generated,
                })
            }
            other => Err(serde::de::Error::custom(format!(
                "field must be a type name or {{ \"type\": \"...\" }}; got {}",
                type_name_of_json(&other)
            ))),
        }
    }
}

fn type_name_of_json(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
