//! Load the spec file and resolve it into runtime definitions.

use crate::config::resolved::{Driver, ResolvedSpec, ResourceDefinition, ServiceDefinition};
use crate::config::types::*;
use crate::config::{check_path_segment, validate};
use crate::error::ConfigError;
use crate::model::{Field, FieldDefault, FieldType, FieldValue, ID_FIELD};
use crate::operation::Operation;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Segments taken by the service's own routes.
pub const RESERVED_PATHS: [&str; 3] = ["health", "ready", "version"];

pub async fn load_from_path(path: impl AsRef<Path>) -> Result<ResolvedSpec, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&text)
}

pub fn load_from_str(text: &str) -> Result<ResolvedSpec, ConfigError> {
    let spec: Specification = serde_json::from_str(text)?;
    resolve(&spec)
}

/// Build the resolved spec (validates first).
pub fn resolve(spec: &Specification) -> Result<ResolvedSpec, ConfigError> {
    validate(spec)?;

    let services = spec
        .services
        .iter()
        .map(resolve_service)
        .collect::<Result<Vec<_>, _>>()?;

    let mut paths = HashSet::new();
    let mut resources = Vec::with_capacity(spec.resources.len());
    for r in &spec.resources {
        let resource = resolve_resource(r)?;
        if !paths.insert(resource.path.clone()) {
            return Err(ConfigError::Duplicate {
                kind: "path",
                name: resource.path,
            });
        }
        resources.push(Arc::new(resource));
    }

    Ok(ResolvedSpec {
        services,
        resources,
    })
}

fn resolve_service(s: &ServiceConfig) -> Result<ServiceDefinition, ConfigError> {
    let driver = Driver::parse(&s.driver).ok_or_else(|| ConfigError::Unsupported {
        service: s.name.clone(),
        what: "driver",
        value: s.driver.clone(),
    })?;
    let password = match &s.password_env {
        Some(var) => Some(std::env::var(var).map_err(|_| {
            ConfigError::Load(format!(
                "service '{}': environment variable {} is not set",
                s.name, var
            ))
        })?),
        None => s.password.clone(),
    };
    Ok(ServiceDefinition {
        name: s.name.clone(),
        driver,
        user: s.user.clone(),
        password,
        host: s.host.clone().unwrap_or_else(|| "localhost".into()),
        port: s.port,
        database: s.database.clone(),
    })
}

fn resolve_resource(r: &ResourceConfig) -> Result<ResourceDefinition, ConfigError> {
    let mut operations = BTreeSet::new();
    for m in &r.methods {
        let op: Operation = m.parse().map_err(|_| ConfigError::UnknownOperation {
            resource: r.name.clone(),
            name: m.clone(),
        })?;
        operations.insert(op);
    }

    let fields = r
        .model
        .0
        .iter()
        .map(|(name, spec)| resolve_field(&r.name, name, spec))
        .collect::<Result<Vec<_>, _>>()?;

    let id = fields
        .iter()
        .find(|f| f.is_id())
        .ok_or_else(|| ConfigError::InvalidIdentifier {
            resource: r.name.clone(),
            reason: format!("missing '{}' field", ID_FIELD),
        })?;
    if id.ty != FieldType::Identifier || id.nullable {
        return Err(ConfigError::InvalidIdentifier {
            resource: r.name.clone(),
            reason: format!("'{}' must be a non-nullable identifier", ID_FIELD),
        });
    }

    let path = r.path.clone().unwrap_or_else(|| r.name.to_lowercase());
    let segment = path.trim_matches('/');
    check_path_segment(segment)?;

    Ok(ResourceDefinition {
        name: r.name.clone(),
        table_name: r.table_name.clone(),
        path: format!("/{}", segment),
        operations,
        fields: fields.into(),
        backing_service: r.backing_service.clone(),
    })
}

fn resolve_field(resource: &str, name: &str, spec: &FieldSpec) -> Result<Field, ConfigError> {
    let ty: FieldType = spec
        .type_
        .parse()
        .map_err(|t| ConfigError::UnknownFieldType {
            resource: resource.to_string(),
            field: name.to_string(),
            name: t,
        })?;
    let invalid = |reason: String| {
        ConfigError::Validation(format!("resource '{}' field '{}': {}", resource, name, reason))
    };

    let generated = match spec.generated.as_deref() {
        None => None,
        Some("uuid") if ty == FieldType::Identifier => Some(FieldDefault::GenerateUuid),
        Some("now") if ty == FieldType::Timestamp => Some(FieldDefault::Now),
        Some("now_on_update") if ty == FieldType::Timestamp => Some(FieldDefault::NowOnUpdate),
        Some(other) => {
            return Err(invalid(format!(
                "cannot generate '{}' for type {}",
                other, ty
            )))
        }
    };
    let literal = match &spec.default {
        None => None,
        Some(v) if v.is_null() => Some(FieldDefault::Literal(FieldValue::Null)),
        Some(v) => Some(FieldDefault::Literal(ty.coerce(v).map_err(invalid)?)),
    };
    if generated.is_some() && literal.is_some() {
        return Err(invalid("declares both a default and a generator".into()));
    }
    let default = match (generated, literal) {
        (Some(g), _) => Some(g),
        (None, Some(l)) => Some(l),
        // The identifier is generated unless stated otherwise.
        (None, None) if name == ID_FIELD && ty == FieldType::Identifier => {
            Some(FieldDefault::GenerateUuid)
        }
        (None, None) => None,
    };
    if default == Some(FieldDefault::Literal(FieldValue::Null)) && !spec.nullable {
        return Err(invalid("null default on a non-nullable field".into()));
    }

    Ok(Field {
        name: name.to_string(),
        ty,
        nullable: spec.nullable,
        default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNTS: &str = r#"{
        "services": [{"name": "db", "type": "sql", "driver": "memory"}],
        "resources": [{
            "name": "Account",
            "table_name": "accounts",
            "methods": ["get_many", "get_one", "post", "patch", "delete"],
            "model": {
                "id": "identifier",
                "name": {"type": "string", "default": "John"},
                "email": "string",
                "password": "secret",
                "created_at": {"type": "timestamp", "generated": "now"},
                "updated_at": {"type": "timestamp", "generated": "now_on_update"}
            },
            "backing_service": "db"
        }]
    }"#;

    #[test]
    fn resolves_fields_in_order_with_defaults() {
        let spec = load_from_str(ACCOUNTS).unwrap();
        let account = spec.resource("Account").unwrap();
        assert_eq!(account.path, "/account");
        let names: Vec<&str> = account.field_names().collect();
        assert_eq!(
            names,
            ["id", "name", "email", "password", "created_at", "updated_at"]
        );
        assert_eq!(account.fields[0].default, Some(FieldDefault::GenerateUuid));
        assert_eq!(
            account.fields[1].default,
            Some(FieldDefault::Literal(FieldValue::Text("John".into())))
        );
        assert_eq!(account.fields[5].default, Some(FieldDefault::NowOnUpdate));
        assert_eq!(account.operations.len(), 5);
    }

    #[test]
    fn unknown_operation_fails_fast() {
        let text = ACCOUNTS.replace("\"delete\"", "\"purge\"");
        match load_from_str(&text) {
            Err(ConfigError::UnknownOperation { name, .. }) => assert_eq!(name, "purge"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_generator_type_mismatch() {
        let text = ACCOUNTS.replace(r#""email": "string""#, r#""email": {"type": "string", "generated": "now"}"#);
        assert!(matches!(load_from_str(&text), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_duplicate_paths() {
        let text = r#"{
            "services": [{"name": "db", "type": "sql", "driver": "memory"}],
            "resources": [
                {"name": "Account", "table_name": "a", "methods": ["get_one"], "model": {"id": "uuid"}, "backing_service": "db"},
                {"name": "Other", "path": "account", "table_name": "b", "methods": ["get_one"], "model": {"id": "uuid"}, "backing_service": "db"}
            ]
        }"#;
        assert!(matches!(
            load_from_str(text),
            Err(ConfigError::Duplicate { kind: "path", .. })
        ));
    }

    #[test]
    fn identifier_must_be_uuid_typed() {
        let text = ACCOUNTS.replace(r#""id": "identifier""#, r#""id": "integer""#);
        assert!(matches!(
            load_from_str(&text),
            Err(ConfigError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn service_routes_cannot_be_shadowed() {
        let text = ACCOUNTS.replace(r#""backing_service": "db""#, r#""backing_service": "db", "path": "health""#);
        assert!(matches!(
            load_from_str(&text),
            Err(ConfigError::InvalidName { kind: "path", .. })
        ));
    }

    #[test]
    fn path_override_must_be_url_safe() {
        for bad in ["acc*t", "we ird", "a{x}", "a/b", ":id", ""] {
            let text = ACCOUNTS.replace(
                r#""backing_service": "db""#,
                &format!(r#""backing_service": "db", "path": "{}""#, bad),
            );
            assert!(
                matches!(load_from_str(&text), Err(ConfigError::InvalidName { kind: "path", .. })),
                "{} was accepted",
                bad
            );
        }
        let text = ACCOUNTS.replace(r#""backing_service": "db""#, r#""backing_service": "db", "path": "/user-accounts/""#);
        assert_eq!(load_from_str(&text).unwrap().resources[0].path, "/user-accounts");
    }
}
