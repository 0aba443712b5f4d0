//! Spec validation: referential integrity and SQL-safe names. Runs before resolve.

use crate::config::{Driver, Specification, RESERVED_PATHS};
use crate::error::ConfigError;
use crate::model::ID_FIELD;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"))
}

/// Names spliced into SQL text must be plain identifiers.
pub fn check_name(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("segment pattern compiles"))
}

/// A route path segment: URL-safe characters only, no reserved names.
pub fn check_path_segment(segment: &str) -> Result<(), ConfigError> {
    if segment_pattern().is_match(segment) && !RESERVED_PATHS.contains(&segment) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            kind: "path",
            name: segment.to_string(),
        })
    }
}

pub fn validate(spec: &Specification) -> Result<(), ConfigError> {
    let mut service_names = HashSet::new();
    for s in &spec.services {
        if !service_names.insert(s.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "service",
                name: s.name.clone(),
            });
        }
        if s.type_ != "sql" {
            return Err(ConfigError::Unsupported {
                service: s.name.clone(),
                what: "type",
                value: s.type_.clone(),
            });
        }
        if Driver::parse(&s.driver).is_none() {
            return Err(ConfigError::Unsupported {
                service: s.name.clone(),
                what: "driver",
                value: s.driver.clone(),
            });
        }
    }

    let mut resource_names = HashSet::new();
    for r in &spec.resources {
        if !resource_names.insert(r.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "resource",
                name: r.name.clone(),
            });
        }
        check_name("resource", &r.name)?;
        check_name("table", &r.table_name)?;
        if !service_names.contains(r.backing_service.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "service",
                id: r.backing_service.clone(),
            });
        }
        if r.methods.is_empty() {
            return Err(ConfigError::Validation(format!(
                "resource '{}' allows no methods",
                r.name
            )));
        }
        for (field, _) in &r.model.0 {
            check_name("field", field)?;
        }
        let ids = r.model.0.iter().filter(|(n, _)| n == ID_FIELD).count();
        if ids != 1 {
            return Err(ConfigError::InvalidIdentifier {
                resource: r.name.clone(),
                reason: format!("expected exactly one '{}' field, found {}", ID_FIELD, ids),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: serde_json::Value) -> Specification {
        serde_json::from_value(json).unwrap()
    }

    fn base() -> serde_json::Value {
        serde_json::json!({
            "services": [{"name": "db", "type": "sql", "driver": "postgres"}],
            "resources": [{
                "name": "Account",
                "table_name": "accounts",
                "methods": ["get_one"],
                "model": {"id": "identifier", "name": "string"},
                "backing_service": "db"
            }]
        })
    }

    #[test]
    fn accepts_a_minimal_spec() {
        validate(&spec(base())).unwrap();
    }

    #[test]
    fn rejects_injection_in_table_name() {
        let mut j = base();
        j["resources"][0]["table_name"] = "accounts; DROP TABLE x".into();
        assert!(matches!(
            validate(&spec(j)),
            Err(ConfigError::InvalidName { kind: "table", .. })
        ));
    }

    #[test]
    fn rejects_missing_identifier() {
        let mut j = base();
        j["resources"][0]["model"] = serde_json::json!({"name": "string"});
        assert!(matches!(
            validate(&spec(j)),
            Err(ConfigError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn rejects_unknown_service() {
        let mut j = base();
        j["resources"][0]["backing_service"] = "cache".into();
        assert!(matches!(
            validate(&spec(j)),
            Err(ConfigError::MissingReference { kind: "service", .. })
        ));
    }

    #[test]
    fn rejects_unknown_driver() {
        let mut j = base();
        j["services"][0]["driver"] = "oracle".into();
        assert!(matches!(
            validate(&spec(j)),
            Err(ConfigError::Unsupported { what: "driver", .. })
        ));
    }
}
