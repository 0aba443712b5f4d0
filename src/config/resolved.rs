//! Resolved specification: validated and flattened for runtime use.

use crate::model::Field;
use crate::operation::Operation;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    MySql,
    Memory,
}

impl Driver {
    pub fn parse(s: &str) -> Option<Driver> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Driver::Postgres),
            "mysql" => Some(Driver::MySql),
            "memory" => Some(Driver::Memory),
            _ => None,
        }
    }
}

/// Backing-store connection descriptor for one configured service.
#[derive(Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub driver: Driver,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub database: Option<String>,
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// One configured resource. Immutable once resolved.
#[derive(Clone, Debug)]
pub struct ResourceDefinition {
    pub name: String,
    pub table_name: String,
    /// Path segment the routes hang off.
    pub path: String,
    pub operations: BTreeSet<Operation>,
    /// Declared fields in declaration order; exactly one is `id`.
    pub fields: Arc<[Field]>,
    pub backing_service: String,
}

impl ResourceDefinition {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedSpec {
    pub services: Vec<ServiceDefinition>,
    pub resources: Vec<Arc<ResourceDefinition>>,
}

impl ResolvedSpec {
    pub fn resource(&self, name: &str) -> Option<&Arc<ResourceDefinition>> {
        self.resources.iter().find(|r| r.name == name)
    }
}
