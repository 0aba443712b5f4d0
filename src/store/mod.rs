//! Backing-store capability: execute a bound statement and fetch zero, one or
//! many rows. One implementation per supported driver.

mod memory;
mod mysql;
mod postgres;

pub use memory::MemoryBackend;
pub use mysql::MySqlBackend;
pub use postgres::PgBackend;

use crate::config::{Driver, ResolvedSpec, Settings};
use crate::error::{ConfigError, StoreError};
use crate::model::{Field, Record};
use crate::sql::{Dialect, Statement};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait]
pub trait SqlBackend: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run a statement for its effect. Returns the number of rows affected.
    async fn execute(&self, stmt: &Statement<'_>) -> Result<u64, StoreError>;

    async fn fetch_one(&self, stmt: &Statement<'_>) -> Result<Option<Record>, StoreError>;

    async fn fetch_all(&self, stmt: &Statement<'_>) -> Result<Vec<Record>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Release the pool. Called once at shutdown.
    async fn close(&self);
}

fn decode_error(field: &Field, e: impl std::fmt::Display) -> StoreError {
    StoreError::Decode {
        column: field.name.clone(),
        reason: e.to_string(),
    }
}

/// Live backing stores keyed by service name.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    stores: BTreeMap<String, Arc<dyn SqlBackend>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every configured service.
    pub async fn connect(spec: &ResolvedSpec, settings: &Settings) -> Result<Self, ConfigError> {
        let mut registry = ServiceRegistry::new();
        for def in &spec.services {
            let store: Arc<dyn SqlBackend> = match def.driver {
                Driver::Postgres => Arc::new(
                    PgBackend::connect(def, settings)
                        .await
                        .map_err(|source| ConfigError::Connect {
                            service: def.name.clone(),
                            source,
                        })?,
                ),
                Driver::MySql => Arc::new(
                    MySqlBackend::connect(def, settings)
                        .await
                        .map_err(|source| ConfigError::Connect {
                            service: def.name.clone(),
                            source,
                        })?,
                ),
                Driver::Memory => Arc::new(MemoryBackend::new(Dialect::Postgres)),
            };
            tracing::info!(service = %def.name, driver = ?def.driver, "backing service connected");
            registry.insert(def.name.clone(), store);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, store: Arc<dyn SqlBackend>) {
        self.stores.insert(name.into(), store);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SqlBackend>> {
        self.stores.get(name).cloned()
    }

    /// Ping every store; returns the names of those that failed.
    pub async fn unhealthy(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for (name, store) in &self.stores {
            if let Err(e) = store.ping().await {
                tracing::warn!(service = %name, error = %e, "backing service ping failed");
                failed.push(name.clone());
            }
        }
        failed
    }

    pub async fn close_all(&self) {
        for (name, store) in &self.stores {
            store.close().await;
            tracing::info!(service = %name, "backing service disconnected");
        }
    }
}
