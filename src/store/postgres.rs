//! PostgreSQL backing store over a sqlx pool.

use super::{decode_error, SqlBackend};
use crate::config::{ServiceDefinition, Settings};
use crate::error::StoreError;
use crate::model::{Field, FieldType, FieldValue, Record};
use crate::sql::{Dialect, Param, Statement};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub async fn connect(def: &ServiceDefinition, settings: &Settings) -> Result<Self, StoreError> {
        let mut opts = PgConnectOptions::new().host(&def.host);
        if let Some(port) = def.port {
            opts = opts.port(port);
        }
        if let Some(user) = &def.user {
            opts = opts.username(user);
        }
        if let Some(password) = &def.password {
            opts = opts.password(password);
        }
        if let Some(database) = &def.database {
            opts = opts.database(database);
        }
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.statement_timeout)
            .connect_with(opts)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgBackend { pool }
    }
}

#[async_trait]
impl SqlBackend for PgBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, stmt: &Statement<'_>) -> Result<u64, StoreError> {
        let result = bind(sqlx::query(stmt.sql()), &stmt.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_one(&self, stmt: &Statement<'_>) -> Result<Option<Record>, StoreError> {
        let row = bind(sqlx::query(stmt.sql()), &stmt.params)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_record(&r, &stmt.template.projection))
            .transpose()
    }

    async fn fetch_all(&self, stmt: &Statement<'_>) -> Result<Vec<Record>, StoreError> {
        let rows = bind(sqlx::query(stmt.sql()), &stmt.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| row_to_record(r, &stmt.template.projection))
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Bind with the declared type so NULLs carry the column's type.
fn bind<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Param],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match &p.value {
            FieldValue::Null => match p.ty {
                FieldType::Identifier => query.bind(None::<Uuid>),
                FieldType::String | FieldType::Secret => query.bind(None::<String>),
                FieldType::Integer => query.bind(None::<i64>),
                FieldType::Float => query.bind(None::<f64>),
                FieldType::Boolean => query.bind(None::<bool>),
                FieldType::Timestamp => query.bind(None::<DateTime<Utc>>),
            },
            FieldValue::Uuid(u) => query.bind(*u),
            FieldValue::Text(s) => query.bind(s.as_str()),
            FieldValue::Integer(n) => query.bind(*n),
            FieldValue::Float(n) => query.bind(*n),
            FieldValue::Boolean(b) => query.bind(*b),
            FieldValue::Timestamp(t) => query.bind(*t),
        };
    }
    query
}

fn row_to_record(row: &PgRow, projection: &[Field]) -> Result<Record, StoreError> {
    let mut record = Record::new();
    for field in projection {
        record.insert(field.name.clone(), cell_to_value(row, field)?);
    }
    Ok(record)
}

fn cell_to_value(row: &PgRow, field: &Field) -> Result<FieldValue, StoreError> {
    let name = field.name.as_str();
    let value = match field.ty {
        FieldType::Identifier => match row.try_get::<Option<Uuid>, _>(name) {
            Ok(v) => v.map(FieldValue::Uuid),
            Err(_) => row
                .try_get::<Option<String>, _>(name)
                .map_err(|e| decode_error(field, e))?
                .map(|s| Uuid::parse_str(&s).map(FieldValue::Uuid))
                .transpose()
                .map_err(|e| decode_error(field, e))?,
        },
        FieldType::String | FieldType::Secret => row
            .try_get::<Option<String>, _>(name)
            .map_err(|e| decode_error(field, e))?
            .map(FieldValue::Text),
        FieldType::Integer => {
            if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
                v.map(FieldValue::Integer)
            } else if let Ok(v) = row.try_get::<Option<i32>, _>(name) {
                v.map(|n| FieldValue::Integer(n.into()))
            } else {
                row.try_get::<Option<i16>, _>(name)
                    .map_err(|e| decode_error(field, e))?
                    .map(|n| FieldValue::Integer(n.into()))
            }
        }
        FieldType::Float => {
            if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
                v.map(FieldValue::Float)
            } else {
                row.try_get::<Option<f32>, _>(name)
                    .map_err(|e| decode_error(field, e))?
                    .map(|n| FieldValue::Float(n.into()))
            }
        }
        FieldType::Boolean => row
            .try_get::<Option<bool>, _>(name)
            .map_err(|e| decode_error(field, e))?
            .map(FieldValue::Boolean),
        FieldType::Timestamp => match row.try_get::<Option<DateTime<Utc>>, _>(name) {
            Ok(v) => v.map(FieldValue::Timestamp),
            Err(_) => row
                .try_get::<Option<NaiveDateTime>, _>(name)
                .map_err(|e| decode_error(field, e))?
                .map(|n| FieldValue::Timestamp(n.and_utc())),
        },
    };
    Ok(value.unwrap_or(FieldValue::Null))
}
