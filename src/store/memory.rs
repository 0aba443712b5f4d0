//! In-process store that interprets the structured statement kinds instead of
//! SQL text. Driver `memory`; also what the HTTP tests run against.

use super::SqlBackend;
use crate::error::StoreError;
use crate::model::{Field, FieldValue, Record, ID_FIELD};
use crate::sql::{Dialect, Param, QueryKind, Statement};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

pub struct MemoryBackend {
    dialect: Dialect,
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

struct Outcome {
    affected: u64,
    rows: Vec<Record>,
}

impl MemoryBackend {
    /// `dialect` decides which statement shapes the repository sends.
    pub fn new(dialect: Dialect) -> Self {
        MemoryBackend {
            dialect,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Raw stored rows of a table, in identifier order.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut rows = tables.get(table).cloned().unwrap_or_default();
        rows.sort_by_key(row_id);
        rows
    }

    fn run(&self, stmt: &Statement<'_>) -> Result<Outcome, StoreError> {
        let tpl = stmt.template;
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let rows = tables.entry(tpl.table.clone()).or_default();
        let projection = &tpl.projection;

        match &tpl.kind {
            QueryKind::SelectById => {
                let id = id_param(stmt, 0)?;
                let found = rows
                    .iter()
                    .filter(|r| row_id(r) == Some(id))
                    .map(|r| project(r, projection))
                    .collect::<Vec<_>>();
                Ok(Outcome {
                    affected: 0,
                    rows: found,
                })
            }
            QueryKind::SelectPage => {
                let limit = int_param(stmt, 0)?;
                let offset = int_param(stmt, 1)?;
                let mut sorted: Vec<&Record> = rows.iter().collect();
                sorted.sort_by_key(|r| row_id(r));
                let page = sorted
                    .into_iter()
                    .skip(offset)
                    .take(limit)
                    .map(|r| project(r, projection))
                    .collect();
                Ok(Outcome {
                    affected: 0,
                    rows: page,
                })
            }
            QueryKind::Insert { returning } => {
                if stmt.params.len() != projection.len() {
                    return Err(StoreError::Malformed(format!(
                        "insert into {} expects {} parameters, got {}",
                        tpl.table,
                        projection.len(),
                        stmt.params.len()
                    )));
                }
                let record: Record = projection
                    .iter()
                    .zip(&stmt.params)
                    .map(|(f, p)| (f.name.clone(), p.value.clone()))
                    .collect();
                let id = row_id(&record);
                if id.is_none() {
                    return Err(StoreError::Constraint {
                        table: tpl.table.clone(),
                        reason: format!("{} must not be null", ID_FIELD),
                    });
                }
                if rows.iter().any(|r| row_id(r) == id) {
                    return Err(StoreError::Constraint {
                        table: tpl.table.clone(),
                        reason: format!("duplicate {}", ID_FIELD),
                    });
                }
                let returned = if *returning {
                    vec![project(&record, projection)]
                } else {
                    Vec::new()
                };
                rows.push(record);
                Ok(Outcome {
                    affected: 1,
                    rows: returned,
                })
            }
            QueryKind::Update { set, returning } => {
                let id = id_param(stmt, set.len())?;
                let mut affected = 0;
                let mut returned = Vec::new();
                for row in rows.iter_mut().filter(|r| row_id(r) == Some(id)) {
                    for (name, p) in set.iter().zip(&stmt.params) {
                        row.insert(name.clone(), p.value.clone());
                    }
                    affected += 1;
                    if *returning {
                        returned.push(project(row, projection));
                    }
                }
                Ok(Outcome {
                    affected,
                    rows: returned,
                })
            }
            QueryKind::Delete { returning } => {
                let id = id_param(stmt, 0)?;
                let (gone, kept): (Vec<Record>, Vec<Record>) =
                    rows.drain(..).partition(|r| row_id(r) == Some(id));
                *rows = kept;
                let returned = if *returning {
                    gone.iter().map(|r| project(r, projection)).collect()
                } else {
                    Vec::new()
                };
                Ok(Outcome {
                    affected: gone.len() as u64,
                    rows: returned,
                })
            }
        }
    }
}

fn row_id(r: &Record) -> Option<Uuid> {
    r.get(ID_FIELD).and_then(FieldValue::as_uuid)
}

fn project(r: &Record, projection: &[Field]) -> Record {
    projection
        .iter()
        .map(|f| {
            (
                f.name.clone(),
                r.get(&f.name).cloned().unwrap_or(FieldValue::Null),
            )
        })
        .collect()
}

fn param<'a>(stmt: &'a Statement<'_>, idx: usize) -> Result<&'a Param, StoreError> {
    stmt.params
        .get(idx)
        .ok_or_else(|| StoreError::Malformed(format!("missing parameter {}", idx + 1)))
}

fn id_param(stmt: &Statement<'_>, idx: usize) -> Result<Uuid, StoreError> {
    param(stmt, idx)?
        .value
        .as_uuid()
        .ok_or_else(|| StoreError::Malformed(format!("parameter {} is not an identifier", idx + 1)))
}

fn int_param(stmt: &Statement<'_>, idx: usize) -> Result<usize, StoreError> {
    match param(stmt, idx)?.value {
        FieldValue::Integer(n) if n >= 0 => Ok(n as usize),
        _ => Err(StoreError::Malformed(format!(
            "parameter {} is not a non-negative integer",
            idx + 1
        ))),
    }
}

#[async_trait]
impl SqlBackend for MemoryBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, stmt: &Statement<'_>) -> Result<u64, StoreError> {
        Ok(self.run(stmt)?.affected)
    }

    async fn fetch_one(&self, stmt: &Statement<'_>) -> Result<Option<Record>, StoreError> {
        Ok(self.run(stmt)?.rows.into_iter().next())
    }

    async fn fetch_all(&self, stmt: &Statement<'_>) -> Result<Vec<Record>, StoreError> {
        Ok(self.run(stmt)?.rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.clear();
    }
}
