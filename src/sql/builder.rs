//! Builds parameterized SELECT, INSERT, UPDATE, DELETE text from a resource's
//! declared fields. Identifiers come from the resolved spec only; values are
//! always parameters.

use crate::model::{Field, FieldType, FieldValue, ID_FIELD};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Placeholder for the `n`th (1-based) parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::MySql => "?".to_string(),
        }
    }

    /// Whether writes can hand back the affected row in the same statement.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}

/// Shape of a statement and the order its parameters are bound in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKind {
    /// `[id]`
    SelectById,
    /// `[limit, offset]`
    SelectPage,
    /// One parameter per projected column.
    Insert { returning: bool },
    /// One parameter per `set` column, then `id`.
    Update { set: Vec<String>, returning: bool },
    /// `[id]`
    Delete { returning: bool },
}

/// Pre-rendered statement text plus what a store needs to execute and decode it.
#[derive(Clone, Debug)]
pub struct QueryTemplate {
    pub sql: String,
    pub table: String,
    pub kind: QueryKind,
    /// Columns read back (and, for inserts, written), in declaration order.
    pub projection: Arc<[Field]>,
}

impl QueryTemplate {
    pub fn bind(&self, params: Vec<Param>) -> Statement<'_> {
        Statement {
            template: self,
            params,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub ty: FieldType,
    pub value: FieldValue,
}

impl Param {
    pub fn new(ty: FieldType, value: FieldValue) -> Self {
        Param { ty, value }
    }

    pub fn integer(n: i64) -> Self {
        Param::new(FieldType::Integer, FieldValue::Integer(n))
    }

    pub fn id(id: uuid::Uuid) -> Self {
        Param::new(FieldType::Identifier, FieldValue::Uuid(id))
    }
}

/// A template with its parameters bound, ready for a backing store.
#[derive(Debug)]
pub struct Statement<'q> {
    pub template: &'q QueryTemplate,
    pub params: Vec<Param>,
}

impl Statement<'_> {
    pub fn sql(&self) -> &str {
        &self.template.sql
    }
}

fn column_list(dialect: Dialect, fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| dialect.quote(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn returning_clause(dialect: Dialect, fields: &[Field]) -> String {
    if dialect.supports_returning() {
        format!(" RETURNING {}", column_list(dialect, fields))
    } else {
        String::new()
    }
}

/// SELECT by identifier.
pub fn select_by_id(dialect: Dialect, table: &str, fields: &Arc<[Field]>) -> QueryTemplate {
    QueryTemplate {
        sql: format!(
            "SELECT {} FROM {} WHERE {} = {}",
            column_list(dialect, fields),
            dialect.quote(table),
            dialect.quote(ID_FIELD),
            dialect.placeholder(1)
        ),
        table: table.to_string(),
        kind: QueryKind::SelectById,
        projection: fields.clone(),
    }
}

/// SELECT one page, ordered by identifier so consecutive pages are disjoint.
pub fn select_page(dialect: Dialect, table: &str, fields: &Arc<[Field]>) -> QueryTemplate {
    QueryTemplate {
        sql: format!(
            "SELECT {} FROM {} ORDER BY {} LIMIT {} OFFSET {}",
            column_list(dialect, fields),
            dialect.quote(table),
            dialect.quote(ID_FIELD),
            dialect.placeholder(1),
            dialect.placeholder(2)
        ),
        table: table.to_string(),
        kind: QueryKind::SelectPage,
        projection: fields.clone(),
    }
}

/// INSERT every declared column.
pub fn insert(dialect: Dialect, table: &str, fields: &Arc<[Field]>) -> QueryTemplate {
    let placeholders = (1..=fields.len())
        .map(|n| dialect.placeholder(n))
        .collect::<Vec<_>>()
        .join(", ");
    QueryTemplate {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            dialect.quote(table),
            column_list(dialect, fields),
            placeholders,
            returning_clause(dialect, fields)
        ),
        table: table.to_string(),
        kind: QueryKind::Insert {
            returning: dialect.supports_returning(),
        },
        projection: fields.clone(),
    }
}

/// UPDATE by identifier, setting exactly `set` (declared columns only).
pub fn update(dialect: Dialect, table: &str, fields: &Arc<[Field]>, set: &[&Field]) -> QueryTemplate {
    let assignments = set
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} = {}", dialect.quote(&f.name), dialect.placeholder(i + 1)))
        .collect::<Vec<_>>()
        .join(", ");
    QueryTemplate {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = {}{}",
            dialect.quote(table),
            assignments,
            dialect.quote(ID_FIELD),
            dialect.placeholder(set.len() + 1),
            returning_clause(dialect, fields)
        ),
        table: table.to_string(),
        kind: QueryKind::Update {
            set: set.iter().map(|f| f.name.clone()).collect(),
            returning: dialect.supports_returning(),
        },
        projection: fields.clone(),
    }
}

/// DELETE by identifier.
pub fn delete(dialect: Dialect, table: &str, fields: &Arc<[Field]>) -> QueryTemplate {
    QueryTemplate {
        sql: format!(
            "DELETE FROM {} WHERE {} = {}{}",
            dialect.quote(table),
            dialect.quote(ID_FIELD),
            dialect.placeholder(1),
            returning_clause(dialect, fields)
        ),
        table: table.to_string(),
        kind: QueryKind::Delete {
            returning: dialect.supports_returning(),
        },
        projection: fields.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Arc<[Field]> {
        ["id", "name", "email"]
            .into_iter()
            .map(|n| Field {
                name: n.into(),
                ty: if n == "id" {
                    FieldType::Identifier
                } else {
                    FieldType::String
                },
                nullable: false,
                default: None,
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn select_by_id_lists_declared_columns_in_order() {
        let q = select_by_id(Dialect::Postgres, "accounts", &fields());
        assert_eq!(
            q.sql,
            r#"SELECT "id", "name", "email" FROM "accounts" WHERE "id" = $1"#
        );
    }

    #[test]
    fn page_query_orders_and_limits() {
        let q = select_page(Dialect::MySql, "accounts", &fields());
        assert_eq!(
            q.sql,
            "SELECT `id`, `name`, `email` FROM `accounts` ORDER BY `id` LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn insert_returns_row_only_where_supported() {
        let pg = insert(Dialect::Postgres, "accounts", &fields());
        assert_eq!(
            pg.sql,
            r#"INSERT INTO "accounts" ("id", "name", "email") VALUES ($1, $2, $3) RETURNING "id", "name", "email""#
        );
        let my = insert(Dialect::MySql, "accounts", &fields());
        assert_eq!(
            my.sql,
            "INSERT INTO `accounts` (`id`, `name`, `email`) VALUES (?, ?, ?)"
        );
        assert_eq!(my.kind, QueryKind::Insert { returning: false });
    }

    #[test]
    fn update_sets_only_requested_columns_and_binds_id_last() {
        let f = fields();
        let set = [&f[2]];
        let q = update(Dialect::Postgres, "accounts", &f, &set);
        assert_eq!(
            q.sql,
            r#"UPDATE "accounts" SET "email" = $1 WHERE "id" = $2 RETURNING "id", "name", "email""#
        );
        assert_eq!(
            q.kind,
            QueryKind::Update {
                set: vec!["email".into()],
                returning: true
            }
        );
    }

    #[test]
    fn every_statement_uses_the_declared_table() {
        let f = fields();
        for q in [
            select_by_id(Dialect::Postgres, "accounts", &f),
            select_page(Dialect::Postgres, "accounts", &f),
            insert(Dialect::Postgres, "accounts", &f),
            update(Dialect::Postgres, "accounts", &f, &[&f[1]]),
            delete(Dialect::Postgres, "accounts", &f),
        ] {
            assert!(q.sql.contains(r#""accounts""#), "{}", q.sql);
            assert_eq!(q.table, "accounts");
        }
    }

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(Dialect::Postgres.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MySql.quote("a`b"), "`a``b`");
    }
}
