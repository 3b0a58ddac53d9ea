//! Filter model and SQL statement construction.
//!
//! # Invariants
//! - Identifiers come from `Entity` constants or are checked against
//!   `Entity::COLUMNS`; only values are bound as parameters.
//! - Raw predicates and sort expressions are caller-owned SQL, passed verbatim.

use super::crud::{CrudError, CrudResult};
use super::entity::{is_column, to_sql_value, Entity};
use crate::model::change_set::ChangeSet;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Default page size for [`ListQuery`].
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// One filter strategy. Multiple filters are combined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field-equality mapping; a JSON `null` matches `IS NULL`.
    Equality(ChangeSet),
    /// Raw SQL predicate expressions, e.g. `"age >= 18"`.
    RawPredicate(Vec<String>),
}

impl Filter {
    /// Single-field equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equality(ChangeSet::new().with(field, value))
    }

    /// Raw predicate filter from any string-like sequence.
    pub fn raw<I, S>(predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RawPredicate(predicates.into_iter().map(Into::into).collect())
    }
}

/// List options: filters, ordering and pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    /// Raw ordering expressions, e.g. `"age DESC"`.
    pub sort: Vec<String>,
    pub offset: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            offset: 0,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Parameterized statement text plus its positional values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl QueryBuf {
    fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, value: SqlValue) {
        self.params.push(value);
    }
}

pub(crate) fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn push_where<E: Entity>(q: &mut QueryBuf, filters: &[Filter]) -> CrudResult<()> {
    let mut clauses = Vec::new();
    for filter in filters {
        match filter {
            Filter::Equality(fields) => {
                for (field, value) in fields.iter() {
                    if !is_column::<E>(field) {
                        return Err(CrudError::UnknownField {
                            table: E::TABLE,
                            field: field.to_string(),
                        });
                    }
                    if value.is_null() {
                        clauses.push(format!("{} IS NULL", quoted(field)));
                    } else {
                        clauses.push(format!("{} = ?", quoted(field)));
                        q.push_param(to_sql_value(value));
                    }
                }
            }
            Filter::RawPredicate(predicates) => {
                clauses.extend(
                    predicates
                        .iter()
                        .filter(|predicate| !predicate.trim().is_empty())
                        .map(|predicate| format!("({predicate})")),
                );
            }
        }
    }

    if !clauses.is_empty() {
        q.sql.push_str(" WHERE ");
        q.sql.push_str(&clauses.join(" AND "));
    }
    Ok(())
}

pub(crate) fn select_count<E: Entity>(filters: &[Filter]) -> CrudResult<QueryBuf> {
    let mut q = QueryBuf::new(format!("SELECT COUNT(*) FROM {}", quoted(E::TABLE)));
    push_where::<E>(&mut q, filters)?;
    Ok(q)
}

pub(crate) fn select_by_id<E: Entity>() -> String {
    format!(
        "SELECT * FROM {} WHERE {} = ?1",
        quoted(E::TABLE),
        quoted(E::PRIMARY_KEY)
    )
}

pub(crate) fn select_list<E: Entity>(query: &ListQuery) -> CrudResult<QueryBuf> {
    let mut q = QueryBuf::new(format!("SELECT * FROM {}", quoted(E::TABLE)));
    push_where::<E>(&mut q, &query.filters)?;

    let order: Vec<&str> = query
        .sort
        .iter()
        .map(|expr| expr.trim())
        .filter(|expr| !expr.is_empty())
        .collect();
    if !order.is_empty() {
        q.sql.push_str(" ORDER BY ");
        q.sql.push_str(&order.join(", "));
    }

    q.sql.push_str(" LIMIT ? OFFSET ?");
    q.push_param(SqlValue::Integer(i64::from(query.limit)));
    q.push_param(SqlValue::Integer(i64::from(query.offset)));
    Ok(q)
}

/// INSERT of the given non-null declared fields.
pub(crate) fn insert<E: Entity>(fields: &serde_json::Map<String, Value>) -> QueryBuf {
    let mut columns = Vec::new();
    let mut q = QueryBuf::new(String::new());
    for (field, value) in fields {
        if value.is_null() || !is_column::<E>(field) {
            continue;
        }
        columns.push(quoted(field));
        q.push_param(to_sql_value(value));
    }

    q.sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quoted(E::TABLE))
    } else {
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted(E::TABLE),
            columns.join(", "),
            placeholders
        )
    };
    q
}

/// UPDATE by primary key. Returns `None` when no assignable field remains.
pub(crate) fn update_by_id<'a, E: Entity>(
    fields: impl IntoIterator<Item = (&'a str, &'a Value)>,
) -> Option<QueryBuf> {
    let mut q = QueryBuf::new(String::new());
    let mut assignments = Vec::new();
    for (field, value) in fields {
        if field == E::PRIMARY_KEY || !is_column::<E>(field) {
            continue;
        }
        assignments.push(format!("{} = ?", quoted(field)));
        q.push_param(to_sql_value(value));
    }
    if assignments.is_empty() {
        return None;
    }

    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quoted(E::TABLE),
        assignments.join(", "),
        quoted(E::PRIMARY_KEY)
    );
    Some(q)
}

pub(crate) fn delete_by_id<E: Entity>() -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?1",
        quoted(E::TABLE),
        quoted(E::PRIMARY_KEY)
    )
}

pub(crate) fn delete_by_ids<E: Entity>(count: usize) -> String {
    let placeholders = vec!["?"; count].join(", ");
    format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quoted(E::TABLE),
        quoted(E::PRIMARY_KEY),
        placeholders
    )
}

#[cfg(test)]
mod tests {
    use super::{
        insert, quoted, select_count, select_list, update_by_id, Filter, ListQuery,
    };
    use crate::model::change_set::ChangeSet;
    use crate::repo::crud::CrudError;
    use crate::repo::entity::Entity;
    use rusqlite::types::Value as SqlValue;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Book {
        id: Option<i64>,
        title: String,
        shelf: Option<String>,
    }

    impl Entity for Book {
        type Id = i64;
        const TABLE: &'static str = "books";
        const COLUMNS: &'static [&'static str] = &["id", "title", "shelf"];
    }

    #[test]
    fn no_filters_produce_no_where_clause() {
        let q = select_count::<Book>(&[]).unwrap();
        assert_eq!(q.sql, "SELECT COUNT(*) FROM \"books\"");

        let q = select_count::<Book>(&[Filter::Equality(ChangeSet::new())]).unwrap();
        assert_eq!(q.sql, "SELECT COUNT(*) FROM \"books\"");
        assert!(q.params.is_empty());
    }

    #[test]
    fn equality_and_raw_filters_are_conjunctive() {
        let filters = [
            Filter::Equality(ChangeSet::new().with("title", "Dune").with("shelf", json!(null))),
            Filter::raw(["id > 3"]),
        ];
        let q = select_count::<Book>(&filters).unwrap();
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"books\" WHERE \"shelf\" IS NULL AND \"title\" = ? AND (id > 3)"
        );
        assert_eq!(q.params, vec![SqlValue::Text("Dune".to_string())]);
    }

    #[test]
    fn unknown_equality_field_is_rejected() {
        let err = select_count::<Book>(&[Filter::eq("author", "x")]).unwrap_err();
        assert!(matches!(
            err,
            CrudError::UnknownField { table: "books", ref field } if field == "author"
        ));
    }

    #[test]
    fn list_appends_order_and_pagination() {
        let query = ListQuery {
            sort: vec!["title DESC".to_string(), " ".to_string(), "id".to_string()],
            offset: 20,
            limit: 10,
            ..ListQuery::default()
        };
        let q = select_list::<Book>(&query).unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM \"books\" ORDER BY title DESC, id LIMIT ? OFFSET ?"
        );
        assert_eq!(q.params, vec![SqlValue::Integer(10), SqlValue::Integer(20)]);
    }

    #[test]
    fn list_query_defaults_to_first_hundred_rows() {
        let query = ListQuery::default();
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, 100);
    }

    #[test]
    fn insert_skips_nulls_and_undeclared_fields() {
        let fields = json!({"id": null, "title": "Dune", "shelf": null, "extra": 1});
        let q = insert::<Book>(fields.as_object().unwrap());
        assert_eq!(q.sql, "INSERT INTO \"books\" (\"title\") VALUES (?)");
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn update_never_assigns_primary_key() {
        let fields = json!({"id": 9, "title": "Emma"});
        let q = update_by_id::<Book>(fields.as_object().unwrap().iter().map(|(k, v)| (k.as_str(), v)))
            .unwrap();
        assert_eq!(q.sql, "UPDATE \"books\" SET \"title\" = ? WHERE \"id\" = ?");

        let only_key = json!({"id": 9});
        assert!(update_by_id::<Book>(
            only_key.as_object().unwrap().iter().map(|(k, v)| (k.as_str(), v))
        )
        .is_none());
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quoted("we\"ird"), "\"we\"\"ird\"");
    }
}
