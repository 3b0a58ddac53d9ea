//! Entity contract and row/value mapping.
//!
//! # Invariants
//! - The entity's field set is the key set of its serialized form.
//! - The primary-key field, once assigned, is never rewritten by the accessor.

use super::crud::{CrudError, CrudResult};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Row, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt::Debug;

/// One database-mapped record type.
///
/// Implementors describe their table; the accessor derives every SQL
/// statement from `TABLE`, `PRIMARY_KEY` and `COLUMNS`.
pub trait Entity: Serialize + DeserializeOwned {
    /// Primary identifier type.
    type Id: ToSql + Serialize + DeserializeOwned + Clone + Debug;

    /// Backing table name.
    const TABLE: &'static str;
    /// Primary-key column; must also appear in `COLUMNS`.
    const PRIMARY_KEY: &'static str = "id";
    /// Declared columns. Equality filters and writes are limited to these.
    const COLUMNS: &'static [&'static str];
    /// Columns holding `bool` fields. SQLite stores them as `0`/`1`; listed
    /// columns decode integers back to booleans.
    const BOOL_COLUMNS: &'static [&'static str] = &[];

    /// Decodes one `SELECT *` row.
    ///
    /// The default maps the row into a JSON object keyed by column name,
    /// restores `BOOL_COLUMNS` and deserializes it. Override when a field
    /// needs some other SQL decoding.
    fn from_row(row: &Row<'_>) -> CrudResult<Self> {
        let mut object = row_to_object(row)?;
        restore_bools::<Self>(&mut object);
        serde_json::from_value(Value::Object(object)).map_err(|err| {
            CrudError::InvalidData(format!("cannot decode `{}` row: {err}", Self::TABLE))
        })
    }
}

pub(crate) fn is_column<E: Entity>(field: &str) -> bool {
    E::COLUMNS.contains(&field)
}

/// Serializes an entity into its field map.
pub(crate) fn entity_fields<E: Entity>(entity: &E) -> CrudResult<Map<String, Value>> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CrudError::InvalidData(format!(
            "`{}` entity must serialize to an object",
            E::TABLE
        ))),
        Err(err) => Err(CrudError::InvalidData(format!(
            "cannot encode `{}` entity: {err}",
            E::TABLE
        ))),
    }
}

/// Builds an entity from a field map.
pub(crate) fn entity_from_fields<E: Entity>(mut fields: Map<String, Value>) -> CrudResult<E> {
    restore_bools::<E>(&mut fields);
    serde_json::from_value(Value::Object(fields)).map_err(|err| {
        CrudError::InvalidData(format!("cannot build `{}` entity: {err}", E::TABLE))
    })
}

/// Reads the assigned identifier out of a field map.
pub(crate) fn identifier_of<E: Entity>(fields: &Map<String, Value>) -> CrudResult<E::Id> {
    match fields.get(E::PRIMARY_KEY) {
        None | Some(Value::Null) => Err(CrudError::MissingIdentifier(E::TABLE)),
        Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
            CrudError::InvalidData(format!(
                "invalid `{}.{}` value: {err}",
                E::TABLE,
                E::PRIMARY_KEY
            ))
        }),
    }
}

/// Converts a change-set value into a bindable SQL value.
///
/// Booleans bind as integers; arrays and objects bind as JSON text.
pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                SqlValue::Integer(int)
            } else if let Some(float) = number.as_f64() {
                SqlValue::Real(float)
            } else {
                SqlValue::Text(number.to_string())
            }
        }
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Turns integer values of `E::BOOL_COLUMNS` into JSON booleans.
fn restore_bools<E: Entity>(fields: &mut Map<String, Value>) {
    for column in E::BOOL_COLUMNS {
        if let Some(slot) = fields.get_mut(*column) {
            if let Some(int) = slot.as_i64() {
                *slot = Value::Bool(int != 0);
            }
        }
    }
}

fn row_to_object(row: &Row<'_>) -> CrudResult<Map<String, Value>> {
    let stmt = row.as_ref();
    let mut object = Map::new();
    for idx in 0..stmt.column_count() {
        let name = stmt.column_name(idx)?.to_string();
        let value = match row.get_ref(idx)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(int) => Value::from(int),
            ValueRef::Real(float) => Number::from_f64(float).map_or(Value::Null, Value::Number),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        };
        object.insert(name, value);
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::{entity_from_fields, to_sql_value, Entity};
    use rusqlite::types::Value as SqlValue;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Flag {
        id: i64,
        on: bool,
    }

    impl Entity for Flag {
        type Id = i64;
        const TABLE: &'static str = "flags";
        const COLUMNS: &'static [&'static str] = &["id", "on"];
        const BOOL_COLUMNS: &'static [&'static str] = &["on"];
    }

    #[test]
    fn bool_columns_accept_stored_integers() {
        let fields = json!({"id": 1, "on": 1}).as_object().unwrap().clone();
        let flag: Flag = entity_from_fields(fields).unwrap();
        assert_eq!(flag, Flag { id: 1, on: true });

        let fields = json!({"id": 2, "on": 0}).as_object().unwrap().clone();
        let flag: Flag = entity_from_fields(fields).unwrap();
        assert!(!flag.on);
    }

    #[test]
    fn json_scalars_map_to_sqlite_storage_classes() {
        assert_eq!(to_sql_value(&json!(null)), SqlValue::Null);
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&json!(42)), SqlValue::Integer(42));
        assert_eq!(to_sql_value(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sql_value(&json!("x")), SqlValue::Text("x".to_string()));
    }

    #[test]
    fn nested_json_binds_as_text() {
        assert_eq!(
            to_sql_value(&json!({"a": [1, 2]})),
            SqlValue::Text("{\"a\":[1,2]}".to_string())
        );
    }
}
