//! Generic CRUD accessor over one entity type.
//!
//! # Responsibility
//! - Translate count/get/list/create/update/delete/batch-delete requests into
//!   parameterized SQL for the entity's table.
//! - Reduce raw maps and schema objects to one change-set shape.
//!
//! # Invariants
//! - Every mutating call that reaches storage runs in one transaction and
//!   commits it exactly once.
//! - Change-set application only touches fields the entity already declares.
//! - The primary key is never rewritten by an update.
//! - Storage errors are returned unmodified inside `CrudError::Db`.

use super::entity::{entity_fields, entity_from_fields, identifier_of, is_column, Entity};
use super::query::{
    delete_by_id, delete_by_ids, insert, select_by_id, select_count, select_list, update_by_id,
    Filter, ListQuery,
};
use crate::model::change_set::{ChangeSet, Payload};
use crate::model::schema::{Schema, SchemaError};
use log::{debug, warn};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type CrudResult<T> = Result<T, CrudError>;

/// Accessor error.
#[derive(Debug)]
pub enum CrudError {
    /// `update` was called with neither an identifier nor an entity.
    MissingTarget,
    NotFound { table: &'static str, id: String },
    /// Equality filter on a field the entity does not declare.
    UnknownField { table: &'static str, field: String },
    /// Entity carries no primary-key value yet.
    MissingIdentifier(&'static str),
    Schema(SchemaError),
    InvalidData(String),
    Db(rusqlite::Error),
}

impl Display for CrudError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTarget => write!(f, "update requires an identifier or an entity"),
            Self::NotFound { table, id } => write!(f, "{table} not found: {id}"),
            Self::UnknownField { table, field } => {
                write!(f, "unknown field `{field}` for {table}")
            }
            Self::MissingIdentifier(table) => write!(f, "{table} entity has no identifier"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid entity data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CrudError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for CrudError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<rusqlite::Error> for CrudError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(value)
    }
}

/// Row selector for [`CrudAccessor::update`].
///
/// At least one side must be present. When both are, the entity wins for
/// the fetch-and-merge path and the identifier drives the bulk path.
#[derive(Debug, Clone)]
pub struct UpdateTarget<E: Entity> {
    pub id: Option<E::Id>,
    pub entity: Option<E>,
}

impl<E: Entity> UpdateTarget<E> {
    pub fn id(id: E::Id) -> Self {
        Self {
            id: Some(id),
            entity: None,
        }
    }

    pub fn entity(entity: E) -> Self {
        Self {
            id: None,
            entity: Some(entity),
        }
    }

    /// A target with neither side set; `update` rejects it.
    pub fn none() -> Self {
        Self {
            id: None,
            entity: None,
        }
    }
}

/// Result of update/delete: the entity itself or an affected-row count.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<E> {
    Entity(E),
    Rows(usize),
}

impl<E> Mutation<E> {
    pub fn into_entity(self) -> Option<E> {
        match self {
            Self::Entity(entity) => Some(entity),
            Self::Rows(_) => None,
        }
    }

    pub fn rows(&self) -> Option<usize> {
        match self {
            Self::Entity(_) => None,
            Self::Rows(rows) => Some(*rows),
        }
    }
}

/// CRUD façade for entity type `E`.
///
/// `C` and `U` are the schema types accepted by `create` and `update`; both
/// default to raw [`ChangeSet`] input.
pub struct CrudAccessor<E, C = ChangeSet, U = ChangeSet> {
    _marker: PhantomData<fn() -> (E, C, U)>,
}

impl<E, C, U> Default for CrudAccessor<E, C, U> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E, C, U> Clone for CrudAccessor<E, C, U> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, C, U> Copy for CrudAccessor<E, C, U> {}

impl<E, C, U> CrudAccessor<E, C, U>
where
    E: Entity,
    C: Schema,
    U: Schema,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts rows matching all `filters`.
    pub fn count(&self, conn: &Connection, filters: &[Filter]) -> CrudResult<u64> {
        let q = select_count::<E>(filters)?;
        let count: i64 = conn.query_row(&q.sql, params_from_iter(q.params.iter()), |row| {
            row.get(0)
        })?;
        debug!(
            "event=crud_count module=crud status=ok table={} filters={} count={}",
            E::TABLE,
            filters.len(),
            count
        );
        u64::try_from(count)
            .map_err(|_| CrudError::InvalidData(format!("negative row count {count}")))
    }

    /// Fetches one entity by primary key.
    pub fn get(&self, conn: &Connection, id: &E::Id) -> CrudResult<Option<E>> {
        let found = fetch_by_id::<E>(conn, id)?;
        debug!(
            "event=crud_get module=crud status=ok table={} found={}",
            E::TABLE,
            found.is_some()
        );
        Ok(found)
    }

    /// Lists entities matching the query's filters, ordered and paginated.
    pub fn list(&self, conn: &Connection, query: &ListQuery) -> CrudResult<Vec<E>> {
        let q = select_list::<E>(query)?;
        let mut stmt = conn.prepare(&q.sql)?;
        let mut rows = stmt.query(params_from_iter(q.params.iter()))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(E::from_row(row)?);
        }
        debug!(
            "event=crud_list module=crud status=ok table={} offset={} limit={} rows={}",
            E::TABLE,
            query.offset,
            query.limit,
            entities.len()
        );
        Ok(entities)
    }

    /// Builds, persists and returns a new entity.
    ///
    /// The returned entity is re-read after insert, so storage-generated
    /// fields (autoincrement keys, column defaults) are populated.
    pub fn create(&self, conn: &mut Connection, data: Payload<C>) -> CrudResult<E> {
        let change_set = data.into_change_set()?;
        let draft: E = entity_from_fields(change_set.into_map())?;
        let fields = entity_fields(&draft)?;

        let tx = conn.transaction()?;
        let q = insert::<E>(&fields);
        tx.execute(&q.sql, params_from_iter(q.params.iter()))?;
        let id = match identifier_of::<E>(&fields) {
            Ok(id) => id,
            Err(CrudError::MissingIdentifier(_)) => {
                serde_json::from_value(tx.last_insert_rowid().into()).map_err(|err| {
                    CrudError::InvalidData(format!(
                        "generated `{}.{}` does not fit identifier type: {err}",
                        E::TABLE,
                        E::PRIMARY_KEY
                    ))
                })?
            }
            Err(err) => return Err(err),
        };
        let created = require::<E>(fetch_by_id::<E>(&tx, &id)?, &id)?;
        tx.commit()?;

        debug!("event=crud_create module=crud status=ok table={}", E::TABLE);
        Ok(created)
    }

    /// Applies `data` to the targeted row.
    ///
    /// - With an identifier and `return_entity == false`, issues one bulk
    ///   `UPDATE` and returns the affected row count.
    /// - Otherwise resolves the entity (the supplied one, or fetched by
    ///   identifier), merges the change-set into the fields it already has,
    ///   persists it and returns the refreshed entity.
    ///
    /// # Errors
    /// - `MissingTarget` when neither identifier nor entity is supplied.
    /// - `NotFound` when the fetch-by-identifier path finds no row.
    pub fn update(
        &self,
        conn: &mut Connection,
        target: UpdateTarget<E>,
        data: Payload<U>,
        return_entity: bool,
    ) -> CrudResult<Mutation<E>> {
        let UpdateTarget { id, entity } = target;
        if id.is_none() && entity.is_none() {
            return Err(CrudError::MissingTarget);
        }
        let change_set = data.into_change_set()?;
        if change_set.contains(E::PRIMARY_KEY) {
            warn!(
                "event=crud_update module=crud status=skip table={} reason=primary_key_immutable",
                E::TABLE
            );
        }

        match (id, entity) {
            (Some(id), _) if !return_entity => {
                let Some(q) = update_by_id::<E>(change_set.iter()) else {
                    debug!(
                        "event=crud_update module=crud status=ok table={} mode=bulk rows=0 reason=empty_change_set",
                        E::TABLE
                    );
                    return Ok(Mutation::Rows(0));
                };
                let tx = conn.transaction()?;
                let params = q
                    .params
                    .iter()
                    .map(|value| value as &dyn ToSql)
                    .chain(std::iter::once(&id as &dyn ToSql));
                let rows = tx.execute(&q.sql, params_from_iter(params))?;
                tx.commit()?;
                debug!(
                    "event=crud_update module=crud status=ok table={} mode=bulk rows={}",
                    E::TABLE,
                    rows
                );
                Ok(Mutation::Rows(rows))
            }
            (id, entity) => {
                let tx = conn.transaction()?;
                let current = match entity {
                    Some(entity) => entity,
                    None => {
                        let id = id.ok_or(CrudError::MissingTarget)?;
                        require::<E>(fetch_by_id::<E>(&tx, &id)?, &id)?
                    }
                };

                let fields = merge_change_set::<E>(entity_fields(&current)?, &change_set);
                let merged: E = entity_from_fields(fields)?;
                let fields = entity_fields(&merged)?;
                let key = identifier_of::<E>(&fields)?;

                // Only named fields are written; `current` may be stale.
                let mut written = ChangeSet::from(fields);
                written.retain(|field| change_set.contains(field));
                if let Some(q) = update_by_id::<E>(written.iter()) {
                    let params = q
                        .params
                        .iter()
                        .map(|value| value as &dyn ToSql)
                        .chain(std::iter::once(&key as &dyn ToSql));
                    tx.execute(&q.sql, params_from_iter(params))?;
                }
                let refreshed = require::<E>(fetch_by_id::<E>(&tx, &key)?, &key)?;
                tx.commit()?;

                debug!(
                    "event=crud_update module=crud status=ok table={} mode=entity fields={}",
                    E::TABLE,
                    change_set.len()
                );
                Ok(Mutation::Entity(refreshed))
            }
        }
    }

    /// Deletes one row by primary key.
    ///
    /// With `return_entity`, the row is fetched first and returned; a missing
    /// row is `NotFound`. Otherwise returns the affected row count.
    pub fn delete(
        &self,
        conn: &mut Connection,
        id: &E::Id,
        return_entity: bool,
    ) -> CrudResult<Mutation<E>> {
        let tx = conn.transaction()?;
        let outcome = if return_entity {
            let entity = require::<E>(fetch_by_id::<E>(&tx, id)?, id)?;
            tx.execute(&delete_by_id::<E>(), [id])?;
            Mutation::Entity(entity)
        } else {
            Mutation::Rows(tx.execute(&delete_by_id::<E>(), [id])?)
        };
        tx.commit()?;

        debug!(
            "event=crud_delete module=crud status=ok table={} return_entity={}",
            E::TABLE,
            return_entity
        );
        Ok(outcome)
    }

    /// Deletes every row whose primary key is in `ids`.
    pub fn batch_delete(&self, conn: &mut Connection, ids: &[E::Id]) -> CrudResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let tx = conn.transaction()?;
        let rows = tx.execute(&delete_by_ids::<E>(ids.len()), params_from_iter(ids.iter()))?;
        tx.commit()?;

        debug!(
            "event=crud_batch_delete module=crud status=ok table={} requested={} rows={}",
            E::TABLE,
            ids.len(),
            rows
        );
        Ok(rows)
    }
}

fn fetch_by_id<E: Entity>(conn: &Connection, id: &E::Id) -> CrudResult<Option<E>> {
    let mut stmt = conn.prepare(&select_by_id::<E>())?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(E::from_row(row)?)),
        None => Ok(None),
    }
}

fn require<E: Entity>(found: Option<E>, id: &E::Id) -> CrudResult<E> {
    found.ok_or_else(|| CrudError::NotFound {
        table: E::TABLE,
        id: format!("{id:?}"),
    })
}

/// Overwrites fields the entity already has; primary key and undeclared
/// fields are left alone.
fn merge_change_set<E: Entity>(
    mut fields: serde_json::Map<String, serde_json::Value>,
    change_set: &ChangeSet,
) -> serde_json::Map<String, serde_json::Value> {
    for (field, value) in change_set.iter() {
        if field == E::PRIMARY_KEY || !is_column::<E>(field) {
            continue;
        }
        if let Some(slot) = fields.get_mut(field) {
            *slot = value.clone();
        }
    }
    fields
}
