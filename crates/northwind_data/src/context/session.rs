//! Short-lived unit of work over one SQLite connection.
//!
//! # Responsibility
//! - Run mapped selects with optional eager loading of relations.
//! - Apply one change-set per commit.
//!
//! # Invariants
//! - A session owns its connection; dropping the session closes it.
//! - `save_changes` either commits every entry or none of them.
//! - Update/delete entries that match no row abort the whole change-set.
//! - Eager loading follows the model's relation mappings and reads one
//!   snapshot; bound value lists never exceed `MAX_IN_VALUES`.

use super::DataContext;
use crate::db::{open_connection, quote_ident, DbError, DbResult};
use crate::entity::{short_type_name, Column, Entity, Relation};
use crate::mapping::{Model, ModelError, RelationKind, RelationMap, TableMap};
use crate::query::Predicate;
use crate::repo::{display_value, RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::time::Instant;

/// Most values bound into one `IN (...)` list while loading relations.
const MAX_IN_VALUES: usize = 500;

/// State an entity is marked with inside a `ChangeSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Modified,
    Deleted,
}

/// Ordered list of pending writes committed together by `Session::save_changes`.
#[derive(Debug)]
pub struct ChangeSet<'a, T> {
    entries: Vec<(EntryState, &'a T)>,
}

impl<'a, T: Entity> ChangeSet<'a, T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, entity: &'a T) -> &mut Self {
        self.mark(entity, EntryState::Added)
    }

    pub fn modify(&mut self, entity: &'a T) -> &mut Self {
        self.mark(entity, EntryState::Modified)
    }

    pub fn delete(&mut self, entity: &'a T) -> &mut Self {
        self.mark(entity, EntryState::Deleted)
    }

    pub fn mark(&mut self, entity: &'a T, state: EntryState) -> &mut Self {
        self.entries.push((state, entity));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(EntryState, &'a T)] {
        &self.entries
    }
}

impl<T: Entity> Default for ChangeSet<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of work against the context's store.
///
/// Created by `DataContext::open_session` and dropped by the caller when the
/// operation finishes.
pub struct Session<'ctx> {
    context: &'ctx DataContext,
    conn: Connection,
    id: u64,
    opened_at: Instant,
}

impl<'ctx> Session<'ctx> {
    pub(crate) fn open(context: &'ctx DataContext) -> DbResult<Self> {
        let id = context.inner.sessions_opened.fetch_add(1, Ordering::Relaxed) + 1;
        let conn = open_connection(&context.inner.target)?;
        debug!(
            "event=session_open module=context status=ok context={} session={id}",
            context.name()
        );
        Ok(Self {
            context,
            conn,
            id,
            opened_at: Instant::now(),
        })
    }

    /// Sequence number of this session within its context, starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn model(&self) -> &'ctx Model {
        self.context.model()
    }

    /// Mapping of `T`, or `UnmappedEntity` when the model does not know it.
    pub fn table<T: Entity>(&self) -> RepoResult<&'ctx TableMap> {
        self.model()
            .table::<T>()
            .ok_or_else(|| RepoError::UnmappedEntity(short_type_name::<T>()))
    }

    /// Selects entities of `T` matching `predicate`, ordered by key.
    pub fn query<T: Entity>(
        &self,
        predicate: &Predicate<T::Field>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<T>> {
        select_rows::<T>(&self.conn, self.table::<T>()?, predicate, limit)
    }

    /// Like `query`, then eagerly loads each relation in `includes`.
    ///
    /// The base select and every relation select run inside one read
    /// transaction, so all of them observe the same committed state.
    pub fn query_with<T: Entity>(
        &self,
        predicate: &Predicate<T::Field>,
        limit: Option<u32>,
        includes: &[T::Relation],
    ) -> RepoResult<Vec<T>> {
        if includes.is_empty() {
            return self.query::<T>(predicate, limit);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut entities = self.query::<T>(predicate, limit)?;
        if !entities.is_empty() {
            for relation in includes {
                T::load_relation(self, &mut entities, *relation)?;
            }
        }
        tx.commit()?;

        Ok(entities)
    }

    /// Selects `T` rows whose `field` is one of `values`, ordered by key
    /// within each batch of at most `MAX_IN_VALUES` bound values.
    pub fn query_in<T: Entity>(&self, field: T::Field, values: &[Value]) -> RepoResult<Vec<T>> {
        let mut rows = Vec::new();
        for chunk in values.chunks(MAX_IN_VALUES) {
            let predicate = Predicate::is_in(field, chunk.iter().cloned());
            rows.extend(self.query::<T>(&predicate, None)?);
        }
        Ok(rows)
    }

    /// Loads the `R` row each of `rows` points at through the mapped
    /// reference `relation`. The result is aligned with `rows`.
    ///
    /// # Errors
    /// - `Db(Model(InvalidRelation))` when the mapping of `relation` is not a
    ///   reference to `R`'s table.
    pub fn load_reference<T: Entity, R: Entity + Clone>(
        &self,
        rows: &[T],
        relation: T::Relation,
    ) -> RepoResult<Vec<Option<R>>> {
        let relation_map = self.relation_map::<T, R>(relation)?;
        let RelationKind::Reference { foreign_key, .. } = &relation_map.kind else {
            return Err(invalid_relation::<T>(relation, "is not a reference"));
        };
        let field = field_for_column::<T>(foreign_key)
            .ok_or_else(|| invalid_relation::<T>(relation, "foreign key is not an entity field"))?;

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for row in rows {
            let value = row.value(field);
            if ValueKey::new(&value).is_some_and(|key| seen.insert(key)) {
                keys.push(value);
            }
        }

        let targets: HashMap<ValueKey, R> = self
            .query_in::<R>(R::KEY, &keys)?
            .into_iter()
            .filter_map(|target| ValueKey::new(&target.key()).map(|key| (key, target)))
            .collect();

        Ok(rows
            .iter()
            .map(|row| ValueKey::new(&row.value(field)).and_then(|key| targets.get(&key).cloned()))
            .collect())
    }

    /// Loads the `R` rows pointing at each of `rows` through the mapped
    /// collection `relation`. The result is aligned with `rows`; each group
    /// is ordered by `R`'s key.
    ///
    /// # Errors
    /// - `Db(Model(InvalidRelation))` when the mapping of `relation` is not a
    ///   collection of `R`'s table.
    pub fn load_collection<T: Entity, R: Entity>(
        &self,
        rows: &[T],
        relation: T::Relation,
    ) -> RepoResult<Vec<Vec<R>>> {
        let relation_map = self.relation_map::<T, R>(relation)?;
        let RelationKind::Collection { foreign_key, .. } = &relation_map.kind else {
            return Err(invalid_relation::<T>(relation, "is not a collection"));
        };
        let field = field_for_column::<R>(foreign_key)
            .ok_or_else(|| invalid_relation::<T>(relation, "foreign key is not a target field"))?;

        let keys: Vec<Value> = rows.iter().map(|row| row.key()).collect();
        let mut grouped: HashMap<ValueKey, Vec<R>> = HashMap::new();
        for related in self.query_in::<R>(field, &keys)? {
            if let Some(key) = ValueKey::new(&related.value(field)) {
                grouped.entry(key).or_default().push(related);
            }
        }

        Ok(rows
            .iter()
            .map(|row| {
                ValueKey::new(&row.key())
                    .and_then(|key| grouped.remove(&key))
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Applies every entry of `changes` in one immediate transaction.
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    /// - `NotFound` when a modified or deleted entity has no row; nothing is
    ///   committed.
    /// - `Db` for any store failure, including constraint violations.
    pub fn save_changes<T: Entity>(&mut self, changes: &ChangeSet<'_, T>) -> RepoResult<usize> {
        let table = self.table::<T>()?;
        if changes.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let affected = apply_changes(&tx, table, changes)?;
        tx.commit()?;

        Ok(affected)
    }

    /// Loads every `T` matching `predicate`, marks each deleted and commits,
    /// all inside one immediate transaction. Returns the number removed.
    pub fn delete_where<T: Entity>(&mut self, predicate: &Predicate<T::Field>) -> RepoResult<usize> {
        let table = self.table::<T>()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let matches = select_rows::<T>(&tx, table, predicate, None)?;
        let mut changes = ChangeSet::new();
        for entity in &matches {
            changes.delete(entity);
        }
        let removed = apply_changes(&tx, table, &changes)?;
        tx.commit()?;

        Ok(removed)
    }

    fn relation_map<T: Entity, R: Entity>(
        &self,
        relation: T::Relation,
    ) -> RepoResult<&'ctx RelationMap> {
        let table = self.table::<T>()?;
        let target = self.table::<R>()?;
        let relation_map = table
            .relation(relation.name())
            .ok_or_else(|| invalid_relation::<T>(relation, "is not mapped"))?;
        if relation_map.target() != target.name() {
            return Err(invalid_relation::<T>(
                relation,
                &format!("targets `{}`, not `{}`", relation_map.target(), target.name()),
            ));
        }
        Ok(relation_map)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!(
            "event=session_close module=context status=ok context={} session={} duration_ms={}",
            self.context.name(),
            self.id,
            self.opened_at.elapsed().as_millis()
        );
    }
}

/// Hashable form of a non-null key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Integer(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl ValueKey {
    fn new(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Integer(number) => Some(Self::Integer(*number)),
            Value::Real(number) => Some(Self::Real(number.to_bits())),
            Value::Text(text) => Some(Self::Text(text.clone())),
            Value::Blob(bytes) => Some(Self::Blob(bytes.clone())),
        }
    }
}

fn invalid_relation<T: Entity>(relation: T::Relation, reason: &str) -> RepoError {
    RepoError::Db(DbError::Model(ModelError::InvalidRelation {
        table: short_type_name::<T>(),
        relation: relation.name(),
        reason: reason.to_string(),
    }))
}

fn field_for_column<T: Entity>(column: &str) -> Option<T::Field> {
    T::Field::ALL
        .iter()
        .copied()
        .find(|field| field.column_name() == column)
}

fn select_rows<T: Entity>(
    conn: &Connection,
    table: &TableMap,
    predicate: &Predicate<T::Field>,
    limit: Option<u32>,
) -> RepoResult<Vec<T>> {
    let mut binds = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        column_list::<T>(),
        quote_ident(table.name()),
        predicate.to_sql(&mut binds),
        quote_ident(T::KEY.column_name())
    );
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(i64::from(limit)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(T::from_row(row)?);
    }

    Ok(entities)
}

fn apply_changes<T: Entity>(
    conn: &Connection,
    table: &TableMap,
    changes: &ChangeSet<'_, T>,
) -> RepoResult<usize> {
    let mut affected = 0;
    for (state, entity) in changes.entries() {
        let changed = match state {
            EntryState::Added => conn.execute(
                &insert_sql::<T>(table),
                params_from_iter(T::Field::ALL.iter().map(|field| entity.value(*field))),
            )?,
            EntryState::Modified => {
                let values = non_key_fields::<T>()
                    .map(|field| entity.value(field))
                    .chain(std::iter::once(entity.key()));
                conn.execute(&update_sql::<T>(table), params_from_iter(values))?
            }
            EntryState::Deleted => conn.execute(&delete_sql::<T>(table), [entity.key()])?,
        };
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: table.name(),
                key: display_value(&entity.key()),
            });
        }
        affected += changed;
    }
    Ok(affected)
}

fn column_list<T: Entity>() -> String {
    T::Field::ALL
        .iter()
        .map(|field| quote_ident(field.column_name()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_key_fields<T: Entity>() -> impl Iterator<Item = T::Field> {
    T::Field::ALL
        .iter()
        .copied()
        .filter(|field| *field != T::KEY)
}

fn insert_sql<T: Entity>(table: &TableMap) -> String {
    let placeholders = vec!["?"; T::Field::ALL.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_ident(table.name()),
        column_list::<T>()
    )
}

fn update_sql<T: Entity>(table: &TableMap) -> String {
    let key = quote_ident(T::KEY.column_name());
    let mut assignments = non_key_fields::<T>()
        .map(|field| format!("{} = ?", quote_ident(field.column_name())))
        .collect::<Vec<_>>();
    if assignments.is_empty() {
        assignments.push(format!("{key} = {key}"));
    }
    format!(
        "UPDATE {} SET {} WHERE {key} = ?",
        quote_ident(table.name()),
        assignments.join(", ")
    )
}

fn delete_sql<T: Entity>(table: &TableMap) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(table.name()),
        quote_ident(T::KEY.column_name())
    )
}
