//! Generic repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide get-all / filter / single lookups with optional eager loading.
//! - Provide create / update / delete, each as its own unit of work.
//!
//! # Invariants
//! - Every call opens exactly one session and drops it before returning.
//! - Include selectors are checked against the model before the session opens.
//! - Update overwrites every mapped column of the row; there are no partial
//!   updates.
//! - `delete_where` loads the matches, marks each deleted and commits, all in
//!   one immediate transaction.
//! - Outcomes are logged at debug level only; errors are returned unchanged.

use super::{RepoError, RepoResult};
use crate::context::{ChangeSet, DataContext};
use crate::entity::{short_type_name, Entity, Relation};
use crate::mapping::TableMap;
use crate::query::Predicate;
use log::debug;
use rusqlite::types::Value;
use std::marker::PhantomData;
use std::time::Instant;

/// Data access contract for one entity type.
pub trait Repository<T: Entity> {
    /// Returns every row of `T`.
    fn get_all(&self) -> RepoResult<Vec<T>>;
    /// Returns every row of `T` with `includes` eagerly loaded.
    fn get_all_with(&self, includes: &[T::Relation]) -> RepoResult<Vec<T>>;
    /// Returns the first row matching `predicate`, if any.
    fn single(&self, predicate: &Predicate<T::Field>) -> RepoResult<Option<T>>;
    fn single_with(
        &self,
        predicate: &Predicate<T::Field>,
        includes: &[T::Relation],
    ) -> RepoResult<Option<T>>;
    /// Returns every row matching `predicate`.
    fn filter(&self, predicate: &Predicate<T::Field>) -> RepoResult<Vec<T>>;
    fn filter_with(
        &self,
        predicate: &Predicate<T::Field>,
        includes: &[T::Relation],
    ) -> RepoResult<Vec<T>>;
    /// Inserts `entity` and commits.
    fn create(&self, entity: &T) -> RepoResult<()>;
    /// Replaces the stored row with the same key and commits.
    fn update(&self, entity: &T) -> RepoResult<()>;
    /// Removes the stored row with the same key and commits.
    fn delete(&self, entity: &T) -> RepoResult<()>;
    /// Removes every row matching `predicate` and returns how many were removed.
    fn delete_where(&self, predicate: &Predicate<T::Field>) -> RepoResult<usize>;
}

/// SQLite-backed repository for any entity mapped in the context model.
pub struct SqliteRepository<T> {
    context: DataContext,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for SqliteRepository<T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> SqliteRepository<T> {
    /// Constructs a repository over `context`.
    ///
    /// # Errors
    /// - `UnmappedEntity` when `T` has no mapping in the context model.
    pub fn try_new(context: DataContext) -> RepoResult<Self> {
        let repo = Self {
            context,
            _entity: PhantomData,
        };
        repo.table()?;
        Ok(repo)
    }

    pub fn context(&self) -> &DataContext {
        &self.context
    }

    /// Looks up one row by primary key.
    pub fn find(&self, key: impl Into<Value>) -> RepoResult<Option<T>> {
        self.single(&Predicate::eq(T::KEY, key))
    }

    fn table(&self) -> RepoResult<&TableMap> {
        self.context
            .model()
            .table::<T>()
            .ok_or_else(|| RepoError::UnmappedEntity(short_type_name::<T>()))
    }

    fn table_name(&self) -> &'static str {
        self.table()
            .map(TableMap::name)
            .unwrap_or_else(|_| short_type_name::<T>())
    }

    fn check_includes(&self, includes: &[T::Relation]) -> RepoResult<()> {
        let table = self.table()?;
        for relation in includes {
            if table.relation(relation.name()).is_none() {
                return Err(RepoError::InvalidArgument(format!(
                    "include `{}` is not a mapped navigation member of `{}`",
                    relation.name(),
                    table.name()
                )));
            }
        }
        Ok(())
    }

    fn select(
        &self,
        op: &'static str,
        predicate: &Predicate<T::Field>,
        limit: Option<u32>,
        includes: &[T::Relation],
    ) -> RepoResult<Vec<T>> {
        let started_at = Instant::now();
        let result = self.check_includes(includes).and_then(|()| {
            self.context
                .with_session(|session| session.query_with::<T>(predicate, limit, includes))
        });
        self.finish(op, started_at, result, |rows| rows.len())
    }

    fn first(
        &self,
        op: &'static str,
        predicate: &Predicate<T::Field>,
        includes: &[T::Relation],
    ) -> RepoResult<Option<T>> {
        Ok(self
            .select(op, predicate, Some(1), includes)?
            .into_iter()
            .next())
    }

    fn save(&self, op: &'static str, changes: &ChangeSet<'_, T>) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self
            .context
            .with_session(|session| session.save_changes(changes));
        self.finish(op, started_at, result, |affected| *affected)
    }

    fn finish<R>(
        &self,
        op: &'static str,
        started_at: Instant,
        result: RepoResult<R>,
        rows: impl FnOnce(&R) -> usize,
    ) -> RepoResult<R> {
        match &result {
            Ok(value) => debug!(
                "event=repo_op module=repo status=ok op={op} table={} rows={} duration_ms={}",
                self.table_name(),
                rows(value),
                started_at.elapsed().as_millis()
            ),
            Err(err) => debug!(
                "event=repo_op module=repo status=error op={op} table={} duration_ms={} error={err}",
                self.table_name(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}

impl<T: Entity> Repository<T> for SqliteRepository<T> {
    fn get_all(&self) -> RepoResult<Vec<T>> {
        self.select("get_all", &Predicate::Always, None, &[])
    }

    fn get_all_with(&self, includes: &[T::Relation]) -> RepoResult<Vec<T>> {
        self.select("get_all", &Predicate::Always, None, includes)
    }

    fn single(&self, predicate: &Predicate<T::Field>) -> RepoResult<Option<T>> {
        self.first("single", predicate, &[])
    }

    fn single_with(
        &self,
        predicate: &Predicate<T::Field>,
        includes: &[T::Relation],
    ) -> RepoResult<Option<T>> {
        self.first("single", predicate, includes)
    }

    fn filter(&self, predicate: &Predicate<T::Field>) -> RepoResult<Vec<T>> {
        self.select("filter", predicate, None, &[])
    }

    fn filter_with(
        &self,
        predicate: &Predicate<T::Field>,
        includes: &[T::Relation],
    ) -> RepoResult<Vec<T>> {
        self.select("filter", predicate, None, includes)
    }

    fn create(&self, entity: &T) -> RepoResult<()> {
        let mut changes = ChangeSet::new();
        changes.add(entity);
        self.save("create", &changes).map(|_| ())
    }

    fn update(&self, entity: &T) -> RepoResult<()> {
        let mut changes = ChangeSet::new();
        changes.modify(entity);
        self.save("update", &changes).map(|_| ())
    }

    fn delete(&self, entity: &T) -> RepoResult<()> {
        let mut changes = ChangeSet::new();
        changes.delete(entity);
        self.save("delete", &changes).map(|_| ())
    }

    fn delete_where(&self, predicate: &Predicate<T::Field>) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self
            .context
            .with_session(|session| session.delete_where::<T>(predicate));
        self.finish("delete_where", started_at, result, |removed| *removed)
    }
}
