use std::fmt;
use std::marker::PhantomData;
use std::time::Instant;

use indoc::formatdoc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::{
    entity::{Entity, Metadata},
    metrics,
    schema::quote_ident,
    Error, Result,
};

const SLOW_QUERY_MS: u128 = 250;

/// Containment filter used by the `*_like` query variants: every field of the
/// example document must appear in the stored document.
const CONTAINS_FRAGMENT: &str = "where data @> $1";

/// Persistence engine for one entity type backed by one table.
///
/// Rows are `(id, version, data)`; `data` is the jsonb document produced by
/// serializing the record. Metadata is never embedded in the document. The
/// repository holds no per-entity state and is safe to share across tasks.
pub struct Repository<T> {
    pool: PgPool,
    table: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> Repository<T> {
    pub(crate) fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the backing table if it does not exist. Idempotent; returns
    /// `&self` for chaining with [`create_index`](Self::create_index).
    pub async fn create_table(&self) -> Result<&Self> {
        let sql = formatdoc!(
            "
            create table if not exists {table} (
                id bigint generated always as identity primary key,
                version bigint not null,
                data jsonb not null
            )",
            table = quote_ident(&self.table),
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        self.verify_identity_stability().await?;
        Ok(self)
    }

    /// Create the containment index over `data` if it does not exist.
    /// Idempotent; returns `&self` for chaining.
    pub async fn create_index(&self) -> Result<&Self> {
        let sql = formatdoc!(
            "
            create index if not exists {index} on {table}
                using gin (data jsonb_path_ops)",
            index = quote_ident(&format!("{}_data_idx", self.table)),
            table = quote_ident(&self.table),
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(self)
    }

    /// Conflict detection compares row versions, so a generated identity must
    /// never be reused after a delete. A cycling identity sequence (or a table
    /// created elsewhere without one) violates that precondition.
    async fn verify_identity_stability(&self) -> Result<()> {
        let cycles: Option<bool> = sqlx::query_scalar(
            "select s.seqcycle from pg_sequence s
              where s.seqrelid = pg_get_serial_sequence($1, 'id')::regclass",
        )
        .bind(quote_ident(&self.table))
        .fetch_optional(&self.pool)
        .await?;
        match cycles {
            Some(false) => Ok(()),
            Some(true) => Err(Error::InvalidState(format!(
                "identity sequence of table {} cycles; identities must be stable",
                self.table
            ))),
            None => Err(Error::InvalidState(format!(
                "table {} has no generated identity sequence",
                self.table
            ))),
        }
    }

    /// Remove every row for this entity type. Not isolated from concurrent
    /// writers.
    pub async fn delete_all(&self) -> Result<()> {
        let sql = format!("delete from {}", quote_ident(&self.table));
        let done = sqlx::query(&sql).execute(&self.pool).await?;
        metrics::record_delete(done.rows_affected());
        Ok(())
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Persist the entity and return the value carrying its new metadata.
    ///
    /// A transient entity is inserted with version 0 and the generated
    /// identity attached. A persisted entity is updated through a single
    /// atomic statement matching on its current version; a stale version
    /// yields [`Error::Conflict`] and the row is left untouched. Of two
    /// concurrent saves starting from the same version, exactly one succeeds.
    pub async fn save(&self, entity: Entity<T>) -> Result<Entity<T>> {
        let (record, metadata) = entity.into_parts();
        match metadata {
            None => self.insert(record).await,
            Some(meta) => self.update(record, meta).await,
        }
    }

    async fn insert(&self, record: T) -> Result<Entity<T>> {
        let doc = serde_json::to_value(&record)?;
        let sql = format!(
            "insert into {} (version, data) values (0, $1) returning id",
            quote_ident(&self.table)
        );
        let id: i64 = sqlx::query_scalar(&sql)
            .bind(doc)
            .fetch_one(&self.pool)
            .await?;
        metrics::record_write();
        tracing::debug!(target: "docent::write", table = %self.table, id, "entity inserted");
        Ok(Entity::persisted(record, Metadata::new(id, 0)))
    }

    async fn update(&self, record: T, meta: Metadata) -> Result<Entity<T>> {
        let doc = serde_json::to_value(&record)?;
        let sql = format!(
            "update {} set data = $1, version = version + 1 \
             where id = $2 and version = $3 returning version",
            quote_ident(&self.table)
        );
        let returned: Option<i64> = sqlx::query_scalar(&sql)
            .bind(doc)
            .bind(meta.identity)
            .bind(meta.version)
            .fetch_optional(&self.pool)
            .await?;
        match returned {
            Some(version) if version == meta.version + 1 => {
                metrics::record_write();
                tracing::debug!(
                    target: "docent::write",
                    table = %self.table,
                    id = meta.identity,
                    version,
                    "entity updated"
                );
                Ok(Entity::persisted(record, meta.bumped()))
            }
            _ => {
                metrics::record_conflict();
                tracing::warn!(
                    target: "docent::write",
                    table = %self.table,
                    id = meta.identity,
                    expected = meta.version,
                    "stale version on update"
                );
                Err(Error::Conflict)
            }
        }
    }

    /// Delete the stored row for a persisted entity. Version is ignored: any
    /// persisted identity is deletable.
    pub async fn delete(&self, entity: &Entity<T>) -> Result<()> {
        let meta = entity.metadata().ok_or_else(|| {
            Error::InvalidArgument("cannot delete a transient entity".into())
        })?;
        let sql = format!("delete from {} where id = $1", quote_ident(&self.table));
        let done = sqlx::query(&sql)
            .bind(meta.identity)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(Error::InvalidState(format!(
                "no row with identity {} in table {}",
                meta.identity, self.table
            )));
        }
        metrics::record_delete(done.rows_affected());
        Ok(())
    }

    /// Run a caller-supplied filter fragment (`where …`, `order by …`, or
    /// empty for all rows) with positional `$n` parameters bound as jsonb.
    /// Row order is whatever Postgres returns.
    pub async fn search_all(&self, fragment: &str, params: &[Value]) -> Result<Vec<Entity<T>>> {
        let sql = select_sql(&self.table, fragment, false);
        let rows = self.fetch_rows(&sql, params).await?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    /// Like [`search_all`](Self::search_all) but with a single-row limit,
    /// returning `None` instead of erroring when nothing matches.
    pub async fn search_first(
        &self,
        fragment: &str,
        params: &[Value],
    ) -> Result<Option<Entity<T>>> {
        let sql = select_sql(&self.table, fragment, true);
        let rows = self.fetch_rows(&sql, params).await?;
        rows.into_iter().next().map(|row| self.hydrate(row)).transpose()
    }

    /// Every stored entity whose document structurally contains all fields of
    /// the example.
    pub async fn search_all_like(&self, example: &T) -> Result<Vec<Entity<T>>> {
        self.search_all(CONTAINS_FRAGMENT, &[serde_json::to_value(example)?])
            .await
    }

    pub async fn search_first_like(&self, example: &T) -> Result<Option<Entity<T>>> {
        self.search_first(CONTAINS_FRAGMENT, &[serde_json::to_value(example)?])
            .await
    }

    /// [`search_first`](Self::search_first) that fails with
    /// [`Error::NotFound`] when nothing matches.
    pub async fn find_first(&self, fragment: &str, params: &[Value]) -> Result<Entity<T>> {
        self.search_first(fragment, params)
            .await?
            .ok_or(Error::NotFound)
    }

    pub async fn find_first_like(&self, example: &T) -> Result<Entity<T>> {
        self.search_first_like(example).await?.ok_or(Error::NotFound)
    }

    async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<(Value, i64, i64)>> {
        let start = Instant::now();
        let mut query = sqlx::query_as::<_, (Value, i64, i64)>(sql);
        for param in params {
            query = query.bind(param.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() >= SLOW_QUERY_MS {
            tracing::warn!(
                target: "docent::slow_query",
                elapsed_ms = elapsed.as_millis() as u64,
                sql = %sql,
                "slow entity query"
            );
        }
        metrics::record_read(rows.len() as u64);
        Ok(rows)
    }

    fn hydrate(&self, (doc, id, version): (Value, i64, i64)) -> Result<Entity<T>> {
        let record: T = serde_json::from_value(doc)?;
        Ok(Entity::persisted(record, Metadata::new(id, version)))
    }
}

fn select_sql(table: &str, fragment: &str, limit_one: bool) -> String {
    let mut sql = format!("select data, id, version from {}", quote_ident(table));
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        sql.push(' ');
        sql.push_str(fragment);
    }
    if limit_one {
        sql.push_str(" limit 1");
    }
    sql
}
