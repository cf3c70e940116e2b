use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    delegate::{Delegated, QueryInterface},
    repository::Repository,
    Result,
};

/// Connection handle and repository factory. Cloning shares the pool.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    pub fn builder(url: impl Into<String>) -> StoreBuilder {
        StoreBuilder::new(url)
    }

    /// Wrap an existing pool, e.g. one shared with other components.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bind an entity type to its table. The table name is explicit
    /// configuration; [`crate::schema::derived_table_name`] gives the
    /// conventional mapping from a type name.
    pub fn repository<T>(&self, table: impl Into<String>) -> Repository<T> {
        Repository::new(self.pool.clone(), table)
    }

    /// Construct a repository and lift a query interface onto it in one call.
    pub fn lift<T>(
        &self,
        table: impl Into<String>,
        interface: QueryInterface,
    ) -> Result<Delegated<T>> {
        interface.lift(self.repository(table))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Lightweight liveness check for the connection pool.
    pub async fn pool_health(&self) -> Result<PoolHealth> {
        let one: i32 = sqlx::query_scalar("select 1").fetch_one(&self.pool).await?;
        Ok(PoolHealth { ok: one == 1 })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PoolHealth {
    pub ok: bool,
}

pub struct StoreBuilder {
    url: String,
    max_connections: Option<u32>,
    connect_timeout: Option<Duration>,
}

impl StoreBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: None,
            connect_timeout: None,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max.max(1));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> Result<Store> {
        let mut opts = PgPoolOptions::new();
        if let Some(max) = self.max_connections {
            opts = opts.max_connections(max);
        }
        if let Some(t) = self.connect_timeout {
            opts = opts.acquire_timeout(t);
        }
        let pool = opts.connect(&self.url).await?;
        Ok(Store { pool })
    }
}
