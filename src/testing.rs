use sqlx::{Pool, Postgres};

use crate::{schema::quote_ident, Result};

/// Drop and re-create an entity table plus its containment index. Intended
/// for tests and demos that want a clean slate per run.
pub async fn recreate_table(pool: &Pool<Postgres>, table: &str) -> Result<()> {
    let drop = format!("drop table if exists {}", quote_ident(table));
    sqlx::query(&drop).execute(pool).await?;
    crate::Repository::<serde_json::Value>::new(pool.clone(), table)
        .create_table()
        .await?
        .create_index()
        .await?;
    Ok(())
}
