//! Docent — versioned JSON entity repository for Rust, powered by Postgres.

pub mod delegate;
pub mod entity;
mod error;
pub mod metrics;
pub mod repository;
pub mod schema;
pub mod store;
pub mod testing;

pub use delegate::{Delegated, QueryInterface, QueryOutcome, ReturnShape};
pub use entity::{Entity, Metadata};
pub use error::{Error, Result, WithContext};
pub use repository::Repository;
pub use store::Store;

pub mod prelude {
    pub use crate::{Delegated, Entity, Metadata, QueryInterface, Repository, Result, Store};
}

#[doc(hidden)]
pub mod __private {
    pub use serde;
    pub use serde_json;
}
