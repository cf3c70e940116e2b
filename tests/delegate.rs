use anyhow::Result;
use docent::{Entity, Error, QueryInterface, Repository, ReturnShape, Store};
use serde::{Deserialize, Serialize};
use serde_json::json;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct Point {
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<i64>,
}

impl Point {
    fn at(x: i64, y: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }
}

docent::query_interface! {
    pub struct PointQueries for Point {
        fn with_x(x) -> all("where data->'x' = $1");
        fn first_with_x(x) -> first("where data->'x' = $1");
        fn require_with_x(x) -> one("where data->'x' = $1");
        fn everything() -> all("");
    }
}

/// Methods with concrete bodies compose against the bound repository.
trait PointCommands {
    fn repo(&self) -> &Repository<Point>;

    async fn store(&self, point: Point) -> docent::Result<Entity<Point>> {
        self.repo().save(Entity::new(point)).await
    }
}

impl PointCommands for PointQueries {
    fn repo(&self) -> &Repository<Point> {
        self.repository()
    }
}

async fn postgres() -> Result<(ContainerAsync<GenericImage>, Store)> {
    let image = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", "postgres")
        .with_env_var("POSTGRES_PASSWORD", "postgres");
    let container = image.start().await?;
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres?sslmode=disable");
    let store = Store::connect(&url).await?;
    Ok((container, store))
}

#[tokio::test]
async fn declared_queries_dispatch_per_shape() -> Result<()> {
    let (_pg, store) = postgres().await?;
    let repo = store.repository::<Point>("points");
    repo.create_table().await?.create_index().await?;

    let queries = PointQueries::lift(repo.clone())?;
    for point in [Point::at(1, 2), Point::at(2, 5), Point::at(3, 3)] {
        repo.save(Entity::new(point)).await?;
    }

    let matched = queries.with_x(2).await?;
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].record(), &Point::at(2, 5));

    assert_eq!(queries.everything().await?.len(), 3);

    let first = queries.first_with_x(3).await?.expect("x = 3 is stored");
    assert_eq!(first.record(), &Point::at(3, 3));
    assert!(queries.first_with_x(9).await?.is_none());

    let required = queries.require_with_x(1).await?;
    assert_eq!(required.record(), &Point::at(1, 2));
    let err = queries
        .require_with_x(9)
        .await
        .expect_err("x = 9 is not stored");
    assert!(matches!(err, Error::NotFound));

    Ok(())
}

#[tokio::test]
async fn concrete_methods_reach_the_bound_repository() -> Result<()> {
    let (_pg, store) = postgres().await?;
    let repo = store.repository::<Point>("points");
    repo.create_table().await?.create_index().await?;

    let queries = PointQueries::lift(repo)?;
    let stored = queries.store(Point::at(7, 7)).await?;
    assert_eq!(stored.metadata().unwrap().version, 0);

    let found = queries.require_with_x(7).await?;
    assert_eq!(found, stored);
    Ok(())
}

#[tokio::test]
async fn registration_table_dispatches_by_method_name() -> Result<()> {
    let (_pg, store) = postgres().await?;
    store
        .repository::<Point>("points")
        .create_table()
        .await?
        .create_index()
        .await?;

    let delegated = store.lift::<Point>(
        "points",
        QueryInterface::new("PointInterface")
            .method("with_x", "where data->'x' = $1", 1, ReturnShape::All)
            .method("any_at_all", "", 0, ReturnShape::First),
    )?;

    delegated
        .repository()
        .save(Entity::new(Point::at(2, 5)))
        .await?;

    let matched = delegated
        .invoke("with_x", &[json!(2)])
        .await?
        .into_entities()?;
    assert_eq!(matched.len(), 1);

    let any = delegated.invoke("any_at_all", &[]).await?.into_first()?;
    assert!(any.is_some());

    // dispatch misuse is rejected at the lookup, before touching storage
    let err = delegated
        .invoke("nope", &[])
        .await
        .expect_err("unknown method");
    assert!(matches!(err, Error::InvalidArgument(_)));
    let err = delegated
        .invoke("with_x", &[])
        .await
        .expect_err("missing parameter");
    assert!(matches!(err, Error::InvalidArgument(_)));

    Ok(())
}

#[tokio::test]
async fn unsatisfiable_interfaces_fail_at_lift_time() -> Result<()> {
    let (_pg, store) = postgres().await?;

    let err = store
        .lift::<Point>(
            "points",
            QueryInterface::new("Broken").method(
                "with_pair",
                "where data->'x' = $1",
                2,
                ReturnShape::All,
            ),
        )
        .expect_err("parameter-count mismatch must fail eagerly");
    match err {
        Error::Construction {
            interface, method, ..
        } => {
            assert_eq!(interface, "Broken");
            assert_eq!(method, "with_pair");
        }
        other => panic!("wrong error: {other:?}"),
    }
    Ok(())
}
