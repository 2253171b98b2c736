//! Round-trips a relation product's metadata against a live Postgres
//! instance. Ignored by default: set `DATABASE_URL` and run with
//! `cargo test --test postgres_relation -- --ignored` against a disposable
//! database.

use std::sync::Arc;

use kiln::client::PostgresClient;
use kiln::identifier::RelationKind;
use kiln::product::{Metadata, Product, RelationProduct};

#[tokio::test]
#[ignore = "requires a live Postgres instance via DATABASE_URL"]
async fn relation_metadata_round_trips_through_comment() {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let client = Arc::new(
        PostgresClient::connect(&database_url)
            .await
            .expect("failed to connect"),
    );

    client
        .execute("CREATE TABLE IF NOT EXISTS kiln_test_wine (id integer)")
        .await
        .unwrap();

    let product = RelationProduct::new("public", "kiln_test_wine", RelationKind::Table, client);
    assert!(product.exists().await.unwrap());

    let metadata = Metadata {
        timestamp: Some(123.0),
        stored_source_code: Some("CREATE TABLE kiln_test_wine (id integer)".to_string()),
    };
    product.save_metadata(&metadata).await.unwrap();

    let fetched = product.fetch_metadata().await.unwrap();
    assert_eq!(fetched, metadata);

    product.delete(true).await.unwrap();
    assert!(!product.exists().await.unwrap());
}
