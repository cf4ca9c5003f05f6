//! Talks to a running Dudwalls server.
//!
//! ```text
//! DUDWALLS_ENDPOINT=https://db.example.com DUDWALLS_API_KEY=... \
//!     RUST_LOG=dudwalls=debug cargo run --example quickstart
//! ```

use dudwalls::{http::HttpStoreBuilder, prelude::*};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> DocumentStoreResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = DudwallsClient::new(HttpStoreBuilder::from_env()?.build().await?);
    client.ping().await?;

    if !client.list_databases().await?.iter().any(|name| name == "demo") {
        client.create_database("demo").await?;
    }

    let db = client.database("demo");
    db.create_collection("users").await?;
    let users = db.collection("users");

    users
        .insert_many(vec![
            document(json!({"name": "Ann", "age": 31, "role": "admin"}))?,
            document(json!({"name": "Bo", "age": 17, "role": "guest"}))?,
            document(json!({"name": "Cy", "age": 45, "role": "user"}))?,
        ])
        .await?;

    let adults = users
        .find_json(&json!({
            "where": {"age": {"$gte": 18}},
            "orderBy": {"age": "desc"},
            "select": ["name", "age"],
        }))
        .await?;
    tracing::info!(count = adults.len(), "adults: {adults:?}");

    let by_role = users
        .aggregate_json(&json!([
            {"$group": {"_id": "$role", "count": {"$sum": 1}, "avgAge": {"$avg": "$age"}}},
            {"$sort": {"count": -1}},
        ]))
        .await?;
    tracing::info!("by role: {by_role:?}");

    let promoted = users
        .update_many(Filter::eq("role", "guest"), document(json!({"role": "user"}))?)
        .await?;
    tracing::info!(promoted, "promoted guests");

    db.drop_collection("users").await?;
    client.shutdown().await
}
