//! Runs the same client API against the in-memory backend, then queries a
//! plain document slice with the engine alone.

use dudwalls::{document::documents_from_value, memory::InMemoryStore, prelude::*};
use serde_json::json;

#[tokio::main]
async fn main() -> DocumentStoreResult<()> {
    tracing_subscriber::fmt().init();

    let client = DudwallsClient::new(InMemoryStore::builder().build().await?);
    let orders = client.database("shop").collection("orders");

    orders
        .insert_many(documents_from_value(json!([
            {"customer": "ann", "total": 40, "status": "paid"},
            {"customer": "bo", "total": 15, "status": "open"},
            {"customer": "ann", "total": 25, "status": "paid"},
        ]))?)
        .await?;

    let paid = orders.count_documents(Filter::eq("status", "paid")).await?;
    let customers = orders.distinct("customer", None).await?;
    println!("{paid} paid orders from {customers:?}");

    let revenue = orders
        .aggregate(
            &Pipeline::new().filter(Filter::eq("status", "paid")).group(
                GroupSpec::by_field("customer")
                    .accumulate("orders", Accumulator::count())
                    .accumulate("revenue", Accumulator::sum(GroupSource::field("total"))),
            ),
        )
        .await?;
    println!("revenue: {}", serde_json::to_string_pretty(&revenue)?);

    let page = orders
        .find_page(Query::builder().sort("total", SortDirection::Desc).build(), PaginationParams::new(1, 2))
        .await?;
    println!("page 1 of {}: {:?}", page.total_pages(), page.items);

    let engine = QueryEngine::builder().strict(true).build();
    let snapshot = orders.find(Query::new()).await?;
    let large = engine.find_json(&snapshot, &json!({"where": {"total": {"$gt": 20}}, "select": ["total"]}))?;
    println!("large totals: {large:?}");

    client.shutdown().await
}
