use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{error, info};

use grocer_db::repositories::{ProductRepository, RepositoryError, SqlProductRepository};
use grocer_db::{migrations, CatalogSeed, DbPool};

use crate::response::HandlerResponse;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogOperation {
    Insert,
    Select,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogRequest {
    pub operation: CatalogOperation,
    pub clear_existing: bool,
}

impl CatalogRequest {
    /// `operation` defaults to insert; `clear_existing` to false.
    pub fn from_event(event: &Value) -> Result<Self, String> {
        let operation = match event.get("operation").and_then(Value::as_str) {
            None => CatalogOperation::Insert,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "insert" => CatalogOperation::Insert,
                "select" => CatalogOperation::Select,
                other => return Err(format!("unsupported operation `{other}`, expected insert or select")),
            },
        };
        let clear_existing = event.get("clear_existing").and_then(Value::as_bool).unwrap_or(false);
        Ok(Self { operation, clear_existing })
    }
}

/// Runs the catalog event against the SQL store, creating the schema first.
pub async fn handle_with_pool(pool: &DbPool, event: &Value) -> HandlerResponse {
    if let Err(migration) = migrations::run_pending(pool).await {
        error!(event_name = "handler.catalog.migration_failed", error = %migration, "catalog schema setup failed");
        return failure(migration);
    }
    handle(&SqlProductRepository::new(pool.clone()), event).await
}

pub async fn handle(repository: &dyn ProductRepository, event: &Value) -> HandlerResponse {
    let request = match CatalogRequest::from_event(event) {
        Ok(request) => request,
        Err(details) => {
            return HandlerResponse::bad_request(json!({
                "error": "Validation error",
                "details": details,
            }))
        }
    };

    let result = match request.operation {
        CatalogOperation::Select => select(repository).await,
        CatalogOperation::Insert => insert(repository, request.clear_existing).await,
    };

    match result {
        Ok(body) => HandlerResponse::ok(body),
        Err(repository_error) => {
            error!(event_name = "handler.catalog.failed", error = %repository_error, "catalog operation failed");
            failure(repository_error)
        }
    }
}

fn failure(error: impl std::fmt::Display) -> HandlerResponse {
    HandlerResponse::internal(json!({ "error": format!("Error populating database: {error}") }))
}

async fn select(repository: &dyn ProductRepository) -> Result<Value, RepositoryError> {
    if repository.count().await? == 0 {
        return Ok(json!({ "message": "No products found in the catalog.", "total_products": 0 }));
    }

    let products = repository.list_all().await?;
    let categories = repository.categories().await?;
    info!(event_name = "handler.catalog.listed", total = products.len(), "catalog listed");
    Ok(json!({
        "message": format!("Retrieved {} products", products.len()),
        "total_products": products.len(),
        "categories": categories,
        "products": products.iter().map(|product| product.to_listing()).collect::<Vec<_>>(),
    }))
}

async fn insert(
    repository: &dyn ProductRepository,
    clear_existing: bool,
) -> Result<Value, RepositoryError> {
    let existing = repository.count().await?;
    if existing > 0 {
        if !clear_existing {
            return Ok(json!({
                "message": format!(
                    "Database already contains {existing} products. Pass 'clear_existing': true in the event to clear them first."
                ),
                "existing_count": existing,
                "inserted": 0,
            }));
        }
        let removed = repository.clear().await?;
        info!(event_name = "handler.catalog.cleared", removed, "existing products deleted");
    }

    let products = CatalogSeed::products();
    let inserted = repository.upsert_many(&products).await?;
    let total = repository.count().await?;

    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    for product in &products {
        *categories.entry(product.category.as_str()).or_default() += 1;
    }

    info!(event_name = "handler.catalog.populated", inserted, total, "catalog populated");
    Ok(json!({
        "message": format!("Successfully populated {} products", products.len()),
        "total_products": total,
        "categories": categories,
        "inserted": inserted,
    }))
}
