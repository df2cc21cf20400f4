use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use grocer_core::domain::product::{Product, ProductId};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String =
        row.try_get("product_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit: String = row.try_get("unit").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stock_quantity: i64 =
        row.try_get("stock_quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = Decimal::from_str(&price_str)
        .map_err(|e| RepositoryError::Decode(format!("invalid price for {id}: {e}")))?;

    Ok(Product { id: ProductId(id), name, category, price, unit, stock_quantity, description })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM products")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("count").map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn clear(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM products").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn upsert_many(&self, products: &[Product]) -> Result<u64, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for product in products {
            let result = sqlx::query(
                "INSERT INTO products (product_id, product_name, category, price, unit,
                                       stock_quantity, description, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(product_id) DO UPDATE SET
                     product_name = excluded.product_name,
                     category = excluded.category,
                     price = excluded.price,
                     unit = excluded.unit,
                     stock_quantity = excluded.stock_quantity,
                     description = excluded.description,
                     updated_at = excluded.updated_at",
            )
            .bind(&product.id.0)
            .bind(&product.name)
            .bind(&product.category)
            .bind(product.price.to_string())
            .bind(&product.unit)
            .bind(product.stock_quantity)
            .bind(&product.description)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT product_id, product_name, category, price, unit, stock_quantity, description
             FROM products
             ORDER BY category, product_name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT DISTINCT category FROM products ORDER BY category")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string())))
            .collect()
    }
}
