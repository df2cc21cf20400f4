use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::Row;

use grocer_core::domain::order::{Order, OrderId, OrderStatus};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{value}`: {e}")))
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let id: String = row.try_get("order_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_id: String =
        row.try_get("customer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_name: String =
        row.try_get("customer_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let items_json: String =
        row.try_get("items_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_str: String =
        row.try_get("total_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("order_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let delivery_address: Option<String> =
        row.try_get("delivery_address").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let items: Vec<Value> = serde_json::from_str(&items_json)
        .map_err(|e| RepositoryError::Decode(format!("invalid items for {id}: {e}")))?;
    let total_amount = Decimal::from_str(&total_str)
        .map_err(|e| RepositoryError::Decode(format!("invalid total for {id}: {e}")))?;
    let status = OrderStatus::from_str(&status_str)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Order {
        id: OrderId(id),
        customer_id,
        customer_name,
        items,
        total_amount,
        status,
        delivery_address,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT order_id, customer_id, customer_name, items_json, total_amount,
                    order_status, delivery_address, created_at, updated_at
             FROM orders WHERE order_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let items_json = serde_json::to_string(&order.items)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO orders (order_id, customer_id, customer_name, items_json, total_amount,
                                 order_status, delivery_address, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(order_id) DO UPDATE SET
                 customer_name = excluded.customer_name,
                 items_json = excluded.items_json,
                 total_amount = excluded.total_amount,
                 order_status = excluded.order_status,
                 delivery_address = excluded.delivery_address,
                 updated_at = excluded.updated_at",
        )
        .bind(&order.id.0)
        .bind(&order.customer_id)
        .bind(&order.customer_name)
        .bind(items_json)
        .bind(order.total_amount.to_string())
        .bind(order.status.as_str())
        .bind(&order.delivery_address)
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET order_status = ?, updated_at = ? WHERE order_id = ?")
                .bind(status.as_str())
                .bind(at.to_rfc3339())
                .bind(&id.0)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use grocer_core::domain::order::{OrderId, OrderStatus, PlaceOrder};

    use super::SqlOrderRepository;
    use crate::repositories::OrderRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlOrderRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlOrderRepository::new(pool)
    }

    fn sample_request() -> PlaceOrder {
        PlaceOrder {
            customer_id: "C123-4567-89".to_string(),
            customer_name: "Alex".to_string(),
            items: vec![json!({"product_id": "MILK002", "quantity": 2})],
            total_amount: Decimal::new(840, 2),
            delivery_address: Some("12 Harbour Rd".to_string()),
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_order() {
        let repo = setup().await;
        let order = sample_request().into_order(Utc::now());
        let id = order.id.clone();

        repo.save(order.clone()).await.expect("save");
        let loaded = repo.find_by_id(&id).await.expect("find").expect("order present");

        assert_eq!(loaded.id, order.id);
        assert_eq!(loaded.total_amount, Decimal::new(840, 2));
        assert_eq!(loaded.items, order.items);
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.delivery_address.as_deref(), Some("12 Harbour Rd"));
    }

    #[tokio::test]
    async fn update_status_returns_updated_order() {
        let repo = setup().await;
        let placed_at = Utc::now();
        let order = sample_request().into_order(placed_at);
        let id = order.id.clone();
        repo.save(order).await.expect("save");

        let updated = repo
            .update_status(&id, OrderStatus::Shipped, placed_at + Duration::minutes(5))
            .await
            .expect("update")
            .expect("order present");

        assert_eq!(updated.status, OrderStatus::Shipped);
        assert!(updated.updated_at > updated.created_at);
    }

    #[tokio::test]
    async fn missing_order_is_none() {
        let repo = setup().await;
        let id = OrderId("ORD-20250101000000-nobody".to_string());

        assert!(repo.find_by_id(&id).await.expect("find").is_none());
        assert!(repo
            .update_status(&id, OrderStatus::Cancelled, Utc::now())
            .await
            .expect("update")
            .is_none());
    }
}
