use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use grocer_core::domain::order::{Order, OrderId, OrderStatus};
use grocer_core::domain::product::Product;

use super::{OrderRepository, ProductRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn count(&self) -> Result<i64, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.len() as i64)
    }

    async fn clear(&self) -> Result<u64, RepositoryError> {
        let mut products = self.products.write().await;
        let removed = products.len() as u64;
        products.clear();
        Ok(removed)
    }

    async fn upsert_many(&self, batch: &[Product]) -> Result<u64, RepositoryError> {
        let mut products = self.products.write().await;
        for product in batch {
            products.insert(product.id.0.clone(), product.clone());
        }
        Ok(batch.len() as u64)
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut listed: Vec<Product> = products.values().cloned().collect();
        listed.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(listed)
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let products = self.products.read().await;
        let categories: BTreeSet<String> =
            products.values().map(|product| product.category.clone()).collect();
        Ok(categories.into_iter().collect())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut orders = self.orders.write().await;
        let Some(existing) = orders.get_mut(&id.0) else {
            return Ok(None);
        };
        *existing = existing.clone().with_status(status, at);
        Ok(Some(existing.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use grocer_core::domain::order::{OrderId, OrderStatus, PlaceOrder};

    use crate::fixtures::CatalogSeed;
    use crate::repositories::{
        InMemoryOrderRepository, InMemoryProductRepository, OrderRepository, ProductRepository,
    };

    #[tokio::test]
    async fn in_memory_products_sort_like_sql() {
        let repo = InMemoryProductRepository::default();
        repo.upsert_many(&CatalogSeed::products()).await.expect("upsert");

        let listed = repo.list_all().await.expect("list");
        assert_eq!(listed.len(), 17);
        assert_eq!(listed[0].name, "White Bread");
        assert_eq!(listed.last().map(|p| p.name.as_str()), Some("Tomatoes"));
        assert_eq!(repo.categories().await.expect("categories"), CatalogSeed::categories());
    }

    #[tokio::test]
    async fn in_memory_orders_update_status() {
        let repo = InMemoryOrderRepository::default();
        let order = PlaceOrder {
            customer_id: "cust-1".to_string(),
            customer_name: "Jo".to_string(),
            items: vec![json!({"product_id": "EGG001", "quantity": 1})],
            total_amount: Decimal::new(750, 2),
            delivery_address: None,
        }
        .into_order(Utc::now());
        let id = order.id.clone();
        repo.save(order).await.expect("save");

        let updated = repo
            .update_status(&id, OrderStatus::Delivered, Utc::now())
            .await
            .expect("update")
            .expect("present");
        assert_eq!(updated.status, OrderStatus::Delivered);

        let missing = OrderId("ORD-missing".to_string());
        assert!(repo
            .update_status(&missing, OrderStatus::Cancelled, Utc::now())
            .await
            .expect("update")
            .is_none());
    }
}
