use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use grocer_core::domain::order::{Order, OrderId, OrderStatus};
use grocer_core::errors::ApplicationError;
use grocer_core::domain::product::Product;

pub mod memory;
pub mod order;
pub mod product;

pub use memory::{InMemoryOrderRepository, InMemoryProductRepository};
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        Self::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn count(&self) -> Result<i64, RepositoryError>;
    async fn clear(&self) -> Result<u64, RepositoryError>;
    /// Inserts or replaces every product; returns the number written.
    async fn upsert_many(&self, products: &[Product]) -> Result<u64, RepositoryError>;
    /// All products ordered by category, then name.
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn categories(&self) -> Result<Vec<String>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
    /// Returns the updated order, or `None` when no order has that id.
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError>;
}
