pub mod config;
pub mod domain;
pub mod errors;
pub mod payload;

pub use domain::order::{Order, OrderId, OrderStatus, PlaceOrder};
pub use domain::product::{Product, ProductId};
pub use errors::{ApplicationError, DomainError};
pub use payload::{normalize, InvocationPayload};
