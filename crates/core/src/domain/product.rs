use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub unit: String,
    pub stock_quantity: i64,
    pub description: String,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Catalog listing row; prices are emitted as JSON numbers.
    pub fn to_listing(&self) -> Value {
        json!({
            "product_id": self.id.0,
            "product_name": self.name,
            "category": self.category,
            "price": self.price.to_f64().unwrap_or_default(),
            "unit": self.unit,
            "stock_quantity": self.stock_quantity,
            "description": self.description,
            "in_stock": self.in_stock(),
        })
    }
}
