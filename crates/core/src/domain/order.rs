use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// `ORD-<YYYYMMDDHHMMSS>-<first 8 chars of customer id>`.
    pub fn generate(customer_id: &str, at: DateTime<Utc>) -> Self {
        let prefix: String = customer_id.chars().take(8).collect();
        Self(format!("ORD-{}-{}", at.format("%Y%m%d%H%M%S"), prefix))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "PROCESSING" => Ok(Self::Processing),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            _ => Err(DomainError::UnknownOrderStatus(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub customer_name: String,
    pub items: Vec<Value>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn with_status(mut self, status: OrderStatus, at: DateTime<Utc>) -> Self {
        self.status = status;
        self.updated_at = at;
        self
    }

    /// Full order record as returned by order lookups.
    pub fn to_json(&self) -> Value {
        let mut record = Map::new();
        record.insert("order_id".into(), Value::String(self.id.0.clone()));
        record.insert("customer_id".into(), Value::String(self.customer_id.clone()));
        record.insert("customer_name".into(), Value::String(self.customer_name.clone()));
        record.insert("items".into(), Value::Array(self.items.clone()));
        record.insert("total_amount".into(), json!(decimal_to_number(self.total_amount)));
        record.insert("order_status".into(), Value::String(self.status.as_str().to_string()));
        record.insert("created_at".into(), Value::String(timestamp(self.created_at)));
        record.insert("updated_at".into(), Value::String(timestamp(self.updated_at)));
        if let Some(address) = &self.delivery_address {
            record.insert("delivery_address".into(), Value::String(address.clone()));
        }
        Value::Object(record)
    }

    pub fn confirmation(&self) -> Value {
        json!({
            "order_id": self.id.0,
            "customer_id": self.customer_id,
            "customer_name": self.customer_name,
            "total_amount": decimal_to_number(self.total_amount),
            "order_status": self.status.as_str(),
            "created_at": timestamp(self.created_at),
            "message": format!("Order {} placed successfully", self.id),
        })
    }
}

/// Validated input for placing an order.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceOrder {
    pub customer_id: String,
    pub customer_name: String,
    pub items: Vec<Value>,
    pub total_amount: Decimal,
    pub delivery_address: Option<String>,
}

impl PlaceOrder {
    pub fn from_event(event: &Map<String, Value>) -> Result<Self, DomainError> {
        let required = || {
            DomainError::Validation(
                "customer_id, customer_name, items, and total_amount are required".to_string(),
            )
        };

        let customer_id = non_empty_str(event.get("customer_id")).ok_or_else(required)?;
        let customer_name = non_empty_str(event.get("customer_name")).ok_or_else(required)?;
        let items = match event.get("items") {
            Some(Value::Array(items)) if !items.is_empty() => items.clone(),
            _ => return Err(required()),
        };
        let total_amount = match event.get("total_amount") {
            None | Some(Value::Null) => return Err(required()),
            Some(value) => parse_amount(value)?,
        };
        let delivery_address = non_empty_str(event.get("delivery_address"));

        Ok(Self { customer_id, customer_name, items, total_amount, delivery_address })
    }

    pub fn into_order(self, at: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::generate(&self.customer_id, at),
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            items: self.items,
            total_amount: self.total_amount,
            status: OrderStatus::Pending,
            delivery_address: self.delivery_address,
            created_at: at,
            updated_at: at,
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn parse_amount(value: &Value) -> Result<Decimal, DomainError> {
    let raw = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        other => {
            return Err(DomainError::Validation(format!("total_amount must be a number, got {other}")))
        }
    };

    let amount = Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)).map_err(
        |_| DomainError::Validation(format!("total_amount must be a number, got {raw}")),
    )?;
    if amount.is_sign_negative() {
        return Err(DomainError::Validation("total_amount must not be negative".to_string()));
    }
    Ok(amount)
}

pub fn decimal_to_number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}
