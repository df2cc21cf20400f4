use std::collections::BTreeSet;

use rust_decimal::Decimal;

use grocer_core::domain::product::{Product, ProductId};

pub struct SeedProduct {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    /// Price in cents.
    pub price_cents: i64,
    pub unit: &'static str,
    pub stock_quantity: i64,
    pub description: &'static str,
}

const SEED_PRODUCTS: &[SeedProduct] = &[
    seed("MILK001", "Full Cream Milk", "Dairy", 450, "2L", 0, "Fresh full cream milk"),
    seed("MILK002", "Skim Milk", "Dairy", 420, "2L", 120, "Low fat skim milk"),
    seed("BREAD001", "White Bread", "Bakery", 350, "700g", 80, "Fresh white bread loaf"),
    seed("BREAD002", "Wholemeal Bread", "Bakery", 400, "700g", 65, "Healthy wholemeal bread"),
    seed("EGG001", "Free Range Eggs", "Dairy", 750, "12 pack", 200, "Free range eggs"),
    seed("APPLE001", "Royal Gala Apples", "Fruit", 599, "1kg", 300, "Sweet Royal Gala apples"),
    seed("APPLE002", "Granny Smith Apples", "Fruit", 499, "1kg", 250, "Tart Granny Smith apples"),
    seed("CHICKEN001", "Chicken Breast", "Meat", 1299, "1kg", 0, "Fresh chicken breast fillets"),
    seed("CHICKEN002", "Chicken Thighs", "Meat", 999, "1kg", 150, "Fresh chicken thigh fillets"),
    seed("RICE001", "Jasmine Rice", "Pantry", 850, "2kg", 150, "Premium jasmine rice"),
    seed("RICE002", "Basmati Rice", "Pantry", 999, "2kg", 120, "Aromatic basmati rice"),
    seed("TOMATO001", "Tomatoes", "Vegetables", 699, "1kg", 180, "Fresh ripe tomatoes"),
    seed("CHEESE001", "Cheddar Cheese", "Dairy", 1099, "500g", 75, "Tasty cheddar cheese block"),
    seed("CHEESE002", "Mozzarella Cheese", "Dairy", 899, "500g", 60, "Fresh mozzarella cheese"),
    seed("BUTTER001", "Salted Butter", "Dairy", 550, "500g", 90, "Salted butter block"),
    seed("COFFEE001", "Ground Coffee", "Pantry", 1299, "500g", 110, "Medium roast ground coffee"),
    seed("COFFEE002", "Instant Coffee", "Pantry", 899, "200g", 95, "Premium instant coffee"),
];

const fn seed(
    id: &'static str,
    name: &'static str,
    category: &'static str,
    price_cents: i64,
    unit: &'static str,
    stock_quantity: i64,
    description: &'static str,
) -> SeedProduct {
    SeedProduct { id, name, category, price_cents, unit, stock_quantity, description }
}

/// Deterministic starter catalog, including two out-of-stock products.
pub struct CatalogSeed;

impl CatalogSeed {
    pub fn entries() -> &'static [SeedProduct] {
        SEED_PRODUCTS
    }

    pub fn products() -> Vec<Product> {
        SEED_PRODUCTS.iter().map(SeedProduct::to_product).collect()
    }

    pub fn categories() -> Vec<String> {
        SEED_PRODUCTS
            .iter()
            .map(|product| product.category.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl SeedProduct {
    pub fn to_product(&self) -> Product {
        Product {
            id: ProductId(self.id.to_string()),
            name: self.name.to_string(),
            category: self.category.to_string(),
            price: Decimal::new(self.price_cents, 2),
            unit: self.unit.to_string(),
            stock_quantity: self.stock_quantity,
            description: self.description.to_string(),
        }
    }
}
