use crate::models::{CreateProduct, UpdateProduct};
use rust_decimal::Decimal;
use serde::Deserialize;

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub duration_months: i32,
    pub tax_rate: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl From<ProductRequest> for CreateProduct {
    fn from(req: ProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            duration_months: req.duration_months,
            tax_rate: req.tax_rate,
            is_active: req.is_active,
        }
    }
}

impl From<ProductRequest> for UpdateProduct {
    fn from(req: ProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            duration_months: req.duration_months,
            tax_rate: req.tax_rate,
            is_active: req.is_active,
        }
    }
}
