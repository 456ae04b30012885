//! Product catalog operations.

use crate::error::DomainError;
use crate::models::{CreateProduct, Product, UpdateProduct};
use crate::services::metrics::record_product_operation;
use crate::services::repository::{ProductRepository, WriteOutcome};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ProductService {
    products: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: CreateProduct) -> Result<Product, DomainError> {
        input.validate()?;

        let now = Utc::now();
        let product = Product {
            product_id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            duration_months: input.duration_months,
            tax_rate: input.tax_rate,
            is_active: input.is_active,
            created_utc: now,
            updated_utc: now,
        };

        let created = self.products.create_product(&product).await?;
        record_product_operation("create");
        info!(product_id = %created.product_id, "Product created");

        Ok(created)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<Product, DomainError> {
        self.products
            .get_product(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.products.list_products().await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProduct,
    ) -> Result<Product, DomainError> {
        input.validate()?;

        let existing = self.get_product(product_id).await?;
        let product = Product {
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            duration_months: input.duration_months,
            tax_rate: input.tax_rate,
            is_active: input.is_active,
            updated_utc: Utc::now(),
            ..existing
        };

        match self.products.update_product(&product).await? {
            WriteOutcome::Applied(updated) => {
                record_product_operation("update");
                Ok(updated)
            }
            WriteOutcome::Missing | WriteOutcome::Conflict => Err(DomainError::ProductNotFound),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), DomainError> {
        match self.products.delete_product(product_id).await? {
            WriteOutcome::Applied(()) => {
                record_product_operation("delete");
                info!(product_id = %product_id, "Product deleted");
                Ok(())
            }
            WriteOutcome::Missing => Err(DomainError::ProductNotFound),
            WriteOutcome::Conflict => Err(DomainError::ProductInUse),
        }
    }
}
