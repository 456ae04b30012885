//! Voucher management and standalone voucher validation.

use crate::error::DomainError;
use crate::models::{CreateVoucher, Product, UpdateVoucher, Voucher};
use crate::services::eligibility::check_voucher_eligibility;
use crate::services::metrics::record_voucher_validation;
use crate::services::pricing::{compute_pricing, Pricing};
use crate::services::repository::{ProductRepository, VoucherRepository, WriteOutcome};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// A voucher that passed eligibility, with the price it would yield.
#[derive(Debug, Clone, Serialize)]
pub struct VoucherValidation {
    pub voucher: Voucher,
    pub pricing: Pricing,
}

#[derive(Clone)]
pub struct VoucherService {
    vouchers: Arc<dyn VoucherRepository>,
    products: Arc<dyn ProductRepository>,
}

impl VoucherService {
    pub fn new(vouchers: Arc<dyn VoucherRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { vouchers, products }
    }

    async fn require_product(&self, product_id: Uuid) -> Result<Product, DomainError> {
        self.products
            .get_product(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound)
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_voucher(&self, input: CreateVoucher) -> Result<Voucher, DomainError> {
        let now = Utc::now();
        input.validate_at(now)?;

        if let Some(product_id) = input.product_id {
            self.require_product(product_id).await?;
        }

        let voucher = Voucher {
            voucher_id: Uuid::new_v4(),
            code: Voucher::normalize_code(&input.code),
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            product_id: input.product_id,
            is_active: input.is_active,
            expires_utc: input.expires_utc,
            created_utc: now,
            updated_utc: now,
        };

        match self.vouchers.create_voucher(&voucher).await? {
            WriteOutcome::Applied(created) => {
                info!(voucher_id = %created.voucher_id, code = %created.code, "Voucher created");
                Ok(created)
            }
            WriteOutcome::Conflict | WriteOutcome::Missing => {
                Err(DomainError::DuplicateVoucherCode)
            }
        }
    }

    pub async fn get_voucher(&self, voucher_id: Uuid) -> Result<Voucher, DomainError> {
        self.vouchers
            .get_voucher(voucher_id)
            .await?
            .ok_or(DomainError::VoucherNotFound)
    }

    /// Case-insensitive lookup.
    pub async fn get_voucher_by_code(&self, code: &str) -> Result<Voucher, DomainError> {
        self.vouchers
            .get_voucher_by_code(&Voucher::normalize_code(code))
            .await?
            .ok_or(DomainError::VoucherNotFound)
    }

    pub async fn list_active_vouchers(&self) -> Result<Vec<Voucher>, DomainError> {
        Ok(self.vouchers.list_active_vouchers().await?)
    }

    pub async fn list_vouchers_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<Voucher>, DomainError> {
        self.require_product(product_id).await?;
        Ok(self.vouchers.list_vouchers_for_product(product_id).await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update_voucher(
        &self,
        voucher_id: Uuid,
        input: UpdateVoucher,
    ) -> Result<Voucher, DomainError> {
        input.validate()?;

        let existing = self.get_voucher(voucher_id).await?;
        if let Some(product_id) = input.product_id {
            self.require_product(product_id).await?;
        }

        let voucher = Voucher {
            code: Voucher::normalize_code(&input.code),
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            product_id: input.product_id,
            is_active: input.is_active,
            expires_utc: input.expires_utc,
            updated_utc: Utc::now(),
            ..existing
        };

        match self.vouchers.update_voucher(&voucher).await? {
            WriteOutcome::Applied(updated) => Ok(updated),
            WriteOutcome::Missing => Err(DomainError::VoucherNotFound),
            WriteOutcome::Conflict => Err(DomainError::DuplicateVoucherCode),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_voucher(&self, voucher_id: Uuid) -> Result<(), DomainError> {
        match self.vouchers.delete_voucher(voucher_id).await? {
            WriteOutcome::Applied(()) => {
                info!(voucher_id = %voucher_id, "Voucher deleted");
                Ok(())
            }
            WriteOutcome::Missing => Err(DomainError::VoucherNotFound),
            WriteOutcome::Conflict => Err(DomainError::VoucherInUse),
        }
    }

    /// Pre-checkout check of `code` against `product_id`.
    ///
    /// Runs the same eligibility rules as subscription creation and returns
    /// the rounded price the subscription would be created with.
    #[instrument(skip(self))]
    pub async fn validate_voucher(
        &self,
        code: &str,
        product_id: Uuid,
    ) -> Result<VoucherValidation, DomainError> {
        let voucher = self.get_voucher_by_code(code).await?;
        let product = self.require_product(product_id).await?;

        if let Err(reason) = check_voucher_eligibility(&voucher, product.product_id, Utc::now()) {
            record_voucher_validation(reason.as_str());
            warn!(code = %voucher.code, reason = reason.as_str(), "Voucher rejected");
            return Err(reason.into());
        }
        record_voucher_validation("valid");

        let pricing =
            compute_pricing(product.price, product.tax_rate, Some(voucher.discount()))?
                .rounded()?;

        Ok(VoucherValidation { voucher, pricing })
    }
}
