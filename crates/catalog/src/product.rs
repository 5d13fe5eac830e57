use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    DomainError, DomainResult, Entity, ProductId, SoftDeletable, check_decimal_12_2,
};

use crate::slug::slugify;

/// A sellable product. Owns its stock movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    /// List price, `decimal(12,2)`.
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

impl SoftDeletable for Product {
    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub price: Decimal,
    pub is_active: bool,
}

impl NewProduct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            price: Decimal::ZERO,
            is_active: true,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Normalize and validate: trimmed name, derived slug, rescaled price.
    pub fn validate(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }

        let slug = match self.slug {
            Some(s) => slugify(&s, '-'),
            None => slugify(&name, '-'),
        };
        if slug.is_empty() {
            return Err(DomainError::validation(format!(
                "product slug derived from '{name}' is empty"
            )));
        }

        if self.price < Decimal::ZERO {
            return Err(DomainError::validation("product price cannot be negative"));
        }
        let price = check_decimal_12_2("price", self.price)?;

        Ok(Self {
            name,
            slug: Some(slug),
            price,
            is_active: self.is_active,
        })
    }

    /// Slug after validation (empty before `validate`).
    pub fn slug_or_empty(&self) -> &str {
        self.slug.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn validate_derives_slug_and_rescales_price() {
        let p = NewProduct::new("  Blue Mug 350ml ")
            .with_price(dec!(12.5))
            .validate()
            .unwrap();
        assert_eq!(p.name, "Blue Mug 350ml");
        assert_eq!(p.slug_or_empty(), "blue-mug-350ml");
        assert_eq!(p.price, dec!(12.50));
        assert!(p.is_active);
    }

    #[test]
    fn explicit_slug_is_normalized() {
        let p = NewProduct::new("Mug").with_slug("Custom Slug!").validate().unwrap();
        assert_eq!(p.slug_or_empty(), "custom-slug");
    }

    #[test]
    fn rejects_empty_name() {
        let err = NewProduct::new("   ").validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_negative_price() {
        let err = NewProduct::new("Mug").with_price(dec!(-1)).validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("negative")));
    }
}
