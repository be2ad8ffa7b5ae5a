//! Product reads, availability and admin product writes.

use rust_decimal::Decimal;
use tracing::instrument;

use cartwright_core::ProductId;
use cartwright_core::stock::Availability;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{NewProduct, Product, ProductUpdate};

pub struct CatalogService<'a> {
    store: &'a dyn Store,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Active products.
    pub async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products(false).await?)
    }

    /// An active product. Inactive products are hidden from customers.
    pub async fn get(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))
    }

    /// Whether `quantity` units could be put in a cart right now.
    ///
    /// Missing and inactive products report nothing available.
    #[instrument(skip(self))]
    pub async fn check_availability(&self, id: ProductId, quantity: u32) -> Result<Availability> {
        let availability = match self.store.get_product(id).await? {
            Some(product) if product.active => Availability::check(product.stock, quantity),
            _ => Availability::unavailable(),
        };
        Ok(availability)
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&self, product: NewProduct) -> Result<Product> {
        validate_name(&product.name)?;
        validate_price(product.price.amount())?;
        let created = self.store.create_product(product).await?;
        tracing::info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(price) = update.price {
            validate_price(price.amount())?;
        }
        self.store
            .update_product(id, update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("product name is required".to_owned()));
    }
    Ok(())
}

fn validate_price(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "price must be greater than zero".to_owned(),
        ));
    }
    Ok(())
}
