//! Seed the catalog from a YAML file.
//!
//! # File Format
//!
//! ```yaml
//! products:
//!   - name: Enamel Mug
//!     description: 350ml, speckled blue
//!     price: "12.50"
//!     stock: 40
//!   - name: Tea Sampler
//!     price: "18.00"
//!     stock: 12
//!     active: false
//! ```
//!
//! Prices are quoted decimal strings. Products whose name already exists in
//! the catalog are skipped, so the command can be re-run safely.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use cartwright_storefront::db::{self, CatalogStore, PgStore};
use cartwright_storefront::models::NewProduct;
use cartwright_storefront::services::catalog::CatalogService;

use super::migrate;

/// Top-level shape of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse a seed file's contents.
///
/// # Errors
///
/// Returns the YAML error if the document does not match [`SeedFile`].
pub fn parse(content: &str) -> Result<SeedFile, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Seed products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the database is
/// unreachable, or a product fails validation.
pub async fn products(file_path: &str) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = parse(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let database_url = migrate::database_url()?;
    let store = PgStore::new(db::create_pool(&database_url).await?);
    info!("Connected to database");

    let existing: HashSet<String> = store
        .list_products(true)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let catalog = CatalogService::new(&store);
    let mut summary = SeedSummary::default();

    for product in seed.products {
        if existing.contains(product.name.trim()) {
            warn!(name = %product.name, "Product already exists, skipping");
            summary.skipped += 1;
            continue;
        }
        let created = catalog.create(product).await?;
        info!(product_id = %created.id, name = %created.name, "Product created");
        summary.inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {}", summary.inserted);
    info!("  Products skipped (already exist): {}", summary.skipped);

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let seed = parse(
            r#"
products:
  - name: Enamel Mug
    description: 350ml, speckled blue
    price: "12.50"
    stock: 40
  - name: Tea Sampler
    price: "18.00"
    active: false
"#,
        )
        .unwrap();

        assert_eq!(seed.products.len(), 2);
        let mug = &seed.products[0];
        assert_eq!(mug.name, "Enamel Mug");
        assert_eq!(mug.stock, 40);
        assert!(mug.active);
        assert_eq!(mug.price.amount().to_string(), "12.50");

        let tea = &seed.products[1];
        assert_eq!(tea.description, None);
        assert_eq!(tea.stock, 0);
        assert!(!tea.active);
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse("products: []").unwrap().products.is_empty());
        assert!(parse("{}").unwrap().products.is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_price() {
        assert!(parse("products:\n  - name: Mug\n").is_err());
    }
}
