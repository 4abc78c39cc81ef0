//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! categories:
//!   - name: Tea
//!     description: Loose leaf and bagged
//! products:
//!   - name: Sencha
//!     price: "12.50"
//!     stock: 40
//!     category: Tea
//! ```
//!
//! Categories are upserted by name. Products are inserted; a product whose
//! name already exists is skipped, so re-running a seed file is harmless.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

use shopfront_core::CategoryId;
use shopfront_server::db::PgCatalog;
use shopfront_server::models::{NewCategory, NewProduct};
use shopfront_server::store::StoreError;

use super::connect;

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<NewCategory>,
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

/// Outcome counters for one seeding run.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub categories: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Check a seed file before touching the database.
///
/// Returns one message per problem; empty means valid.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut category_names = HashSet::new();
    for category in &seed.categories {
        if category.name.trim().is_empty() {
            errors.push("category with an empty name".to_string());
        } else if !category_names.insert(category.name.as_str()) {
            errors.push(format!("duplicate category: {}", category.name));
        }
    }

    let mut product_names = HashSet::new();
    for product in &seed.products {
        if product.name.trim().is_empty() {
            errors.push("product with an empty name".to_string());
        } else if !product_names.insert(product.name.as_str()) {
            errors.push(format!("duplicate product: {}", product.name));
        }

        if let Some(category) = &product.category
            && !category_names.contains(category.as_str())
        {
            errors.push(format!(
                "product {} references undeclared category {category}",
                product.name
            ));
        }
    }

    errors
}

/// Seed categories and products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database operation fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let (_, pool) = connect().await?;
    let catalog = PgCatalog::new(pool);
    let summary = apply(&catalog, &seed).await?;

    info!("Seeding complete!");
    info!("  Categories upserted: {}", summary.categories);
    info!("  Products inserted: {}", summary.inserted);
    info!("  Products skipped (already exist): {}", summary.skipped);
    Ok(())
}

async fn apply(catalog: &PgCatalog, seed: &SeedFile) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();

    let mut category_ids: HashMap<&str, CategoryId> = HashMap::new();
    for category in &seed.categories {
        let stored = catalog.upsert_category(category).await?;
        category_ids.insert(category.name.as_str(), stored.id);
        summary.categories += 1;
    }

    for product in &seed.products {
        let category_id = product
            .category
            .as_deref()
            .and_then(|name| category_ids.get(name).copied());

        match catalog.insert_product(product, category_id).await {
            Ok(stored) => {
                info!(product_id = %stored.id, name = %stored.name, "Inserted product");
                summary.inserted += 1;
            }
            Err(StoreError::Conflict(_)) => {
                warn!(name = %product.name, "Product already exists, skipping");
                summary.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(summary)
}
