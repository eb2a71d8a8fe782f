//! # Catalog Repository
//!
//! Products and their variants. The engine only needs the variant's
//! `pack_size`; the rest exists so batches can be created and seeded.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::generate_id;
use stockline_core::{Product, ProductVariant, Scope};

/// Repository for product and variant rows.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a product for the given scope.
    pub async fn create_product(&self, scope: &Scope, name: &str) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            tenant_id: scope.tenant_id.clone(),
            organisation_id: scope.organisation_id.clone(),
            name: name.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, tenant_id, organisation_id, name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.organisation_id)
        .bind(&product.name)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a variant. `pack_size = None` stores NULL.
    pub async fn create_variant(
        &self,
        product_id: &str,
        name: &str,
        pack_size: Option<i64>,
    ) -> DbResult<ProductVariant> {
        let now = Utc::now();
        let variant = ProductVariant {
            id: generate_id(),
            product_id: product_id.to_string(),
            name: name.trim().to_string(),
            pack_size,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %variant.id, product_id = %product_id, ?pack_size, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, name, pack_size, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.name)
        .bind(variant.pack_size)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Gets a variant by ID (excluding soft-deleted).
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, name, pack_size, created_at, updated_at
            FROM product_variants
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_variant_pack_size_null_round_trips() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = Scope::organisation("t1", "o1");

        let product = db.catalog().create_product(&scope, "Paracetamol 500").await.unwrap();
        let strip = db
            .catalog()
            .create_variant(&product.id, "Strip of 10", Some(10))
            .await
            .unwrap();
        let single = db
            .catalog()
            .create_variant(&product.id, "Single", None)
            .await
            .unwrap();

        let strip = db.catalog().get_variant(&strip.id).await.unwrap().unwrap();
        let single = db.catalog().get_variant(&single.id).await.unwrap().unwrap();
        assert_eq!(strip.pack_size, Some(10));
        assert_eq!(single.pack_size, None);
        assert!(db.catalog().get_variant("missing").await.unwrap().is_none());
    }
}
