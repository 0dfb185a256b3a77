use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
}

/// Validated product fields, used for both create and update.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub quantity: i64,
    pub price: f64,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a product and return it with its assigned ID.
    pub async fn create(&self, product: &NewProduct<'_>) -> Result<Product, sqlx::Error> {
        let result = sqlx::query("INSERT INTO products (name, quantity, price) VALUES (?, ?, ?)")
            .bind(product.name)
            .bind(product.quantity)
            .bind(product.price)
            .execute(&self.pool)
            .await?;

        Ok(Product {
            id: result.last_insert_rowid(),
            name: product.name.to_string(),
            quantity: product.quantity,
            price: product.price,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, quantity, price FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List all products in creation order.
    pub async fn list(&self) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, quantity, price FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    /// Check whether a product name is already in use.
    pub async fn is_name_taken(&self, name: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Replace all fields of a product. Returns `None` if it does not exist.
    pub async fn update(
        &self,
        id: i64,
        product: &NewProduct<'_>,
    ) -> Result<Option<Product>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE products SET name = ?, quantity = ?, price = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(product.name)
        .bind(product.quantity)
        .bind(product.price)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Product {
            id,
            name: product.name.to_string(),
            quantity: product.quantity,
            price: product.price,
        }))
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
