use sqlx::sqlite::SqlitePool;
use tracing::warn;

use crate::auth::Principal;
use crate::permissions::{Permission, PermissionSet};

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub permissions: PermissionSet,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            permissions: user.permissions,
        }
    }
}

/// Fields for inserting a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub is_admin: bool,
    pub permissions: PermissionSet,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    is_admin: i64,
    permissions: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let permissions = parse_permissions(&row.username, &row.permissions);
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_admin: row.is_admin != 0,
            permissions,
        }
    }
}

/// Decode the stored permission list. Unreadable entries grant nothing.
fn parse_permissions(username: &str, raw: &str) -> PermissionSet {
    let names: Vec<String> = match serde_json::from_str(raw) {
        Ok(names) => names,
        Err(e) => {
            warn!(username = %username, error = %e, "Unreadable permission list");
            return PermissionSet::new();
        }
    };

    names
        .iter()
        .filter_map(|name| match name.parse::<Permission>() {
            Ok(permission) => Some(permission),
            Err(e) => {
                warn!(username = %username, error = %e, "Ignoring stored permission");
                None
            }
        })
        .collect()
}

fn encode_permissions(permissions: &PermissionSet) -> String {
    let names: Vec<&str> = permissions.iter().map(Permission::as_str).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, permissions";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, is_admin, permissions) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(i64::from(user.is_admin))
        .bind(encode_permissions(&user.permissions))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// List all users in creation order.
    pub async fn list(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Check if a username is available.
    pub async fn is_username_available(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }

    /// Delete a user by ID. Tokens already issued to them stay signed but stop resolving.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_round_trip_through_json() {
        let permissions: PermissionSet = [Permission::AddProduct, Permission::ViewProduct]
            .into_iter()
            .collect();

        let raw = encode_permissions(&permissions);
        assert_eq!(raw, r#"["view_product","add_product"]"#);
        assert_eq!(parse_permissions("alice", &raw), permissions);
    }

    #[test]
    fn test_unknown_stored_permission_is_dropped() {
        let parsed = parse_permissions("alice", r#"["view_product","launch_rockets"]"#);
        assert_eq!(parsed, [Permission::ViewProduct].into_iter().collect());
    }

    #[test]
    fn test_corrupt_permission_list_grants_nothing() {
        assert!(parse_permissions("alice", "not json").is_empty());
    }
}
