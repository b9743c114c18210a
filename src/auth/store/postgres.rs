//! PostgreSQL store
//!
//! Schema lives in `migrations/`. Refresh token rows reference their user
//! with `ON DELETE CASCADE`; lineage columns are nullable self-references.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{RefreshTokenStore, StoreError, UserStore};
use crate::models::{RefreshTokenRecord, User};

const TOKEN_COLUMNS: &str = "id, user_id, token, expires_at, revoked, replaced_by_token, \
                             family_id, previous_token_id, device_info, created_at";

const USER_COLUMNS: &str = "id, username, password_hash, email, public_name, is_active, \
                            is_superuser, created_at, updated_at";

/// sqlx-backed implementation of both store traits
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db_pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn put(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        insert_token(&self.db_pool, record).await
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            "SELECT {} FROM refresh_tokens WHERE token = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(record)
    }

    async fn mark_consumed(
        &self,
        record_id: Uuid,
        successor: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        // Dropping `tx` on any early return rolls the insert back.
        let mut tx = self.db_pool.begin().await?;

        let consumed: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT revoked OR replaced_by_token IS NOT NULL
            FROM refresh_tokens
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?;

        match consumed {
            None => return Err(StoreError::NotFound),
            Some(true) => return Err(StoreError::AlreadyConsumed),
            Some(false) => {}
        }

        insert_token(&mut *tx, successor).await?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET replaced_by_token = $1
            WHERE id = $2 AND revoked = FALSE AND replaced_by_token IS NULL
            "#,
        )
        .bind(successor.id)
        .bind(record_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tx.rollback().await?;
            return Err(StoreError::AlreadyConsumed);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn revoke(&self, record_id: Uuid) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE id = $1 AND revoked = FALSE
            "#,
        )
        .bind(record_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(true);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE id = $1)")
                .bind(record_id)
                .fetch_one(&self.db_pool)
                .await?;

        if exists {
            Ok(false)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE user_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn revoke_device(&self, user_id: Uuid, device_info: &str) -> Result<u64, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE user_id = $1 AND device_info = $2 AND revoked = FALSE
            "#,
        )
        .bind(user_id)
        .bind(device_info)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let records = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            r#"
            SELECT {}
            FROM refresh_tokens
            WHERE user_id = $1
              AND revoked = FALSE
              AND replaced_by_token IS NULL
              AND expires_at > NOW()
            ORDER BY created_at DESC
            "#,
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(records)
    }

    async fn purge_all(&self) -> Result<u64, StoreError> {
        let rows_affected = sqlx::query("DELETE FROM refresh_tokens")
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, email, public_name, is_active, is_superuser, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.public_name)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_superuser(&self, id: Uuid, is_superuser: bool) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users SET is_superuser = $1, updated_at = NOW() WHERE id = $2
            "#,
        )
        .bind(is_superuser)
        .bind(id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let rows_affected = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

async fn insert_token<'e, E>(executor: E, record: &RefreshTokenRecord) -> Result<(), StoreError>
where
    E: sqlx::postgres::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token, expires_at, revoked, replaced_by_token, family_id, previous_token_id, device_info, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(&record.token_hash)
    .bind(record.expires_at)
    .bind(record.revoked)
    .bind(record.replaced_by_token)
    .bind(record.family_id)
    .bind(record.previous_token_id)
    .bind(&record.device_info)
    .bind(record.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::postgres::PgPoolOptions;

    /// Helper to create a migrated test store
    async fn setup_test_store() -> PgStore {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/authvault_test".to_string());

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        let store = PgStore::new(pool);
        store.migrate().await.expect("Failed to run migrations");
        store
    }

    async fn create_user(store: &PgStore) -> User {
        let user = User::new(
            format!("user-{}", Uuid::new_v4()),
            "hash".to_string(),
            None,
            None,
        );
        store.create(&user).await.unwrap();
        user
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_mark_consumed_serializes() {
        let store = setup_test_store().await;
        let user = create_user(&store).await;

        let first = RefreshTokenRecord::new_family(
            user.id,
            Uuid::new_v4().to_string(),
            Duration::days(7),
            None,
        );
        store.put(&first).await.unwrap();

        let a = first.successor(Uuid::new_v4().to_string(), Duration::days(7));
        let b = first.successor(Uuid::new_v4().to_string(), Duration::days(7));
        let (ra, rb) = tokio::join!(
            store.mark_consumed(first.id, &a),
            store.mark_consumed(first.id, &b)
        );

        assert!(ra.is_ok() ^ rb.is_ok(), "exactly one rotation must win");
        let loser = if ra.is_ok() { &b } else { &a };
        assert!(store.find_by_hash(&loser.token_hash).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_mark_consumed_unknown_record() {
        let store = setup_test_store().await;
        let user = create_user(&store).await;

        let never_stored = RefreshTokenRecord::new_family(
            user.id,
            Uuid::new_v4().to_string(),
            Duration::days(7),
            None,
        );
        let successor = never_stored.successor(Uuid::new_v4().to_string(), Duration::days(7));

        let result = store.mark_consumed(never_stored.id, &successor).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
        assert!(store
            .find_by_hash(&successor.token_hash)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_delete_user_cascades() {
        let store = setup_test_store().await;
        let user = create_user(&store).await;
        let record = RefreshTokenRecord::new_family(
            user.id,
            Uuid::new_v4().to_string(),
            Duration::days(7),
            None,
        );
        store.put(&record).await.unwrap();

        UserStore::delete(&store, user.id).await.unwrap();
        assert!(store.find_by_hash(&record.token_hash).await.unwrap().is_none());
    }
}
