//! Durable session records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// Credential produced by one completed login flow.
///
/// Written exactly once; afterwards only `last_used_at` is touched. Deletion
/// is an administrative action outside this subsystem.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionRecord {
    pub session_key: String,
    pub phone_number: String,
    pub remote_user_id: i64,
    pub display_name: String,
    pub handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

pub struct SessionRecordStore {
    pool: SqlitePool,
}

impl SessionRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &SessionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO session_records
                (session_key, phone_number, remote_user_id, display_name, handle, created_at, last_used_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.session_key)
        .bind(&record.phone_number)
        .bind(record.remote_user_id)
        .bind(&record.display_name)
        .bind(&record.handle)
        .bind(record.created_at)
        .bind(record.last_used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_key(&self, session_key: &str) -> Result<Option<SessionRecord>, sqlx::Error> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM session_records WHERE session_key = ?1",
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_by_phone(&self, phone_number: &str) -> Result<Vec<SessionRecord>, sqlx::Error> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM session_records WHERE phone_number = ?1 ORDER BY created_at",
        )
        .bind(phone_number)
        .fetch_all(&self.pool)
        .await
    }

    /// Update `last_used_at` on a record. The only mutation a record ever sees.
    pub async fn touch(&self, session_key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE session_records SET last_used_at = ?1 WHERE session_key = ?2")
            .bind(Utc::now())
            .bind(session_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SessionRecordStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        SessionRecordStore::new(pool)
    }

    fn record(session_key: &str, phone_number: &str) -> SessionRecord {
        SessionRecord {
            session_key: session_key.to_string(),
            phone_number: phone_number.to_string(),
            remote_user_id: 42,
            display_name: "Ana".to_string(),
            handle: Some("ana".to_string()),
            created_at: Utc::now(),
            last_used_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_key() {
        let store = store().await;
        store.insert(&record("k1", "+15551234567")).await.unwrap();

        let found = store.find_by_key("k1").await.unwrap().unwrap();
        assert_eq!(found.phone_number, "+15551234567");
        assert_eq!(found.remote_user_id, 42);
        assert_eq!(found.handle.as_deref(), Some("ana"));

        assert!(store.find_by_key("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn secondary_lookup_by_phone() {
        let store = store().await;
        store.insert(&record("k1", "+15551234567")).await.unwrap();
        store.insert(&record("k2", "+15551234567")).await.unwrap();
        store.insert(&record("k3", "+15559990000")).await.unwrap();

        let records = store.find_by_phone("+15551234567").await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_session_keys_are_rejected() {
        let store = store().await;
        store.insert(&record("k1", "+15551234567")).await.unwrap();
        assert!(store.insert(&record("k1", "+15559990000")).await.is_err());
    }

    #[tokio::test]
    async fn touch_moves_last_used_at_only() {
        let store = store().await;
        let mut original = record("k1", "+15551234567");
        original.last_used_at = Utc::now() - chrono::Duration::hours(1);
        store.insert(&original).await.unwrap();

        store.touch("k1").await.unwrap();

        let found = store.find_by_key("k1").await.unwrap().unwrap();
        assert!(found.last_used_at > original.last_used_at);
        assert_eq!(
            found.created_at.timestamp(),
            original.created_at.timestamp()
        );
    }
}
