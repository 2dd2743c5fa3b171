use crate::errors::{AppError, ResultExt};
use crate::models::{FinalStatus, Gender, KycQuery, KycRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence for finished verifications.
///
/// The workflow only talks to this trait; Postgres backs it in production and
/// an in-memory store is used when no database is configured.
#[async_trait]
pub trait KycStore: Send + Sync {
    /// Stores one verification record and returns its id.
    async fn insert(&self, record: &KycRecord) -> Result<Uuid, AppError>;

    /// Returns the most recently created record matching the query.
    async fn find(&self, query: &KycQuery) -> Result<Option<KycRecord>, AppError>;
}

/// Postgres-backed store (`kyc.verifications`).
pub struct PgKycStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct KycRow {
    id: Uuid,
    email: String,
    phone: Option<String>,
    id_number: Option<String>,
    tax_id: Option<String>,
    date_of_birth: Option<String>,
    gender: Option<String>,
    age_verified: bool,
    face_similarity: f64,
    face_match: bool,
    deepfake_probability: f64,
    is_deepfake: bool,
    final_status: String,
    created_at: DateTime<Utc>,
}

impl KycRow {
    fn into_record(self) -> Result<KycRecord, AppError> {
        let final_status = self
            .final_status
            .parse::<FinalStatus>()
            .map_err(AppError::InternalError)?;

        let gender = match self.gender.as_deref() {
            Some("Male") => Some(Gender::Male),
            Some("Female") => Some(Gender::Female),
            _ => None,
        };

        Ok(KycRecord {
            id: self.id,
            email: self.email,
            phone: self.phone,
            id_number: self.id_number,
            tax_id: self.tax_id,
            date_of_birth: self.date_of_birth,
            gender,
            age_verified: self.age_verified,
            face_similarity: self.face_similarity,
            face_match: self.face_match,
            deepfake_probability: self.deepfake_probability,
            is_deepfake: self.is_deepfake,
            final_status,
            created_at: self.created_at,
        })
    }
}

impl PgKycStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the schema and table when missing.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        sqlx::query("CREATE SCHEMA IF NOT EXISTS kyc")
            .execute(&self.pool)
            .await
            .context("Creating kyc schema")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kyc.verifications (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                phone TEXT,
                id_number TEXT,
                tax_id TEXT,
                date_of_birth TEXT,
                gender TEXT,
                age_verified BOOLEAN NOT NULL,
                face_similarity DOUBLE PRECISION NOT NULL,
                face_match BOOLEAN NOT NULL,
                deepfake_probability DOUBLE PRECISION NOT NULL,
                is_deepfake BOOLEAN NOT NULL,
                final_status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Creating kyc.verifications table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS verifications_email_created_idx ON kyc.verifications (email, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .context("Creating kyc.verifications email index")?;

        Ok(())
    }
}

#[async_trait]
impl KycStore for PgKycStore {
    async fn insert(&self, record: &KycRecord) -> Result<Uuid, AppError> {
        let inserted: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO kyc.verifications (
                id, email, phone, id_number, tax_id, date_of_birth, gender,
                age_verified, face_similarity, face_match, deepfake_probability,
                is_deepfake, final_status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.id_number)
        .bind(&record.tax_id)
        .bind(&record.date_of_birth)
        .bind(record.gender.map(|g| g.as_str()))
        .bind(record.age_verified)
        .bind(record.face_similarity)
        .bind(record.face_match)
        .bind(record.deepfake_probability)
        .bind(record.is_deepfake)
        .bind(record.final_status.as_str())
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Inserting KYC record {}", record.id))?;

        tracing::info!("Stored KYC record {} ({})", inserted.0, record.final_status);

        Ok(inserted.0)
    }

    async fn find(&self, query: &KycQuery) -> Result<Option<KycRecord>, AppError> {
        let row = sqlx::query_as::<_, KycRow>(
            r#"
            SELECT id, email, phone, id_number, tax_id, date_of_birth, gender,
                   age_verified, face_similarity, face_match, deepfake_probability,
                   is_deepfake, final_status, created_at
            FROM kyc.verifications
            WHERE ($1::text IS NULL OR email = $1)
              AND ($2::uuid IS NULL OR id = $2)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(&query.email)
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await
        .context("Looking up KYC record")?;

        row.map(KycRow::into_record).transpose()
    }
}

/// Process-local store used when no database URL is configured.
///
/// Unbounded and lost on restart: every record stays in memory for the life of
/// the process, so it only suits development and short-lived fallback runs.
#[derive(Default)]
pub struct MemoryKycStore {
    records: RwLock<Vec<KycRecord>>,
}

impl MemoryKycStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KycStore for MemoryKycStore {
    async fn insert(&self, record: &KycRecord) -> Result<Uuid, AppError> {
        self.records.write().await.push(record.clone());
        tracing::debug!("Stored KYC record {} in memory", record.id);
        Ok(record.id)
    }

    async fn find(&self, query: &KycQuery) -> Result<Option<KycRecord>, AppError> {
        let records = self.records.read().await;
        // Insertion order breaks created_at ties: later wins.
        Ok(records
            .iter()
            .enumerate()
            .filter(|(_, r)| query.matches(r))
            .max_by_key(|(i, r)| (r.created_at, *i))
            .map(|(_, r)| r.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(email: &str, status: FinalStatus, age_secs: i64) -> KycRecord {
        KycRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            phone: None,
            id_number: Some("123456789012".to_string()),
            tax_id: Some("ABCDE1234F".to_string()),
            date_of_birth: Some("01/01/1990".to_string()),
            gender: Some(Gender::Female),
            age_verified: true,
            face_similarity: 90.0,
            face_match: true,
            deepfake_probability: 5.0,
            is_deepfake: false,
            final_status: status,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_memory_store_returns_newest_match() {
        let store = MemoryKycStore::new();
        let old = record("a@example.com", FinalStatus::Review, 60);
        let new = record("a@example.com", FinalStatus::Verified, 0);
        let other = record("b@example.com", FinalStatus::Review, 0);

        store.insert(&new).await.unwrap();
        store.insert(&old).await.unwrap();
        store.insert(&other).await.unwrap();

        let found = store
            .find(&KycQuery::by_email("a@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, new.id);
        assert_eq!(found.final_status, FinalStatus::Verified);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_memory_store_find_by_id_and_miss() {
        let store = MemoryKycStore::new();
        let rec = record("a@example.com", FinalStatus::Review, 0);
        let id = store.insert(&rec).await.unwrap();
        assert_eq!(id, rec.id);

        let query = KycQuery {
            email: None,
            id: Some(id),
        };
        assert!(store.find(&query).await.unwrap().is_some());
        assert!(store
            .find(&KycQuery::by_email("nobody@example.com"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let row = KycRow {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            phone: None,
            id_number: None,
            tax_id: None,
            date_of_birth: None,
            gender: Some("Male".to_string()),
            age_verified: false,
            face_similarity: 0.0,
            face_match: false,
            deepfake_probability: 0.0,
            is_deepfake: false,
            final_status: "REJECTED - DEEPFAKE DETECTED".to_string(),
            created_at: Utc::now(),
        };
        assert!(row.into_record().is_err());
    }
}
