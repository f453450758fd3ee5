use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

/// One persisted search-job record, however it is stored.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    pub keyword: String,
    pub status: JobState,
    #[serde(default)]
    pub result_count: i64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Where the tracker reads job status from. `Ok(None)` means the record
/// does not exist yet; the tracker keeps polling.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn fetch(&self, keyword: &str) -> Result<Option<JobRecord>>;
}

/// Reads the local `search_jobs` table.
pub struct SqliteStatusStore {
    conn: Mutex<Connection>,
}

impl SqliteStatusStore {
    pub fn new(conn: Connection) -> Self {
        SqliteStatusStore { conn: Mutex::new(conn) }
    }
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
    async fn fetch(&self, keyword: &str) -> Result<Option<JobRecord>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT keyword, status, result_count, error
                 FROM search_jobs WHERE keyword = ?1",
                rusqlite::params![keyword],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .context("search_jobs lookup failed")?;

        Ok(row.map(|(keyword, status, result_count, error)| JobRecord {
            keyword,
            // Unknown status strings keep the job in flight rather than
            // inventing a terminal outcome.
            status: JobState::parse(&status).unwrap_or(JobState::Processing),
            result_count,
            error,
        }))
    }
}

/// Reads `GET {base}/jobs/{keyword}` returning a JSON job record.
pub struct HttpStatusStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatusStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpStatusStore {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StatusStore for HttpStatusStore {
    async fn fetch(&self, keyword: &str) -> Result<Option<JobRecord>> {
        let url = format!("{}/jobs/{}", self.base_url.trim_end_matches('/'), keyword);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("status fetch failed: {}", url))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let record = response
            .error_for_status()
            .with_context(|| format!("status endpoint rejected {}", url))?
            .json::<JobRecord>()
            .await
            .context("malformed status record")?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_record_deserializes_wire_format() {
        let record: JobRecord = serde_json::from_str(
            r#"{"keyword":"tenis corrida","status":"completed","result_count":12}"#,
        )
        .unwrap();
        assert_eq!(record.status, JobState::Completed);
        assert_eq!(record.result_count, 12);
        assert!(record.error.is_none());
    }

    #[test]
    fn job_state_round_trip() {
        for s in [JobState::Processing, JobState::Completed, JobState::Failed] {
            assert_eq!(JobState::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobState::parse("queued"), None);
    }

    #[tokio::test]
    async fn sqlite_store_fetches_rows() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO search_jobs (keyword, status, result_count, error, created_at, updated_at)
             VALUES ('tenis', 'failed', 0, 'quota exceeded', '2026-01-01', '2026-01-01')",
            [],
        )
        .unwrap();

        let store = SqliteStatusStore::new(conn);
        let record = store.fetch("tenis").await.unwrap().unwrap();
        assert_eq!(record.status, JobState::Failed);
        assert_eq!(record.error.as_deref(), Some("quota exceeded"));

        assert!(store.fetch("missing").await.unwrap().is_none());
    }
}
