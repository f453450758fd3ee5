use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::parser::{AnalysisDocument, Category, IconHint, Section};

const DB_PATH: &str = "data/adscope.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS analyses (
            id          INTEGER PRIMARY KEY,
            source      TEXT NOT NULL,
            raw         TEXT NOT NULL,
            ingested_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS analysis_docs (
            analysis_id   INTEGER PRIMARY KEY REFERENCES analyses(id),
            summary       TEXT NOT NULL,
            colors        TEXT NOT NULL,
            key_insights  TEXT NOT NULL,
            section_count INTEGER NOT NULL,
            processed_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sections (
            id          INTEGER PRIMARY KEY,
            analysis_id INTEGER NOT NULL REFERENCES analyses(id),
            position    INTEGER NOT NULL,
            title       TEXT NOT NULL,
            category    TEXT NOT NULL CHECK(category IN
                ('visual','copy','performance','insights','recommendations','general')),
            icon        TEXT NOT NULL,
            content     TEXT NOT NULL,
            subtopics   TEXT NOT NULL,
            UNIQUE(analysis_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_analysis ON sections(analysis_id);
        CREATE INDEX IF NOT EXISTS idx_sections_category ON sections(category);

        CREATE TABLE IF NOT EXISTS search_jobs (
            keyword      TEXT PRIMARY KEY,
            status       TEXT NOT NULL CHECK(status IN ('processing','completed','failed')),
            result_count INTEGER NOT NULL DEFAULT 0,
            error        TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_status ON search_jobs(status);
        ",
    )?;
    Ok(())
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

// ── Ingestion ──

pub fn insert_analysis(conn: &Connection, source: &str, raw: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO analyses (source, raw, ingested_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![source, raw, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub struct RawAnalysis {
    pub id: i64,
    pub source: String,
    pub raw: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<RawAnalysis>> {
    let sql = format!(
        "SELECT a.id, a.source, a.raw
         FROM analyses a
         LEFT JOIN analysis_docs d ON d.analysis_id = a.id
         WHERE d.analysis_id IS NULL
         ORDER BY a.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(RawAnalysis {
                id: row.get(0)?,
                source: row.get(1)?,
                raw: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Parsed documents ──

pub fn save_documents(conn: &Connection, docs: &[(i64, AnalysisDocument)]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut doc_stmt = tx.prepare(
            "INSERT OR REPLACE INTO analysis_docs
             (analysis_id, summary, colors, key_insights, section_count, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut clear_stmt = tx.prepare("DELETE FROM sections WHERE analysis_id = ?1")?;
        let mut sec_stmt = tx.prepare(
            "INSERT INTO sections
             (analysis_id, position, title, category, icon, content, subtopics)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for (analysis_id, doc) in docs {
            doc_stmt.execute(rusqlite::params![
                analysis_id,
                doc.summary,
                serde_json::to_string(&doc.colors)?,
                serde_json::to_string(&doc.key_insights)?,
                doc.sections.len() as i64,
                now(),
            ])?;
            clear_stmt.execute(rusqlite::params![analysis_id])?;
            for (position, section) in doc.sections.iter().enumerate() {
                sec_stmt.execute(rusqlite::params![
                    analysis_id,
                    position as i64,
                    section.title,
                    section.category.as_str(),
                    section.icon.as_str(),
                    serde_json::to_string(&section.content)?,
                    serde_json::to_string(&section.subtopics)?,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

pub struct StoredAnalysis {
    pub id: i64,
    pub source: String,
    pub ingested_at: String,
    pub document: AnalysisDocument,
}

pub fn fetch_document(conn: &Connection, id: i64) -> Result<Option<StoredAnalysis>> {
    let head = conn
        .query_row(
            "SELECT a.source, a.ingested_at, d.summary, d.colors, d.key_insights
             FROM analyses a
             JOIN analysis_docs d ON d.analysis_id = a.id
             WHERE a.id = ?1",
            rusqlite::params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((source, ingested_at, summary, colors, key_insights)) = head else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT title, category, icon, content, subtopics
         FROM sections WHERE analysis_id = ?1 ORDER BY position",
    )?;
    let raw_sections = stmt
        .query_map(rusqlite::params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let sections = raw_sections
        .into_iter()
        .map(|(title, category, icon, content, subtopics)| {
            Ok(Section {
                title,
                category: Category::from_str_or_general(&category),
                icon: IconHint::from_str_or_sparkles(&icon),
                content: serde_json::from_str(&content)?,
                subtopics: serde_json::from_str(&subtopics)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(StoredAnalysis {
        id,
        source,
        ingested_at,
        document: AnalysisDocument {
            summary,
            sections,
            colors: serde_json::from_str(&colors)?,
            key_insights: serde_json::from_str(&key_insights)?,
        },
    }))
}

// ── Overview ──

pub struct OverviewRow {
    pub id: i64,
    pub source: String,
    pub summary: String,
    pub section_count: i64,
    pub insight_count: i64,
    pub ingested_at: String,
}

pub fn fetch_overview(
    conn: &Connection,
    category: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let (filter, params): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match category {
        Some(c) => (
            " AND EXISTS (SELECT 1 FROM sections s
                          WHERE s.analysis_id = a.id AND s.category = ?1)",
            vec![Box::new(c.to_string())],
        ),
        None => ("", Vec::new()),
    };

    let sql = format!(
        "SELECT a.id, a.source, d.summary, d.section_count,
                json_array_length(d.key_insights), a.ingested_at
         FROM analyses a
         JOIN analysis_docs d ON d.analysis_id = a.id
         WHERE 1=1{}
         ORDER BY a.id DESC
         LIMIT {}",
        filter, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                id: row.get(0)?,
                source: row.get(1)?,
                summary: row.get(2)?,
                section_count: row.get(3)?,
                insight_count: row.get(4)?,
                ingested_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Search jobs ──

pub struct JobRow {
    pub keyword: String,
    pub status: String,
    pub result_count: i64,
    pub error: Option<String>,
    pub updated_at: String,
}

pub fn start_job(conn: &Connection, keyword: &str) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO search_jobs (keyword, status, result_count, error, created_at, updated_at)
         VALUES (?1, 'processing', 0, NULL, ?2, ?2)
         ON CONFLICT(keyword) DO UPDATE SET
             status = 'processing', result_count = 0, error = NULL, updated_at = ?2",
        rusqlite::params![keyword, ts],
    )?;
    Ok(())
}

pub fn finish_job(conn: &Connection, keyword: &str, result_count: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE search_jobs
         SET status = 'completed', result_count = ?2, error = NULL, updated_at = ?3
         WHERE keyword = ?1",
        rusqlite::params![keyword, result_count, now()],
    )?;
    Ok(changed > 0)
}

pub fn fail_job(conn: &Connection, keyword: &str, message: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE search_jobs
         SET status = 'failed', error = ?2, updated_at = ?3
         WHERE keyword = ?1",
        rusqlite::params![keyword, message, now()],
    )?;
    Ok(changed > 0)
}

pub fn list_jobs(conn: &Connection) -> Result<Vec<JobRow>> {
    let mut stmt = conn.prepare(
        "SELECT keyword, status, result_count, error, updated_at
         FROM search_jobs ORDER BY updated_at DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(JobRow {
                keyword: row.get(0)?,
                status: row.get(1)?,
                result_count: row.get(2)?,
                error: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub analyses: usize,
    pub processed: usize,
    pub unprocessed: usize,
    pub sections: usize,
    pub jobs_processing: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let analyses: usize = conn.query_row("SELECT COUNT(*) FROM analyses", [], |r| r.get(0))?;
    let processed: usize =
        conn.query_row("SELECT COUNT(*) FROM analysis_docs", [], |r| r.get(0))?;
    let sections: usize = conn.query_row("SELECT COUNT(*) FROM sections", [], |r| r.get(0))?;
    let job_count = |status: &str| -> Result<usize> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM search_jobs WHERE status = ?1",
            rusqlite::params![status],
            |r| r.get(0),
        )?)
    };
    Ok(Stats {
        analyses,
        processed,
        unprocessed: analyses - processed,
        sections,
        jobs_processing: job_count("processing")?,
        jobs_completed: job_count("completed")?,
        jobs_failed: job_count("failed")?,
    })
}
