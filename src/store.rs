// 💾 Snapshot Store - append-only revision log of model snapshots in SQLite
//
// Each save stores the full model snapshot as JSON next to its SHA-256 hash.
// Saving a model whose snapshot matches its latest revision is a no-op.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::model::Model;

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved { revision_id: String },
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Revision {
    pub revision_id: String,
    pub model_id: String,
    pub model_name: String,
    pub content_hash: String,
    pub saved_at: DateTime<Utc>,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS model_revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            revision_id TEXT UNIQUE NOT NULL,
            model_id TEXT NOT NULL,
            model_name TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            snapshot TEXT NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_revisions_model ON model_revisions(model_id)",
        [],
    )?;

    Ok(())
}

fn content_hash(snapshot_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot_json.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn latest_hash(conn: &Connection, model_id: Uuid) -> Result<Option<String>> {
    let hash = conn
        .query_row(
            "SELECT content_hash FROM model_revisions
             WHERE model_id = ?1
             ORDER BY id DESC
             LIMIT 1",
            params![model_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}

/// Store the current state of `model` and mark it clean
pub fn save_model(conn: &Connection, model: &Model) -> Result<SaveOutcome> {
    let snapshot_json = serde_json::to_string(&model.to_snapshot()).context("Failed to serialize model")?;
    let hash = content_hash(&snapshot_json);

    if latest_hash(conn, model.id())?.as_deref() == Some(hash.as_str()) {
        info!("Model '{}' unchanged since last save", model.name());
        model.mark_clean();
        return Ok(SaveOutcome::Unchanged);
    }

    let revision_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO model_revisions (
            revision_id, model_id, model_name, content_hash, snapshot, saved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            revision_id,
            model.id().to_string(),
            model.name(),
            hash,
            snapshot_json,
            Utc::now().to_rfc3339(),
        ],
    )?;

    info!("Saved model '{}' as revision {}", model.name(), revision_id);
    model.mark_clean();
    Ok(SaveOutcome::Saved { revision_id })
}

/// Load the most recent revision of a model, rehydrating all containers
pub fn load_latest_model(conn: &Connection, model_id: Uuid) -> Result<Option<Model>> {
    let snapshot_json: Option<String> = conn
        .query_row(
            "SELECT snapshot FROM model_revisions
             WHERE model_id = ?1
             ORDER BY id DESC
             LIMIT 1",
            params![model_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match snapshot_json {
        Some(json) => {
            let model = Model::from_json(&json)
                .with_context(|| format!("Failed to restore model {}", model_id))?;
            Ok(Some(model))
        }
        None => Ok(None),
    }
}

/// All revisions of a model, newest first
pub fn list_revisions(conn: &Connection, model_id: Uuid) -> Result<Vec<Revision>> {
    let mut stmt = conn.prepare(
        "SELECT revision_id, model_id, model_name, content_hash, saved_at
         FROM model_revisions
         WHERE model_id = ?1
         ORDER BY id DESC",
    )?;

    let revisions = stmt
        .query_map(params![model_id.to_string()], |row| {
            let saved_at_str: String = row.get(4)?;

            Ok(Revision {
                revision_id: row.get(0)?,
                model_id: row.get(1)?,
                model_name: row.get(2)?,
                content_hash: row.get(3)?,
                saved_at: DateTime::parse_from_rfc3339(&saved_at_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(revisions)
}

/// Ids of every stored model, most recently saved first
pub fn list_model_ids(conn: &Connection) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT model_id FROM model_revisions
         GROUP BY model_id
         ORDER BY MAX(id) DESC",
    )?;

    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    ids.iter()
        .map(|id| Uuid::parse_str(id).with_context(|| format!("Invalid model id '{}'", id)))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
