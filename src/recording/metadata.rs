use super::RecordingState;
use crate::error::{Result, SkycamError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Summary written next to a recording when its session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: Uuid,
    pub recording_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub recording_state: RecordingState,
    pub packets_recorded: u64,
    pub bytes_recorded: u64,
    pub packets_skipped: u64,
    pub frames_relayed: u64,
    pub frames_dropped: u64,
    pub commands_dispatched: u64,
    pub commands_failed: u64,
    pub telemetry_reports: u64,
    pub decode_failures: u64,
}

/// Write `<recording>.json` and return its path
pub async fn save_metadata(metadata: &SessionMetadata) -> Result<PathBuf> {
    let metadata_json = serde_json::to_string_pretty(metadata).map_err(|e| {
        SkycamError::component("recording", format!("Failed to serialize metadata: {}", e))
    })?;

    let metadata_path = metadata.recording_path.with_extension("json");
    fs::write(&metadata_path, metadata_json).await.map_err(|e| {
        SkycamError::component(
            "recording",
            format!("Failed to write metadata file: {}", e),
        )
    })?;

    debug!("Saved session metadata to {}", metadata_path.display());
    Ok(metadata_path)
}
