mod metadata;

pub use metadata::{save_metadata, SessionMetadata};

use crate::config::{RecordingConfig, WriteFailurePolicy};
use crate::error::RecordingError;
use crate::events::VideoPacket;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// File name pattern for session recordings, sortable by start time
pub const RECORDING_NAME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";
pub const RECORDING_EXTENSION: &str = "nal";

/// Recording lifecycle as seen by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Recording,
    /// A write failed; the file holds an exact prefix and no more packets are written
    Degraded,
    Closed,
}

/// Append-only raw video recording for one session
///
/// Every append is written, flushed and synced before `append` returns, so
/// the file on disk is always a byte-exact prefix of the packet stream.
pub struct RecordingSink {
    file: Option<File>,
    path: PathBuf,
    policy: WriteFailurePolicy,
    state: RecordingState,
    bytes_committed: u64,
    packets_written: u64,
    packets_skipped: u64,
}

impl RecordingSink {
    /// Create the session recording named after `started_at`
    pub async fn create(
        config: &RecordingConfig,
        started_at: DateTime<Utc>,
    ) -> Result<Self, RecordingError> {
        let dir = PathBuf::from(&config.path);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| RecordingError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;

        let tz = resolve_timezone(&config.timezone);
        let stem = started_at
            .with_timezone(&tz)
            .format(RECORDING_NAME_FORMAT)
            .to_string();

        let (path, file) = create_unique(&dir, &stem).await?;
        info!("Recording video to {}", path.display());

        Ok(Self::from_file(path, file, config.on_write_failure))
    }

    /// Wrap an already opened file
    pub fn from_file(path: PathBuf, file: File, policy: WriteFailurePolicy) -> Self {
        Self {
            file: Some(file),
            path,
            policy,
            state: RecordingState::Recording,
            bytes_committed: 0,
            packets_written: 0,
            packets_skipped: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Bytes durably on disk
    pub fn bytes_committed(&self) -> u64 {
        self.bytes_committed
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Packets received after recording stopped
    pub fn packets_skipped(&self) -> u64 {
        self.packets_skipped
    }

    /// Append one packet and sync it to storage
    ///
    /// Under [`WriteFailurePolicy::Degrade`] a failure switches the sink to
    /// [`RecordingState::Degraded`] and returns `Ok`; under
    /// [`WriteFailurePolicy::Abort`] it is returned to the caller.
    pub async fn append(&mut self, packet: &VideoPacket) -> Result<(), RecordingError> {
        if self.state != RecordingState::Recording {
            self.packets_skipped += 1;
            return Ok(());
        }
        let Some(file) = self.file.as_mut() else {
            self.packets_skipped += 1;
            return Ok(());
        };

        let written = async {
            file.write_all(packet.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        match written {
            Ok(()) => {
                self.bytes_committed += packet.len() as u64;
                self.packets_written += 1;
                Ok(())
            }
            Err(source) => self.handle_write_failure(source).await,
        }
    }

    async fn handle_write_failure(&mut self, source: std::io::Error) -> Result<(), RecordingError> {
        self.packets_skipped += 1;

        // Cut a torn partial write back to the last synced length
        let committed = self.bytes_committed;
        if let Some(file) = self.file.as_mut() {
            let truncated = async {
                file.set_len(committed).await?;
                file.sync_all().await
            }
            .await;
            if let Err(e) = truncated {
                warn!(
                    "Could not truncate {} to {} bytes: {}",
                    self.path.display(),
                    self.bytes_committed,
                    e
                );
            }
        }

        let err = RecordingError::Write {
            path: self.path.clone(),
            committed: self.bytes_committed,
            source,
        };

        match self.policy {
            WriteFailurePolicy::Degrade => {
                error!("{}; recording stopped, flight control continues", err);
                self.state = RecordingState::Degraded;
                Ok(())
            }
            WriteFailurePolicy::Abort => {
                error!("{}; ending session", err);
                self.state = RecordingState::Degraded;
                Err(err)
            }
        }
    }

    /// Sync and close the recording
    pub async fn close(&mut self) -> Result<(), RecordingError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        let previous = self.state;
        self.state = RecordingState::Closed;

        if previous == RecordingState::Recording {
            let synced = async {
                file.flush().await?;
                file.sync_all().await
            }
            .await;
            synced.map_err(|source| RecordingError::Close {
                path: self.path.clone(),
                source,
            })?;
        }

        info!(
            "Closed recording {} ({} packets, {} bytes)",
            self.path.display(),
            self.packets_written,
            self.bytes_committed
        );
        Ok(())
    }
}

/// Resolve configured timezone, falling back to UTC on parse errors
pub fn resolve_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Invalid recording timezone '{}', falling back to UTC", tz_name);
            chrono_tz::UTC
        }
    }
}

async fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, File), RecordingError> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}.{}", stem, RECORDING_EXTENSION)
        } else {
            format!("{}-{}.{}", stem, attempt, RECORDING_EXTENSION)
        };
        let path = dir.join(name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                debug!("Recording {} already exists", path.display());
                attempt += 1;
            }
            Err(source) => return Err(RecordingError::CreateFile { path, source }),
        }
    }
}

/// Recordings in `dir`, oldest first
pub async fn list_recordings(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut recordings = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(RECORDING_EXTENSION) {
            recordings.push(path);
        }
    }

    recordings.sort_by_cached_key(|path| recording_sort_key(path));
    Ok(recordings)
}

/// Base name and collision suffix, so `T-1` follows the unsuffixed file
fn recording_sort_key(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some((base, suffix)) = stem.rsplit_once('-') {
        if let Ok(n) = suffix.parse::<u32>() {
            if chrono::NaiveDateTime::parse_from_str(base, RECORDING_NAME_FORMAT).is_ok() {
                return (base.to_string(), n);
            }
        }
    }
    (stem, 0)
}
