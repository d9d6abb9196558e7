use std::path::PathBuf;

use bincode::config;
use compio::fs;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::codec::PersistedState;

const STATE_FILE_PATH: &str = ".notemark/state.bin";
const ZSTD_LEVEL: i32 = 3;

/// Durable storage for exactly one serialized store state, kept as a
/// zstd-compressed bincode payload under a fixed key inside `root`.
///
/// Writes are idempotent full overwrites, last writer wins.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StateStore { root: root.into() }
    }

    fn state_file_path(&self) -> PathBuf {
        self.root.join(STATE_FILE_PATH)
    }

    /// Reads the persisted state. Anything short of a readable, decodable
    /// payload means "nothing persisted" and the caller starts fresh.
    pub async fn load(&self) -> Option<PersistedState> {
        match self.try_load().await {
            Ok(state) => {
                debug!("Loaded persisted state from {}", self.state_file_path().display());
                Some(state)
            }
            Err(StateStoreError::ReadError { .. }) => {
                info!("No persisted notebook state found, starting fresh");
                None
            }
            Err(e) => {
                warn!("Discarding unreadable persisted state: {e}");
                None
            }
        }
    }

    /// Writes the state as a full overwrite. Failures are logged and
    /// swallowed here; the in-memory tree stays authoritative for the
    /// session regardless.
    pub async fn save(&self, state: &PersistedState) {
        if let Err(e) = self.try_save(state).await {
            warn!("Failed to persist notebook state: {e}");
        }
    }

    async fn try_load(&self) -> Result<PersistedState, StateStoreError> {
        let path = self.state_file_path();
        let bytes = fs::read(&path)
            .await
            .context(ReadSnafu { path: path.clone() })?;
        let decompressed = zstd::decode_all(&bytes[..]).context(DecompressSnafu)?;
        let (state, _) =
            bincode::decode_from_slice(&decompressed, config::standard()).context(DecodeSnafu)?;
        Ok(state)
    }

    async fn try_save(&self, state: &PersistedState) -> Result<(), StateStoreError> {
        let bytes = bincode::encode_to_vec(state, config::standard()).context(EncodeSnafu)?;
        let compressed = zstd::encode_all(&bytes[..], ZSTD_LEVEL).context(CompressSnafu)?;

        let path = self.state_file_path();
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent).await;
        }
        let res = fs::write(&path, compressed).await;
        res.0.map(|_| ()).context(WriteSnafu { path })
    }
}

#[derive(Debug, Snafu)]
pub enum StateStoreError {
    #[snafu(display("Failed to read the state file at {}", path.display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write the state file at {}", path.display()))]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to compress the state payload"))]
    CompressError { source: std::io::Error },
    #[snafu(display("Failed to decompress the state payload"))]
    DecompressError { source: std::io::Error },
    #[snafu(display("Failed to encode the state payload"))]
    EncodeError { source: bincode::error::EncodeError },
    #[snafu(display("Failed to decode the state payload"))]
    DecodeError { source: bincode::error::DecodeError },
}
