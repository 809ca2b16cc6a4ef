//! Self-describing model snapshots
//!
//! A snapshot is a bincode envelope holding a magic header, the format
//! version, the creation time, the training schema and the encoded model with
//! its blake3 hash. Loading checks the header, version and hash before the
//! model is decoded.

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabreg_core::{EngineError, ModelSerializer, RegressionModel, Schema};
use tracing::{debug, warn};

use crate::model::SearchModel;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"TBRG";
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

/// Largest snapshot accepted or produced by default
pub const DEFAULT_MAX_SNAPSHOT_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u16,
    created_at: DateTime<Utc>,
    algorithm: String,
    schema: Schema,
    model_hash: String,
    model: Vec<u8>,
}

/// Metadata readable without decoding the model
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub format_version: u16,
    pub created_at: DateTime<Utc>,
    pub algorithm: String,
    pub schema: Schema,
    /// Hex blake3 hash of the encoded model
    pub model_hash: String,
}

/// [`ModelSerializer`] for [`SearchModel`]
#[derive(Debug, Clone, Copy)]
pub struct SnapshotSerializer {
    max_bytes: u64,
}

impl Default for SnapshotSerializer {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
        }
    }
}

impl SnapshotSerializer {
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new().with_limit(self.max_bytes)
    }

    /// Read and verify the envelope of a snapshot
    pub fn inspect(&self, bytes: &[u8]) -> Result<SnapshotInfo, EngineError> {
        let envelope = self.open(bytes)?;
        Ok(SnapshotInfo {
            format_version: envelope.format_version,
            created_at: envelope.created_at,
            algorithm: envelope.algorithm,
            schema: envelope.schema,
            model_hash: envelope.model_hash,
        })
    }

    fn open(&self, bytes: &[u8]) -> Result<Envelope, EngineError> {
        let envelope: Envelope = self
            .options()
            .deserialize(bytes)
            .map_err(|e| EngineError::Deserialization(format!("corrupt snapshot: {}", e)))?;

        if envelope.magic != SNAPSHOT_MAGIC {
            return Err(EngineError::Deserialization(
                "missing snapshot header".into(),
            ));
        }
        if envelope.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(EngineError::Deserialization(format!(
                "unsupported snapshot version {} (expected {})",
                envelope.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if envelope.created_at > Utc::now() {
            warn!(
                "Snapshot timestamp {} is ahead of the local clock",
                envelope.created_at
            );
        }

        let hash = hex::encode(blake3::hash(&envelope.model).as_bytes());
        if hash != envelope.model_hash {
            return Err(EngineError::Deserialization("model hash mismatch".into()));
        }

        Ok(envelope)
    }
}

impl ModelSerializer<SearchModel> for SnapshotSerializer {
    fn save(&self, model: &SearchModel, schema: &Schema) -> Result<Vec<u8>, EngineError> {
        model.validate().map_err(EngineError::Serialization)?;

        let encoded = self
            .options()
            .serialize(model)
            .map_err(|e| EngineError::Serialization(format!("model encoding failed: {}", e)))?;

        let envelope = Envelope {
            magic: SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            created_at: Utc::now(),
            algorithm: model.algorithm_name().to_string(),
            schema: schema.clone(),
            model_hash: hex::encode(blake3::hash(&encoded).as_bytes()),
            model: encoded,
        };

        let bytes = self
            .options()
            .serialize(&envelope)
            .map_err(|e| EngineError::Serialization(format!("snapshot encoding failed: {}", e)))?;
        debug!(
            "Encoded {} snapshot ({} bytes, hash {})",
            envelope.algorithm,
            bytes.len(),
            &envelope.model_hash[..16]
        );
        Ok(bytes)
    }

    fn load(&self, bytes: &[u8]) -> Result<(SearchModel, Schema), EngineError> {
        let envelope = self.open(bytes)?;

        let model: SearchModel = self
            .options()
            .deserialize(&envelope.model)
            .map_err(|e| EngineError::Deserialization(format!("corrupt model: {}", e)))?;
        model.validate().map_err(EngineError::Deserialization)?;

        if model.algorithm_name() != envelope.algorithm {
            return Err(EngineError::Deserialization(format!(
                "snapshot names {} but holds a {} model",
                envelope.algorithm,
                model.algorithm_name()
            )));
        }

        Ok((model, envelope.schema))
    }
}
