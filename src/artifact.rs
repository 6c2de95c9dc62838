//! Finalized capture artifacts.
//!
//! An artifact is owned by exactly one holder at a time: the preview buffer
//! after finalization, then either released (delete) or moved to the
//! submission adapter (send). `MediaArtifact` is deliberately not `Clone`
//! and `release` consumes it, so a double release does not compile.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::device::CaptureMode;
use crate::encoder::EncodedMedia;

/// A finished recording: a dereferenceable on-disk handle plus the raw
/// bytes backing it, valid until explicitly released.
#[derive(Debug)]
pub struct MediaArtifact {
    id: Uuid,
    kind: CaptureMode,
    path: PathBuf,
    data: Vec<u8>,
    duration_secs: u64,
}

impl MediaArtifact {
    /// Write the encoded bytes under `dir` and take ownership of the
    /// resulting file. Duration is floored at one second.
    pub fn materialize(
        dir: &Path,
        kind: CaptureMode,
        media: EncodedMedia,
        duration_secs: u64,
    ) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create recordings dir {:?}", dir))?;

        let id = Uuid::new_v4();
        let path = dir.join(format!("note-{}-{}.wav", kind.as_str(), id));

        fs::write(&path, &media.wav_bytes)
            .with_context(|| format!("failed to write artifact {:?}", path))?;

        info!(
            "artifact materialized: {} ({} samples, {}s)",
            path.display(),
            media.sample_count,
            duration_secs.max(1)
        );

        Ok(Self {
            id,
            kind,
            path,
            data: media.wav_bytes,
            duration_secs: duration_secs.max(1),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> CaptureMode {
        self.kind
    }

    /// The on-disk handle
    pub fn url(&self) -> &Path {
        &self.path
    }

    /// Raw encoded bytes backing `url`
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Delete the underlying file. Consumes the artifact; a failed removal
    /// is logged and never blocks the owning state transition.
    pub fn release(self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(
                "artifact teardown failed for {}: {}",
                self.path.display(),
                e
            );
        } else {
            info!("artifact released: {}", self.path.display());
        }
    }
}
