//! Submission boundary: hands finished artifacts to the feature that
//! initiated capture.
//!
//! Every call site satisfies the same contract; the engine guarantees the
//! artifact passed to `submit` is complete, non-empty, and exclusively
//! owned by the adapter from that point on. Messages are delivered over an
//! in-process outbound channel; transport is out of scope.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::artifact::MediaArtifact;
use crate::device::CaptureMode;

/// Caption/text accompanying a submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub caption: Option<String>,
    pub text: Option<String>,
}

/// Reference to submitted media
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub duration_secs: u64,
}

impl MediaRef {
    fn from_artifact(artifact: &MediaArtifact) -> Self {
        Self {
            url: artifact.url().display().to_string(),
            duration_secs: artifact.duration_secs(),
        }
    }
}

/// Messages produced by the four capture surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ChatText {
        text: String,
    },
    ChatAudioNote {
        url: String,
        duration_secs: u64,
    },
    ChatVideoNote {
        url: String,
        duration_secs: u64,
    },
    VoiceNote {
        caption: String,
        voice_memo: MediaRef,
        scheduled_at: Option<DateTime<Utc>>,
    },
    SpeakRequest {
        text: Option<String>,
        voice_memo: Option<MediaRef>,
        video_note: Option<MediaRef>,
    },
    VideoReply {
        caption: String,
        file: MediaRef,
    },
}

/// The contract every capture surface satisfies.
#[async_trait::async_trait]
pub trait SubmissionAdapter: Send + Sync {
    async fn submit(&self, artifact: MediaArtifact, metadata: SubmissionMetadata) -> Result<()>;
}

/// Chat-style input: text messages plus audio/video notes.
pub struct ChatComposer {
    outbound: mpsc::Sender<OutboundMessage>,
}

impl ChatComposer {
    pub fn new(outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self { outbound }
    }

    pub async fn submit_text_message(&self, text: impl Into<String>) -> Result<()> {
        self.outbound
            .send(OutboundMessage::ChatText { text: text.into() })
            .await
            .context("outbound channel closed")
    }
}

#[async_trait::async_trait]
impl SubmissionAdapter for ChatComposer {
    async fn submit(&self, artifact: MediaArtifact, _metadata: SubmissionMetadata) -> Result<()> {
        let media = MediaRef::from_artifact(&artifact);

        let message = match artifact.kind() {
            CaptureMode::Audio => OutboundMessage::ChatAudioNote {
                url: media.url,
                duration_secs: media.duration_secs,
            },
            CaptureMode::Video => OutboundMessage::ChatVideoNote {
                url: media.url,
                duration_secs: media.duration_secs,
            },
        };

        info!("chat composer submitting {} note", artifact.kind().as_str());

        self.outbound
            .send(message)
            .await
            .context("outbound channel closed")
    }
}

/// Voice-note composer: caption + voice memo, optionally scheduled.
pub struct VoiceNoteComposer {
    outbound: mpsc::Sender<OutboundMessage>,
    scheduled_at: Option<DateTime<Utc>>,
}

impl VoiceNoteComposer {
    pub fn new(outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            outbound,
            scheduled_at: None,
        }
    }

    /// Attach a future-delivery timestamp (scheduling itself happens
    /// elsewhere; the timestamp only rides along).
    pub fn with_schedule(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

#[async_trait::async_trait]
impl SubmissionAdapter for VoiceNoteComposer {
    async fn submit(&self, artifact: MediaArtifact, metadata: SubmissionMetadata) -> Result<()> {
        let message = OutboundMessage::VoiceNote {
            caption: metadata.caption.unwrap_or_default(),
            voice_memo: MediaRef::from_artifact(&artifact),
            scheduled_at: self.scheduled_at,
        };

        self.outbound
            .send(message)
            .await
            .context("outbound channel closed")
    }
}

/// Request-to-speak form: optional text plus at most one media attachment.
pub struct SpeakRequestComposer {
    outbound: mpsc::Sender<OutboundMessage>,
}

impl SpeakRequestComposer {
    pub fn new(outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self { outbound }
    }

    /// Text-only request, no media attached.
    pub async fn submit_text(&self, text: impl Into<String>) -> Result<()> {
        self.outbound
            .send(OutboundMessage::SpeakRequest {
                text: Some(text.into()),
                voice_memo: None,
                video_note: None,
            })
            .await
            .context("outbound channel closed")
    }
}

#[async_trait::async_trait]
impl SubmissionAdapter for SpeakRequestComposer {
    async fn submit(&self, artifact: MediaArtifact, metadata: SubmissionMetadata) -> Result<()> {
        let media = MediaRef::from_artifact(&artifact);

        // One artifact, one slot: a request never carries both.
        let (voice_memo, video_note) = match artifact.kind() {
            CaptureMode::Audio => (Some(media), None),
            CaptureMode::Video => (None, Some(media)),
        };

        self.outbound
            .send(OutboundMessage::SpeakRequest {
                text: metadata.text,
                voice_memo,
                video_note,
            })
            .await
            .context("outbound channel closed")
    }
}

/// Video-reply composer: caption + a video file reference.
pub struct VideoReplyComposer {
    outbound: mpsc::Sender<OutboundMessage>,
}

impl VideoReplyComposer {
    pub fn new(outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self { outbound }
    }
}

#[async_trait::async_trait]
impl SubmissionAdapter for VideoReplyComposer {
    async fn submit(&self, artifact: MediaArtifact, metadata: SubmissionMetadata) -> Result<()> {
        if artifact.kind() != CaptureMode::Video {
            anyhow::bail!("video reply requires a video artifact");
        }

        let message = OutboundMessage::VideoReply {
            caption: metadata.caption.unwrap_or_default(),
            file: MediaRef::from_artifact(&artifact),
        };

        self.outbound
            .send(message)
            .await
            .context("outbound channel closed")
    }
}
