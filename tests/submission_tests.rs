//! Submission adapter payload shapes for the four capture surfaces.

use std::io::Cursor;
use std::path::Path;

use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use notecap::artifact::MediaArtifact;
use notecap::device::CaptureMode;
use notecap::encoder::EncodedMedia;
use notecap::submit::{
    ChatComposer, OutboundMessage, SpeakRequestComposer, SubmissionAdapter, SubmissionMetadata,
    VideoReplyComposer, VoiceNoteComposer,
};

fn encoded_blip() -> EncodedMedia {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..1600i32 {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    EncodedMedia {
        wav_bytes: cursor.into_inner(),
        sample_count: 1600,
        sample_rate: 16000,
        channels: 1,
    }
}

fn artifact(dir: &Path, kind: CaptureMode, duration_secs: u64) -> MediaArtifact {
    MediaArtifact::materialize(dir, kind, encoded_blip(), duration_secs).unwrap()
}

fn metadata(caption: Option<&str>, text: Option<&str>) -> SubmissionMetadata {
    SubmissionMetadata {
        caption: caption.map(str::to_string),
        text: text.map(str::to_string),
    }
}

#[tokio::test]
async fn chat_audio_artifact_becomes_an_audio_note() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let composer = ChatComposer::new(tx);

    let artifact = artifact(dir.path(), CaptureMode::Audio, 4);
    let url = artifact.url().display().to_string();

    composer.submit(artifact, metadata(None, None)).await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        OutboundMessage::ChatAudioNote {
            url,
            duration_secs: 4,
        }
    );
}

#[tokio::test]
async fn chat_video_artifact_becomes_a_video_note() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let composer = ChatComposer::new(tx);

    composer
        .submit(artifact(dir.path(), CaptureMode::Video, 7), metadata(None, None))
        .await
        .unwrap();

    assert!(matches!(
        rx.recv().await.unwrap(),
        OutboundMessage::ChatVideoNote { duration_secs: 7, .. }
    ));
}

#[tokio::test]
async fn chat_text_messages_share_the_outbound_channel() {
    let (tx, mut rx) = mpsc::channel(4);
    let composer = ChatComposer::new(tx);

    composer.submit_text_message("hello there").await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        OutboundMessage::ChatText {
            text: "hello there".to_string(),
        }
    );
}

#[tokio::test]
async fn voice_note_carries_caption_and_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::channel(4);

    let at = Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap();
    let composer = VoiceNoteComposer::new(tx).with_schedule(at);

    composer
        .submit(
            artifact(dir.path(), CaptureMode::Audio, 10),
            metadata(Some("weekly update"), None),
        )
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        OutboundMessage::VoiceNote {
            caption,
            voice_memo,
            scheduled_at,
        } => {
            assert_eq!(caption, "weekly update");
            assert_eq!(voice_memo.duration_secs, 10);
            assert_eq!(scheduled_at, Some(at));
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn speak_request_fills_exactly_one_media_slot() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let composer = SpeakRequestComposer::new(tx);

    composer
        .submit(
            artifact(dir.path(), CaptureMode::Audio, 3),
            metadata(None, Some("may I?")),
        )
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        OutboundMessage::SpeakRequest {
            text,
            voice_memo,
            video_note,
        } => {
            assert_eq!(text.as_deref(), Some("may I?"));
            assert!(voice_memo.is_some());
            assert!(video_note.is_none());
        }
        other => panic!("unexpected message: {:?}", other),
    }

    composer
        .submit(artifact(dir.path(), CaptureMode::Video, 3), metadata(None, None))
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        OutboundMessage::SpeakRequest {
            voice_memo,
            video_note,
            ..
        } => {
            assert!(voice_memo.is_none());
            assert!(video_note.is_some());
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn speak_request_supports_text_only() {
    let (tx, mut rx) = mpsc::channel(4);
    let composer = SpeakRequestComposer::new(tx);

    composer.submit_text("no media attached").await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        OutboundMessage::SpeakRequest {
            text: Some("no media attached".to_string()),
            voice_memo: None,
            video_note: None,
        }
    );
}

#[tokio::test]
async fn video_reply_rejects_audio_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let composer = VideoReplyComposer::new(tx);

    let result = composer
        .submit(artifact(dir.path(), CaptureMode::Audio, 2), metadata(None, None))
        .await;
    assert!(result.is_err());

    composer
        .submit(
            artifact(dir.path(), CaptureMode::Video, 6),
            metadata(Some("reply"), None),
        )
        .await
        .unwrap();

    assert!(matches!(
        rx.recv().await.unwrap(),
        OutboundMessage::VideoReply { .. }
    ));
}

#[test]
fn outbound_messages_serialize_with_a_type_tag() {
    let message = OutboundMessage::VoiceNote {
        caption: "c".to_string(),
        voice_memo: notecap::submit::MediaRef {
            url: "/tmp/note.wav".to_string(),
            duration_secs: 5,
        },
        scheduled_at: None,
    };

    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["type"], "voice_note");
    assert_eq!(value["voice_memo"]["duration_secs"], 5);

    let text = serde_json::to_value(OutboundMessage::ChatText {
        text: "hi".to_string(),
    })
    .unwrap();
    assert_eq!(text["type"], "chat_text");
}
