//! Frame metadata timestamping for media pipelines.
//!
//! Inference elements attach their results to a video frame as JSON
//! messages. [`process_frame`] rewrites the first message of each frame with
//! the wall-clock time it passed through, so downstream consumers can
//! measure end-to-end latency.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const TIMESTAMP_KEY: &str = "system_timestamp";

#[derive(Debug, Error)]
pub enum StampError {
    #[error("frame carries no metadata message")]
    NoMessage,
    #[error("metadata message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata message is not a JSON object")]
    NotAnObject,
}

/// The part of a video frame the annotator needs: its JSON metadata messages.
pub trait FrameMessages {
    fn messages(&self) -> Vec<String>;
    fn remove_message(&mut self, message: &str);
    fn add_message(&mut self, message: String);
}

/// An in-memory frame, for pipelines that hand over plain message lists.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VecFrame {
    messages: Vec<String>,
}

impl VecFrame {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

impl FrameMessages for VecFrame {
    fn messages(&self) -> Vec<String> {
        self.messages.clone()
    }

    fn remove_message(&mut self, message: &str) {
        if let Some(pos) = self.messages.iter().position(|m| m == message) {
            self.messages.remove(pos);
        }
    }

    fn add_message(&mut self, message: String) {
        self.messages.push(message);
    }
}

/// Formats `now` as ISO-8601 UTC with microsecond precision and a `Z` suffix.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Adds `system_timestamp` to a JSON object message.
///
/// Existing keys keep their order, the new key goes last (or is overwritten
/// in place), and the result is compact with non-ASCII text left as is.
pub fn stamp_message(message: &str, now: DateTime<Utc>) -> Result<String, StampError> {
    let mut value: Value = serde_json::from_str(message)?;
    let object = value.as_object_mut().ok_or(StampError::NotAnObject)?;
    object.insert(TIMESTAMP_KEY.to_string(), Value::String(format_timestamp(now)));
    Ok(serde_json::to_string(&value)?)
}

/// Replaces the frame's first message with a timestamped copy.
pub fn stamp_frame<F: FrameMessages + ?Sized>(
    frame: &mut F,
    now: DateTime<Utc>,
) -> Result<(), StampError> {
    let first = frame
        .messages()
        .into_iter()
        .next()
        .ok_or(StampError::NoMessage)?;

    let stamped = stamp_message(&first, now)?;
    frame.remove_message(&first);
    frame.add_message(stamped);
    Ok(())
}

/// Pipeline callback: stamps the frame and always lets it through.
///
/// Frames that cannot be stamped are passed on unchanged.
pub fn process_frame<F: FrameMessages + ?Sized>(frame: &mut F) -> bool {
    match stamp_frame(frame, Utc::now()) {
        Ok(()) => {}
        Err(StampError::NoMessage) => debug!("Frame without metadata, not stamped"),
        Err(e) => warn!(error = %e, "Frame metadata not stamped"),
    }
    true
}
