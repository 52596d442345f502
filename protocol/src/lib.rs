//! Wire format for edit events.
//!
//! One event per frame, encoded as compact JSON with single-letter keys:
//! `{"t":12345,"p":10,"c":"a","a":0}`. Encoding is canonical (fixed field
//! order), and decoding rejects anything outside the defined schema rather
//! than defaulting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of edit an [`EditEvent`] describes.
///
/// Encoded on the wire as `0` (insert) or `1` (delete). Any other value
/// fails decoding; unknown actions are never coerced to [`Insert`].
///
/// [`Insert`]: EditAction::Insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EditAction {
    Insert = 0,
    Delete = 1,
}

impl From<EditAction> for u8 {
    fn from(action: EditAction) -> u8 {
        action as u8
    }
}

impl TryFrom<u8> for EditAction {
    type Error = InvalidAction;

    fn try_from(value: u8) -> Result<Self, InvalidAction> {
        match value {
            0 => Ok(EditAction::Insert),
            1 => Ok(EditAction::Delete),
            other => Err(InvalidAction(other)),
        }
    }
}

/// Raised when an encoded action discriminant is outside `{0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid action value {0}, expected 0 (insert) or 1 (delete)")]
pub struct InvalidAction(pub u8);

/// A single character edit, the sole payload type exchanged over the relay.
///
/// Field order matches the wire order (`t`, `p`, `c`, `a`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditEvent {
    /// Timestamp or sequence marker assigned by the sender.
    #[serde(rename = "t")]
    pub time: u32,
    /// Offset into a logical document. Not bounds-checked here: there is
    /// no document model to validate against yet.
    #[serde(rename = "p")]
    pub position: u16,
    /// The inserted character; empty for deletions.
    #[serde(rename = "c")]
    pub character: String,
    #[serde(rename = "a")]
    pub action: EditAction,
}

/// Errors produced when decoding an inbound frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not well-formed JSON, a required field is missing, or a field value
    /// is outside its domain (including unknown action discriminants).
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl EditEvent {
    /// Encode to the canonical wire representation.
    pub fn encode(&self) -> String {
        // Serializing a field-renamed struct with primitive values cannot
        // fail, so the Result collapses here.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode one frame. Fails on malformed JSON, missing fields, and
    /// out-of-range action values.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(payload)?)
    }
}
