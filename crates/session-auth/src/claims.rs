//! Claim extraction from bearer tokens
//!
//! Reads the payload segment of a `header.payload.signature` token. The
//! signature is never checked: these claims are what the server told us about
//! our own token, useful for scheduling and display, and must not be treated
//! as verified identity.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;

/// URL-safe base64 that accepts padded and unpadded input.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Claims this client reads from a token. Other fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    /// `sub`, when present as a string
    pub subject: Option<String>,
    /// `exp` converted to unix milliseconds. Absent when missing, zero or not a
    /// number; negative values clamp to 0
    pub expires_at_millis: Option<u64>,
}

impl Claims {
    /// Subject suitable for display: present and not blank.
    pub fn username(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Decode the claims of `token` without verifying it.
///
/// Returns `None` on any malformation: a segment count other than three,
/// invalid base64, or a payload that is not a JSON object.
pub fn decode(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    // Accept the standard alphabet too
    let payload: String = payload
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    let object = value.as_object()?;

    let subject = object
        .get("sub")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let expires_at_millis = object
        .get("exp")
        .and_then(Value::as_f64)
        .filter(|exp| exp.is_finite() && *exp != 0.0)
        // A negative expiry is long past; clamp it to the epoch
        .map(|exp| (exp.max(0.0) * 1000.0) as u64);

    Some(Claims {
        subject,
        expires_at_millis,
    })
}
