//! Inbound text messages from the device.
//!
//! | Payload              | Meaning                              |
//! |----------------------|--------------------------------------|
//! | `SUI:<hex>`          | public key                           |
//! | `SIG:<hex>msg<hex>`  | signature over the echoed message    |
//! | `IMU_STOPPED`        | streaming stopped, session final     |
//! | `password_correct`   | password check passed                |
//! | `password_incorrect` | password check failed                |
//!
//! Anything else is surfaced as [`InboundMessage::Unknown`] and ignored
//! by the service.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::ProtocolError;

/// A parsed message payload (delimiters already stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    PublicKey(String),
    Signature(SignedTransaction),
    ImuStopped,
    PasswordVerdict(bool),
    Unknown(String),
}

/// Signature returned by the device together with the bytes it signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Hex, possibly `0x`-prefixed, exactly as sent.
    pub signature_hex: String,
    pub message_hex: String,
}

impl SignedTransaction {
    pub fn signature_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        decode_hex(&self.signature_hex)
    }

    /// Signature in the base64 form ledger clients submit.
    pub fn signature_base64(&self) -> Result<String, ProtocolError> {
        Ok(BASE64.encode(self.signature_bytes()?))
    }

    pub fn message_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        decode_hex(&self.message_hex)
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>, ProtocolError> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(text).map_err(|_| ProtocolError::InvalidHex)
}

/// Classify one reassembled message.
pub fn parse_message(payload: &str) -> Result<InboundMessage, ProtocolError> {
    if let Some(key) = payload.strip_prefix("SUI:") {
        return Ok(InboundMessage::PublicKey(key.trim().to_owned()));
    }
    if let Some(body) = payload.strip_prefix("SIG:") {
        let (signature_hex, message_hex) = body
            .split_once("msg")
            .ok_or(ProtocolError::MalformedSignature)?;
        return Ok(InboundMessage::Signature(SignedTransaction {
            signature_hex: signature_hex.to_owned(),
            message_hex: message_hex.to_owned(),
        }));
    }
    Ok(match payload {
        "IMU_STOPPED" => InboundMessage::ImuStopped,
        "password_correct" => InboundMessage::PasswordVerdict(true),
        "password_incorrect" => InboundMessage::PasswordVerdict(false),
        other => InboundMessage::Unknown(other.to_owned()),
    })
}
