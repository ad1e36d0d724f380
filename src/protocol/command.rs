//! Outbound command catalog.
//!
//! Every command travels on the command characteristic as UTF-8 text
//! framed by `<` and `>`.  The device parses the same delimiters, so any
//! user-supplied text carried inside a command must be free of them.

use crate::error::ProtocolError;
use crate::link::transport::WriteMode;

/// A command the companion can send to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetAddress,
    StartImu,
    StopImu,
    /// Request a signature over these bytes.
    SignMessage(Vec<u8>),
    SetPassword,
    ConfirmPassword,
    SetInitialPassword(String),
    StartCurrentPasswordVerification,
    StartMorseInput,
    StartMorseConfirm,
    ChangePassword(String),
    ResetPassword(String),
    TrainStart,
    TestGesture(String),
}

impl Command {
    /// Render the framed wire text.
    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        let wire = match self {
            Self::GetAddress => "<get_address>".to_owned(),
            Self::StartImu => "<start_imu>".to_owned(),
            Self::StopImu => "<stop_imu>".to_owned(),
            Self::SignMessage(bytes) => format!("<msg{}>", hex::encode(bytes)),
            Self::SetPassword => "<set_password>".to_owned(),
            Self::ConfirmPassword => "<confirm_password>".to_owned(),
            Self::SetInitialPassword(pw) => {
                format!("<set_initial_password>{}</set_initial_password>", checked(pw)?)
            }
            Self::StartCurrentPasswordVerification => {
                "<start_current_password_verification>".to_owned()
            }
            Self::StartMorseInput => "<start_morse_input>".to_owned(),
            Self::StartMorseConfirm => "<start_morse_confirm>".to_owned(),
            Self::ChangePassword(pw) => {
                format!("<change_password>{}</change_password>", checked(pw)?)
            }
            Self::ResetPassword(pw) => {
                format!("<reset_password>{}</reset_password>", checked(pw)?)
            }
            Self::TrainStart => "<TRAIN_START>".to_owned(),
            Self::TestGesture(name) => format!("<test_gesture:{}>", checked(name)?),
        };
        Ok(wire)
    }

    /// `get_address` is acknowledged at the ATT layer; everything else is
    /// fire-and-forget.
    pub const fn write_mode(&self) -> WriteMode {
        match self {
            Self::GetAddress => WriteMode::WithResponse,
            _ => WriteMode::WithoutResponse,
        }
    }

    /// Short name for logs.  Never includes user payloads.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetAddress => "get_address",
            Self::StartImu => "start_imu",
            Self::StopImu => "stop_imu",
            Self::SignMessage(_) => "msg",
            Self::SetPassword => "set_password",
            Self::ConfirmPassword => "confirm_password",
            Self::SetInitialPassword(_) => "set_initial_password",
            Self::StartCurrentPasswordVerification => "start_current_password_verification",
            Self::StartMorseInput => "start_morse_input",
            Self::StartMorseConfirm => "start_morse_confirm",
            Self::ChangePassword(_) => "change_password",
            Self::ResetPassword(_) => "reset_password",
            Self::TrainStart => "TRAIN_START",
            Self::TestGesture(_) => "test_gesture",
        }
    }
}

fn checked(text: &str) -> Result<&str, ProtocolError> {
    if text.contains(['<', '>']) {
        return Err(ProtocolError::ReservedDelimiter);
    }
    Ok(text)
}
