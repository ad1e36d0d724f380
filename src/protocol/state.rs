//! Signing-phase state machine.
//!
//! ```text
//!        begin_signing            on_signature
//!  Idle ───────────────▶ AwaitingSignature ───────────▶ Broadcasting
//!   ▲                           │                           │
//!   │        cancel / timeout   │      finish_broadcast     │
//!   └───────────────────────────┴───────────────────────────┘
//! ```
//!
//! Only the transitions drawn above are legal.  `finish_broadcast` runs
//! whatever the ledger outcome was, so a failed broadcast never strands
//! the flow outside `Idle`.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Phase of the transaction-signing flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SystemState {
    #[default]
    Idle,
    AwaitingSignature,
    Broadcasting,
}

impl SystemState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::AwaitingSignature => "AWAITING_SIG",
            Self::Broadcasting => "BROADCASTING",
        }
    }
}

/// Owner of the current [`SystemState`].
#[derive(Debug, Default)]
pub struct SigningFlow {
    state: SystemState,
}

impl SigningFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// `Idle → AwaitingSignature`.
    pub fn begin_signing(&mut self) -> Result<(), ProtocolError> {
        if self.state != SystemState::Idle {
            return Err(ProtocolError::Busy(self.state));
        }
        self.state = SystemState::AwaitingSignature;
        info!("Signing requested, awaiting device signature");
        Ok(())
    }

    /// `AwaitingSignature → Broadcasting`.  Anything else is unsolicited.
    pub fn on_signature(&mut self) -> Result<(), ProtocolError> {
        if self.state != SystemState::AwaitingSignature {
            warn!("Signature received in {:?}, dropping", self.state);
            return Err(ProtocolError::NoPendingSignature);
        }
        self.state = SystemState::Broadcasting;
        Ok(())
    }

    /// Back to `Idle` after the ledger call, success or not.
    pub fn finish_broadcast(&mut self) {
        if self.state != SystemState::Broadcasting {
            warn!("finish_broadcast while {:?}", self.state);
        }
        self.state = SystemState::Idle;
    }

    /// Local reset.  The device is not told.
    pub fn cancel(&mut self) {
        self.state = SystemState::Idle;
    }
}
