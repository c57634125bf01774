/*!
Session states for the attestation handshake.

Each state carries exactly the material the next step needs, so a message
that arrives in the wrong state has nothing to work with.
*/

use std::fmt;

use crate::core::{
    constants::sizes::GROUP_ID_SIZE,
    crypto::DerivedKey,
    message::WirePublicKey,
};

/// Key exchange results kept between message 1 and message 3
#[derive(Debug)]
pub struct Handshake {
    /// Enclave ephemeral public key from message 1
    pub ga: WirePublicKey,
    /// Our ephemeral public key sent in message 2
    pub gb: WirePublicKey,
    /// EPID group announced in message 1
    pub group_id: [u8; GROUP_ID_SIZE],
    pub kdk: DerivedKey,
    pub smk: DerivedKey,
}

/// Session state. Transitions only move forward.
#[derive(Debug, Default)]
pub enum SessionState {
    /// Challenge issued, waiting for the enclave's key
    #[default]
    AwaitingMsg1,
    /// Message 2 sent, waiting for the quote
    AwaitingMsg3(Handshake),
    /// The enclave was trusted and received the secret
    Established,
    /// The handshake ended without trust
    Failed,
}

impl SessionState {
    /// Whether no further message will be accepted
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Established | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::AwaitingMsg1 => write!(f, "AwaitingMsg1"),
            SessionState::AwaitingMsg3(_) => write!(f, "AwaitingMsg3"),
            SessionState::Established => write!(f, "Established"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}
