//! Server side of the attestation protocol.
//!
//! [`AttestationServer`] is the four-operation contract a transport exposes.
//! [`SessionManager`] implements it directly.

use async_trait::async_trait;

use crate::core::{
    error::Result,
    message::{Challenge, Msg1, Msg2, Msg3, Msg4, Request},
    session::SessionManager,
};

// Raw byte entry points
pub mod common;

/// The attestation RPC surface
#[async_trait]
pub trait AttestationServer: Send + Sync {
    /// Open a session and return its id and challenge
    async fn start_attestation(&self, request: Request) -> Result<Challenge>;

    /// Deliver message 1 and receive message 2
    async fn send_msg1(&self, msg1: Msg1) -> Result<Msg2>;

    /// Deliver message 3 and receive the verdict
    async fn send_msg3(&self, msg3: Msg3) -> Result<Msg4>;
}

#[async_trait]
impl AttestationServer for SessionManager {
    async fn start_attestation(&self, request: Request) -> Result<Challenge> {
        self.new_session(&request)
    }

    async fn send_msg1(&self, msg1: Msg1) -> Result<Msg2> {
        self.msg1_to_msg2(&msg1).await
    }

    async fn send_msg3(&self, msg3: Msg3) -> Result<Msg4> {
        self.msg3_to_msg4(&msg3).await
    }
}
