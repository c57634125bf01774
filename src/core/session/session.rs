/*!
One attestation handshake.

A [`Session`] turns message 1 into message 2 and message 3 into message 4.
Anything the enclave gets wrong in message 3 (a bad MAC, a different key, a
quote not bound to this exchange, an identity we do not accept) completes the
handshake with a denied verdict. Sequencing errors, malformed input and
failures of the attestation authority are returned as errors.
*/

use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::core::{
    attestation::{AttestationAuthority, QuoteBody, key_exchange_binding},
    config::SessionConfig,
    constants::{KDF_ID, sizes::MAC_SIZE},
    crypto::{
        DerivedKey, EphemeralKeyPair, KeyLabel, cipher::encrypt_secret, decode_public_key,
        derive_key, encode_public_key, kdk,
    },
    error::{Error, Result},
    message::{AttestationResult, Msg1, Msg2, Msg3, Msg4, msg4_transcript},
    session::state::{Handshake, SessionState},
};
use crate::invalid_state_err;

/// Server side of one attestation handshake
pub struct Session {
    id: u64,
    state: SessionState,
    config: Arc<SessionConfig>,
    authority: Arc<dyn AttestationAuthority>,
}

impl Session {
    /// Create a session waiting for message 1
    pub fn new(
        id: u64,
        config: Arc<SessionConfig>,
        authority: Arc<dyn AttestationAuthority>,
    ) -> Self {
        Self {
            id,
            state: SessionState::AwaitingMsg1,
            config,
            authority,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the key exchange and produce message 2.
    ///
    /// Any failure after the state check leaves the session `Failed`.
    pub async fn process_msg1(&mut self, msg1: &Msg1) -> Result<Msg2> {
        if !matches!(self.state, SessionState::AwaitingMsg1) {
            return invalid_state_err!("AwaitingMsg1", self.state);
        }

        match self.key_exchange(msg1).await {
            Ok((handshake, msg2)) => {
                self.state = SessionState::AwaitingMsg3(handshake);
                debug!(session_id = self.id, "message 2 sent, awaiting message 3");
                Ok(msg2)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                warn!(session_id = self.id, "message 1 rejected: {}", e);
                Err(e)
            }
        }
    }

    async fn key_exchange(&self, msg1: &Msg1) -> Result<(Handshake, Msg2)> {
        let peer = decode_public_key(&msg1.ga)?;

        let ephemeral = EphemeralKeyPair::generate();
        let gb = encode_public_key(ephemeral.public_key())?;
        let kdk = kdk(ephemeral.secret_key(), &peer)?;
        drop(ephemeral);
        let smk = derive_key(&kdk, KeyLabel::Smk)?;

        let signature = self.config.long_term_key.sign_key_exchange(&gb, &msg1.ga)?;
        let mut msg2 = Msg2 {
            gb,
            spid: self.config.spid,
            quote_type: self.config.quote_type,
            kdf_id: KDF_ID,
            signature,
            cmac: [0u8; MAC_SIZE],
            sig_rl: Bytes::new(),
        };
        msg2.cmac = smk.mac(&msg2.payload_bytes())?;

        if self.config.fetch_sig_rl {
            msg2.sig_rl = with_deadline(
                self.config.authority_timeout,
                self.authority.fetch_revocation_list(msg1.group_id),
            )
            .await
            .inspect_err(|e| error!(session_id = self.id, "revocation list fetch failed: {}", e))?;
        }

        let handshake = Handshake {
            ga: msg1.ga,
            gb,
            group_id: msg1.group_id,
            kdk,
            smk,
        };
        Ok((handshake, msg2))
    }

    /// Verify the quote and produce message 4.
    ///
    /// The session is terminal afterwards whatever the outcome: `Established`
    /// if the secret was released, `Failed` otherwise.
    pub async fn process_msg3(&mut self, msg3: &Msg3) -> Result<Msg4> {
        let handshake = match std::mem::replace(&mut self.state, SessionState::Failed) {
            SessionState::AwaitingMsg3(handshake) => handshake,
            other => {
                let actual = other.to_string();
                self.state = other;
                return invalid_state_err!("AwaitingMsg3", actual);
            }
        };

        let msg4 = self.attest(&handshake, msg3).await?;
        if msg4.result.enclave_trusted {
            self.state = SessionState::Established;
            info!(session_id = self.id, "enclave trusted, secret released");
        }
        Ok(msg4)
    }

    async fn attest(&self, handshake: &Handshake, msg3: &Msg3) -> Result<Msg4> {
        if !handshake.smk.verify(&msg3.mac_region(), &msg3.cmac)? {
            warn!(session_id = self.id, "message 3 MAC mismatch");
            return Ok(denied(AttestationResult::denied()));
        }

        if msg3.ga != handshake.ga {
            warn!(session_id = self.id, "message 3 key differs from message 1");
            return Ok(denied(AttestationResult::denied()));
        }

        let quote = QuoteBody::parse(&msg3.quote)?;
        if quote.group_id != handshake.group_id {
            warn!(session_id = self.id, "quote group differs from message 1");
            return Ok(denied(AttestationResult::denied()));
        }

        let vk = derive_key(&handshake.kdk, KeyLabel::Vk)?;
        if !quote.is_bound_to(&key_exchange_binding(&handshake.ga, &handshake.gb, &vk)) {
            warn!(session_id = self.id, "quote report data not bound to this key exchange");
            return Ok(denied(AttestationResult::denied()));
        }

        let verdict = with_deadline(
            self.config.authority_timeout,
            self.authority.verify_quote(&msg3.quote),
        )
        .await
        .inspect_err(|e| error!(session_id = self.id, "quote verification failed: {}", e))?;
        debug!(session_id = self.id, status = %verdict.status, "authority verdict received");

        let mut result = AttestationResult {
            enclave_trusted: false,
            pse_trusted: verdict.pse_trusted,
            platform_info_blob: verdict.platform_info_blob.clone(),
            advisories: verdict.advisories.clone(),
        };

        if let Err(denial) = self.config.policy.evaluate(&quote, &verdict) {
            warn!(session_id = self.id, reason = %denial, "enclave not trusted");
            result.pse_trusted = false;
            return Ok(denied(result));
        }
        result.enclave_trusted = true;

        self.release_secret(handshake, msg3, result)
    }

    fn release_secret(
        &self,
        handshake: &Handshake,
        msg3: &Msg3,
        result: AttestationResult,
    ) -> Result<Msg4> {
        let sk: DerivedKey = derive_key(&handshake.kdk, KeyLabel::Sk)?;
        let mk: DerivedKey = derive_key(&handshake.kdk, KeyLabel::Mk)?;

        let encrypted = encrypt_secret(&sk, &self.config.secret)?;
        let transcript = msg4_transcript(
            &handshake.ga,
            &handshake.gb,
            &msg3.cmac,
            result.enclave_trusted,
            result.pse_trusted,
            &encrypted,
        );
        let final_cmac = mk.mac(&transcript)?;

        Ok(Msg4 {
            result,
            encrypted_secret: Some(encrypted),
            final_cmac,
        })
    }
}

fn denied(result: AttestationResult) -> Msg4 {
    Msg4 {
        result,
        encrypted_secret: None,
        final_cmac: [0u8; MAC_SIZE],
    }
}

/// Await a call to the attestation authority, giving up after `limit`
async fn with_deadline<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit.as_millis() as u64)),
    }
}
