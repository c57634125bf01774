/*!
Local acceptance policy applied to a quote after the authority has answered.
*/

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use thiserror::Error;

use crate::core::{
    attestation::{authority::QuoteVerdict, quote::QuoteBody},
    constants::sizes::MEASUREMENT_SIZE,
};

/// An enclave measurement (MRENCLAVE or MRSIGNER)
pub type Measurement = [u8; MEASUREMENT_SIZE];

/// How the MRENCLAVE and MRSIGNER allow-lists combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityPolicy {
    /// Either measurement being listed is enough
    #[default]
    EnclaveOrSigner,
    /// Both measurements must be listed
    EnclaveAndSigner,
    /// Only MRENCLAVE is checked
    EnclaveOnly,
    /// Only MRSIGNER is checked
    SignerOnly,
}

impl IdentityPolicy {
    fn accepts(self, enclave_listed: bool, signer_listed: bool) -> bool {
        match self {
            IdentityPolicy::EnclaveOrSigner => enclave_listed || signer_listed,
            IdentityPolicy::EnclaveAndSigner => enclave_listed && signer_listed,
            IdentityPolicy::EnclaveOnly => enclave_listed,
            IdentityPolicy::SignerOnly => signer_listed,
        }
    }
}

/// Why a quote was not trusted. Only the reason class is ever logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("enclave identity not in the allow-list")]
    UnknownIdentity,

    #[error("product id {actual} does not match {expected}")]
    ProductId { expected: u16, actual: u16 },

    #[error("security version {actual} below minimum {minimum}")]
    SecurityVersion { minimum: u16, actual: u16 },

    #[error("debug enclave")]
    DebugEnclave,

    #[error("quote status {0}")]
    QuoteStatus(String),

    #[error("advisory {advisory} not allowed for {status}")]
    Advisory { status: String, advisory: String },
}

/// Measurement allow-lists and patch-level requirements
#[derive(Debug, Clone, Default)]
pub struct QuotePolicy {
    pub mr_enclaves: HashSet<Measurement>,
    pub mr_signers: HashSet<Measurement>,
    pub identity_policy: IdentityPolicy,
    pub prod_id: u16,
    pub min_isv_svn: u16,
    /// Advisory ids tolerated per quote status
    pub allowed_advisories: HashMap<String, HashSet<String>>,
    pub allow_debug: bool,
}

impl QuotePolicy {
    /// Decide whether the enclave behind `quote` is trusted given the
    /// authority's `verdict`.
    pub fn evaluate(&self, quote: &QuoteBody, verdict: &QuoteVerdict) -> Result<(), Denial> {
        let enclave_listed = self.mr_enclaves.contains(&quote.mr_enclave);
        let signer_listed = self.mr_signers.contains(&quote.mr_signer);
        if !self.identity_policy.accepts(enclave_listed, signer_listed) {
            return Err(Denial::UnknownIdentity);
        }

        if quote.isv_prod_id != self.prod_id {
            return Err(Denial::ProductId {
                expected: self.prod_id,
                actual: quote.isv_prod_id,
            });
        }

        if quote.isv_svn < self.min_isv_svn {
            return Err(Denial::SecurityVersion {
                minimum: self.min_isv_svn,
                actual: quote.isv_svn,
            });
        }

        if quote.is_debug() && !self.allow_debug {
            return Err(Denial::DebugEnclave);
        }

        self.check_verdict(verdict)
    }

    fn check_verdict(&self, verdict: &QuoteVerdict) -> Result<(), Denial> {
        if verdict.advisories.is_empty() {
            // A waivable status is only waived by naming the advisories
            if verdict.enclave_trusted {
                return Ok(());
            }
            return Err(Denial::QuoteStatus(verdict.status.to_string()));
        }

        if !verdict.enclave_trusted && !verdict.status.is_waivable() {
            return Err(Denial::QuoteStatus(verdict.status.to_string()));
        }

        let status = verdict.status.as_str();
        let allowed = self.allowed_advisories.get(status);
        for advisory in &verdict.advisories {
            if !allowed.is_some_and(|set| set.contains(advisory)) {
                return Err(Denial::Advisory {
                    status: status.to_string(),
                    advisory: advisory.clone(),
                });
            }
        }
        Ok(())
    }
}
