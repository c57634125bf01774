use async_trait::async_trait;
use bytes::Bytes;

use crate::core::{
    attestation::authority::{AttestationAuthority, QuoteVerdict},
    constants::sizes::GROUP_ID_SIZE,
    error::Result,
};

/// An authority that answers every quote with the same verdict.
///
/// Intended for development setups and tests where no attestation service is
/// reachable. It does not look at the quote at all.
#[derive(Debug, Clone)]
pub struct StaticAuthority {
    verdict: QuoteVerdict,
    revocation_list: Bytes,
}

impl StaticAuthority {
    pub fn new(verdict: QuoteVerdict) -> Self {
        Self {
            verdict,
            revocation_list: Bytes::new(),
        }
    }

    /// Authority that trusts every quote
    pub fn trusting() -> Self {
        Self::new(QuoteVerdict::trusted())
    }

    /// Serve `list` as the revocation list of every group
    pub fn with_revocation_list(mut self, list: impl Into<Bytes>) -> Self {
        self.revocation_list = list.into();
        self
    }
}

#[async_trait]
impl AttestationAuthority for StaticAuthority {
    async fn verify_quote(&self, _quote: &[u8]) -> Result<QuoteVerdict> {
        Ok(self.verdict.clone())
    }

    async fn fetch_revocation_list(&self, _group_id: [u8; GROUP_ID_SIZE]) -> Result<Bytes> {
        Ok(self.revocation_list.clone())
    }
}
