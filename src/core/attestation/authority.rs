/*!
Contract with the external attestation authority and the verdict it returns.
*/

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::core::{
    constants::sizes::GROUP_ID_SIZE,
    error::{Error, Result},
};

/// Trait for the service that verifies quotes and serves revocation lists.
///
/// Any failure must be reported as an error. The session never treats an
/// error as a trusted verdict.
#[async_trait]
pub trait AttestationAuthority
where
    Self: Send + Sync + 'static,
{
    /// Verify a raw quote and return the authority's verdict.
    async fn verify_quote(&self, quote: &[u8]) -> Result<QuoteVerdict>;

    /// Fetch the signature revocation list of an EPID group. An empty list
    /// is a valid answer.
    async fn fetch_revocation_list(&self, group_id: [u8; GROUP_ID_SIZE]) -> Result<Bytes>;
}

/// Quote status reported by the authority
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuoteStatus {
    Ok,
    SignatureInvalid,
    GroupRevoked,
    SignatureRevoked,
    KeyRevoked,
    SigRlVersionMismatch,
    GroupOutOfDate,
    ConfigurationNeeded,
    SwHardeningNeeded,
    ConfigurationAndSwHardeningNeeded,
    /// A status this server does not know; never trusted
    Other(String),
}

impl QuoteStatus {
    /// Parse the authority's status string
    pub fn parse(status: &str) -> Self {
        match status {
            "OK" => QuoteStatus::Ok,
            "SIGNATURE_INVALID" => QuoteStatus::SignatureInvalid,
            "GROUP_REVOKED" => QuoteStatus::GroupRevoked,
            "SIGNATURE_REVOKED" => QuoteStatus::SignatureRevoked,
            "KEY_REVOKED" => QuoteStatus::KeyRevoked,
            "SIGRL_VERSION_MISMATCH" => QuoteStatus::SigRlVersionMismatch,
            "GROUP_OUT_OF_DATE" => QuoteStatus::GroupOutOfDate,
            "CONFIGURATION_NEEDED" => QuoteStatus::ConfigurationNeeded,
            "SW_HARDENING_NEEDED" => QuoteStatus::SwHardeningNeeded,
            "CONFIGURATION_AND_SW_HARDENING_NEEDED" => {
                QuoteStatus::ConfigurationAndSwHardeningNeeded
            }
            other => QuoteStatus::Other(other.to_string()),
        }
    }

    /// The status string, which is also the key of the allowed-advisory map
    pub fn as_str(&self) -> &str {
        match self {
            QuoteStatus::Ok => "OK",
            QuoteStatus::SignatureInvalid => "SIGNATURE_INVALID",
            QuoteStatus::GroupRevoked => "GROUP_REVOKED",
            QuoteStatus::SignatureRevoked => "SIGNATURE_REVOKED",
            QuoteStatus::KeyRevoked => "KEY_REVOKED",
            QuoteStatus::SigRlVersionMismatch => "SIGRL_VERSION_MISMATCH",
            QuoteStatus::GroupOutOfDate => "GROUP_OUT_OF_DATE",
            QuoteStatus::ConfigurationNeeded => "CONFIGURATION_NEEDED",
            QuoteStatus::SwHardeningNeeded => "SW_HARDENING_NEEDED",
            QuoteStatus::ConfigurationAndSwHardeningNeeded => {
                "CONFIGURATION_AND_SW_HARDENING_NEEDED"
            }
            QuoteStatus::Other(other) => other,
        }
    }

    /// Statuses where the quote itself is valid but the platform needs an
    /// update; these may be waived per advisory.
    pub fn is_waivable(&self) -> bool {
        matches!(
            self,
            QuoteStatus::GroupOutOfDate
                | QuoteStatus::ConfigurationNeeded
                | QuoteStatus::SwHardeningNeeded
                | QuoteStatus::ConfigurationAndSwHardeningNeeded
        )
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authority's answer for one quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteVerdict {
    pub status: QuoteStatus,
    pub enclave_trusted: bool,
    pub pse_trusted: bool,
    pub advisories: Vec<String>,
    /// Present only when the verdict is not fully trusted
    pub platform_info_blob: Option<Bytes>,
}

impl QuoteVerdict {
    /// A fully trusted verdict with no advisories
    pub fn trusted() -> Self {
        Self {
            status: QuoteStatus::Ok,
            enclave_trusted: true,
            pse_trusted: true,
            advisories: Vec::new(),
            platform_info_blob: None,
        }
    }

    /// An untrusted verdict with the given status
    pub fn with_status(status: QuoteStatus, advisories: Vec<String>) -> Self {
        Self {
            enclave_trusted: status == QuoteStatus::Ok,
            status,
            pse_trusted: false,
            advisories,
            platform_info_blob: None,
        }
    }

    /// Build a verdict from the JSON body of an Intel Attestation Service
    /// verification report.
    pub fn from_ias_report(body: &[u8]) -> Result<Self> {
        let report: IasReport = serde_json::from_slice(body)
            .map_err(|e| Error::Authority(format!("malformed verification report: {}", e)))?;

        let status = QuoteStatus::parse(&report.isv_enclave_quote_status);
        let platform_info_blob = report
            .platform_info_blob
            .map(|blob| {
                hex::decode(&blob)
                    .map(Bytes::from)
                    .map_err(|_| Error::Authority("malformed platform info blob".into()))
            })
            .transpose()?;

        Ok(Self {
            enclave_trusted: status == QuoteStatus::Ok,
            pse_trusted: report.pse_manifest_status.as_deref() == Some("OK"),
            status,
            advisories: report.advisory_ids.unwrap_or_default(),
            platform_info_blob,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IasReport {
    isv_enclave_quote_status: String,
    pse_manifest_status: Option<String>,
    platform_info_blob: Option<String>,
    #[serde(rename = "advisoryIDs")]
    advisory_ids: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            "OK",
            "GROUP_OUT_OF_DATE",
            "CONFIGURATION_NEEDED",
            "SW_HARDENING_NEEDED",
            "CONFIGURATION_AND_SW_HARDENING_NEEDED",
            "KEY_REVOKED",
            "SOMETHING_NEW",
        ] {
            assert_eq!(QuoteStatus::parse(status).as_str(), status);
        }
        assert!(QuoteStatus::parse("GROUP_OUT_OF_DATE").is_waivable());
        assert!(!QuoteStatus::parse("GROUP_REVOKED").is_waivable());
        assert!(!QuoteStatus::parse("SOMETHING_NEW").is_waivable());
    }

    #[test]
    fn test_ias_report_ok() {
        let body = br#"{
            "id": "1",
            "timestamp": "2020-01-01T00:00:00",
            "version": 3,
            "isvEnclaveQuoteStatus": "OK",
            "pseManifestStatus": "OK",
            "isvEnclaveQuoteBody": "AAAA"
        }"#;
        let verdict = QuoteVerdict::from_ias_report(body).unwrap();
        assert_eq!(verdict, QuoteVerdict::trusted());
    }

    #[test]
    fn test_ias_report_out_of_date() {
        let body = br#"{
            "isvEnclaveQuoteStatus": "GROUP_OUT_OF_DATE",
            "platformInfoBlob": "1502006504000100000f0f",
            "advisoryURL": "https://security-center.intel.com",
            "advisoryIDs": ["INTEL-SA-00161", "INTEL-SA-00233"]
        }"#;
        let verdict = QuoteVerdict::from_ias_report(body).unwrap();
        assert_eq!(verdict.status, QuoteStatus::GroupOutOfDate);
        assert!(!verdict.enclave_trusted);
        assert!(!verdict.pse_trusted);
        assert_eq!(verdict.advisories, vec!["INTEL-SA-00161", "INTEL-SA-00233"]);
        assert_eq!(verdict.platform_info_blob.unwrap().len(), 11);
    }

    #[test]
    fn test_ias_report_malformed() {
        assert!(matches!(
            QuoteVerdict::from_ias_report(b"not json"),
            Err(Error::Authority(_))
        ));
        let body = br#"{"isvEnclaveQuoteStatus": "OK", "platformInfoBlob": "zz"}"#;
        assert!(matches!(
            QuoteVerdict::from_ias_report(body),
            Err(Error::Authority(_))
        ));
    }
}
