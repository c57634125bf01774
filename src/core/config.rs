/*!
Server configuration.

[`Configuration`] mirrors the JSON file an operator writes. It is read once at
startup and turned into a [`SessionConfig`], the immutable snapshot shared by
every session. All errors here are fatal: the server must not start with a
partially valid configuration.
*/

use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use p256::{SecretKey, pkcs8::DecodePrivateKey};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::core::{
    attestation::{IdentityPolicy, Measurement, QuotePolicy},
    constants::{
        DEFAULT_AUTHORITY_TIMEOUT_SECS,
        sizes::{MEASUREMENT_SIZE, SPID_SIZE},
    },
    crypto::LongTermKey,
    error::{ConfigError, Result},
    message::QuoteType,
};

/// The configuration file as written by the operator.
///
/// `maxSessions` and `timeout` use `-1` for "unlimited" and "never".
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Talk to the production attestation service rather than the
    /// development one. Consumed by authority clients.
    #[serde(default)]
    pub release: bool,

    /// Subscription key for the attestation service API
    #[serde(default)]
    pub subscription: String,

    /// Directory of accepted MRENCLAVE files
    pub mrenclaves: PathBuf,

    /// Directory of accepted MRSIGNER files
    #[serde(default)]
    pub mrsigners: Option<PathBuf>,

    /// Hex-encoded service provider id
    pub spid: String,

    /// PEM file holding the long-term ECDSA P-256 key
    pub long_term_key: PathBuf,

    #[serde(default)]
    pub long_term_key_encrypted: bool,

    #[serde(default)]
    pub long_term_key_password: String,

    /// Advisory ids that may be ignored, keyed by quote status
    #[serde(default)]
    pub allowed_advisories: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub prod_id: i64,

    /// Minimum accepted ISV security version
    #[serde(default)]
    pub prod_svn: i64,

    #[serde(default = "unlimited")]
    pub max_sessions: i64,

    /// Idle timeout in minutes
    #[serde(default = "unlimited")]
    pub timeout: i64,

    #[serde(default)]
    pub identity_policy: IdentityPolicy,

    /// Hex-encoded secret released to trusted enclaves
    #[serde(default)]
    pub secret: String,

    #[serde(default)]
    pub quote_type: u16,

    #[serde(default)]
    pub fetch_sig_rl: bool,

    #[serde(default = "default_authority_timeout")]
    pub authority_timeout_secs: u64,

    #[serde(default)]
    pub allow_debug: bool,
}

fn unlimited() -> i64 {
    -1
}

fn default_authority_timeout() -> u64 {
    DEFAULT_AUTHORITY_TIMEOUT_SECS
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("release", &self.release)
            .field("mrenclaves", &self.mrenclaves)
            .field("mrsigners", &self.mrsigners)
            .field("long_term_key", &self.long_term_key)
            .field("prod_id", &self.prod_id)
            .field("prod_svn", &self.prod_svn)
            .field("max_sessions", &self.max_sessions)
            .field("timeout", &self.timeout)
            .field("identity_policy", &self.identity_policy)
            .finish_non_exhaustive()
    }
}

impl Configuration {
    /// Read and parse a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse a JSON configuration string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json).map_err(ConfigError::from)?)
    }

    /// Read every file the configuration points at and build the snapshot
    /// handed to the session manager.
    pub fn into_session_config(self) -> Result<SessionConfig> {
        if self.long_term_key_encrypted {
            return Err(ConfigError::Invalid {
                field: "longTermKeyEncrypted".into(),
                reason: "encrypted long-term keys are not supported".into(),
            }
            .into());
        }

        let spid = decode_fixed::<SPID_SIZE>("spid", self.spid.trim())?;
        let long_term_key = load_long_term_key(&self.long_term_key)?;
        let secret = Zeroizing::new(
            hex::decode(self.secret.trim()).map_err(|source| ConfigError::Hex {
                field: "secret".into(),
                source,
            })?,
        );

        let mr_enclaves = read_measurements(&self.mrenclaves)?;
        let mr_signers = match &self.mrsigners {
            Some(dir) => read_measurements(dir)?,
            None => HashSet::new(),
        };

        let allowed_advisories = self
            .allowed_advisories
            .into_iter()
            .map(|(status, ids)| (status, ids.into_iter().collect()))
            .collect();

        let quote_type = QuoteType::from_u16(self.quote_type).ok_or_else(|| ConfigError::Invalid {
            field: "quoteType".into(),
            reason: format!("{} is neither 0 nor 1", self.quote_type),
        })?;

        let policy = QuotePolicy {
            mr_enclaves,
            mr_signers,
            identity_policy: self.identity_policy,
            prod_id: to_u16("prodId", self.prod_id)?,
            min_isv_svn: to_u16("prodSvn", self.prod_svn)?,
            allowed_advisories,
            allow_debug: self.allow_debug,
        };

        Ok(SessionConfig {
            spid,
            long_term_key,
            quote_type,
            policy,
            secret,
            max_sessions: optional_limit("maxSessions", self.max_sessions)?
                .map(|n| n as usize),
            session_timeout: optional_limit("timeout", self.timeout)?
                .map(|minutes| {
                    minutes.checked_mul(60).map(Duration::from_secs).ok_or_else(|| {
                        ConfigError::Invalid {
                            field: "timeout".into(),
                            reason: format!("{} minutes is too large", minutes),
                        }
                    })
                })
                .transpose()?,
            authority_timeout: Duration::from_secs(self.authority_timeout_secs),
            fetch_sig_rl: self.fetch_sig_rl,
        })
    }
}

fn to_u16(field: &str, value: i64) -> Result<u16> {
    u16::try_from(value).map_err(|_| {
        ConfigError::Invalid {
            field: field.into(),
            reason: format!("{} does not fit in 16 bits", value),
        }
        .into()
    })
}

/// `-1` means no limit; anything else must be positive.
fn optional_limit(field: &str, value: i64) -> Result<Option<u64>> {
    match value {
        -1 => Ok(None),
        v if v > 0 => Ok(Some(v as u64)),
        v => Err(ConfigError::Invalid {
            field: field.into(),
            reason: format!("{} is neither -1 nor positive", v),
        }
        .into()),
    }
}

fn decode_fixed<const N: usize>(field: &str, text: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(text).map_err(|source| ConfigError::Hex {
        field: field.into(),
        source,
    })?;
    let actual = bytes.len();
    Ok(bytes.try_into().map_err(|_| ConfigError::Length {
        field: field.into(),
        expected: N,
        actual,
    })?)
}

/// Read a directory where every visible file holds one hex measurement
pub fn read_measurements(dir: &Path) -> Result<HashSet<Measurement>> {
    let read_err = |source| ConfigError::Read {
        path: dir.display().to_string(),
        source,
    };

    let mut measurements = HashSet::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || !entry.file_type().map_err(read_err)?.is_file() {
            continue;
        }

        let path = entry.path();
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        measurements.insert(decode_fixed::<MEASUREMENT_SIZE>(&name, text.trim())?);
    }
    Ok(measurements)
}

/// Load a PEM long-term key, PKCS#8 or SEC1
pub fn load_long_term_key(path: &Path) -> Result<LongTermKey> {
    let pem = Zeroizing::new(fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?);
    let secret = SecretKey::from_pkcs8_pem(&pem)
        .or_else(|_| SecretKey::from_sec1_pem(&pem))
        .map_err(|_| ConfigError::InvalidKey)?;
    Ok(LongTermKey::new(&secret))
}

/// Immutable settings shared by every session
#[derive(Clone)]
pub struct SessionConfig {
    pub spid: [u8; SPID_SIZE],
    pub long_term_key: LongTermKey,
    pub quote_type: QuoteType,
    pub policy: QuotePolicy,
    /// Released to the enclave, encrypted under SK, once it is trusted
    pub secret: Zeroizing<Vec<u8>>,
    /// `None` for no limit
    pub max_sessions: Option<usize>,
    /// Idle time after which a session is dropped, `None` for never
    pub session_timeout: Option<Duration>,
    /// Deadline for each call to the attestation authority
    pub authority_timeout: Duration,
    pub fetch_sig_rl: bool,
}

impl SessionConfig {
    /// Snapshot with an empty allow-list, no session limit and no timeout
    pub fn new(spid: [u8; SPID_SIZE], long_term_key: LongTermKey, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            spid,
            long_term_key,
            quote_type: QuoteType::default(),
            policy: QuotePolicy::default(),
            secret: Zeroizing::new(secret.into()),
            max_sessions: None,
            session_timeout: None,
            authority_timeout: Duration::from_secs(DEFAULT_AUTHORITY_TIMEOUT_SECS),
            fetch_sig_rl: false,
        }
    }

    pub fn with_mr_enclave(mut self, mr_enclave: Measurement) -> Self {
        self.policy.mr_enclaves.insert(mr_enclave);
        self
    }

    pub fn with_mr_signer(mut self, mr_signer: Measurement) -> Self {
        self.policy.mr_signers.insert(mr_signer);
        self
    }

    pub fn with_identity_policy(mut self, identity_policy: IdentityPolicy) -> Self {
        self.policy.identity_policy = identity_policy;
        self
    }

    pub fn with_prod_id(mut self, prod_id: u16) -> Self {
        self.policy.prod_id = prod_id;
        self
    }

    pub fn with_min_isv_svn(mut self, min_isv_svn: u16) -> Self {
        self.policy.min_isv_svn = min_isv_svn;
        self
    }

    /// Tolerate `advisory` when the quote status is `status`
    pub fn with_allowed_advisory(mut self, status: &str, advisory: &str) -> Self {
        self.policy
            .allowed_advisories
            .entry(status.to_string())
            .or_default()
            .insert(advisory.to_string());
        self
    }

    pub fn with_allow_debug(mut self, allow_debug: bool) -> Self {
        self.policy.allow_debug = allow_debug;
        self
    }

    pub fn with_quote_type(mut self, quote_type: QuoteType) -> Self {
        self.quote_type = quote_type;
        self
    }

    /// Cap the number of live sessions. A cap of zero is raised to one.
    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.max_sessions = max_sessions.map(|max| max.max(1));
        self
    }

    pub fn with_session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_authority_timeout(mut self, timeout: Duration) -> Self {
        self.authority_timeout = timeout;
        self
    }

    pub fn with_fetch_sig_rl(mut self, fetch_sig_rl: bool) -> Self {
        self.fetch_sig_rl = fetch_sig_rl;
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("quote_type", &self.quote_type)
            .field("policy", &self.policy)
            .field("max_sessions", &self.max_sessions)
            .field("session_timeout", &self.session_timeout)
            .field("authority_timeout", &self.authority_timeout)
            .field("fetch_sig_rl", &self.fetch_sig_rl)
            .finish_non_exhaustive()
    }
}
