/*!
Quote verification.

The attestation authority decides whether a quote is genuine and reports the
platform's patch status. The local policy then decides whether the enclave
identity and advisories are acceptable to this service.
*/

pub mod authority;
pub mod policy;
pub mod quote;
mod stub;

pub use authority::{AttestationAuthority, QuoteStatus, QuoteVerdict};
pub use policy::{Denial, IdentityPolicy, Measurement, QuotePolicy};
pub use quote::{BINDING_SIZE, QuoteBody, build_unsigned_quote, key_exchange_binding};
pub use stub::StaticAuthority;
