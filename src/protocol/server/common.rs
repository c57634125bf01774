/*!
Byte-level entry points for transports that carry the raw SGX structures.
These parse the incoming message, dispatch it and encode the reply.
*/

use crate::core::{
    error::Result,
    message::{Msg1, Msg3, Msg4},
    session::SessionManager,
};

/// Handle a raw `sgx_ra_msg1_t` for `session_id` and return the raw
/// `sgx_ra_msg2_t` with its trailing revocation list.
pub async fn msg1_bytes(manager: &SessionManager, session_id: u64, msg1: &[u8]) -> Result<Vec<u8>> {
    let msg1 = Msg1::from_bytes(session_id, msg1)?;
    Ok(manager.msg1_to_msg2(&msg1).await?.to_bytes())
}

/// Handle a raw `sgx_ra_msg3_t` for `session_id`.
pub async fn msg3_bytes(manager: &SessionManager, session_id: u64, msg3: &[u8]) -> Result<Msg4> {
    let msg3 = Msg3::from_bytes(session_id, msg3)?;
    manager.msg3_to_msg4(&msg3).await
}
