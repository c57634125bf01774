// Sequencing, capacity, timeouts and collaborator failures of the session manager
mod common;

use std::{collections::HashSet, sync::Arc, time::Duration};

use tracing_test::traced_test;

use sgx_ra_server::{
    AttestationServer, Error, Request, Result, SessionManager, StaticAuthority, core::crypto::cipher,
};

use common::{Enclave, SECRET, SlowAuthority, UnreachableAuthority, server_config};

#[tokio::test]
async fn test_concurrent_sessions_get_distinct_ids() -> Result<()> {
    let manager = Arc::new(SessionManager::new(
        server_config(),
        Arc::new(StaticAuthority::trusting()),
    ));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.start_attestation(Request::default()).await
        }));
    }

    let mut ids = HashSet::new();
    let mut challenges = HashSet::new();
    for handle in handles {
        let challenge = handle.await.expect("task panicked")?;
        ids.insert(challenge.session_id);
        challenges.insert(challenge.challenge);
    }
    assert_eq!(ids.len(), 64);
    assert_eq!(challenges.len(), 64);
    assert_eq!(manager.len(), 64);
    Ok(())
}

#[tokio::test]
async fn test_unknown_session() {
    let config = server_config();
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));

    let err = manager.send_msg1(enclave.msg1(42)).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(42)));
}

#[tokio::test]
async fn test_msg3_for_unknown_session() -> Result<()> {
    let config = server_config();
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));

    // Well-formed message 3 from a finished handshake, replayed under another id
    let id = manager.start_attestation(Request::default()).await?.session_id;
    let keys = enclave.process_msg2(&manager.send_msg1(enclave.msg1(id)).await?);
    let mut msg3 = enclave.msg3(id, &keys);
    msg3.session_id = id.wrapping_add(1);

    let err = manager.send_msg3(msg3).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
    assert!(manager.contains(id));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_msg3_after_idle_timeout() -> Result<()> {
    let config = server_config().with_session_timeout(Some(Duration::from_secs(60)));
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));
    let id = manager.start_attestation(Request::default()).await?.session_id;
    let keys = enclave.process_msg2(&manager.send_msg1(enclave.msg1(id)).await?);

    tokio::time::advance(Duration::from_secs(61)).await;
    let err = manager.send_msg3(enclave.msg3(id, &keys)).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
    assert!(manager.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_out_of_order_messages() -> Result<()> {
    let config = server_config();
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));
    let challenge = manager.start_attestation(Request::default()).await?;
    let id = challenge.session_id;

    // Message 3 first, MAC'd with keys from another session: rejected,
    // session untouched
    let probe = Enclave::new(manager.config());
    let other = manager.start_attestation(Request::default()).await?;
    let keys = probe.process_msg2(&manager.send_msg1(probe.msg1(other.session_id)).await?);
    let err = manager.send_msg3(probe.msg3(id, &keys)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));

    // The session still accepts message 1, exactly once
    manager.send_msg1(enclave.msg1(id)).await?;
    let err = manager.send_msg1(enclave.msg1(id)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert!(manager.contains(id));
    Ok(())
}

#[tokio::test]
async fn test_racing_msg1_only_one_wins() -> Result<()> {
    let config = server_config();
    let enclave = Enclave::new(&config);
    let manager = Arc::new(SessionManager::new(config, Arc::new(StaticAuthority::trusting())));
    let id = manager.start_attestation(Request::default()).await?.session_id;

    let (a, b) = tokio::join!(
        manager.send_msg1(enclave.msg1(id)),
        manager.send_msg1(enclave.msg1(id)),
    );
    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_err() { a } else { b };
    assert!(matches!(loser, Err(Error::InvalidState { .. })));
    Ok(())
}

#[tokio::test]
async fn test_invalid_msg1_ends_session() -> Result<()> {
    let config = server_config();
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));
    let id = manager.start_attestation(Request::default()).await?.session_id;

    let mut msg1 = enclave.msg1(id);
    msg1.ga.y[0] ^= 1;
    let err = manager.send_msg1(msg1).await.unwrap_err();
    assert!(matches!(err, Error::KeyExchange(_)));

    let err = manager.send_msg1(enclave.msg1(id)).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_expires() -> Result<()> {
    let config = server_config().with_session_timeout(Some(Duration::from_secs(5 * 60)));
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));
    let id = manager.start_attestation(Request::default()).await?.session_id;

    tokio::time::advance(Duration::from_secs(4 * 60)).await;
    manager.send_msg1(enclave.msg1(id)).await?;

    // Activity resets the clock; now stay idle past the timeout
    tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
    let err = manager.send_msg1(enclave.msg1(id)).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
    assert!(manager.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reaper_purges_expired_sessions() -> Result<()> {
    let config = server_config().with_session_timeout(Some(Duration::from_secs(60)));
    let manager = Arc::new(SessionManager::new(config, Arc::new(StaticAuthority::trusting())));
    let reaper = manager.spawn_reaper(Duration::from_secs(10));

    manager.start_attestation(Request::default()).await?;
    manager.start_attestation(Request::default()).await?;
    assert_eq!(manager.len(), 2);

    tokio::time::sleep(Duration::from_secs(75)).await;
    assert!(manager.is_empty());

    reaper.abort();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_capacity_evicts_least_recently_active() -> Result<()> {
    let config = server_config().with_max_sessions(Some(2));
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));

    let first = manager.start_attestation(Request::default()).await?.session_id;
    tokio::time::advance(Duration::from_secs(1)).await;
    let second = manager.start_attestation(Request::default()).await?.session_id;
    tokio::time::advance(Duration::from_secs(1)).await;

    // Activity on the first session makes the second the eviction candidate
    manager.send_msg1(enclave.msg1(first)).await?;
    tokio::time::advance(Duration::from_secs(1)).await;
    let third = manager.start_attestation(Request::default()).await?.session_id;

    assert_eq!(manager.len(), 2);
    assert!(manager.contains(first));
    assert!(!manager.contains(second));
    assert!(manager.contains(third));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_authority_is_an_error() -> Result<()> {
    let config = server_config();
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(UnreachableAuthority));
    let id = manager.start_attestation(Request::default()).await?.session_id;

    let keys = enclave.process_msg2(&manager.send_msg1(enclave.msg1(id)).await?);
    let err = manager.send_msg3(enclave.msg3(id, &keys)).await.unwrap_err();
    assert!(matches!(err, Error::Authority(_)));
    assert!(err.is_collaborator_failure());

    // The failed session cannot be retried
    assert!(!manager.contains(id));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_authority_fails_revocation_fetch() -> Result<()> {
    let config = server_config().with_fetch_sig_rl(true);
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(UnreachableAuthority));
    let id = manager.start_attestation(Request::default()).await?.session_id;

    let err = manager.send_msg1(enclave.msg1(id)).await.unwrap_err();
    assert!(matches!(err, Error::Authority(_)));
    assert!(!manager.contains(id));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_authority_times_out() -> Result<()> {
    let config = server_config().with_authority_timeout(Duration::from_secs(2));
    let enclave = Enclave::new(&config);
    let authority = SlowAuthority {
        delay: Duration::from_secs(60),
    };
    let manager = SessionManager::new(config, Arc::new(authority));
    let id = manager.start_attestation(Request::default()).await?.session_id;

    let keys = enclave.process_msg2(&manager.send_msg1(enclave.msg1(id)).await?);
    let err = manager.send_msg3(enclave.msg3(id, &keys)).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(2000)));
    assert!(!manager.contains(id));
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_logs_never_contain_key_material() -> Result<()> {
    let config = server_config();
    let enclave = Enclave::new(&config);
    let manager = SessionManager::new(config, Arc::new(StaticAuthority::trusting()));
    let id = manager.start_attestation(Request::default()).await?.session_id;

    let keys = enclave.process_msg2(&manager.send_msg1(enclave.msg1(id)).await?);
    let msg4 = manager.send_msg3(enclave.msg3(id, &keys)).await?;
    let encrypted = msg4.encrypted_secret.as_ref().expect("secret released");
    assert_eq!(cipher::decrypt_secret(&keys.sk, encrypted)?, SECRET);

    assert!(logs_contain("created session"));
    assert!(logs_contain("session completed"));
    for key in [&keys.smk, &keys.sk, &keys.mk, &keys.vk] {
        assert!(!logs_contain(&hex::encode(key.as_bytes())));
        assert!(!logs_contain(&format!("{:?}", key.as_bytes())));
    }
    assert!(!logs_contain(&hex::encode(SECRET)));
    assert!(!logs_contain(std::str::from_utf8(SECRET).unwrap()));
    Ok(())
}
