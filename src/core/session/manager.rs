/*!
Registry of live attestation sessions.

The manager allocates session ids and challenges, enforces the session limit
and idle timeout, and routes each message to its session. The table lock is
only held for map operations; all cryptographic and authority work happens
under the session's own async mutex.
*/

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::{Mutex, RwLock};
use rand::{RngCore, rngs::OsRng};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::core::{
    attestation::AttestationAuthority,
    config::SessionConfig,
    constants::sizes::CHALLENGE_SIZE,
    error::{Error, Result},
    message::{Challenge, Msg1, Msg2, Msg3, Msg4, Request},
    session::session::Session,
};

/// A session and the time it last saw a message
struct SessionEntry {
    session: tokio::sync::Mutex<Session>,
    last_active: Mutex<Instant>,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session: tokio::sync::Mutex::new(session),
            last_active: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    fn last_active(&self) -> Instant {
        *self.last_active.lock()
    }
}

/// Owns every live session
pub struct SessionManager {
    sessions: RwLock<HashMap<u64, Arc<SessionEntry>>>,
    config: Arc<SessionConfig>,
    authority: Arc<dyn AttestationAuthority>,
}

impl SessionManager {
    /// Create an empty manager
    pub fn new(config: SessionConfig, authority: Arc<dyn AttestationAuthority>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config: Arc::new(config),
            authority,
        }
    }

    /// The configuration shared by all sessions
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of sessions in the table, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Whether `id` names a live, unexpired session
    pub fn contains(&self, id: u64) -> bool {
        let now = Instant::now();
        self.sessions
            .read()
            .get(&id)
            .is_some_and(|entry| !self.is_expired(entry, now))
    }

    /// Start a new session and return its id with a fresh challenge
    pub fn new_session(&self, _request: &Request) -> Result<Challenge> {
        let mut challenge = [0u8; CHALLENGE_SIZE];
        OsRng
            .try_fill_bytes(&mut challenge)
            .map_err(|_| Error::Randomness)?;

        let id = loop {
            let id = random_id()?;
            // Zero is reserved so an unset id never matches a session
            if id == 0 || self.sessions.read().contains_key(&id) {
                continue;
            }

            let mut sessions = self.sessions.write();
            if sessions.contains_key(&id) {
                continue;
            }
            self.make_room(&mut sessions);
            let session = Session::new(id, Arc::clone(&self.config), Arc::clone(&self.authority));
            sessions.insert(id, Arc::new(SessionEntry::new(session)));
            break id;
        };

        info!(session_id = id, "created session");
        Ok(Challenge {
            session_id: id,
            challenge,
        })
    }

    /// Route message 1 to its session
    pub async fn msg1_to_msg2(&self, msg1: &Msg1) -> Result<Msg2> {
        let entry = self.lookup(msg1.session_id)?;
        entry.touch();

        let mut session = entry.session.lock().await;
        let result = session.process_msg1(msg1).await;
        entry.touch();

        if session.state().is_terminal() {
            drop(session);
            self.remove(msg1.session_id, &entry);
        }
        result
    }

    /// Route message 3 to its session
    pub async fn msg3_to_msg4(&self, msg3: &Msg3) -> Result<Msg4> {
        let entry = self.lookup(msg3.session_id)?;
        entry.touch();

        let mut session = entry.session.lock().await;
        let result = session.process_msg3(msg3).await;
        entry.touch();

        if session.state().is_terminal() {
            drop(session);
            self.remove(msg3.session_id, &entry);
            info!(
                session_id = msg3.session_id,
                trusted = result.as_ref().is_ok_and(|msg4| msg4.result.enclave_trusted),
                "session completed"
            );
        }
        result
    }

    /// Drop every session idle for longer than the timeout. Returns how many
    /// were removed.
    pub fn purge_expired(&self) -> usize {
        if self.config.session_timeout.is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }
        purged
    }

    /// Run [`purge_expired`](Self::purge_expired) every `period` until the
    /// manager is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.purge_expired();
            }
        })
    }

    fn lookup(&self, id: u64) -> Result<Arc<SessionEntry>> {
        let entry = self.sessions.read().get(&id).cloned();
        match entry {
            Some(entry) if self.is_expired(&entry, Instant::now()) => {
                self.remove(id, &entry);
                debug!(session_id = id, "session expired");
                Err(Error::SessionNotFound(id))
            }
            Some(entry) => Ok(entry),
            None => Err(Error::SessionNotFound(id)),
        }
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        self.config
            .session_timeout
            .is_some_and(|timeout| now.saturating_duration_since(entry.last_active()) > timeout)
    }

    /// Remove `id` only if it still maps to `entry`
    fn remove(&self, id: u64, entry: &Arc<SessionEntry>) {
        let mut sessions = self.sessions.write();
        if sessions.get(&id).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            sessions.remove(&id);
        }
    }

    /// Free a slot for one more session: expired sessions go first, then the
    /// least recently active ones.
    fn make_room(&self, sessions: &mut HashMap<u64, Arc<SessionEntry>>) {
        let Some(max) = self.config.max_sessions else {
            return;
        };
        if sessions.len() < max {
            return;
        }

        let now = Instant::now();
        sessions.retain(|_, entry| !self.is_expired(entry, now));

        while sessions.len() >= max {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_active())
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            info!(session_id = oldest, "evicted least recently active session");
        }
    }
}

fn random_id() -> Result<u64> {
    let mut bytes = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::Randomness)?;
    Ok(u64::from_le_bytes(bytes))
}
