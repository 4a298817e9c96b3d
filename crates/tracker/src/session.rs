//! Tab-scoped session identity.

use footprint_core::{Session, SessionId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::platform::{Clock, PlatformStorage};

/// Storage key holding the session id.
pub const SESSION_STORAGE_KEY: &str = "footprint.session_id";

/// Storage key holding the serialized session record.
pub const SESSION_RECORD_KEY: &str = "footprint.session";

/// Result of resolving the session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Generated by this call rather than read back.
    pub is_new: bool,
    /// Stored in tab storage; `false` means each reload starts over.
    pub persisted: bool,
}

/// Owns the browsing-session identifier for one tab.
pub struct SessionIdentity {
    storage: Arc<dyn PlatformStorage>,
    clock: Arc<dyn Clock>,
    /// In-memory id used once storage has failed.
    fallback: Mutex<Option<SessionId>>,
}

impl SessionIdentity {
    pub fn new(storage: Arc<dyn PlatformStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            fallback: Mutex::new(None),
        }
    }

    /// Returns the tab's session id, creating and persisting it on first use.
    pub fn get_or_create_session_id(&self) -> SessionId {
        self.get_or_create().id
    }

    /// Like [`get_or_create_session_id`](Self::get_or_create_session_id),
    /// also reporting whether the id was just created.
    pub fn get_or_create(&self) -> SessionHandle {
        let mut fallback = self.fallback.lock();
        if let Some(id) = fallback.as_ref() {
            return SessionHandle {
                id: id.clone(),
                is_new: false,
                persisted: false,
            };
        }

        match self.storage.get(SESSION_STORAGE_KEY) {
            Ok(Some(stored)) if !stored.is_empty() => {
                return SessionHandle {
                    id: SessionId::from(stored),
                    is_new: false,
                    persisted: true,
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Session storage unreadable, using in-memory session id");
                let id = SessionId::generate(self.clock.now());
                *fallback = Some(id.clone());
                return SessionHandle {
                    id,
                    is_new: true,
                    persisted: false,
                };
            }
        }

        let id = SessionId::generate(self.clock.now());
        match self.storage.set(SESSION_STORAGE_KEY, id.as_str()) {
            Ok(()) => {
                debug!(session_id = %id, "Created session");
                SessionHandle {
                    id,
                    is_new: true,
                    persisted: true,
                }
            }
            Err(e) => {
                warn!(error = %e, "Session storage unwritable, using in-memory session id");
                *fallback = Some(id.clone());
                SessionHandle {
                    id,
                    is_new: true,
                    persisted: false,
                }
            }
        }
    }

    /// Reads back the session record written by an earlier page in this
    /// tab. Records for a different id are ignored.
    pub fn load_session(&self, id: &SessionId) -> Option<Session> {
        let stored = match self.storage.get(SESSION_RECORD_KEY) {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "Session record unreadable");
                return None;
            }
        };
        match serde_json::from_str::<Session>(&stored) {
            Ok(session) if &session.session_id == id => Some(session),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Discarding malformed session record");
                None
            }
        }
    }

    /// Persists the session record next to the id. Failures are logged;
    /// the record then lives only as long as the page.
    pub fn save_session(&self, session: &Session) {
        let result = serde_json::to_string(session)
            .map_err(|e| footprint_core::Error::storage(e.to_string()))
            .and_then(|json| self.storage.set(SESSION_RECORD_KEY, &json));
        if let Err(e) = result {
            debug!(error = %e, session_id = %session.session_id, "Session record not persisted");
        }
    }
}
