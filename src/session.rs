use crate::errors::AppError;
use crate::workstation::Workstation;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A session's workstation. The mutex serializes operations within a session.
pub type SessionHandle = Arc<Mutex<Workstation>>;

/// In-memory registry of live sessions.
///
/// Sessions expire after `idle_ttl` without access, which is how an abandoned
/// browser tab releases its working set.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<Uuid, SessionHandle>,
    default_threshold: f64,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: u64, default_threshold: f64) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(idle_ttl)
            .max_capacity(max_sessions)
            .build();

        Self {
            sessions,
            default_threshold,
        }
    }

    /// Opens a session on the Home step with an empty working set.
    ///
    /// A full store may refuse the new entry, in which case no id is handed out.
    pub async fn create(&self) -> Result<(Uuid, SessionHandle), AppError> {
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(Workstation::new(self.default_threshold)));
        self.sessions.insert(id, handle.clone()).await;

        // Admission and eviction are applied by pending maintenance
        self.sessions.run_pending_tasks().await;
        if !self.sessions.contains_key(&id) {
            return Err(AppError::SessionLimit(
                "Too many open sessions, try again later".to_string(),
            ));
        }

        tracing::info!("Session {} opened", id);
        Ok((id, handle))
    }

    /// Looks up a live session.
    pub async fn get(&self, id: &Uuid) -> Result<SessionHandle, AppError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found or expired", id)))
    }

    /// Ends a session, dropping its working set. Returns false if it was unknown.
    pub async fn end(&self, id: &Uuid) -> bool {
        let removed = self.sessions.remove(id).await.is_some();
        if removed {
            tracing::info!("Session {} ended", id);
        }
        removed
    }

    /// Approximate number of live sessions.
    pub fn active_sessions(&self) -> u64 {
        self.sessions.entry_count()
    }
}
