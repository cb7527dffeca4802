use super::UserSession;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage for user sessions.
///
/// Endpoints only see this trait, so a bounded or persistent store can
/// replace the in-memory one without touching them.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up an existing session
    async fn get(&self, user_id: &str) -> Option<Arc<UserSession>>;

    /// Look up a session, inserting an idle one if absent
    async fn get_or_create(&self, user_id: &str) -> Arc<UserSession>;

    async fn remove(&self, user_id: &str) -> Option<Arc<UserSession>>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove and return sessions not looked up for longer than `max_idle`
    async fn evict_idle(&self, max_idle: Duration) -> Vec<Arc<UserSession>>;

    /// Remove and return every session
    async fn drain(&self) -> Vec<Arc<UserSession>>;
}

/// Process-local session map (user_id → session)
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<UserSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> Option<Arc<UserSession>> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(user_id).cloned();

        if let Some(session) = &session {
            session.touch();
        }
        session
    }

    async fn get_or_create(&self, user_id: &str) -> Arc<UserSession> {
        if let Some(session) = self.get(user_id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!("Creating session for user {}", user_id);
                Arc::new(UserSession::new(user_id))
            })
            .clone();

        session.touch();
        session
    }

    async fn remove(&self, user_id: &str) -> Option<Arc<UserSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(user_id)
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn evict_idle(&self, max_idle: Duration) -> Vec<Arc<UserSession>> {
        let mut sessions = self.sessions.write().await;

        let idle: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.idle_for() > max_idle)
            .map(|(user_id, _)| user_id.clone())
            .collect();

        idle.iter()
            .filter_map(|user_id| sessions.remove(user_id))
            .collect()
    }

    async fn drain(&self) -> Vec<Arc<UserSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.drain().map(|(_, session)| session).collect()
    }
}
