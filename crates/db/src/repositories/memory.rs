use std::collections::HashMap;

use tokio::sync::RwLock;

use intake_core::domain::session::{Session, SessionId};

use super::{RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.0.clone(), session);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&id.0).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError> {
        let sessions = self.sessions.read().await;
        let mut ids = sessions.keys().cloned().map(SessionId).collect::<Vec<_>>();
        ids.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use intake_core::domain::form::FormDelta;
    use intake_core::domain::schema::FieldKey;
    use intake_core::domain::session::{Session, SessionId};

    use crate::repositories::{InMemorySessionRepository, SessionRepository};

    #[tokio::test]
    async fn in_memory_session_repo_round_trip() {
        let repo = InMemorySessionRepository::default();
        let mut session = Session::new(SessionId("session_0000abcd".to_string()));
        session.form.apply(&FormDelta::new().with_field(FieldKey::Budget, "500k"));
        session.transcript.push_turn("budget is 500k", "How much space do you need?");

        repo.save(session.clone()).await.expect("save session");
        let found = repo.find_by_id(&session.id).await.expect("find session");

        assert_eq!(found, Some(session));
    }

    #[tokio::test]
    async fn delete_and_list_ids() {
        let repo = InMemorySessionRepository::default();
        repo.save(Session::new(SessionId("session_b".to_string()))).await.expect("save b");
        repo.save(Session::new(SessionId("session_a".to_string()))).await.expect("save a");

        let ids = repo.list_ids().await.expect("list");
        assert_eq!(ids, vec![SessionId("session_a".to_string()), SessionId("session_b".to_string())]);

        assert!(repo.delete(&SessionId("session_a".to_string())).await.expect("delete"));
        assert!(!repo.delete(&SessionId("session_a".to_string())).await.expect("second delete"));
        assert_eq!(repo.find_by_id(&SessionId("session_a".to_string())).await.expect("find"), None);
    }
}
