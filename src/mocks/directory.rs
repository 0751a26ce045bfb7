use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::directory::{DirectoryError, MemberDirectory};
use crate::models::{Member, MemberDetails, MemberId};

#[derive(Debug, Default)]
struct DirectoryState {
    members: Vec<MemberDetails>,
    delays: HashMap<String, Duration>,
    failure: Option<DirectoryError>,
    search_calls: Vec<String>,
    lookup_calls: Vec<MemberId>,
}

/// Справочник участников в памяти с управляемыми задержками по запросу.
#[derive(Debug, Clone, Default)]
pub struct MockMemberDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl MockMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_member(self, details: MemberDetails) -> Self {
        self.add_member(details);
        self
    }

    pub fn add_member(&self, details: MemberDetails) {
        self.state().members.push(details);
    }

    /// Ответ на `search(term)` придёт не раньше, чем через `delay`.
    pub fn set_delay(&self, term: &str, delay: Duration) {
        self.state().delays.insert(term.to_string(), delay);
    }

    /// `Some` - все следующие вызовы падают с этой ошибкой.
    pub fn fail_with(&self, failure: Option<DirectoryError>) {
        self.state().failure = failure;
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.state().search_calls.clone()
    }

    pub fn lookup_calls(&self) -> Vec<MemberId> {
        self.state().lookup_calls.clone()
    }
}

#[async_trait]
impl MemberDirectory for MockMemberDirectory {
    async fn search(&self, term: &str) -> Result<Vec<Member>, DirectoryError> {
        let delay = {
            let mut state = self.state();
            state.search_calls.push(term.to_string());
            state.delays.get(term).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        let needle = term.to_lowercase();
        Ok(state
            .members
            .iter()
            .map(|d| &d.member)
            .filter(|m| {
                m.full_name().to_lowercase().contains(&needle)
                    || m.code.as_deref().is_some_and(|c| c.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: MemberId) -> Result<MemberDetails, DirectoryError> {
        let mut state = self.state();
        state.lookup_calls.push(id);
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        state
            .members
            .iter()
            .find(|d| d.member.id == id)
            .cloned()
            .ok_or(DirectoryError::NotFound(id))
    }
}
