//! Справочник участников: поиск и карточка с иждивенцами.

use async_trait::async_trait;
use thiserror::Error;

use crate::api_client::{ApiClient, ApiError};
use crate::models::{Member, MemberDetails, MemberId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("member {0} not found")]
    NotFound(MemberId),
    #[error("session expired")]
    Unauthorized,
    #[error("member directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<Member>, DirectoryError>;

    async fn get_by_id(&self, id: MemberId) -> Result<MemberDetails, DirectoryError>;
}

#[derive(Clone)]
pub struct RestMemberDirectory {
    api: ApiClient,
}

impl RestMemberDirectory {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn map_error(err: ApiError, id: Option<MemberId>) -> DirectoryError {
        match (err.status(), id) {
            (Some(401), _) => DirectoryError::Unauthorized,
            (Some(404), Some(id)) => DirectoryError::NotFound(id),
            _ => DirectoryError::Unavailable(err.to_string()),
        }
    }
}

#[async_trait]
impl MemberDirectory for RestMemberDirectory {
    async fn search(&self, term: &str) -> Result<Vec<Member>, DirectoryError> {
        self.api
            .get("members", &[("search", term.to_string())])
            .await
            .map_err(|e| Self::map_error(e, None))
    }

    async fn get_by_id(&self, id: MemberId) -> Result<MemberDetails, DirectoryError> {
        self.api
            .get(&format!("members/{}", id), &[])
            .await
            .map_err(|e| Self::map_error(e, Some(id)))
    }
}
