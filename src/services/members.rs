//! Member management service

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::member::{CreateMember, Member, MemberQuery, UpdateMember},
    repository::Repository,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create a new member
    pub async fn create_member(&self, member: CreateMember) -> AppResult<Member> {
        self.repository.members.create(&member).await
    }

    /// Get a member by ID
    pub async fn get_member(&self, id: Uuid) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    /// List members with search and pagination
    pub async fn list_members(&self, query: &MemberQuery) -> AppResult<(Vec<Member>, i64)> {
        self.repository.members.list(query).await
    }

    /// Update a member
    pub async fn update_member(&self, id: Uuid, member: UpdateMember) -> AppResult<Member> {
        self.repository.members.update(id, &member).await
    }
}
