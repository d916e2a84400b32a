use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel identifier, assigned once by the registry and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Member identifier, unique within one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub nickname: String,
    /// Live session currently bound to this member, if any
    pub connection: Option<SessionId>,
}

impl Member {
    pub fn new(id: MemberId, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            connection: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.connection.is_some()
    }
}

/// Member as rendered to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserView {
    pub id: MemberId,
    pub nickname: String,
    pub online: bool,
}

impl From<&Member> for UserView {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            nickname: member.nickname.clone(),
            online: member.is_online(),
        }
    }
}

/// Channel as rendered to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelView {
    pub id: ChannelId,
    pub name: String,
    pub description: String,
    pub access_code: String,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
    /// Sorted by ascending member id
    pub users: Vec<UserView>,
}

/// Request to create a new channel
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Nickname of the creating member
    pub created_by: String,
}

impl CreateChannelRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.created_by.trim().is_empty() {
            return Err("created_by is required".to_string());
        }
        Ok(())
    }
}

/// Request to join a channel as a new member
#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberRequest {
    pub nickname: String,
}

impl AddMemberRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.nickname.trim().is_empty() {
            return Err("nickname is required".to_string());
        }
        Ok(())
    }
}
