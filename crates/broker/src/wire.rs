//! JSON wire representation of user change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use userfeed_core::events::{DomainEvent, OperationType};
use userfeed_core::users::User;

/// Operation values as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireOperationType {
    #[serde(rename = "OPERATION_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "OPERATION_CREATE")]
    Create,
    #[serde(rename = "OPERATION_UPDATE")]
    Update,
    #[serde(rename = "OPERATION_DELETE")]
    Delete,
}

impl From<OperationType> for WireOperationType {
    fn from(op: OperationType) -> Self {
        match op {
            OperationType::Unspecified => WireOperationType::Unspecified,
            OperationType::Create => WireOperationType::Create,
            OperationType::Update => WireOperationType::Update,
            OperationType::Delete => WireOperationType::Delete,
        }
    }
}

/// User snapshot on the wire. Timestamps are RFC 3339 UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserMessage {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            country: user.country.clone(),
            nickname: user.nickname.clone(),
            created_at: user.created_at.and_utc(),
            updated_at: user.updated_at.and_utc(),
        }
    }
}

/// Message published for every user change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEventMessage {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_change: Option<UserMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_change: Option<UserMessage>,
    pub operation_type: WireOperationType,
}

impl From<&DomainEvent> for UserEventMessage {
    fn from(event: &DomainEvent) -> Self {
        Self {
            id: event.id.clone(),
            user_id: event.user_id.clone(),
            before_change: event.before_change.as_ref().map(UserMessage::from),
            after_change: event.after_change.as_ref().map(UserMessage::from),
            operation_type: event.operation_type.into(),
        }
    }
}
