//! Domain event types.

use serde::{Deserialize, Serialize};

use crate::users::User;

/// Operation tags emitted by the store's change feed.
pub mod operation_tags {
    pub const INSERT: &str = "insert";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}

/// Kind of mutation a [`DomainEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// The feed reported a tag this service does not know about
    #[default]
    Unspecified,
    Create,
    Update,
    Delete,
}

impl OperationType {
    /// Classifies a change feed operation tag.
    ///
    /// Unknown tags map to `Unspecified`; this never fails.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            operation_tags::INSERT => OperationType::Create,
            operation_tags::UPDATE => OperationType::Update,
            operation_tags::DELETE => OperationType::Delete,
            _ => OperationType::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Unspecified => "UNSPECIFIED",
            OperationType::Create => "CREATE",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        }
    }
}

/// One mutation of a user, normalized away from the store's native format.
///
/// Built once per change feed record and forwarded downstream unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Freshly generated per event, unrelated to any store identifier.
    pub id: String,
    /// Identity of the user the mutation applies to.
    pub user_id: String,
    pub before_change: Option<User>,
    pub after_change: Option<User>,
    pub operation_type: OperationType,
}

impl DomainEvent {
    /// Creates an event from the decoded snapshots of a mutation.
    ///
    /// The subject id is taken from `before`, then `after`, and is empty when
    /// neither snapshot is available.
    pub fn from_snapshots(
        before_change: Option<User>,
        after_change: Option<User>,
        operation_type: OperationType,
    ) -> Self {
        let user_id = subject_id(before_change.as_ref(), after_change.as_ref());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            before_change,
            after_change,
            operation_type,
        }
    }

    /// Returns true when the event carries no subject identity.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }
}

/// Picks the identity of the mutated user, preferring the pre-image.
pub fn subject_id(before_change: Option<&User>, after_change: Option<&User>) -> String {
    before_change
        .or(after_change)
        .map(|user| user.id.clone())
        .unwrap_or_default()
}
