//! Database models for users and their change feed.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use log::warn;
use serde::Deserialize;

use userfeed_core::events::{DomainEvent, OperationType};
use userfeed_core::users::{User, UserUpdate};

/// Database model for users
#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserDB {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub nickname: String,
    pub hashed_password: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserDB {
    pub fn from_domain(user: User, hashed_password: String) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            country: user.country,
            nickname: user.nickname,
            hashed_password,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserDB> for User {
    fn from(db: UserDB) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email,
            country: db.country,
            nickname: db.nickname,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Attribute columns rewritten by an update. Identity, password and
/// creation time are never touched.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChangesetDB {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub nickname: String,
    pub updated_at: NaiveDateTime,
}

impl UserChangesetDB {
    pub fn new(update: UserUpdate, updated_at: NaiveDateTime) -> Self {
        Self {
            first_name: update.first_name,
            last_name: update.last_name,
            email: update.email,
            country: update.country,
            nickname: update.nickname,
            updated_at,
        }
    }
}

/// One row of the `user_changes` feed table.
#[derive(Queryable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::user_changes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserChangeDB {
    pub seq: i64,
    pub operation_type: String,
    pub document_key: String,
    pub full_document: Option<String>,
    pub full_document_before_change: Option<String>,
    pub recorded_at: NaiveDateTime,
}

impl UserChangeDB {
    /// Converts the feed record into a domain event.
    ///
    /// Images that fail to decode are logged and left empty; the event is
    /// still produced.
    pub fn to_domain_event(&self) -> DomainEvent {
        let after_change = decode_image(self.seq, "post-image", self.full_document.as_deref());
        let before_change = decode_image(
            self.seq,
            "pre-image",
            self.full_document_before_change.as_deref(),
        );
        DomainEvent::from_snapshots(
            before_change,
            after_change,
            OperationType::from_tag(&self.operation_type),
        )
    }
}

/// Shape of the JSON images written by the `users` triggers.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    country: String,
    #[serde(default)]
    nickname: String,
    #[serde(with = "sqlite_timestamp")]
    created_at: NaiveDateTime,
    #[serde(with = "sqlite_timestamp")]
    updated_at: NaiveDateTime,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        Self {
            id: doc.id,
            first_name: doc.first_name,
            last_name: doc.last_name,
            email: doc.email,
            country: doc.country,
            nickname: doc.nickname,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Decodes a JSON user image as stored in the change feed.
pub fn decode_user_document(raw: &str) -> serde_json::Result<User> {
    serde_json::from_str::<UserDocument>(raw).map(User::from)
}

fn decode_image(seq: i64, label: &str, raw: Option<&str>) -> Option<User> {
    let raw = raw?;
    match decode_user_document(raw) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("Failed to decode {} of user change {}: {}", label, seq, e);
            None
        }
    }
}

/// Timestamps as SQLite stores them (`2024-05-01 10:00:00.123`).
mod sqlite_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
