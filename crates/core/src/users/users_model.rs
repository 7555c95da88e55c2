//! User domain models.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::users_constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::{errors::ValidationError, Result};

/// Domain model representing a user in the system.
///
/// This is also the snapshot type carried by change events, so it never
/// holds credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub nickname: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input model for creating a new user.
///
/// The password must already be hashed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
}

impl NewUser {
    /// Validates the new user data.
    pub fn validate(&self) -> Result<()> {
        validate_attributes(
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.country,
        )?;
        if self.hashed_password.trim().is_empty() {
            return Err(ValidationError::MissingField("password".to_string()).into());
        }
        Ok(())
    }

    /// Builds the user record that will be stored, with a fresh id and
    /// creation/update timestamps set to `now`.
    pub fn into_user(self, now: NaiveDateTime) -> (User, String) {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            country: self.country,
            nickname: self.nickname,
            created_at: now,
            updated_at: now,
        };
        (user, self.hashed_password)
    }
}

/// Input model for updating an existing user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub nickname: String,
}

impl UserUpdate {
    /// Validates the user update data.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()).into());
        }
        validate_attributes(
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.country,
        )
    }
}

/// Paginated listing request with optional equality filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListUsersQuery {
    pub page: u32,
    pub page_size: u32,
    pub country: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
}

impl ListUsersQuery {
    /// Validates paging bounds.
    pub fn validate(&self) -> Result<()> {
        if self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::InvalidInput(format!(
                "pageSize must be at most {}",
                MAX_PAGE_SIZE
            ))
            .into());
        }
        Ok(())
    }

    /// Returns the page size, substituting the default for zero.
    pub fn effective_page_size(&self) -> u32 {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Number of rows to skip for the requested page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.effective_page_size())
    }
}

/// One page of users plus the total number of matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub results: Vec<User>,
}

/// Current UTC time truncated to millisecond precision.
pub fn now_millis() -> NaiveDateTime {
    Utc::now().naive_utc().round_subsecs(3)
}

fn validate_attributes(first_name: &str, last_name: &str, email: &str, country: &str) -> Result<()> {
    if first_name.trim().is_empty() {
        return Err(ValidationError::MissingField("firstName".to_string()).into());
    }
    if last_name.trim().is_empty() {
        return Err(ValidationError::MissingField("lastName".to_string()).into());
    }
    if country.trim().is_empty() {
        return Err(ValidationError::MissingField("country".to_string()).into());
    }
    if !is_valid_email(email) {
        return Err(
            ValidationError::InvalidInput(format!("'{}' is not a valid email", email)).into(),
        );
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        _ => false,
    }
}
