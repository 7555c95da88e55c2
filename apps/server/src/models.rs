use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use userfeed_core::users as core_users;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
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

impl From<core_users::User> for User {
    fn from(u: core_users::User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            country: u.country,
            nickname: u.nickname,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Request body for creating a user. The password arrives in plain text and
/// is hashed before it reaches the service.
#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    #[serde(default)]
    pub nickname: String,
    pub password: String,
}

impl NewUser {
    pub fn into_core(self, hashed_password: String) -> core_users::NewUser {
        core_users::NewUser {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            country: self.country,
            nickname: self.nickname,
            hashed_password,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    #[serde(default)]
    pub nickname: String,
}

impl UserUpdate {
    pub fn into_core(self, id: String) -> core_users::UserUpdate {
        core_users::UserUpdate {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            country: self.country,
            nickname: self.nickname,
        }
    }
}

#[derive(Deserialize, IntoParams, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
#[into_params(parameter_in = Query)]
pub struct ListUsersParams {
    pub page: u32,
    pub page_size: u32,
    pub country: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
}

impl From<ListUsersParams> for core_users::ListUsersQuery {
    fn from(p: ListUsersParams) -> Self {
        Self {
            page: p.page,
            page_size: p.page_size,
            country: p.country,
            first_name: p.first_name,
            last_name: p.last_name,
            nickname: p.nickname,
            email: p.email,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub results: Vec<User>,
}

impl From<core_users::UserPage> for UserPage {
    fn from(p: core_users::UserPage) -> Self {
        Self {
            page: p.page,
            page_size: p.page_size,
            total_count: p.total_count,
            results: p.results.into_iter().map(User::from).collect(),
        }
    }
}
