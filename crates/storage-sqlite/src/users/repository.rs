use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use std::sync::Arc;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::users;
use userfeed_core::errors::{DatabaseError, Result};
use userfeed_core::users::{ListUsersQuery, User, UserPage, UserRepositoryTrait, UserUpdate};

use super::model::{UserChangesetDB, UserDB};

/// Repository for managing user data in the database
pub struct UserRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl UserRepository {
    /// Creates a new UserRepository instance
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Applies the equality filters of `query` to a fresh `users` select.
fn filtered_users(query: &ListUsersQuery) -> users::BoxedQuery<'_, Sqlite> {
    let mut select = users::table.into_boxed();

    if let Some(country) = &query.country {
        select = select.filter(users::country.eq(country));
    }
    if let Some(first_name) = &query.first_name {
        select = select.filter(users::first_name.eq(first_name));
    }
    if let Some(last_name) = &query.last_name {
        select = select.filter(users::last_name.eq(last_name));
    }
    if let Some(nickname) = &query.nickname {
        select = select.filter(users::nickname.eq(nickname));
    }
    if let Some(email) = &query.email {
        select = select.filter(users::email.eq(email));
    }

    select
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn create(&self, user: User, hashed_password: String) -> Result<User> {
        let user_db = UserDB::from_domain(user, hashed_password);

        self.writer
            .exec(move |conn| {
                diesel::insert_into(users::table)
                    .values(&user_db)
                    .execute(conn)
                    .into_core()?;
                Ok(User::from(user_db))
            })
            .await
    }

    async fn update(&self, update: UserUpdate, updated_at: NaiveDateTime) -> Result<User> {
        self.writer
            .exec(move |conn| {
                let user_id = update.id.clone();
                let changeset = UserChangesetDB::new(update, updated_at);

                let affected = diesel::update(users::table.find(&user_id))
                    .set(&changeset)
                    .execute(conn)
                    .into_core()?;
                if affected == 0 {
                    return Err(DatabaseError::NotFound(format!("User '{}'", user_id)).into());
                }

                let stored = users::table
                    .find(&user_id)
                    .select(UserDB::as_select())
                    .first::<UserDB>(conn)
                    .into_core()?;
                Ok(User::from(stored))
            })
            .await
    }

    /// Deletes a user by its ID and returns the number of deleted records
    async fn delete(&self, user_id: &str) -> Result<usize> {
        let user_id = user_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(users::table.find(user_id))
                    .execute(conn)
                    .into_core()
            })
            .await
    }

    fn get_by_id(&self, user_id: &str) -> Result<User> {
        let mut conn = get_connection(&self.pool)?;

        let user = users::table
            .find(user_id)
            .select(UserDB::as_select())
            .first::<UserDB>(&mut conn)
            .optional()
            .into_core()?
            .ok_or_else(|| DatabaseError::NotFound(format!("User '{}'", user_id)))?;

        Ok(user.into())
    }

    fn list(&self, query: &ListUsersQuery) -> Result<UserPage> {
        let mut conn = get_connection(&self.pool)?;
        let page_size = query.effective_page_size();

        let total_count = filtered_users(query)
            .count()
            .get_result::<i64>(&mut conn)
            .into_core()?;

        let results = filtered_users(query)
            .select(UserDB::as_select())
            .order((users::created_at.asc(), users::id.asc()))
            .limit(i64::from(page_size))
            .offset(query.offset())
            .load::<UserDB>(&mut conn)
            .into_core()?;

        Ok(UserPage {
            page: query.page,
            page_size,
            total_count: u64::try_from(total_count).unwrap_or_default(),
            results: results.into_iter().map(User::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use chrono::Duration;
    use tempfile::tempdir;
    use userfeed_core::users::now_millis;

    fn create_test_repository() -> (UserRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        (UserRepository::new(pool, writer), temp_dir)
    }

    fn user(first_name: &str, country: &str, created_at: NaiveDateTime) -> User {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: first_name.to_string(),
            last_name: "Lee".to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            country: country.to_string(),
            nickname: String::new(),
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, _dir) = create_test_repository();
        let created = repo
            .create(user("Ann", "IT", now_millis()), "hash".to_string())
            .await
            .unwrap();

        let fetched = repo.get_by_id(&created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_not_found() {
        let (repo, _dir) = create_test_repository();
        assert!(repo.get_by_id("missing").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let (repo, _dir) = create_test_repository();
        let ann = user("Ann", "IT", now_millis());
        repo.create(ann.clone(), "hash".to_string()).await.unwrap();

        let err = repo.create(ann, "hash".to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            userfeed_core::Error::Database(DatabaseError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let (repo, _dir) = create_test_repository();
        let created = repo
            .create(user("Ann", "IT", now_millis()), "hash".to_string())
            .await
            .unwrap();

        let later = created.updated_at + Duration::seconds(5);
        let updated = repo
            .update(
                UserUpdate {
                    id: created.id.clone(),
                    first_name: "Anna".to_string(),
                    last_name: created.last_name.clone(),
                    email: created.email.clone(),
                    country: "FR".to_string(),
                    nickname: "nan".to_string(),
                },
                later,
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Anna");
        assert_eq!(updated.country, "FR");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[tokio::test]
    async fn test_update_unknown_user_is_not_found() {
        let (repo, _dir) = create_test_repository();
        let err = repo
            .update(
                UserUpdate {
                    id: "missing".to_string(),
                    first_name: "Ann".to_string(),
                    last_name: "Lee".to_string(),
                    email: "ann@example.com".to_string(),
                    country: "IT".to_string(),
                    nickname: String::new(),
                },
                now_millis(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_returns_affected_rows() {
        let (repo, _dir) = create_test_repository();
        let created = repo
            .create(user("Ann", "IT", now_millis()), "hash".to_string())
            .await
            .unwrap();

        assert_eq!(repo.delete(&created.id).await.unwrap(), 1);
        assert_eq!(repo.delete(&created.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages_in_creation_order() {
        let (repo, _dir) = create_test_repository();
        let start = now_millis();
        for (i, (name, country)) in [("Ann", "IT"), ("Bob", "FR"), ("Cid", "IT"), ("Dee", "IT")]
            .iter()
            .enumerate()
        {
            repo.create(
                user(name, country, start + Duration::seconds(i as i64)),
                "hash".to_string(),
            )
            .await
            .unwrap();
        }

        let page = repo
            .list(&ListUsersQuery {
                page: 0,
                page_size: 2,
                country: Some("IT".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total_count, 3);
        let names: Vec<_> = page.results.iter().map(|u| u.first_name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Cid"]);

        let page = repo
            .list(&ListUsersQuery {
                page: 1,
                page_size: 2,
                country: Some("IT".to_string()),
                ..Default::default()
            })
            .unwrap();
        let names: Vec<_> = page.results.iter().map(|u| u.first_name.as_str()).collect();
        assert_eq!(names, vec!["Dee"]);

        let page = repo.list(&ListUsersQuery::default()).unwrap();
        assert_eq!(page.page_size, 10);
        assert_eq!(page.results.len(), 4);
    }
}
