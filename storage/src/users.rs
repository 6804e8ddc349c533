use gutenshelf_common::{NewUser, Preferences, Role, User};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{is_unique_violation, Error, Result};
use crate::Storage;

/// How many times a read-modify-write on a user is retried when another writer
/// got there first.
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

const USER_COLUMNS: &str = "id, email, password_hash, display_name, role, preferences, reading_progress, genre_stats, version, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    display_name: Option<String>,
    role: String,
    preferences: String,
    reading_progress: String,
    genre_stats: String,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            role: row
                .role
                .parse()
                .map_err(|e| Error::Corrupt(format!("user {}: {e}", row.id)))?,
            preferences: serde_json::from_str(&row.preferences)?,
            reading_progress: serde_json::from_str(&row.reading_progress)?,
            genre_stats: serde_json::from_str(&row.genre_stats)?,
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Storage {
    /// `Conflict` if the email is already registered.
    pub async fn create_user(&self, new: &NewUser) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let empty_list = "[]";

        tracing::trace!("DB: creating user {}", id);
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, display_name, role, preferences, reading_progress, genre_stats, version, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"
        )
        .bind(&id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.display_name)
        .bind(Role::User.as_str())
        .bind(serde_json::to_string(&Preferences::default())?)
        .bind(empty_list)
        .bind(empty_list)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::Conflict(format!(
                    "Email {} is already registered",
                    new.email
                )))
            }
            Err(e) => return Err(e.into()),
        }

        self.get_user(&id)
            .await?
            .ok_or_else(|| Error::Corrupt(format!("user {id} vanished after insert")))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    /// False if no user has this email.
    pub async fn set_role(&self, email: &str, role: Role) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET role = ?, version = version + 1, updated_at = ? WHERE email = ?",
        )
        .bind(role.as_str())
        .bind(chrono::Utc::now().timestamp())
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Writes the mutable parts of `user`, including `updated_at`, if its stored
    /// version still equals `user.version`. Returns false when another write
    /// happened in between.
    pub async fn save_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET display_name = ?, role = ?, preferences = ?, reading_progress = ?, genre_stats = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ?"
        )
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(serde_json::to_string(&user.preferences)?)
        .bind(serde_json::to_string(&user.reading_progress)?)
        .bind(serde_json::to_string(&user.genre_stats)?)
        .bind(user.updated_at)
        .bind(&user.id)
        .bind(user.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Read-modify-write of one user, retried on concurrent modification.
    ///
    /// `apply` may run more than once and must derive everything it changes
    /// from the user it is handed. Returns `Ok(None)` if the user does not
    /// exist, and `Conflict` once [`MAX_UPDATE_ATTEMPTS`] are used up.
    pub async fn update_user<T, E, F>(
        &self,
        id: &str,
        mut apply: F,
    ) -> std::result::Result<Option<(User, T)>, E>
    where
        F: FnMut(&mut User) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Some(mut user) = self.get_user(id).await? else {
                return Ok(None);
            };
            let output = apply(&mut user)?;
            user.updated_at = chrono::Utc::now().timestamp();
            if self.save_user(&user).await? {
                user.version += 1;
                return Ok(Some((user, output)));
            }
            tracing::debug!("User {} changed concurrently (attempt {})", id, attempt);
        }
        Err(Error::Conflict(format!("User {id} is being modified concurrently, try again")).into())
    }
}
