use super::Backoffice;
use crate::auth::{hash_password, verify_password, Claims, TokenSubject};
use crate::catalog::is_known_permission;
use crate::error::{CoreError, Result};
use crate::storage::{PoolStore, User, UserFilter, UserStore};
use crate::types::{Page, PageRequest};
use crate::validation::Validator;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
    pub betting_pool_id: Option<i64>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub betting_pool_id: Option<i64>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    /// Required unless an administrator resets someone else's password.
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub search: Option<String>,
    pub betting_pool_id: Option<i64>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

fn validate_permissions(v: &mut Validator, codes: &[String]) {
    for (i, code) in codes.iter().enumerate() {
        v.check(
            is_known_permission(code),
            &format!("permissions[{}]", i),
            format!("unknown permission '{}'", code),
        );
    }
}

fn normalize_permissions(mut codes: Vec<String>) -> Vec<String> {
    codes.sort();
    codes.dedup();
    codes
}

fn require_user(conn: &Connection, id: i64) -> Result<User> {
    UserStore::new(conn)
        .get(id)?
        .ok_or_else(|| CoreError::not_found("User", id))
}

fn require_pool_exists(conn: &Connection, pool_id: Option<i64>) -> Result<()> {
    if let Some(pool_id) = pool_id {
        if PoolStore::new(conn).get(pool_id)?.is_none() {
            return Err(CoreError::not_found("Betting pool", pool_id));
        }
    }
    Ok(())
}

impl Backoffice {
    pub async fn create_user(&self, request: CreateUser) -> Result<User> {
        let username = request.username.trim().to_string();
        let mut v = Validator::new();
        v.required(&username, "username")
            .max_len(&username, "username", 50)
            .check(
                username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
                "username",
                "may only contain letters, digits, '_' and '.'",
            )
            .check(
                request.password.chars().count() >= MIN_PASSWORD_LEN,
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            )
            .required(&request.full_name, "fullName")
            .max_len(&request.full_name, "fullName", 100)
            .email(request.email.as_deref(), "email");
        validate_permissions(&mut v, &request.permissions);
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = UserStore::new(&conn);
        if store.get_by_username(&username)?.is_some() {
            return Err(CoreError::conflict(format!("Username '{}' is already taken", username)));
        }
        require_pool_exists(&conn, request.betting_pool_id)?;

        let now = Utc::now();
        let mut user = User {
            id: 0,
            username,
            full_name: request.full_name.trim().to_string(),
            email: request.email.filter(|e| !e.trim().is_empty()),
            password_hash: hash_password(&request.password),
            betting_pool_id: request.betting_pool_id,
            is_admin: request.is_admin,
            is_active: true,
            permissions: normalize_permissions(request.permissions),
            created_at: now,
            updated_at: now,
        };
        user.id = store.insert(&user)?;

        tracing::info!("Created user '{}' with ID: {}", user.username, user.id);
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<User> {
        let conn = self.storage.get_connection().await;
        require_user(&conn, id)
    }

    pub async fn list_users(&self, query: UserQuery) -> Result<Page<User>> {
        let paging = PageRequest::from_parts(query.page, query.page_size);
        paging.validate()?;

        let filter = UserFilter {
            search: query.search,
            betting_pool_id: query.betting_pool_id,
            is_active: query.is_active,
        };
        let conn = self.storage.get_connection().await;
        let (users, total) = UserStore::new(&conn).list(&filter, paging)?;
        Ok(Page::new(users, paging, total))
    }

    pub async fn update_user(&self, id: i64, request: UpdateUser) -> Result<User> {
        let mut v = Validator::new();
        if let Some(name) = &request.full_name {
            v.required(name, "fullName").max_len(name, "fullName", 100);
        }
        v.email(request.email.as_deref(), "email");
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let mut user = require_user(&conn, id)?;
        require_pool_exists(&conn, request.betting_pool_id)?;

        if let Some(name) = request.full_name {
            user.full_name = name.trim().to_string();
        }
        if let Some(email) = request.email {
            user.email = Some(email).filter(|e| !e.trim().is_empty());
        }
        if request.betting_pool_id.is_some() {
            user.betting_pool_id = request.betting_pool_id;
        }
        if let Some(admin) = request.is_admin {
            user.is_admin = admin;
        }
        if let Some(active) = request.is_active {
            user.is_active = active;
        }
        user.updated_at = Utc::now();
        UserStore::new(&conn).update(&user)?;

        Ok(user)
    }

    pub async fn set_user_permissions(&self, id: i64, codes: Vec<String>) -> Result<User> {
        let mut v = Validator::new();
        validate_permissions(&mut v, &codes);
        v.finish()?;

        let conn = self.storage.get_connection().await;
        require_user(&conn, id)?;
        UserStore::new(&conn).set_permissions(id, &normalize_permissions(codes))?;

        tracing::info!("Updated permissions of user {}", id);
        require_user(&conn, id)
    }

    /// Change a password. `actor` is the authenticated caller; administrators
    /// may reset other users' passwords without the current one.
    pub async fn change_password(&self, id: i64, request: ChangePassword, actor: &Claims) -> Result<()> {
        if actor.user_id() != id && !actor.admin {
            return Err(CoreError::forbidden("cannot change another user's password"));
        }

        let mut v = Validator::new();
        v.check(
            request.new_password.chars().count() >= MIN_PASSWORD_LEN,
            "newPassword",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        );
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let user = require_user(&conn, id)?;

        if actor.user_id() == id {
            let current = request.current_password.as_deref().unwrap_or_default();
            if !verify_password(current, &user.password_hash) {
                return Err(CoreError::invalid("currentPassword", "is incorrect"));
            }
        }

        UserStore::new(&conn).set_password(id, &hash_password(&request.new_password), Utc::now())?;
        tracing::info!("Password changed for user {}", user.username);
        Ok(())
    }

    pub async fn deactivate_user(&self, id: i64) -> Result<User> {
        self.update_user(
            id,
            UpdateUser {
                is_active: Some(false),
                ..UpdateUser::default()
            },
        )
        .await
    }

    pub async fn authenticate(&self, request: LoginRequest) -> Result<LoginResponse> {
        let user = {
            let conn = self.storage.get_connection().await;
            UserStore::new(&conn).get_by_username(request.username.trim())?
        };

        // Same message for unknown users and bad passwords
        let user = match user {
            Some(user) if verify_password(&request.password, &user.password_hash) => user,
            _ => {
                tracing::warn!("Failed login attempt for '{}'", request.username.trim());
                return Err(CoreError::unauthorized("invalid username or password"));
            }
        };
        if !user.is_active {
            return Err(CoreError::unauthorized("user is inactive"));
        }

        let (token, expires_at) = self.signer.issue(&TokenSubject {
            user_id: user.id,
            username: user.username.clone(),
            betting_pool_id: user.betting_pool_id,
            is_admin: user.is_admin,
            permissions: user.permissions.clone(),
        })?;

        tracing::info!("User '{}' logged in", user.username);
        Ok(LoginResponse {
            token,
            token_type: "Bearer",
            expires_at,
            user,
        })
    }

    /// Verify a bearer token and make sure its user is still active.
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let claims = self.signer.verify(token)?;
        let conn = self.storage.get_connection().await;
        match UserStore::new(&conn).get(claims.user_id())? {
            Some(user) if user.is_active => Ok(claims),
            _ => Err(CoreError::unauthorized("user is inactive or no longer exists")),
        }
    }

    /// Create the first administrator when the user table is empty.
    /// Returns `None` when users already exist.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<Option<User>> {
        {
            let conn = self.storage.get_connection().await;
            if UserStore::new(&conn).count()? > 0 {
                return Ok(None);
            }
        }

        let user = self
            .create_user(CreateUser {
                username: username.to_string(),
                password: password.to_string(),
                full_name: "Administrator".to_string(),
                email: None,
                betting_pool_id: None,
                is_admin: true,
                permissions: Vec::new(),
            })
            .await?;
        Ok(Some(user))
    }
}
