#![cfg(not(tarpaulin_include))]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;

/// Access level of an admin-panel account.
///
/// Roles form a strict hierarchy: an account satisfies a requirement
/// whenever its own rank is at least the required one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    fn rank(&self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::Editor => 1,
            Role::Admin => 2,
        }
    }

    /// True when this role meets or exceeds `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

/// A registered admin-panel account.
///
/// Only the argon2 hash of the password is kept; the plaintext never
/// leaves the login handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Username (unique identifier for the account)
    pub username: String,

    /// Email address of the account holder
    pub email: String,

    /// Argon2 hash of the account password
    pub password_hash: String,

    /// Access level
    pub role: Role,
}

/// Account data safe to hand to clients: everything but the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Credential data received from the login form.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Payload for creating an account through the admin panel.
#[derive(Debug, Deserialize)]
pub struct NewUserRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Viewer
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated account
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

pub const SESSION_COOKIE: &str = "session";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// In-memory account directory.
///
/// A stand-in for database-backed user storage, like the rest of the
/// persistence layer. Passwords are verified against argon2 hashes.
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        UserDirectory {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Register an account. Fails when the username or email is taken or a
    /// required field is empty.
    pub fn add_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        role: Role,
    ) -> Result<PublicUser, String> {
        if username.is_empty() || password.is_empty() || email.is_empty() {
            return Err("使用者名稱、密碼與信箱皆為必填".to_string());
        }

        let mut users = self.users.write().unwrap();
        if users.contains_key(username) {
            return Err("使用者名稱已存在".to_string());
        }
        if users.values().any(|user| user.email == email) {
            return Err("此信箱已被註冊".to_string());
        }

        let password_hash = hash_password(password)?;
        let user = User {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role,
        };
        let public = PublicUser::from(&user);
        users.insert(username.to_string(), user);

        Ok(public)
    }

    /// Remove an account. Returns whether it existed.
    pub fn remove_user(&self, username: &str) -> bool {
        self.users.write().unwrap().remove(username).is_some()
    }

    /// Change an account's role.
    pub fn update_role(&self, username: &str, role: Role) -> Option<PublicUser> {
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(username)?;
        user.role = role;
        Some(PublicUser::from(&*user))
    }

    /// All accounts, hashes stripped.
    pub fn list(&self) -> Vec<PublicUser> {
        let mut accounts: Vec<PublicUser> = self
            .users
            .read()
            .unwrap()
            .values()
            .map(PublicUser::from)
            .collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        accounts
    }

    pub fn get(&self, username: &str) -> Option<PublicUser> {
        self.users
            .read()
            .unwrap()
            .get(username)
            .map(PublicUser::from)
    }

    pub fn role_of(&self, username: &str) -> Option<Role> {
        self.users.read().unwrap().get(username).map(|u| u.role)
    }

    /// Verify credentials.
    ///
    /// Distinguishes "no such account" from "wrong password" so the login
    /// handler can report them the way the admin panel expects.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool, String> {
        let users = self.users.read().unwrap();
        match users.get(username) {
            Some(user) => verify_password(password, &user.password_hash),
            None => Err("使用者不存在".to_string()),
        }
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Active session storage.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session for an authenticated account and return its id.
    /// Expired entries are pruned on the way.
    pub fn create_session(&self, username: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

        let mut sessions = self.sessions.write().unwrap();
        let now = SystemTime::now();
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            session_id.clone(),
            Session {
                user_id: username.to_string(),
                expires_at,
            },
        );

        session_id
    }

    /// Resolve a session id to its username, if valid and unexpired.
    pub fn validate_session(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().unwrap();
        if let Some(session) = sessions.get(session_id) {
            if session.expires_at > SystemTime::now() {
                return Some(session.user_id.clone());
            }
        }
        None
    }

    pub fn destroy_session(&self, session_id: &str) {
        self.sessions.write().unwrap().remove(session_id);
    }

    #[cfg(test)]
    fn insert_raw(&self, session_id: &str, session: Session) {
        self.sessions
            .write()
            .unwrap()
            .insert(session_id.to_string(), session);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a password using Argon2id with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Verify a password against a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

fn error_body(message: &str) -> Json<serde_json::Value> {
    Json(json!({ "error": message }))
}

fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(SESSION_DURATION as i64))
        .build()
}

// Web handler functions below

/// Handle admin-panel login requests.
///
/// Verifies the credentials and, on success, attaches a session cookie and
/// returns the account data.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Response {
    match state.users.verify(&credentials.username, &credentials.password) {
        Ok(true) => {
            let session_id = state.sessions.create_session(&credentials.username);
            log::info!("user {} logged in", credentials.username);
            let user = state.users.get(&credentials.username);
            (
                jar.add(session_cookie(session_id)),
                Json(json!({ "user": user })),
            )
                .into_response()
        }
        Ok(false) => {
            log::warn!("failed login attempt for {}", credentials.username);
            (StatusCode::UNAUTHORIZED, error_body("密碼錯誤")).into_response()
        }
        Err(message) => (StatusCode::UNAUTHORIZED, error_body(&message)).into_response(),
    }
}

/// Handle logout: drop the session and clear the cookie.
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy_session(cookie.value());
    }

    let mut removal = Cookie::from(SESSION_COOKIE);
    removal.set_path("/");
    (jar.remove(removal), Json(json!({ "ok": true }))).into_response()
}

/// Return the account behind the current session, or 401.
pub async fn handle_me(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match current_user(&state, &jar) {
        Some(user) => Json(json!({ "user": user })).into_response(),
        None => (StatusCode::UNAUTHORIZED, error_body("請先登入")).into_response(),
    }
}

/// Resolve the session cookie to an account, if any.
pub fn current_user(state: &AppState, jar: &CookieJar) -> Option<PublicUser> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let username = state.sessions.validate_session(cookie.value())?;
    state.users.get(&username)
}

/// Authentication middleware for the protected API surface.
///
/// Resolves the session cookie and stores the username as a request
/// extension; requests without a valid session get a 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Some(username) = state.sessions.validate_session(session_cookie.value()) {
            request.extensions_mut().insert(username);
            return next.run(request).await;
        }
    }

    (StatusCode::UNAUTHORIZED, error_body("請先登入")).into_response()
}

/// Role gate used inside protected handlers.
///
/// The hierarchy is viewer < editor < admin; a 403 comes back when the
/// account's rank is insufficient.
pub fn authorize(
    state: &AppState,
    username: &str,
    required: Role,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    match state.users.role_of(username) {
        Some(role) if role.satisfies(required) => Ok(()),
        Some(_) => Err((StatusCode::FORBIDDEN, error_body("權限不足"))),
        None => Err((StatusCode::UNAUTHORIZED, error_body("請先登入"))),
    }
}
