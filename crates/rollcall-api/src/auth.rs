use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use rollcall_db::Database;
use rollcall_db::models::NewUser;
use rollcall_gateway::dispatcher::Dispatcher;
use rollcall_pass::QrRenderer;
use rollcall_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use rollcall_types::models::{AccountStatus, Role, User};

use crate::error::{ApiError, ApiJson};
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub dispatcher: Dispatcher,
    pub qr: QrRenderer,
    pub http: reqwest::Client,
}

const MAX_NAME_LEN: usize = 80;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);

    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::bad_request("name must be 1-80 characters"));
    }
    if !email.contains('@') || email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::bad_request("a valid email address is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }
    if req.role == Role::Admin {
        return Err(ApiError::bad_request("admin accounts cannot be self-registered"));
    }

    let role = req.role;
    let status = role.initial_status();
    let department = req
        .department
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let user_id = Uuid::new_v4();

    let created = with_db(&state, move |db| {
        if db.get_user_by_email(&email)?.is_some() {
            return Ok(None);
        }

        let password_hash = hash_password(&req.password)?;
        // A concurrent signup can claim the email while we hash
        let created = db.create_user(&NewUser {
            id: user_id,
            name: &name,
            email: &email,
            password_hash: &password_hash,
            role,
            status,
            department: department.as_deref(),
        })?;
        if !created {
            return Ok(None);
        }

        let row = db
            .get_user_by_id(user_id)?
            .ok_or_else(|| anyhow!("user {} vanished after insert", user_id))?;
        Ok(Some(row))
    })
    .await?;

    let user: User = created
        .ok_or_else(|| ApiError::conflict("email already registered"))?
        .into();

    let token = match user.status {
        AccountStatus::Approved => Some(create_token(&state, &user)?),
        _ => None,
    };

    info!("Registered {} {} ({})", user.role, user.email, user.status);
    Ok((StatusCode::CREATED, Json(RegisterResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    let found = with_db(&state, move |db| {
        let Some(row) = db.get_user_by_email(&email)? else {
            return Ok(None);
        };
        if !verify_password(&req.password, &row.password) {
            return Ok(None);
        }
        Ok(Some(row))
    })
    .await?;

    let user: User = found.ok_or(ApiError::InvalidCredentials)?.into();

    match user.status {
        AccountStatus::Approved => {}
        AccountStatus::Pending => {
            warn!("Login refused for pending account {}", user.email);
            return Err(ApiError::forbidden("account pending approval"));
        }
        AccountStatus::Rejected => {
            warn!("Login refused for rejected account {}", user.email);
            return Err(ApiError::forbidden("account rejected"));
        }
    }

    let token = create_token(&state, &user)?;
    Ok(Json(LoginResponse { user, token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let user = with_db(&state, move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user.into()))
}

/// Create the bootstrap admin unless an account with that email exists.
/// Returns whether an account was created.
pub fn ensure_admin(db: &Database, email: &str, password: &str, name: &str) -> anyhow::Result<bool> {
    let email = normalize_email(email);
    if let Some(existing) = db.get_user_by_email(&email)? {
        if existing.role != Role::Admin {
            warn!("Bootstrap admin email {} belongs to a {} account", email, existing.role);
        }
        return Ok(false);
    }

    let password_hash = hash_password(password)?;
    let created = db.create_user(&NewUser {
        id: Uuid::new_v4(),
        name,
        email: &email,
        password_hash: &password_hash,
        role: Role::Admin,
        status: AccountStatus::Approved,
        department: None,
    })?;
    if created {
        info!("Created bootstrap admin {}", email);
    }
    Ok(created)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Hash with Argon2id.
fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("password hashing failed: {}", e))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Unparseable password hash in database: {}", e);
            false
        }
    }
}

fn create_token(state: &AppStateInner, user: &User) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        role: user.role,
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_same_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "plaintext"));
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(ensure_admin(&db, " Dean@Uni.Example ", "hunter22", "Dean").unwrap());
        assert!(!ensure_admin(&db, "dean@uni.example", "hunter22", "Dean").unwrap());

        let admin = db.get_user_by_email("dean@uni.example").unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.status, AccountStatus::Approved);
    }
}
