use std::{sync::Arc, time::Duration};

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::{
    auth, db,
    error::AppError,
    handlers::AppJson,
    models::{
        normalize_email, present, ApiResponse, AuthData, LoginRequest, NewUser, RegisterRequest,
        UserView,
    },
    AppState,
};

/// Added to every failed login to blunt brute-force attempts.
const FAILED_LOGIN_DELAY: Duration = Duration::from_millis(500);

const BAD_CREDENTIALS: &str = "Invalid email or password";
const DUPLICATE_EMAIL: &str = "User with this email already exists";

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>), AppError> {
    let (Some(name), Some(email), Some(_)) = (
        present(&payload.name),
        present(&payload.email),
        present(&payload.password),
    ) else {
        return Err(AppError::Validation(
            "Please provide name, email and password".into(),
        ));
    };
    let password = payload.password.as_deref().unwrap_or_default();

    let new_user = NewUser::new(name, email, password);
    new_user.validate()?;

    if db::get_user_by_email(&state.db, &new_user.email)
        .await?
        .is_some()
    {
        return Err(AppError::Validation(DUPLICATE_EMAIL.into()));
    }

    let hash = auth::hash_password(&new_user.password)?;
    let user = match db::create_user(&state.db, &new_user.name, &new_user.email, &hash).await {
        Ok(user) => user,
        // Lost a race with a concurrent registration for the same email.
        Err(e) if db::is_unique_violation(&e) => {
            return Err(AppError::Validation(DUPLICATE_EMAIL.into()))
        }
        Err(e) => return Err(e.into()),
    };

    let token = state.keys.issue(&user.id)?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            AuthData {
                user: UserView::from(&user),
                token,
            },
        )),
    ))
}

/// POST /api/auth/login
///
/// Unknown email and wrong password produce the same response.
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthData>>, AppError> {
    let (Some(email), Some(_)) = (present(&payload.email), present(&payload.password)) else {
        return Err(AppError::Validation(
            "Please provide email and password".into(),
        ));
    };
    let password = payload.password.as_deref().unwrap_or_default();

    let user = match db::get_user_by_email(&state.db, &normalize_email(email)).await? {
        Some(user) if auth::verify_password(password, &user.password_hash)? => user,
        Some(user) => {
            tracing::warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(reject_login().await);
        }
        None => {
            tracing::warn!("Login failed: unknown email");
            return Err(reject_login().await);
        }
    };

    let token = state.keys.issue(&user.id)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        AuthData {
            user: UserView::from(&user),
            token,
        },
    )))
}

async fn reject_login() -> AppError {
    tokio::time::sleep(FAILED_LOGIN_DELAY).await;
    AppError::Unauthorized(BAD_CREDENTIALS.into())
}
