/// Authentication Routes
///
/// HTTP surface of the session manager. Request fields are optional at the
/// serde level so that missing fields produce the session manager's own
/// validation messages instead of a generic JSON rejection.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticatedPrincipal, AuthenticatedSession, SessionManager};
use crate::error::{AppError, ErrorContext};
use crate::store::PublicPrincipal;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of both refresh and logout
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub user_id: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub session: AuthenticatedSession,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub message: &'static str,
    pub user: PublicPrincipal,
}

/// POST /auth/signup
///
/// # Errors
/// - 400: missing fields, password mismatch or policy, bad email, email taken
/// - 500: credential store failure
pub async fn signup(
    form: web::Json<SignupRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("signup");

    let session = sessions
        .signup(
            form.name.as_deref(),
            form.email.as_deref(),
            form.password.as_deref(),
            form.confirm_password.as_deref(),
        )
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %session.user.id,
        "User created"
    );

    Ok(HttpResponse::Created().json(SessionResponse {
        message: "User created successfully",
        session,
    }))
}

/// POST /auth/login
///
/// Unknown email and wrong password both answer 401 with the same body.
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let session = sessions
        .login(form.email.as_deref(), form.password.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        message: "Login successful",
        session,
    }))
}

/// POST /auth/refresh
///
/// Rotates the refresh token: the presented token is dead once this returns.
///
/// # Errors
/// - 400: no refresh token in the body
/// - 401: invalid, expired or superseded refresh token
pub async fn refresh(
    form: web::Json<RefreshTokenRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let tokens = sessions.refresh(form.refresh_token.as_deref()).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /auth/logout
///
/// Always 200, whether or not the token belonged to a live session.
pub async fn logout(
    form: Option<web::Json<RefreshTokenRequest>>,
    sessions: web::Data<SessionManager>,
) -> HttpResponse {
    let token = form.as_ref().and_then(|f| f.refresh_token.as_deref());
    sessions.logout(token).await;

    HttpResponse::Ok().json(MessageResponse {
        message: "Logout successful",
    })
}

/// POST /auth/change-password
pub async fn change_password(
    form: web::Json<ChangePasswordRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let mut context = ErrorContext::new("change_password");
    if let Some(user_id) = &form.user_id {
        context = context.with_user_id(user_id.clone());
    }

    sessions
        .change_password(
            form.user_id.as_deref(),
            form.current_password.as_deref(),
            form.new_password.as_deref(),
            form.confirm_password.as_deref(),
        )
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Password changed successfully",
    }))
}

/// PUT /auth/user/{user_id}
pub async fn update_profile(
    path: web::Path<String>,
    form: web::Json<UpdateProfileRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user = sessions
        .update_profile(&path, form.name.as_deref(), form.email.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ProfileResponse {
        message: "User updated successfully",
        user,
    }))
}

/// GET /api/me
///
/// **Requires a valid access token**; the principal is injected by
/// `JwtMiddleware`.
pub async fn current_user(principal: web::ReqData<AuthenticatedPrincipal>) -> HttpResponse {
    HttpResponse::Ok().json(&principal.0)
}

/// GET /api/auth-users
pub async fn all_users(
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(sessions.list_principals(false).await?))
}

/// GET /api/auth-users/logged-in
pub async fn logged_in_users(
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(sessions.list_principals(true).await?))
}
