use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warp::{self, reject};

/// Response header carrying the issued access token.
pub const ACCESS_TOKEN_HEADER: &str = "authorization";
/// Response header carrying the issued refresh token.
pub const REFRESH_TOKEN_HEADER: &str = "refresh-token";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Bounds every service call by the request deadline and the server's
/// shutdown signal. Dropping the service future cancels its in-flight store
/// and cache calls; warp does the same when the client disconnects.
#[derive(Clone)]
pub struct RequestGuard {
    cancel: CancellationToken,
    timeout: Duration,
}

impl RequestGuard {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        RequestGuard { cancel, timeout }
    }

    pub async fn run<T>(
        &self,
        fut: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, warp::Rejection> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(reject::custom(ApiErrorCode::Unavailable)),
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(res) => res.map_err(ApiErrorCode::from).map_err(reject::custom),
                Err(_) => {
                    warn!("request exceeded {:?}", self.timeout);
                    Err(reject::custom(ApiErrorCode::Timeout))
                }
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn reply_with_tokens(tokens: Tokens, message: &'static str) -> impl warp::Reply {
    let reply = warp::reply::json(&ApiResponse::ok(MessageResponse { message }));
    let reply = warp::reply::with_header(reply, ACCESS_TOKEN_HEADER, tokens.access_token.0);
    warp::reply::with_header(reply, REFRESH_TOKEN_HEADER, tokens.refresh_token.0)
}

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

pub async fn sign_up(
    body: SignUpRequest,
    credential_service: Arc<dyn CredentialService>,
    guard: RequestGuard,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = SignUpInput {
        name: body.name,
        phone: body.phone,
        email: body.email,
        password: body.password,
    };
    let tokens = guard.run(credential_service.sign_up(input)).await?;

    Ok(reply_with_tokens(tokens, "Identity created"))
}

#[derive(Deserialize)]
pub struct LogInRequest {
    pub phone: String,
    pub password: String,
}

pub async fn log_in(
    body: LogInRequest,
    credential_service: Arc<dyn CredentialService>,
    guard: RequestGuard,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = LogInInput {
        phone: body.phone,
        password: body.password,
    };
    let tokens = guard.run(credential_service.log_in(input)).await?;

    Ok(reply_with_tokens(tokens, "Logged in"))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    credential_service: Arc<dyn CredentialService>,
    guard: RequestGuard,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = guard
        .run(credential_service.refresh(&body.refresh_token))
        .await?;

    Ok(reply_with_tokens(tokens, "Token refreshed"))
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

pub async fn revoke(
    body: RevokeRequest,
    credential_service: Arc<dyn CredentialService>,
    guard: RequestGuard,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = RevokeInput {
        name: body.name,
        phone: body.phone,
        email: body.email,
        password: body.password,
    };
    guard.run(credential_service.revoke_tokens(input)).await?;

    Ok(warp::reply::json(&ApiResponse::ok(MessageResponse {
        message: "Tokens revoked",
    })))
}

#[derive(Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<IdentityId>,
}

impl ValidateTokenResponse {
    fn invalid() -> Self {
        ValidateTokenResponse {
            valid: false,
            identity_id: None,
        }
    }
}

/// A rejected token is a normal `valid: false` answer. Only a failing
/// blacklist lookup is an error, so callers can tell "unauthenticated" apart
/// from "auth is down".
pub async fn validate_token(
    body: ValidateTokenRequest,
    credential_service: Arc<dyn CredentialService>,
    secret_key: SecretKey,
    guard: RequestGuard,
) -> Result<impl warp::Reply, warp::Rejection> {
    let identity_id = match credential_service.validate_token(&body.token, &secret_key) {
        Ok(identity_id) => identity_id,
        Err(e) => {
            debug!("token rejected: {}", e);
            return Ok(warp::reply::json(&ApiResponse::ok(
                ValidateTokenResponse::invalid(),
            )));
        }
    };

    let blacklisted = guard
        .run(credential_service.is_token_blacklisted(&body.token))
        .await?;
    let response = if blacklisted {
        debug!(%identity_id, "token is blacklisted");
        ValidateTokenResponse::invalid()
    } else {
        ValidateTokenResponse {
            valid: true,
            identity_id: Some(identity_id),
        }
    };

    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

pub async fn log_out(
    authorization: String,
    credential_service: Arc<dyn CredentialService>,
    guard: RequestGuard,
) -> Result<impl warp::Reply, warp::Rejection> {
    guard.run(credential_service.log_out(&authorization)).await?;

    Ok(warp::reply::json(&ApiResponse::ok(MessageResponse {
        message: "Logged out",
    })))
}
