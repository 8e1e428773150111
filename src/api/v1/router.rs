use super::handler::{self, RequestGuard};
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let guard = RequestGuard::new(server.cancel.clone(), server.request_timeout);

    let signup = warp::post()
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.credential_service.clone()))
        .and(with(guard.clone()))
        .and_then(handler::sign_up);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.credential_service.clone()))
        .and(with(guard.clone()))
        .and_then(handler::log_in);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.credential_service.clone()))
        .and(with(guard.clone()))
        .and_then(handler::refresh);

    let revoke = warp::post()
        .and(warp::path("revoke"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.credential_service.clone()))
        .and(with(guard.clone()))
        .and_then(handler::revoke);

    let validate = warp::post()
        .and(warp::path("validate"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.credential_service.clone()))
        .and(with(server.secret_key.clone()))
        .and(with(guard.clone()))
        .and_then(handler::validate_token);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::header::<String>("authorization"))
        .and(with(server.credential_service.clone()))
        .and(with(guard))
        .and_then(handler::log_out);

    signup
        .or(login)
        .or(refresh)
        .or(revoke)
        .or(validate)
        .or(logout)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with<T>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send + Sync,
{
    warp::any().map(move || value.clone())
}
