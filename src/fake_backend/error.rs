use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// No bearer token at all. Spring Security answers this with 403.
    #[error("Acceso denegado")]
    MissingToken,
    #[error("Token inválido o expirado")]
    InvalidToken,
    #[error("No tiene permisos para realizar esta acción")]
    InsufficientRole,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Error interno del servidor")]
    Internal,
}

impl BackendError {
    pub fn internal<E: std::fmt::Display>(error: E) -> BackendError {
        warn!("fake backend internal error: {}", error);
        BackendError::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BackendError::MissingToken | BackendError::InsufficientRole => StatusCode::FORBIDDEN,
            BackendError::InvalidToken => StatusCode::UNAUTHORIZED,
            BackendError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BackendError::NotFound(_) => StatusCode::NOT_FOUND,
            BackendError::Conflict(_) => StatusCode::CONFLICT,
            BackendError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for BackendError {}

fn json_error(status: StatusCode, message: impl Into<String>) -> warp::reply::WithStatus<warp::reply::Json> {
    let body = ErrorBody {
        message: message.into(),
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<BackendError>() {
        debug!(status = %err.status(), "{}", err);
        return Ok(json_error(err.status(), err.to_string()));
    }
    if err.is_not_found() {
        return Ok(json_error(StatusCode::NOT_FOUND, "Recurso no encontrado"));
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(json_error(StatusCode::BAD_REQUEST, e.to_string()));
    }
    if err.find::<warp::reject::InvalidQuery>().is_some() {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Parámetros inválidos"));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(json_error(StatusCode::METHOD_NOT_ALLOWED, "Método no permitido"));
    }
    warn!("unhandled rejection: {:?}", err);
    Ok(json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Unhandled error: {:?}", err),
    ))
}
