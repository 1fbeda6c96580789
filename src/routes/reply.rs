use std::convert::Infallible;

use serde::Serialize;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    },
    reply::Response,
    Rejection, Reply,
};

use crate::error::{Error, ErrorKind};

pub fn json<T: Serialize>(value: &T) -> Response {
    warp::reply::json(value).into_response()
}

pub fn created<T: Serialize>(value: &T) -> Response {
    warp::reply::with_status(warp::reply::json(value), StatusCode::CREATED).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn rejection_error(err: &Rejection) -> Error {
    if let Some(e) = err.find::<Error>() {
        return e.clone();
    }
    if err.is_not_found() {
        return ErrorKind::NotFound.default();
    }
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return ErrorKind::InvalidRequest.new(&format!("{e}"));
    }
    if err.find::<InvalidQuery>().is_some() {
        return ErrorKind::InvalidRequest.new("Invalid query string");
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return ErrorKind::PayloadTooLarge.default();
    }
    if err.find::<UnsupportedMediaType>().is_some() {
        return ErrorKind::InvalidRequest.new("Unsupported media type");
    }
    if let Some(e) = err.find::<MissingHeader>() {
        return ErrorKind::InvalidRequest.new(&format!("{e}"));
    }
    if let Some(e) = err.find::<InvalidHeader>() {
        return ErrorKind::InvalidRequest.new(&format!("{e}"));
    }
    if err.find::<LengthRequired>().is_some() {
        return ErrorKind::InvalidRequest.new("A content-length header is required");
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return ErrorKind::MethodNotAllowed.default();
    }

    log::error!("Unhandled rejection: {err:?}");
    ErrorKind::InternalServerError.default()
}

/// Renders every rejection as a JSON error body.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let error = rejection_error(&err);

    if error.code >= 500 {
        log::error!("Request failed: {error}");
    } else {
        log::debug!("Request rejected: {error}");
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&error.body()),
        error.status(),
    ))
}
