use std::{convert::Infallible, sync::Arc};

use warp::{reject::Rejection, Filter, Reply};

use crate::{
    constants::{API_PREFIX, JSON_BODY_LIMIT, MEDIA_PREFIX},
    filters::QueryParams,
    state::State,
};

mod admin;
mod auth;
mod recipes;
mod reference;
mod reply;
mod users;

pub use reply::handle_rejection;

/// Query string pairs, repeated keys kept.
pub fn with_query() -> impl Filter<Extract = (QueryParams,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>().map(QueryParams::new)
}

pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

/// Every route of the service, with JSON error rendering and request logging.
pub fn api(state: Arc<State>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path(API_PREFIX).and(
        recipes::routes(state.clone())
            .or(users::routes(state.clone()))
            .unify()
            .or(reference::routes(state.clone()))
            .unify()
            .or(auth::routes(state.clone()))
            .unify()
            .or(admin::routes(state.clone()))
            .unify(),
    );

    let media = warp::path(MEDIA_PREFIX)
        .and(warp::get())
        .and(warp::fs::dir(state.config.media_root.clone()));

    api.or(media)
        .recover(handle_rejection)
        .with(warp::log("recipe_share::api"))
}
