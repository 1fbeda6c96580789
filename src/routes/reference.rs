use std::sync::Arc;

use warp::{filters::BoxedFilter, reject::Rejection, reply::Response, Filter};

use crate::{
    actions,
    filters::QueryParams,
    schema::Id,
    state::{with_state, State},
};

use super::{reply::json, with_query};

async fn list_tags(state: Arc<State>) -> Result<Response, Rejection> {
    let tags = actions::list_tags(&state.pool).await?;

    Ok(json(&tags))
}

async fn get_tag(id: Id, state: Arc<State>) -> Result<Response, Rejection> {
    let tag = actions::get_tag(id, &state.pool).await?;

    Ok(json(&tag))
}

async fn list_ingredients(params: QueryParams, state: Arc<State>) -> Result<Response, Rejection> {
    let ingredients = actions::fetch_ingredients(params.get("name"), &state.pool).await?;

    Ok(json(&ingredients))
}

async fn get_ingredient(id: Id, state: Arc<State>) -> Result<Response, Rejection> {
    let ingredient = actions::get_ingredient(id, &state.pool).await?;

    Ok(json(&ingredient))
}

/// Read-only tag and ingredient listings, open to everyone.
pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let tags = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_tags);

    let tag = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_tag);

    let ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(list_ingredients);

    let ingredient = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(get_ingredient);

    tags.or(tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .boxed()
}
