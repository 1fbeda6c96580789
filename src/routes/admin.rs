use std::sync::Arc;

use warp::{filters::BoxedFilter, reject::Rejection, reply::Response, Filter};

use crate::{
    actions,
    constants::IMPORT_BODY_LIMIT,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::{Id, NewIngredient, NewTag},
    serialize::ImportView,
    state::{with_state, State},
};

use super::{
    json_body,
    reply::{created, json, no_content},
};

async fn create_tag(
    session: SessionData,
    tag: NewTag,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;

    let tag = actions::create_tag(&tag, &state.pool).await?;
    Ok(created(&tag))
}

async fn update_tag(
    id: Id,
    session: SessionData,
    tag: NewTag,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;

    let tag = actions::update_tag(id, &tag, &state.pool).await?;
    Ok(json(&tag))
}

async fn delete_tag(id: Id, session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;

    actions::delete_tag(id, &state.pool).await?;
    Ok(no_content())
}

async fn create_ingredient(
    session: SessionData,
    ingredient: NewIngredient,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;

    let ingredient = actions::create_ingredient(&ingredient, &state.pool).await?;
    Ok(created(&ingredient))
}

async fn import_ingredients(
    session: SessionData,
    ingredients: Vec<NewIngredient>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;

    let created = actions::import_ingredients(&ingredients, &state.pool).await?;
    Ok(json(&ImportView { created }))
}

/// Catalogue management, limited to admins.
pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let new_tag = warp::path!("admin" / "tags")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<NewTag>())
        .and(with_state(state.clone()))
        .and_then(create_tag);

    let edit_tag = warp::path!("admin" / "tags" / Id)
        .and(warp::put().or(warp::patch()).unify())
        .and(with_session(state.clone()))
        .and(json_body::<NewTag>())
        .and(with_state(state.clone()))
        .and_then(update_tag);

    let remove_tag = warp::path!("admin" / "tags" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_tag);

    let new_ingredient = warp::path!("admin" / "ingredients")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<NewIngredient>())
        .and(with_state(state.clone()))
        .and_then(create_ingredient);

    let import = warp::path!("admin" / "ingredients" / "import")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::body::content_length_limit(IMPORT_BODY_LIMIT))
        .and(warp::body::json::<Vec<NewIngredient>>())
        .and(with_state(state))
        .and_then(import_ingredients);

    new_tag
        .or(edit_tag)
        .unify()
        .or(remove_tag)
        .unify()
        .or(new_ingredient)
        .unify()
        .or(import)
        .unify()
        .boxed()
}
