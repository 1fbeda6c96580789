use std::sync::Arc;

use warp::{
    filters::BoxedFilter,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    multipart::FormData,
    reject::Rejection,
    reply::Response,
    Filter, Reply,
};

use crate::{
    actions::{self, Relation},
    constants::{RECIPE_IMAGE_FOLDER, SHOPPING_LIST_FILENAME},
    error::{ErrorKind, TypeError},
    filters::{QueryParams, RecipeFilter},
    form::Form,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::Pagination,
    permissions::ActionType,
    schema::Id,
    serialize::{recipe_short_view, recipe_view, ShortLinkView},
    shopping::shopping_list,
    state::{with_state, State},
    validation::recipe_draft,
};

use super::{
    reply::{created, json, no_content},
    with_query,
};

async fn list_recipes(
    session: Option<SessionData>,
    params: QueryParams,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_params(&params)?;
    let page = Pagination::from_params(&params, state.config.page_size)?;

    let recipes = actions::fetch_recipes(&filter, session.as_ref(), page, &state.pool).await?;
    let domain = &state.config.domain;
    Ok(json(&recipes.map(|bundle| recipe_view(&bundle, domain))))
}

async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let bundle = actions::get_recipe(id, session.as_ref(), &state.pool).await?;

    Ok(json(&recipe_view(&bundle, &state.config.domain)))
}

async fn create_recipe(
    session: SessionData,
    data: FormData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;

    let mut form = Form::from_multipart(data).await?;
    let draft = recipe_draft(&form, &state.config.limits, true)?;
    let upload = form
        .take_file("image")
        .ok_or_else(|| TypeError::new("image", "This field is required"))?;
    let image = state
        .media
        .save_image("image", RECIPE_IMAGE_FOLDER, &upload)
        .await?;

    let created_id = actions::create_recipe(
        &draft,
        &image,
        &state.config.limits,
        &session,
        &state.pool,
    )
    .await;
    let id = match created_id {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&image).await;
            return Err(e.into());
        }
    };

    let bundle = actions::get_recipe(id, Some(&session), &state.pool).await?;
    Ok(created(&recipe_view(&bundle, &state.config.domain)))
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    data: FormData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    actions::get_recipe_mut(id, &session, &state.pool).await?;

    let mut form = Form::from_multipart(data).await?;
    let draft = recipe_draft(&form, &state.config.limits, false)?;
    let image = match form.take_file("image") {
        Some(upload) => Some(
            state
                .media
                .save_image("image", RECIPE_IMAGE_FOLDER, &upload)
                .await?,
        ),
        None => None,
    };

    let updated = actions::update_recipe(
        id,
        &draft,
        image.as_deref(),
        &state.config.limits,
        &session,
        &state.pool,
    )
    .await;
    match updated {
        Ok(Some(previous)) => state.media.remove(&previous).await,
        Ok(None) => {}
        Err(e) => {
            if let Some(image) = &image {
                state.media.remove(image).await;
            }
            return Err(e.into());
        }
    }

    let bundle = actions::get_recipe(id, Some(&session), &state.pool).await?;
    Ok(json(&recipe_view(&bundle, &state.config.domain)))
}

async fn delete_recipe(
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let image = actions::delete_recipe(id, &session, &state.pool).await?;
    state.media.remove(&image).await;

    Ok(no_content())
}

async fn get_short_link(id: Id, state: Arc<State>) -> Result<Response, Rejection> {
    if !actions::recipe_exists(id, &state.pool).await? {
        return Err(ErrorKind::NotFound
            .new("No recipe exists with specified id")
            .into());
    }

    Ok(json(&ShortLinkView {
        short_link: format!("{}/recipes/{id}/", state.config.domain),
    }))
}

fn relation_action(relation: Relation) -> ActionType {
    match relation {
        Relation::Favorite => ActionType::ManageFavorites,
        Relation::ShoppingCart => ActionType::ManageShoppingCart,
    }
}

async fn add_relation(
    relation: Relation,
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(relation_action(relation))?;

    let recipe = actions::add_relation(relation, session.user_id, id, &state.pool).await?;
    Ok(created(&recipe_short_view(&recipe, &state.config.domain)))
}

async fn remove_relation(
    relation: Relation,
    id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(relation_action(relation))?;

    actions::remove_relation(relation, session.user_id, id, &state.pool).await?;
    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageShoppingCart)?;

    let user = actions::get_session_user(session.user_id, &state.pool).await?;
    let lines = actions::cart_lines(session.user_id, &state.pool).await?;
    let text = shopping_list(&user.first_name, &user.last_name, lines)?;

    let reply = warp::reply::with_header(text, CONTENT_TYPE, "text/plain; charset=utf-8");
    let reply = warp::reply::with_header(
        reply,
        CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );
    Ok(reply.into_response())
}

fn relation_routes(
    relation: Relation,
    segment: &'static str,
    state: Arc<State>,
) -> BoxedFilter<(Response,)> {
    let path = warp::path("recipes")
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());
    let relation = warp::any().map(move || relation);

    let add = relation
        .clone()
        .and(path.clone())
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(add_relation);

    let remove = relation
        .and(path)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(remove_relation);

    add.or(remove).unify().boxed()
}

pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let upload_limit = state.config.max_upload_bytes;

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::multipart::form().max_length(upload_limit))
        .and(with_state(state.clone()))
        .and_then(create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_recipe);

    let update = warp::path!("recipes" / Id)
        .and(warp::put().or(warp::patch()).unify())
        .and(with_session(state.clone()))
        .and(warp::multipart::form().max_length(upload_limit))
        .and(with_state(state.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe);

    let short_link = warp::path!("recipes" / Id / "get-link")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_short_link);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(short_link)
        .unify()
        .or(relation_routes(Relation::Favorite, "favorite", state.clone()))
        .unify()
        .or(relation_routes(Relation::ShoppingCart, "shopping_cart", state))
        .unify()
        .boxed()
}
