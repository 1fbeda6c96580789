use std::sync::Arc;

use warp::{filters::BoxedFilter, multipart::FormData, reject::Rejection, reply::Response, Filter};

use crate::{
    actions,
    constants::AVATAR_IMAGE_FOLDER,
    error::{Error, TypeError},
    filters::QueryParams,
    form::Form,
    jwt::SessionData,
    media::media_url,
    middleware::{with_possible_session, with_session},
    pagination::Pagination,
    permissions::ActionType,
    schema::{Id, NewUser, PasswordChange},
    serialize::{own_user_view, subscription_view, user_view, AvatarView},
    state::{with_state, State},
};

use super::{
    json_body,
    reply::{created, json, no_content},
    with_query,
};

/// `recipes_limit` caps the recipes listed per author; absent means all of them.
fn recipes_limit(params: &QueryParams) -> Result<Option<i64>, Error> {
    let limit = params.get_number::<i64>("recipes_limit")?;
    if limit.is_some_and(|limit| limit < 0) {
        return Err(TypeError::new("recipes_limit", "Must not be negative").into());
    }

    Ok(limit)
}

async fn list_users(
    session: Option<SessionData>,
    params: QueryParams,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let page = Pagination::from_params(&params, state.config.page_size)?;

    let viewer = session.map(|s| s.user_id);
    let profiles = actions::fetch_profiles(viewer, page, &state.pool).await?;
    let domain = &state.config.domain;
    Ok(json(&profiles.map(|profile| user_view(&profile, domain))))
}

async fn register_user(new_user: NewUser, state: Arc<State>) -> Result<Response, Rejection> {
    let user = actions::register_user(&new_user, &state.pool).await?;

    Ok(created(&own_user_view(&user, &state.config.domain)))
}

async fn get_user(
    id: Id,
    session: Option<SessionData>,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let profile = actions::get_profile(id, viewer, &state.pool).await?;

    Ok(json(&user_view(&profile, &state.config.domain)))
}

async fn get_me(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    let user = actions::get_session_user(session.user_id, &state.pool).await?;

    Ok(json(&own_user_view(&user, &state.config.domain)))
}

async fn set_avatar(
    session: SessionData,
    data: FormData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;

    let mut form = Form::from_multipart(data).await?;
    let upload = form
        .take_file("avatar")
        .ok_or_else(|| TypeError::new("avatar", "This field is required"))?;
    let avatar = state
        .media
        .save_image("avatar", AVATAR_IMAGE_FOLDER, &upload)
        .await?;

    match actions::set_avatar(session.user_id, Some(&avatar), &state.pool).await {
        Ok(Some(previous)) => state.media.remove(&previous).await,
        Ok(None) => {}
        Err(e) => {
            state.media.remove(&avatar).await;
            return Err(e.into());
        }
    }

    Ok(json(&AvatarView {
        avatar: media_url(&state.config.domain, &avatar),
    }))
}

async fn delete_avatar(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;

    if let Some(previous) = actions::set_avatar(session.user_id, None, &state.pool).await? {
        state.media.remove(&previous).await;
    }

    Ok(no_content())
}

async fn set_password(
    session: SessionData,
    change: PasswordChange,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;

    actions::set_password(session.user_id, &change, &state.pool).await?;
    Ok(no_content())
}

async fn list_subscriptions(
    session: SessionData,
    params: QueryParams,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageSubscriptions)?;
    let page = Pagination::from_params(&params, state.config.page_size)?;
    let limit = recipes_limit(&params)?;

    let subscriptions =
        actions::fetch_subscriptions(session.user_id, limit, page, &state.pool).await?;
    let domain = &state.config.domain;
    Ok(json(
        &subscriptions.map(|subscription| subscription_view(&subscription, domain)),
    ))
}

async fn subscribe(
    author_id: Id,
    session: SessionData,
    params: QueryParams,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageSubscriptions)?;
    let limit = recipes_limit(&params)?;

    let subscription = actions::subscribe(session.user_id, author_id, limit, &state.pool).await?;
    Ok(created(&subscription_view(&subscription, &state.config.domain)))
}

async fn unsubscribe(
    author_id: Id,
    session: SessionData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageSubscriptions)?;

    actions::unsubscribe(session.user_id, author_id, &state.pool).await?;
    Ok(no_content())
}

pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("users")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(list_users);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body::<NewUser>())
        .and(with_state(state.clone()))
        .and_then(register_user);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_me);

    let put_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(warp::multipart::form().max_length(state.config.max_upload_bytes))
        .and(with_state(state.clone()))
        .and_then(set_avatar);

    let remove_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_avatar);

    let password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<PasswordChange>())
        .and(with_state(state.clone()))
        .and_then(set_password);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let detail = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_user);

    let follow = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(subscribe);

    let unfollow = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(unsubscribe);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(put_avatar)
        .unify()
        .or(remove_avatar)
        .unify()
        .or(password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(detail)
        .unify()
        .or(follow)
        .unify()
        .or(unfollow)
        .unify()
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipes_limit_is_optional() {
        assert_eq!(recipes_limit(&QueryParams::default()).unwrap(), None);

        let params = QueryParams::new(vec![(String::from("recipes_limit"), String::from("3"))]);
        assert_eq!(recipes_limit(&params).unwrap(), Some(3));
    }

    #[test]
    fn negative_recipes_limit_is_a_field_error() {
        let params = QueryParams::new(vec![(String::from("recipes_limit"), String::from("-1"))]);

        let error = recipes_limit(&params).unwrap_err();
        assert!(error.fields.contains_key("recipes_limit"));
    }
}
