use std::sync::Arc;

use warp::{filters::BoxedFilter, reject::Rejection, reply::Response, Filter};

use crate::{
    actions,
    jwt::SessionData,
    middleware::with_session,
    schema::Credentials,
    serialize::TokenView,
    state::{with_state, State},
};

use super::{
    json_body,
    reply::{json, no_content},
};

async fn login(credentials: Credentials, state: Arc<State>) -> Result<Response, Rejection> {
    let auth_token = actions::login_user(
        &credentials,
        &state.config.jwt_secret,
        state.config.token_lifetime_hours,
        &state.pool,
    )
    .await?;

    Ok(json(&TokenView { auth_token }))
}

async fn logout(session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    state.sessions.revoke(&session).await?;
    log::info!("User {} logged out", session.user_id);

    Ok(no_content())
}

pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<Credentials>())
        .and(with_state(state.clone()))
        .and_then(login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(logout);

    login.or(logout).unify().boxed()
}
