use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{
    error::{Error, ErrorKind},
    state::{with_state, State},
};

use super::jwt::{token_from_header, verify_jwt_session, SessionData};

async fn resolve_session(header: &str, state: &State) -> Result<SessionData, Error> {
    let token = token_from_header(header)
        .ok_or_else(|| ErrorKind::Unauthorized.new("Invalid authorization header"))?;
    let session: SessionData = verify_jwt_session(token, &state.config.jwt_secret)?.into();

    if state.sessions.is_revoked(&session.token_id).await? {
        return Err(ErrorKind::Unauthorized.new("Token has been revoked"));
    }
    Ok(session)
}

/// Requires a valid, unrevoked token.
pub fn with_session(
    state: Arc<State>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: Arc<State>| async move {
            let header = header.ok_or_else(|| ErrorKind::Unauthorized.default())?;
            let session = resolve_session(&header, &state).await?;

            log::trace!("> Session of {} ({})", session.username, session.user_id);
            Ok::<_, Rejection>(session)
        })
}

/// Resolves the caller when possible. Missing, invalid and revoked tokens
/// all yield an anonymous caller.
pub fn with_possible_session(
    state: Arc<State>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .then(|header: Option<String>, state: Arc<State>| async move {
            let header = header?;
            match resolve_session(&header, &state).await {
                Ok(session) => Some(session),
                Err(e) => {
                    log::debug!("Treating caller as anonymous: {e}");
                    None
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state() -> Arc<State> {
        State::lazy(Config::default()).unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let rejection = warp::test::request()
            .filter(&with_session(state()))
            .await
            .unwrap_err();

        let error = rejection.find::<Error>().unwrap();
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let rejection = warp::test::request()
            .header("authorization", "Token nonsense")
            .filter(&with_session(state()))
            .await
            .unwrap_err();

        assert_eq!(rejection.find::<Error>().unwrap().code, 401);
    }

    #[tokio::test]
    async fn anonymous_caller_on_open_routes() {
        let session = warp::test::request()
            .filter(&with_possible_session(state()))
            .await
            .unwrap();

        assert!(session.is_none());
    }

    #[tokio::test]
    async fn invalid_token_on_open_routes_is_anonymous() {
        let session = warp::test::request()
            .header("authorization", "Bearer nonsense")
            .filter(&with_possible_session(state()))
            .await
            .unwrap();

        assert!(session.is_none());
    }
}
