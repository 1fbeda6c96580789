use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use warp::Filter;

use crate::{
    config::Config,
    error::{Error, ErrorKind, QueryError},
    media::MediaStore,
    SessionStore,
};

pub struct State {
    pub pool: Pool<Postgres>,
    pub sessions: SessionStore,
    pub media: MediaStore,
    pub config: Config,
}

impl State {
    /// Connects to the database and applies pending migrations.
    pub async fn connect(config: Config) -> Result<Arc<Self>, Error> {
        log::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .map_err(QueryError::from)?;

        log::info!("Running migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                log::error!("Migration failed: {e}");
                ErrorKind::InternalServerError.new("Migration failed")
            })?;

        Self::build(pool, config)
    }

    /// State whose connections are only opened on first use.
    pub fn lazy(config: Config) -> Result<Arc<Self>, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect_lazy(&config.database_url)
            .map_err(QueryError::from)?;

        Self::build(pool, config)
    }

    fn build(pool: Pool<Postgres>, config: Config) -> Result<Arc<Self>, Error> {
        let sessions = SessionStore::open(&config.redis_url)?;
        let media = MediaStore::new(&config.media_root);

        Ok(Arc::new(Self {
            pool,
            sessions,
            media,
            config,
        }))
    }
}

pub fn with_state(
    state: Arc<State>,
) -> impl Filter<Extract = (Arc<State>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}
