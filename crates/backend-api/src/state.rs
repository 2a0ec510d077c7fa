use std::sync::Arc;

use circleup_auth::{AuthSession, Authenticator, User};
use circleup_realtime::RoomBus;
use sqlx::SqlitePool;

use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    authenticator: Authenticator,
    rooms: Arc<dyn RoomBus>,
}

impl AppState {
    pub fn new(pool: SqlitePool, authenticator: Authenticator, rooms: Arc<dyn RoomBus>) -> Self {
        Self {
            pool,
            authenticator,
            rooms,
        }
    }

    pub fn db_pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn rooms(&self) -> &Arc<dyn RoomBus> {
        &self.rooms
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }
}
