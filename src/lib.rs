pub mod api;
pub mod auth;
pub mod config;
pub mod db;

pub use db::DbPool;

use auth::SessionManager;
use config::Config;
use db::{ProfileStore, UserStore};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub users: UserStore,
    pub profiles: ProfileStore,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let users = UserStore::new(db.clone());
        let profiles = ProfileStore::new(db.clone());
        let sessions = SessionManager::new(db.clone(), config.auth.session_ttl_minutes);
        Self {
            config,
            db,
            users,
            profiles,
            sessions,
        }
    }
}
