use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::repo::{PgUserStore, UserStore};
use crate::classes::repo::{ClassCatalog, PgClassCatalog};
use crate::config::AppConfig;
use crate::db;
use crate::memory::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub classes: Arc<dyn ClassCatalog>,
    pub started_at: Instant,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;

        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let classes = Arc::new(PgClassCatalog::new(db.clone())) as Arc<dyn ClassCatalog>;

        Ok(Self::from_parts(db, config, users, classes))
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        classes: Arc<dyn ClassCatalog>,
    ) -> Self {
        Self {
            db,
            config,
            users,
            classes,
            started_at: Instant::now(),
        }
    }

    /// State backed by a fresh in-memory store; the pool never connects.
    pub fn fake() -> Self {
        Self::with_memory(Arc::new(MemoryStore::new()))
    }

    /// Like [`AppState::fake`], sharing `store` so callers can seed and inspect it.
    pub fn with_memory(store: Arc<MemoryStore>) -> Self {
        let config = Arc::new(AppConfig::test_default());
        let db = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(&config.database_url)
            .expect("lazy pool ok");

        let users = store.clone() as Arc<dyn UserStore>;
        let classes = store as Arc<dyn ClassCatalog>;
        Self::from_parts(db, config, users, classes)
    }
}
