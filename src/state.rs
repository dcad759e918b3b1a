use std::sync::Arc;

use crate::{
    auth::{
        oauth::{HttpOAuthExchange, OAuthExchange},
        repo::{PgUserStore, UserStore},
    },
    cache::{Cache, NoopCache},
    config::AppConfig,
    db,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub oauth: Arc<dyn OAuthExchange>,
    pub cache: Option<Arc<dyn Cache>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await;

        let users = Arc::new(PgUserStore::new(pool)) as Arc<dyn UserStore>;
        let oauth = Arc::new(HttpOAuthExchange::new(reqwest::Client::new())) as Arc<dyn OAuthExchange>;
        let cache = Some(Arc::new(NoopCache) as Arc<dyn Cache>);

        Ok(Self::from_parts(config, users, oauth, cache))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        oauth: Arc<dyn OAuthExchange>,
        cache: Option<Arc<dyn Cache>>,
    ) -> Self {
        Self {
            config,
            users,
            oauth,
            cache,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::test_support::{test_config, FakeOAuth, MemoryUserStore};

        Self::from_parts(
            Arc::new(test_config()),
            Arc::new(MemoryUserStore::default()),
            Arc::new(FakeOAuth::failing()),
            None,
        )
    }
}
