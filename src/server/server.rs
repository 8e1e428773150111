use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub credential_service: Arc<dyn CredentialService>,
    pub secret_key: SecretKey,
    pub request_timeout: Duration,
    pub cancel: CancellationToken,
    pool: Option<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let auth_config = settings.auth.to_config()?;

        let (identity_repo, token_cache, pool) = match settings.store.backend.as_str() {
            "memory" => {
                warn!("using in-memory store, identities and sessions are lost on exit");
                let identity_repo: Arc<dyn IdentityRepo> = Arc::new(MemoryIdentityRepo::new());
                let token_cache: Arc<dyn TokenCache> = Arc::new(MemoryTokenCache::new());
                (identity_repo, token_cache, None)
            }
            "real" => {
                let mysql_dsn = settings
                    .store
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.mysql_dsn is required for the real backend"))?;
                let redis_dsn = settings
                    .store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.redis_dsn is required for the real backend"))?;

                let pool = MySqlPool::connect(mysql_dsn).await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                info!("mysql connected, migrations applied");

                let redis_client = redis::Client::open(redis_dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                info!("redis connected");

                let identity_repo: Arc<dyn IdentityRepo> =
                    Arc::new(MySqlIdentityRepo::new(pool.clone()));
                let token_cache: Arc<dyn TokenCache> = Arc::new(RedisTokenCache::new(
                    redis_manager,
                    settings.store.key_prefix.clone(),
                ));
                (identity_repo, token_cache, Some(pool))
            }
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let credential_service: Arc<dyn CredentialService> = Arc::new(RealCredentialService::new(
            identity_repo,
            credential_hasher,
            token_cache,
            auth_config.clone(),
        ));

        info!("server started");

        Ok(Self {
            credential_service,
            secret_key: auth_config.secret_key,
            request_timeout: settings.http.request_timeout(),
            cancel: CancellationToken::new(),
            pool,
        })
    }

    /// Aborts in-flight requests, then closes the database pool.
    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
