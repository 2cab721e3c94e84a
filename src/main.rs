use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vidgated::application::use_cases::transform_video::TransformVideoUseCase;
use vidgated::domain::repositories::KvStore;
use vidgated::infrastructure::cache::{InMemoryKvStore, VersionStore};
use vidgated::infrastructure::config::{
    ConfigManager, ConfigSubscriber, GatewayConfigDoc, RuntimeConfig,
};
use vidgated::infrastructure::origins::{
    BucketBinding, PresignedUrlCache, S3ObjectStore, SourceFetcher,
};
use vidgated::infrastructure::tasks::{BackgroundScheduler, DEFAULT_TASK_LIFETIME_SECONDS};
use vidgated::infrastructure::upstream::{UpstreamClient, DEFAULT_UPSTREAM_TIMEOUT_SECONDS};
use vidgated::presentation::http::handlers::admin_handlers::AdminToken;
use vidgated::presentation::http::{router, AppState};

struct Config {
    port: u16,
    admin_token: Option<String>,
    config_path: Option<String>,
    upstream_base_url: Option<String>,
    upstream_timeout_secs: u64,
    task_lifetime_secs: u64,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            config_path: std::env::var("CONFIG_PATH").ok(),
            upstream_base_url: std::env::var("UPSTREAM_BASE_URL").ok(),
            upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECONDS),
            task_lifetime_secs: std::env::var("TASK_LIFETIME_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TASK_LIFETIME_SECONDS),
        })
    }
}

/// Bucket bindings from the process environment. One binding named
/// `MEDIA` covers the common single-bucket deployment; richer setups
/// use the config document's origins against additional env pairs.
fn bucket_bindings_from_env() -> HashMap<String, BucketBinding> {
    let mut bindings = HashMap::new();
    if let Ok(bucket) = std::env::var("R2_BUCKET") {
        bindings.insert(
            "MEDIA".to_string(),
            BucketBinding {
                bucket,
                region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
                endpoint: std::env::var("R2_ENDPOINT").ok(),
                access_key_var: Some("R2_ACCESS_KEY_ID".to_string()),
                secret_key_var: Some("R2_SECRET_ACCESS_KEY".to_string()),
                public_base_url: std::env::var("R2_PUBLIC_BASE_URL").ok(),
            },
        );
    }
    bindings
}

/// Logs installed config versions; the managers themselves read the
/// snapshot per request
struct InstallLogger;

impl ConfigSubscriber for InstallLogger {
    fn on_config_installed(&self, config: &Arc<RuntimeConfig>) {
        info!(
            version = %config.doc.version,
            origins = config.origins.len(),
            "config snapshot distributed"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN not set; the admin endpoint will reject all requests");
    }

    // All KV namespaces share one store; keys are namespaced by prefix
    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());

    // Config document: persisted snapshot wins, then CONFIG_PATH, then defaults
    let mut doc = match ConfigManager::load_persisted(&kv).await? {
        Some(doc) => {
            info!(version = %doc.version, "loaded persisted config from KV");
            doc
        }
        None => match &config.config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let doc: GatewayConfigDoc = serde_json::from_str(&raw)?;
                info!(path = %path, version = %doc.version, "loaded config file");
                doc
            }
            None => {
                warn!("no config found; starting with defaults (no origins)");
                GatewayConfigDoc {
                    version: "0.0.0".to_string(),
                    ..Default::default()
                }
            }
        },
    };
    if let Some(base) = &config.upstream_base_url {
        doc.video.cdn_cgi.base_path = base.clone();
    }

    let upstream_base = doc.video.cdn_cgi.base_path.clone();
    let config_manager = Arc::new(ConfigManager::new(RuntimeConfig::compile(doc)?, kv.clone()));
    config_manager.subscribe(Arc::new(InstallLogger));

    // Origin backends
    let object_store = Arc::new(S3ObjectStore::new(bucket_bindings_from_env()));
    let presigner = Arc::new(PresignedUrlCache::new(kv.clone(), object_store.clone()));
    let fetcher = Arc::new(
        SourceFetcher::new(object_store, presigner, config.upstream_timeout_secs)
            .map_err(|e| anyhow::anyhow!("fetcher setup failed: {}", e))?,
    );

    // Upstream transformation client
    let upstream = Arc::new(
        UpstreamClient::new(&upstream_base, config.upstream_timeout_secs)
            .map_err(|e| anyhow::anyhow!("upstream client setup failed: {}", e))?,
    );
    info!(base = %upstream_base, "upstream transformation client ready");

    // Cache plumbing and the pipeline
    let version_store = Arc::new(VersionStore::new(kv.clone()));
    let scheduler = Arc::new(BackgroundScheduler::new(Duration::from_secs(
        config.task_lifetime_secs,
    )));
    let use_case = Arc::new(TransformVideoUseCase::new(
        config_manager.clone(),
        kv,
        version_store,
        upstream,
        fetcher,
    ));

    let state = AppState {
        config: config_manager,
        use_case,
        scheduler: scheduler.clone(),
        admin_token: AdminToken(config.admin_token.clone()),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    // Let in-flight background writes finish before the process exits
    scheduler.drain().await;

    Ok(())
}
