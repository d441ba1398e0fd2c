mod admin;
mod browser;
mod common;
mod login;
mod model;
mod oauth;
mod store;

use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;

use browser::ChromeLauncher;
use login::BrowserLogin;
use model::arg::Args;
use model::config::Config;
use oauth::{AccessGenerator, CredentialRegistry, TokenState};
use store::{ConfigStore, IdentityCodec, JsonFileStore, SecretCodec};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = config.validate() {
        tracing::error!("Invalid config: {}", e);
        std::process::exit(1);
    }

    // Open configuration store
    let store_path = args.store.map(Into::into).unwrap_or_else(|| config.store_path.clone());
    let store = JsonFileStore::open(&store_path).unwrap_or_else(|e| {
        tracing::error!("Failed to open store {}: {}", store_path.display(), e);
        std::process::exit(1);
    });
    let store: Arc<dyn ConfigStore> = Arc::new(store);
    let codec: Arc<dyn SecretCodec> = Arc::new(IdentityCodec);

    // Load registered clients
    let clients_path = args
        .clients
        .map(Into::into)
        .unwrap_or_else(|| config.clients_path.clone());
    let registry = CredentialRegistry::load(&clients_path, codec.clone()).unwrap_or_else(|e| {
        tracing::error!("Failed to load clients: {}", e);
        std::process::exit(1);
    });
    let registry = Arc::new(registry);
    tracing::info!("Loaded {} registered clients", registry.clients().len());

    if config.login_url.is_empty() {
        if let Some(url) = store::document_url(store.as_ref()) {
            tracing::info!("Using document URL from store: {}", url);
            config.login_url = url;
        }
    }
    if let Some(api_url) = store::api_url(store.as_ref()) {
        tracing::info!("Portal API URL: {}", api_url);
    }

    bootstrap_default_client(&config, store.as_ref(), codec.as_ref(), &registry);

    // Build login method and access generator
    let launcher = Arc::new(ChromeLauncher::new(
        config.headless,
        config.language.clone(),
        config.chrome_executable.clone(),
    ));
    let login_method = BrowserLogin::new(launcher, config.login_options()).unwrap_or_else(|e| {
        tracing::error!("Invalid login options: {}", e);
        std::process::exit(1);
    });
    let generator = AccessGenerator::new(
        store.clone(),
        codec.clone(),
        Arc::new(login_method),
        registry.clone(),
    )
    .with_refresh_token_length(config.refresh_token_length);

    let token_app = oauth::create_token_router(TokenState {
        generator: Arc::new(generator),
        registry: registry.clone(),
        expires_in: config.access_token_expires_in,
        screenshot_dir: config.screenshot_dir.clone(),
    });

    // Build Admin API router (if non-empty admin_api_key is configured)
    // Security check: empty string is treated as not configured, preventing empty key bypass
    let admin_key = config
        .admin_api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let app = match admin_key {
        Some(admin_key) => {
            let admin_service = admin::AdminService::new(registry.clone());
            let admin_state = admin::AdminState::new(admin_key, admin_service);
            tracing::info!("Admin API enabled");
            token_app.nest("/api/admin", admin::create_admin_router(admin_state))
        }
        None => {
            if config.admin_api_key.is_some() {
                tracing::warn!("adminApiKey is empty, Admin API not enabled");
            }
            token_app
        }
    };
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting OAuth token endpoint: {}", addr);
    tracing::info!("Login URL: {}", config.login_url);
    tracing::info!("Available APIs:");
    tracing::info!("  POST /token");
    if admin_key.is_some() {
        tracing::info!("Admin API:");
        tracing::info!("  GET    /api/admin/clients");
        tracing::info!("  POST   /api/admin/clients");
        tracing::info!("  DELETE /api/admin/clients/:id");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        tracing::error!("Failed to bind {}: {}", addr, e);
        std::process::exit(1);
    });
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Register the store's account for the configured default client
fn bootstrap_default_client(
    config: &Config,
    store: &dyn ConfigStore,
    codec: &dyn SecretCodec,
    registry: &CredentialRegistry,
) {
    let (Some(client_id), Some(client_secret)) =
        (&config.default_client_id, &config.default_client_secret)
    else {
        return;
    };

    let credentials = match store::credentials(store, codec) {
        Ok(Some(credentials)) => credentials,
        Ok(None) => {
            tracing::warn!("Store holds no account, default client {} not registered", client_id);
            return;
        }
        Err(e) => {
            tracing::warn!("Failed to read account from store: {}", e);
            return;
        }
    };

    let redirect_url = config.default_redirect_url.as_deref().unwrap_or_default();
    if let Err(e) = registry.register(client_id, client_secret, redirect_url, &credentials) {
        tracing::warn!("Failed to register default client {}: {}", client_id, e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn config_with_default_client() -> Config {
        Config {
            default_client_id: Some("default".to_string()),
            default_client_secret: Some("s3cret".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_bootstrap_registers_store_account() {
        let store = MemoryStore::new();
        store::set_username(&store, "alice").unwrap();
        store::set_password(&store, &IdentityCodec, "hunter2").unwrap();
        let registry = CredentialRegistry::in_memory();

        bootstrap_default_client(&config_with_default_client(), &store, &IdentityCodec, &registry);

        assert!(registry.verify_secret("default", "s3cret"));
        let credentials = registry.credentials_for("default").unwrap().unwrap();
        assert_eq!(credentials.username(), "alice");
    }

    #[test]
    fn test_bootstrap_skips_empty_store() {
        let registry = CredentialRegistry::in_memory();
        bootstrap_default_client(
            &config_with_default_client(),
            &MemoryStore::new(),
            &IdentityCodec,
            &registry,
        );
        assert!(registry.clients().is_empty());
    }

    struct ReverseCodec;

    impl SecretCodec for ReverseCodec {
        fn obscure(&self, value: &str) -> String {
            value.chars().rev().collect()
        }

        fn reveal(&self, value: &str) -> Result<String, String> {
            Ok(value.chars().rev().collect())
        }
    }

    #[test]
    fn test_bootstrap_keeps_store_secrets_obscured_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let clients_path = dir.path().join("clients.json");
        let codec: Arc<dyn SecretCodec> = Arc::new(ReverseCodec);

        let store = MemoryStore::new();
        store::set_username(&store, "alice").unwrap();
        store::set_password(&store, codec.as_ref(), "hunter2").unwrap();
        assert_eq!(store.get(store::PASSWORD_KEY).as_deref(), Some("2retnuh"));

        let registry = CredentialRegistry::load(&clients_path, codec.clone()).unwrap();
        bootstrap_default_client(&config_with_default_client(), &store, codec.as_ref(), &registry);

        let raw = std::fs::read_to_string(&clients_path).unwrap();
        assert!(!raw.contains("hunter2"));
        let credentials = registry.credentials_for("default").unwrap().unwrap();
        assert_eq!(credentials.password(), "hunter2");
    }
}
