//! Reusable server runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: storage, ledger recovery for
//! every venue, the REST API and graceful shutdown. The CLI shares
//! [`LedgerStorage`] and [`build_registry`] so that one-shot commands see
//! exactly the ledgers the server would.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::application::{
    create_event_bus, LedgerOptions, LedgerService, SharedEventBus, SharedVenueRegistry,
    VenueRegistry,
};
use crate::config::{AppConfig, StorageBackend, StorageConfig};
use crate::domain::LedgerRepository;
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::infrastructure::{
    connect_and_migrate, DatabaseConfig, FileLedgerRepository, MemoryLedgerRepository,
    SeaOrmLedgerRepository,
};
use crate::interfaces::http::middleware::AuthState;
use crate::interfaces::http::{create_api_router, AppState};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::shared::time::{SharedClock, SystemClock};

// ── Storage ────────────────────────────────────────────────────────

/// The configured ledger repository plus whatever connection backs it.
pub struct LedgerStorage {
    pub repo: Arc<dyn LedgerRepository>,
    db: Option<DatabaseConnection>,
}

impl LedgerStorage {
    pub async fn open(config: &StorageConfig) -> Result<Self, sea_orm::DbErr> {
        let storage = match config.backend {
            StorageBackend::File => {
                info!(dir = %config.data_dir.display(), "Using file storage");
                Self {
                    repo: Arc::new(FileLedgerRepository::new(&config.data_dir)),
                    db: None,
                }
            }
            StorageBackend::Sqlite => {
                let db = connect_and_migrate(&DatabaseConfig {
                    url: config.database_url.clone(),
                })
                .await?;
                Self {
                    repo: Arc::new(SeaOrmLedgerRepository::new(db.clone())),
                    db: Some(db),
                }
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage; ledgers are lost on exit");
                Self {
                    repo: Arc::new(MemoryLedgerRepository::new()),
                    db: None,
                }
            }
        };
        Ok(storage)
    }

    pub async fn close(self) {
        if let Some(db) = self.db {
            match db.close().await {
                Ok(()) => info!("Database connection closed"),
                Err(e) => warn!(error = %e, "Error closing database connection"),
            }
        }
    }
}

/// Load (or recover) the ledger of every configured venue.
pub async fn build_registry(
    config: &AppConfig,
    repo: Arc<dyn LedgerRepository>,
    clock: SharedClock,
    event_bus: SharedEventBus,
) -> VenueRegistry {
    let mut registry = VenueRegistry::new();
    for venue in &config.venues {
        let options = LedgerOptions {
            zone: config.clock.clone(),
            retry: config.storage.retry.clone(),
        };
        let service = LedgerService::load(
            venue.clone(),
            repo.clone(),
            clock.clone(),
            event_bus.clone(),
            options,
        )
        .await;
        registry.insert(service);
    }
    registry
}

/// The global recorder can be installed once per process; later starts
/// reuse the first handle.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Metrics recorder unavailable; /metrics disabled");
                None
            }
        })
        .clone()
}

// ── Options ────────────────────────────────────────────────────────

pub struct ServerOptions {
    pub config: AppConfig,
    /// Mount `/metrics` and install the Prometheus recorder (default: true).
    pub enable_metrics: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            enable_metrics: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running ledger server.
///
/// ```rust,no_run
/// use venue_ledger::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.run_until_shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub event_bus: SharedEventBus,
    pub registry: SharedVenueRegistry,
    pub config: AppConfig,
    /// Address the API is bound to
    pub local_addr: std::net::SocketAddr,

    storage: LedgerStorage,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// 1. Open storage (running migrations for SQLite)
    /// 2. Load or recover every venue ledger
    /// 3. Serve the REST API, Swagger UI and notification socket
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let config = opts.config;
        info!(venues = config.venues.len(), backend = %config.storage.backend, "Starting venue ledger");

        let prometheus = if opts.enable_metrics {
            prometheus_handle()
        } else {
            None
        };

        for user in &config.admin.users {
            if user.password_hash.is_none() {
                warn!(username = %user.username, "Operator uses a plaintext password; set password_hash instead");
            }
        }

        let storage = LedgerStorage::open(&config.storage).await?;
        let event_bus = create_event_bus();
        let clock: SharedClock = Arc::new(SystemClock);
        let registry: SharedVenueRegistry = Arc::new(
            build_registry(&config, storage.repo.clone(), clock, event_bus.clone()).await,
        );

        let jwt_config = JwtConfig::new(
            config.security.jwt_secret.clone(),
            config.security.jwt_expiration_hours,
        );
        let state = AppState {
            registry: registry.clone(),
            event_bus: event_bus.clone(),
            auth: AuthState {
                jwt_config,
                cookie_name: config.security.cookie_name.clone(),
            },
            users: Arc::new(config.admin.clone()),
            started_at: Arc::new(Instant::now()),
        };
        let router = create_api_router(state, prometheus, &config.server.cors_origins);

        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
        let listener = tokio::net::TcpListener::bind(config.api_address()).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "REST API listening");
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_shutdown = shutdown.signal();
        let api_task = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                api_shutdown.wait().await;
                info!("REST API received shutdown signal");
            });
            if let Err(e) = server.await {
                error!(error = %e, "REST API server error");
            }
        });

        Ok(Self {
            event_bus,
            registry,
            config,
            local_addr,
            storage,
            shutdown,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Trigger shutdown on SIGTERM / SIGINT.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Block until shutdown is triggered, then drain in-flight requests
    /// within the configured timeout and close storage.
    pub async fn run_until_shutdown(self) {
        let Self {
            shutdown,
            api_task,
            storage,
            registry,
            ..
        } = self;

        let drained = shutdown
            .shutdown_with_cleanup(|| async {
                match api_task.await {
                    Ok(()) => info!("REST API stopped"),
                    Err(e) => error!(error = %e, "REST API task panicked"),
                }
            })
            .await;

        for service in registry.all() {
            if !service.is_persisted() {
                warn!(venue = %service.venue().id, "Shutting down with unsaved ledger changes");
            }
        }
        if drained {
            storage.close().await;
        }
        info!("Venue ledger shutdown complete");
    }

    pub async fn shutdown(self) {
        self.trigger_shutdown();
        self.run_until_shutdown().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Initialize tracing from the logging config. `RUST_LOG` wins over
/// `logging.level`. Call once per process.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
