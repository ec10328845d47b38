//! Payment integration mesh entry point.

use anyhow::Result;
use axum::routing::{delete, get, post};
use axum::Router;
use payment_mesh::config::Config;
use payment_mesh::kv::{InMemoryKvStore, KvStore, RedisKvStore};
use payment_mesh::notify::NotificationBus;
use payment_mesh::payment::{Dispatcher, PaymentStateStore};
use payment_mesh::providers::{MockComplianceProvider, MockProvider, PaymentProvider};
use payment_mesh::breaker::BreakerConfig as RegistryBreakerConfig;
use payment_mesh::registry::{Capabilities, PriorityTier, Registry};
use payment_mesh::scoring::ScoringConfig;
use payment_mesh::selector::{Selector, Strategy};
use payment_mesh::shedder::{LoadShedder, ShedderConfig};
use payment_mesh::{api, middleware, notify, payment, retry, AppState};
use dotenv::dotenv;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn breaker_config(cfg: &Config) -> RegistryBreakerConfig {
    RegistryBreakerConfig {
        failure_threshold: cfg.breaker_failure_threshold,
        rate_threshold: cfg.breaker_rate_threshold,
        window: Duration::from_secs(cfg.breaker_window_secs),
        cooldown: Duration::from_secs(cfg.breaker_cooldown_secs),
        half_open_max_requests: cfg.breaker_half_open_max_requests,
    }
}

fn default_capabilities() -> Capabilities {
    Capabilities {
        min_amount: 50,
        max_amount: 5_000_000,
        currencies: vec!["USD".into(), "EUR".into(), "GBP".into()],
        supports_refund: true,
        supports_bnpl: false,
        is_compliance: false,
    }
}

async fn build_state(config: Config) -> Result<AppState> {
    let scoring_config = ScoringConfig::default();
    let registry = Arc::new(Registry::new(
        breaker_config(&config),
        scoring_config,
        config.latency_window_capacity,
    ));

    registry.register("acme-pay", PriorityTier::Primary, default_capabilities())?;
    registry.register("globex-pay", PriorityTier::Secondary, default_capabilities())?;
    registry.register("initech-bnpl", PriorityTier::Tertiary, {
        let mut caps = default_capabilities();
        caps.supports_bnpl = true;
        caps
    })?;
    registry.register_compliance("kyc-gateway", {
        let mut caps = default_capabilities();
        caps.is_compliance = true;
        caps
    })?;

    let mut clients: HashMap<String, Arc<dyn PaymentProvider>> = HashMap::new();
    clients.insert("acme-pay".into(), Arc::new(MockProvider::new("acme-pay")));
    clients.insert("globex-pay".into(), Arc::new(MockProvider::new("globex-pay")));
    clients.insert(
        "initech-bnpl".into(),
        Arc::new(MockProvider::new("initech-bnpl")),
    );

    let kv: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => {
            info!("connecting to redis at {url}");
            Arc::new(RedisKvStore::connect(url).await?)
        }
        None => {
            info!("no REDIS_URL configured, using in-memory key-value store");
            Arc::new(InMemoryKvStore::new())
        }
    };

    let selector = Arc::new(Selector::new(
        Strategy::parse(&config.selector_strategy),
        Duration::from_secs(config.affinity_ttl_secs),
    ));

    let state_store = Arc::new(PaymentStateStore::new());
    let notify_bus = Arc::new(NotificationBus::new());

    let dispatcher = Arc::new(Dispatcher {
        registry: registry.clone(),
        selector,
        state_store: state_store.clone(),
        notify: notify_bus.clone(),
        kv: kv.clone(),
        providers: clients,
        compliance_provider: Some(Arc::new(MockComplianceProvider::new("kyc-gateway"))),
        retry_config: retry::RetryConfig {
            max_attempts: config.retry_max_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter_factor: config.retry_jitter_factor,
        },
        compliance_threshold: config.compliance_threshold_minor_units,
        dispatch_deadline: Duration::from_secs(config.dispatch_deadline_secs),
        result_cache_ttl: Duration::from_secs(config.result_cache_ttl_secs),
    });

    let shedder = Arc::new(LoadShedder::new(ShedderConfig {
        max_active: config.shed_max_active,
        latency_threshold_ms: config.shed_latency_threshold_ms,
        cpu_threshold_pct: config.shed_cpu_threshold_pct,
        circuit_open_threshold: config.shed_circuit_open_threshold,
    }));

    Ok(AppState {
        registry,
        dispatcher,
        state_store,
        notify: notify_bus,
        shedder,
        kv,
        config: Arc::new(config),
    })
}

fn spawn_scoring_task(state: AppState) {
    let period = Duration::from_secs(state.config.score_update_period_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            state.registry.refresh_scores();
        }
    });
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/paymentKey", post(api::routes::create_payment_key))
        .route("/paymentKey", delete(api::routes::delete_payment_key))
        .route("/payment", post(api::routes::charge))
        .route("/metrics", get(api::routes::metrics_json))
        .route("/metrics/prometheus", get(api::routes::metrics_prometheus))
        .route("/health", get(api::routes::health_check))
        .route("/ws", get(api::ws::websocket_handler))
        .layer(axum::middleware::from_fn(middleware::request_logging_simple))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let port = config.port;
    let state = build_state(config).await?;

    spawn_scoring_task(state.clone());

    let router = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("payment mesh listening on {addr}");

    axum::serve(listener, router).await?;
    Ok(())
}
