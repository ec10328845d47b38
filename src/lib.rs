//! Payment integration mesh library.
//!
//! Exposes the core modules so both the binary and the test suite can
//! build an `AppState` against the same wiring.

pub mod api;
pub mod breaker;
pub mod config;
pub mod error;
pub mod kv;
pub mod latency;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod payment;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod scoring;
pub mod selector;
pub mod shedder;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<registry::Registry>,
    pub dispatcher: Arc<payment::Dispatcher>,
    pub state_store: Arc<payment::PaymentStateStore>,
    pub notify: Arc<notify::NotificationBus>,
    pub shedder: Arc<shedder::LoadShedder>,
    pub kv: Arc<dyn kv::KvStore>,
    pub config: Arc<config::Config>,
}
