//! Process-scoped context.
//!
//! Built exactly once at boot and handed to the HTTP layer and to the
//! shutdown routine. Every subsystem lives here; nothing is looked up
//! through globals.

use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::deployment::DeploymentRegistry;
use crate::gateway::FunctionGateway;
use crate::lifecycle::shutdown::{Shutdown, TeardownReport};
use crate::lifecycle::startup::BootError;
use crate::observability::{LogSink, Telemetry};
use crate::subsystems::{
    DataStore, FunctionCatalog, NotificationListener, ObjectStorage, SessionStore, SocketHub,
    Subsystem, TimerRegistry,
};

const SOCKET_HUB_CAPACITY: usize = 256;

pub struct AppContext {
    pub config: GatewayConfig,
    pub client: reqwest::Client,
    pub data_store: Arc<DataStore>,
    pub session_store: Arc<SessionStore>,
    pub object_storage: Arc<ObjectStorage>,
    pub log_sink: Arc<LogSink>,
    pub function_catalog: Arc<FunctionCatalog>,
    pub socket_hub: Arc<SocketHub>,
    pub notifications: Arc<NotificationListener>,
    pub timers: Arc<TimerRegistry>,
    pub registry: Arc<DeploymentRegistry>,
    pub gateway: Arc<FunctionGateway>,
    pub telemetry: Telemetry,
    pub shutdown: Shutdown,
}

impl AppContext {
    /// Construct every subsystem, all still Uninitialized.
    pub fn new(config: GatewayConfig) -> Result<Arc<Self>, BootError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("function-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BootError::Client)?;

        let data_store = Arc::new(DataStore::new(config.storage.change_buffer));
        let session_store = Arc::new(SessionStore::new(Duration::from_secs(
            config.sessions.ttl_secs,
        )));
        let object_storage = Arc::new(ObjectStorage::new(&config.storage.object_root));
        let log_sink = Arc::new(LogSink::new(config.telemetry.sink_capacity));
        let function_catalog = Arc::new(FunctionCatalog::new(&config.deployment.functions_dir));
        let socket_hub = Arc::new(SocketHub::new(SOCKET_HUB_CAPACITY));
        let notifications = Arc::new(NotificationListener::new(
            Arc::clone(&data_store),
            Arc::clone(&socket_hub),
        ));
        let registry = Arc::new(DeploymentRegistry::new(&config.deployment));
        let gateway = Arc::new(FunctionGateway::new(registry.clone(), config.gateway.clone()));
        let telemetry = Telemetry::new(config.telemetry.excluded_paths.clone(), log_sink.clone());

        Ok(Arc::new(Self {
            config,
            client,
            data_store,
            session_store,
            object_storage,
            log_sink,
            function_catalog,
            socket_hub,
            notifications,
            timers: Arc::new(TimerRegistry::new()),
            registry,
            gateway,
            telemetry,
            shutdown: Shutdown::new(),
        }))
    }

    /// Subsystems that must be Ready before the listener accepts traffic,
    /// in initialization order.
    pub fn startup_subsystems(&self) -> Vec<Arc<dyn Subsystem>> {
        vec![
            self.data_store.clone(),
            self.session_store.clone(),
            self.object_storage.clone(),
            self.log_sink.clone(),
            self.function_catalog.clone(),
            self.socket_hub.clone(),
            self.notifications.clone(),
            self.timers.clone(),
        ]
    }

    /// Teardown order: the fixed four first, then the rest in reverse
    /// initialization order.
    pub fn teardown_order(&self) -> Vec<Arc<dyn Subsystem>> {
        vec![
            self.notifications.clone(),
            self.socket_hub.clone(),
            self.session_store.clone(),
            self.timers.clone(),
            self.function_catalog.clone(),
            self.log_sink.clone(),
            self.object_storage.clone(),
            self.data_store.clone(),
        ]
    }

    /// Run teardown once. Later calls return an empty report.
    pub async fn teardown(&self) -> TeardownReport {
        self.shutdown.run(self.teardown_order()).await
    }
}
