// Gateway application: wires the registry, governor, transports and admin API.

use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::admission::AdmissionGate;
use crate::config::{Config, ConfigTrait, Gateway, HostSettings};
use crate::controller;
use crate::credentials::{GatewayKeyRefresher, PlainKeyDecoder};
use crate::governor::{default_samplers, ResourceGovernor, TimerPool};
use crate::http::{AdminServer, Controller};
use crate::liveness;
use crate::registry::{ListenAddress, ServiceRegistry};
use crate::service::CassandraService;
use crate::shutdown::GracefulShutdown;
use crate::transport::{TcpTransport, TransportHandler};

/// Picks the interface the gateway listens on.
///
/// Loopback when `local_host_only`, every interface when `emulated`,
/// otherwise the configured node address.
pub fn listen_ip(gateway: &Gateway) -> Result<IpAddr> {
    if gateway.local_host_only {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    if gateway.emulated {
        return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    let address = gateway
        .address
        .as_deref()
        .context("gateway.address is required on a non-emulated node")?;
    address
        .parse()
        .with_context(|| format!("invalid gateway.address {:?}", address))
}

/// Encapsulates the entire gateway state.
pub struct App {
    shutdown_token: CancellationToken,
    timers: TimerPool,
    registry: Arc<ServiceRegistry>,
    governor: Option<Arc<ResourceGovernor>>,
    key_refresher: Arc<GatewayKeyRefresher>,
    transports: Vec<Arc<TcpTransport>>,
    server: Arc<AdminServer>,
    probe: Arc<liveness::Probe>,
    is_server_alive: AtomicBool,
}

impl App {
    /// Builds every component and binds the transports. Nothing runs until
    /// [`serve`](Self::serve).
    pub async fn new(
        shutdown_token: CancellationToken,
        cfg: Config,
        probe: Arc<liveness::Probe>,
    ) -> Result<Arc<Self>> {
        let timers = TimerPool::child_of(&shutdown_token);
        let gateway = cfg.gateway();

        let governor = cfg.governor().map(|_| {
            Arc::new(ResourceGovernor::new(
                default_samplers(),
                Arc::new(timers.clone()),
            ))
        });

        let gate = match (cfg.admission(), governor.as_ref()) {
            (Some(admission), Some(gov)) => AdmissionGate::from_config(gov.clone(), admission),
            (Some(_), None) => {
                warn!(
                    component = "app",
                    event = "admission_without_governor",
                    "admission is enabled but the governor is not, admitting everything"
                );
                AdmissionGate::open()
            }
            _ => AdmissionGate::open(),
        };
        let gate = Arc::new(gate);

        let key_refresher = Arc::new(GatewayKeyRefresher::new(
            Arc::new(HostSettings::new(gateway.settings.clone())),
            Arc::new(PlainKeyDecoder),
            Arc::new(timers.clone()),
            gateway.key_refresh_interval(),
        ));
        if let Err(e) = key_refresher.refresh() {
            if !gateway.local_emulator {
                return Err(e.context("initial compute gateway key refresh failed"));
            }
            warn!(
                component = "app",
                event = "key_unavailable",
                error = %format!("{:#}", e),
                "no compute gateway key, continuing in emulator mode"
            );
        }

        let mut registry = ServiceRegistry::new(gateway.local_emulator);
        let mut transports = Vec::new();

        if let Some(cassandra) = cfg.cassandra() {
            let ip = listen_ip(gateway)?;
            let transport = TcpTransport::bind(
                SocketAddr::new(ip, cassandra.port()),
                gate.clone(),
                shutdown_token.clone(),
            )
            .await?;

            if ip.is_unspecified() && !gateway.local_emulator {
                warn!(
                    component = "app",
                    event = "unspecified_bind",
                    addr = %transport.local_addr(),
                    "listening on every interface in multi-tenant mode, only configured templates will resolve"
                );
            }

            let mut addresses = vec![ListenAddress::scheme_and_port(
                transport.scheme(),
                transport.local_addr().to_string(),
            )];
            for raw in &cassandra.templates {
                addresses.push(
                    ListenAddress::template(raw)
                        .with_context(|| format!("invalid cassandra template {:?}", raw))?,
                );
            }

            let service = Arc::new(CassandraService::new(
                cassandra.backend.clone(),
                cassandra.connect_timeout,
            ));
            let outcome = registry
                .register(service, &addresses)
                .into_result()
                .context("failed to register the cassandra service")?;
            info!(
                component = "app",
                event = "service_registered",
                service = crate::service::cassandra::SERVICE_NAME,
                addr = %transport.local_addr(),
                templates = outcome.bound_templates,
                "service registered"
            );
            transports.push(Arc::new(transport));
        }

        let registry = Arc::new(registry);

        let controllers: Vec<Box<dyn Controller>> = vec![
            // Healthcheck probe endpoint
            Box::new(controller::LivenessProbeController::new(probe.clone())),
            // Metrics endpoint
            Box::new(controller::PrometheusMetricsController::new()),
            // Node health classification
            Box::new(controller::NodeHealthController::new(governor.clone())),
            // Registered URI templates by scheme
            Box::new(controller::RegisteredTemplatesController::new(registry.clone())),
        ];
        let server = Arc::new(AdminServer::new(shutdown_token.clone(), cfg.api(), controllers));

        Ok(Arc::new(Self {
            shutdown_token,
            timers,
            registry,
            governor,
            key_refresher,
            transports,
            server,
            probe,
            is_server_alive: AtomicBool::new(false),
        }))
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn governor(&self) -> Option<&Arc<ResourceGovernor>> {
        self.governor.as_ref()
    }

    pub fn transports(&self) -> &[Arc<TcpTransport>] {
        &self.transports
    }

    pub fn gateway_key(&self) -> Arc<String> {
        self.key_refresher.current_key()
    }

    /// Starts background loops, transports and the admin server.
    pub async fn serve(self: &Arc<Self>, gsh: &GracefulShutdown) -> Result<()> {
        self.probe
            .watch(vec![self.clone() as Arc<dyn liveness::Service>]);

        if let Some(ref gov) = self.governor {
            let handle = gov.start();
            gsh.spawn(async move {
                let _ = handle.await;
            });
        }

        let handle = self.key_refresher.start();
        gsh.spawn(async move {
            let _ = handle.await;
        });

        for transport in &self.transports {
            transport.open(self.registry.clone()).await?;
            let transport = transport.clone();
            gsh.spawn(async move { transport.closed().await });
        }

        let app = self.clone();
        gsh.spawn(async move {
            app.is_server_alive.store(true, Ordering::Relaxed);
            if let Err(e) = app.server.listen_and_serve().await {
                error!(
                    component = "app",
                    scope = "server",
                    event = "serve_failed",
                    error = %e,
                    "admin server failed to serve"
                );
            }
            app.is_server_alive.store(false, Ordering::Relaxed);
            app.close();
        });

        info!(
            component = "app",
            event = "started",
            transports = self.transports.len(),
            governor = self.governor.is_some(),
            "application lifecycle"
        );
        Ok(())
    }

    /// Checks whether the admin server and the background loops are still up.
    pub fn is_alive(&self) -> bool {
        if self.timers.is_disposed() {
            warn!(component = "app", scope = "timers", event = "disposed", "background loops are stopped");
            return false;
        }
        if !self.is_server_alive.load(Ordering::Relaxed) {
            warn!(
                component = "app",
                scope = "http_server",
                event = "gone_away",
                "http server has gone away"
            );
            return false;
        }
        true
    }

    /// Stops loops and transports and cancels the shared token.
    pub fn close(&self) {
        self.timers.dispose();
        for transport in &self.transports {
            transport.close();
        }
        self.shutdown_token.cancel();

        info!(component = "app", event = "stopped", "application lifecycle");
    }
}

#[async_trait::async_trait]
impl liveness::Service for App {
    fn name(&self) -> &str {
        "app"
    }

    async fn is_alive(&self) -> bool {
        App::is_alive(self)
    }
}
