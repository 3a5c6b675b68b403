use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{self, Action, Controller},
        reflector::ObjectRef,
        watcher,
    },
    ResourceExt,
};
use serde::Serialize;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

use crate::api::v1::workload::Workload;
use crate::controllers::client::{KubeWorkloadClient, WorkloadClient};
use crate::controllers::workload::reconcile_workload;
use crate::util::config::OperatorConfig;
use crate::util::errors::{Error, Result};
use crate::util::metrics::Metrics;
use crate::util::reference::TypeRegistry;

/// Backoff before retrying a failed reconciliation
pub const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    pub fn new(config: &OperatorConfig) -> Self {
        let diagnostics = Diagnostics {
            cluster_name: config.cluster_name.clone(),
            namespace: config.namespace.clone().unwrap_or_default(),
            ..Default::default()
        };
        Self {
            diagnostics: Arc::new(RwLock::new(diagnostics)),
            registry: prometheus::Registry::default(),
        }
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(
        &self,
        client: Arc<dyn WorkloadClient>,
        kinds: TypeRegistry,
        resync_period: Duration,
    ) -> std::result::Result<Arc<Context>, prometheus::Error> {
        Ok(Arc::new(Context {
            client,
            kinds,
            resync_period,
            metrics: Metrics::default().register(&self.registry)?,
            diagnostics: self.diagnostics.clone(),
        }))
    }
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Cluster access
    pub client: Arc<dyn WorkloadClient>,
    /// Kinds that references and owner references can be made for
    pub kinds: TypeRegistry,
    /// Requeue interval after a successful reconcile
    pub resync_period: Duration,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
}

impl Context {
    #[cfg(test)]
    pub fn for_testing(client: Arc<dyn WorkloadClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            kinds: TypeRegistry::new(),
            resync_period: Duration::from_secs(3600),
            diagnostics: Default::default(),
            metrics: Metrics::default(),
        })
    }
}

#[instrument(skip(ctx, workload), fields(namespace, name))]
pub async fn reconcile(workload: Arc<Workload>, ctx: Arc<Context>) -> Result<Action> {
    let key = ObjectRef::from_obj(workload.as_ref());
    Span::current().record("namespace", field::display(key.namespace.as_deref().unwrap_or_default()));
    Span::current().record("name", field::display(&key.name));

    let _timer = ctx.metrics.count_and_measure("workload");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let action = reconcile_workload(&key, &ctx).await?;

    // The engine never schedules itself; periodic resync is layered on here
    if action == Action::await_change() {
        Ok(Action::requeue(ctx.resync_period))
    } else {
        Ok(action)
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    pub cluster_name: String,
    pub namespace: String,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            cluster_name: String::new(),
            namespace: String::new(),
        }
    }
}

fn error_policy(workload: Arc<Workload>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(workload = %workload.name_any(), "reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&workload, error);
    Action::requeue(ERROR_REQUEUE)
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, config: OperatorConfig) -> anyhow::Result<()> {
    let client = Client::try_default().await?;

    let (workloads, service_accounts) = match config.watch_namespace.as_deref() {
        Some(ns) => (
            Api::<Workload>::namespaced(client.clone(), ns),
            Api::<ServiceAccount>::namespaced(client.clone(), ns),
        ),
        None => (
            Api::<Workload>::all(client.clone()),
            Api::<ServiceAccount>::all(client.clone()),
        ),
    };

    if let Err(e) = workloads.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        return Err(e.into());
    }

    let ctx = state.to_context(
        Arc::new(KubeWorkloadClient::new(client)),
        TypeRegistry::new(),
        Duration::from_secs(config.controller.resync_period_seconds),
    )?;

    Controller::new(workloads, watcher::Config::default().any_semantic())
        .owns(service_accounts, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(config.controller.concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}
