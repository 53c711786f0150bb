//! Orchestrator assembly.
//!
//! Wires the services and loops around one shared active set.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::application::active_set::ActiveSet;
use crate::application::admission::AdmissionController;
use crate::application::completion_handler::CompletionHandler;
use crate::application::monitor_loop::MonitorLoop;
use crate::application::stop_signal::StopSignal;
use crate::domain::errors::StoreError;
use crate::domain::models::Config;
use crate::domain::ports::{
    CodeHost, CompletionHook, ExecutionBackend, IssueTracker, TaskStore, WorkspaceManager,
};
use crate::services::{BacklogRanker, CapacityManager, LaunchSettings, TaskLauncher};

/// Every external collaborator the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub tracker: Arc<dyn IssueTracker>,
    pub code_host: Arc<dyn CodeHost>,
    pub workspace: Arc<dyn WorkspaceManager>,
    pub executor: Arc<dyn ExecutionBackend>,
    pub store: Arc<dyn TaskStore>,
    pub hooks: Vec<Arc<dyn CompletionHook>>,
}

pub struct Orchestrator {
    registry: Arc<Mutex<ActiveSet>>,
    monitor: MonitorLoop,
    admission: AdmissionController,
}

impl Orchestrator {
    /// Build the orchestrator, rebuilding the active set from the store.
    pub async fn assemble(config: &Config, collaborators: Collaborators) -> Result<Self, StoreError> {
        let Collaborators {
            tracker,
            code_host,
            workspace,
            executor,
            store,
            hooks,
        } = collaborators;

        let registry = Arc::new(Mutex::new(ActiveSet::load(Arc::clone(&store)).await?));

        let completion = Arc::new(
            CompletionHandler::new(Arc::clone(&workspace), Arc::clone(&executor), Arc::clone(&store))
                .with_tracker(Arc::clone(&tracker))
                .with_hooks(hooks),
        );

        let launcher = Arc::new(
            TaskLauncher::new(
                workspace,
                Arc::clone(&executor),
                Arc::clone(&store),
                LaunchSettings::from(config),
            )
            .with_code_host(Arc::clone(&code_host)),
        );

        let admission = AdmissionController::new(
            tracker,
            BacklogRanker::new(config.ranking.clone()),
            launcher,
            CapacityManager::new(config),
            Arc::clone(&registry),
            config.project.clone(),
        );

        let monitor = MonitorLoop::new(
            Arc::clone(&registry),
            code_host,
            executor,
            store,
            completion,
            config.monitor.clone(),
        );

        Ok(Self {
            registry,
            monitor,
            admission,
        })
    }

    pub fn registry(&self) -> Arc<Mutex<ActiveSet>> {
        Arc::clone(&self.registry)
    }

    pub fn monitor(&self) -> &MonitorLoop {
        &self.monitor
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Reconcile and admit until stopped.
    pub async fn run(&self, stop: &StopSignal) -> u64 {
        info!(active = self.registry.lock().await.len(), "Orchestrator starting");
        self.monitor.run(stop, Some(&self.admission)).await
    }

    /// Reconcile only; no new tasks are launched.
    pub async fn monitor_only(&self, stop: &StopSignal) -> u64 {
        info!(active = self.registry.lock().await.len(), "Monitoring without admission");
        self.monitor.run(stop, None).await
    }
}
