//! The migration façade: one record, its collaborators, and the loop that
//! drives the state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cutover_common::retry::RetryConfig;
use cutover_common::Error;
use cutover_gateway::GatewayClient;
use cutover_link::ClusterLinkClient;

use crate::error::MigrationError;
use crate::record::{MigrationConfig, MigrationRecord};
use crate::state::{transition, MigrationEvent, MigrationPhase};
use crate::steps::{fence_gateway, initialize, Steps};
use crate::store::{save_with_retry, MigrationState, StateStore};

/// Inputs to [`Migration::execute`]
#[derive(Clone)]
pub struct ExecuteOptions {
    /// A partition with lag at or above this is not caught up
    pub lag_threshold: u64,
    /// Budget for the lag wait and for promotion completion
    pub max_wait: Duration,
    /// Cluster-link API key
    pub api_key: String,
    /// Cluster-link API secret
    pub api_secret: String,
}

impl ExecuteOptions {
    fn validate(&self) -> Result<(), MigrationError> {
        if self.max_wait.is_zero() {
            return Err(MigrationError::InvalidOptions(
                "max wait must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("lag_threshold", &self.lag_threshold)
            .field("max_wait", &self.max_wait)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// One migration and everything needed to move it forward.
///
/// Only [`initialize`](Self::initialize) and [`execute`](Self::execute)
/// advance the state; both persist after every transition.
pub struct Migration {
    record: MigrationRecord,
    state: MigrationState,
    store: Arc<dyn StateStore>,
    gateway: Arc<dyn GatewayClient>,
    link: Arc<dyn ClusterLinkClient>,
    steps: Steps,
    persist_retry: RetryConfig,
}

impl Migration {
    /// Start a new migration. Nothing is written until the first transition.
    pub fn new(
        config: MigrationConfig,
        gateway: Arc<dyn GatewayClient>,
        link: Arc<dyn ClusterLinkClient>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, MigrationError> {
        let state = store.load()?;
        if state.get(&config.migration_id).is_some() {
            return Err(MigrationError::AlreadyExists(config.migration_id));
        }

        Ok(Self {
            record: MigrationRecord::new(config),
            state,
            store,
            gateway,
            link,
            steps: Steps::default(),
            persist_retry: RetryConfig::default(),
        })
    }

    /// Resume a migration from the store, at its last persisted state
    pub fn load(
        migration_id: &str,
        gateway: Arc<dyn GatewayClient>,
        link: Arc<dyn ClusterLinkClient>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, MigrationError> {
        let state = store.load()?;
        let record = state
            .get(migration_id)
            .cloned()
            .ok_or_else(|| MigrationError::NotFound(migration_id.to_string()))?;

        debug!(migration = %migration_id, state = %record.current_state, "loaded migration");
        Ok(Self {
            record,
            state,
            store,
            gateway,
            link,
            steps: Steps::default(),
            persist_retry: RetryConfig::default(),
        })
    }

    /// Override polling tunables
    pub fn with_steps(mut self, steps: Steps) -> Self {
        self.steps = steps;
        self
    }

    /// Override the persistence retry schedule
    pub fn with_persist_retry(mut self, retry: RetryConfig) -> Self {
        self.persist_retry = retry;
        self
    }

    /// Migration id
    pub fn id(&self) -> &str {
        &self.record.migration_id
    }

    /// Current state
    pub fn current_state(&self) -> MigrationPhase {
        self.record.current_state
    }

    /// The record as it stands in memory
    pub fn record(&self) -> &MigrationRecord {
        &self.record
    }

    /// Supply cluster-link credentials (never persisted)
    pub fn set_credentials(&mut self, api_key: &str, api_secret: &str) {
        self.record
            .cluster_link_config
            .set_credentials(api_key, api_secret);
    }

    /// Run only the `initialize` transition
    pub async fn initialize(&mut self, cancel: &CancellationToken) -> Result<(), MigrationError> {
        self.fire(MigrationEvent::Initialize, None, cancel).await
    }

    /// Walk every remaining event in order.
    ///
    /// Events whose source state has already been passed are skipped, so a
    /// migration interrupted at any point resumes where it stopped.
    pub async fn execute(
        &mut self,
        cancel: &CancellationToken,
        options: &ExecuteOptions,
    ) -> Result<(), MigrationError> {
        options.validate()?;
        self.set_credentials(&options.api_key, &options.api_secret);

        info!(
            migration = %self.id(),
            state = %self.current_state(),
            lag_threshold = options.lag_threshold,
            max_wait_secs = options.max_wait.as_secs(),
            "executing migration"
        );

        for event in MigrationEvent::SEQUENCE {
            if !self.current_state().can(event) {
                debug!(migration = %self.id(), %event, state = %self.current_state(), "skipping event");
                continue;
            }
            self.fire(event, Some(options), cancel).await?;
        }

        info!(migration = %self.id(), state = %self.current_state(), "migration complete");
        Ok(())
    }

    async fn fire(
        &mut self,
        event: MigrationEvent,
        options: Option<&ExecuteOptions>,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let from = self.current_state();
        let to = transition(from, event).ok_or(MigrationError::InvalidTransition { from, event })?;

        debug!(migration = %self.id(), %event, %from, %to, "starting transition");

        if let Err(source) = self.leave(from, options, cancel).await {
            warn!(migration = %self.id(), %event, state = %from, error = %source, "transition cancelled");
            return Err(MigrationError::Step {
                step: event.step_name(),
                source,
            });
        }

        self.record.current_state = to;
        info!(migration = %self.id(), %event, %from, %to, "transition complete");

        self.persist().await
    }

    async fn leave(
        &mut self,
        from: MigrationPhase,
        options: Option<&ExecuteOptions>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let gateway = self.gateway.as_ref();
        let link = self.link.as_ref();
        let link_config = &self.record.cluster_link_config;

        match from {
            MigrationPhase::Uninitialized => {
                let snapshot = initialize(
                    gateway,
                    link,
                    &self.record.gateway_config,
                    link_config,
                    cancel,
                )
                .await?;
                self.record.cluster_link_config.topics = snapshot.topics;
                self.record.cluster_link_topics = snapshot.cluster_link_topics;
                self.record.cluster_link_configs = snapshot.cluster_link_configs;
                self.record.initial_gateway_yaml = snapshot.initial_gateway_yaml;
                Ok(())
            }
            MigrationPhase::Initialized => {
                let options = require(options)?;
                self.steps
                    .lag_monitor
                    .wait(
                        link,
                        link_config,
                        &link_config.topics,
                        options.lag_threshold,
                        options.max_wait,
                        cancel,
                    )
                    .await
            }
            MigrationPhase::LagsOk => {
                fence_gateway(gateway, &self.record.gateway_config, cancel).await
            }
            MigrationPhase::Fenced => {
                self.steps
                    .promotion
                    .run(link, link_config, &link_config.topics, cancel)
                    .await
            }
            MigrationPhase::Promoting => {
                let options = require(options)?;
                self.steps
                    .completion
                    .wait(link, link_config, &link_config.topics, options.max_wait, cancel)
                    .await
            }
            MigrationPhase::Promoted => {
                self.steps
                    .switchover
                    .run(gateway, &self.record.gateway_config, cancel)
                    .await
            }
            MigrationPhase::Switched => Err(Error::internal_with_context(
                "migration",
                "no step leaves the switched state",
            )),
        }
    }

    async fn persist(&mut self) -> Result<(), MigrationError> {
        self.state.upsert(self.record.clone());
        self.state.stamp();

        save_with_retry(self.store.as_ref(), &self.state, &self.persist_retry)
            .await
            .map_err(|e| {
                error!(
                    migration = %self.record.migration_id,
                    state = %self.record.current_state,
                    error = %e,
                    "state reached but not persisted, stopping"
                );
                MigrationError::Persistence {
                    migration_id: self.record.migration_id.clone(),
                    state: self.record.current_state,
                    message: e.to_string(),
                }
            })
    }
}

fn require(options: Option<&ExecuteOptions>) -> Result<&ExecuteOptions, Error> {
    options.ok_or_else(|| {
        Error::internal_with_context("migration", "this step only runs from execute")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        gateway_at, healthy_gateway, names, sample_config, FakeLink, MemoryStore, MockGateway,
    };
    use cutover_gateway::fixtures::fenced_gateway_yaml;
    use cutover_link::{MirrorStatus, MirrorTopic};

    fn options(max_wait: u64) -> ExecuteOptions {
        ExecuteOptions {
            lag_threshold: 1,
            max_wait: Duration::from_secs(max_wait),
            api_key: "exec-key".to_string(),
            api_secret: "exec-secret".to_string(),
        }
    }

    fn migration(gw: MockGateway, link: Arc<FakeLink>, store: Arc<MemoryStore>) -> Migration {
        Migration::new(sample_config(), Arc::new(gw), link, store)
            .unwrap()
            .with_persist_retry(RetryConfig::fast(2))
    }

    fn stored_at(phase: MigrationPhase) -> Arc<MemoryStore> {
        let mut record = MigrationRecord::new(sample_config());
        record.current_state = phase;
        let mut state = MigrationState::default();
        state.upsert(record);
        Arc::new(MemoryStore::with_state(state))
    }

    #[tokio::test(start_paused = true)]
    async fn execute_walks_every_state_and_persists_each() {
        // reads: initialize, fence, switchover; patches: fence, switchover
        let gw = healthy_gateway(3, 2, 1);
        let link = Arc::new(FakeLink::caught_up(&["orders", "payments"]));
        let store = Arc::new(MemoryStore::default());
        let mut m = migration(gw, link.clone(), store.clone());

        m.execute(&CancellationToken::new(), &options(60)).await.unwrap();

        assert_eq!(m.current_state(), MigrationPhase::Switched);
        assert_eq!(store.saved_phases(), MigrationPhase::ALL[1..].to_vec());
        assert_eq!(link.promoted(), vec![names(&["orders"])]);

        let saved = store.snapshot();
        let record = saved.get("migration-1").unwrap();
        assert_eq!(record.current_state, MigrationPhase::Switched);
        assert_eq!(record.cluster_link_topics, names(&["orders", "payments"]));
        assert!(record.initial_gateway_yaml.contains("passthrough"));
    }

    #[tokio::test]
    async fn re_executing_a_finished_migration_does_nothing() {
        let store = stored_at(MigrationPhase::Switched);
        let link = Arc::new(FakeLink::caught_up(&["orders"]));
        let mut m =
            Migration::load("migration-1", Arc::new(MockGateway::new()), link.clone(), store.clone())
                .unwrap();

        m.execute(&CancellationToken::new(), &options(60)).await.unwrap();

        assert_eq!(m.current_state(), MigrationPhase::Switched);
        assert!(store.saved_phases().is_empty());
        assert_eq!(link.lists(), 0);
    }

    #[tokio::test]
    async fn resume_runs_only_the_remaining_steps() {
        let store = stored_at(MigrationPhase::Promoted);
        let link = Arc::new(FakeLink::caught_up(&["orders"]));
        let mut m = Migration::load(
            "migration-1",
            Arc::new(gateway_at(&fenced_gateway_yaml(), 1, 1, 1)),
            link.clone(),
            store.clone(),
        )
        .unwrap();

        m.execute(&CancellationToken::new(), &options(60)).await.unwrap();

        assert_eq!(store.saved_phases(), vec![MigrationPhase::Switched]);
        assert_eq!(link.lists(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lag_timeout_names_the_step_and_keeps_state() {
        let gw = healthy_gateway(1, 0, 0);
        let link = Arc::new(FakeLink::new(vec![MirrorTopic::new(
            "orders",
            MirrorStatus::Active,
            &[500],
        )]));
        let store = Arc::new(MemoryStore::default());
        let mut m = migration(gw, link, store.clone());

        let err = m
            .execute(&CancellationToken::new(), &options(10))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("failed during checking lags:"));
        assert!(!err.is_fatal());
        assert_eq!(m.current_state(), MigrationPhase::Initialized);
        assert_eq!(store.saved_phases(), vec![MigrationPhase::Initialized]);
    }

    #[tokio::test]
    async fn missing_topic_fails_initialize_without_persisting() {
        let gw = healthy_gateway(1, 0, 0);
        let link = Arc::new(FakeLink::caught_up(&["orders", "payments"]));
        let store = Arc::new(MemoryStore::default());
        let mut config = sample_config();
        config.cluster_link.topics = names(&["orders", "refunds"]);
        let mut m = Migration::new(config, Arc::new(gw), link, store.clone()).unwrap();

        let err = m.initialize(&CancellationToken::new()).await.unwrap_err();

        assert!(err.to_string().contains("refunds"));
        assert_eq!(m.current_state(), MigrationPhase::Uninitialized);
        assert!(m.record().cluster_link_topics.is_empty());
        assert!(store.saved_phases().is_empty());
    }

    #[tokio::test]
    async fn initialize_records_topics() {
        let gw = healthy_gateway(1, 0, 0);
        let link = Arc::new(FakeLink::caught_up(&["orders", "payments"]));
        let store = Arc::new(MemoryStore::default());
        let mut m = migration(gw, link, store.clone());

        m.initialize(&CancellationToken::new()).await.unwrap();

        assert_eq!(m.current_state(), MigrationPhase::Initialized);
        assert_eq!(m.record().topics(), names(&["orders"]).as_slice());
        assert_eq!(m.record().cluster_link_topics, names(&["orders", "payments"]));
        assert_eq!(store.saved_phases(), vec![MigrationPhase::Initialized]);
    }

    #[tokio::test]
    async fn initialize_twice_is_an_invalid_transition() {
        let store = stored_at(MigrationPhase::Initialized);
        let mut m = Migration::load(
            "migration-1",
            Arc::new(MockGateway::new()),
            Arc::new(FakeLink::caught_up(&[])),
            store,
        )
        .unwrap();

        let err = m.initialize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn zero_max_wait_is_rejected_before_any_call() {
        let link = Arc::new(FakeLink::caught_up(&["orders"]));
        let store = Arc::new(MemoryStore::default());
        let mut m = migration(MockGateway::new(), link.clone(), store.clone());

        let err = m
            .execute(&CancellationToken::new(), &options(0))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidOptions(_)));
        assert_eq!(link.lists(), 0);
    }

    #[tokio::test]
    async fn unpersistable_transition_is_fatal() {
        let gw = healthy_gateway(1, 0, 0);
        let link = Arc::new(FakeLink::caught_up(&["orders"]));
        let store = Arc::new(MemoryStore::broken());
        let mut m = migration(gw, link, store);

        let err = m.initialize(&CancellationToken::new()).await.unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(
            err,
            MigrationError::Persistence { state: MigrationPhase::Initialized, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn paused_topic_stops_the_migration_before_switchover() {
        let store = stored_at(MigrationPhase::Fenced);
        let link = Arc::new(FakeLink::new(vec![MirrorTopic::new(
            "orders",
            MirrorStatus::Paused,
            &[0],
        )]));
        let mut gw = MockGateway::new();
        gw.expect_patch_gateway().never();
        gw.expect_wait_for_gateway_pods().never();
        let mut m = Migration::load("migration-1", Arc::new(gw), link.clone(), store.clone())
            .unwrap();

        let err = m
            .execute(&CancellationToken::new(), &options(60))
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("failed during waiting for promotion completion:"));
        assert!(err.to_string().contains("orders (PAUSED)"));
        assert_eq!(m.current_state(), MigrationPhase::Promoting);
        assert_eq!(store.saved_phases(), vec![MigrationPhase::Promoting]);
        assert!(link.promoted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_reported_as_such() {
        let store = stored_at(MigrationPhase::Fenced);
        let link = Arc::new(FakeLink::new(vec![MirrorTopic::new(
            "orders",
            MirrorStatus::Active,
            &[7],
        )]));
        let mut m = Migration::load("migration-1", Arc::new(MockGateway::new()), link, store.clone())
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        let err = m.execute(&cancel, &options(60)).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.to_string().starts_with("failed during promoting topics:"));
        assert_eq!(m.current_state(), MigrationPhase::Fenced);
        assert!(store.saved_phases().is_empty());
    }

    #[test]
    fn duplicate_and_unknown_ids_are_rejected() {
        let store = stored_at(MigrationPhase::Initialized);
        let dup = Migration::new(
            sample_config(),
            Arc::new(MockGateway::new()),
            Arc::new(FakeLink::caught_up(&[])),
            store.clone(),
        );
        assert!(matches!(dup, Err(MigrationError::AlreadyExists(_))));

        let missing = Migration::load(
            "nope",
            Arc::new(MockGateway::new()),
            Arc::new(FakeLink::caught_up(&[])),
            store,
        );
        assert!(matches!(missing, Err(MigrationError::NotFound(_))));
    }

    #[test]
    fn options_debug_hides_credentials() {
        let debug = format!("{:?}", options(5));
        assert!(!debug.contains("exec-secret"));
    }
}
