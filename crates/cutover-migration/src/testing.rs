//! Test doubles for the gateway, the cluster link and the state store.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use tokio_util::sync::CancellationToken;

use cutover_common::Error;
use cutover_gateway::{GatewayClient, GatewayConfig, PodWait};
use cutover_link::{
    ClusterLinkClient, ClusterLinkConfig, MirrorStatus, MirrorTopic, PromoteResponse,
    PromoteResult,
};

use crate::record::MigrationConfig;
use crate::state::MigrationPhase;
use crate::store::{MigrationState, StateStore};
use crate::MigrationError;

pub use cutover_gateway::fixtures::{gateway_config, GATEWAY_YAML};

pub fn link_config(topics: &[&str]) -> ClusterLinkConfig {
    ClusterLinkConfig {
        cluster_id: "lkc-123".to_string(),
        rest_endpoint: "https://pkc-abc.us-east-1.aws.confluent.cloud".to_string(),
        link_name: "msk-to-cc".to_string(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        api_key: "test-key".to_string(),
        api_secret: "test-secret".to_string(),
    }
}

pub fn sample_config() -> MigrationConfig {
    MigrationConfig {
        migration_id: "migration-1".to_string(),
        gateway: gateway_config(),
        cluster_link: link_config(&["orders"]),
    }
}

pub fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl GatewayClient for Gateway {
        async fn check_permissions(
            &self,
            verb: &str,
            resource: &str,
            group: &str,
            namespace: &str,
        ) -> Result<bool, Error>;
        async fn get_gateway_yaml(&self, namespace: &str, name: &str) -> Result<Vec<u8>, Error>;
        fn validate_gateway(&self, yaml: &[u8], config: &GatewayConfig) -> Result<(), Error>;
        async fn patch_gateway(
            &self,
            namespace: &str,
            name: &str,
            patch: &json_patch::Patch,
        ) -> Result<(), Error>;
        async fn wait_for_gateway_pods(
            &self,
            namespace: &str,
            name: &str,
            wait: PodWait,
            poll_interval: Duration,
            timeout: Duration,
            cancel: &CancellationToken,
        ) -> Result<(), Error>;
    }
}

/// A gateway that accepts everything, starting from [`GATEWAY_YAML`].
/// Each count bounds how often the corresponding call may happen.
pub fn healthy_gateway(reads: usize, patches: usize, pod_waits: usize) -> MockGateway {
    gateway_at(GATEWAY_YAML, reads, patches, pod_waits)
}

/// Like [`healthy_gateway`], starting from `yaml`. Patches are applied to the
/// stored resource, so later reads see them.
pub fn gateway_at(yaml: &str, reads: usize, patches: usize, pod_waits: usize) -> MockGateway {
    let doc: serde_json::Value = serde_yaml::from_str(yaml).unwrap();
    let doc = Arc::new(Mutex::new(doc));
    let reader = doc.clone();

    let mut gw = MockGateway::new();
    gw.expect_check_permissions()
        .returning(|_, _, _, _| Ok(true));
    gw.expect_get_gateway_yaml()
        .times(reads)
        .returning(move |_, _| {
            let yaml = serde_yaml::to_string(&*reader.lock().unwrap()).unwrap();
            Ok(yaml.into_bytes())
        });
    gw.expect_validate_gateway()
        .returning(|yaml, config| cutover_gateway::validate_gateway(yaml, config));
    gw.expect_patch_gateway()
        .times(patches)
        .returning(move |_, _, patch| {
            let mut doc = doc.lock().unwrap();
            json_patch::patch(&mut doc, patch)
                .map_err(|e| Error::validation(format!("patch rejected: {e}")))
        });
    gw.expect_wait_for_gateway_pods()
        .times(pod_waits)
        .returning(|_, _, _, _, _, _| Ok(()));
    gw
}

/// Cluster link double.
///
/// Lists come from the script first; once it's exhausted the live topic set
/// is returned. Promoting a topic moves it to `PENDING_STOPPED`, and the
/// next list after that reports it `STOPPED`.
pub struct FakeLink {
    script: Mutex<VecDeque<Vec<MirrorTopic>>>,
    live: Mutex<Vec<MirrorTopic>>,
    configs: BTreeMap<String, String>,
    list_failures: AtomicUsize,
    promote_rejections: Mutex<HashMap<String, usize>>,
    pub list_calls: AtomicUsize,
    pub promotions: Mutex<Vec<Vec<String>>>,
}

impl FakeLink {
    pub fn new(topics: Vec<MirrorTopic>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            live: Mutex::new(topics),
            configs: BTreeMap::from([(
                "consumer.offset.sync.enable".to_string(),
                "true".to_string(),
            )]),
            list_failures: AtomicUsize::new(0),
            promote_rejections: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            promotions: Mutex::new(Vec::new()),
        }
    }

    /// Active, caught-up mirrors with these names
    pub fn caught_up(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|n| MirrorTopic::new(*n, MirrorStatus::Active, &[0, 0]))
                .collect(),
        )
    }

    pub fn then_list(self, topics: Vec<MirrorTopic>) -> Self {
        self.script.lock().unwrap().push_back(topics);
        self
    }

    pub fn failing_lists(self, n: usize) -> Self {
        self.list_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn rejecting_promotion(self, topic: &str, times: usize) -> Self {
        self.promote_rejections
            .lock()
            .unwrap()
            .insert(topic.to_string(), times);
        self
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn promoted(&self) -> Vec<Vec<String>> {
        self.promotions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterLinkClient for FakeLink {
    async fn list_mirror_topics(
        &self,
        _config: &ClusterLinkConfig,
    ) -> Result<Vec<MirrorTopic>, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if self.list_failures.load(Ordering::SeqCst) > 0 {
            self.list_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::http_status("mirrors", 503, "service unavailable"));
        }

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return Ok(scripted);
        }

        let mut live = self.live.lock().unwrap();
        let snapshot = live.clone();
        for topic in live.iter_mut() {
            if topic.status == MirrorStatus::PendingStopped {
                topic.status = MirrorStatus::Stopped;
            }
        }
        Ok(snapshot)
    }

    async fn list_configs(
        &self,
        _config: &ClusterLinkConfig,
    ) -> Result<BTreeMap<String, String>, Error> {
        Ok(self.configs.clone())
    }

    async fn promote_mirror_topics(
        &self,
        _config: &ClusterLinkConfig,
        topics: &[String],
    ) -> Result<PromoteResponse, Error> {
        self.promotions.lock().unwrap().push(topics.to_vec());

        let mut rejections = self.promote_rejections.lock().unwrap();
        let mut live = self.live.lock().unwrap();
        let mut results = Vec::new();
        for name in topics {
            let rejected = match rejections.get_mut(name) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            };
            if rejected {
                results.push(PromoteResult {
                    topic: name.clone(),
                    error_code: 40002,
                    error_message: Some("mirror topic is not caught up".to_string()),
                });
                continue;
            }
            if let Some(t) = live.iter_mut().find(|t| &t.name == name) {
                t.status = MirrorStatus::PendingStopped;
            }
            results.push(PromoteResult {
                topic: name.clone(),
                error_code: 0,
                error_message: None,
            });
        }
        Ok(PromoteResponse { results })
    }
}

/// In-memory store that records every save
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MigrationState>,
    saved: Mutex<Vec<MigrationPhase>>,
    broken: AtomicBool,
}

impl MemoryStore {
    pub fn with_state(state: MigrationState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Default::default()
        }
    }

    pub fn broken() -> Self {
        let store = Self::default();
        store.broken.store(true, Ordering::SeqCst);
        store
    }

    /// State of the first migration after each save
    pub fn saved_phases(&self) -> Vec<MigrationPhase> {
        self.saved.lock().unwrap().clone()
    }

    pub fn snapshot(&self) -> MigrationState {
        self.state.lock().unwrap().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<MigrationState, MigrationError> {
        Ok(self.state.lock().unwrap().clone())
    }

    fn save(&self, state: &MigrationState) -> Result<(), MigrationError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(MigrationError::store("memory", "read-only file system"));
        }
        if let Some(first) = state.migrations.first() {
            self.saved.lock().unwrap().push(first.current_state);
        }
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }
}
