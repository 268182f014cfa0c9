//! Generation Orchestrator
//!
//! Resolves a plugin, records a `pending` history entry, submits the request
//! and, for job-based plugins, hands the job to the poller. Each run is its own
//! tokio task and the sole writer of its entry.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use genforge_core::{GenerationError, GenerationPlugin, HistoryEntry, Outcome, Transition};
use genforge_history::HistoryStore;
use genforge_logging::{redact_sensitive_data, GenerationEvent, GenerationEventLogger};
use genforge_plugins::PluginRegistry;
use genforge_poller::JobPoller;

type InFlight = Arc<Mutex<HashMap<Uuid, CancellationToken>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A run's slot in the in-flight map. The slot is freed on `release` or, if the
/// task unwinds or is aborted first, on drop.
struct InFlightGuard {
    in_flight: InFlight,
    id: Uuid,
}

impl InFlightGuard {
    fn register(in_flight: InFlight, id: Uuid, token: CancellationToken) -> Self {
        lock(&in_flight).insert(id, token);
        Self { in_flight, id }
    }

    /// Leave the in-flight map. Returns whether the run was cancelled before it left.
    ///
    /// `Orchestrator::cancel` fires the token under the same lock, so once this
    /// returns no later cancel can report success for the run.
    fn release(&self, token: &CancellationToken) -> bool {
        lock(&self.in_flight).remove(&self.id);
        token.is_cancelled()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<PluginRegistry>,
    history: Arc<HistoryStore>,
    poller: Arc<JobPoller>,
    in_flight: InFlight,
}

/// A started run: the `pending` snapshot plus the task that finalizes it.
pub struct RunHandle {
    entry: HistoryEntry,
    cancel: CancellationToken,
    task: JoinHandle<Result<HistoryEntry, GenerationError>>,
}

impl RunHandle {
    /// The entry as it was appended.
    pub fn entry(&self) -> &HistoryEntry {
        &self.entry
    }

    pub fn id(&self) -> Uuid {
        self.entry.id
    }

    /// Request forced cancellation of this run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to reach a terminal entry.
    ///
    /// Fails only when the entry could not be finalized, e.g. history was
    /// cleared while the run was in flight.
    pub async fn wait(self) -> Result<HistoryEntry, GenerationError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(GenerationError::Provider(format!("run task aborted: {e}"))),
        }
    }
}

impl Orchestrator {
    pub fn new(registry: Arc<PluginRegistry>, history: Arc<HistoryStore>, poller: JobPoller) -> Self {
        Self {
            registry,
            history,
            poller: Arc::new(poller),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Start a run. Must be called from within a tokio runtime.
    ///
    /// An unknown plugin id is returned to the caller and creates no entry;
    /// every later failure is recorded on the entry instead.
    pub fn run(&self, plugin_id: &str, request: serde_json::Value) -> Result<RunHandle, GenerationError> {
        let plugin = self.registry.get(plugin_id)?;

        let entry = HistoryEntry::pending(plugin.id(), request);
        self.history.append(entry.clone())?;

        let cancel = CancellationToken::new();
        let slot = InFlightGuard::register(self.in_flight.clone(), entry.id, cancel.clone());

        GenerationEventLogger::log_event(entry.id, plugin.id(), GenerationEvent::Submitted);
        info!(entry_id = %entry.id, plugin_id = %plugin.id(), "Run started");

        let this = self.clone();
        let task_entry = entry.clone();
        let task_cancel = cancel.clone();
        let task =
            tokio::spawn(async move { this.execute(plugin, task_entry, task_cancel, slot).await });

        Ok(RunHandle { entry, cancel, task })
    }

    /// Start a run and wait for its terminal entry.
    pub async fn run_to_completion(
        &self,
        plugin_id: &str,
        request: serde_json::Value,
    ) -> Result<HistoryEntry, GenerationError> {
        self.run(plugin_id, request)?.wait().await
    }

    /// Cancel an in-flight run. Returns `false` if the run is unknown or already finished.
    ///
    /// A `true` result means the entry will end `cancelled`, even when the plugin
    /// had already answered and the run was only waiting to be finalized.
    pub fn cancel(&self, entry_id: Uuid) -> bool {
        match lock(&self.in_flight).get(&entry_id) {
            Some(token) => {
                info!(entry_id = %entry_id, "Cancelling run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of runs that have not reached a terminal entry yet.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    async fn execute(
        &self,
        plugin: Arc<dyn GenerationPlugin>,
        entry: HistoryEntry,
        cancel: CancellationToken,
        slot: InFlightGuard,
    ) -> Result<HistoryEntry, GenerationError> {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.drive(plugin.as_ref(), &entry, &cancel))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref());
                warn!(entry_id = %entry.id, plugin_id = %entry.plugin_id, panic = %msg, "Plugin panicked");
                Err(GenerationError::Provider(format!("plugin panicked: {msg}")))
            });
        let outcome = if slot.release(&cancel) {
            Err(GenerationError::Cancelled)
        } else {
            outcome
        };

        let (transition, event) = match outcome {
            Ok(result) => (
                Transition::Succeed(result),
                GenerationEvent::Completed {
                    duration_ms: started.elapsed().as_millis() as u64,
                },
            ),
            Err(GenerationError::Cancelled) => (Transition::Cancel, GenerationEvent::Cancelled),
            Err(e) => {
                let detail = redact_sensitive_data(&e.to_string());
                let event = GenerationEvent::Failed {
                    error_kind: e.kind().to_string(),
                    error_msg: detail.clone(),
                };
                (Transition::Fail(detail), event)
            }
        };

        GenerationEventLogger::log_event(entry.id, &entry.plugin_id, event);
        let finalized = self.history.update(entry.id, transition);

        match finalized {
            Ok(done) => {
                info!(entry_id = %done.id, status = %done.status, "Run finished");
                Ok(done)
            }
            Err(e) => {
                // Typically the history was cleared mid-run.
                warn!(entry_id = %entry.id, error = %e, "Could not finalize history entry");
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        plugin: &dyn GenerationPlugin,
        entry: &HistoryEntry,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GenerationError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            outcome = plugin.submit(&entry.request) => outcome?,
        };

        match outcome {
            Outcome::Immediate(result) => {
                debug!(entry_id = %entry.id, "Plugin answered immediately");
                Ok(result)
            }
            Outcome::Pending(job) => {
                GenerationEventLogger::log_event(
                    entry.id,
                    &entry.plugin_id,
                    GenerationEvent::JobStarted {
                        job_id: job.external_id.clone(),
                    },
                );
                self.poller.poll(plugin, &job, cancel).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genforge_core::{EntryStatus, HistoryEvent, JobHandle, JobStatus};
    use genforge_poller::{PollPolicy, RecordingSleeper};
    use genforge_reasoning::providers::mock::MockProvider;
    use genforge_reasoning::{EngineConfig, SequentialEngine, SequentialThinkingPlugin};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    /// Answers synchronously, echoing the prompt into a fake image URL.
    struct InstantImages;

    #[async_trait]
    impl GenerationPlugin for InstantImages {
        fn id(&self) -> &str {
            "image-generation"
        }
        fn name(&self) -> &str {
            "Instant Images"
        }
        fn description(&self) -> &str {
            "test double"
        }
        fn request_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn submit(&self, request: &serde_json::Value) -> Result<Outcome, GenerationError> {
            let prompt = request["prompt"].as_str().unwrap_or_default();
            Ok(Outcome::Immediate(json!({"imageUrls": [format!("https://img/{prompt}.png")]})))
        }
    }

    /// Job-based plugin replaying scripted statuses, then `fallback` forever.
    struct ScriptedVideo {
        script: Mutex<VecDeque<JobStatus>>,
        fallback: JobStatus,
        polls: AtomicU32,
    }

    impl ScriptedVideo {
        fn new(script: Vec<JobStatus>, fallback: JobStatus) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                polls: AtomicU32::new(0),
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationPlugin for ScriptedVideo {
        fn id(&self) -> &str {
            "video-generation"
        }
        fn name(&self) -> &str {
            "Scripted Video"
        }
        fn description(&self) -> &str {
            "test double"
        }
        fn request_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn submit(&self, _request: &serde_json::Value) -> Result<Outcome, GenerationError> {
            Ok(Outcome::Pending(JobHandle::new("video-generation", "task_1")))
        }
        async fn poll_status(&self, _job: &JobHandle) -> Result<JobStatus, GenerationError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.fallback.clone()))
        }
    }

    struct Rejecting;

    #[async_trait]
    impl GenerationPlugin for Rejecting {
        fn id(&self) -> &str {
            "rejecting"
        }
        fn name(&self) -> &str {
            "Rejecting"
        }
        fn description(&self) -> &str {
            "test double"
        }
        fn request_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn submit(&self, _request: &serde_json::Value) -> Result<Outcome, GenerationError> {
            Err(GenerationError::Provider(
                "401 Unauthorized: Bearer sk-live-abcdefghijklmnopqrstu".into(),
            ))
        }
    }

    /// Panics inside `submit`, or inside `poll_status` once a job is pending.
    struct Exploding {
        in_poll: bool,
    }

    #[async_trait]
    impl GenerationPlugin for Exploding {
        fn id(&self) -> &str {
            "exploding"
        }
        fn name(&self) -> &str {
            "Exploding"
        }
        fn description(&self) -> &str {
            "test double"
        }
        fn request_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn submit(&self, _request: &serde_json::Value) -> Result<Outcome, GenerationError> {
            if self.in_poll {
                return Ok(Outcome::Pending(JobHandle::new("exploding", "task_9")));
            }
            panic!("renderer exploded");
        }
        async fn poll_status(&self, _job: &JobHandle) -> Result<JobStatus, GenerationError> {
            panic!("{} went away", "status endpoint");
        }
    }

    /// Answers, but cancels its own run through the orchestrator first.
    struct CancelledWhileAnswering {
        orch: OnceLock<Orchestrator>,
    }

    #[async_trait]
    impl GenerationPlugin for CancelledWhileAnswering {
        fn id(&self) -> &str {
            "late-cancel"
        }
        fn name(&self) -> &str {
            "Late Cancel"
        }
        fn description(&self) -> &str {
            "test double"
        }
        fn request_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn submit(&self, _request: &serde_json::Value) -> Result<Outcome, GenerationError> {
            let orch = self.orch.get().unwrap();
            let id = orch.history().list()[0].id;
            assert!(orch.cancel(id));
            Ok(Outcome::Immediate(json!({"text": "too late"})))
        }
    }

    fn orchestrator_with(
        plugins: Vec<Arc<dyn GenerationPlugin>>,
        poller: JobPoller,
    ) -> Orchestrator {
        let mut registry = PluginRegistry::new();
        for plugin in plugins {
            registry.register(plugin).unwrap();
        }
        Orchestrator::new(Arc::new(registry), Arc::new(HistoryStore::new()), poller)
    }

    fn recording_poller(max_attempts: u32) -> (JobPoller, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let poller = JobPoller::with_sleeper(PollPolicy::fixed(5_000, max_attempts), sleeper.clone());
        (poller, sleeper)
    }

    #[tokio::test]
    async fn immediate_plugin_goes_pending_then_success() {
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![Arc::new(InstantImages)], poller);
        let mut events = orch.history().subscribe();

        let handle = orch.run("image-generation", json!({"prompt": "cat"})).unwrap();
        assert_eq!(handle.entry().status, EntryStatus::Pending);
        let done = handle.wait().await.unwrap();

        assert_eq!(done.status, EntryStatus::Success);
        assert_eq!(done.result, Some(json!({"imageUrls": ["https://img/cat.png"]})));
        assert_eq!(done.request, json!({"prompt": "cat"}));

        let appended = events.recv().await.unwrap();
        assert!(matches!(appended, HistoryEvent::Appended { ref entry } if entry.status == EntryStatus::Pending));
        let transitioned = events.recv().await.unwrap();
        assert!(matches!(transitioned, HistoryEvent::Transitioned { ref entry } if entry.status == EntryStatus::Success));

        assert_eq!(orch.history().len(), 1);
        assert_eq!(orch.in_flight(), 0);
        assert!(!orch.cancel(done.id));
    }

    #[tokio::test]
    async fn job_plugin_succeeds_after_three_polls() {
        let video = Arc::new(ScriptedVideo::new(
            vec![
                JobStatus::Processing,
                JobStatus::Processing,
                JobStatus::Succeeded {
                    result: json!({"resultUrl": "https://x/y.mp4"}),
                },
            ],
            JobStatus::Processing,
        ));
        let (poller, sleeper) = recording_poller(10);
        let orch = orchestrator_with(vec![video.clone()], poller);

        let done = orch
            .run_to_completion("video-generation", json!({"sourceImageUrl": "https://x/a.png", "prompt": "pan"}))
            .await
            .unwrap();

        assert_eq!(done.status, EntryStatus::Success);
        assert_eq!(done.result.unwrap()["resultUrl"], "https://x/y.mp4");
        assert_eq!(video.polls(), 3);
        assert_eq!(sleeper.recorded().len(), 3);
    }

    #[tokio::test]
    async fn malformed_context_still_completes_with_empty_context() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_response(r#"{"reasoning": "short brief", "output": "Lead with the discount", "isFinal": true}"#),
        );
        let engine = SequentialEngine::new(provider.clone(), EngineConfig::default());
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![Arc::new(SequentialThinkingPlugin::new(engine))], poller);

        let done = orch
            .run_to_completion(
                "sequential-thinking",
                json!({"input": "Draft a promo angle", "context": "{not json", "maxSteps": 3}),
            )
            .await
            .unwrap();

        assert_eq!(done.status, EntryStatus::Success);
        let result = done.result.unwrap();
        assert_eq!(result["finalOutput"], "Lead with the discount");
        assert_eq!(result["metadata"]["totalSteps"], 1);
        assert!(!result["metadata"]["warnings"].as_array().unwrap().is_empty());
        assert!(!provider.prompts()[0].contains("Context:"));
    }

    #[tokio::test]
    async fn unknown_plugin_creates_no_entry() {
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![Arc::new(InstantImages)], poller);

        let err = orch.run("music-generation", json!({})).err().unwrap();

        assert_eq!(err, GenerationError::NotFound("music-generation".into()));
        assert!(orch.history().is_empty());
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test]
    async fn submit_error_is_recorded_redacted() {
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![Arc::new(Rejecting)], poller);

        let done = orch.run_to_completion("rejecting", json!({})).await.unwrap();

        assert_eq!(done.status, EntryStatus::Error);
        assert!(done.result.is_none());
        let error = done.error.unwrap();
        assert!(error.starts_with("provider error: 401 Unauthorized"));
        assert!(!error.contains("sk-live"));
    }

    #[tokio::test]
    async fn panic_in_submit_is_recorded_as_error() {
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![Arc::new(Exploding { in_poll: false })], poller);

        let handle = orch.run("exploding", json!({})).unwrap();
        let id = handle.id();
        let done = handle.wait().await.unwrap();

        assert_eq!(done.status, EntryStatus::Error);
        assert_eq!(
            done.error.as_deref(),
            Some("provider error: plugin panicked: renderer exploded")
        );
        assert_eq!(orch.history().get(id).unwrap().status, EntryStatus::Error);
        assert_eq!(orch.in_flight(), 0);
        assert!(!orch.cancel(id));
    }

    #[tokio::test]
    async fn panic_while_polling_is_recorded_as_error() {
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![Arc::new(Exploding { in_poll: true })], poller);

        let done = orch.run_to_completion("exploding", json!({})).await.unwrap();

        assert_eq!(done.status, EntryStatus::Error);
        assert_eq!(
            done.error.as_deref(),
            Some("provider error: plugin panicked: status endpoint went away")
        );
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancel_accepted_after_plugin_answered_still_cancels() {
        let plugin = Arc::new(CancelledWhileAnswering { orch: OnceLock::new() });
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![plugin.clone()], poller);
        plugin.orch.set(orch.clone()).ok().unwrap();

        let handle = orch.run("late-cancel", json!({})).unwrap();
        let id = handle.id();
        let done = handle.wait().await.unwrap();

        assert_eq!(done.status, EntryStatus::Cancelled);
        assert!(done.result.is_none());
        assert_eq!(orch.in_flight(), 0);
        assert!(!orch.cancel(id));
    }

    #[tokio::test]
    async fn job_that_never_finishes_times_out() {
        let video = Arc::new(ScriptedVideo::new(vec![], JobStatus::Processing));
        let (poller, _) = recording_poller(4);
        let orch = orchestrator_with(vec![video.clone()], poller);

        let done = orch.run_to_completion("video-generation", json!({})).await.unwrap();

        assert_eq!(done.status, EntryStatus::Error);
        assert_eq!(
            done.error.as_deref(),
            Some("job task_1 still processing after 4 poll attempts")
        );
        assert_eq!(video.polls(), 4);
    }

    #[tokio::test]
    async fn failed_job_is_recorded_as_error() {
        let video = Arc::new(ScriptedVideo::new(
            vec![JobStatus::Processing],
            JobStatus::Failed {
                error_detail: "content policy".into(),
            },
        ));
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![video.clone()], poller);

        let done = orch.run_to_completion("video-generation", json!({})).await.unwrap();

        assert_eq!(done.status, EntryStatus::Error);
        assert_eq!(done.error.as_deref(), Some("provider error: content policy"));
        assert_eq!(video.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_ends_cancelled_and_stops_polling() {
        let video = Arc::new(ScriptedVideo::new(vec![], JobStatus::Processing));
        let orch = orchestrator_with(
            vec![video.clone()],
            JobPoller::new(PollPolicy::fixed(5_000, 120)),
        );

        let handle = orch.run("video-generation", json!({})).unwrap();
        let id = handle.id();
        tokio::time::sleep(Duration::from_millis(12_000)).await;
        assert_eq!(video.polls(), 2);
        assert_eq!(orch.in_flight(), 1);

        assert!(orch.cancel(id));
        let done = handle.wait().await.unwrap();

        assert_eq!(done.status, EntryStatus::Cancelled);
        assert_eq!(done.error.as_deref(), Some("cancelled"));
        assert_eq!(orch.in_flight(), 0);
        assert!(!orch.cancel(id));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(video.polls(), 2);
        assert_eq!(orch.history().get(id).unwrap().status, EntryStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_history_mid_run_leaves_nothing_to_finalize() {
        let video = Arc::new(ScriptedVideo::new(vec![], JobStatus::Processing));
        let orch = orchestrator_with(vec![video], JobPoller::new(PollPolicy::fixed(5_000, 120)));

        let handle = orch.run("video-generation", json!({})).unwrap();
        let id = handle.id();
        tokio::time::sleep(Duration::from_millis(6_000)).await;
        orch.history().clear();
        handle.cancel();

        let err = handle.wait().await.unwrap_err();

        assert_eq!(err, GenerationError::EntryNotFound(id));
        assert!(orch.history().is_empty());
        assert_eq!(orch.in_flight(), 0);
    }

    #[tokio::test]
    async fn concurrent_runs_append_in_submission_order() {
        let video = Arc::new(ScriptedVideo::new(
            vec![],
            JobStatus::Succeeded {
                result: json!({"resultUrl": "https://x/v.mp4"}),
            },
        ));
        let (poller, _) = recording_poller(10);
        let orch = orchestrator_with(vec![Arc::new(InstantImages), video], poller);

        let handles = vec![
            orch.run("video-generation", json!({"n": 1})).unwrap(),
            orch.run("image-generation", json!({"prompt": "dog"})).unwrap(),
            orch.run("video-generation", json!({"n": 3})).unwrap(),
        ];
        let ids: Vec<Uuid> = handles.iter().map(RunHandle::id).collect();
        for handle in handles {
            assert_eq!(handle.wait().await.unwrap().status, EntryStatus::Success);
        }

        let listed: Vec<Uuid> = orch.history().list().iter().map(|e| e.id).collect();
        assert_eq!(listed, ids);
        assert_eq!(orch.in_flight(), 0);
    }
}
