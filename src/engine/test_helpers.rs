//! Shared test helpers: a scripted provider and engine construction.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::{TempDir, tempdir};

use crate::config::Config;
use crate::engine::TaskEngine;
use crate::error::ProviderError;
use crate::notify::Subscription;
use crate::provider::{AssetStream, ProviderClient, RemoteStatus, SubmitJob};
use crate::types::{GenerationParams, NotificationKind, SubmitRequest, TaskId, TaskRecord};

/// One scripted answer to a status poll
#[derive(Clone, Debug)]
pub(crate) enum Step {
    Running,
    RunningWith(&'static str),
    Succeeded(Option<&'static str>),
    Failed(Option<&'static str>, Option<&'static str>),
    NotFound,
    Unreachable,
    Unconfigured,
    Panic,
}

impl Step {
    fn play(self) -> Result<RemoteStatus, ProviderError> {
        match self {
            Step::Running => Ok(RemoteStatus::Running { message: None }),
            Step::RunningWith(message) => Ok(RemoteStatus::Running {
                message: Some(message.to_string()),
            }),
            Step::Succeeded(url) => Ok(RemoteStatus::Succeeded {
                result_url: url.map(str::to_string),
            }),
            Step::Failed(code, message) => Ok(RemoteStatus::Failed {
                code: code.map(str::to_string),
                message: message.map(str::to_string),
            }),
            Step::NotFound => Ok(RemoteStatus::NotFound),
            Step::Unreachable => Err(ProviderError::Api {
                status: 503,
                code: None,
                message: "service unavailable".into(),
            }),
            Step::Unconfigured => Err(ProviderError::Unconfigured),
            Step::Panic => panic!("scripted panic"),
        }
    }
}

/// How a scripted asset download behaves
#[derive(Clone, Debug)]
pub(crate) enum Asset {
    Bytes(&'static [u8]),
    Missing,
    Hang,
}

/// In-memory provider following per-job scripts.
///
/// Each job's poll script is consumed front to back; the last step repeats. Jobs without
/// a script report running forever.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    assets: Mutex<HashMap<String, Asset>>,
    rejection: Mutex<Option<(u16, &'static str)>>,
    unconfigured: std::sync::atomic::AtomicBool,
    next_job: AtomicUsize,
    pub(crate) submits: AtomicUsize,
    polls: Mutex<HashMap<String, usize>>,
    pub(crate) fetches: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the job that the next submission will receive (`remote-1`, `remote-2`, ...)
    pub(crate) fn script(&self, remote_job_id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(remote_job_id.to_string(), steps.into());
    }

    pub(crate) fn asset(&self, url: &str, asset: Asset) {
        self.assets.lock().unwrap().insert(url.to_string(), asset);
    }

    pub(crate) fn reject_submissions(&self, status: u16, code: &'static str) {
        *self.rejection.lock().unwrap() = Some((status, code));
    }

    pub(crate) fn set_unconfigured(&self) {
        self.unconfigured.store(true, Ordering::SeqCst);
    }

    pub(crate) fn poll_count(&self, remote_job_id: &str) -> usize {
        self.polls
            .lock()
            .unwrap()
            .get(remote_job_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn submit(&self, _job: &SubmitJob) -> Result<String, ProviderError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.unconfigured.load(Ordering::SeqCst) {
            return Err(ProviderError::Unconfigured);
        }
        if let Some((status, code)) = *self.rejection.lock().unwrap() {
            return Err(ProviderError::Api {
                status,
                code: Some(code.to_string()),
                message: "rejected by script".into(),
            });
        }
        let n = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("remote-{n}"))
    }

    async fn poll(&self, remote_job_id: &str) -> Result<RemoteStatus, ProviderError> {
        *self
            .polls
            .lock()
            .unwrap()
            .entry(remote_job_id.to_string())
            .or_default() += 1;

        if self.unconfigured.load(Ordering::SeqCst) {
            return Err(ProviderError::Unconfigured);
        }

        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(remote_job_id) {
                Some(steps) if steps.len() > 1 => steps.pop_front(),
                Some(steps) => steps.front().cloned(),
                None => None,
            }
        };
        step.unwrap_or(Step::Running).play()
    }

    async fn fetch(&self, result_url: &str) -> Result<AssetStream, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let asset = self.assets.lock().unwrap().get(result_url).cloned();
        match asset {
            Some(Asset::Bytes(data)) => {
                // Two chunks, so writers see a real stream
                let (a, b) = data.split_at(data.len() / 2);
                Ok(futures::stream::iter(vec![
                    Ok(Bytes::from_static(a)),
                    Ok(Bytes::from_static(b)),
                ])
                .boxed())
            }
            Some(Asset::Hang) => Ok(futures::stream::pending::<Result<Bytes, ProviderError>>().boxed()),
            Some(Asset::Missing) | None => Err(ProviderError::Api {
                status: 404,
                code: None,
                message: "asset not found".into(),
            }),
        }
    }
}

/// Configuration rooted in a temp dir with fast polling
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = root.join("uploads");
    config.storage.output_dir = root.join("downloads");
    config.storage.tasks_file = root.join("tasks.json");
    config.polling.poll_interval = Duration::from_millis(10);
    config.provider.download_timeout = Duration::from_secs(5);
    config
}

/// Engine backed by `provider`, storing everything in a fresh temp dir.
/// The temp dir must be kept alive for the duration of the test.
pub(crate) async fn create_test_engine(provider: Arc<ScriptedProvider>) -> (TaskEngine, TempDir) {
    let temp_dir = tempdir().unwrap();
    let engine = create_engine_in(provider, temp_dir.path()).await;
    (engine, temp_dir)
}

/// Engine sharing an existing directory, e.g. to simulate a restart
pub(crate) async fn create_engine_in(
    provider: Arc<ScriptedProvider>,
    root: &std::path::Path,
) -> TaskEngine {
    TaskEngine::with_provider(test_config(root), provider)
        .await
        .unwrap()
}

/// Write a small PNG into the engine's upload directory
pub(crate) async fn stored_image(engine: &TaskEngine) -> PathBuf {
    engine
        .storage
        .save_upload("cat.png", SAMPLE_PNG)
        .await
        .unwrap()
}

pub(crate) async fn submit_default(engine: &TaskEngine) -> TaskId {
    let image_path = stored_image(engine).await;
    engine
        .submit(SubmitRequest {
            params: GenerationParams::default(),
            image_path,
        })
        .await
        .unwrap()
}

/// Wait until the task satisfies `done`, failing the test after five seconds
pub(crate) async fn wait_for<F>(engine: &TaskEngine, id: TaskId, done: F) -> TaskRecord
where
    F: Fn(&TaskRecord) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = engine.get_task(id).await.unwrap();
        if done(&task) {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting, last state: {task:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub(crate) async fn wait_for_terminal(engine: &TaskEngine, id: TaskId) -> TaskRecord {
    wait_for(engine, id, |task| task.status.is_terminal()).await
}

/// Wait until no poller is running
pub(crate) async fn wait_for_idle(engine: &TaskEngine) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while engine.active_pollers().await > 0 || !engine.pollers.lock().await.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "pollers still running");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Count `tasks_updated` events that arrive until the subscription goes quiet
pub(crate) async fn drain_updates(subscription: &mut Subscription) -> usize {
    let mut updates = 0;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(200), subscription.next()).await
    {
        if event.kind == NotificationKind::TasksUpdated {
            updates += 1;
        }
    }
    updates
}

/// Smallest valid PNG header; the provider never decodes it in tests
pub(crate) const SAMPLE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Result URL used by scripts
pub(crate) const VIDEO_URL: &str = "https://cdn.example.com/result/video.mp4";

/// Bytes served for [`VIDEO_URL`]
pub(crate) const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42-fake-video-payload";
