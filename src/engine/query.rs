//! Read access to tasks and their assets.

use std::path::PathBuf;

use super::TaskEngine;
use crate::error::{Error, Result, StoreError};
use crate::types::{TaskId, TaskRecord, TaskStatus};

/// Which asset of a task to preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// The uploaded source image
    Input,
    /// The generated video
    Output,
}

impl AssetKind {
    /// Name used in routes and error details
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Input => "input",
            AssetKind::Output => "output",
        }
    }
}

impl std::str::FromStr for AssetKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "input" => Ok(AssetKind::Input),
            "output" => Ok(AssetKind::Output),
            _ => Err(()),
        }
    }
}

impl TaskEngine {
    /// Current state of one task
    pub async fn get_task(&self, id: TaskId) -> Result<TaskRecord> {
        self.store.get(&id).await.map_err(|e| match e {
            StoreError::NotFound(id) => Error::TaskNotFound(id),
            other => other.into(),
        })
    }

    /// All tasks, newest first
    pub async fn list_tasks(&self) -> Vec<TaskRecord> {
        self.store.list().await
    }

    /// Local path of a finished task's video.
    ///
    /// If the local copy is missing but the provider's URL is known, the video is
    /// retrieved again before returning.
    pub async fn fetch_result_asset(&self, id: TaskId) -> Result<PathBuf> {
        let task = self.get_task(id).await?;
        if task.status != TaskStatus::Succeeded {
            return Err(Error::TaskNotReady {
                id,
                status: task.status.to_string(),
            });
        }

        if let Some(path) = task.output_asset_path.as_ref()
            && file_exists(path).await
        {
            return Ok(path.clone());
        }

        let Some(url) = task.result_asset_url else {
            return Err(Error::AssetMissing {
                id,
                what: AssetKind::Output.as_str().to_string(),
            });
        };

        tracing::info!(task_id = %id, "Local result missing, retrieving again");
        let path = self.retrieve_asset(id, &url).await?;
        let stored = path.clone();
        self.store
            .update(&id, move |task| task.output_asset_path = Some(stored))
            .await?;
        self.commit(id).await;
        Ok(path)
    }

    /// Local path of a task's input image or output video, for previews
    pub async fn asset_path(&self, id: TaskId, kind: AssetKind) -> Result<PathBuf> {
        let task = self.get_task(id).await?;
        let path = match kind {
            AssetKind::Input => Some(task.input_asset_path),
            AssetKind::Output => task.output_asset_path,
        };

        match path {
            Some(path) if file_exists(&path).await => Ok(path),
            _ => Err(Error::AssetMissing {
                id,
                what: kind.as_str().to_string(),
            }),
        }
    }
}

async fn file_exists(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
