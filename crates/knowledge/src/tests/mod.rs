//! Scenario tests for the retrieval service.

mod answering;

use crate::config::RetrievalConfig;
use crate::rag::CompletionProvider;
use crate::service::RetrievalService;
use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// How a [`ScriptedCompletion`] responds.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    Reply(String),
    Fail(String),
    Stall(Duration),
}

/// In-memory completion provider that records every call.
pub(crate) struct ScriptedCompletion {
    script: Script,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub(crate) fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn replying(answer: &str) -> Arc<Self> {
        Self::new(Script::Reply(answer.to_string()))
    }

    /// Recorded `(context, question)` pairs.
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, context: &str, question: &str) -> AppResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((context.to_string(), question.to_string()));

        match &self.script {
            Script::Reply(answer) => Ok(answer.clone()),
            Script::Fail(reason) => Err(AppError::Other(reason.clone())),
            Script::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("too late".to_string())
            }
        }
    }
}

/// Scratch workspace with a documents folder and an isolated state directory.
pub(crate) struct Workspace {
    pub(crate) dir: TempDir,
}

impl Workspace {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub(crate) fn config(&self) -> RetrievalConfig {
        RetrievalConfig {
            state_dir: self.state_dir(),
            ..Default::default()
        }
    }

    pub(crate) fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub(crate) fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join("docs").join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub(crate) fn docs(&self) -> PathBuf {
        self.dir.path().join("docs")
    }

    pub(crate) fn open(&self, completion: Arc<ScriptedCompletion>) -> RetrievalService {
        self.open_with(self.config(), completion)
    }

    pub(crate) fn open_with(
        &self,
        config: RetrievalConfig,
        completion: Arc<ScriptedCompletion>,
    ) -> RetrievalService {
        RetrievalService::open(config, completion).unwrap()
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}
