//! Scripted reasoning provider for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};

use super::provider::{Generation, ReasoningProvider};

/// Replays a fixed script of replies; the last entry repeats once the
/// script is exhausted.
pub(crate) struct ScriptedProvider {
    script: Vec<std::result::Result<String, String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub(crate) fn replying(content: impl Into<String>) -> Self {
        Self::new(vec![Ok(content.into())])
    }

    pub(crate) fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![Err(message.into())])
    }

    pub(crate) fn new(script: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            script,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<Generation> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = self
            .script
            .get(idx)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| Err("empty script".to_string()));

        step.map(Generation::new)
            .map_err(|message| Error::provider("scripted", message))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
