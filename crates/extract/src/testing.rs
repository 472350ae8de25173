//! Scripted language model for tests in this and downstream crates.

use crate::llm::{GenerateOptions, LanguageModel, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Answers prompts from a script: the first rule whose needle occurs in the
/// prompt wins, then queued responses in order, then the default.
pub struct ScriptedModel {
    inner: Mutex<Script>,
    delay: Option<Duration>,
}

struct Script {
    rules: Vec<(String, Result<String, LlmError>)>,
    queue: VecDeque<Result<String, LlmError>>,
    default: Result<String, LlmError>,
    calls: Vec<String>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Script {
                rules: Vec::new(),
                queue: VecDeque::new(),
                default: Ok(String::new()),
                calls: Vec::new(),
            }),
            delay: None,
        }
    }

    pub fn with_default(self, response: impl Into<String>) -> Self {
        self.inner.lock().unwrap().default = Ok(response.into());
        self
    }

    pub fn with_default_error(self, error: LlmError) -> Self {
        self.inner.lock().unwrap().default = Err(error);
        self
    }

    pub fn on(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .rules
            .push((needle.into(), Ok(response.into())));
        self
    }

    pub fn fail_on(self, needle: impl Into<String>, error: LlmError) -> Self {
        self.inner.lock().unwrap().rules.push((needle.into(), Err(error)));
        self
    }

    pub fn then(self, response: impl Into<String>) -> Self {
        self.inner.lock().unwrap().queue.push_back(Ok(response.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
        let response = {
            let mut script = self.inner.lock().unwrap();
            script.calls.push(prompt.to_string());

            let matched = script
                .rules
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, response)| response.clone());

            match matched {
                Some(response) => response,
                None => match script.queue.pop_front() {
                    Some(response) => response,
                    None => script.default.clone(),
                },
            }
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        response
    }
}
