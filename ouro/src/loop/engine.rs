//! LoopEngine - drives the self-improvement iterations

use std::path::PathBuf;

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use crate::chat::ChatSession;
use crate::config::ImproveConfig;
use crate::extract::{contains_code_block, extract_code_block, extract_prompts};
use crate::prompts::PromptLoader;
use crate::stop::StopCondition;

use super::ArtifactWriter;

/// Status of a loop run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    Running,
    Complete,
    Failed { reason: String },
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// An evaluation contained a stop keyword
    Improved { iterations: u32, keyword: String },
    /// The iteration cap was reached first
    MaxIterations { iterations: u32 },
}

impl RunOutcome {
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Improved { iterations, .. } | Self::MaxIterations { iterations } => *iterations,
        }
    }
}

/// What happened during one iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: u32,
    /// Length of the model's main response
    pub response_len: usize,
    /// File holding the extracted code, when the response had a code block
    pub artifact: Option<PathBuf>,
    /// Extracted updated prompts (empty when absent)
    pub prompts: String,
    /// The model's evaluation of the code, when one was requested
    pub evaluation: Option<String>,
    /// Stop keyword found in the evaluation
    pub stop_keyword: Option<String>,
}

type Observer = Box<dyn FnMut(&IterationReport) + Send>;

/// Loop execution engine
pub struct LoopEngine {
    chat: ChatSession,
    prompts: PromptLoader,
    writer: ArtifactWriter,
    stop: StopCondition,
    code_fence: String,
    prompts_marker: String,
    /// 0 means no cap
    max_iterations: u32,
    /// Prompt for the next iteration
    prompt: String,
    iteration: u32,
    status: LoopStatus,
    reports: Vec<IterationReport>,
    observer: Option<Observer>,
}

impl LoopEngine {
    /// Create a new loop engine starting from `initial_prompt`
    pub fn new(config: &ImproveConfig, chat: ChatSession, prompts: PromptLoader, initial_prompt: String) -> Self {
        debug!(?config, initial_prompt_len = initial_prompt.len(), "LoopEngine::new: called");
        if config.stop_keywords.iter().all(|k| k.is_empty()) {
            warn!("No stop keywords configured; the loop only ends at max-iterations");
        }
        Self {
            chat,
            prompts,
            writer: ArtifactWriter::from_config(config),
            stop: StopCondition::new(&config.stop_keywords),
            code_fence: config.code_fence.clone(),
            prompts_marker: config.prompts_marker.clone(),
            max_iterations: config.max_iterations,
            prompt: initial_prompt,
            iteration: 0,
            status: LoopStatus::Running,
            reports: Vec::new(),
            observer: None,
        }
    }

    /// Call `observer` after every completed iteration
    pub fn with_observer(mut self, observer: impl FnMut(&IterationReport) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn status(&self) -> &LoopStatus {
        &self.status
    }

    /// The prompt the next iteration will send
    pub fn next_prompt(&self) -> &str {
        &self.prompt
    }

    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    /// Run until an evaluation matches the stop condition or the cap is hit
    pub async fn run(&mut self) -> Result<RunOutcome> {
        debug!(max_iterations = self.max_iterations, "run: called");
        info!("Starting improvement loop (model: {})", self.chat.model());

        loop {
            if self.max_iterations > 0 && self.iteration >= self.max_iterations {
                info!("Reached max iterations ({}) without a stop keyword", self.max_iterations);
                self.status = LoopStatus::Complete;
                return Ok(RunOutcome::MaxIterations {
                    iterations: self.iteration,
                });
            }

            self.iteration += 1;
            info!("Iteration {}", self.iteration);

            let report = match self.run_iteration().await {
                Ok(report) => report,
                Err(e) => {
                    debug!(iteration = self.iteration, error = %e, "run: iteration failed");
                    self.status = LoopStatus::Failed { reason: e.to_string() };
                    return Err(e.wrap_err(format!("Iteration {} failed", self.iteration)));
                }
            };

            let keyword = report.stop_keyword.clone();
            if let Some(observer) = self.observer.as_mut() {
                observer(&report);
            }
            self.reports.push(report);

            if let Some(keyword) = keyword {
                info!("Significant improvements achieved ('{}'). Stopping.", keyword);
                self.status = LoopStatus::Complete;
                return Ok(RunOutcome::Improved {
                    iterations: self.iteration,
                    keyword,
                });
            }
        }
    }

    /// Run a single iteration and prepare the next prompt
    async fn run_iteration(&mut self) -> Result<IterationReport> {
        let iteration = self.iteration;
        debug!(iteration, prompt = %self.prompt, "run_iteration: sending prompt");

        let response = self.chat.send(&self.prompt).await.context("Chat request failed")?;
        debug!(iteration, %response, "run_iteration: received response");

        let mut report = IterationReport {
            iteration,
            response_len: response.len(),
            artifact: None,
            prompts: String::new(),
            evaluation: None,
            stop_keyword: None,
        };

        if contains_code_block(&response, &self.code_fence) {
            let code = extract_code_block(&response, &self.code_fence);
            let prompts = extract_prompts(&response, &self.prompts_marker);
            debug!(iteration, %code, %prompts, "run_iteration: extracted code and prompts");

            report.artifact = Some(self.writer.write(iteration, &code).await?);

            let evaluation_prompt = self.prompts.evaluate(&code, &prompts)?;
            debug!(iteration, %evaluation_prompt, "run_iteration: sending evaluation prompt");
            let evaluation = self
                .chat
                .send(&evaluation_prompt)
                .await
                .context("Evaluation request failed")?;
            debug!(iteration, %evaluation, "run_iteration: received evaluation");

            self.prompt = self.prompts.followup(&code, &prompts, &evaluation)?;
            report.stop_keyword = self.stop.matches(&evaluation).map(str::to_string);
            report.prompts = prompts;
            report.evaluation = Some(evaluation);
        } else {
            debug!(iteration, "run_iteration: no code block, asking to continue");
            self.prompt = self.prompts.continuation(&response)?;
        }

        info!("Assistant response: {}", response);
        match report.evaluation {
            Some(ref evaluation) => info!("Evaluation: {}", evaluation),
            None => info!("Evaluation: none (no code block in response)"),
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use std::sync::{Arc, Mutex};

    const WITH_CODE: &str =
        "Analysis done.\n```python\nprint('v2')\n```\nUpdated Prompts: Focus on speed.\nThanks.";

    fn engine_for(texts: &[&str], dir: &std::path::Path, max_iterations: u32) -> (LoopEngine, Arc<MockLlmClient>) {
        let mock = Arc::new(MockLlmClient::with_texts(texts));
        let config = ImproveConfig {
            output_dir: dir.to_path_buf(),
            max_iterations,
            ..Default::default()
        };
        let chat = ChatSession::new(mock.clone(), 1000);
        let engine = LoopEngine::new(&config, chat, PromptLoader::embedded_only(), "start".to_string());
        (engine, mock)
    }

    #[tokio::test]
    async fn test_stops_on_significant_evaluation() {
        let temp = tempfile::tempdir().unwrap();
        let (mut engine, mock) = engine_for(
            &[WITH_CODE, "This is a Significant Improvement over v1."],
            temp.path(),
            0,
        );

        let outcome = engine.run().await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Improved {
                iterations: 1,
                keyword: "significant improvement".to_string()
            }
        );
        assert_eq!(*engine.status(), LoopStatus::Complete);
        assert_eq!(mock.call_count(), 2);

        let artifact = temp.path().join("gemini_agent_updated_iter1.py");
        assert_eq!(std::fs::read_to_string(&artifact).unwrap(), "print('v2')");

        let report = &engine.reports()[0];
        assert_eq!(report.artifact.as_deref(), Some(artifact.as_path()));
        assert_eq!(report.prompts, "Focus on speed.");
    }

    #[tokio::test]
    async fn test_evaluation_request_carries_code_and_prompts() {
        let temp = tempfile::tempdir().unwrap();
        let (mut engine, mock) = engine_for(&[WITH_CODE, "major enhancement"], temp.path(), 0);

        engine.run().await.unwrap();

        let requests = mock.requests();
        let evaluation_request = requests[1].messages.last().unwrap();
        assert_eq!(
            evaluation_request.content,
            "Please evaluate the effectiveness of the improvements made to the code and prompts:\n\nprint('v2')\n\nFocus on speed.\n\nProvide a summary of the changes and their impact."
        );
    }

    #[tokio::test]
    async fn test_no_code_block_continues_with_suffix() {
        let temp = tempfile::tempdir().unwrap();
        let (mut engine, mock) = engine_for(
            &["Let me think about it.", WITH_CODE, "substantial optimization"],
            temp.path(),
            0,
        );

        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome.iterations(), 2);

        let requests = mock.requests();
        assert_eq!(
            requests[1].messages.last().unwrap().content,
            "Let me think about it.\n\nPlease continue the thought process to improve the code and prompts."
        );

        let first = &engine.reports()[0];
        assert!(first.artifact.is_none());
        assert!(first.evaluation.is_none());
        assert!(!temp.path().join("gemini_agent_updated_iter1.py").exists());
        assert!(temp.path().join("gemini_agent_updated_iter2.py").exists());
    }

    #[tokio::test]
    async fn test_followup_prompt_combines_code_prompts_and_evaluation() {
        let temp = tempfile::tempdir().unwrap();
        let (mut engine, _mock) = engine_for(&[WITH_CODE, "Minor gains."], temp.path(), 1);

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::MaxIterations { iterations: 1 });
        assert_eq!(
            engine.next_prompt(),
            "Here is the updated code:\n\nprint('v2')\n\nAnd the updated prompts:\n\nFocus on speed.\n\nEvaluation of improvements:\nMinor gains.\n\nPlease continue the thought process to further enhance the code and prompts."
        );
    }

    #[tokio::test]
    async fn test_keyword_in_main_response_does_not_stop() {
        let temp = tempfile::tempdir().unwrap();
        let (mut engine, mock) = engine_for(
            &["A significant improvement is coming.", "still thinking"],
            temp.path(),
            2,
        );

        let outcome = engine.run().await.unwrap();
        assert_eq!(outcome, RunOutcome::MaxIterations { iterations: 2 });
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_client_error_fails_run() {
        let temp = tempfile::tempdir().unwrap();
        let (mut engine, _mock) = engine_for(&[WITH_CODE], temp.path(), 0);

        let err = engine.run().await.unwrap_err();
        assert!(err.to_string().contains("Iteration 1 failed"));
        assert!(matches!(engine.status(), LoopStatus::Failed { .. }));
        // the code was saved before the evaluation request failed
        assert!(temp.path().join("gemini_agent_updated_iter1.py").exists());
    }

    #[tokio::test]
    async fn test_observer_sees_every_iteration() {
        let temp = tempfile::tempdir().unwrap();
        let (engine, _mock) = engine_for(&["no code", WITH_CODE, "major enhancement"], temp.path(), 0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut engine = engine.with_observer(move |report| {
            sink.lock().unwrap().push(report.iteration);
        });

        engine.run().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
