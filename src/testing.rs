//! Test doubles shared by the workflow and session tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::ai::{ChatModel, LlmSettings};
use crate::artifact::{ArtifactStore, ARTIFACT_FILE_NAME, DEFAULT_OUTPUT_DIR};
use crate::executor::{format_error, CodeRunner, RunOutput};
use crate::prompt::PromptMessages;
use crate::workflow::WorkflowController;

/// Code the fake runner turns into a PNG.
pub const DRAWING_CODE: &str = "draw v1";
/// Code the fake runner fails on.
pub const FAILING_CODE: &str = "raise v1";

/// Smallest header that passes the signature and IHDR checks.
pub fn fake_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}

/// Replies from a script and remembers every request.
#[derive(Clone, Default)]
pub struct FakeModel {
    replies: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<PromptMessages>>>,
    fail: bool,
}

impl FakeModel {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.iter().map(|r| r.to_string()).collect())),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<PromptMessages> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn complete(&self, _settings: &LlmSettings, messages: &PromptMessages) -> Result<String> {
        self.requests.lock().unwrap().push(messages.clone());
        if self.fail {
            return Err(anyhow!("OpenAI API error 401 Unauthorized"));
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left"))
    }
}

/// Stands in for the interpreter: `draw ...` writes a PNG tagged with the
/// code, `raise ...` fails, anything else succeeds without an image.
pub struct FakeRunner;

#[async_trait]
impl CodeRunner for FakeRunner {
    async fn run(&self, code: &str, workdir: &Path) -> RunOutput {
        if code.starts_with("draw") {
            let mut bytes = fake_png(800, 600);
            bytes.extend_from_slice(code.as_bytes());
            std::fs::write(workdir.join(ARTIFACT_FILE_NAME), bytes).unwrap();
            RunOutput { output: String::new(), exit_code: Some(0), timed_out: false }
        } else if code.starts_with("raise") {
            RunOutput {
                output: format_error("RuntimeError", "boom"),
                exit_code: Some(1),
                timed_out: false,
            }
        } else {
            RunOutput { output: "done".to_string(), exit_code: Some(0), timed_out: false }
        }
    }
}

pub fn controller(model: FakeModel, root: &Path) -> WorkflowController {
    WorkflowController::new(
        Arc::new(model),
        Arc::new(FakeRunner),
        ArtifactStore::new(root.join(DEFAULT_OUTPUT_DIR)),
        LlmSettings {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
        },
    )
}
