use ratatui::layout::Rect;
use std::path::Path;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use diagramgen::{
    CycleOutcome, DiagramSession, FeedbackOutcome, Provider, SessionState, Settings,
    WorkflowController,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Description,
    Feedback,
    Code,
    Output,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Description => Focus::Feedback,
            Focus::Feedback => Focus::Code,
            Focus::Code => Focus::Output,
            Focus::Output => Focus::Description,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, Focus::Description | Focus::Feedback)
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text box with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub value: String,
    /// Cursor position in characters, not bytes.
    pub cursor: usize,
}

impl TextInput {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: Focus,

    pub description: TextInput,
    pub feedback: TextInput,

    pub session: DiagramSession,
    pub workflow: WorkflowController,
    pub cycle_task: Option<JoinHandle<CycleOutcome>>,

    /// Validation errors and other one-off messages; cleared on the next action.
    pub notice: Option<String>,
    pub animation_frame: u8,

    pub code_scroll: u16,
    pub output_scroll: u16,

    // Panel areas for mouse hit-testing (updated during render)
    pub code_area: Option<Rect>,
    pub output_area: Option<Rect>,

    pub provider: Provider,
    pub model: String,
}

impl App {
    pub fn new(workflow: WorkflowController, settings: &Settings) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: Focus::Description,

            description: TextInput::default(),
            feedback: TextInput::default(),

            session: DiagramSession::new(),
            workflow,
            cycle_task: None,

            notice: None,
            animation_frame: 0,

            code_scroll: 0,
            output_scroll: 0,

            code_area: None,
            output_area: None,

            provider: settings.provider,
            model: settings.model.clone(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.cycle_task.is_some()
    }

    /// "Generate" button.
    pub fn submit_description(&mut self) {
        if self.is_busy() {
            return;
        }
        match self.session.begin(&self.description.value) {
            Ok(state) => {
                self.notice = None;
                self.feedback.clear();
                self.focus = Focus::Feedback;
                self.spawn_cycle(state);
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    /// "Update" button.
    pub fn submit_feedback(&mut self) {
        if self.is_busy() {
            return;
        }
        match self.session.feedback(&self.feedback.value) {
            Ok(FeedbackOutcome::Revise(state)) => {
                self.notice = None;
                self.feedback.clear();
                self.spawn_cycle(state);
            }
            Ok(FeedbackOutcome::Done) => {
                self.notice = None;
                self.feedback.clear();
                self.input_mode = InputMode::Normal;
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    /// "Start new diagram" button.
    pub async fn start_new(&mut self) {
        // The task may be inside a blocking section that abort cannot cut
        // short; wait for it so nothing is written after the reset.
        if let Some(task) = self.cycle_task.take() {
            task.abort();
            let _ = task.await;
        }
        if let Err(e) = self.session.reset(self.workflow.artifacts()) {
            warn!(error = %e, "Failed to remove previous diagram");
            self.notice = Some(format!("Could not remove old diagram: {}", e));
        } else {
            self.notice = None;
        }
        self.description.clear();
        self.feedback.clear();
        self.code_scroll = 0;
        self.output_scroll = 0;
        self.focus = Focus::Description;
        self.input_mode = InputMode::Editing;
    }

    fn spawn_cycle(&mut self, state: SessionState) {
        let workflow = self.workflow.clone();
        self.code_scroll = 0;
        self.output_scroll = 0;
        self.cycle_task = Some(tokio::spawn(async move { workflow.cycle(state).await }));
    }

    /// Collect a finished cycle, if any.
    pub async fn poll_cycle(&mut self) {
        let finished = self.cycle_task.as_ref().is_some_and(|t| t.is_finished());
        if !finished {
            return;
        }
        let Some(task) = self.cycle_task.take() else {
            return;
        };

        match task.await {
            Ok(outcome) => self.session.record(outcome),
            Err(e) => {
                error!(error = %e, "Diagram task failed");
                self.notice = Some(format!("Diagram task failed: {}", e));
            }
        }
    }

    pub fn open_image(&mut self) {
        match self.session.image() {
            Some(image) => {
                if let Err(e) = open_in_viewer(&image.path) {
                    self.notice = Some(format!("Could not open {}: {}", image.path.display(), e));
                }
            }
            None => self.notice = Some("No diagram to open yet".to_string()),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % SPINNER.len() as u8;
        }
    }

    pub fn spinner(&self) -> char {
        SPINNER[self.animation_frame as usize % SPINNER.len()]
    }

    pub fn focused_input(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            Focus::Description => Some(&mut self.description),
            Focus::Feedback => Some(&mut self.feedback),
            Focus::Code | Focus::Output => None,
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        match self.focus {
            Focus::Output => self.output_scroll = self.output_scroll.saturating_add(lines),
            _ => self.code_scroll = self.code_scroll.saturating_add(lines),
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        match self.focus {
            Focus::Output => self.output_scroll = self.output_scroll.saturating_sub(lines),
            _ => self.code_scroll = self.code_scroll.saturating_sub(lines),
        }
    }
}

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

fn open_in_viewer(path: &Path) -> std::io::Result<()> {
    use std::process::{Command, Stdio};

    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };

    command
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use diagramgen::artifact::ARTIFACT_FILE_NAME;
    use diagramgen::prompt::PromptMessages;
    use diagramgen::{ArtifactStore, ChatModel, CodeRunner, Config, LlmSettings, Overrides, RunOutput};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct OneDrawing;

    #[async_trait]
    impl ChatModel for OneDrawing {
        async fn complete(&self, _: &LlmSettings, _: &PromptMessages) -> anyhow::Result<String> {
            Ok("draw()".to_string())
        }
    }

    /// Writes the image, then blocks its worker thread like a slow filesystem.
    struct SlowDrawer {
        started: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl CodeRunner for SlowDrawer {
        async fn run(&self, _code: &str, workdir: &Path) -> RunOutput {
            let png = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
            std::fs::write(workdir.join(ARTIFACT_FILE_NAME), png).unwrap();
            if let Some(tx) = self.started.lock().unwrap().take() {
                let _ = tx.send(());
            }
            std::thread::sleep(Duration::from_millis(200));
            RunOutput {
                output: String::new(),
                exit_code: Some(0),
                timed_out: false,
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_new_leaves_no_diagram_behind() {
        let root = tempfile::tempdir().unwrap();
        let (tx, rx) = oneshot::channel();
        let workflow = WorkflowController::new(
            Arc::new(OneDrawing),
            Arc::new(SlowDrawer { started: Mutex::new(Some(tx)) }),
            ArtifactStore::new(root.path().join("out")),
            LlmSettings {
                model: "test".to_string(),
                temperature: 0.0,
            },
        );
        let overrides = Overrides {
            provider: Some(Provider::Ollama),
            ..Overrides::default()
        };
        let settings = Config::new().resolve(&overrides).unwrap();
        let mut app = App::new(workflow, &settings);

        app.description = typed("web app");
        app.submit_description();
        rx.await.unwrap();

        app.start_new().await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(!app.is_busy());
        assert!(!app.workflow.artifacts().exists());
        assert!(app.session.original_prompt().is_none());
    }

    fn typed(text: &str) -> TextInput {
        let mut input = TextInput::default();
        for c in text.chars() {
            input.insert(c);
        }
        input
    }

    #[test]
    fn test_text_input_edits_at_cursor() {
        let mut input = typed("ac");
        input.left();
        input.insert('b');
        assert_eq!(input.value, "abc");

        input.home();
        input.delete();
        assert_eq!(input.value, "bc");

        input.end();
        input.backspace();
        assert_eq!(input.value, "b");
        assert_eq!(input.cursor, 1);
    }

    #[test]
    fn test_text_input_is_utf8_safe() {
        let mut input = typed("añé");
        input.left();
        input.backspace();
        assert_eq!(input.value, "aé");
        input.right();
        input.right();
        assert_eq!(input.cursor, 2);
    }

    #[test]
    fn test_focus_cycles_through_all_panes() {
        let mut focus = Focus::Description;
        for _ in 0..4 {
            focus = focus.next();
        }
        assert_eq!(focus, Focus::Description);
        assert!(Focus::Feedback.is_input());
        assert!(!Focus::Code.is_input());
    }
}
