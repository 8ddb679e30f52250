//! Terminal front-end
//!
//! Rendering is a pure function of [`SessionSnapshot`]. The run loop redraws
//! the screen in place whenever the visible text changes and turns stdin
//! lines into controller intents.

use crate::session::{SessionController, SessionSnapshot};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

const BAR_WIDTH: usize = 20;

/// Clear the screen and home the cursor
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Confidence band used to colour the bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Band for a rounded percentage
    pub fn from_percent(percent: u32) -> Self {
        if percent > 70 {
            ConfidenceBand::High
        } else if percent > 40 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    fn label(self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

/// User intents accepted on stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Start,
    Stop,
    DismissError,
    Quit,
}

pub fn parse_intent(line: &str) -> Option<Intent> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" | "s" => Some(Intent::Start),
        "stop" | "x" => Some(Intent::Stop),
        "dismiss" | "d" => Some(Intent::DismissError),
        "quit" | "q" => Some(Intent::Quit),
        _ => None,
    }
}

fn confidence_percent(confidence: f64) -> u32 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Render a snapshot as a block of text
pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let live = snapshot.is_live();

    let _ = writeln!(out, "[{}]", if live { "LIVE" } else { "INACTIVE" });

    let subtitle = if !snapshot.subtitle_text.is_empty() {
        snapshot.subtitle_text.as_str()
    } else if snapshot.is_loading {
        "Listening..."
    } else {
        "Ready"
    };
    let _ = writeln!(out, "  {subtitle}");

    if snapshot.confidence > 0.0 {
        let percent = confidence_percent(snapshot.confidence);
        let filled = (percent as usize * BAR_WIDTH + 50) / 100;
        let _ = writeln!(
            out,
            "  Confidence: [{}{}] {}% ({})",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            percent,
            ConfidenceBand::from_percent(percent).label()
        );
    }

    let start = if live || snapshot.is_loading {
        "(start unavailable)"
    } else {
        "[s]tart"
    };
    let stop = if live { "[x] stop" } else { "(stop unavailable)" };
    let _ = writeln!(out, "  {start}  {stop}  [q]uit");

    if let Some(message) = &snapshot.error_message {
        let _ = writeln!(out, "  ! {message}  [d]ismiss");
    }

    if !snapshot.history.is_empty() {
        let _ = writeln!(out, "  Recent Predictions:");
        for entry in &snapshot.history {
            let _ = writeln!(out, "    - {entry}");
        }
    }

    out
}

/// Redraws the view in place, only when its text changes
#[derive(Debug, Default)]
struct Screen {
    shown: Option<String>,
}

impl Screen {
    /// Bytes to write for `snapshot`, or `None` if the view is unchanged
    fn update(&mut self, snapshot: &SessionSnapshot) -> Option<String> {
        let view = render(snapshot);
        if self.shown.as_deref() == Some(view.as_str()) {
            return None;
        }
        let frame = format!("{CLEAR_SCREEN}{view}");
        self.shown = Some(view);
        Some(frame)
    }
}

/// Drive the controller from the terminal until quit, EOF or Ctrl-C
///
/// The controller is disposed before this returns.
pub async fn run(controller: Arc<SessionController>) -> std::io::Result<()> {
    let mut view = controller.subscribe();
    let renderer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        let mut screen = Screen::default();
        loop {
            let frame = screen.update(&view.borrow_and_update());
            if let Some(frame) = frame {
                if stdout.write_all(frame.as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdout.flush().await;
            }
            if view.changed().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed, shutting down");
                    break;
                };
                match parse_intent(&line) {
                    Some(Intent::Start) => {
                        let controller = controller.clone();
                        tokio::spawn(async move { controller.start().await });
                    }
                    Some(Intent::Stop) => controller.stop(),
                    Some(Intent::DismissError) => controller.dismiss_error(),
                    Some(Intent::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => debug!(input = %line.trim(), "Unrecognised command"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    controller.dispose();
    renderer.abort();
    Ok(())
}
