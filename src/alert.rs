//! User-facing alert surface.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a flash stays visible before clearing itself.
pub const FLASH_DURATION: Duration = Duration::from_millis(1000);

/// Alert side effects: screen flash, haptic pulse, status line.
pub trait AlertSink: Send + Sync {
    /// Show the visual overlay. It clears itself after [`FLASH_DURATION`].
    fn flash(&self);

    /// Best-effort haptic pulse. Hosts without haptics do nothing.
    fn vibrate(&self, duration: Duration);

    fn set_status_text(&self, text: &str);
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn flash(&self) {}

    fn vibrate(&self, _duration: Duration) {}

    fn set_status_text(&self, _text: &str) {}
}

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => Self::Plain,
            Some("pretty") => Self::Pretty,
            _ => Self::Auto,
        }
    }
}

/// Terminal alert sink.
///
/// On a TTY the status text lives in a spinner line and a flash swaps the
/// spinner prefix for a warning marker. Otherwise lines go to stderr.
/// Terminals have no haptics, so `vibrate` is a no-op.
pub struct TerminalAlertSink {
    line: Option<ProgressBar>,
    flash: Arc<FlashState>,
}

#[derive(Default)]
struct FlashState {
    generation: AtomicU64,
    raised_at: std::sync::Mutex<Option<Instant>>,
}

impl TerminalAlertSink {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let use_pretty = is_tty
            && match mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            };

        let line = use_pretty.then(|| {
            let line = ProgressBar::new_spinner();
            line.set_draw_target(ProgressDrawTarget::stderr());
            line.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{prefix}{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            line.set_style(style);
            line.set_message("Camera ready");
            line
        });

        Self {
            line,
            flash: Arc::new(FlashState::default()),
        }
    }

    /// True while a flash raised less than [`FLASH_DURATION`] ago is showing.
    pub fn is_flashing(&self) -> bool {
        self.flash
            .raised_at
            .lock()
            .ok()
            .and_then(|raised| *raised)
            .is_some_and(|at| at.elapsed() < FLASH_DURATION)
    }
}

impl AlertSink for TerminalAlertSink {
    fn flash(&self) {
        let generation = self.flash.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut raised) = self.flash.raised_at.lock() {
            *raised = Some(Instant::now());
        }

        match &self.line {
            Some(line) => line.set_prefix("⚠ "),
            None => eprintln!("==> !! FLASH !!"),
        }

        // Only the latest flash clears the overlay.
        let flash = self.flash.clone();
        let line = self.line.clone();
        std::thread::spawn(move || {
            std::thread::sleep(FLASH_DURATION);
            if flash.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Ok(mut raised) = flash.raised_at.lock() {
                *raised = None;
            }
            if let Some(line) = line {
                line.set_prefix("");
            }
        });
    }

    fn vibrate(&self, duration: Duration) {
        log::debug!(
            "vibrate({}ms) skipped: no haptic device on this host",
            duration.as_millis()
        );
    }

    fn set_status_text(&self, text: &str) {
        match &self.line {
            Some(line) => line.set_message(text.to_string()),
            None => eprintln!("==> {}", text),
        }
    }
}

impl Drop for TerminalAlertSink {
    fn drop(&mut self) {
        if let Some(line) = &self.line {
            line.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_clears_itself() {
        let sink = TerminalAlertSink::new(UiMode::Plain, false);
        assert!(!sink.is_flashing());
        sink.flash();
        assert!(sink.is_flashing());
        std::thread::sleep(FLASH_DURATION + Duration::from_millis(200));
        assert!(!sink.is_flashing());
    }

    #[test]
    fn vibrate_without_haptics_is_silent() {
        let sink = TerminalAlertSink::new(UiMode::Plain, false);
        sink.vibrate(Duration::from_millis(200));
        sink.set_status_text("No pothole detected");
    }

    #[test]
    fn ui_mode_parses_flags() {
        assert!(matches!(UiMode::parse(Some("plain")), UiMode::Plain));
        assert!(matches!(UiMode::parse(Some("pretty")), UiMode::Pretty));
        assert!(matches!(UiMode::parse(None), UiMode::Auto));
    }
}
