//! Start/stop control state.
//!
//! Start is enabled and stop disabled initially. Clicking an enabled control
//! flips both; clicking a disabled one does nothing.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Some(Self::Start),
            "stop" | "x" => Some(Self::Stop),
            "quit" | "q" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    start_enabled: bool,
    stop_enabled: bool,
}

impl Controls {
    pub fn new() -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
        }
    }

    /// Both controls disabled, used when the camera could not be opened.
    pub fn disabled() -> Self {
        Self {
            start_enabled: false,
            stop_enabled: false,
        }
    }

    pub fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    pub fn stop_enabled(&self) -> bool {
        self.stop_enabled
    }

    /// Returns true when the click was accepted.
    pub fn click_start(&mut self) -> bool {
        if !self.start_enabled {
            return false;
        }
        self.start_enabled = false;
        self.stop_enabled = true;
        true
    }

    /// Returns true when the click was accepted.
    pub fn click_stop(&mut self) -> bool {
        if !self.stop_enabled {
            return false;
        }
        self.start_enabled = true;
        self.stop_enabled = false;
        true
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_toggle() {
        let mut controls = Controls::new();
        assert!(controls.start_enabled());
        assert!(!controls.stop_enabled());

        assert!(!controls.click_stop());
        assert!(controls.click_start());
        assert!(!controls.start_enabled());
        assert!(controls.stop_enabled());

        assert!(!controls.click_start());
        assert!(controls.click_stop());
        assert_eq!(controls, Controls::new());
    }

    #[test]
    fn disabled_controls_ignore_clicks() {
        let mut controls = Controls::disabled();
        assert!(!controls.click_start());
        assert!(!controls.click_stop());
    }

    #[test]
    fn commands_parse() {
        assert_eq!(Command::parse(" START\n"), Some(Command::Start));
        assert_eq!(Command::parse("x"), Some(Command::Stop));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("pause"), None);
    }
}
