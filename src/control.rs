use crate::cloak::CloakColor;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetColor(CloakColor),
    CaptureBackground,
    ToggleMirror,
    Quit,
}

impl Command {
    /// Map a key to its command: 1/2/3 pick red/blue/green, b captures the
    /// background, m toggles mirroring, q quits
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            '1' => Some(Command::SetColor(CloakColor::Red)),
            '2' => Some(Command::SetColor(CloakColor::Blue)),
            '3' => Some(Command::SetColor(CloakColor::Green)),
            'b' => Some(Command::CaptureBackground),
            'm' => Some(Command::ToggleMirror),
            'q' => Some(Command::Quit),
            _ => None,
        }
    }

    /// Parse every recognised key in a line of terminal input
    pub fn parse_line(line: &str) -> Vec<Self> {
        line.chars().filter_map(Command::from_key).collect()
    }
}

/// User-selected settings read by the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    pub color: CloakColor,
    pub mirror: bool,
}

impl ModeState {
    pub fn new(color: CloakColor, mirror: bool) -> Self {
        Self { color, mirror }
    }

    /// Apply the state-only commands; capture and quit are handled by the caller
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::SetColor(color) => {
                if self.color != color {
                    tracing::info!("Cloak color: {}", color);
                }
                self.color = color;
            }
            Command::ToggleMirror => {
                self.mirror = !self.mirror;
                tracing::info!("Mirror: {}", if self.mirror { "on" } else { "off" });
            }
            Command::CaptureBackground | Command::Quit => {}
        }
    }
}

/// Read commands from stdin on a helper thread
///
/// The channel closes when stdin reaches end of file.
pub fn spawn_stdin_listener() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("stdin read error: {e}");
                    break;
                }
            };
            let commands = Command::parse_line(&line);
            if commands.is_empty() && !line.trim().is_empty() {
                tracing::warn!("Unrecognised input {:?}", line.trim());
            }
            for command in commands {
                if tx.send(command).is_err() {
                    return;
                }
            }
        }
        tracing::debug!("stdin closed, no more commands");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_keys_to_commands() {
        assert_eq!(Command::from_key('1'), Some(Command::SetColor(CloakColor::Red)));
        assert_eq!(Command::from_key('2'), Some(Command::SetColor(CloakColor::Blue)));
        assert_eq!(Command::from_key('3'), Some(Command::SetColor(CloakColor::Green)));
        assert_eq!(Command::from_key('B'), Some(Command::CaptureBackground));
        assert_eq!(Command::from_key('m'), Some(Command::ToggleMirror));
        assert_eq!(Command::from_key('q'), Some(Command::Quit));
        assert_eq!(Command::from_key('x'), None);
    }

    #[test]
    fn parses_several_keys_per_line() {
        assert_eq!(
            Command::parse_line("b 2"),
            vec![Command::CaptureBackground, Command::SetColor(CloakColor::Blue)]
        );
        assert!(Command::parse_line("   ").is_empty());
    }

    #[test]
    fn apply_updates_color_and_mirror() {
        let mut mode = ModeState::new(CloakColor::Red, true);
        mode.apply(Command::SetColor(CloakColor::Green));
        mode.apply(Command::ToggleMirror);
        mode.apply(Command::CaptureBackground);
        assert_eq!(mode, ModeState::new(CloakColor::Green, false));
    }
}
