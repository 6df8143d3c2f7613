/// Interactive line editor
///
/// Reads one line at a time from a terminal in raw mode, with cursor movement, a few
/// emacs-style keys and a history of earlier lines. Used for console input when stdin
/// is a terminal.
///
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, stdout, Write};

const HISTORY_LIMIT: usize = 100;

/// Raw mode for as long as the guard lives
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<RawMode> {
        enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// What a key press did to the line
#[derive(Debug, PartialEq, Eq)]
enum Edit {
    Continue,
    Done(Option<String>),
}

#[derive(Debug, Default)]
pub struct ForthLineEditor {
    prompt: String,
    buffer: Vec<char>,
    cursor: usize,
    history: Vec<String>,
    recall: Option<usize>, // position in history while browsing with the arrow keys
}

impl ForthLineEditor {
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            ..Self::default()
        }
    }

    /// get_line reads a line from the terminal. None means the user ended input.
    pub fn get_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        self.cursor = 0;
        self.recall = None;

        let _raw = RawMode::enable()?;
        print!("{}", self.prompt);
        stdout().flush()?;

        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                if let Edit::Done(line) = self.key(key) {
                    print!("\r\n");
                    stdout().flush()?;
                    return Ok(line);
                }
                self.redraw()?;
            }
        }
    }

    /// key applies one key press to the buffer
    fn key(&mut self, key: KeyEvent) -> Edit {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('a') if ctrl => self.cursor = 0,
            KeyCode::Char('e') if ctrl => self.cursor = self.buffer.len(),
            KeyCode::Char('k') if ctrl => self.buffer.truncate(self.cursor),
            KeyCode::Char('d') if ctrl && self.buffer.is_empty() => return Edit::Done(None),
            KeyCode::Char(c) if !ctrl => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.buffer.remove(self.cursor);
            }
            KeyCode::Delete if self.cursor < self.buffer.len() => {
                self.buffer.remove(self.cursor);
            }
            KeyCode::Left if self.cursor > 0 => self.cursor -= 1,
            KeyCode::Right if self.cursor < self.buffer.len() => self.cursor += 1,
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.buffer.len(),
            KeyCode::Up => self.recall_older(),
            KeyCode::Down => self.recall_newer(),
            KeyCode::Enter => {
                let line: String = self.buffer.iter().collect();
                self.remember(&line);
                return Edit::Done(Some(line));
            }
            KeyCode::Esc => return Edit::Done(None),
            _ => {}
        }
        Edit::Continue
    }

    fn remember(&mut self, line: &str) {
        if line.trim().is_empty() || self.history.last().map(String::as_str) == Some(line) {
            return;
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(line.to_string());
    }

    fn recall_older(&mut self) {
        let index = match self.recall {
            None if !self.history.is_empty() => self.history.len() - 1,
            Some(i) if i > 0 => i - 1,
            _ => return,
        };
        self.show_history(Some(index));
    }

    fn recall_newer(&mut self) {
        match self.recall {
            Some(i) if i + 1 < self.history.len() => self.show_history(Some(i + 1)),
            Some(_) => self.show_history(None),
            None => {}
        }
    }

    fn show_history(&mut self, index: Option<usize>) {
        self.recall = index;
        self.buffer = index
            .and_then(|i| self.history.get(i))
            .map(|line| line.chars().collect())
            .unwrap_or_default();
        self.cursor = self.buffer.len();
    }

    /// redraw rewrites the whole line and puts the cursor back where it belongs
    fn redraw(&self) -> io::Result<()> {
        let line: String = self.buffer.iter().collect();
        print!("\r\x1b[K{}{}", self.prompt, line);
        let back = self.buffer.len() - self.cursor;
        if back > 0 {
            print!("\x1b[{}D", back);
        }
        stdout().flush()
    }
}
