use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line editor for the command line, e.g. typing a column filter.
/// The cursor counts characters, not bytes.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.clear();
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            (KeyCode::Right, _) => self.cursor_pos = (self.cursor_pos + 1).min(self.len()),
            (KeyCode::Home, _) => self.cursor_pos = 0,
            (KeyCode::End, _) => self.cursor_pos = self.len(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.current_input.clear();
                self.cursor_pos = 0;
            }
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => {
                let pos = self.byte_pos(self.cursor_pos);
                self.current_input.insert(pos, chr);
                self.cursor_pos += 1;
            }
            (code, _) => trace!("Ignoring {code:?} in command line"),
        }
        self.get()
    }

    /// Prefills the line, cursor at the end.
    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.cursor_pos = self.len();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            cursor_pos: self.cursor_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let pos = self.byte_pos(self.cursor_pos);
            self.current_input.remove(pos);
        }
    }

    fn delete(&mut self) {
        if self.cursor_pos < self.len() {
            let pos = self.byte_pos(self.cursor_pos);
            self.current_input.remove(pos);
        }
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.current_input
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
