use std::time::Duration;
use tracing::trace;

use crate::domain::{FTConfig, FTError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &FTConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, FTError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    Self::handle_key(key)
                }
            }
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Tab | KeyCode::BackTab, _) => Some(Message::NextTable),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Char('c'), _) => Some(Message::ClearFilters),
            (KeyCode::Char(' '), _) => Some(Message::ToggleRow),
            (KeyCode::Char('a'), _) => Some(Message::ToggleSelectAll),
            (KeyCode::Char('d') | KeyCode::Delete, _) => Some(Message::Delete),
            (KeyCode::Char('r'), _) => Some(Message::Reset),
            (KeyCode::Char('L'), _) => Some(Message::Reload),
            (KeyCode::Char('y'), _) => Some(Message::CopyRows),
            (KeyCode::Char('w'), _) => Some(Message::WritePage),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> Option<Message> {
        Controller::handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn table_keys() {
        assert!(matches!(press(KeyCode::Char('s')), Some(Message::Sort)));
        assert!(matches!(press(KeyCode::Char('/')), Some(Message::Filter)));
        assert!(matches!(press(KeyCode::Char(' ')), Some(Message::ToggleRow)));
        assert!(matches!(press(KeyCode::Char('d')), Some(Message::Delete)));
        assert!(matches!(press(KeyCode::Tab), Some(Message::NextTable)));
        assert!(matches!(press(KeyCode::Char('j')), Some(Message::MoveDown)));
        assert!(press(KeyCode::Char('x')).is_none());
    }

    #[test]
    fn ctrl_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(Controller::handle_key(key), Some(Message::Quit)));
        assert!(matches!(press(KeyCode::Char('c')), Some(Message::ClearFilters)));
    }
}
