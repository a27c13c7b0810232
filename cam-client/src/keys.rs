//! Keybinding definitions for list pages.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    MoveUp,
    MoveDown,
    NextPage,
    PrevPage,
    FirstPage,
    SwitchEntity(usize),
    ViewItem,
    NewItem,
    EditItem,
    DeleteItem,
    ToggleOrder,
    GrowPage,
    ShrinkPage,
    OpenSearch,
    Refresh,
    Confirm,
    Cancel,
}

pub fn map_key(event: KeyEvent) -> Option<Action> {
    let KeyEvent {
        code, modifiers, ..
    } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Refresh),
            _ => None,
        };
    }

    match code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('/') => Some(Action::OpenSearch),
        KeyCode::Char('c') => Some(Action::NewItem),
        KeyCode::Char('e') => Some(Action::EditItem),
        KeyCode::Char('d') => Some(Action::DeleteItem),
        KeyCode::Char('o') => Some(Action::ToggleOrder),
        KeyCode::Char('+') => Some(Action::GrowPage),
        KeyCode::Char('-') => Some(Action::ShrinkPage),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::FirstPage),
        KeyCode::Char('y') => Some(Action::Confirm),
        KeyCode::Enter => Some(Action::ViewItem),
        KeyCode::Esc | KeyCode::Char('n') => Some(Action::Cancel),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::MoveDown),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::PageDown => Some(Action::NextPage),
        KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp => Some(Action::PrevPage),
        KeyCode::Char(c @ '1'..='4') => Some(Action::SwitchEntity(c as usize - '1' as usize)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_digits_switch_entities() {
        assert_eq!(map_key(key(KeyCode::Char('1'))), Some(Action::SwitchEntity(0)));
        assert_eq!(map_key(key(KeyCode::Char('4'))), Some(Action::SwitchEntity(3)));
        assert_eq!(map_key(key(KeyCode::Char('5'))), None);
    }

    #[test]
    fn test_control_keys() {
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_r), Some(Action::Refresh));
        let ctrl_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_x), None);
    }

    #[test]
    fn test_write_keys() {
        assert_eq!(map_key(key(KeyCode::Char('c'))), Some(Action::NewItem));
        assert_eq!(map_key(key(KeyCode::Char('e'))), Some(Action::EditItem));
        assert_eq!(map_key(key(KeyCode::Char('d'))), Some(Action::DeleteItem));
    }

    #[test]
    fn test_paging_keys() {
        assert_eq!(map_key(key(KeyCode::PageDown)), Some(Action::NextPage));
        assert_eq!(map_key(key(KeyCode::Char('h'))), Some(Action::PrevPage));
    }
}
