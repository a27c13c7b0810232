//! Event types for the client event loop.

use crossterm::event::KeyEvent;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Input(KeyEvent),
    Tick,
    Resize { width: u16, height: u16 },
}
