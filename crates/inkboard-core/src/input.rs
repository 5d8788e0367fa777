//! Pointer and keyboard input for the board.

use crate::whiteboard::{StrokeOutcome, Whiteboard};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in board pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    /// The pointer left the board.
    Leave,
}

/// Turns pointer events into strokes on a [`Whiteboard`].
#[derive(Debug, Clone, Default)]
pub struct StrokeInput {
    /// Last known pointer position over the board.
    pointer: Option<Point>,
}

impl StrokeInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer position over the board, if it is inside.
    pub fn pointer(&self) -> Option<Point> {
        self.pointer
    }

    /// Feed one event. Returns the stroke outcome when a stroke ends.
    pub fn handle(&mut self, board: &mut Whiteboard, event: PointerEvent) -> Option<StrokeOutcome> {
        match event {
            PointerEvent::Down { position, button } => {
                self.pointer = Some(position);
                if button != MouseButton::Left {
                    return None;
                }
                if let Err(e) = board.begin_stroke(position) {
                    log::warn!("Could not start stroke: {}", e);
                }
                None
            }
            PointerEvent::Move { position } => {
                self.pointer = Some(position);
                board.extend_stroke(position);
                None
            }
            PointerEvent::Up { position, button } => {
                self.pointer = Some(position);
                if button != MouseButton::Left || !board.is_drawing() {
                    return None;
                }
                Some(board.end_stroke())
            }
            PointerEvent::Leave => {
                self.pointer = None;
                if !board.is_drawing() {
                    return None;
                }
                Some(board.end_stroke())
            }
        }
    }
}

/// Board commands bound to keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Undo,
    Redo,
    Export,
    Clear,
}

impl KeyAction {
    /// Decode a pressed key. `key` is a logical key name such as `"z"` or `"Backspace"`.
    pub fn from_key(key: &str, modifiers: Modifiers) -> Option<Self> {
        if !modifiers.command() {
            return None;
        }
        match key.to_ascii_lowercase().as_str() {
            "z" if modifiers.shift => Some(KeyAction::Redo),
            "z" => Some(KeyAction::Undo),
            "y" => Some(KeyAction::Redo),
            "e" => Some(KeyAction::Export),
            "backspace" => Some(KeyAction::Clear),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            KeyAction::Undo => "Undo",
            KeyAction::Redo => "Redo",
            KeyAction::Export => "Export to PNG",
            KeyAction::Clear => "Clear board",
        }
    }
}
