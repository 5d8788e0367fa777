//! Keyboard shortcut registry and documentation.

use inkboard_core::input::{KeyAction, Modifiers};

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub action: KeyAction,
}

impl Shortcut {
    pub const fn new(key: &'static str, ctrl: bool, shift: bool, action: KeyAction) -> Self {
        Self {
            key,
            ctrl,
            shift,
            action,
        }
    }

    pub fn description(&self) -> &'static str {
        self.action.description()
    }

    /// Format the shortcut for display (e.g., "Ctrl+Z").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }

    /// Modifier state that triggers this shortcut.
    pub fn modifiers(&self) -> Modifiers {
        Modifiers {
            ctrl: self.ctrl,
            shift: self.shift,
            ..Modifiers::default()
        }
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("Z", true, false, KeyAction::Undo),
            Shortcut::new("Z", true, true, KeyAction::Redo),
            Shortcut::new("Y", true, false, KeyAction::Redo),
            Shortcut::new("E", true, false, KeyAction::Export),
            Shortcut::new("Backspace", true, false, KeyAction::Clear),
        ]
    }

    /// Display text of the first shortcut bound to `action`.
    pub fn hint(action: KeyAction) -> Option<String> {
        Self::all()
            .into_iter()
            .find(|s| s.action == action)
            .map(|s| s.format())
    }

    /// Print all shortcuts to console.
    pub fn print_all() {
        println!("\n=== Keyboard Shortcuts ===");
        for shortcut in Self::all() {
            println!("  {:20} {}", shortcut.format(), shortcut.description());
        }
        println!();
    }
}
