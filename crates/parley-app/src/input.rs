//! Terminal-agnostic keyboard input.

/// Keyboard input abstraction.
///
/// Decouples application logic from terminal libraries, enabling
/// deterministic simulation testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Printable character.
    Char(char),
    /// Enter/Return key (send).
    Enter,
    /// Backspace key (delete last character).
    Backspace,
    /// Tab key (cycle chats).
    Tab,
    /// Escape key (close chat, or quit when none is open).
    Esc,
}
