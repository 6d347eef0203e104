//! Key events and key chords.
//!
//! Hosts deliver [`KeyEvent`]s; keymaps bind [`KeyChord`]s written as
//! strings like `"Mod-Shift-z"` or `"Shift-Ctrl-1"`. `Mod` is `Super` on
//! macOS and `Ctrl` everywhere else, so bindings read the same on every
//! platform.
//!
//! # Matching
//!
//! Uppercase letters are normalized to lowercase plus `Shift`, so an event
//! for `Z` with `Ctrl` matches `"Ctrl-Shift-z"`. For punctuation the Shift
//! needed to type the character is ignored when the chord does not ask for
//! it: `"Ctrl->"` matches `>` typed as `Shift-.`.

use std::fmt;

use bitflags::bitflags;

use crate::error::{EditorError, Result};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character.
    Char(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

bitflags! {
    /// Keyboard modifier flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

/// The platform's primary command modifier.
pub const MOD: Modifiers = if cfg!(target_os = "macos") {
    Modifiers::SUPER
} else {
    Modifiers::CTRL
};

/// A key press delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// A key pressed without modifiers.
    #[must_use]
    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }

    /// Fold an uppercase letter into lowercase plus Shift.
    fn normalized(self) -> Self {
        match self.code {
            KeyCode::Char(c) if c.is_uppercase() => {
                let lower = c.to_lowercase().next().unwrap_or(c);
                Self::new(KeyCode::Char(lower), self.modifiers | Modifiers::SHIFT)
            }
            _ => self,
        }
    }
}

// ---------------------------------------------------------------------------
// Chords
// ---------------------------------------------------------------------------

/// A key plus the exact set of modifiers a binding requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    code: KeyCode,
    modifiers: Modifiers,
}

impl KeyChord {
    /// Parse a chord such as `"Mod-b"`, `"Shift-Enter"` or `"Ctrl->"`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Config`] for an unknown modifier or key name.
    pub fn parse(name: &str) -> Result<Self> {
        let (mods, base) = split_chord(name);
        let mut modifiers = Modifiers::empty();
        for part in mods.split('-').filter(|p| !p.is_empty()) {
            modifiers |= match part.to_ascii_lowercase().as_str() {
                "shift" | "s" => Modifiers::SHIFT,
                "ctrl" | "control" | "c" => Modifiers::CTRL,
                "alt" | "a" => Modifiers::ALT,
                "cmd" | "meta" | "super" | "m" => Modifiers::SUPER,
                "mod" => MOD,
                _ => return Err(EditorError::Config(format!("unknown modifier `{part}` in `{name}`"))),
            };
        }
        let code = key_code(base)
            .ok_or_else(|| EditorError::Config(format!("unknown key `{base}` in `{name}`")))?;
        Ok(Self { code, modifiers }.normalized())
    }

    #[must_use]
    pub const fn code(&self) -> KeyCode {
        self.code
    }

    #[must_use]
    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The event a host would deliver for this chord.
    #[must_use]
    pub const fn to_event(self) -> KeyEvent {
        KeyEvent::new(self.code, self.modifiers)
    }

    /// True if `event` triggers this chord.
    #[must_use]
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let event = event.normalized();
        if event.code != self.code {
            return false;
        }
        if event.modifiers == self.modifiers {
            return true;
        }
        let typed_with_shift = matches!(self.code, KeyCode::Char(c) if !c.is_alphabetic());
        typed_with_shift
            && !self.modifiers.contains(Modifiers::SHIFT)
            && event.modifiers == self.modifiers | Modifiers::SHIFT
    }

    fn normalized(self) -> Self {
        let event = self.to_event().normalized();
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::CTRL, "Ctrl-"),
            (Modifiers::ALT, "Alt-"),
            (Modifiers::SUPER, "Cmd-"),
            (Modifiers::SHIFT, "Shift-"),
        ] {
            if self.modifiers.contains(flag) {
                f.write_str(name)?;
            }
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("Space"),
            KeyCode::Char(c) => write!(f, "{c}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Split `"Ctrl-Shift-x"` into `("Ctrl-Shift", "x")`. A trailing `-` is
/// the minus key itself.
fn split_chord(name: &str) -> (&str, &str) {
    if name == "-" {
        return ("", "-");
    }
    if let Some(mods) = name.strip_suffix("--") {
        return (mods, "-");
    }
    match name.rfind('-') {
        Some(i) if i + 1 < name.len() => (&name[..i], &name[i + 1..]),
        _ => ("", name),
    }
}

fn key_code(name: &str) -> Option<KeyCode> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(c));
    }
    Some(match name {
        "Enter" | "Return" => KeyCode::Enter,
        "Tab" => KeyCode::Tab,
        "Backspace" => KeyCode::Backspace,
        "Delete" | "Del" => KeyCode::Delete,
        "Escape" | "Esc" => KeyCode::Escape,
        "Space" => KeyCode::Char(' '),
        "ArrowUp" | "Up" => KeyCode::Up,
        "ArrowDown" | "Down" => KeyCode::Down,
        "ArrowLeft" | "Left" => KeyCode::Left,
        "ArrowRight" | "Right" => KeyCode::Right,
        "Home" => KeyCode::Home,
        "End" => KeyCode::End,
        "PageUp" => KeyCode::PageUp,
        "PageDown" => KeyCode::PageDown,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
