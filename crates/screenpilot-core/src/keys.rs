//! Keyboard vocabulary: keys, modifiers and text-to-key conversion.
//!
//! Converts modifier lists ("Ctrl+Shift") and literal text into the [`Key`]
//! values the input port can inject.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// A modifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl Modifier {
    const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Meta];
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Ctrl => write!(f, "Ctrl"),
            Modifier::Alt => write!(f, "Alt"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Meta => write!(f, "Meta"),
        }
    }
}

/// A set of held modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
            Modifier::Meta => self.meta,
        }
    }

    fn insert(&mut self, modifier: Modifier) {
        match modifier {
            Modifier::Ctrl => self.ctrl = true,
            Modifier::Alt => self.alt = true,
            Modifier::Shift => self.shift = true,
            Modifier::Meta => self.meta = true,
        }
    }

    /// Held modifiers in press order (Ctrl, Alt, Shift, Meta).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(|m| self.contains(*m))
    }

    /// Parse a `+`-separated modifier list such as `"Ctrl+Shift"`.
    ///
    /// An empty string yields no modifiers.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut modifiers = Self::NONE;
        for part in spec.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            match parse_modifier(part) {
                Some(m) => modifiers.insert(m),
                None => {
                    return Err(ApiError::unsupported_usage_with_suggestion(
                        format!("Unknown modifier: '{}'", part),
                        "Use Ctrl, Alt, Shift or Meta, joined with '+'",
                    ))
                }
            }
        }
        Ok(modifiers)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<String> = self.iter().map(|m| m.to_string()).collect();
        write!(f, "{}", names.join("+"))
    }
}

fn parse_modifier(name: &str) -> Option<Modifier> {
    match name.to_lowercase().as_str() {
        "ctrl" | "control" => Some(Modifier::Ctrl),
        "alt" | "option" => Some(Modifier::Alt),
        "shift" => Some(Modifier::Shift),
        "meta" | "super" | "win" | "cmd" => Some(Modifier::Meta),
        _ => None,
    }
}

/// A key the input port can press and release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Char(char),
    Modifier(Modifier),
    Enter,
    Tab,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{:?}", c),
            Key::Modifier(m) => write!(f, "{}", m),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
        }
    }
}

/// Convert literal text to the keys that type it.
///
/// Every character is typed as itself, backslashes included. Only real
/// newline, carriage return and tab characters become Enter and Tab; a
/// `\r\n` pair is a single Enter.
pub fn text_to_keys(text: &str) -> Vec<Key> {
    let mut keys = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let key = match c {
            '\r' => {
                chars.next_if_eq(&'\n');
                Key::Enter
            }
            '\n' => Key::Enter,
            '\t' => Key::Tab,
            other => Key::Char(other),
        };
        keys.push(key);
    }

    keys
}
