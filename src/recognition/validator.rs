//! Plate text validation
//!
//! Cleans raw OCR output and checks it against the fixed plate layouts:
//!
//! | length | layout      |
//! |--------|-------------|
//! | 6      | `LDDDLL`    |
//! | 8      | `LDDDLLDD`  |
//! | 9      | `LDDDLLDDD` |
//!
//! `L` is an alphabetic character and `D` an ASCII digit. Anything else is
//! rejected.

use serde::Serialize;
use std::fmt;

/// Character class expected at a template position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letter,
    Digit,
}

impl CharClass {
    fn matches(self, c: char) -> bool {
        match self {
            CharClass::Letter => c.is_alphabetic(),
            CharClass::Digit => c.is_ascii_digit(),
        }
    }
}

use CharClass::{Digit as D, Letter as L};

const TEMPLATE_6: [CharClass; 6] = [L, D, D, D, L, L];
const TEMPLATE_8: [CharClass; 8] = [L, D, D, D, L, L, D, D];
const TEMPLATE_9: [CharClass; 9] = [L, D, D, D, L, L, D, D, D];

fn template_for(len: usize) -> Option<&'static [CharClass]> {
    match len {
        6 => Some(&TEMPLATE_6),
        8 => Some(&TEMPLATE_8),
        9 => Some(&TEMPLATE_9),
        _ => None,
    }
}

/// Plate string that passed validation: uppercase, no whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ValidatedPlate(String);

impl ValidatedPlate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedPlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedPlate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Why a candidate was rejected (expected outcome, not an error)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No layout exists for this many characters
    Length(usize),
    /// Character at `position` has the wrong class
    Position { position: usize, found: char },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Length(len) => write!(f, "no plate layout has {} characters", len),
            Rejection::Position { position, found } => {
                write!(f, "unexpected '{}' at position {}", found, position)
            }
        }
    }
}

/// Uppercase and drop every whitespace character
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Validate raw recognized text
pub fn validate(raw: &str) -> Result<ValidatedPlate, Rejection> {
    let cleaned = clean(raw);
    let chars: Vec<char> = cleaned.chars().collect();

    let template = template_for(chars.len()).ok_or(Rejection::Length(chars.len()))?;

    for (position, (&c, class)) in chars.iter().zip(template).enumerate() {
        if !class.matches(c) {
            return Err(Rejection::Position { position, found: c });
        }
    }

    Ok(ValidatedPlate(cleaned))
}
