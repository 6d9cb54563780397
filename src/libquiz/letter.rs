use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five option labels a bank row can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
}

impl Letter {
    pub const ALL: [Letter; 5] = [Letter::A, Letter::B, Letter::C, Letter::D, Letter::E];

    pub fn as_str(&self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::E => "E",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Letter> {
        Self::ALL.get(index).copied()
    }

    /// Strict parse: only the canonical uppercase labels are accepted.
    pub fn parse(label: &str) -> Option<Letter> {
        match label {
            "A" => Some(Letter::A),
            "B" => Some(Letter::B),
            "C" => Some(Letter::C),
            "D" => Some(Letter::D),
            "E" => Some(Letter::E),
            _ => None,
        }
    }

    /// Header of the bank column holding this option's text.
    pub fn column(&self) -> &'static str {
        match self {
            Letter::A => "Option_A",
            Letter::B => "Option_B",
            Letter::C => "Option_C",
            Letter::D => "Option_D",
            Letter::E => "Option_E",
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
