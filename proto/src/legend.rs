//! Colors, directions and the legend binding one to the other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::round::ColorAssignment;

/// One of the four canonical colors a character can be shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    /// Canonical order. A legend lists one direction per color in this order.
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];

    pub fn index(self) -> usize {
        match self {
            Color::Red => 0,
            Color::Green => 1,
            Color::Blue => 2,
            Color::Yellow => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "Red",
            Color::Green => "Green",
            Color::Blue => "Blue",
            Color::Yellow => "Yellow",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A directional answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Lower-case letter code (`u`, `d`, `l`, `r`).
    pub fn code(self) -> char {
        match self {
            Direction::Up => 'u',
            Direction::Down => 'd',
            Direction::Left => 'l',
            Direction::Right => 'r',
        }
    }

    /// Upper-cased letter as transmitted to the backend.
    pub fn to_wire(self) -> char {
        self.code().to_ascii_uppercase()
    }

    /// Parse a single letter code, case-insensitive.
    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'u' => Some(Direction::Up),
            'd' => Some(Direction::Down),
            'l' => Some(Direction::Left),
            'r' => Some(Direction::Right),
            _ => None,
        }
    }

    /// Map a W/A/S/D keyboard key to its direction.
    pub fn from_key(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(Direction::Up),
            'a' => Some(Direction::Left),
            's' => Some(Direction::Down),
            'd' => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = LegendError;

    /// Accepts `u`/`d`/`l`/`r` or `up`/`down`/`left`/`right`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Direction::from_code(c).ok_or(LegendError::InvalidDirection(c));
        }
        Direction::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| LegendError::InvalidDirection(trimmed.chars().next().unwrap_or(' ')))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegendError {
    #[error("legend must have exactly 4 directions, got {0}")]
    WrongLength(usize),

    #[error("'{0}' is not a direction")]
    InvalidDirection(char),

    #[error("direction {0} is assigned to more than one color")]
    DuplicateDirection(Direction),
}

/// The user's color → direction binding, chosen once at enrollment.
///
/// Holds one direction per canonical color (Red, Green, Blue, Yellow); every
/// direction appears exactly once.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Legend([Direction; 4]);

impl Legend {
    /// Build from directions in canonical color order.
    pub fn new(directions: [Direction; 4]) -> Result<Self, LegendError> {
        for (i, d) in directions.iter().enumerate() {
            if directions[..i].contains(d) {
                return Err(LegendError::DuplicateDirection(*d));
            }
        }
        Ok(Self(directions))
    }

    /// Parse letter codes, e.g. `"urdl"`. Case-insensitive.
    pub fn parse(input: &str) -> Result<Self, LegendError> {
        Self::parse_with(input, Direction::from_code)
    }

    /// Parse keyboard keys, e.g. `"wdsa"` (w=up, d=right, s=down, a=left).
    pub fn from_keys(input: &str) -> Result<Self, LegendError> {
        Self::parse_with(input, Direction::from_key)
    }

    fn parse_with(input: &str, map: fn(char) -> Option<Direction>) -> Result<Self, LegendError> {
        let chars: Vec<char> = input.trim().chars().collect();
        if chars.len() != 4 {
            return Err(LegendError::WrongLength(chars.len()));
        }
        let mut directions = [Direction::Up; 4];
        for (slot, c) in directions.iter_mut().zip(chars) {
            *slot = map(c).ok_or(LegendError::InvalidDirection(c))?;
        }
        Self::new(directions)
    }

    pub fn direction_for(&self, color: Color) -> Direction {
        self.0[color.index()]
    }

    /// Inverse lookup. Total because the legend is a bijection.
    pub fn color_for(&self, direction: Direction) -> Color {
        Color::ALL
            .into_iter()
            .find(|c| self.direction_for(*c) == direction)
            .unwrap_or(Color::Red)
    }

    /// Lower-case letter codes in canonical color order.
    pub fn codes(&self) -> String {
        self.0.iter().map(|d| d.code()).collect()
    }

    /// Upper-cased form submitted at enrollment, e.g. `"URDL"`.
    pub fn to_wire(&self) -> String {
        self.0.iter().map(|d| d.to_wire()).collect()
    }
}

impl fmt::Debug for Legend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Legend").field(&"[redacted]").finish()
    }
}

impl FromStr for Legend {
    type Err = LegendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Legend {
    type Error = LegendError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Legend> for String {
    fn from(legend: Legend) -> Self {
        legend.to_wire()
    }
}

/// Derive the answer for one secret character under the current assignment.
///
/// This is the caller's job; the round engine only forwards answers.
/// Returns `None` when the character has no color in this round.
pub fn answer_for(assignment: &ColorAssignment, secret_char: char, legend: &Legend) -> Option<Direction> {
    assignment
        .color_of(secret_char.to_ascii_uppercase())
        .map(|color| legend.direction_for(color))
}
