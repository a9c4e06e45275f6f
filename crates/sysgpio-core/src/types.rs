//! Shared GPIO types
//!
//! The string forms of [`Direction`] and [`Edge`] are exactly what the
//! kernel accepts in the `direction` and `edge` pseudo-files.

use core::fmt;
use core::str::FromStr;

use crate::error::GpioError;

/// Pin-header position as printed on the board (e.g. 1-40)
pub type Channel = u32;

/// Kernel GPIO number a channel maps to
pub type Pin = u32;

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Input pin
    In,
    /// Output pin
    Out,
}

impl Direction {
    /// All recognized directions
    pub const ALL: [Direction; 2] = [Direction::In, Direction::Out];

    /// Kernel representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = GpioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            _ => Err(GpioError::UnknownDirection(s.to_string())),
        }
    }
}

/// Interrupt edge selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// No edge reported
    None,
    /// Low to high transitions
    Rising,
    /// High to low transitions
    Falling,
    /// Any transition
    Both,
}

impl Edge {
    /// All recognized edge modes
    pub const ALL: [Edge; 4] = [Edge::None, Edge::Rising, Edge::Falling, Edge::Both];

    /// Kernel representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edge {
    type Err = GpioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "rising" => Ok(Self::Rising),
            "falling" => Ok(Self::Falling),
            "both" => Ok(Self::Both),
            _ => Err(GpioError::UnknownEdge(s.to_string())),
        }
    }
}

/// Digital signal level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Logic low, written as "0"
    Low,
    /// Logic high, written as "1"
    High,
}

impl Signal {
    /// Integer read back from the value file for this level
    pub const fn level(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }

    /// Kernel representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "0",
            Self::High => "1",
        }
    }

    /// Any non-zero value is high, including negative numbers
    pub fn from_value(value: i64) -> Self {
        if value != 0 {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<bool> for Signal {
    fn from(high: bool) -> Self {
        if high {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
