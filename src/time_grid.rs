// src/time_grid.rs
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Errors ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("time string '{0}' is not HH:MM")]
pub struct FormatError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("slot width must be a positive number of minutes")]
    ZeroSlotWidth,
    #[error("grid window end ({end}) must be after start ({start})")]
    EmptyWindow { start: String, end: String },
}

// --- Clock-string conversions ---

/// Parses `"HH:MM"` into minutes since midnight. Both components must be
/// numeric; anything else is a [`FormatError`].
pub fn time_to_minutes(time: &str) -> Result<u32, FormatError> {
    let err = || FormatError(time.to_string());
    let mut parts = time.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), None) => {
            let hours: u32 = h.trim().parse().map_err(|_| err())?;
            let minutes: u32 = m.trim().parse().map_err(|_| err())?;
            Ok(hours * 60 + minutes)
        }
        _ => Err(err()),
    }
}

/// Formats minutes since midnight as zero-padded `"HH:MM"`. No day-rollover
/// handling: out-of-range input is a caller error.
pub fn minutes_to_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

// --- The slot grid ---

/// Fixed discretization of the business day. The grid is an ordered, finite,
/// immutable sequence of fixed-width slots for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotGrid {
    start_minutes: u32,
    end_minutes: u32,
    slot_minutes: u32,
}

/// The reference deployment window: 09:30-21:00 in 30-minute slots (23 slots).
pub static STANDARD_GRID: Lazy<TimeSlotGrid> = Lazy::new(TimeSlotGrid::standard);

impl TimeSlotGrid {
    pub fn new(start: &str, end: &str, slot_minutes: u32) -> Result<Self, GridError> {
        let start_minutes = time_to_minutes(start)?;
        let end_minutes = time_to_minutes(end)?;
        if slot_minutes == 0 {
            return Err(GridError::ZeroSlotWidth);
        }
        if end_minutes <= start_minutes {
            return Err(GridError::EmptyWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            start_minutes,
            end_minutes,
            slot_minutes,
        })
    }

    pub fn standard() -> Self {
        Self {
            start_minutes: 9 * 60 + 30,
            end_minutes: 21 * 60,
            slot_minutes: 30,
        }
    }

    pub fn start_minutes(&self) -> u32 {
        self.start_minutes
    }

    pub fn end_minutes(&self) -> u32 {
        self.end_minutes
    }

    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    /// Number of slots covering `[start, end)`. A trailing partial slot still
    /// counts as a slot.
    pub fn slot_count(&self) -> usize {
        let span = self.end_minutes - self.start_minutes;
        ((span + self.slot_minutes - 1) / self.slot_minutes) as usize
    }

    /// Start instant of the slot at `index`. Indexes past the grid are a
    /// caller error and simply extrapolate.
    pub fn slot_start(&self, index: usize) -> u32 {
        self.start_minutes + index as u32 * self.slot_minutes
    }

    /// The ordered sequence of slot start instants.
    pub fn slot_starts(&self) -> Vec<u32> {
        (0..self.slot_count()).map(|i| self.slot_start(i)).collect()
    }

    /// Maps an arbitrary instant to the enclosing slot, or `None` when the
    /// instant falls outside the grid window.
    pub fn slot_index_covering(&self, minutes: u32) -> Option<usize> {
        if minutes < self.start_minutes || minutes >= self.end_minutes {
            return None;
        }
        Some(((minutes - self.start_minutes) / self.slot_minutes) as usize)
    }
}
