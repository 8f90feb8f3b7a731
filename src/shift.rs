// src/shift.rs
//
// Canonical textual encoding of one employee's activity on one calendar date.
// A shift string is either empty ("no shift"), one of the reserved day codes
// (`Riposo`, `Ferie`), or a comma-separated list of `HH:MM-HH:MM` ranges.
// Stored strings need not be sorted or merged; the codec canonicalizes.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::time_grid::{minutes_to_time, time_to_minutes, TimeSlotGrid};

// --- Reserved day codes ---

pub const SHIFT_REST: &str = "Riposo";
pub const SHIFT_LEAVE: &str = "Ferie";
const RESERVED_SHIFTS: [&str; 2] = [SHIFT_REST, SHIFT_LEAVE];

/// Case-insensitive membership test against the reserved set. The stored
/// value keeps whatever casing it was written with.
pub fn is_reserved_keyword(text: &str) -> bool {
    let trimmed = text.trim();
    RESERVED_SHIFTS.iter().any(|kw| kw.eq_ignore_ascii_case(trimmed))
}

// --- Per-unit range parsing ---

/// One `[start, end)` interval in minutes since midnight. `end` may precede
/// `start` in stored data; see `calculate_hours`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteRange {
    pub start: u32,
    pub end: u32,
}

/// A comma-separated unit that did not parse into exactly two valid times.
/// Policy everywhere in this system: skip the unit, continue the aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("skipped unparseable range '{raw}'")]
pub struct SkippedRange {
    pub raw: String,
}

/// Parses one `"HH:MM-HH:MM"` unit. The error carries the offending text so
/// callers can log what they dropped.
pub fn parse_range_unit(raw: &str) -> Result<MinuteRange, SkippedRange> {
    let skip = || SkippedRange {
        raw: raw.trim().to_string(),
    };
    let mut parts = raw.trim().split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(start), Some(end), None) => {
            let start = time_to_minutes(start.trim()).map_err(|_| skip())?;
            let end = time_to_minutes(end.trim()).map_err(|_| skip())?;
            Ok(MinuteRange { start, end })
        }
        _ => Err(skip()),
    }
}

/// Splits a shift string into its parsed ranges plus the units that were
/// skipped. Empty and reserved-keyword strings carry no ranges at all.
pub fn shift_ranges(shift: &str) -> (Vec<MinuteRange>, Vec<SkippedRange>) {
    if shift.trim().is_empty() || is_reserved_keyword(shift) {
        return (Vec::new(), Vec::new());
    }
    let mut ranges = Vec::new();
    let mut skipped = Vec::new();
    for unit in shift.split(',') {
        match parse_range_unit(unit) {
            Ok(range) => ranges.push(range),
            Err(skip) => {
                debug!("shift parser: {}", skip);
                skipped.push(skip);
            }
        }
    }
    (ranges, skipped)
}

// --- String <-> slot set <-> range list ---

/// Expands a shift string into the set of grid slot indices it occupies.
/// Instants outside the grid window have no slot and are dropped.
pub fn parse_to_slot_set(grid: &TimeSlotGrid, shift: &str) -> BTreeSet<usize> {
    let mut slots = BTreeSet::new();
    let (ranges, _skipped) = shift_ranges(shift);
    for range in ranges {
        let mut instant = range.start;
        while instant < range.end {
            if let Some(index) = grid.slot_index_covering(instant) {
                slots.insert(index);
            }
            instant += grid.slot_minutes();
        }
    }
    slots
}

/// Coalesces a slot set into the unique minimal ordered list of maximal
/// contiguous runs. A run ends when the next slot is not directly adjacent.
pub fn merge_slots_to_ranges(grid: &TimeSlotGrid, slots: &BTreeSet<usize>) -> Vec<MinuteRange> {
    let mut ranges = Vec::new();
    let mut iter = slots.iter().copied();
    let Some(first) = iter.next() else {
        return ranges;
    };
    let mut run_start = first;
    let mut run_end = first;
    for index in iter {
        if index == run_end + 1 {
            run_end = index;
        } else {
            ranges.push(run_to_range(grid, run_start, run_end));
            run_start = index;
            run_end = index;
        }
    }
    ranges.push(run_to_range(grid, run_start, run_end));
    ranges
}

fn run_to_range(grid: &TimeSlotGrid, first_slot: usize, last_slot: usize) -> MinuteRange {
    MinuteRange {
        start: grid.slot_start(first_slot),
        // End is the start of the slot after the last slot in the run.
        end: grid.slot_start(last_slot) + grid.slot_minutes(),
    }
}

/// Formats a range list back into the canonical string form.
pub fn ranges_to_string(ranges: &[MinuteRange]) -> String {
    ranges
        .iter()
        .map(|r| format!("{}-{}", minutes_to_time(r.start), minutes_to_time(r.end)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Canonical form of a shift string: reserved keywords pass through in their
/// stored casing, interval lists come back sorted and maximally merged at
/// grid granularity. The codec's job is to canonicalize, not to preserve the
/// input formatting.
pub fn canonicalize(grid: &TimeSlotGrid, shift: &str) -> String {
    let trimmed = shift.trim();
    if trimmed.is_empty() || is_reserved_keyword(trimmed) {
        return trimmed.to_string();
    }
    let slots = parse_to_slot_set(grid, trimmed);
    ranges_to_string(&merge_slots_to_ranges(grid, &slots))
}

// --- Worked-hour derivation ---

/// Total worked hours encoded by a shift string. Reserved day codes and
/// empty strings count as zero. Each unit is parsed independently; a
/// malformed unit contributes nothing. An inverted range (end before start)
/// subtracts from the total; that stored-data quirk is pinned by tests
/// rather than guarded here.
pub fn calculate_hours(shift: &str) -> f64 {
    let (ranges, _skipped) = shift_ranges(shift);
    let total_minutes: i64 = ranges
        .iter()
        .map(|r| r.end as i64 - r.start as i64)
        .sum();
    total_minutes as f64 / 60.0
}
