// src/occupancy.rs
//
// Roster-wide derived views. Everything here is a pure function of
// (roster, schedule snapshot, date or week); no store handles, no I/O, so
// the subscription layer can re-invoke these on every change notification.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::roster::{Employee, EmployeeId};
use crate::shift::{calculate_hours, shift_ranges};
use crate::stores::{date_key, ShiftMap};
use crate::time_grid::TimeSlotGrid;

pub type ScheduleSnapshot = HashMap<EmployeeId, ShiftMap>;

// --- Week boundaries ---

/// Monday of the week containing `date`: `date - ((weekday + 6) % 7)` days
/// with ISO weekday numbering (Sunday as 7).
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// The seven dates of the week starting at `start` (callers pass a Monday).
pub fn week_dates(start: NaiveDate) -> [NaiveDate; 7] {
    std::array::from_fn(|i| start + Duration::days(i as i64))
}

/// ISO-8601 week number: the week containing the year's first Thursday is
/// week 1.
pub fn week_number(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

// --- Headcount curve ---

/// Per-slot count of employees with an overlapping working interval on
/// `date`. Overlap is tested on raw minute ranges with the strict interval
/// test `start < slot_end && end > slot_start`, not on pre-quantized slot
/// membership, so a range boundary inside a slot still counts the slot.
pub fn headcount_for_day(
    date: NaiveDate,
    employees: &[Employee],
    schedules: &ScheduleSnapshot,
    grid: &TimeSlotGrid,
) -> Vec<u32> {
    let key = date_key(date);
    let mut counts = vec![0u32; grid.slot_count()];
    for employee in employees {
        let Some(shift) = schedules.get(&employee.id).and_then(|m| m.get(&key)) else {
            continue;
        };
        let (ranges, _skipped) = shift_ranges(shift);
        for range in ranges {
            for (index, count) in counts.iter_mut().enumerate() {
                let slot_start = grid.slot_start(index);
                let slot_end = slot_start + grid.slot_minutes();
                if range.start < slot_end && range.end > slot_start {
                    *count += 1;
                }
            }
        }
    }
    counts
}

// --- Weekly hours ---

pub fn weekly_hours_by_employee(
    week: &[NaiveDate],
    employees: &[Employee],
    schedules: &ScheduleSnapshot,
) -> HashMap<EmployeeId, f64> {
    employees
        .iter()
        .map(|employee| {
            let document = schedules.get(&employee.id);
            let total: f64 = week
                .iter()
                .map(|date| {
                    document
                        .and_then(|m| m.get(&date_key(*date)))
                        .map(|shift| calculate_hours(shift))
                        .unwrap_or(0.0)
                })
                .sum();
            (employee.id.clone(), total)
        })
        .collect()
}

// --- TGT allocation ---

/// Employees with a positive worked-hours figure on `date`.
pub fn working_employees_on<'a>(
    date: NaiveDate,
    employees: &'a [Employee],
    schedules: &ScheduleSnapshot,
) -> Vec<&'a Employee> {
    let key = date_key(date);
    employees
        .iter()
        .filter(|employee| {
            schedules
                .get(&employee.id)
                .and_then(|m| m.get(&key))
                .map(|shift| calculate_hours(shift) > 0.0)
                .unwrap_or(false)
        })
        .collect()
}

/// Splits a daily metric value across the working employees in proportion
/// to contracted weekly hours. A zero denominator (nobody working, or all
/// contracted totals zero) yields zero for everyone rather than a division
/// error.
pub fn pro_rata_allocation(
    value: Decimal,
    working_employees: &[&Employee],
) -> HashMap<EmployeeId, Decimal> {
    let denominator: Decimal = working_employees
        .iter()
        .map(|e| Decimal::from(e.weekly_hours))
        .sum();
    working_employees
        .iter()
        .map(|employee| {
            let share = if denominator.is_zero() {
                Decimal::ZERO
            } else {
                value * Decimal::from(employee.weekly_hours) / denominator
            };
            (employee.id.clone(), share)
        })
        .collect()
}
