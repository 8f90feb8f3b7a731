// src/roster.rs
use chrono::Weekday;
use serde::{Deserialize, Serialize};

pub type EmployeeId = String;

/// Display palette for employee colors, assigned at creation time.
pub const EMPLOYEE_COLORS: [&str; 11] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FED766", "#8A2BE2", "#FF9F1C", "#3A86FF", "#3DDC97",
    "#F77F00", "#D62828", "#003049",
];

/// A roster member. `weekly_hours` is the contracted weekly total used as
/// the weighting basis for TGT allocation, not a derived figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub color: String,
    pub weekly_hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_day: Option<Weekday>,
}

impl Employee {
    pub fn new(id: impl Into<EmployeeId>, name: impl Into<String>, weekly_hours: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: EMPLOYEE_COLORS[0].to_string(),
            weekly_hours,
            preferred_day: None,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = color.to_string();
        self
    }

    pub fn with_preferred_day(mut self, day: Weekday) -> Self {
        self.preferred_day = Some(day);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employees_round_trip_through_json() {
        let employee = Employee::new("e1", "Anna", 20)
            .with_color(EMPLOYEE_COLORS[3])
            .with_preferred_day(Weekday::Wed);
        let json = serde_json::to_string(&employee).unwrap();
        let back: Employee = serde_json::from_str(&json).unwrap();
        assert_eq!(back, employee);
    }

    #[test]
    fn preferred_day_is_omitted_when_unset() {
        let employee = Employee::new("e1", "Anna", 20);
        let json = serde_json::to_string(&employee).unwrap();
        assert!(!json.contains("preferred_day"));
    }
}
