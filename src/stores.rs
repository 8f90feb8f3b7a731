// src/stores.rs
//
// In-memory key-value collaborators behind the derivation core: the
// canonical per-employee schedule map, the append-only request queue, the
// daily TGT metric store and the employee directory. Each store is an
// independently lockable resource; mutations notify subscribers with the
// full current value, outside the data lock, so observers can recompute
// derived views without ever blocking a writer.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::roster::{Employee, EmployeeId};

/// ISO `YYYY-MM-DD` date key. Lexicographic order equals chronological
/// order, which is what makes the metric range query below valid.
pub type DateKey = String;

/// One employee's full schedule document: date key -> shift string.
pub type ShiftMap = BTreeMap<DateKey, String>;

pub fn date_key(date: NaiveDate) -> DateKey {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// Random alphanumeric document id, in the style of the backing document
/// store this layer stands in for.
pub fn new_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

// --- Subscriptions ---

pub type SubscriptionToken = u64;

struct Subscribers<T> {
    next_token: SubscriptionToken,
    callbacks: HashMap<SubscriptionToken, Box<dyn Fn(&T) + Send + Sync>>,
}

impl<T> Subscribers<T> {
    fn new() -> Self {
        Self {
            next_token: 0,
            callbacks: HashMap::new(),
        }
    }

    fn add(&mut self, callback: Box<dyn Fn(&T) + Send + Sync>) -> SubscriptionToken {
        let token = self.next_token;
        self.next_token += 1;
        self.callbacks.insert(token, callback);
        token
    }

    fn remove(&mut self, token: SubscriptionToken) -> bool {
        self.callbacks.remove(&token).is_some()
    }

    fn notify(&self, value: &T) {
        for callback in self.callbacks.values() {
            callback(value);
        }
    }
}

// --- ScheduleStore ---

/// Payload delivered to schedule observers: the employee whose document
/// changed and the full current map after the change.
#[derive(Debug, Clone)]
pub struct ScheduleEvent {
    pub employee_id: EmployeeId,
    pub shifts: ShiftMap,
}

/// The canonical per-employee, per-date shift map. A date key with an empty
/// shift value is treated as "no shift" and is physically removed; readers
/// of a missing employee get an empty map, never an error.
#[derive(Clone)]
pub struct ScheduleStore {
    data: Arc<Mutex<HashMap<EmployeeId, ShiftMap>>>,
    subscribers: Arc<Mutex<Subscribers<ScheduleEvent>>>,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            subscribers: Arc::new(Mutex::new(Subscribers::new())),
        }
    }

    pub fn get(&self, employee_id: &str) -> ShiftMap {
        self.data
            .lock()
            .unwrap()
            .get(employee_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every employee's document, for roster-wide derivations.
    pub fn snapshot(&self) -> HashMap<EmployeeId, ShiftMap> {
        self.data.lock().unwrap().clone()
    }

    /// Applies a partial date map, preserving unrelated dates. An entry with
    /// an empty shift value clears that date.
    pub fn merge(&self, employee_id: &str, partial: ShiftMap) {
        {
            let mut data = self.data.lock().unwrap();
            let document = data.entry(employee_id.to_string()).or_default();
            for (date, shift) in partial {
                if shift.trim().is_empty() {
                    document.remove(&date);
                } else {
                    document.insert(date, shift);
                }
            }
        }
        self.notify(employee_id);
    }

    /// Replaces the employee's entire document. Used by the copy-week bulk
    /// operation, which recomputes the full map before writing.
    pub fn replace(&self, employee_id: &str, full: ShiftMap) {
        let cleaned: ShiftMap = full
            .into_iter()
            .filter(|(_, shift)| !shift.trim().is_empty())
            .collect();
        {
            let mut data = self.data.lock().unwrap();
            data.insert(employee_id.to_string(), cleaned);
        }
        self.notify(employee_id);
    }

    pub fn remove_employee(&self, employee_id: &str) {
        let removed = self.data.lock().unwrap().remove(employee_id).is_some();
        if removed {
            info!("schedule document for employee {} removed", employee_id);
            self.notify(employee_id);
        }
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&ScheduleEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.subscribers.lock().unwrap().add(Box::new(callback))
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.lock().unwrap().remove(token)
    }

    fn notify(&self, employee_id: &str) {
        // Clone the current document first so callbacks run without the
        // data lock held.
        let event = ScheduleEvent {
            employee_id: employee_id.to_string(),
            shifts: self.get(employee_id),
        };
        self.subscribers.lock().unwrap().notify(&event);
    }
}

// --- RequestQueue ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    ShiftChange,
}

/// An employee-submitted, administrator-adjudicated proposal to change one
/// day's shift. `original_shift` is the value in effect at submission time,
/// kept for audit and display; it is not re-validated at approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRequest {
    pub id: String,
    pub kind: RequestKind,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub employee_color: String,
    pub date: DateKey,
    pub details: String,
    pub original_shift: String,
    pub notes: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("request '{0}' not found")]
    NotFound(String),
}

/// Append-only audit trail of change requests. Records are never deleted;
/// adjudication only flips their status.
#[derive(Clone)]
pub struct RequestQueue {
    requests: Arc<Mutex<Vec<ShiftRequest>>>,
    subscribers: Arc<Mutex<Subscribers<ShiftRequest>>>,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            subscribers: Arc::new(Mutex::new(Subscribers::new())),
        }
    }

    pub fn insert(&self, request: ShiftRequest) {
        debug!(
            "request {} queued for employee {} on {}",
            request.id, request.employee_id, request.date
        );
        self.requests.lock().unwrap().push(request.clone());
        self.subscribers.lock().unwrap().notify(&request);
    }

    pub fn get(&self, id: &str) -> Option<ShiftRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn update_status(&self, id: &str, status: RequestStatus) -> Result<ShiftRequest, QueueError> {
        let updated = {
            let mut requests = self.requests.lock().unwrap();
            let request = requests
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
            request.status = status;
            request.clone()
        };
        self.subscribers.lock().unwrap().notify(&updated);
        Ok(updated)
    }

    /// Requests with the given status, newest first.
    pub fn by_status(&self, status: RequestStatus) -> Vec<ShiftRequest> {
        let mut matching: Vec<ShiftRequest> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    pub fn by_employee(&self, employee_id: &str) -> Vec<ShiftRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect()
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&ShiftRequest) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.subscribers.lock().unwrap().add(Box::new(callback))
    }

    /// Live subscription restricted by status and/or employee; events
    /// outside the filter are dropped before the callback sees them.
    pub fn subscribe_filtered(
        &self,
        status: Option<RequestStatus>,
        employee_id: Option<EmployeeId>,
        callback: impl Fn(&ShiftRequest) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.subscribe(move |request| {
            if let Some(status) = status {
                if request.status != status {
                    return;
                }
            }
            if let Some(employee_id) = &employee_id {
                if &request.employee_id != employee_id {
                    return;
                }
            }
            callback(request);
        })
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.lock().unwrap().remove(token)
    }
}

// --- DailyMetricStore ---

/// Daily external TGT figures, imported in bulk and read-only to the
/// derivation core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub saldato_tgt: Option<Decimal>,
    pub wo_tgt: Option<Decimal>,
}

#[derive(Clone)]
pub struct DailyMetricStore {
    data: Arc<Mutex<BTreeMap<DateKey, DailyMetric>>>,
}

impl Default for DailyMetricStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DailyMetricStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn get(&self, date: &str) -> Option<DailyMetric> {
        self.data.lock().unwrap().get(date).cloned()
    }

    /// Inclusive date-key range query. ISO keys sort lexicographically in
    /// chronological order, so a plain string range is correct.
    pub fn range(&self, start: &str, end: &str) -> BTreeMap<DateKey, DailyMetric> {
        self.data
            .lock()
            .unwrap()
            .range(start.to_string()..=end.to_string())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn merge(&self, date: &str, metric: DailyMetric) {
        self.data.lock().unwrap().insert(date.to_string(), metric);
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }
}

// --- EmployeeDirectory ---

/// Administrator-maintained roster. Schedule and request records reference
/// employees by id only; removing an employee does not cascade here (the
/// workflow layer clears the schedule document explicitly).
#[derive(Clone)]
pub struct EmployeeDirectory {
    employees: Arc<Mutex<BTreeMap<EmployeeId, Employee>>>,
    subscribers: Arc<Mutex<Subscribers<Vec<Employee>>>>,
}

impl Default for EmployeeDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl EmployeeDirectory {
    pub fn new() -> Self {
        Self {
            employees: Arc::new(Mutex::new(BTreeMap::new())),
            subscribers: Arc::new(Mutex::new(Subscribers::new())),
        }
    }

    pub fn list(&self) -> Vec<Employee> {
        self.employees.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Employee> {
        self.employees.lock().unwrap().get(id).cloned()
    }

    pub fn upsert(&self, employee: Employee) {
        self.employees
            .lock()
            .unwrap()
            .insert(employee.id.clone(), employee);
        self.notify();
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.employees.lock().unwrap().remove(id).is_some();
        if removed {
            self.notify();
        }
        removed
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&Vec<Employee>) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        self.subscribers.lock().unwrap().add(Box::new(callback))
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.lock().unwrap().remove(token)
    }

    fn notify(&self) {
        let roster = self.list();
        self.subscribers.lock().unwrap().notify(&roster);
    }
}
