// src/requests.rs
//
// Change-request state machine. pending -> approved and pending -> rejected
// are the only transitions and both are terminal; an adjudication call on a
// non-pending request is a logged no-op so a double-click never re-commits.

use chrono::{Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::occupancy::week_dates;
use crate::roster::Employee;
use crate::stores::{
    date_key, new_document_id, QueueError, RequestKind, RequestQueue, RequestStatus,
    ScheduleStore, ShiftMap, ShiftRequest,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Outcome of a submit call. `Unchanged` is the idempotence guard: a
/// proposal equal to the shift already in effect creates no record at all.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(ShiftRequest),
    Unchanged,
}

#[derive(Clone)]
pub struct RequestWorkflow {
    schedule: ScheduleStore,
    queue: RequestQueue,
}

impl RequestWorkflow {
    pub fn new(schedule: ScheduleStore, queue: RequestQueue) -> Self {
        Self { schedule, queue }
    }

    /// Files a change request for `employee` on `date`. The shift currently
    /// in effect (empty string when none is stored) is captured as
    /// `original_shift` for the audit trail; it is not re-checked at
    /// approval time.
    pub fn submit(
        &self,
        employee: &Employee,
        date: NaiveDate,
        proposed_shift: &str,
        notes: &str,
    ) -> SubmitOutcome {
        let key = date_key(date);
        let current = self
            .schedule
            .get(&employee.id)
            .get(&key)
            .cloned()
            .unwrap_or_default();
        if proposed_shift == current {
            debug!(
                "request from {} for {} proposes the current shift, nothing to file",
                employee.id, key
            );
            return SubmitOutcome::Unchanged;
        }
        let request = ShiftRequest {
            id: new_document_id(),
            kind: RequestKind::ShiftChange,
            employee_id: employee.id.clone(),
            employee_name: employee.name.clone(),
            employee_color: employee.color.clone(),
            date: key,
            details: proposed_shift.to_string(),
            original_shift: current,
            notes: notes.to_string(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        self.queue.insert(request.clone());
        SubmitOutcome::Created(request)
    }

    /// Commits a pending request: the proposed shift overwrites whatever is
    /// currently stored, then the request is marked approved. Last-write
    /// wins: an edit that landed between submission and approval is
    /// silently replaced.
    pub fn approve(&self, request_id: &str) -> Result<ShiftRequest, WorkflowError> {
        let request = self
            .queue
            .get(request_id)
            .ok_or(QueueError::NotFound(request_id.to_string()))?;
        if request.status != RequestStatus::Pending {
            warn!(
                "approve on request {} in terminal state {:?}, ignoring",
                request.id, request.status
            );
            return Ok(request);
        }
        match request.kind {
            RequestKind::ShiftChange => {
                self.schedule.merge(
                    &request.employee_id,
                    ShiftMap::from([(request.date.clone(), request.details.clone())]),
                );
            }
        }
        let updated = self.queue.update_status(request_id, RequestStatus::Approved)?;
        info!(
            "request {} approved: {} on {} is now '{}'",
            updated.id, updated.employee_id, updated.date, updated.details
        );
        Ok(updated)
    }

    /// Marks a pending request rejected. No schedule mutation.
    pub fn reject(&self, request_id: &str) -> Result<ShiftRequest, WorkflowError> {
        let request = self
            .queue
            .get(request_id)
            .ok_or(QueueError::NotFound(request_id.to_string()))?;
        if request.status != RequestStatus::Pending {
            warn!(
                "reject on request {} in terminal state {:?}, ignoring",
                request.id, request.status
            );
            return Ok(request);
        }
        let updated = self.queue.update_status(request_id, RequestStatus::Rejected)?;
        info!("request {} rejected", updated.id);
        Ok(updated)
    }

    /// Fills the week starting at `target_week_start` from the week before,
    /// one batched read-modify-write per employee. A target day whose source
    /// day is absent is explicitly cleared, not skipped: copying an empty
    /// day erases the destination day.
    pub fn copy_previous_week(&self, target_week_start: NaiveDate, employees: &[Employee]) {
        for employee in employees {
            let mut document: ShiftMap = self.schedule.get(&employee.id);
            for target_date in week_dates(target_week_start) {
                let source_key = date_key(target_date - Duration::days(7));
                let target_key = date_key(target_date);
                match document.get(&source_key).cloned() {
                    Some(shift) => {
                        document.insert(target_key, shift);
                    }
                    None => {
                        document.remove(&target_key);
                    }
                }
            }
            self.schedule.replace(&employee.id, document);
        }
        info!(
            "copied previous week into week of {} for {} employees",
            target_week_start,
            employees.len()
        );
    }
}
