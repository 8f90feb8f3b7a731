// src/requests_tests.rs

#[cfg(test)]
mod tests {
    use crate::requests::{RequestWorkflow, SubmitOutcome};
    use crate::roster::Employee;
    use crate::stores::{
        date_key, RequestQueue, RequestStatus, ScheduleStore, ShiftMap,
    };
    use chrono::NaiveDate;

    fn d(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("invalid date string: {}", date))
    }

    fn setup() -> (ScheduleStore, RequestQueue, RequestWorkflow, Employee) {
        let schedule = ScheduleStore::new();
        let queue = RequestQueue::new();
        let workflow = RequestWorkflow::new(schedule.clone(), queue.clone());
        let employee = Employee::new("e1", "Anna", 40);
        (schedule, queue, workflow, employee)
    }

    fn set_shift(schedule: &ScheduleStore, employee_id: &str, date: &str, shift: &str) {
        schedule.merge(
            employee_id,
            ShiftMap::from([(date.to_string(), shift.to_string())]),
        );
    }

    fn submitted(outcome: SubmitOutcome) -> crate::stores::ShiftRequest {
        match outcome {
            SubmitOutcome::Created(request) => request,
            SubmitOutcome::Unchanged => panic!("expected a created request"),
        }
    }

    // --- Submit ---

    #[test]
    fn submit_captures_the_shift_in_effect_at_submission_time() {
        let (schedule, queue, workflow, employee) = setup();
        set_shift(&schedule, "e1", "2025-03-03", "Riposo");

        let request = submitted(workflow.submit(&employee, d("2025-03-03"), "09:30-13:00", ""));
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.original_shift, "Riposo");
        assert_eq!(request.details, "09:30-13:00");
        assert_eq!(request.employee_id, "e1");
        assert_eq!(request.date, "2025-03-03");
        assert_eq!(queue.by_status(RequestStatus::Pending).len(), 1);
        // Submission alone never touches the schedule.
        assert_eq!(
            schedule.get("e1").get("2025-03-03").map(String::as_str),
            Some("Riposo")
        );
    }

    #[test]
    fn submit_of_the_current_shift_is_a_no_op() {
        let (schedule, queue, workflow, employee) = setup();
        set_shift(&schedule, "e1", "2025-03-03", "Riposo");

        let outcome = workflow.submit(&employee, d("2025-03-03"), "Riposo", "");
        assert_eq!(outcome, SubmitOutcome::Unchanged);
        assert!(queue.by_status(RequestStatus::Pending).is_empty());
    }

    #[test]
    fn submit_on_a_day_without_a_shift_compares_against_empty() {
        let (_, queue, workflow, employee) = setup();

        // Proposing "nothing" where nothing is stored changes nothing.
        assert_eq!(
            workflow.submit(&employee, d("2025-03-03"), "", ""),
            SubmitOutcome::Unchanged
        );
        // Proposing an actual shift does file a request.
        let request = submitted(workflow.submit(&employee, d("2025-03-03"), "09:30-13:00", ""));
        assert_eq!(request.original_shift, "");
        assert_eq!(queue.by_status(RequestStatus::Pending).len(), 1);
    }

    // --- Approve / reject ---

    #[test]
    fn approval_commits_the_proposal_and_is_terminal() {
        let (schedule, queue, workflow, employee) = setup();
        set_shift(&schedule, "e1", "2025-03-03", "Riposo");
        let request = submitted(workflow.submit(&employee, d("2025-03-03"), "09:30-13:00", ""));

        let approved = workflow.approve(&request.id).unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(
            schedule.get("e1").get("2025-03-03").map(String::as_str),
            Some("09:30-13:00")
        );

        // Terminal state: a second approve and a late reject are no-ops.
        set_shift(&schedule, "e1", "2025-03-03", "14:00-18:00");
        let again = workflow.approve(&request.id).unwrap();
        assert_eq!(again.status, RequestStatus::Approved);
        let rejected = workflow.reject(&request.id).unwrap();
        assert_eq!(rejected.status, RequestStatus::Approved);
        // Neither replayed the proposal over the later edit.
        assert_eq!(
            schedule.get("e1").get("2025-03-03").map(String::as_str),
            Some("14:00-18:00")
        );
        assert!(queue.by_status(RequestStatus::Pending).is_empty());
    }

    #[test]
    fn rejection_leaves_the_schedule_untouched() {
        let (schedule, _, workflow, employee) = setup();
        set_shift(&schedule, "e1", "2025-03-03", "Riposo");
        let request = submitted(workflow.submit(&employee, d("2025-03-03"), "09:30-13:00", ""));

        let rejected = workflow.reject(&request.id).unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(
            schedule.get("e1").get("2025-03-03").map(String::as_str),
            Some("Riposo")
        );
    }

    #[test]
    fn approving_a_clear_request_removes_the_date() {
        let (schedule, _, workflow, employee) = setup();
        set_shift(&schedule, "e1", "2025-03-03", "09:30-13:00");
        let request = submitted(workflow.submit(&employee, d("2025-03-03"), "", ""));

        workflow.approve(&request.id).unwrap();
        assert!(!schedule.get("e1").contains_key("2025-03-03"));
    }

    // Approval does not re-validate original_shift against the live value:
    // a delayed approval overwrites whatever landed in between. This pins
    // the accepted last-write-wins hazard.
    #[test]
    fn delayed_approval_overwrites_an_intervening_edit() {
        let (schedule, _, workflow, employee) = setup();
        set_shift(&schedule, "e1", "2025-03-03", "Riposo");
        let request = submitted(workflow.submit(&employee, d("2025-03-03"), "09:30-13:00", ""));

        // Another path changes the shift while the request sits pending.
        set_shift(&schedule, "e1", "2025-03-03", "Ferie");

        workflow.approve(&request.id).unwrap();
        assert_eq!(
            schedule.get("e1").get("2025-03-03").map(String::as_str),
            Some("09:30-13:00")
        );
    }

    #[test]
    fn adjudicating_an_unknown_request_is_an_error() {
        let (_, _, workflow, _) = setup();
        assert!(workflow.approve("missing").is_err());
        assert!(workflow.reject("missing").is_err());
    }

    // --- End-to-end scenario ---

    #[test]
    fn submit_then_approve_flows_into_the_schedule() {
        let (schedule, queue, workflow, employee) = setup();
        set_shift(&schedule, "e1", "2025-03-03", "Riposo");

        let request = submitted(workflow.submit(&employee, d("2025-03-03"), "09:30-13:00", "turno mattina"));
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.original_shift, "Riposo");
        assert_eq!(request.notes, "turno mattina");

        workflow.approve(&request.id).unwrap();
        assert_eq!(
            schedule.get("e1").get("2025-03-03").map(String::as_str),
            Some("09:30-13:00")
        );
        assert_eq!(queue.get(&request.id).unwrap().status, RequestStatus::Approved);
        // The record survives as audit history.
        assert_eq!(queue.by_employee("e1").len(), 1);
    }

    // --- Copy previous week ---

    #[test]
    fn copy_previous_week_copies_present_days_and_clears_absent_ones() {
        let (schedule, _, workflow, employee) = setup();
        let roster = vec![employee];

        // Source week (Mon 2025-03-03): Monday and Wednesday set, Tuesday absent.
        set_shift(&schedule, "e1", "2025-03-03", "09:30-13:00");
        set_shift(&schedule, "e1", "2025-03-05", "Riposo");
        // Target week already has a Tuesday entry that must be erased.
        set_shift(&schedule, "e1", "2025-03-11", "14:00-18:00");

        workflow.copy_previous_week(d("2025-03-10"), &roster);

        let map = schedule.get("e1");
        assert_eq!(map.get("2025-03-10").map(String::as_str), Some("09:30-13:00"));
        assert!(!map.contains_key("2025-03-11")); // explicit deletion
        assert_eq!(map.get("2025-03-12").map(String::as_str), Some("Riposo"));
        // Source week is untouched.
        assert_eq!(map.get("2025-03-03").map(String::as_str), Some("09:30-13:00"));
    }

    #[test]
    fn copy_previous_week_is_idempotent_per_employee() {
        let (schedule, _, workflow, employee) = setup();
        let roster = vec![employee];
        set_shift(&schedule, "e1", "2025-03-04", "09:30-13:00");

        workflow.copy_previous_week(d("2025-03-10"), &roster);
        let first = schedule.get("e1");
        workflow.copy_previous_week(d("2025-03-10"), &roster);
        assert_eq!(schedule.get("e1"), first);
    }

    #[test]
    fn copy_previous_week_handles_each_employee_independently() {
        let (schedule, _, workflow, _) = setup();
        let roster = vec![Employee::new("e1", "Anna", 40), Employee::new("e2", "Bruno", 20)];
        set_shift(&schedule, "e1", "2025-03-03", "09:30-13:00");
        set_shift(&schedule, "e2", "2025-03-04", "14:00-18:00");

        workflow.copy_previous_week(d("2025-03-10"), &roster);

        assert_eq!(
            schedule.get("e1").get("2025-03-10").map(String::as_str),
            Some("09:30-13:00")
        );
        assert!(!schedule.get("e1").contains_key("2025-03-11"));
        assert_eq!(
            schedule.get("e2").get("2025-03-11").map(String::as_str),
            Some("14:00-18:00")
        );
    }

    #[test]
    fn date_keys_render_iso() {
        assert_eq!(date_key(d("2025-03-03")), "2025-03-03");
    }
}
