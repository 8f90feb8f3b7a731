// src/main.rs
use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Weekday};
use clap::Parser;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod occupancy;
mod requests;
mod roster;
mod shift;
mod stores;
mod tgt_import;
mod time_grid;

#[cfg(test)]
mod requests_tests;

use occupancy::{
    headcount_for_day, pro_rata_allocation, week_dates, week_number, week_start,
    weekly_hours_by_employee, working_employees_on,
};
use requests::{RequestWorkflow, SubmitOutcome, WorkflowError};
use roster::{Employee, EmployeeId, EMPLOYEE_COLORS};
use shift::calculate_hours;
use stores::{
    date_key, new_document_id, parse_date_key, DailyMetric, DailyMetricStore, EmployeeDirectory,
    QueueError, RequestQueue, RequestStatus, ScheduleStore, ShiftMap, ShiftRequest,
};
use tgt_import::{import_sheet, ImportOutcome};
use time_grid::{minutes_to_time, GridError, TimeSlotGrid, STANDARD_GRID};

// --- Errors ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("unknown request status '{0}'")]
    UnknownStatus(String),
    #[error("employee '{0}' not found")]
    UnknownEmployee(String),
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("grid configuration error: {0}")]
    GridConfig(#[from] GridError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidDate(_) | AppError::UnknownStatus(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownEmployee(_) => StatusCode::NOT_FOUND,
            AppError::Workflow(WorkflowError::Queue(QueueError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            AppError::Config(_) | AppError::GridConfig(_) => {
                tracing::error!("internal error: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// --- Configuration ---

#[derive(Parser, Debug)]
#[command(name = "orari-core", about = "Weekly shift schedule server")]
struct CliArgs {
    /// Address to bind the HTTP server on.
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

/// The grid window is deployment configuration: slot width drives merge and
/// overlap precision, so it is never a literal sprinkled through the code.
fn grid_from_env() -> Result<TimeSlotGrid, AppError> {
    let start = env::var("GRID_START").ok();
    let end = env::var("GRID_END").ok();
    let slot = env::var("GRID_SLOT_MINUTES").ok();
    if start.is_none() && end.is_none() && slot.is_none() {
        return Ok(STANDARD_GRID.clone());
    }
    let slot_minutes: u32 = match slot {
        None => STANDARD_GRID.slot_minutes(),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("invalid GRID_SLOT_MINUTES '{}'", raw)))?,
    };
    let grid = TimeSlotGrid::new(
        start.as_deref().unwrap_or("09:30"),
        end.as_deref().unwrap_or("21:00"),
        slot_minutes,
    )?;
    Ok(grid)
}

// --- Shared application state ---

#[derive(Clone)]
struct AppState {
    grid: TimeSlotGrid,
    employees: EmployeeDirectory,
    schedule: ScheduleStore,
    queue: RequestQueue,
    metrics: DailyMetricStore,
    workflow: RequestWorkflow,
}

// --- Main ---

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into()));
    fmt().with_env_filter(filter).init();

    let args = CliArgs::parse();
    let grid = grid_from_env()?;
    info!(
        "slot grid: {} - {} in {}-minute slots ({} slots)",
        minutes_to_time(grid.start_minutes()),
        minutes_to_time(grid.end_minutes()),
        grid.slot_minutes(),
        grid.slot_count()
    );

    let employees = EmployeeDirectory::new();
    let schedule = ScheduleStore::new();
    let queue = RequestQueue::new();
    let metrics = DailyMetricStore::new();
    let workflow = RequestWorkflow::new(schedule.clone(), queue.clone());

    // Live observers: derived figures are recomputed on every change
    // notification, never by polling the stores.
    let _schedule_watch = {
        let directory = employees.clone();
        schedule.subscribe(move |event| {
            let name = directory
                .get(&event.employee_id)
                .map(|e| e.name)
                .unwrap_or_else(|| event.employee_id.clone());
            let scheduled: f64 = event.shifts.values().map(|s| calculate_hours(s)).sum();
            info!(
                "schedule updated for {}: {} dated entries, {:.2} scheduled hours",
                name,
                event.shifts.len(),
                scheduled
            );
        })
    };
    let _pending_watch = queue.subscribe_filtered(Some(RequestStatus::Pending), None, |request| {
        info!(
            "new pending request {} ({} on {}: '{}' -> '{}')",
            request.id,
            request.employee_name,
            request.date,
            request.original_shift,
            request.details
        );
    });
    let _request_watch = queue.subscribe(|request| {
        if request.status != RequestStatus::Pending {
            info!("request {} moved to {:?}", request.id, request.status);
        }
    });

    let state = AppState {
        grid,
        employees,
        schedule,
        queue,
        metrics,
        workflow,
    };

    let api_routes = Router::new()
        .route(
            "/employees",
            get(handle_list_employees).post(handle_create_employee),
        )
        .route(
            "/employees/{id}",
            put(handle_update_employee).delete(handle_delete_employee),
        )
        .route("/schedules/{employee_id}", get(handle_get_schedule))
        .route("/schedules/{employee_id}/{date}", put(handle_set_shift))
        .route(
            "/requests",
            get(handle_list_requests).post(handle_submit_request),
        )
        .route("/requests/{id}/approve", post(handle_approve_request))
        .route("/requests/{id}/reject", post(handle_reject_request))
        .route(
            "/weeks/{date}/copy-previous",
            post(handle_copy_previous_week),
        )
        .route("/weeks/{date}/hours", get(handle_weekly_hours))
        .route("/days/{date}/headcount", get(handle_headcount))
        .route("/days/{date}/tgt", get(handle_daily_tgt))
        .route("/tgt", get(handle_tgt_range))
        .route("/tgt/import", post(handle_import_tgt));

    let app = Router::new()
        .nest("/api", api_routes)
        .route("/status", get(handle_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from((args.bind, args.port));
    info!("starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

// --- Shared handler helpers ---

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_date_key(raw).ok_or_else(|| AppError::InvalidDate(raw.to_string()))
}

fn require_employee(state: &AppState, id: &str) -> Result<Employee, AppError> {
    state
        .employees
        .get(id)
        .ok_or_else(|| AppError::UnknownEmployee(id.to_string()))
}

// --- Roster handlers ---

#[derive(Deserialize)]
struct EmployeeInput {
    name: String,
    color: Option<String>,
    weekly_hours: u32,
    preferred_day: Option<Weekday>,
}

async fn handle_list_employees(State(state): State<AppState>) -> Json<Vec<Employee>> {
    Json(state.employees.list())
}

async fn handle_create_employee(
    State(state): State<AppState>,
    Json(input): Json<EmployeeInput>,
) -> Json<Employee> {
    let color = input.color.unwrap_or_else(|| {
        EMPLOYEE_COLORS[state.employees.list().len() % EMPLOYEE_COLORS.len()].to_string()
    });
    let employee = Employee {
        id: new_document_id(),
        name: input.name,
        color,
        weekly_hours: input.weekly_hours,
        preferred_day: input.preferred_day,
    };
    state.employees.upsert(employee.clone());
    Json(employee)
}

async fn handle_update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<EmployeeInput>,
) -> Result<Json<Employee>, AppError> {
    let mut employee = require_employee(&state, &id)?;
    employee.name = input.name;
    if let Some(color) = input.color {
        employee.color = color;
    }
    employee.weekly_hours = input.weekly_hours;
    employee.preferred_day = input.preferred_day;
    state.employees.upsert(employee.clone());
    Ok(Json(employee))
}

/// Removing an employee also removes the schedule document; requests stay
/// in the queue as audit history.
async fn handle_delete_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.employees.remove(&id) {
        return Err(AppError::UnknownEmployee(id));
    }
    state.schedule.remove_employee(&id);
    Ok(StatusCode::NO_CONTENT)
}

// --- Schedule handlers ---

async fn handle_get_schedule(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Json<ShiftMap> {
    // A missing employee reads as an empty schedule, never an error.
    Json(state.schedule.get(&employee_id))
}

#[derive(Deserialize)]
struct SetShiftBody {
    shift: String,
}

/// Administrator direct edit: writes (or clears, for an empty shift) one
/// date without going through the request workflow.
async fn handle_set_shift(
    State(state): State<AppState>,
    Path((employee_id, date)): Path<(String, String)>,
    Json(body): Json<SetShiftBody>,
) -> Result<Json<ShiftMap>, AppError> {
    require_employee(&state, &employee_id)?;
    let date = parse_date(&date)?;
    state
        .schedule
        .merge(&employee_id, ShiftMap::from([(date_key(date), body.shift)]));
    Ok(Json(state.schedule.get(&employee_id)))
}

// --- Request handlers ---

#[derive(Deserialize)]
struct SubmitRequestBody {
    employee_id: EmployeeId,
    date: String,
    details: String,
    #[serde(default)]
    notes: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    created: bool,
    request: Option<ShiftRequest>,
}

async fn handle_submit_request(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequestBody>,
) -> Result<Json<SubmitResponse>, AppError> {
    let employee = require_employee(&state, &body.employee_id)?;
    let date = parse_date(&body.date)?;
    let response = match state
        .workflow
        .submit(&employee, date, &body.details, &body.notes)
    {
        SubmitOutcome::Created(request) => SubmitResponse {
            created: true,
            request: Some(request),
        },
        SubmitOutcome::Unchanged => SubmitResponse {
            created: false,
            request: None,
        },
    };
    Ok(Json(response))
}

#[derive(Deserialize)]
struct RequestFilter {
    status: Option<String>,
}

async fn handle_list_requests(
    State(state): State<AppState>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<ShiftRequest>>, AppError> {
    let status = match filter.status.as_deref() {
        None | Some("pending") => RequestStatus::Pending,
        Some("approved") => RequestStatus::Approved,
        Some("rejected") => RequestStatus::Rejected,
        Some(other) => return Err(AppError::UnknownStatus(other.to_string())),
    };
    Ok(Json(state.queue.by_status(status)))
}

async fn handle_approve_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShiftRequest>, AppError> {
    Ok(Json(state.workflow.approve(&id)?))
}

async fn handle_reject_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShiftRequest>, AppError> {
    Ok(Json(state.workflow.reject(&id)?))
}

#[derive(Serialize)]
struct CopyWeekResponse {
    week_start: String,
    employees: usize,
}

async fn handle_copy_previous_week(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<CopyWeekResponse>, AppError> {
    let start = week_start(parse_date(&date)?);
    let roster = state.employees.list();
    state.workflow.copy_previous_week(start, &roster);
    Ok(Json(CopyWeekResponse {
        week_start: date_key(start),
        employees: roster.len(),
    }))
}

// --- Derived-view handlers ---

#[derive(Serialize)]
struct SlotHeadcount {
    time: String,
    count: u32,
}

#[derive(Serialize)]
struct HeadcountResponse {
    date: String,
    slots: Vec<SlotHeadcount>,
}

async fn handle_headcount(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<HeadcountResponse>, AppError> {
    let date = parse_date(&date)?;
    let roster = state.employees.list();
    let snapshot = state.schedule.snapshot();
    let counts = headcount_for_day(date, &roster, &snapshot, &state.grid);
    let slots = state
        .grid
        .slot_starts()
        .into_iter()
        .zip(counts)
        .map(|(start, count)| SlotHeadcount {
            time: minutes_to_time(start),
            count,
        })
        .collect();
    Ok(Json(HeadcountResponse {
        date: date_key(date),
        slots,
    }))
}

#[derive(Serialize)]
struct WeeklyHoursResponse {
    week_start: String,
    week_number: u32,
    hours: HashMap<EmployeeId, f64>,
}

async fn handle_weekly_hours(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<WeeklyHoursResponse>, AppError> {
    let start = week_start(parse_date(&date)?);
    let roster = state.employees.list();
    let snapshot = state.schedule.snapshot();
    let hours = weekly_hours_by_employee(&week_dates(start), &roster, &snapshot);
    Ok(Json(WeeklyHoursResponse {
        week_start: date_key(start),
        week_number: week_number(start),
        hours,
    }))
}

#[derive(Serialize)]
struct DailyTgtResponse {
    date: String,
    metric: Option<DailyMetric>,
    wo_allocation: HashMap<EmployeeId, Decimal>,
}

/// The WO-TGT figure for a day, split pro-rata by contracted hours among
/// the employees actually working that day.
async fn handle_daily_tgt(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DailyTgtResponse>, AppError> {
    let date = parse_date(&date)?;
    let key = date_key(date);
    let metric = state.metrics.get(&key);
    let wo_allocation = match metric.as_ref().and_then(|m| m.wo_tgt) {
        Some(value) => {
            let roster = state.employees.list();
            let snapshot = state.schedule.snapshot();
            let working = working_employees_on(date, &roster, &snapshot);
            pro_rata_allocation(value, &working)
        }
        None => HashMap::new(),
    };
    Ok(Json(DailyTgtResponse {
        date: key,
        metric,
        wo_allocation,
    }))
}

#[derive(Deserialize)]
struct TgtRangeParams {
    start: String,
    end: String,
}

async fn handle_tgt_range(
    State(state): State<AppState>,
    Query(params): Query<TgtRangeParams>,
) -> Result<Json<std::collections::BTreeMap<String, DailyMetric>>, AppError> {
    parse_date(&params.start)?;
    parse_date(&params.end)?;
    Ok(Json(state.metrics.range(&params.start, &params.end)))
}

async fn handle_import_tgt(State(state): State<AppState>, body: String) -> Json<ImportOutcome> {
    Json(import_sheet(body.as_bytes(), &state.metrics))
}

// --- Status ---

async fn handle_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "time": chrono::Local::now().to_rfc3339(),
        "employees": state.employees.list().len(),
        "pending_requests": state.queue.by_status(RequestStatus::Pending).len(),
        "tgt_days": state.metrics.len(),
    }))
}
