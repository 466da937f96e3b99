use crate::db::{self, AssignmentRow};
use crate::ipc::helpers::{get_required_str, parse_params, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use classroomd::scoring::AnswerKey;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const ASSIGNMENT_KINDS: [&str; 2] = ["multiple_choice", "essay"];

pub fn load_assignment(
    conn: &Connection,
    assignment_id: &str,
) -> Result<AssignmentRow, HandlerErr> {
    db::get_assignment(conn, assignment_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("assignment", assignment_id))
}

fn positive_points(v: f64, key: &str) -> Result<f64, HandlerErr> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(HandlerErr::bad_params(format!("{} must be greater than zero", key)))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    class_id: String,
    title: String,
    kind: String,
    total_points: f64,
}

fn assignments_create(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let p: CreateParams = parse_params(params)?;
    let title = p.title.trim();
    if title.is_empty() {
        return Err(HandlerErr::bad_params("title must not be empty"));
    }
    if !ASSIGNMENT_KINDS.contains(&p.kind.as_str()) {
        return Err(HandlerErr::bad_params(
            "kind must be one of: multiple_choice, essay",
        ));
    }
    let total_points = positive_points(p.total_points, "totalPoints")?;
    if db::class_name(conn, &p.class_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("class", &p.class_id));
    }

    let id = db::create_assignment(conn, &p.class_id, title, &p.kind, total_points)
        .map_err(HandlerErr::db("db_insert_failed"))?;
    info!(assignment_id = %id, kind = %p.kind, "assignment created");
    Ok(json!({ "assignmentId": id }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefaultsParams {
    questions: u32,
    total_points: Option<f64>,
    assignment_id: Option<String>,
}

fn answer_key_defaults(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let p: DefaultsParams = parse_params(params)?;
    let total_points = match (p.total_points, p.assignment_id.as_deref()) {
        (Some(t), _) => t,
        (None, Some(id)) => load_assignment(state.conn()?, id)?.total_points,
        (None, None) => return Err(HandlerErr::bad_params("missing totalPoints or assignmentId")),
    };
    let total_points = positive_points(total_points, "totalPoints")?;
    let key = AnswerKey::with_defaults(p.questions, total_points);
    let check = key.check_points(total_points);
    Ok(json!({ "key": key, "pointsCheck": check, "balanced": check.is_balanced() }))
}

fn answer_key_get(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let assignment_id = get_required_str(params, "assignmentId")?;
    let assignment = load_assignment(conn, &assignment_id)?;
    let key =
        db::answer_key_get(conn, &assignment_id).map_err(HandlerErr::db("db_query_failed"))?;
    let check = key.as_ref().map(|k| k.check_points(assignment.total_points));
    Ok(json!({
        "assignment": assignment,
        "key": key,
        "pointsCheck": check,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveParams {
    assignment_id: String,
    key: AnswerKey,
}

fn answer_key_save(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let p: SaveParams = parse_params(params)?;
    let assignment = load_assignment(conn, &p.assignment_id)?;
    if p.key.is_empty() {
        return Err(HandlerErr::bad_params("answer key must have at least one question"));
    }
    p.key.validate_entries()?;

    let check = p.key.check_points(assignment.total_points);
    if !check.is_balanced() {
        warn!(
            assignment_id = %p.assignment_id,
            expected = check.expected,
            actual = check.actual,
            "answer key save refused: points do not sum to assignment total"
        );
        return Err(HandlerErr::new(
            "points_mismatch",
            format!(
                "answer key points total {} but the assignment is worth {}",
                check.actual, check.expected
            ),
        )
        .with_details(json!(check)));
    }

    db::answer_key_upsert(conn, &p.assignment_id, &p.key)
        .map_err(HandlerErr::db("db_insert_failed"))?;
    Ok(json!({ "ok": true, "questions": p.key.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "assignments.create" => assignments_create(state, &req.params),
        "answerKey.defaults" => answer_key_defaults(state, &req.params),
        "answerKey.get" => answer_key_get(state, &req.params),
        "answerKey.save" => answer_key_save(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
