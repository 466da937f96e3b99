use crate::db::{self, SubmissionInsert};
use crate::ipc::handlers::assignments::load_assignment;
use crate::ipc::helpers::{get_required_str, parse_params, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use classroomd::roster::export::{export_file_name, grades_csv};
use classroomd::scoring::{
    format_percent, letter_grade, score_multiple_choice, score_rubric, scored_weights, AnswerKey,
    AnswerSheet, Choice, CriterionScore, MultipleChoiceScore, PointsCheck,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Answers arrive as `"A"`..`"E"`, blank or null.
fn parse_answers(raw: &[Option<String>]) -> Result<Vec<Option<Choice>>, HandlerErr> {
    raw.iter()
        .map(|a| match a.as_deref() {
            None => Ok(None),
            Some(s) => Choice::parse_answer(s).map_err(HandlerErr::from),
        })
        .collect()
}

fn points_warning(check: &PointsCheck) -> Option<Value> {
    (!check.is_balanced()).then(|| {
        json!({
            "code": "points_mismatch",
            "message": format!(
                "answer key points total {} but the assignment is worth {}",
                check.actual, check.expected
            ),
            "expected": check.expected,
            "actual": check.actual,
        })
    })
}

fn score_json(score: &MultipleChoiceScore, warnings: Vec<Value>) -> Value {
    json!({
        "score": score.score,
        "percentage": score.percentage,
        "percentLabel": format_percent(score.percentage),
        "letter": letter_grade(score.percentage),
        "correct": score.correct,
        "correctCount": score.correct_count(),
        "warnings": warnings,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreMcParams {
    #[serde(default)]
    student_id: Option<String>,
    answers: Vec<Option<String>>,
    #[serde(default)]
    assignment_id: Option<String>,
    #[serde(default)]
    key: Option<AnswerKey>,
    #[serde(default)]
    total_points: Option<f64>,
}

/// Key and total come from the stored assignment, or inline for ad-hoc scoring.
fn score_multiple_choice_handler(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let p: ScoreMcParams = parse_params(params)?;
    let (key, total_points) = match (p.key, p.assignment_id.as_deref()) {
        (Some(key), _) => {
            let total = p
                .total_points
                .ok_or_else(|| HandlerErr::bad_params("missing totalPoints"))?;
            (key, total)
        }
        (None, Some(id)) => {
            let conn = state.conn()?;
            let assignment = load_assignment(conn, id)?;
            let key = db::answer_key_get(conn, id)
                .map_err(HandlerErr::db("db_query_failed"))?
                .ok_or_else(|| HandlerErr::not_found("answer key", id))?;
            (key, p.total_points.unwrap_or(assignment.total_points))
        }
        (None, None) => return Err(HandlerErr::bad_params("missing key or assignmentId")),
    };

    let sheet = AnswerSheet::new(p.student_id.unwrap_or_default(), parse_answers(&p.answers)?);
    let score = score_multiple_choice(&sheet, &key, total_points)?;
    let warnings = points_warning(&key.check_points(total_points))
        .into_iter()
        .collect();
    debug!(
        student_id = %sheet.student_id,
        score = score.score,
        percentage = score.percentage,
        "multiple choice scored"
    );
    Ok(score_json(&score, warnings))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionParams {
    student_id: String,
    #[serde(default)]
    answers: Option<Vec<Option<String>>>,
    #[serde(default)]
    criterion_scores: Option<Vec<CriterionScore>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveSubmissionsParams {
    assignment_id: String,
    submissions: Vec<SubmissionParams>,
}

/// Scores every submission and stores them as finalized grades in one
/// transaction. Nothing is stored when any submission fails to score, or
/// when its key or rubric does not balance.
fn save_submissions(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let p: SaveSubmissionsParams = parse_params(params)?;
    let conn = state.conn()?;
    let assignment = load_assignment(conn, &p.assignment_id)?;
    let key = if assignment.kind == "multiple_choice" {
        let key = db::answer_key_get(conn, &p.assignment_id)
            .map_err(HandlerErr::db("db_query_failed"))?
            .ok_or_else(|| HandlerErr::not_found("answer key", &p.assignment_id))?;
        let check = key.check_points(assignment.total_points);
        if !check.is_balanced() {
            warn!(
                assignment_id = %p.assignment_id,
                expected = check.expected,
                actual = check.actual,
                "submissions refused: answer key points do not sum to assignment total"
            );
            return Err(HandlerErr::new(
                "points_mismatch",
                "answer key points do not sum to the assignment total",
            )
            .with_details(json!(check)));
        }
        Some(key)
    } else {
        None
    };

    let mut rows = Vec::with_capacity(p.submissions.len());
    for (i, sub) in p.submissions.iter().enumerate() {
        let in_class = db::student_in_class(conn, &assignment.class_id, &sub.student_id)
            .map_err(HandlerErr::db("db_query_failed"))?;
        if !in_class {
            return Err(HandlerErr::not_found("student", &sub.student_id));
        }
        let at_index = |e: HandlerErr| {
            let mut details = e.details.clone().unwrap_or_else(|| json!({}));
            details["index"] = json!(i);
            e.with_details(details)
        };

        let (final_grade, detail) = match (&key, &sub.answers, &sub.criterion_scores) {
            (Some(key), Some(answers), _) => {
                let sheet = AnswerSheet::new(
                    sub.student_id.clone(),
                    parse_answers(answers).map_err(at_index)?,
                );
                let score = score_multiple_choice(&sheet, key, assignment.total_points)
                    .map_err(|e| at_index(e.into()))?;
                (score.score, json!({ "answers": sheet.answers, "correct": score.correct }))
            }
            (None, _, Some(scores)) => {
                let check = scored_weights(scores);
                if !check.is_balanced() {
                    warn!(
                        assignment_id = %p.assignment_id,
                        index = i,
                        actual = check.actual,
                        "submissions refused: criterion weights do not total 100"
                    );
                    return Err(at_index(
                        HandlerErr::new(
                            "weights_mismatch",
                            format!(
                                "criterion weights total {} instead of {}",
                                check.actual, check.expected
                            ),
                        )
                        .with_details(json!(check)),
                    ));
                }
                let total = score_rubric(scores).map_err(|e| at_index(e.into()))?;
                (total, json!({ "criterionScores": scores }))
            }
            _ => {
                return Err(at_index(HandlerErr::bad_params(
                    "submission must carry answers (multiple choice) or criterionScores (essay)",
                )))
            }
        };
        rows.push(SubmissionInsert {
            student_id: sub.student_id.clone(),
            final_grade,
            detail,
        });
    }

    let conn = state.conn_mut()?;
    let saved = db::submissions_insert(conn, &p.assignment_id, &rows)
        .map_err(HandlerErr::db("db_insert_failed"))?;
    info!(assignment_id = %p.assignment_id, saved, "submissions finalized");
    Ok(json!({ "saved": saved }))
}

fn grades_export(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let assignment_id = get_required_str(params, "assignmentId")?;
    let assignment = load_assignment(conn, &assignment_id)?;
    let entries =
        db::grade_entries(conn, &assignment_id).map_err(HandlerErr::db("db_query_failed"))?;
    let csv = grades_csv(&entries, assignment.total_points)
        .map_err(|e| HandlerErr::new("export_failed", e.to_string()))?;

    let out_path = params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    if let Some(path) = &out_path {
        std::fs::write(path, &csv).map_err(|e| {
            HandlerErr::new("io_failed", e.to_string())
                .with_details(json!({ "path": path.to_string_lossy() }))
        })?;
    }

    Ok(json!({
        "fileName": export_file_name(&assignment.title, "grades"),
        "rowCount": entries.len(),
        "csv": csv,
        "outPath": out_path.map(|p| p.to_string_lossy().to_string()),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "grading.scoreMultipleChoice" => score_multiple_choice_handler(state, &req.params),
        "grading.saveSubmissions" => save_submissions(state, &req.params),
        "grades.export" => grades_export(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
