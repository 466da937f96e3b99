use crate::db;
use crate::ipc::helpers::{parse_params, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use classroomd::scoring::{
    letter_grade, round_off_1_decimal, score_rubric, scored_weights, CriterionScore, Rubric,
    WeightCheck,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

fn weights_warning(check: &WeightCheck) -> Option<Value> {
    (!check.is_balanced()).then(|| {
        json!({
            "code": "weights_mismatch",
            "message": format!(
                "criterion weights total {} instead of {}",
                check.actual, check.expected
            ),
            "expected": check.expected,
            "actual": check.actual,
        })
    })
}

fn rubrics_templates() -> Result<Value, HandlerErr> {
    Ok(json!({ "templates": Rubric::templates() }))
}

fn rubrics_list(state: &AppState) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let rubrics = db::rubrics_list(conn).map_err(HandlerErr::db("db_query_failed"))?;
    let rubrics: Vec<Value> = rubrics
        .into_iter()
        .map(|(id, r)| json!({ "id": id, "rubric": r }))
        .collect();
    Ok(json!({ "rubrics": rubrics }))
}

#[derive(Deserialize)]
struct SaveParams {
    rubric: Rubric,
}

fn rubrics_save(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let SaveParams { rubric } = parse_params(params)?;
    if rubric.name.trim().is_empty() {
        return Err(HandlerErr::bad_params("rubric name must not be empty"));
    }
    if rubric.criteria.is_empty() {
        return Err(HandlerErr::bad_params("rubric must have at least one criterion"));
    }
    rubric.validate_criteria()?;

    let check = rubric.check_weights();
    if !check.is_balanced() {
        warn!(
            rubric = %rubric.name,
            actual = check.actual,
            "rubric save refused: weights do not total 100"
        );
        return Err(HandlerErr::new(
            "weights_mismatch",
            format!("criterion weights total {} instead of {}", check.actual, check.expected),
        )
        .with_details(json!(check)));
    }

    let id = db::rubric_insert(conn, &rubric).map_err(HandlerErr::db("db_insert_failed"))?;
    info!(rubric_id = %id, rubric = %rubric.name, "rubric saved");
    Ok(json!({ "rubricId": id }))
}

#[derive(Deserialize)]
struct ScoreParams {
    scores: Vec<CriterionScore>,
}

fn score_rubric_handler(params: &Value) -> Result<Value, HandlerErr> {
    let ScoreParams { scores } = parse_params(params)?;
    let total = score_rubric(&scores)?;

    let check = scored_weights(&scores);
    let percentage =
        (check.actual > 0.0).then(|| round_off_1_decimal(100.0 * total / check.actual));
    let criteria: Vec<Value> = scores
        .iter()
        .map(|s| {
            json!({
                "name": s.criterion.name,
                "weight": s.criterion.weight,
                "rawScore": s.raw_score,
                "level": s.level(),
            })
        })
        .collect();

    Ok(json!({
        "score": total,
        "percentage": percentage,
        "letter": percentage.map(letter_grade),
        "criteria": criteria,
        "warnings": weights_warning(&check).into_iter().collect::<Vec<_>>(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "rubrics.templates" => rubrics_templates(),
        "rubrics.list" => rubrics_list(state),
        "rubrics.save" => rubrics_save(state, &req.params),
        "grading.scoreRubric" => score_rubric_handler(&req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
