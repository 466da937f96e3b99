use crate::db;
use crate::ipc::handlers::setup::{delimiter_from_name, import_defaults};
use crate::ipc::helpers::{get_optional_bool, get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use classroomd::roster::export::{export_file_name, roster_csv};
use classroomd::roster::{
    self, detect_columns, ColumnMapping, ImportError, ImportReport, InvalidRecord, ReadOptions,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

/// Import source: inline `text` wins over a file at `inPath`.
fn import_text(params: &Value) -> Result<String, HandlerErr> {
    if let Some(text) = params.get("text").and_then(|v| v.as_str()) {
        return Ok(text.to_string());
    }
    let in_path = params
        .get("inPath")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params("missing text or inPath"))?;
    std::fs::read_to_string(&in_path).map_err(|e| {
        HandlerErr::new("parse_failed", format!("failed to read {}: {}", in_path, e))
            .with_details(json!({ "path": in_path }))
    })
}

/// Request params override the workspace `setup.import` defaults; without a
/// workspace the built-in defaults apply.
fn read_options(conn: Option<&Connection>, params: &Value) -> Result<ReadOptions, HandlerErr> {
    let mut opts = match conn {
        Some(c) => import_defaults(c).map_err(HandlerErr::db("db_query_failed"))?,
        None => ReadOptions::default(),
    };
    if let Some(b) = get_optional_bool(params, "hasHeaders")? {
        opts.has_headers = b;
    }
    if let Some(b) = get_optional_bool(params, "trimCells")? {
        opts.trim = b;
    }
    if let Some(v) = params.get("delimiter").filter(|v| !v.is_null()) {
        let name = v
            .as_str()
            .map(|s| s.trim().to_ascii_lowercase())
            .ok_or_else(|| HandlerErr::bad_params("delimiter must be a string"))?;
        opts.delimiter = delimiter_from_name(&name).ok_or_else(|| {
            HandlerErr::bad_params("delimiter must be one of: auto, comma, semicolon, tab, pipe")
        })?;
    }
    Ok(opts)
}

fn confirmed_mapping(params: &Value) -> Result<Option<ColumnMapping>, HandlerErr> {
    match params.get("mapping") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("invalid mapping: {}", e))),
    }
}

fn run_pass(state: &AppState, params: &Value) -> Result<ImportReport, HandlerErr> {
    let text = import_text(params)?;
    let opts = read_options(state.db.as_ref(), params)?;
    let mapping = confirmed_mapping(params)?;
    roster::run_import_with(&text, &opts, mapping).map_err(|e| match e {
        ImportError::Mapping(_) => HandlerErr::bad_params(e.to_string()),
        ImportError::Read(_) => HandlerErr::new("parse_failed", e.to_string()),
    })
}

fn invalid_json(invalid: &[InvalidRecord]) -> Vec<Value> {
    invalid
        .iter()
        .map(|i| {
            json!({
                "record": i.record,
                "reason": i.reason.code(),
                "message": i.reason.message(),
            })
        })
        .collect()
}

fn detect_columns_handler(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let text = import_text(params)?;
    let opts = read_options(state.db.as_ref(), params)?;
    let headers = roster::reader::headers(&text, &opts)
        .map_err(|e| HandlerErr::new("parse_failed", e.to_string()))?;
    let mapping = detect_columns(&headers);
    Ok(json!({ "headers": headers, "mapping": mapping }))
}

fn preview_import(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let report = run_pass(state, params)?;
    Ok(json!({
        "headers": report.headers,
        "mapping": report.mapping,
        "totalRows": report.total_rows,
        "valid": report.outcome.valid,
        "invalid": invalid_json(&report.outcome.invalid),
        "summary": report.summary,
    }))
}

fn apply_import(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let report = run_pass(state, params)?;
    let conn = state.conn_mut()?;
    if db::class_name(conn, &class_id)
        .map_err(HandlerErr::db("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("class", &class_id));
    }

    let outcome = db::insert_imported_students(conn, &class_id, &report.outcome.valid)
        .map_err(HandlerErr::db("db_insert_failed"))?;
    info!(
        class_id = %class_id,
        rows = report.total_rows,
        valid = report.outcome.valid.len(),
        invalid = report.outcome.invalid.len(),
        inserted = outcome.inserted,
        conflicts = outcome.conflicts.len(),
        "roster import applied"
    );
    if !outcome.conflicts.is_empty() {
        warn!(
            class_id = %class_id,
            conflicts = outcome.conflicts.len(),
            "duplicate student numbers skipped"
        );
    }

    Ok(json!({
        "totalRows": report.total_rows,
        "inserted": outcome.inserted,
        "conflicts": outcome.conflicts,
        "invalid": invalid_json(&report.outcome.invalid),
        "summary": report.summary,
    }))
}

fn roster_list(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let class_id = get_required_str(params, "classId")?;
    let students =
        db::list_students(conn, &class_id).map_err(HandlerErr::db("db_query_failed"))?;
    Ok(json!({ "students": students }))
}

fn roster_export(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let class_id = get_required_str(params, "classId")?;
    let Some(class_name) =
        db::class_name(conn, &class_id).map_err(HandlerErr::db("db_query_failed"))?
    else {
        return Err(HandlerErr::not_found("class", &class_id));
    };
    let entries =
        db::roster_entries(conn, &class_id).map_err(HandlerErr::db("db_query_failed"))?;
    let csv = roster_csv(&entries).map_err(|e| HandlerErr::new("export_failed", e.to_string()))?;
    let file_name = export_file_name(&class_name, "roster");

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
        "fileName": file_name,
        "rowCount": entries.len(),
        "csv": csv,
        "outPath": out_path.map(|p| p.to_string_lossy().to_string()),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "roster.detectColumns" => detect_columns_handler(state, &req.params),
        "roster.previewImport" => preview_import(state, &req.params),
        "roster.applyImport" => apply_import(state, &req.params),
        "roster.list" => roster_list(state, &req.params),
        "roster.export" => roster_export(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
