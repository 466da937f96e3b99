use crate::db;
use crate::ipc::helpers::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use classroomd::roster::ReadOptions;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::warn;

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => "setup.import",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Import => json!({
            "hasHeaders": true,
            "delimiter": "auto",
            "trimCells": true
        }),
    }
}

fn as_object_mut(v: &mut Value) -> Result<&mut Map<String, Value>, String> {
    v.as_object_mut()
        .ok_or_else(|| "section must be an object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be a boolean", key))
}

/// Named delimiter -> byte. `auto` means sniff.
pub fn delimiter_from_name(name: &str) -> Option<Option<u8>> {
    match name {
        "auto" => Some(None),
        "comma" => Some(Some(b',')),
        "semicolon" => Some(Some(b';')),
        "tab" => Some(Some(b'\t')),
        "pipe" => Some(Some(b'|')),
        _ => None,
    }
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Import => match k.as_str() {
                "hasHeaders" | "trimCells" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "delimiter" => {
                    let d = v
                        .as_str()
                        .map(|s| s.trim().to_ascii_lowercase())
                        .ok_or_else(|| format!("{} must be a string", k))?;
                    if delimiter_from_name(&d).is_none() {
                        return Err(
                            "delimiter must be one of: auto, comma, semicolon, tab, pipe".into(),
                        );
                    }
                    obj.insert(k.clone(), Value::String(d));
                }
                _ => return Err(format!("unknown import field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let defaults = default_section(section);
    let Some(saved) = db::settings_get_json(conn, section.key())? else {
        return Ok(defaults);
    };
    let Some(saved_obj) = saved.as_object() else {
        return Ok(defaults);
    };
    // A malformed stored section falls back to the defaults as a whole.
    let mut merged = defaults.clone();
    match merge_section_patch(section, &mut merged, saved_obj) {
        Ok(()) => Ok(merged),
        Err(e) => {
            warn!(key = section.key(), error = %e, "ignoring malformed stored setup section");
            Ok(defaults)
        }
    }
}

/// Workspace import defaults as reader options.
pub fn import_defaults(conn: &Connection) -> anyhow::Result<ReadOptions> {
    let section = load_section(conn, SetupSection::Import)?;
    let delimiter = section
        .get("delimiter")
        .and_then(|v| v.as_str())
        .and_then(delimiter_from_name)
        .unwrap_or(None);
    Ok(ReadOptions {
        delimiter,
        has_headers: section.get("hasHeaders").and_then(Value::as_bool).unwrap_or(true),
        trim: section.get("trimCells").and_then(Value::as_bool).unwrap_or(true),
    })
}

fn setup_get(state: &AppState) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let import =
        load_section(conn, SetupSection::Import).map_err(HandlerErr::db("db_query_failed"))?;
    Ok(json!({ "import": import }))
}

fn setup_update(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let section = params
        .get("section")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing section"))?;
    let section =
        SetupSection::parse(section).ok_or_else(|| HandlerErr::bad_params("unknown section"))?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut current = load_section(conn, section).map_err(HandlerErr::db("db_query_failed"))?;
    merge_section_patch(section, &mut current, patch).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(HandlerErr::db("db_insert_failed"))?;
    Ok(json!({ "ok": true, "section": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(respond(&req.id, setup_get(state))),
        "setup.update" => Some(respond(&req.id, setup_update(state, &req.params))),
        _ => None,
    }
}
