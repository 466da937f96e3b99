use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::info;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    respond(
        &req.id,
        db::list_classes(conn)
            .map(|classes| json!({ "classes": classes }))
            .map_err(HandlerErr::db("db_query_failed")),
    )
}

fn classes_create(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = state.conn()?;
    let name = get_required_str(params, "name")?;
    let class_id = db::create_class(conn, &name).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string())
            .with_details(json!({ "table": "classes" }))
    })?;
    info!(class_id = %class_id, name = %name, "class created");
    Ok(json!({ "classId": class_id, "name": name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(respond(&req.id, classes_create(state, &req.params))),
        _ => None,
    }
}
