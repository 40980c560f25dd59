//! RPC method handler for the Smart Bookmarks JSON-RPC protocol.
//!
//! Kept out of `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches a method call to the tab it addresses.

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::app::App;
use crate::managers::bookmark_store::extract_domain;
use crate::managers::sync_manager::BookmarkSync;
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::BookmarkRecord;
use crate::types::session::Session;

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

fn tab<'a>(app: &'a mut App, params: &Value) -> Result<&'a mut BookmarkSync, String> {
    let tab_id = str_param(params, "tab_id")?;
    app.tab_mut(tab_id)
        .ok_or_else(|| format!("unknown tab: {}", tab_id))
}

/// Record JSON plus the derived `domain` field.
fn bookmark_json(record: &BookmarkRecord) -> Value {
    let mut value = json!(record);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("domain".to_string(), json!(extract_domain(&record.url)));
    }
    value
}

fn items<'a>(records: impl IntoIterator<Item = &'a BookmarkRecord>) -> Value {
    let arr: Vec<Value> = records.into_iter().map(bookmark_json).collect();
    json!({ "items": arr })
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    let mut app = app.lock().await;
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Tabs ───
        "tab.open" => {
            let session = params
                .get("user_id")
                .and_then(|v| v.as_str())
                .map(Session::new);
            let tab_id = app.open_tab(session).await;
            let sync = app
                .tab(&tab_id)
                .ok_or_else(|| format!("unknown tab: {}", tab_id))?;
            Ok(json!({
                "tab_id": tab_id,
                "signed_in": sync.session().is_some(),
                "count": sync.bookmarks().len(),
            }))
        }
        "tab.close" => {
            let tab_id = str_param(params, "tab_id")?;
            if !app.close_tab(tab_id) {
                return Err(format!("unknown tab: {}", tab_id));
            }
            Ok(json!({"closed": true}))
        }
        "tab.list" => Ok(json!({"tabs": app.tab_ids()})),
        "tab.sync" => {
            let sync = tab(&mut app, params)?;
            let processed = sync.drain_pending().await;
            Ok(json!({"processed": processed}))
        }
        "tab.state" => {
            let sync = tab(&mut app, params)?;
            let store = sync.store();
            Ok(json!({
                "user_id": sync.session().map(|s| s.user_id.clone()),
                "loading": store.is_loading(),
                "submitting": store.is_submitting(),
                "error": store.error(),
                "count": store.len(),
            }))
        }

        // ─── Bookmarks ───
        "bookmark.add" => {
            let title = str_param(params, "title")?;
            let url = str_param(params, "url")?;
            let sync = tab(&mut app, params)?;
            let record = sync.add(title, url).await.map_err(|e| e.to_string())?;
            Ok(bookmark_json(&record))
        }
        "bookmark.update" => {
            let id = str_param(params, "id")?;
            let title = str_param(params, "title")?;
            let url = str_param(params, "url")?;
            let sync = tab(&mut app, params)?;
            let record = sync.update(id, title, url).await.map_err(|e| e.to_string())?;
            Ok(record.as_ref().map(bookmark_json).unwrap_or(Value::Null))
        }
        "bookmark.delete" => {
            let id = str_param(params, "id")?;
            let sync = tab(&mut app, params)?;
            sync.delete(id).await.map_err(|e| e.to_string())?;
            Ok(json!({"deleted": true}))
        }
        "bookmark.track_open" => {
            let id = str_param(params, "id")?;
            let sync = tab(&mut app, params)?;
            sync.track_open(id).await;
            let open_count = sync.store().get(id).map(|b| b.open_count);
            Ok(json!({"open_count": open_count}))
        }
        "bookmark.list" => {
            let sync = tab(&mut app, params)?;
            Ok(items(sync.bookmarks()))
        }
        "bookmark.search" => {
            let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let sync = tab(&mut app, params)?;
            Ok(items(sync.store().search(query)))
        }

        // ─── Settings ───
        "settings.get" => {
            let settings = app.settings_engine.get_settings();
            serde_json::to_value(settings).map_err(|e| e.to_string())
        }
        "settings.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            app.settings_engine
                .set_value(key, value)
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "settings.reset" => {
            app.settings_engine.reset().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
