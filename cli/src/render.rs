//! Plain-text rendering of a task collection.

use std::io::{self, Write};

use resource_core::{ApiError, CollectionStore, Entry, LoadState};
use serde_json::Value;

pub const FETCH_ERROR: &str = "An error occurred while fetching the tasks.";
pub const SAVE_ERROR: &str = "An error occurred while saving the task";

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Output options. `dim_pending` wraps in-flight rows in ANSI faint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Style {
    pub dim_pending: bool,
}

pub fn collection(out: &mut impl Write, store: &CollectionStore, style: Style) -> io::Result<()> {
    let entries = match store.state() {
        LoadState::Ready => store.collection(),
        LoadState::Errored(_) => return writeln!(out, "{FETCH_ERROR}"),
        LoadState::Uninitialized | LoadState::Loading => return writeln!(out, "Loading..."),
    };
    let Some(entries) = entries else {
        return Ok(());
    };

    if entries.is_empty() {
        writeln!(out, "No tasks.")?;
    } else {
        writeln!(out, "{:>4}  {:<4}  NAME", "ID", "DONE")?;
        for entry in entries.iter() {
            row(out, entry, style)?;
        }
    }

    if let Some(range) = store.range() {
        writeln!(out, "({}-{} of {})", range.begin, range.end, range.total)?;
    }
    Ok(())
}

fn row(out: &mut impl Write, entry: &Entry, style: Style) -> io::Result<()> {
    let id = entry.id().map_or_else(|| "-".to_string(), |id| id.to_string());
    let done = match entry.item().get("done") {
        Some(Value::Bool(true)) => "[x]",
        _ => "[ ]",
    };
    let name = entry
        .item()
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let pending = entry.pending();
    let status = match (pending.saving, pending.deleting) {
        (_, true) => "  (deleting)",
        (true, false) => "  (saving)",
        (false, false) => "",
    };

    let line = format!("{id:>4}  {done:<4}  {name}{status}");
    if style.dim_pending && entry.is_pending() {
        writeln!(out, "{DIM}{line}{RESET}")
    } else {
        writeln!(out, "{line}")
    }
}

pub fn save_error(out: &mut impl Write, err: &ApiError) -> io::Result<()> {
    writeln!(out, "{SAVE_ERROR}: {}", err.message())?;
    for detail in err.details() {
        writeln!(out, "  {}: {}", detail.field, detail.message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_core::{HttpResponse, Mode, ResourceClient};
    use serde_json::json;

    fn ready_store() -> CollectionStore {
        let mut store = CollectionStore::new(ResourceClient::new("http://test", "tasks"));
        let pending = store.begin_load();
        store
            .complete(
                pending.ticket,
                Ok(HttpResponse {
                    status: 200,
                    headers: vec![("content-range".to_string(), "1-30/2".to_string())],
                    body: json!([
                        {"id": 1, "name": "Buy milk", "done": true},
                        {"id": 2, "name": "Walk dog", "done": false},
                    ])
                    .to_string(),
                }),
            )
            .unwrap();
        store
    }

    fn render(store: &CollectionStore, style: Style) -> String {
        let mut out = Vec::new();
        collection(&mut out, store, style).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_rows_and_range() {
        let text = render(&ready_store(), Style::default());
        assert_eq!(
            text,
            "  ID  DONE  NAME\n   1  [x]   Buy milk\n   2  [ ]   Walk dog\n(1-30 of 2)\n"
        );
    }

    #[test]
    fn pending_rows_are_labelled_and_dimmed() {
        let mut store = ready_store();
        let _pending = store.begin_delete(2, Mode::Optimistic);
        let _create = store
            .begin_create(
                json!({"name": "draft"}).as_object().cloned().unwrap(),
                Mode::Optimistic,
            )
            .unwrap();

        let plain = render(&store, Style::default());
        assert!(plain.contains("   2  [ ]   Walk dog  (deleting)\n"));
        assert!(plain.contains("   -  [ ]   draft  (saving)\n"));

        let dimmed = render(&store, Style { dim_pending: true });
        assert!(dimmed.contains("\x1b[2m   2  [ ]   Walk dog  (deleting)\x1b[0m\n"));
        assert!(dimmed.contains("   1  [x]   Buy milk\n"));
    }

    #[test]
    fn fetch_failure_prints_fixed_message() {
        let mut store = CollectionStore::new(ResourceClient::new("http://test", "tasks"));
        let pending = store.begin_load();
        let _ = store.complete(pending.ticket, Err(ApiError::Transport("refused".to_string())));

        assert_eq!(render(&store, Style::default()), format!("{FETCH_ERROR}\n"));
    }

    #[test]
    fn save_error_lists_details() {
        let err = ApiError::ValidationFailed {
            status: 422,
            message: "\"name\" is not allowed to be empty".to_string(),
            details: vec![resource_core::ErrorDetail {
                field: "name".to_string(),
                message: "\"name\" is not allowed to be empty".to_string(),
                rule: "string.empty".to_string(),
            }],
        };
        let mut out = Vec::new();
        save_error(&mut out, &err).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("An error occurred while saving the task: \"name\""));
        assert!(text.contains("  name: \"name\" is not allowed to be empty\n"));
    }
}
