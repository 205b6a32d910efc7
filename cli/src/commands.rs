//! Subcommands, each driven through a mounted `CollectionStore`.

use std::io::Write;

use anyhow::Result;
use resource_core::{
    ApiError, CollectionStore, Fields, ItemId, Mode, PageRequest, PendingRequest, ResourceClient,
    Transport,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::render::{self, Style};

pub const RESOURCE: &str = "tasks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List { page: Option<PageRequest> },
    Add { name: String, done: bool },
    Toggle { id: ItemId },
    Delete { id: ItemId },
}

/// Whether the command did what it was asked. Failures have already been
/// reported on the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Failed,
}

pub struct Runner<'a, T: ?Sized, W> {
    pub transport: &'a T,
    pub out: W,
    pub style: Style,
}

impl<T, W> Runner<'_, T, W>
where
    T: Transport + ?Sized,
    W: Write,
{
    pub fn run(&mut self, base_url: &str, command: Command) -> Result<Status> {
        let mut store = CollectionStore::new(ResourceClient::new(base_url, RESOURCE));
        if let Command::List { page: Some(page) } = command {
            store = store.with_page(page);
        }

        let status = self.execute(&mut store, command);
        store.unmount();
        status
    }

    fn execute(&mut self, store: &mut CollectionStore, command: Command) -> Result<Status> {
        if let Err(err) = store.load_with(self.transport) {
            warn!(error = %err, "fetch failed");
            render::collection(&mut self.out, store, self.style)?;
            return Ok(Status::Failed);
        }

        let pending = match command {
            Command::List { .. } => {
                render::collection(&mut self.out, store, self.style)?;
                return Ok(Status::Done);
            }
            Command::Add { name, done } => {
                let mut fields = Fields::new();
                fields.insert("name".to_string(), Value::String(name));
                if done {
                    fields.insert("done".to_string(), Value::Bool(true));
                }
                store.begin_create(fields, Mode::Optimistic)
            }
            Command::Toggle { id } => {
                let done = match self.current_done(store, id) {
                    Ok(done) => done,
                    Err(err) => {
                        render::save_error(&mut self.out, &err)?;
                        return Ok(Status::Failed);
                    }
                };
                let mut fields = Fields::new();
                fields.insert("done".to_string(), Value::Bool(!done));
                store.begin_update(id, fields, Mode::Optimistic)
            }
            Command::Delete { id } => Ok(store.begin_delete(id, Mode::Optimistic)),
        };

        let pending = match pending {
            Ok(pending) => pending,
            Err(err) => {
                render::save_error(&mut self.out, &err)?;
                return Ok(Status::Failed);
            }
        };
        self.settle(store, pending)
    }

    /// `done` of the task, looked up on the server when it is outside the
    /// loaded page.
    fn current_done(&self, store: &CollectionStore, id: ItemId) -> Result<bool, ApiError> {
        let item = match store.get(id) {
            Some(entry) => entry.item().clone(),
            None => {
                debug!(id, "task not in loaded page, fetching it");
                let client = store.client();
                client.parse_get(self.transport.execute(&client.build_get(id))?)?
            }
        };
        Ok(matches!(item.get("done"), Some(Value::Bool(true))))
    }

    /// Show the optimistic state, run the request, then show the outcome.
    fn settle(&mut self, store: &mut CollectionStore, pending: PendingRequest) -> Result<Status> {
        render::collection(&mut self.out, store, self.style)?;
        writeln!(self.out)?;

        let status = match store.finish_with(self.transport, pending) {
            Ok(outcome) => {
                debug!(?outcome, "mutation committed");
                Status::Done
            }
            Err(err) => {
                warn!(error = %err, "mutation rolled back");
                render::save_error(&mut self.out, &err)?;
                Status::Failed
            }
        };

        render::collection(&mut self.out, store, self.style)?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_core::{HttpMethod, HttpRequest, HttpResponse};
    use serde_json::json;
    use std::cell::RefCell;

    fn ok(status: u16, body: Value) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status,
            headers: vec![("content-range".to_string(), "1-30/2".to_string())],
            body: if body.is_null() { String::new() } else { body.to_string() },
        })
    }

    fn listing() -> Result<HttpResponse, ApiError> {
        ok(
            200,
            json!([
                {"id": 1, "name": "Buy milk", "done": false},
                {"id": 2, "name": "Walk dog", "done": true},
            ]),
        )
    }

    fn run_with<F>(command: Command, transport: F) -> (Status, String)
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, ApiError>,
    {
        let mut runner = Runner {
            transport: &transport,
            out: Vec::new(),
            style: Style::default(),
        };
        let status = runner.run("http://test", command).unwrap();
        (status, String::from_utf8(runner.out).unwrap())
    }

    #[test]
    fn list_renders_the_collection() {
        let (status, out) = run_with(Command::List { page: None }, |_: &HttpRequest| listing());
        assert_eq!(status, Status::Done);
        assert!(out.contains("Buy milk"));
        assert!(out.contains("(1-30 of 2)"));
    }

    #[test]
    fn list_uses_the_requested_page() {
        let seen = RefCell::new(Vec::new());
        let command = Command::List {
            page: Some(PageRequest::new(2, 5)),
        };
        run_with(command, |req: &HttpRequest| {
            seen.borrow_mut().push(req.path.clone());
            listing()
        });
        assert_eq!(seen.into_inner(), vec!["http://test/tasks?page=2&per_page=5"]);
    }

    #[test]
    fn fetch_failure_prints_fixed_message() {
        let (status, out) = run_with(Command::List { page: None }, |_: &HttpRequest| {
            Err(ApiError::Transport("connection refused".to_string()))
        });
        assert_eq!(status, Status::Failed);
        assert_eq!(out, "An error occurred while fetching the tasks.\n");
    }

    #[test]
    fn add_shows_saving_row_then_committed_row() {
        let command = Command::Add {
            name: "Water plants".to_string(),
            done: false,
        };
        let (status, out) = run_with(command, |req: &HttpRequest| match req.method {
            HttpMethod::Get => listing(),
            _ => ok(201, json!({"id": 3, "name": "Water plants", "done": false})),
        });

        assert_eq!(status, Status::Done);
        let (before, after) = out.split_once("\n\n").unwrap();
        assert!(before.contains("   -  [ ]   Water plants  (saving)"));
        assert!(after.contains("   3  [ ]   Water plants\n"));
    }

    #[test]
    fn add_conflict_rolls_back_and_reports() {
        let command = Command::Add {
            name: "Buy milk".to_string(),
            done: false,
        };
        let (status, out) = run_with(command, |req: &HttpRequest| match req.method {
            HttpMethod::Get => listing(),
            _ => ok(409, json!({"errorMessage": "name \"Buy milk\" is already taken"})),
        });

        assert_eq!(status, Status::Failed);
        let (_, after) = out.split_once("\n\n").unwrap();
        assert!(after.starts_with(
            "An error occurred while saving the task: name \"Buy milk\" is already taken\n"
        ));
        assert_eq!(after.matches("Buy milk").count(), 2);
        assert!(!after.contains("(saving)"));
    }

    #[test]
    fn toggle_flips_done() {
        let sent = RefCell::new(None);
        let (status, out) = run_with(Command::Toggle { id: 2 }, |req: &HttpRequest| {
            match req.method {
                HttpMethod::Get => listing(),
                _ => {
                    *sent.borrow_mut() = req.body.clone();
                    ok(200, json!({"id": 2, "name": "Walk dog", "done": false}))
                }
            }
        });

        assert_eq!(status, Status::Done);
        let body: Value = serde_json::from_str(&sent.into_inner().unwrap()).unwrap();
        assert_eq!(body, json!({"done": false}));
        assert!(out.ends_with("   2  [ ]   Walk dog\n(1-30 of 2)\n"));
    }

    #[test]
    fn toggle_task_outside_loaded_page_fetches_it_then_patches() {
        let seen = RefCell::new(Vec::new());
        let (status, _) = run_with(Command::Toggle { id: 31 }, |req: &HttpRequest| {
            seen.borrow_mut()
                .push((req.method, req.path.clone(), req.body.clone()));
            match (req.method, req.path.as_str()) {
                (HttpMethod::Get, "http://test/tasks") => listing(),
                (HttpMethod::Get, _) => ok(200, json!({"id": 31, "name": "Later", "done": true})),
                _ => ok(200, json!({"id": 31, "name": "Later", "done": false})),
            }
        });

        assert_eq!(status, Status::Done);
        let seen = seen.into_inner();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].0, HttpMethod::Get);
        assert_eq!(seen[1].1, "http://test/tasks/31");
        assert_eq!(seen[2].0, HttpMethod::Patch);
        assert_eq!(seen[2].1, "http://test/tasks/31");
        let body: Value = serde_json::from_str(seen[2].2.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"done": false}));
    }

    #[test]
    fn toggle_missing_task_reports_server_not_found() {
        let (status, out) = run_with(Command::Toggle { id: 99 }, |req: &HttpRequest| {
            match req.path.as_str() {
                "http://test/tasks" => listing(),
                _ => ok(404, json!({"errorMessage": "tasks 99 not found"})),
            }
        });
        assert_eq!(status, Status::Failed);
        assert_eq!(out, "An error occurred while saving the task: tasks 99 not found\n");
    }

    #[test]
    fn delete_failure_restores_row() {
        let (status, out) = run_with(Command::Delete { id: 1 }, |req: &HttpRequest| {
            match req.method {
                HttpMethod::Get => listing(),
                _ => ok(404, json!({"errorMessage": "tasks 1 not found"})),
            }
        });

        assert_eq!(status, Status::Failed);
        let (before, after) = out.split_once("\n\n").unwrap();
        assert!(before.contains("Buy milk  (deleting)"));
        assert!(after.contains("   1  [ ]   Buy milk\n"));
    }

    #[test]
    fn delete_removes_row() {
        let (status, out) = run_with(Command::Delete { id: 1 }, |req: &HttpRequest| {
            match req.method {
                HttpMethod::Get => listing(),
                _ => ok(204, Value::Null),
            }
        });

        assert_eq!(status, Status::Done);
        let (_, after) = out.split_once("\n\n").unwrap();
        assert!(!after.contains("Buy milk"));
    }
}
