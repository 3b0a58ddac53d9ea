//! Demo entry point wiring the accessor and the logging helper together.
//!
//! # Responsibility
//! - Exercise every accessor operation against an in-memory database.
//! - Route progress through an application logger.

use serde::{Deserialize, Serialize};
use std::error::Error;
use yzutils_core::db::open_db_in_memory;
use yzutils_core::{
    get_logger, get_request_logger, ChangeSet, CrudAccessor, Entity, Filter,
    ListQuery, Payload, Schema, SchemaError, UpdateTarget,
};

const APP_NAME: &str = "yzutils_cli";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Task {
    #[serde(default)]
    id: Option<i64>,
    title: String,
    done: bool,
}

impl Entity for Task {
    type Id = i64;
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &["id", "title", "done"];
    const BOOL_COLUMNS: &'static [&'static str] = &["done"];
}

#[derive(Debug, Serialize)]
struct NewTask {
    title: String,
    done: bool,
}

impl Schema for NewTask {
    fn validate(&self) -> Result<(), SchemaError> {
        if self.title.trim().is_empty() {
            return Err(SchemaError::field("title", "must not be blank"));
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let _logger_handle = flexi_logger::Logger::try_with_env_or_str("info")?
        .log_to_stdout()
        .start()?;
    log::info!(
        "event=cli_start module=cli status=ok version={}",
        yzutils_core::core_version()
    );

    let logger = get_logger(APP_NAME)?;
    let requests = get_request_logger(APP_NAME)?;

    let mut conn = open_db_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            done INTEGER NOT NULL DEFAULT 0
        );",
    )?;

    let tasks: CrudAccessor<Task, NewTask> = CrudAccessor::new();
    let mut ids = Vec::new();
    for title in ["draft schema", "review accessor", "ship release"] {
        let task = tasks.create(
            &mut conn,
            Payload::Schema(NewTask {
                title: title.to_string(),
                done: false,
            }),
        )?;
        requests.info(format!("POST /tasks -> {:?}", task.id));
        ids.extend(task.id);
    }

    let first = ids.first().copied().ok_or("no task created")?;
    let updated = tasks.update(
        &mut conn,
        UpdateTarget::id(first),
        ChangeSet::new().with("done", true).into(),
        true,
    )?;
    logger.info(format!("updated: {updated:?}"));

    let open = tasks.count(&conn, &[Filter::eq("done", false)])?;
    let page = tasks.list(
        &conn,
        &ListQuery {
            sort: vec!["title ASC".to_string()],
            ..ListQuery::default()
        },
    )?;
    println!("open tasks: {open}");
    for task in &page {
        println!("- [{}] {}", if task.done { "x" } else { " " }, task.title);
    }

    let removed = tasks.batch_delete(&mut conn, &ids[1..])?;
    logger.warning(format!("removed {removed} tasks"));
    let last = tasks.delete(&mut conn, &first, true)?;
    logger.debug(format!("deleted: {last:?}"));

    println!("remaining tasks: {}", tasks.count(&conn, &[])?);
    logger.flush();
    requests.flush();
    Ok(())
}
