use std::path::Path;

use anyhow::{Context, anyhow};
use tasktrack_client::{HttpTaskRepository, Session, SessionError, TaskRepository};
use tasktrack_shared::Task;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::{Config, resolve_data_dir};
use crate::datastore::DataStore;
use crate::render::Renderer;
use crate::server;

mod shell;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "serve", "shell", "list", "add", "edit", "toggle", "delete", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(cfg, renderer, inv, data_override))]
pub async fn dispatch(
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    data_override: Option<&Path>,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "serve" => cmd_serve(cfg, data_override, &inv.command_args).await,
        "shell" => {
            let session = connect(cfg)?;
            shell::run(&session, renderer).await
        }
        "list" => cmd_list(&connect(cfg)?, renderer).await,
        "add" => cmd_add(&connect(cfg)?, renderer, &inv.command_args).await,
        "edit" => cmd_edit(&connect(cfg)?, renderer, &inv.command_args).await,
        "toggle" => cmd_toggle(&connect(cfg)?, renderer, &inv.command_args).await,
        "delete" => cmd_delete(&connect(cfg)?, &inv.command_args).await,
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn connect(cfg: &Config) -> anyhow::Result<Session<HttpTaskRepository>> {
    let url = cfg.server_url();
    let timeout = cfg.client_timeout()?;
    let repo = HttpTaskRepository::new(&url, timeout)
        .with_context(|| format!("failed to build task store client for {url}"))?;
    debug!(tasks_url = %repo.tasks_url(), "task store client ready");
    Ok(Session::new(repo))
}

#[instrument(skip(cfg, data_override, args))]
async fn cmd_serve(
    cfg: &Config,
    data_override: Option<&Path>,
    args: &[String],
) -> anyhow::Result<()> {
    let listen = parse_listen_flag(args)?.unwrap_or_else(|| cfg.listen_addr());
    let data_dir = resolve_data_dir(cfg, data_override).context("failed to resolve data directory")?;
    let store = DataStore::open(&data_dir)
        .with_context(|| format!("failed to open datastore at {}", data_dir.display()))?;

    info!(listen = %listen, data_dir = %data_dir.display(), "command serve");
    server::serve_until_shutdown(store, &listen).await
}

fn parse_listen_flag(args: &[String]) -> anyhow::Result<Option<String>> {
    let mut listen = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--listen=") {
            listen = Some(value.to_string());
        } else if arg == "--listen" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--listen requires an address"))?;
            listen = Some(value.clone());
        } else {
            return Err(anyhow!("serve: unexpected argument: {arg}"));
        }
    }
    Ok(listen)
}

#[instrument(skip(session, renderer))]
async fn cmd_list<R: TaskRepository>(session: &Session<R>, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command list");
    report(session, session.refresh().await)?;
    renderer.print_task_table(&session.tasks())
}

#[instrument(skip(session, renderer, args))]
async fn cmd_add<R: TaskRepository>(
    session: &Session<R>,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command add");
    let [title, description] = args else {
        return Err(anyhow!("usage: add TITLE DESCRIPTION"));
    };

    report(session, session.refresh().await)?;
    let task = report(session, session.create(title, description).await)?;
    println!("Created task {}.", short(&task.id));
    renderer.print_task_info(&task)
}

#[instrument(skip(session, renderer, args))]
async fn cmd_edit<R: TaskRepository>(
    session: &Session<R>,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command edit");
    let [target, title, description] = args else {
        return Err(anyhow!("usage: edit ID TITLE DESCRIPTION"));
    };

    report(session, session.refresh().await)?;
    let id = resolve_task_ref(&session.tasks(), target)?;
    let task = report(session, session.edit(&id, title, description).await)?;
    println!("Modified task {}.", short(&task.id));
    renderer.print_task_info(&task)
}

#[instrument(skip(session, renderer, args))]
async fn cmd_toggle<R: TaskRepository>(
    session: &Session<R>,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command toggle");
    let [target] = args else {
        return Err(anyhow!("usage: toggle ID"));
    };

    report(session, session.refresh().await)?;
    let id = resolve_task_ref(&session.tasks(), target)?;
    let task = report(session, session.toggle_complete(&id).await)?;
    println!(
        "Marked task {} {}.",
        short(&task.id),
        if task.completed { "completed" } else { "open" }
    );
    renderer.print_task_info(&task)
}

#[instrument(skip(session, args))]
async fn cmd_delete<R: TaskRepository>(session: &Session<R>, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");
    let [target] = args else {
        return Err(anyhow!("usage: delete ID"));
    };

    report(session, session.refresh().await)?;
    let id = resolve_task_ref(&session.tasks(), target)?;
    let task = report(session, session.request_delete(&id).await)?;
    println!("Deleted task {} '{}'.", short(&task.id), task.title);
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("tasktrack commands:");
    println!("  serve [--listen ADDR]        run the task store service");
    println!("  shell                        interactive session with undo and retry");
    println!("  list                         show all tasks");
    println!("  add TITLE DESCRIPTION        create a task");
    println!("  edit ID TITLE DESCRIPTION    change title and description");
    println!("  toggle ID                    flip the completed flag");
    println!("  delete ID                    delete a task");
    println!("  help | version");
    println!();
    println!("ID is a row number from `list`, a full id or a unique id prefix.");
    println!("Global: -v/-q, --rc KEY=VALUE, rc.KEY=VALUE, --rcfile PATH, --data PATH, --url URL");
    Ok(())
}

/// Remote failures are reported with the surfaced notice's wording.
fn report<R, T>(session: &Session<R>, result: Result<T, SessionError>) -> anyhow::Result<T>
where
    R: TaskRepository,
{
    result.map_err(|err| match session.error_notice() {
        Some(notice) if !err.is_validation() => anyhow!(notice.message),
        _ => anyhow::Error::new(err),
    })
}

/// Resolves a 1-based row number, an exact id, or a unique id prefix.
pub fn resolve_task_ref(tasks: &[Task], token: &str) -> anyhow::Result<String> {
    let token = token.trim();
    if let Ok(row) = token.parse::<usize>()
        && (1..=tasks.len()).contains(&row)
    {
        return Ok(tasks[row - 1].id.clone());
    }

    if let Some(task) = tasks.iter().find(|task| task.id == token) {
        return Ok(task.id.clone());
    }

    if token.is_empty() {
        return Err(anyhow!("no task matches an empty id"));
    }
    let mut matches = tasks.iter().filter(|task| task.id.starts_with(token));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id.clone()),
        (Some(_), Some(_)) => Err(anyhow!("id prefix {token} matches more than one task")),
        (None, _) => Err(anyhow!("no task matches {token}")),
    }
}

fn short(id: &str) -> String {
    id.chars().take(8).collect()
}
