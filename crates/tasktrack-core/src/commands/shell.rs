//! Interactive session. Unlike the one-shot commands it keeps one
//! [`Session`] alive, so deletions can be undone during their grace period
//! and failed calls can be retried or dismissed.

use std::io::{self, Write};

use anyhow::anyhow;
use tasktrack_client::{CommandOutcome, Session, SessionError, TaskRepository};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument};

use super::{expand_command_abbrev, resolve_task_ref};
use crate::render::Renderer;

const PROMPT: &str = "tasktrack> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    Empty,
    List,
    Add { title: String, description: String },
    Edit { target: String, title: String, description: String },
    Toggle(String),
    Delete(String),
    Undo,
    Retry,
    Dismiss,
    Help,
    Quit,
}

enum Flow {
    Continue,
    Quit,
}

fn shell_verbs() -> Vec<&'static str> {
    vec![
        "list", "add", "edit", "toggle", "delete", "undo", "retry", "dismiss", "help", "quit",
        "exit",
    ]
}

/// `add` and `edit` take `TITLE | DESCRIPTION` as the rest of the line.
pub(crate) fn parse_line(line: &str) -> anyhow::Result<ShellCommand> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    if verb.is_empty() {
        return Ok(ShellCommand::Empty);
    }

    let known = shell_verbs();
    let verb = expand_command_abbrev(verb, &known)
        .ok_or_else(|| anyhow!("unknown or ambiguous command: {verb} (try `help`)"))?;

    let command = match verb {
        "list" => ShellCommand::List,
        "add" => {
            let (title, description) = split_fields(rest, "add TITLE | DESCRIPTION")?;
            ShellCommand::Add { title, description }
        }
        "edit" => {
            let (target, fields) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: edit ID TITLE | DESCRIPTION"))?;
            let (title, description) = split_fields(fields, "edit ID TITLE | DESCRIPTION")?;
            ShellCommand::Edit {
                target: target.to_string(),
                title,
                description,
            }
        }
        "toggle" => ShellCommand::Toggle(single_arg(rest, "toggle ID")?),
        "delete" => ShellCommand::Delete(single_arg(rest, "delete ID")?),
        "undo" => ShellCommand::Undo,
        "retry" => ShellCommand::Retry,
        "dismiss" => ShellCommand::Dismiss,
        "help" => ShellCommand::Help,
        _ => ShellCommand::Quit,
    };
    Ok(command)
}

fn split_fields(rest: &str, usage: &str) -> anyhow::Result<(String, String)> {
    let (title, description) = rest
        .split_once('|')
        .ok_or_else(|| anyhow!("usage: {usage}"))?;
    Ok((title.trim().to_string(), description.trim().to_string()))
}

fn single_arg(rest: &str, usage: &str) -> anyhow::Result<String> {
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return Err(anyhow!("usage: {usage}"));
    }
    Ok(rest.to_string())
}

#[instrument(skip(session, renderer))]
pub(crate) async fn run<R: TaskRepository>(
    session: &Session<R>,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    info!("command shell");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if session.refresh().await.is_ok() {
        renderer.print_task_table(&session.tasks())?;
    }

    loop {
        print_status(session, renderer)?;
        print!("{PROMPT}");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        debug!(?command, "shell command");

        match execute(session, renderer, command).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => println!("error: {err:#}"),
        }
    }

    info!("shell closed");
    Ok(())
}

fn print_status<R: TaskRepository>(session: &Session<R>, renderer: &Renderer) -> anyhow::Result<()> {
    if let Some(pending) = session.pending_deletion() {
        let remaining = pending.remaining(tokio::time::Instant::now());
        renderer.print_pending(&pending, remaining)?;
    }
    if let Some(notice) = session.error_notice() {
        renderer.print_notice(&notice)?;
    }
    Ok(())
}

async fn execute<R: TaskRepository>(
    session: &Session<R>,
    renderer: &Renderer,
    command: ShellCommand,
) -> anyhow::Result<Flow> {
    match command {
        ShellCommand::Empty => {}
        ShellCommand::Quit => return Ok(Flow::Quit),
        ShellCommand::Help => print_help(),
        ShellCommand::List => {
            if settle(session.refresh().await)?.is_some() {
                renderer.print_task_table(&session.tasks())?;
            }
        }
        ShellCommand::Add { title, description } => {
            if let Some(task) = settle(session.create(&title, &description).await)? {
                println!("Created task '{}'.", task.title);
            }
            renderer.print_task_table(&session.tasks())?;
        }
        ShellCommand::Edit {
            target,
            title,
            description,
        } => {
            let id = resolve_task_ref(&session.tasks(), &target)?;
            settle(session.edit(&id, &title, &description).await)?;
            renderer.print_task_table(&session.tasks())?;
        }
        ShellCommand::Toggle(target) => {
            let id = resolve_task_ref(&session.tasks(), &target)?;
            settle(session.toggle_complete(&id).await)?;
            renderer.print_task_table(&session.tasks())?;
        }
        ShellCommand::Delete(target) => {
            let id = resolve_task_ref(&session.tasks(), &target)?;
            settle(session.request_delete(&id).await)?;
            renderer.print_task_table(&session.tasks())?;
        }
        ShellCommand::Undo => match session.undo() {
            Some(task) => {
                println!("Restored '{}'.", task.title);
                renderer.print_task_table(&session.tasks())?;
            }
            None => println!("Nothing to undo."),
        },
        ShellCommand::Retry => match settle(session.retry().await)? {
            Some(Some(outcome)) => {
                println!("{}", describe(&outcome));
                renderer.print_task_table(&session.tasks())?;
            }
            Some(None) => println!("Nothing to retry."),
            None => {}
        },
        ShellCommand::Dismiss => {
            if session.dismiss_error().is_none() {
                println!("No error to dismiss.");
            }
        }
    }
    Ok(Flow::Continue)
}

/// Validation errors are returned; remote errors are already the session's
/// notice and print with the status line, so they map to `None`.
fn settle<T>(result: Result<T, SessionError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_validation() => Err(err.into()),
        Err(_) => Ok(None),
    }
}

fn describe(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Listed(count) => format!("Loaded {count} task(s)."),
        CommandOutcome::Created(task) => format!("Created task '{}'.", task.title),
        CommandOutcome::Updated(id) => format!("Saved task {id}."),
        CommandOutcome::Deleted(id) => format!("Deleted task {id}."),
    }
}

fn print_help() {
    println!("  list                           reload and show tasks");
    println!("  add TITLE | DESCRIPTION        create a task");
    println!("  edit ID TITLE | DESCRIPTION    change a task");
    println!("  toggle ID                      flip completed");
    println!("  delete ID                      delete (undo within 5s)");
    println!("  undo                           restore the last deletion");
    println!("  retry                          re-run the failed command");
    println!("  dismiss                        close the error message");
    println!("  quit");
}
