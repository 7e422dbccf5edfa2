use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use tasktrack_client::{ErrorNotice, PendingDeletion};
use tasktrack_shared::Task;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.get_bool("color").unwrap_or(true),
        }
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }
        let rows = self.task_rows(tasks);
        write_table(&mut out, table_headers(), rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "description {}", task.description)?;
        writeln!(
            out,
            "status      {}",
            if task.completed { "completed" } else { "open" }
        )?;

        Ok(())
    }

    pub fn print_pending(&self, pending: &PendingDeletion, remaining: Duration) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let line = format!(
            "Deleted \"{}\" ({:.1}s left, type `undo` to restore)",
            pending.task.title,
            remaining.as_secs_f32()
        );
        writeln!(out, "{}", self.paint(&line, "33"))?;
        Ok(())
    }

    pub fn print_notice(&self, notice: &ErrorNotice) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.paint(&notice.message, "31"))?;
        writeln!(out, "  `retry` re-runs {}, `dismiss` closes this message", notice.retry)?;
        Ok(())
    }

    fn task_rows(&self, tasks: &[Task]) -> Vec<Vec<String>> {
        tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let num = self.paint(&(idx + 1).to_string(), "33");
                let done = if task.completed { "x" } else { "" }.to_string();
                let title = if task.completed {
                    self.paint(&task.title, "2")
                } else {
                    task.title.clone()
                };
                vec![num, done, title, task.description.clone(), short_id(&task.id)]
            })
            .collect()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn table_headers() -> Vec<String> {
    vec![
        "#".to_string(),
        "Done".to_string(),
        "Title".to_string(),
        "Description".to_string(),
        "Id".to_string(),
    ]
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
