use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tasktrack_shared::{TaskCreate, TaskUpdate};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::TaskDocument;

/// The task collection: one JSON document per line in `tasks.data`.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<TaskDocument>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, docs))]
    pub fn save_tasks(&self, docs: &[TaskDocument]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, docs).context("failed to save tasks.data")
    }

    #[tracing::instrument(skip(self, create, now), fields(title_len = create.title.len()))]
    pub fn insert(&self, create: TaskCreate, now: DateTime<Utc>) -> anyhow::Result<TaskDocument> {
        let mut docs = self.load_tasks()?;
        let doc = TaskDocument::new(create, now);
        docs.push(doc.clone());
        self.save_tasks(&docs)?;
        debug!(id = %doc.id, total = docs.len(), "inserted task document");
        Ok(doc)
    }

    /// Fails if no document has `update.id`.
    #[tracing::instrument(skip(self, update, now), fields(id = %update.id))]
    pub fn update(&self, update: TaskUpdate, now: DateTime<Utc>) -> anyhow::Result<TaskDocument> {
        let mut docs = self.load_tasks()?;
        let doc = docs
            .iter_mut()
            .find(|doc| doc.id == update.id)
            .ok_or_else(|| anyhow!("no task document with id {}", update.id))?;
        doc.apply(update, now);
        let updated = doc.clone();
        self.save_tasks(&docs)?;
        Ok(updated)
    }

    /// Removing a missing document is not an error; returns whether one was removed.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut docs = self.load_tasks()?;
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        let removed = docs.len() != before;
        if removed {
            self.save_tasks(&docs)?;
        }
        debug!(removed, remaining = docs.len(), "delete applied");
        Ok(removed)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded documents from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for item in items {
        let serialized = serde_json::to_string(item)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
