use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use engine::EngineOptionDeclaration;
use serde::{Deserialize, Serialize};

use super::{ParameterMap, Task};

#[derive(Debug, thiserror::Error)]
pub enum ParameterStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of stored task parameters, keyed by engine path and task.
pub trait ParameterStore: Send + Sync {
    /// `None` when nothing is stored; callers fall back to defaults.
    fn task_parameters(&self, engine_path: &str, task: Task) -> Option<ParameterMap>;
}

/// Everything stored for one engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineParameters {
    #[serde(default)]
    pub options: Vec<EngineOptionDeclaration>,
    #[serde(default)]
    pub tasks: BTreeMap<String, ParameterMap>,
}

type Document = BTreeMap<String, EngineParameters>;

/// Parameters persisted in a single JSON document:
/// `{ "<engine path>": { "options": [...], "tasks": { "<task>": {...} } } }`.
///
/// A missing or unreadable file is treated as an empty store. An unreadable
/// file is moved to [`JsonParameterStore::backup_path`] before the first save
/// writes over it.
#[derive(Debug)]
pub struct JsonParameterStore {
    path: PathBuf,
    data: RwLock<Document>,
    unreadable: AtomicBool,
}

impl JsonParameterStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (data, unreadable) = match read_document(&path) {
            Some(data) => (data, false),
            None => (Document::new(), true),
        };
        Self {
            path,
            data: RwLock::new(data),
            unreadable: AtomicBool::new(unreadable),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable file is kept once the store saves over it.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Discard cached data and read the file again.
    pub fn reload(&self) {
        let fresh = read_document(&self.path);
        self.unreadable.store(fresh.is_none(), Ordering::Release);
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = fresh.unwrap_or_default();
    }

    pub fn save(&self) -> Result<(), ParameterStoreError> {
        let json = {
            let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*data)?
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.unreadable.load(Ordering::Acquire) && self.path.exists() {
            let backup = self.backup_path();
            std::fs::rename(&self.path, &backup)?;
            tracing::warn!(
                path = %self.path.display(),
                backup = %backup.display(),
                "Moved unreadable engine parameters aside"
            );
        }
        self.unreadable.store(false, Ordering::Release);
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "Engine parameters saved");
        Ok(())
    }

    pub fn set_task_parameters(
        &self,
        engine_path: &str,
        task: Task,
        parameters: ParameterMap,
    ) -> Result<(), ParameterStoreError> {
        self.update(engine_path, |entry| {
            entry.tasks.insert(task.as_str().to_string(), parameters);
        })
    }

    pub fn set_engine_options(
        &self,
        engine_path: &str,
        options: Vec<EngineOptionDeclaration>,
    ) -> Result<(), ParameterStoreError> {
        self.update(engine_path, |entry| entry.options = options)
    }

    pub fn engine_options(&self, engine_path: &str) -> Vec<EngineOptionDeclaration> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(engine_path)
            .map(|entry| entry.options.clone())
            .unwrap_or_default()
    }

    /// Forget everything stored for an engine. Removing an unknown engine is
    /// not an error.
    pub fn remove_engine(&self, engine_path: &str) -> Result<(), ParameterStoreError> {
        let removed = self
            .data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(engine_path)
            .is_some();
        if removed {
            self.save()?;
        }
        Ok(())
    }

    pub fn engines(&self) -> Vec<String> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn update(
        &self,
        engine_path: &str,
        apply: impl FnOnce(&mut EngineParameters),
    ) -> Result<(), ParameterStoreError> {
        {
            let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
            apply(data.entry(engine_path.to_string()).or_default());
        }
        self.save()
    }
}

impl ParameterStore for JsonParameterStore {
    fn task_parameters(&self, engine_path: &str, task: Task) -> Option<ParameterMap> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(engine_path)?
            .tasks
            .get(task.as_str())
            .filter(|params| !params.is_empty())
            .cloned()
    }
}

/// `None` when the file exists but cannot be read as a parameter document.
fn read_document(path: &Path) -> Option<Document> {
    if !path.exists() {
        return Some(Document::new());
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(ParameterStoreError::from)
        .and_then(|contents| {
            serde_json::from_str::<Document>(&contents).map_err(ParameterStoreError::from)
        });
    match parsed {
        Ok(data) => {
            tracing::debug!(path = %path.display(), engines = data.len(), "Engine parameters loaded");
            Some(data)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load engine parameters, using defaults");
            None
        }
    }
}

/// Parameters held in memory only. Counts lookups so callers can check when
/// parameters are resolved.
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    entries: Mutex<HashMap<(String, Task), ParameterMap>>,
    lookups: Mutex<usize>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, engine_path: &str, task: Task, parameters: ParameterMap) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((engine_path.to_string(), task), parameters);
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ParameterStore for InMemoryParameterStore {
    fn task_parameters(&self, engine_path: &str, task: Task) -> Option<ParameterMap> {
        *self.lookups.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(engine_path.to_string(), task))
            .cloned()
    }
}
