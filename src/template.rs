use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Context as _;

use crate::{
    error::{ClockError, ClockResult},
    layout::{self, LayoutConfig},
};

/// Directory-backed store for vector templates and their paired layouts.
///
/// Templates live at `<root>/<name>.svg`, layouts at `<root>/<name>.json`.
/// The first `load` for a name reads storage and caches the content; repeat
/// loads return the cached value without touching disk. A failed load is
/// never cached, so a retry after the file appears succeeds.
pub struct TemplateStore {
    root: PathBuf,
    templates: Mutex<HashMap<String, Arc<str>>>,
    layouts: Mutex<HashMap<String, Arc<LayoutConfig>>>,
    storage_reads: AtomicU64,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            templates: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
            storage_reads: AtomicU64::new(0),
        }
    }

    /// Load a template by name, reading storage at most once per name.
    pub fn load(&self, name: &str) -> ClockResult<Arc<str>> {
        validate_name(name)?;

        let mut cache = self.templates.lock().expect("template cache poisoned");
        if let Some(content) = cache.get(name) {
            tracing::debug!(name, "template cache hit");
            return Ok(Arc::clone(content));
        }

        let content: Arc<str> = Arc::from(self.read_to_string(&format!("{name}.svg"))?);
        tracing::debug!(name, bytes = content.len(), "template loaded from storage");
        cache.insert(name.to_string(), Arc::clone(&content));
        Ok(content)
    }

    /// Load and parse the layout document paired with `name`.
    ///
    /// Parse failures surface as `LayoutConfigError` and are not cached.
    pub fn load_layout(&self, name: &str) -> ClockResult<Arc<LayoutConfig>> {
        validate_name(name)?;

        let mut cache = self.layouts.lock().expect("layout cache poisoned");
        if let Some(config) = cache.get(name) {
            tracing::debug!(name, "layout cache hit");
            return Ok(Arc::clone(config));
        }

        let source = self.read_to_string(&format!("{name}.json"))?;
        let config = Arc::new(layout::parse(&source)?);
        tracing::debug!(name, fields = config.fields.len(), "layout loaded from storage");
        cache.insert(name.to_string(), Arc::clone(&config));
        Ok(config)
    }

    /// Drop every cached entry, forcing the next load to re-read storage.
    pub fn clear_cache(&self) {
        self.templates.lock().expect("template cache poisoned").clear();
        self.layouts.lock().expect("layout cache poisoned").clear();
        tracing::debug!("template store cache cleared");
    }

    /// Number of backing-storage reads performed so far.
    pub fn storage_reads(&self) -> u64 {
        self.storage_reads.load(Ordering::Relaxed)
    }

    fn read_to_string(&self, file_name: &str) -> ClockResult<String> {
        let path = self.root.join(Path::new(file_name));
        self.storage_reads.fetch_add(1, Ordering::Relaxed);

        if !path.is_file() {
            return Err(ClockError::template_not_found(file_name.to_string()));
        }
        std::fs::read_to_string(&path)
            .with_context(|| format!("read template file '{}'", path.display()))
            .map_err(ClockError::from)
    }
}

/// Names address files inside the store root only.
fn validate_name(name: &str) -> ClockResult<()> {
    if name.is_empty()
        || name.contains(['/', '\\'])
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(ClockError::template_not_found(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation_rejects_traversal() {
        assert!(validate_name("landscape").is_ok());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name(".hidden").is_err());
    }
}
