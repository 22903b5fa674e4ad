//! Where fonts and images come from.
//!
//! Templates, fonts and images are fetched through [`ResourceProvider`]
//! so the engine never hard-codes a filesystem layout. Font lookup chains
//! two providers (a provider-specific directory, then a shared one).

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    NotFound(String),
    LoadFailed { path: String, message: String },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound(path) => write!(f, "resource not found: {path}"),
            ResourceError::LoadFailed { path, message } => {
                write!(f, "failed to load resource '{path}': {message}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

pub type SharedResourceData = Arc<Vec<u8>>;

pub trait ResourceProvider: Send + Sync + fmt::Debug {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError>;

    /// Human-readable description used in notices.
    fn describe(&self) -> String;
}

/// Loads files relative to a base directory. Paths escaping the base
/// directory (absolute paths, `..`) are refused.
#[derive(Debug, Clone)]
pub struct FilesystemResourceProvider {
    base_path: PathBuf,
    canonical_base: Option<PathBuf>,
}

impl FilesystemResourceProvider {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base = base_path.as_ref().to_path_buf();
        let canonical = base.canonicalize().ok();
        Self {
            base_path: base,
            canonical_base: canonical,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path_safe(&self, path: &str) -> Option<PathBuf> {
        if Path::new(path).is_absolute() {
            return None;
        }
        if Path::new(path)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }

        let full_path = self.base_path.join(path);
        if let Ok(canonical) = full_path.canonicalize()
            && let Some(base) = &self.canonical_base
        {
            return canonical.starts_with(base).then_some(canonical);
        }
        Some(full_path)
    }
}

impl ResourceProvider for FilesystemResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let full_path = self
            .resolve_path_safe(path)
            .ok_or_else(|| ResourceError::NotFound(format!("{path} (outside {})", self.base_path.display())))?;

        std::fs::read(&full_path).map(Arc::new).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(full_path.display().to_string())
            } else {
                ResourceError::LoadFailed {
                    path: full_path.display().to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn describe(&self) -> String {
        self.base_path.display().to_string()
    }
}

/// Pre-populated in-memory store, for hosts that fetch resources themselves.
#[derive(Debug, Default)]
pub struct InMemoryResourceProvider {
    label: String,
    resources: RwLock<HashMap<String, SharedResourceData>>,
}

impl InMemoryResourceProvider {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            resources: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, path: impl Into<String>, data: Vec<u8>) {
        if let Ok(mut resources) = self.resources.write() {
            resources.insert(path.into(), Arc::new(data));
        }
    }

    pub fn len(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceProvider for InMemoryResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let resources = self.resources.read().map_err(|_| ResourceError::LoadFailed {
            path: path.to_string(),
            message: "resource store lock poisoned".to_string(),
        })?;
        resources
            .get(path)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(format!("{path} (in {})", self.label)))
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.label)
    }
}
