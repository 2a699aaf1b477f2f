//! Capability registry: discovery, quarantine and lookup of backends and
//! extensions.
//!
//! A [`Catalog`] lists every known backend and extension together with a
//! constructor. [`CapabilityRegistry::discover`] runs each constructor once,
//! quarantines entries whose constructor fails or panics, groups the healthy
//! backends by category and freezes the result. The registry is read-only
//! from then on and is shared behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::{Backend, Extension, Phase};
use crate::config::DEFAULT_CATEGORY;
use crate::error::{panic_message, RegistryError};

/// Opaque per-backend parameters, consumed only by the backend's
/// constructor.
pub type BackendParams = Map<String, Value>;

/// Builds a backend from its configured parameters.
pub type BackendConstructor =
    Box<dyn Fn(&BackendParams) -> Result<Arc<dyn Backend>, RegistryError> + Send + Sync>;

/// Builds an extension.
pub type ExtensionConstructor =
    Box<dyn Fn() -> Result<Arc<dyn Extension>, RegistryError> + Send + Sync>;

/// Whether a discovered unit can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Constructed successfully.
    Active,
    /// Construction failed; the unit is quarantined.
    Failed,
}

/// Static description of a discovered backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendDescriptor {
    /// Unique name.
    pub name: String,
    /// Category, `"general"` when none was declared.
    pub category: String,
    /// Discovery status.
    pub status: Status,
    /// Parameters the backend was constructed with.
    pub configured_params: BackendParams,
    /// Why construction failed, for failed entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Static description of a discovered extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionDescriptor {
    /// Unique name.
    pub name: String,
    /// Phase reported by the instance; `Unknown` for failed entries.
    pub phase: Phase,
    /// Discovery status.
    pub status: Status,
    /// Why construction failed, for failed entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct BackendEntry {
    name: String,
    category: Option<String>,
    params: BackendParams,
    constructor: BackendConstructor,
}

struct ExtensionEntry {
    name: String,
    constructor: ExtensionConstructor,
}

/// The static list of backends and extensions known to the process.
///
/// Registration order is preserved and determines listing order.
#[derive(Default)]
pub struct Catalog {
    backends: Vec<BackendEntry>,
    extensions: Vec<ExtensionEntry>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend constructor.
    ///
    /// A `None` or empty category places the backend in `"general"`.
    pub fn register_backend<F>(
        &mut self,
        name: impl Into<String>,
        category: Option<String>,
        params: BackendParams,
        constructor: F,
    ) -> &mut Self
    where
        F: Fn(&BackendParams) -> Result<Arc<dyn Backend>, RegistryError> + Send + Sync + 'static,
    {
        self.backends.push(BackendEntry {
            name: name.into(),
            category,
            params,
            constructor: Box::new(constructor),
        });
        self
    }

    /// Register an extension constructor.
    pub fn register_extension<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Extension>, RegistryError> + Send + Sync + 'static,
    {
        self.extensions.push(ExtensionEntry {
            name: name.into(),
            constructor: Box::new(constructor),
        });
        self
    }

    /// Number of registered backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Number of registered extensions.
    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }
}

/// A resolved, ready-to-call backend.
#[derive(Clone)]
pub struct BackendHandle {
    name: Arc<str>,
    category: Arc<str>,
    backend: Arc<dyn Backend>,
}

impl BackendHandle {
    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category the backend was filed under.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The backend instance.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// A resolved, ready-to-call extension with its phase already known.
#[derive(Clone)]
pub struct ExtensionHandle {
    name: Arc<str>,
    phase: Phase,
    extension: Arc<dyn Extension>,
}

impl ExtensionHandle {
    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Phase captured at discovery time.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The extension instance.
    pub fn extension(&self) -> &Arc<dyn Extension> {
        &self.extension
    }
}

impl std::fmt::Debug for ExtensionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHandle")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Names partitioned by discovery status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Units that constructed successfully.
    pub active: Vec<String>,
    /// Units that were quarantined.
    pub failed: Vec<String>,
}

/// Summary of a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Backends, flat.
    pub backends: StatusReport,
    /// Active backends grouped by category.
    pub backends_by_category: BTreeMap<String, Vec<String>>,
    /// Extensions, flat.
    pub extensions: StatusReport,
}

/// Immutable snapshot of every discovered backend and extension.
pub struct CapabilityRegistry {
    backends: HashMap<String, BackendHandle>,
    extensions: HashMap<String, ExtensionHandle>,
    backend_descriptors: Vec<BackendDescriptor>,
    extension_descriptors: Vec<ExtensionDescriptor>,
    categories: BTreeMap<String, Vec<String>>,
}

impl CapabilityRegistry {
    /// Instantiate every catalog entry and freeze the result.
    ///
    /// A constructor that returns an error or panics marks its entry
    /// [`Status::Failed`]; discovery always continues with the next entry.
    /// Duplicate names after the first are ignored with a warning.
    pub fn discover(catalog: Catalog) -> Self {
        let mut registry = Self {
            backends: HashMap::new(),
            extensions: HashMap::new(),
            backend_descriptors: Vec::with_capacity(catalog.backends.len()),
            extension_descriptors: Vec::with_capacity(catalog.extensions.len()),
            categories: BTreeMap::new(),
        };

        for entry in catalog.backends {
            registry.add_backend(entry);
        }
        for entry in catalog.extensions {
            registry.add_extension(entry);
        }

        for (category, names) in &registry.categories {
            tracing::info!(%category, backends = ?names, "active backends");
        }
        let report = registry.report();
        if !report.backends.failed.is_empty() {
            tracing::warn!(failed = ?report.backends.failed, "failed backends");
        }
        tracing::info!(active = ?report.extensions.active, "active extensions");
        if !report.extensions.failed.is_empty() {
            tracing::warn!(failed = ?report.extensions.failed, "failed extensions");
        }

        registry
    }

    fn add_backend(&mut self, entry: BackendEntry) {
        if self.backend_descriptors.iter().any(|d| d.name == entry.name) {
            tracing::warn!(backend = %entry.name, "duplicate backend name ignored");
            return;
        }

        let category = entry
            .category
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());

        let built = catch_unwind(AssertUnwindSafe(|| (entry.constructor)(&entry.params)));
        let (status, error) = match built {
            Ok(Ok(backend)) => {
                let handle = BackendHandle {
                    name: Arc::from(entry.name.as_str()),
                    category: Arc::from(category.as_str()),
                    backend,
                };
                self.backends.insert(entry.name.clone(), handle);
                self.categories
                    .entry(category.clone())
                    .or_default()
                    .push(entry.name.clone());
                (Status::Active, None)
            }
            Ok(Err(err)) => {
                tracing::warn!(backend = %entry.name, error = %err, "backend failed to initialize");
                (Status::Failed, Some(err.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    backend = %entry.name,
                    panic = %message,
                    "backend constructor panicked"
                );
                (Status::Failed, Some(format!("constructor panicked: {message}")))
            }
        };

        self.backend_descriptors.push(BackendDescriptor {
            name: entry.name,
            category,
            status,
            configured_params: entry.params,
            error,
        });
    }

    fn add_extension(&mut self, entry: ExtensionEntry) {
        if self.extension_descriptors.iter().any(|d| d.name == entry.name) {
            tracing::warn!(extension = %entry.name, "duplicate extension name ignored");
            return;
        }

        let built = catch_unwind(AssertUnwindSafe(|| (entry.constructor)()));
        let built = match built {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(payload) => Err(format!(
                "constructor panicked: {}",
                panic_message(payload.as_ref())
            )),
        };

        let descriptor = match built {
            Ok(extension) => {
                let phase = extension.phase();
                if phase == Phase::Unknown {
                    tracing::warn!(extension = %entry.name, "extension declares an unknown phase");
                }
                self.extensions.insert(
                    entry.name.clone(),
                    ExtensionHandle {
                        name: Arc::from(entry.name.as_str()),
                        phase,
                        extension,
                    },
                );
                ExtensionDescriptor {
                    name: entry.name,
                    phase,
                    status: Status::Active,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(extension = %entry.name, %error, "extension failed to initialize");
                ExtensionDescriptor {
                    name: entry.name,
                    phase: Phase::Unknown,
                    status: Status::Failed,
                    error: Some(error),
                }
            }
        };
        self.extension_descriptors.push(descriptor);
    }

    /// Look up an active backend by name.
    ///
    /// Unknown and quarantined names both return `None`.
    pub fn resolve_backend(&self, name: &str) -> Option<BackendHandle> {
        self.backends.get(name).cloned()
    }

    /// Look up an active extension by name.
    pub fn resolve_extension(&self, name: &str) -> Option<ExtensionHandle> {
        self.extensions.get(name).cloned()
    }

    /// Names of active backends in `category`, in registration order.
    /// Unknown categories yield an empty list.
    pub fn list_by_category(&self, category: &str) -> Vec<String> {
        self.categories.get(category).cloned().unwrap_or_default()
    }

    /// Whether at least one active backend is filed under `category`.
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// All categories that have at least one active backend, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Active extensions in `phase`, in registration order.
    pub fn extensions_in_phase(&self, phase: Phase) -> Vec<ExtensionHandle> {
        self.extension_descriptors
            .iter()
            .filter(|d| d.status == Status::Active && d.phase == phase)
            .filter_map(|d| self.resolve_extension(&d.name))
            .collect()
    }

    /// Every backend descriptor, including failed ones, in registration order.
    pub fn backend_descriptors(&self) -> &[BackendDescriptor] {
        &self.backend_descriptors
    }

    /// Every extension descriptor, including failed ones, in registration order.
    pub fn extension_descriptors(&self) -> &[ExtensionDescriptor] {
        &self.extension_descriptors
    }

    /// Partition discovered names by status.
    pub fn report(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport {
            backends_by_category: self.categories.clone(),
            ..Default::default()
        };
        for d in &self.backend_descriptors {
            match d.status {
                Status::Active => report.backends.active.push(d.name.clone()),
                Status::Failed => report.backends.failed.push(d.name.clone()),
            }
        }
        for d in &self.extension_descriptors {
            match d.status {
                Status::Active => report.extensions.active.push(d.name.clone()),
                Status::Failed => report.extensions.failed.push(d.name.clone()),
            }
        }
        report
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("backends", &self.backend_descriptors)
            .field("extensions", &self.extension_descriptors)
            .finish()
    }
}
