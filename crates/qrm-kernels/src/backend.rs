//! Capability-probed kernel registry.
//!
//! Variants are probed once, in priority order `native`, `packed`,
//! `reference`. Resolution of a requested variant is cached per request, and
//! an unavailable request falls back to the most accelerated variant that
//! probed successfully. `reference` cannot fail to probe.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use qrm_core::{ErrorInfo, QrmError};
use serde::{Deserialize, Serialize};

use crate::overlap::ReferenceKernel;
use crate::packed::PackedKernel;
use crate::CellKernel;

/// Environment variable naming the native kernel library.
pub const NATIVE_KERNEL_ENV: &str = "QRM_NATIVE_KERNEL";

/// Identifier of a kernel variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendName {
    /// Kernel loaded from a native shared library.
    Native,
    /// Popcount kernel over bit-packed outcomes.
    Packed,
    /// String based kernel, always available.
    Reference,
}

impl BackendName {
    /// Every variant, most accelerated first.
    pub const PRIORITY: [BackendName; 3] = [
        BackendName::Native,
        BackendName::Packed,
        BackendName::Reference,
    ];

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendName::Native => "native",
            BackendName::Packed => "packed",
            BackendName::Reference => "reference",
        }
    }

    fn slot(self) -> usize {
        match self {
            BackendName::Native => 1,
            BackendName::Packed => 2,
            BackendName::Reference => 3,
        }
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendName {
    type Err = QrmError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(BackendName::Native),
            "packed" => Ok(BackendName::Packed),
            "reference" => Ok(BackendName::Reference),
            other => Err(QrmError::Config(
                ErrorInfo::new("unknown_backend", format!("unknown backend {other:?}"))
                    .with_hint("expected one of native, packed, reference"),
            )),
        }
    }
}

/// Probe outcome for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Variant name.
    pub name: BackendName,
    /// Whether the variant can be resolved directly.
    pub available: bool,
    /// Why the probe failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Inputs to the capability probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeOpts {
    /// Shared library providing the native kernel.
    pub native_library: Option<PathBuf>,
    /// Variants to treat as unavailable regardless of the host.
    pub disabled: Vec<BackendName>,
}

impl ProbeOpts {
    /// Reads the native library location from [`NATIVE_KERNEL_ENV`].
    pub fn from_env() -> Self {
        Self {
            native_library: std::env::var_os(NATIVE_KERNEL_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            disabled: Vec::new(),
        }
    }
}

type ProbeResult = Result<Arc<dyn CellKernel>, String>;

#[cfg(feature = "dynamic")]
fn probe_native(opts: &ProbeOpts) -> ProbeResult {
    let path = opts
        .native_library
        .as_ref()
        .ok_or_else(|| format!("{NATIVE_KERNEL_ENV} is not set"))?;
    crate::native::NativeKernel::load(path)
        .map(|kernel| Arc::new(kernel) as Arc<dyn CellKernel>)
        .map_err(|err| err.to_string())
}

#[cfg(not(feature = "dynamic"))]
fn probe_native(_opts: &ProbeOpts) -> ProbeResult {
    Err("built without the `dynamic` feature".to_string())
}

fn probe(name: BackendName, opts: &ProbeOpts) -> ProbeResult {
    if name != BackendName::Reference && opts.disabled.contains(&name) {
        return Err("disabled by configuration".to_string());
    }
    match name {
        BackendName::Native => probe_native(opts),
        BackendName::Packed => {
            PackedKernel::probe().map(|()| Arc::new(PackedKernel) as Arc<dyn CellKernel>)
        }
        BackendName::Reference => Ok(Arc::new(ReferenceKernel) as Arc<dyn CellKernel>),
    }
}

/// Probed set of kernels together with the cached resolutions.
pub struct BackendRegistry {
    descriptors: Vec<BackendDescriptor>,
    kernels: BTreeMap<BackendName, Arc<dyn CellKernel>>,
    resolved: [OnceLock<Arc<dyn CellKernel>>; 4],
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("descriptors", &self.descriptors)
            .finish_non_exhaustive()
    }
}

impl BackendRegistry {
    /// Probes every variant once.
    pub fn probe(opts: &ProbeOpts) -> Self {
        let mut descriptors = Vec::with_capacity(BackendName::PRIORITY.len());
        let mut kernels = BTreeMap::new();
        for name in BackendName::PRIORITY {
            match probe(name, opts) {
                Ok(kernel) => {
                    tracing::debug!(backend = %name, "kernel available");
                    kernels.insert(name, kernel);
                    descriptors.push(BackendDescriptor {
                        name,
                        available: true,
                        reason: None,
                    });
                }
                Err(reason) => {
                    tracing::debug!(backend = %name, %reason, "kernel unavailable");
                    descriptors.push(BackendDescriptor {
                        name,
                        available: false,
                        reason: Some(reason),
                    });
                }
            }
        }
        Self {
            descriptors,
            kernels,
            resolved: Default::default(),
        }
    }

    /// Probe outcome for every variant, in priority order.
    pub fn availability(&self) -> &[BackendDescriptor] {
        &self.descriptors
    }

    /// Whether `name` probed successfully.
    pub fn is_available(&self, name: BackendName) -> bool {
        self.kernels.contains_key(&name)
    }

    /// Most accelerated available variant.
    pub fn default_backend(&self) -> BackendName {
        BackendName::PRIORITY
            .into_iter()
            .find(|name| self.is_available(*name))
            .unwrap_or(BackendName::Reference)
    }

    /// Returns the kernel for `name` without falling back.
    pub fn kernel(&self, name: BackendName) -> Option<Arc<dyn CellKernel>> {
        self.kernels.get(&name).cloned()
    }

    /// Every available kernel, most accelerated first.
    pub fn available_kernels(&self) -> Vec<Arc<dyn CellKernel>> {
        BackendName::PRIORITY
            .into_iter()
            .filter_map(|name| self.kernel(name))
            .collect()
    }

    /// Resolves a requested variant, or the default when `None`.
    ///
    /// The first resolution of each request is cached; a fallback warning is
    /// emitted once per unavailable request.
    pub fn resolve(&self, requested: Option<BackendName>) -> Arc<dyn CellKernel> {
        let slot = requested.map_or(0, BackendName::slot);
        self.resolved[slot]
            .get_or_init(|| self.resolve_uncached(requested))
            .clone()
    }

    fn resolve_uncached(&self, requested: Option<BackendName>) -> Arc<dyn CellKernel> {
        if let Some(name) = requested {
            if let Some(kernel) = self.kernel(name) {
                return kernel;
            }
        }
        let fallback = self.default_backend();
        if let Some(name) = requested {
            let reason = self
                .descriptors
                .iter()
                .find(|descriptor| descriptor.name == name)
                .and_then(|descriptor| descriptor.reason.clone())
                .unwrap_or_default();
            tracing::warn!(
                requested = %name,
                fallback = %fallback,
                %reason,
                "requested backend is unavailable, falling back"
            );
        }
        self.kernel(fallback)
            .unwrap_or_else(|| Arc::new(ReferenceKernel) as Arc<dyn CellKernel>)
    }
}

/// Process-wide registry, probed from the environment on first use.
pub fn registry() -> &'static BackendRegistry {
    static REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| BackendRegistry::probe(&ProbeOpts::from_env()))
}

/// Resolves `requested` against the process-wide registry.
pub fn resolve_backend(requested: Option<BackendName>) -> Arc<dyn CellKernel> {
    registry().resolve(requested)
}

/// Probe outcome of the process-wide registry.
pub fn availability() -> &'static [BackendDescriptor] {
    registry().availability()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("Packed".parse::<BackendName>().unwrap(), BackendName::Packed);
        let err = "cython".parse::<BackendName>().unwrap_err();
        assert_eq!(err.info().code, "unknown_backend");
    }

    #[test]
    fn reference_cannot_be_disabled() {
        let registry = BackendRegistry::probe(&ProbeOpts {
            native_library: None,
            disabled: vec![BackendName::Packed, BackendName::Reference],
        });
        assert!(registry.is_available(BackendName::Reference));
        assert_eq!(registry.default_backend(), BackendName::Reference);
    }

    #[test]
    fn resolution_is_cached() {
        let registry = BackendRegistry::probe(&ProbeOpts::default());
        let first = registry.resolve(Some(BackendName::Native));
        let second = registry.resolve(Some(BackendName::Native));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
