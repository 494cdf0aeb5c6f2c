use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use qrm_kernels::{BackendName, BackendRegistry, ProbeOpts};
use tracing_subscriber::fmt::MakeWriter;

fn without_accelerators() -> BackendRegistry {
    BackendRegistry::probe(&ProbeOpts {
        native_library: None,
        disabled: vec![BackendName::Packed],
    })
}

#[test]
fn missing_native_library_is_recorded_not_fatal() {
    let registry = BackendRegistry::probe(&ProbeOpts::default());
    let native = &registry.availability()[0];
    assert_eq!(native.name, BackendName::Native);
    assert!(!native.available);
    assert!(native.reason.is_some());
    assert!(registry.is_available(BackendName::Reference));
}

#[test]
fn unloadable_native_library_reports_the_loader_error() {
    let registry = BackendRegistry::probe(&ProbeOpts {
        native_library: Some("/nonexistent/libqrm_kernel.so".into()),
        disabled: Vec::new(),
    });
    assert!(!registry.is_available(BackendName::Native));
    let reason = registry.availability()[0].reason.clone().unwrap_or_default();
    assert!(!reason.is_empty());
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        let bytes = self.0.lock().map(|buf| buf.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut captured) = self.0.lock() {
            captured.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn with_captured_warnings<T>(run: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, run);
    (value, logs.text())
}

#[test]
fn unavailable_request_falls_back_to_reference() {
    let registry = without_accelerators();
    let (names, logs) = with_captured_warnings(|| {
        let packed = registry.resolve(Some(BackendName::Packed)).name();
        let native = registry.resolve(Some(BackendName::Native)).name();
        (packed, native)
    });
    assert_eq!(names, (BackendName::Reference, BackendName::Reference));
    assert_eq!(registry.default_backend(), BackendName::Reference);

    let warnings: Vec<&str> = logs
        .lines()
        .filter(|line| line.contains("requested backend is unavailable"))
        .collect();
    assert_eq!(warnings.len(), 2, "{logs}");
    assert!(warnings[0].contains("WARN"), "{logs}");
    assert!(warnings[0].contains("requested=packed"), "{logs}");
    assert!(warnings[0].contains("fallback=reference"), "{logs}");
    assert!(warnings[0].contains("disabled by configuration"), "{logs}");
    assert!(warnings[1].contains("requested=native"), "{logs}");
    assert!(warnings[1].contains("is not set"), "{logs}");
}

#[test]
fn fallback_warning_fires_once_per_request() {
    let registry = without_accelerators();
    let (_, logs) = with_captured_warnings(|| {
        for _ in 0..3 {
            registry.resolve(Some(BackendName::Packed));
        }
        registry.resolve(Some(BackendName::Reference));
        registry.resolve(None);
    });
    assert_eq!(logs.matches("requested backend is unavailable").count(), 1, "{logs}");
}

#[test]
fn default_request_prefers_most_accelerated() {
    let registry = BackendRegistry::probe(&ProbeOpts::default());
    let expected = BackendName::PRIORITY
        .into_iter()
        .find(|name| registry.is_available(*name))
        .unwrap();
    assert_eq!(registry.resolve(None).name(), expected);
    assert!(Arc::ptr_eq(&registry.resolve(None), &registry.resolve(None)));
}

#[test]
fn availability_serializes_with_reasons() {
    let registry = without_accelerators();
    let value = serde_json::to_value(registry.availability()).unwrap();
    assert_eq!(value[1]["name"], "packed");
    assert_eq!(value[1]["reason"], "disabled by configuration");
    assert!(value[2].get("reason").is_none());
}

#[test]
fn global_registry_is_probed_once() {
    let first = qrm_kernels::registry() as *const BackendRegistry;
    let second = qrm_kernels::registry() as *const BackendRegistry;
    assert_eq!(first, second);
    assert!(qrm_kernels::availability()
        .iter()
        .any(|descriptor| descriptor.name == BackendName::Reference && descriptor.available));
}
