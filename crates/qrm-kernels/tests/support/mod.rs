use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};

use qrm_kernels::ProbeOpts;

fn newest_match(dir: &Path, stem: &str) -> Option<(std::time::SystemTime, PathBuf)> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(stem) && name.ends_with(DLL_SUFFIX)
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .max()
}

/// Shared library built from `qrm-native-fixture` next to this test binary.
pub fn fixture_library() -> PathBuf {
    let exe = std::env::current_exe().expect("test binary path");
    let deps = exe.parent().expect("test binary directory");
    let stem = format!("{DLL_PREFIX}qrm_native_fixture");
    [Some(deps), deps.parent()]
        .into_iter()
        .flatten()
        .filter_map(|dir| newest_match(dir, &stem))
        .max()
        .map(|(_, path)| path)
        .unwrap_or_else(|| panic!("{stem}*{DLL_SUFFIX} not found near {}", deps.display()))
}

/// Probe options binding the fixture as the native kernel.
pub fn fixture_probe() -> ProbeOpts {
    ProbeOpts {
        native_library: Some(fixture_library()),
        disabled: Vec::new(),
    }
}
