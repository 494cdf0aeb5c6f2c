use qrm_core::{ErrorInfo, QrmError};

/// Batches smaller than this run in the calling thread.
pub const SERIAL_THRESHOLD: usize = 4;

/// Parallelism reported by the host, at least one.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

/// Resolves the requested worker count against the host.
///
/// `None` uses every available core; requests above that are capped with a
/// warning; zero is rejected.
pub fn resolve_workers(requested: Option<usize>) -> Result<usize, QrmError> {
    let limit = available_workers();
    match requested {
        None => Ok(limit),
        Some(0) => Err(QrmError::Config(
            ErrorInfo::new("zero_workers", "worker count must be at least one")
                .with_hint("omit the override to use every available core"),
        )),
        Some(count) if count > limit => {
            tracing::warn!(
                requested = count,
                limit,
                "worker count exceeds available parallelism, capping"
            );
            Ok(limit)
        }
        Some(count) => Ok(count),
    }
}

/// Workers to launch for a batch of `cells` tasks.
pub fn workers_for(requested: Option<usize>, cells: usize) -> Result<usize, QrmError> {
    Ok(resolve_workers(requested)?.min(cells.max(1)))
}
