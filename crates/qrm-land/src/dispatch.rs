use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use qrm_core::{BitWindow, CellResult, ErrorInfo, Histogram, QrmError};
use qrm_kernels::{magnetsq_cell, purity_cell, resolve_backend, BackendName, CellKernel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::serde::from_yaml_slice;
use crate::workers::{workers_for, SERIAL_THRESHOLD};

fn default_serial_threshold() -> usize {
    SERIAL_THRESHOLD
}

/// Options governing a batch of cell computations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellOpts {
    /// Kernel variant to request; the most accelerated available when absent.
    #[serde(default)]
    pub backend: Option<BackendName>,
    /// Worker count override; every available core when absent.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Shots each purity histogram must hold; unchecked when absent.
    #[serde(default)]
    pub shots: Option<u64>,
    /// Batches smaller than this run serially.
    #[serde(default = "default_serial_threshold")]
    pub serial_threshold: usize,
}

impl Default for CellOpts {
    fn default() -> Self {
        Self {
            backend: None,
            workers: None,
            shots: None,
            serial_threshold: default_serial_threshold(),
        }
    }
}

impl CellOpts {
    /// Parses options from a YAML (or JSON) payload.
    pub fn from_yaml_slice(data: &[u8]) -> Result<Self, QrmError> {
        from_yaml_slice(data)
    }

    /// Returns a copy with the worker override set.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Returns a copy requesting `backend`.
    pub fn with_backend(mut self, backend: BackendName) -> Self {
        self.backend = Some(backend);
        self
    }
}

/// Computes one purity cell per histogram, ordered by input index.
pub fn compute_purity_cells(
    histograms: Vec<Histogram>,
    window: &BitWindow,
    opts: &CellOpts,
) -> Result<Vec<CellResult>, QrmError> {
    let kernel = resolve_backend(opts.backend);
    run_purity_cells(histograms, window, kernel.as_ref(), opts)
}

/// Computes one magnetization-square cell per two-qubit histogram, ordered by input index.
pub fn compute_magnetsq_cells(
    histograms: Vec<Histogram>,
    shots: u64,
    opts: &CellOpts,
) -> Result<Vec<CellResult>, QrmError> {
    let kernel = resolve_backend(opts.backend);
    run_magnetsq_cells(histograms, shots, kernel.as_ref(), opts)
}

/// [`compute_purity_cells`] with an explicit kernel.
pub fn run_purity_cells(
    histograms: Vec<Histogram>,
    window: &BitWindow,
    kernel: &dyn CellKernel,
    opts: &CellOpts,
) -> Result<Vec<CellResult>, QrmError> {
    run_cells("purity", histograms, kernel, opts, |index, histogram| {
        if let Some(shots) = opts.shots {
            histogram.check_shots(shots)?;
        }
        purity_cell(index, &histogram, window, kernel)
    })
}

/// [`compute_magnetsq_cells`] with an explicit kernel.
pub fn run_magnetsq_cells(
    histograms: Vec<Histogram>,
    shots: u64,
    kernel: &dyn CellKernel,
    opts: &CellOpts,
) -> Result<Vec<CellResult>, QrmError> {
    qrm_kernels::correlation::check_shots_declared(shots)?;
    run_cells("magnetsq", histograms, kernel, opts, |index, histogram| {
        magnetsq_cell(index, &histogram, shots, kernel)
    })
}

fn run_cells<F>(
    kind: &'static str,
    histograms: Vec<Histogram>,
    kernel: &dyn CellKernel,
    opts: &CellOpts,
    cell: F,
) -> Result<Vec<CellResult>, QrmError>
where
    F: Fn(usize, Histogram) -> Result<CellResult, QrmError> + Sync,
{
    let total = histograms.len();
    let workers = workers_for(opts.workers, total)?;
    let began = Instant::now();

    let mut results = if workers == 1 || total < opts.serial_threshold {
        tracing::info!(kind, cells = total, backend = %kernel.name(), "computing cells serially");
        let mut collected = Vec::with_capacity(total);
        for (index, histogram) in histograms.into_iter().enumerate() {
            collected.push(guarded(index, histogram, &cell)?);
            tracing::debug!(
                kind,
                index,
                done = index + 1,
                total,
                elapsed_ms = began.elapsed().as_millis() as u64,
                "cell computed"
            );
        }
        collected
    } else {
        tracing::info!(kind, cells = total, workers, backend = %kernel.name(), "distributing cells");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| QrmError::Worker(ErrorInfo::new("thread_pool", err.to_string())))?;
        pool.install(|| {
            histograms
                .into_par_iter()
                .enumerate()
                .map(|(index, histogram)| guarded(index, histogram, &cell))
                .collect::<Result<Vec<_>, QrmError>>()
        })?
    };

    results.sort_by_key(|result| result.index);
    tracing::info!(
        kind,
        cells = total,
        elapsed_ms = began.elapsed().as_millis() as u64,
        "cells complete"
    );
    Ok(results)
}

fn guarded<F>(index: usize, histogram: Histogram, cell: &F) -> Result<CellResult, QrmError>
where
    F: Fn(usize, Histogram) -> Result<CellResult, QrmError>,
{
    match catch_unwind(AssertUnwindSafe(|| cell(index, histogram))) {
        Ok(result) => result.map_err(|err| err.at_index(index)),
        Err(payload) => Err(QrmError::Worker(
            ErrorInfo::new("cell_panicked", panic_message(payload.as_ref()))
                .with_context("index", index),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "cell computation panicked".to_string()
    }
}
