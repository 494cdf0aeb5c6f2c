mod support;

use proptest::prelude::*;
use qrm_core::{synthetic_ensemble, BitWindow, Histogram};
use qrm_kernels::{BackendName, BackendRegistry, CellKernel, PackedKernel, ReferenceKernel};

fn registry_with_native() -> BackendRegistry {
    let registry = BackendRegistry::probe(&support::fixture_probe());
    assert!(
        registry.is_available(BackendName::Native),
        "{:?}",
        registry.availability()
    );
    registry
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn windows() -> Vec<BitWindow> {
    vec![
        BitWindow::full(6),
        BitWindow::new(6, 0, 3, 3).unwrap(),
        BitWindow::new(6, 2, 5, 3).unwrap(),
        BitWindow::new(6, 4, 2, 4).unwrap(),
        BitWindow::new(6, 5, 1, 2).unwrap(),
        BitWindow::new(6, 3, 3, 6).unwrap(),
        BitWindow::new(6, 1, 1, 0).unwrap(),
    ]
}

fn assert_equivalent(kernels: &[std::sync::Arc<dyn CellKernel>], histograms: &[Histogram]) {
    for window in windows() {
        for (index, histogram) in histograms.iter().enumerate() {
            let expected = ReferenceKernel.purity_cell(histogram, &window).unwrap();
            for kernel in kernels {
                let value = kernel.purity_cell(histogram, &window).unwrap();
                assert!(
                    close(expected, value),
                    "{} disagrees on histogram {index} window {window:?}: {value} vs {expected}",
                    kernel.name()
                );
            }
        }
    }
}

#[test]
fn every_available_backend_matches_reference_on_sparse_histograms() {
    let registry = registry_with_native();
    let histograms = synthetic_ensemble(6, 64, 12, 7);
    assert_equivalent(&registry.available_kernels(), &histograms);
}

#[test]
fn every_available_backend_matches_reference_on_dense_histograms() {
    let registry = registry_with_native();
    // large shot counts populate most outcomes, which selects the dense transform
    let histograms = synthetic_ensemble(6, 4096, 4, 11);
    assert_equivalent(&registry.available_kernels(), &histograms);
}

#[test]
fn magnetsq_backends_agree() {
    let registry = registry_with_native();
    let histograms = synthetic_ensemble(2, 1000, 16, 3);
    for histogram in &histograms {
        let expected = ReferenceKernel.magnetsq_cell(histogram, 1000).unwrap();
        for kernel in registry.available_kernels() {
            let value = kernel.magnetsq_cell(histogram, 1000).unwrap();
            assert!(close(expected, value), "{} disagrees", kernel.name());
        }
    }
}

#[test]
fn wide_subsystems_fall_back_to_string_kernel() {
    let registry = registry_with_native();
    let width = 70;
    let ones: String = "1".repeat(width);
    let mixed: String = (0..width).map(|i| if i % 3 == 0 { '1' } else { '0' }).collect();
    let histogram = Histogram::from_counts([(ones, 6), (mixed, 4)]);
    let window = BitWindow::full(width);
    let expected = ReferenceKernel.purity_cell(&histogram, &window).unwrap();
    for kernel in registry.available_kernels() {
        let value = kernel.purity_cell(&histogram, &window).unwrap();
        assert!(close(expected, value));
    }
}

fn span(n: usize, start: usize, end: usize) -> usize {
    if start <= end {
        end - start
    } else {
        n - start + end
    }
}

proptest! {
    #[test]
    fn packed_matches_reference_on_random_histograms(
        outcomes in prop::collection::vec((0u32..32, 2u64..50), 1..12),
        start in 0usize..5,
        end in 0usize..5,
    ) {
        let histogram: Histogram = outcomes
            .iter()
            .map(|(mask, count)| (format!("{mask:05b}"), *count))
            .collect();
        let window = BitWindow::new(5, start, end, span(5, start, end)).unwrap();
        let reference = ReferenceKernel.purity_cell(&histogram, &window).unwrap();
        let packed = PackedKernel.purity_cell(&histogram, &window).unwrap();
        prop_assert!(close(reference, packed), "{reference} vs {packed}");
    }
}
