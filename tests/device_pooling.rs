use posepeak::device::check_buffers;
use posepeak::ops::same_max_pool_3x3_plane;
use posepeak::{
    DeviceError, DeviceFallback, Dims3, Executor, FinderConfig, MaxPoolDevice, PeakFinder,
    PosePeakError, Tensor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Host-side stand-in for an accelerator: same kernel, counted calls.
struct HostDevice {
    dims: Dims3,
    calls: Arc<AtomicUsize>,
}

impl MaxPoolDevice<f32> for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn dims(&self) -> Dims3 {
        self.dims
    }

    fn max_pool_3x3(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), DeviceError> {
        check_buffers(self.dims, input, output)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let plane = self.dims.plane_len();
        for (src, dst) in input.chunks(plane).zip(output.chunks_mut(plane)) {
            same_max_pool_3x3_plane(self.dims.height, self.dims.width, src, dst);
        }
        Ok(())
    }
}

struct BrokenDevice {
    dims: Dims3,
}

impl MaxPoolDevice<f32> for BrokenDevice {
    fn name(&self) -> &str {
        "broken"
    }

    fn dims(&self) -> Dims3 {
        self.dims
    }

    fn max_pool_3x3(&mut self, _input: &[f32], output: &mut [f32]) -> Result<(), DeviceError> {
        output.fill(f32::NAN);
        Err(DeviceError::Kernel("launch failed".to_string()))
    }
}

fn heatmap(dims: Dims3) -> Tensor<f32> {
    let data = (0..dims.len())
        .map(|i| ((i * 7919) % 101) as f32 / 101.0)
        .collect();
    Tensor::from_vec(data, dims).unwrap()
}

fn config(fallback: DeviceFallback) -> FinderConfig {
    FinderConfig {
        ksize: 3,
        executor: Executor::Sequential,
        device_fallback: fallback,
        ..FinderConfig::default()
    }
}

#[test]
fn device_pooling_matches_cpu_pooling() {
    let dims = Dims3::new(6, 14, 11);
    let input = heatmap(dims);
    let calls = Arc::new(AtomicUsize::new(0));
    let device = HostDevice {
        dims,
        calls: Arc::clone(&calls),
    };

    let mut cpu = PeakFinder::new(dims, config(DeviceFallback::Fail)).unwrap();
    let mut gpu = PeakFinder::new(dims, config(DeviceFallback::Fail))
        .unwrap()
        .with_device(Box::new(device))
        .unwrap();
    assert!(gpu.has_device());

    let expected = cpu.find_peak_coords(input.view(), 0.4, false).unwrap();
    let got = gpu.find_peak_coords(input.view(), 0.4, true).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(got, expected);
    assert_eq!(gpu.pooled().as_slice(), cpu.pooled().as_slice());

    // Device stays idle unless requested.
    gpu.find_peak_coords(input.view(), 0.4, false).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn device_failure_is_reported_by_default() {
    let dims = Dims3::new(2, 5, 5);
    let mut finder = PeakFinder::new(dims, config(DeviceFallback::Fail))
        .unwrap()
        .with_device(Box::new(BrokenDevice { dims }))
        .unwrap();
    let err = finder
        .find_peak_coords(heatmap(dims).view(), 0.1, true)
        .unwrap_err();
    assert_eq!(
        err,
        PosePeakError::Device(DeviceError::Kernel("launch failed".to_string()))
    );
}

#[test]
fn device_failure_falls_back_to_cpu_when_configured() {
    let dims = Dims3::new(3, 9, 7);
    let input = heatmap(dims);
    let mut reference = PeakFinder::new(dims, config(DeviceFallback::Fail)).unwrap();
    let expected = reference.find_peak_coords(input.view(), 0.3, false).unwrap();

    let mut finder = PeakFinder::new(dims, config(DeviceFallback::Cpu))
        .unwrap()
        .with_device(Box::new(BrokenDevice { dims }))
        .unwrap();
    let got = finder.find_peak_coords(input.view(), 0.3, true).unwrap();
    assert_eq!(got, expected);
}

#[test]
fn missing_device_is_unavailable() {
    let dims = Dims3::new(1, 4, 4);
    let input = heatmap(dims);

    let mut strict = PeakFinder::new(dims, config(DeviceFallback::Fail)).unwrap();
    let err = strict.find_peak_coords(input.view(), 0.1, true).unwrap_err();
    assert!(matches!(
        err,
        PosePeakError::Device(DeviceError::Unavailable(_))
    ));

    let mut lenient = PeakFinder::new(dims, config(DeviceFallback::Cpu)).unwrap();
    assert!(lenient.find_peak_coords(input.view(), 0.1, true).is_ok());
}

#[test]
fn device_shape_must_match_finder() {
    let finder = PeakFinder::new(Dims3::new(2, 8, 8), config(DeviceFallback::Fail)).unwrap();
    let device = BrokenDevice {
        dims: Dims3::new(2, 8, 9),
    };
    let err = finder.with_device(Box::new(device)).err().unwrap();
    assert_eq!(
        err,
        PosePeakError::ShapeMismatch {
            expected: Dims3::new(2, 8, 8),
            got: Dims3::new(2, 8, 9),
        }
    );
}
