//! Heatmap peak finder with reusable scratch tensors.

use super::{group_by_part, FinderConfig, Peak, COCO_N_PARTS};
use crate::device::{DeviceFallback, MaxPoolDevice};
use crate::ops::{same_max_pool_3x3, smooth};
use crate::parallel::Combinable;
use crate::tensor::{Dims3, Element, Point2, Tensor, TensorView};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{DeviceError, PosePeakError, PosePeakResult};

/// Extracts per-part peaks from heatmaps of one fixed shape.
///
/// The smoothed and pooled tensors are allocated once and overwritten by
/// every [`find_peak_coords`](Self::find_peak_coords) call. Use one finder
/// per concurrent pipeline.
pub struct PeakFinder<T: Element = f32> {
    dims: Dims3,
    config: FinderConfig,
    smoothed: Tensor<T>,
    pooled: Tensor<T>,
    device: Option<Box<dyn MaxPoolDevice<T>>>,
}

impl<T: Element> PeakFinder<T> {
    /// Creates a CPU-only finder for heatmaps of shape `dims`.
    pub fn new(dims: Dims3, config: FinderConfig) -> PosePeakResult<Self> {
        config.validate()?;
        if i32::try_from(dims.height).is_err() || i32::try_from(dims.width).is_err() {
            return Err(PosePeakError::InvalidDimensions {
                channels: dims.channels,
                height: dims.height,
                width: dims.width,
            });
        }
        Ok(Self {
            dims,
            config,
            smoothed: Tensor::zeros(dims)?,
            pooled: Tensor::zeros(dims)?,
            device: None,
        })
    }

    /// Attaches a pooling device built for the same shape.
    pub fn with_device(mut self, device: Box<dyn MaxPoolDevice<T>>) -> PosePeakResult<Self> {
        if device.dims() != self.dims {
            return Err(PosePeakError::ShapeMismatch {
                expected: self.dims,
                got: device.dims(),
            });
        }
        self.device = Some(device);
        Ok(self)
    }

    /// Heatmap shape this finder accepts.
    pub fn dims(&self) -> Dims3 {
        self.dims
    }

    /// Gaussian kernel size used for smoothing.
    pub fn ksize(&self) -> usize {
        self.config.ksize
    }

    /// Configuration the finder was built with.
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Returns true when a pooling device is attached.
    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Smoothed heatmap from the most recent call.
    pub fn smoothed(&self) -> TensorView<'_, T> {
        self.smoothed.view()
    }

    /// Pooled heatmap from the most recent call.
    pub fn pooled(&self) -> TensorView<'_, T> {
        self.pooled.view()
    }

    /// Finds every part-channel cell whose smoothed value exceeds
    /// `threshold` and equals the max of its 3x3 neighbourhood.
    ///
    /// With `use_gpu` the pooling step runs on the attached device; failures
    /// (including a missing device) follow [`FinderConfig::device_fallback`].
    /// Peak ids are `0..n` in result order. Within a channel, peaks are in
    /// row-major order; with `parallel_scan` the order of channels in the
    /// result is unspecified.
    pub fn find_peak_coords(
        &mut self,
        heatmap: TensorView<'_, T>,
        threshold: T,
        use_gpu: bool,
    ) -> PosePeakResult<Vec<Peak<T>>> {
        if heatmap.dims() != self.dims {
            return Err(PosePeakError::ShapeMismatch {
                expected: self.dims,
                got: heatmap.dims(),
            });
        }
        let _span = trace_span!(
            "find_peak_coords",
            channels = self.dims.channels,
            height = self.dims.height,
            width = self.dims.width,
            use_gpu = use_gpu
        )
        .entered();

        smooth(
            heatmap,
            &mut self.smoothed,
            self.config.ksize,
            &self.config.executor,
        )?;
        self.pool(use_gpu)?;

        let peaks = if self.config.parallel_scan {
            self.scan_parallel(heatmap, threshold)
        } else {
            self.scan_sequential(heatmap, threshold)
        };
        trace_event!("peaks_found", count = peaks.len());
        Ok(peaks)
    }

    /// Buckets peak ids by part; see [`group_by_part`].
    pub fn group_by(&self, peaks: &[Peak<T>]) -> Vec<Vec<usize>> {
        group_by_part(peaks)
    }

    fn pool(&mut self, use_gpu: bool) -> PosePeakResult<()> {
        if use_gpu {
            match self.pool_on_device() {
                Ok(()) => return Ok(()),
                Err(err) => match self.config.device_fallback {
                    DeviceFallback::Fail => return Err(err.into()),
                    DeviceFallback::Cpu => {
                        let message = err.to_string();
                        trace_warn!("device_pool_failed", error = message.as_str());
                    }
                },
            }
        }
        same_max_pool_3x3(
            self.smoothed.view(),
            &mut self.pooled,
            &self.config.executor,
        )
    }

    fn pool_on_device(&mut self) -> Result<(), DeviceError> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| DeviceError::Unavailable("no pooling device attached".to_string()))?;
        device.max_pool_3x3(self.smoothed.as_slice(), self.pooled.as_mut_slice())
    }

    fn scan_sequential(&self, heatmap: TensorView<'_, T>, threshold: T) -> Vec<Peak<T>> {
        let _span = trace_span!("find_all_peaks", parallel = false).entered();
        let plane = self.dims.plane_len();
        let mut peaks = Vec::new();
        for k in 0..self.dims.channels.min(COCO_N_PARTS) {
            let range = k * plane..(k + 1) * plane;
            scan_channel(
                k,
                self.dims.width,
                &heatmap.as_slice()[range.clone()],
                &self.smoothed.as_slice()[range.clone()],
                &self.pooled.as_slice()[range],
                threshold,
                &mut peaks,
            );
        }
        peaks
    }

    fn scan_parallel(&self, heatmap: TensorView<'_, T>, threshold: T) -> Vec<Peak<T>> {
        let _span = trace_span!("find_all_peaks", parallel = true).entered();
        let plane = self.dims.plane_len();
        let width = self.dims.width;
        let heat = heatmap.as_slice();
        let smoothed = self.smoothed.as_slice();
        let pooled = self.pooled.as_slice();

        let mut per_thread = Combinable::new(Vec::<Peak<T>>::new);
        self.config
            .executor
            .parallel_for(self.dims.channels.min(COCO_N_PARTS), |k| {
                let range = k * plane..(k + 1) * plane;
                let mut local = per_thread.local();
                scan_channel(
                    k,
                    width,
                    &heat[range.clone()],
                    &smoothed[range.clone()],
                    &pooled[range],
                    threshold,
                    &mut local,
                );
            });

        let mut peaks = Vec::new();
        per_thread.combine_each_mut(|local| {
            peaks.reserve(local.len());
            for mut peak in local.drain(..) {
                peak.id = peaks.len();
                peaks.push(peak);
            }
        });
        peaks
    }
}

/// Appends the peaks of one channel plane to `out`, numbering them from
/// `out.len()`.
fn scan_channel<T: Element>(
    part_id: usize,
    width: usize,
    heat: &[T],
    smoothed: &[T],
    pooled: &[T],
    threshold: T,
    out: &mut Vec<Peak<T>>,
) {
    for (off, (&s, &p)) in smoothed.iter().zip(pooled).enumerate() {
        if s > threshold && s == p {
            out.push(Peak {
                part_id,
                pos: Point2::new((off % width) as i32, (off / width) as i32),
                score: heat[off],
                id: out.len(),
            });
        }
    }
}
