//! Python bindings for the posepeak heatmap peak finder.
//!
//! This module exposes the peak finder and its configuration to Python via
//! PyO3. Heatmaps are passed as contiguous `float32` arrays in CHW layout.

use numpy::{PyReadonlyArray3, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Mutex;

use posepeak::{
    group_by_part, DeviceFallback, Dims3, Executor, FinderConfig as RustFinderConfig,
    Peak as RustPeak, PeakFinder as RustPeakFinder, Point2, PosePeakError, TensorView,
    COCO_N_PARTS,
};

/// Convert a PosePeakError to a Python exception.
fn to_py_err(err: PosePeakError) -> PyErr {
    match err {
        PosePeakError::Device(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn parse_backend(backend: &str, workers: usize) -> PyResult<Executor> {
    match backend.to_lowercase().as_str() {
        "sequential" => Ok(Executor::Sequential),
        "scoped" => Ok(Executor::scoped(workers)),
        "rayon" => Ok(Executor::Rayon),
        _ => Err(PyValueError::new_err(
            "backend must be 'sequential', 'scoped' or 'rayon'",
        )),
    }
}

fn parse_fallback(fallback: &str) -> PyResult<DeviceFallback> {
    match fallback.to_lowercase().as_str() {
        "fail" => Ok(DeviceFallback::Fail),
        "cpu" => Ok(DeviceFallback::Cpu),
        _ => Err(PyValueError::new_err("device_fallback must be 'fail' or 'cpu'")),
    }
}

/// A keypoint candidate: part channel, cell position, raw score and id.
#[pyclass]
#[derive(Clone)]
pub struct Peak {
    /// Body-part channel index.
    #[pyo3(get)]
    pub part_id: usize,
    /// Column of the heatmap cell.
    #[pyo3(get)]
    pub x: i32,
    /// Row of the heatmap cell.
    #[pyo3(get)]
    pub y: i32,
    /// Unsmoothed heatmap value.
    #[pyo3(get)]
    pub score: f32,
    /// Index of this peak in the result list.
    #[pyo3(get)]
    pub id: usize,
}

#[pymethods]
impl Peak {
    fn __repr__(&self) -> String {
        format!(
            "Peak(id={}, part_id={}, x={}, y={}, score={:.4})",
            self.id, self.part_id, self.x, self.y, self.score
        )
    }
}

impl From<RustPeak> for Peak {
    fn from(p: RustPeak) -> Self {
        Self {
            part_id: p.part_id,
            x: p.pos.x,
            y: p.pos.y,
            score: p.score,
            id: p.id,
        }
    }
}

/// Configuration for the peak finder.
#[pyclass]
#[derive(Clone)]
pub struct FinderConfig {
    inner: RustFinderConfig,
}

#[pymethods]
impl FinderConfig {
    /// Create a new FinderConfig.
    ///
    /// Args:
    ///     ksize: Gaussian kernel size, odd; 0 or 1 disables smoothing (default: 17)
    ///     parallel_scan: Scan channels in parallel (default: False)
    ///     backend: "sequential", "scoped" or "rayon" (default: "rayon")
    ///     workers: Thread count for the scoped backend, 0 = all cores (default: 0)
    ///     device_fallback: "fail" or "cpu" (default: "fail")
    #[new]
    #[pyo3(signature = (
        ksize = 17,
        parallel_scan = false,
        backend = "rayon",
        workers = 0,
        device_fallback = "fail"
    ))]
    fn new(
        ksize: usize,
        parallel_scan: bool,
        backend: &str,
        workers: usize,
        device_fallback: &str,
    ) -> PyResult<Self> {
        let inner = RustFinderConfig {
            ksize,
            parallel_scan,
            executor: parse_backend(backend, workers)?,
            device_fallback: parse_fallback(device_fallback)?,
        };
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Validate the configuration.
    fn validate(&self) -> PyResult<()> {
        self.inner.validate().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        let fallback = match self.inner.device_fallback {
            DeviceFallback::Fail => "fail",
            DeviceFallback::Cpu => "cpu",
        };
        format!(
            "FinderConfig(ksize={}, parallel_scan={}, backend='{}', device_fallback='{}')",
            self.inner.ksize,
            self.inner.parallel_scan,
            self.inner.executor.name(),
            fallback
        )
    }
}

/// Peak finder for heatmaps of one fixed (channels, height, width) shape.
#[pyclass]
pub struct PeakFinder {
    inner: Mutex<RustPeakFinder>,
    dims: Dims3,
}

impl PeakFinder {
    fn with_inner<R>(
        &self,
        f: impl FnOnce(&mut RustPeakFinder) -> Result<R, PosePeakError>,
    ) -> PyResult<R> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| PyRuntimeError::new_err("PeakFinder poisoned by an earlier panic"))?;
        f(&mut inner).map_err(to_py_err)
    }
}

#[pymethods]
impl PeakFinder {
    /// Create a finder.
    ///
    /// Args:
    ///     channels: Heatmap channel count
    ///     height: Heatmap height
    ///     width: Heatmap width
    ///     config: FinderConfig (default: FinderConfig())
    #[new]
    #[pyo3(signature = (channels, height, width, config = None))]
    fn new(
        channels: usize,
        height: usize,
        width: usize,
        config: Option<FinderConfig>,
    ) -> PyResult<Self> {
        let dims = Dims3::new(channels, height, width);
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        let inner = RustPeakFinder::new(dims, cfg).map_err(to_py_err)?;
        Ok(Self {
            inner: Mutex::new(inner),
            dims,
        })
    }

    /// Find peaks in a heatmap.
    ///
    /// Args:
    ///     heatmap: 3D float32 numpy array (channels x height x width)
    ///     threshold: Minimum smoothed value, exclusive
    ///
    /// Returns:
    ///     List of Peak objects; ids are their list positions
    fn find_peaks(
        &self,
        heatmap: PyReadonlyArray3<'_, f32>,
        threshold: f32,
    ) -> PyResult<Vec<Peak>> {
        let shape = heatmap.shape();
        let dims = Dims3::new(shape[0], shape[1], shape[2]);
        let data = heatmap.as_slice()?;
        let view = TensorView::from_slice(data, dims).map_err(to_py_err)?;
        let peaks = self.with_inner(|finder| finder.find_peak_coords(view, threshold, false))?;
        Ok(peaks.into_iter().map(Peak::from).collect())
    }

    /// Bucket peak ids by body part.
    ///
    /// Returns:
    ///     One list of ids per part, in input order
    fn group_by(&self, peaks: Vec<Peak>) -> PyResult<Vec<Vec<usize>>> {
        let peaks = peaks
            .into_iter()
            .map(|p| {
                if p.part_id >= COCO_N_PARTS {
                    return Err(PyValueError::new_err(format!(
                        "part_id {} out of range",
                        p.part_id
                    )));
                }
                Ok(RustPeak {
                    part_id: p.part_id,
                    pos: Point2::new(p.x, p.y),
                    score: p.score,
                    id: p.id,
                })
            })
            .collect::<PyResult<Vec<_>>>()?;
        Ok(group_by_part(&peaks))
    }

    /// Heatmap shape as (channels, height, width).
    #[getter]
    fn shape(&self) -> (usize, usize, usize) {
        (self.dims.channels, self.dims.height, self.dims.width)
    }

    fn __repr__(&self) -> String {
        format!(
            "PeakFinder({}x{}x{})",
            self.dims.channels, self.dims.height, self.dims.width
        )
    }
}

/// Python module for heatmap peak finding.
#[pymodule]
fn _posepeak(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Peak>()?;
    m.add_class::<FinderConfig>()?;
    m.add_class::<PeakFinder>()?;
    m.add("COCO_N_PARTS", COCO_N_PARTS)?;
    Ok(())
}
