use clap::Parser;
use posepeak::{DeviceFallback, Dims3, Executor, FinderConfig, Peak, PeakFinder, TensorView};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Heatmap peak finder (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BackendConfig {
    Sequential,
    Scoped,
    Rayon,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FallbackConfig {
    Fail,
    Cpu,
}

impl From<FallbackConfig> for DeviceFallback {
    fn from(value: FallbackConfig) -> Self {
        match value {
            FallbackConfig::Fail => DeviceFallback::Fail,
            FallbackConfig::Cpu => DeviceFallback::Cpu,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FinderConfigJson {
    ksize: usize,
    parallel_scan: bool,
    backend: BackendConfig,
    /// Scoped backend thread count; 0 uses every available core.
    workers: usize,
    device_fallback: FallbackConfig,
}

impl Default for FinderConfigJson {
    fn default() -> Self {
        let cfg = FinderConfig::default();
        Self {
            ksize: cfg.ksize,
            parallel_scan: cfg.parallel_scan,
            backend: BackendConfig::Rayon,
            workers: 0,
            device_fallback: FallbackConfig::Fail,
        }
    }
}

impl From<FinderConfigJson> for FinderConfig {
    fn from(value: FinderConfigJson) -> Self {
        let executor = match value.backend {
            BackendConfig::Sequential => Executor::Sequential,
            BackendConfig::Scoped => Executor::scoped(value.workers),
            BackendConfig::Rayon => Executor::Rayon,
        };
        FinderConfig {
            ksize: value.ksize,
            parallel_scan: value.parallel_scan,
            executor,
            device_fallback: value.device_fallback.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    heatmap_path: String,
    channels: usize,
    height: usize,
    width: usize,
    threshold: f32,
    use_gpu: bool,
    output_path: Option<String>,
    finder: FinderConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heatmap_path: String::new(),
            channels: 0,
            height: 0,
            width: 0,
            threshold: 0.05,
            use_gpu: false,
            output_path: None,
            finder: FinderConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PeakRecord {
    id: usize,
    part_id: usize,
    x: i32,
    y: i32,
    score: f32,
}

impl From<Peak> for PeakRecord {
    fn from(value: Peak) -> Self {
        Self {
            id: value.id,
            part_id: value.part_id,
            x: value.pos.x,
            y: value.pos.y,
            score: value.score,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    backend: &'static str,
    peaks: Vec<PeakRecord>,
    groups: Vec<Vec<usize>>,
}

/// Decodes a raw little-endian `f32` buffer.
fn decode_f32_le(bytes: &[u8]) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    if bytes.len() % 4 != 0 {
        return Err(format!("heatmap file size {} is not a multiple of 4", bytes.len()).into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(feature = "gpu")]
fn attach_device(
    finder: PeakFinder,
    dims: Dims3,
) -> Result<PeakFinder, Box<dyn std::error::Error>> {
    match posepeak::WgpuMaxPool::new(dims) {
        Ok(device) => Ok(finder.with_device(Box::new(device))?),
        Err(err) => {
            tracing::warn!("GPU pooling unavailable: {err}");
            Ok(finder)
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn attach_device(
    finder: PeakFinder,
    _dims: Dims3,
) -> Result<PeakFinder, Box<dyn std::error::Error>> {
    tracing::warn!("built without the `gpu` feature; no pooling device attached");
    Ok(finder)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("posepeak=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.heatmap_path.is_empty() {
        return Err("heatmap_path must be set in the config".into());
    }

    let dims = Dims3::new(config.channels, config.height, config.width);
    let expected = dims.checked_len()?;
    let data = decode_f32_le(&fs::read(&config.heatmap_path)?)?;
    if data.len() != expected {
        return Err(format!(
            "heatmap has {} values, expected {expected} for {dims}",
            data.len()
        )
        .into());
    }

    let finder_config = FinderConfig::from(config.finder);
    let backend = finder_config.executor.name();
    let mut finder = PeakFinder::new(dims, finder_config)?;
    if config.use_gpu {
        finder = attach_device(finder, dims)?;
    }

    let heatmap = TensorView::from_slice(&data, dims)?;
    let peaks = finder.find_peak_coords(heatmap, config.threshold, config.use_gpu)?;
    let groups = finder.group_by(&peaks);
    let output = Output {
        backend,
        peaks: peaks.into_iter().map(PeakRecord::from).collect(),
        groups,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{decode_f32_le, Config};
    use posepeak::{DeviceFallback, Executor, FinderConfig};

    #[test]
    fn example_config_parses() {
        let config: Config = serde_json::from_str(super::EXAMPLE_JSON).unwrap();
        assert_eq!((config.channels, config.height, config.width), (19, 46, 54));
        let finder = FinderConfig::from(config.finder);
        assert_eq!(finder.ksize, 17);
        assert_eq!(finder.executor, Executor::Rayon);
        assert_eq!(finder.device_fallback, DeviceFallback::Cpu);
        assert!(finder.validate().is_ok());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"heatmap_path": "h.f32"}"#).unwrap();
        let finder = FinderConfig::from(config.finder);
        assert_eq!(finder.ksize, FinderConfig::default().ksize);
        assert!(!finder.parallel_scan);
        assert_eq!(finder.device_fallback, DeviceFallback::Fail);
    }

    #[test]
    fn decodes_little_endian_floats() {
        let mut bytes = Vec::new();
        for v in [1.5f32, -2.0, 0.25] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(decode_f32_le(&bytes).unwrap(), vec![1.5, -2.0, 0.25]);
        assert!(decode_f32_le(&bytes[..5]).is_err());
    }
}
