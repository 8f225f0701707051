use anyhow::Context;
use likeness_core::dataset::FailurePolicy;
use likeness_core::detector::DetectorParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// CLI configuration: defaults, then the TOML file named by `LIKENESS_CONFIG`,
/// then `LIKENESS_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SeetaFace frontal cascade model file.
    pub detector_model: PathBuf,
    /// Side length of normalized face crops.
    pub face_size: u32,
    /// LBPH distance at or above which a prediction is rejected.
    pub threshold: f64,
    /// Images per row in a stitched grid.
    pub columns: usize,
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale: f32,
    pub window_step: u32,
    /// Skip undecodable inputs during `prepare` instead of aborting.
    pub skip_unreadable: bool,
    /// TTF/OTF font for annotation text. Defaults to the bundled DejaVu Sans.
    pub font: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let detector = DetectorParams::default();
        Self {
            detector_model: PathBuf::from("models/seeta_fd_frontal_v1.0.bin"),
            face_size: likeness_core::types::DEFAULT_FACE_SIZE,
            threshold: likeness_core::labels::DEFAULT_THRESHOLD,
            columns: likeness_core::grid::DEFAULT_COLUMNS,
            min_face_size: detector.min_face_size,
            score_threshold: detector.score_threshold,
            pyramid_scale: detector.pyramid_scale_factor,
            window_step: detector.window_step,
            skip_unreadable: false,
            font: None,
        }
    }
}

impl Config {
    /// Load configuration from the optional config file and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os("LIKENESS_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Overlay values found through `lookup`. Unparseable values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("LIKENESS_DETECTOR_MODEL") {
            self.detector_model = PathBuf::from(path);
        }
        if let Some(path) = lookup("LIKENESS_FONT") {
            self.font = Some(PathBuf::from(path));
        }
        self.face_size = env_or(&lookup, "LIKENESS_FACE_SIZE", self.face_size);
        self.threshold = env_or(&lookup, "LIKENESS_THRESHOLD", self.threshold);
        self.columns = env_or(&lookup, "LIKENESS_COLUMNS", self.columns);
        self.min_face_size = env_or(&lookup, "LIKENESS_MIN_FACE_SIZE", self.min_face_size);
        self.score_threshold = env_or(&lookup, "LIKENESS_SCORE_THRESHOLD", self.score_threshold);
        self.pyramid_scale = env_or(&lookup, "LIKENESS_PYRAMID_SCALE", self.pyramid_scale);
        self.window_step = env_or(&lookup, "LIKENESS_WINDOW_STEP", self.window_step);
        if let Some(v) = lookup("LIKENESS_SKIP_UNREADABLE") {
            self.skip_unreadable = matches!(v.trim(), "1" | "true" | "yes");
        }
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            min_face_size: self.min_face_size,
            score_threshold: self.score_threshold,
            pyramid_scale_factor: self.pyramid_scale,
            window_step: self.window_step,
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.skip_unreadable {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        }
    }
}

fn env_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, current: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(current)
}
