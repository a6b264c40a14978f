use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::EngineError;

/// Explicit config path; must exist when set.
pub const CONFIG_ENV: &str = "FANSTREAM_CONFIG";
/// Overrides `endpoint.base_url` after the file (or defaults) are loaded.
pub const URL_ENV: &str = "FANSTREAM_URL";
/// File stem searched for upward from the working directory.
pub const CONFIG_STEM: &str = "fanstream";

/// How strictly to interpret `fanstream.json`.
///
/// - `Lenient` is forward-compatible: unknown fields are ignored and missing keys
///   fall back to defaults.
/// - `Strict` is fail-fast: unknown fields and an unsupported `version` become errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

/// Where the upload goes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndpointCfg {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_upload_path")]
    pub path: String,

    /// Multipart field the device reads the image from.
    #[serde(default = "default_field_name")]
    pub field_name: String,

    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Whole-request timeout. Without it a hung device would block the loop forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl EndpointCfg {
    /// `base_url` + `path`, tolerant of a trailing or missing slash.
    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.path.is_empty() {
            base.to_string()
        } else if self.path.starts_with('/') {
            format!("{base}{}", self.path)
        } else {
            format!("{base}/{}", self.path)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for EndpointCfg {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_upload_path(),
            field_name: default_field_name(),
            file_name: default_file_name(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Fixed scene and raster settings. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderCfg {
    /// Logical figure edge in inches; the raster is `figure_size_in * dpi` pixels square.
    #[serde(default = "default_figure_size_in")]
    pub figure_size_in: f64,

    #[serde(default = "default_dpi")]
    pub dpi: u32,

    #[serde(default = "default_elevation_deg")]
    pub elevation_deg: f64,

    /// Points sampled along the helix.
    #[serde(default = "default_samples")]
    pub samples: usize,

    /// Symmetric limit applied to all three axes.
    #[serde(default = "default_axis_limit")]
    pub axis_limit: f64,

    #[serde(default = "default_curve_color")]
    pub curve_color: [u8; 3],

    #[serde(default = "default_background")]
    pub background: [u8; 3],

    #[serde(default = "default_line_width")]
    pub line_width: u32,

    /// Outline the axis-limit cube so the rotation reads on the device.
    #[serde(default = "default_true")]
    pub draw_box: bool,
}

impl RenderCfg {
    /// Raster dimensions in pixels (never zero).
    pub fn pixel_size(&self) -> (u32, u32) {
        let side = (self.figure_size_in * self.dpi as f64).round();
        let side = if side.is_finite() && side >= 1.0 { side as u32 } else { 1 };
        (side, side)
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            figure_size_in: default_figure_size_in(),
            dpi: default_dpi(),
            elevation_deg: default_elevation_deg(),
            samples: default_samples(),
            axis_limit: default_axis_limit(),
            curve_color: default_curve_color(),
            background: default_background(),
            line_width: default_line_width(),
            draw_box: default_true(),
        }
    }
}

/// Loop pacing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnimationCfg {
    /// Azimuth advance per frame, in degrees.
    #[serde(default = "default_step_deg")]
    pub step_deg: f64,

    /// Fixed sleep after each frame. Time spent rendering/uploading is not subtracted.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Emit a stats event every N frames (0 disables).
    #[serde(default = "default_stats_every")]
    pub stats_every: u64,
}

impl AnimationCfg {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for AnimationCfg {
    fn default() -> Self {
        Self {
            step_deg: default_step_deg(),
            frame_interval_ms: default_frame_interval_ms(),
            stats_every: default_stats_every(),
        }
    }
}

/// Typed view of `fanstream.json`.
///
/// Versioning: `version` defaults to 1 when omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub endpoint: EndpointCfg,

    #[serde(default)]
    pub render: RenderCfg,

    #[serde(default)]
    pub animation: AnimationCfg,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            endpoint: EndpointCfg::default(),
            render: RenderCfg::default(),
            animation: AnimationCfg::default(),
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_upload_path() -> String {
    "/upload_frame".to_string()
}
fn default_field_name() -> String {
    "frame".to_string()
}
fn default_file_name() -> String {
    "frame.png".to_string()
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_connect_timeout_ms() -> u64 {
    2_000
}
fn default_figure_size_in() -> f64 {
    5.0
}
fn default_dpi() -> u32 {
    100
}
fn default_elevation_deg() -> f64 {
    20.0
}
fn default_samples() -> usize {
    100
}
fn default_axis_limit() -> f64 {
    1.0
}
fn default_curve_color() -> [u8; 3] {
    [0, 0, 255]
}
fn default_background() -> [u8; 3] {
    [255, 255, 255]
}
fn default_line_width() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_step_deg() -> f64 {
    5.0
}
fn default_frame_interval_ms() -> u64 {
    33
}
fn default_stats_every() -> u64 {
    30
}

const TOP_LEVEL_KEYS: &[&str] = &["version", "endpoint", "render", "animation"];
const ENDPOINT_KEYS: &[&str] = &[
    "base_url",
    "path",
    "field_name",
    "file_name",
    "timeout_ms",
    "connect_timeout_ms",
];
const RENDER_KEYS: &[&str] = &[
    "figure_size_in",
    "dpi",
    "elevation_deg",
    "samples",
    "axis_limit",
    "curve_color",
    "background",
    "line_width",
    "draw_box",
];
const ANIMATION_KEYS: &[&str] = &["step_deg", "frame_interval_ms", "stats_every"];

/// Dotted paths of keys in `value` that the schema does not know.
pub fn unknown_keys(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let Some(top) = value.as_object() else {
        return out;
    };
    for (k, v) in top {
        if !TOP_LEVEL_KEYS.contains(&k.as_str()) {
            out.push(k.clone());
            continue;
        }
        let known = match k.as_str() {
            "endpoint" => ENDPOINT_KEYS,
            "render" => RENDER_KEYS,
            "animation" => ANIMATION_KEYS,
            _ => continue,
        };
        if let Some(section) = v.as_object() {
            for sk in section.keys() {
                if !known.contains(&sk.as_str()) {
                    out.push(format!("{k}.{sk}"));
                }
            }
        }
    }
    out
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

/// A resolved configuration plus the raw JSON it was parsed from (if any), so callers
/// can run their own validation over the untyped document.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub source: ConfigSource,
    pub config: StreamConfig,
    pub value: Option<Value>,
}

/// Choose OS-specific JSON config if present, otherwise fall back to `<stem>.json`.
///
/// Example: `fanstream.linux.json` overrides `fanstream.json` on Linux.
pub fn pick_platform_json(dir: &Path, stem: &str) -> PathBuf {
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "other"
    };

    let platform = dir.join(format!("{stem}.{os}.json"));
    if platform.exists() {
        platform
    } else {
        dir.join(format!("{stem}.json"))
    }
}

/// Locate the config file.
///
/// Resolution order:
/// 1) `FANSTREAM_CONFIG` env var (if set; error if the file is missing)
/// 2) Search upward from `start_dir` for `fanstream(.<os>).json`
///
/// `Ok(None)` means no file anywhere: run on built-in defaults.
pub fn discover_config_path(start_dir: &Path) -> Result<Option<PathBuf>, EngineError> {
    let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    discover_config_path_with(start_dir, explicit)
}

pub fn discover_config_path_with(
    start_dir: &Path,
    explicit: Option<PathBuf>,
) -> Result<Option<PathBuf>, EngineError> {
    if let Some(p) = explicit {
        if p.exists() {
            return Ok(Some(p));
        }
        return Err(EngineError::ConfigNotFound { path: p });
    }

    let mut cur = start_dir.to_path_buf();
    loop {
        let cand = pick_platform_json(&cur, CONFIG_STEM);
        if cand.exists() {
            return Ok(Some(cand));
        }
        if !cur.pop() {
            break;
        }
    }
    Ok(None)
}

/// Read, parse and (in strict mode) check one config file.
pub fn load_config_file(path: &Path, mode: ConfigMode) -> Result<LoadedConfig, EngineError> {
    let src = std::fs::read_to_string(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let value: Value = serde_json::from_str(&src).map_err(|e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    if !value.is_object() {
        return Err(EngineError::InvalidConfig {
            path: path.to_path_buf(),
            msg: "fanstream.json must be a JSON object".to_string(),
        });
    }

    if mode == ConfigMode::Strict {
        let unknown = unknown_keys(&value);
        if !unknown.is_empty() {
            return Err(EngineError::InvalidConfig {
                path: path.to_path_buf(),
                msg: format!("unknown fields: {}", unknown.join(", ")),
            });
        }
    }

    let config: StreamConfig =
        serde_json::from_value(value.clone()).map_err(|e| EngineError::JsonValue {
            path: path.to_path_buf(),
            source: e,
        })?;

    if mode == ConfigMode::Strict && config.version != 1 {
        return Err(EngineError::InvalidConfig {
            path: path.to_path_buf(),
            msg: format!("unsupported fanstream.json version {} (expected 1)", config.version),
        });
    }

    Ok(LoadedConfig {
        source: ConfigSource::File(path.to_path_buf()),
        config,
        value: Some(value),
    })
}

/// Primary entry point: discover, load, then apply `FANSTREAM_URL`.
pub fn load_stream_config_from(start_dir: &Path, mode: ConfigMode) -> Result<LoadedConfig, EngineError> {
    let mut loaded = match discover_config_path(start_dir)? {
        Some(path) => load_config_file(&path, mode)?,
        None => LoadedConfig {
            source: ConfigSource::Defaults,
            config: StreamConfig::default(),
            value: None,
        },
    };
    apply_url_override(&mut loaded.config, std::env::var(URL_ENV).ok());
    Ok(loaded)
}

/// Replace the endpoint base URL when an override is present and non-blank.
pub fn apply_url_override(config: &mut StreamConfig, url: Option<String>) {
    if let Some(url) = url {
        let url = url.trim();
        if !url.is_empty() {
            config.endpoint.base_url = url.to_string();
        }
    }
}
