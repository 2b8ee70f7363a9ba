// config.rs — 用户选项（JSON / 命令行）合并到默认值之上

use crate::autorotate::parse_speed;
use crate::error::{Result, ViewerError};
use crate::geometry::{clamp, clamp_latitude, FOV_LOWER_BOUND, FOV_UPPER_BOUND};
use serde::Deserialize;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MIN_FOV: f64 = 30.0;
pub const DEFAULT_MAX_FOV: f64 = 90.0;
pub const DEFAULT_TIME_ANIM_MS: u64 = 2000;
pub const DEFAULT_ANIM_SPEED: &str = "2rpm";
/// `DEFAULT_ANIM_SPEED` in radians per second.
pub const DEFAULT_ANIM_SPEED_RAD: f64 = 4.0 * PI / 60.0;

/// Where the panorama bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanoramaSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// `time_anim` accepts a delay in milliseconds or a boolean switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TimeAnim {
    Enabled(bool),
    Millis(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

/// Raw user options. Every field is optional and falls back to its default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerOptions {
    pub panorama: Option<PathBuf>,
    pub use_xmp_data: Option<bool>,
    pub autoload: Option<bool>,
    pub min_fov: Option<f64>,
    pub max_fov: Option<f64>,
    pub default_fov: Option<f64>,
    pub default_long: Option<f64>,
    pub default_lat: Option<f64>,
    pub long_offset: Option<f64>,
    pub lat_offset: Option<f64>,
    pub time_anim: Option<TimeAnim>,
    pub anim_speed: Option<String>,
    pub size: Option<ViewportSize>,
    pub allow_user_interactions: Option<bool>,
    pub allow_scroll_to_zoom: Option<bool>,
    pub navbar: Option<bool>,
    pub caption: Option<String>,
    pub loading_msg: Option<String>,
}

/// Validated settings for one viewer instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfiguration {
    pub panorama: Option<PanoramaSource>,
    pub use_xmp_data: bool,
    pub autoload: bool,
    /// Degrees, `1 ≤ min_fov ≤ max_fov ≤ 179`.
    pub min_fov: f64,
    pub max_fov: f64,
    pub default_fov: f64,
    pub default_long: f64,
    pub default_lat: f64,
    /// Radians per pixel of drag.
    pub long_offset: f64,
    pub lat_offset: f64,
    /// `None` disables autorotation after load.
    pub time_anim: Option<Duration>,
    /// Radians per second.
    pub anim_speed: f64,
    pub size: Option<ViewportSize>,
    pub allow_user_interactions: bool,
    pub allow_scroll_to_zoom: bool,
    pub navbar: bool,
    pub caption: Option<String>,
    pub loading_msg: Option<String>,
}

impl Default for ViewerConfiguration {
    fn default() -> Self {
        Self::merge(ViewerOptions::default(), DEFAULT_ANIM_SPEED_RAD)
    }
}

impl ViewerConfiguration {
    /// Rejects an unknown `anim_speed` unit; out-of-range values are clamped.
    pub fn from_options(opts: ViewerOptions) -> Result<Self> {
        let anim_speed = match opts.anim_speed.as_deref() {
            Some(speed) => parse_speed(speed)?,
            None => DEFAULT_ANIM_SPEED_RAD,
        };
        Ok(Self::merge(opts, anim_speed))
    }

    fn merge(opts: ViewerOptions, anim_speed: f64) -> Self {
        let mut min_fov = clamp(opts.min_fov.unwrap_or(DEFAULT_MIN_FOV), FOV_LOWER_BOUND, FOV_UPPER_BOUND);
        let mut max_fov = clamp(opts.max_fov.unwrap_or(DEFAULT_MAX_FOV), FOV_LOWER_BOUND, FOV_UPPER_BOUND);
        if min_fov > max_fov {
            log::warn!("min_fov {} > max_fov {}, swapping", min_fov, max_fov);
            std::mem::swap(&mut min_fov, &mut max_fov);
        }
        let default_fov = clamp(opts.default_fov.unwrap_or(max_fov), min_fov, max_fov);

        let time_anim = match opts.time_anim {
            None | Some(TimeAnim::Enabled(true)) => Some(Duration::from_millis(DEFAULT_TIME_ANIM_MS)),
            Some(TimeAnim::Enabled(false)) => None,
            Some(TimeAnim::Millis(ms)) => Some(Duration::from_millis(ms)),
        };

        Self {
            panorama: opts.panorama.map(PanoramaSource::Path),
            use_xmp_data: opts.use_xmp_data.unwrap_or(true),
            autoload: opts.autoload.unwrap_or(true),
            min_fov,
            max_fov,
            default_fov,
            default_long: opts.default_long.unwrap_or(0.0),
            default_lat: clamp_latitude(opts.default_lat.unwrap_or(0.0)),
            long_offset: opts.long_offset.unwrap_or(PI / 720.0),
            lat_offset: opts.lat_offset.unwrap_or(PI / 360.0),
            time_anim,
            anim_speed,
            size: opts.size,
            allow_user_interactions: opts.allow_user_interactions.unwrap_or(true),
            allow_scroll_to_zoom: opts.allow_scroll_to_zoom.unwrap_or(true),
            navbar: opts.navbar.unwrap_or(true),
            caption: opts.caption,
            loading_msg: opts.loading_msg,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let opts: ViewerOptions = serde_json::from_str(text).map_err(|e| ViewerError::Config(e.to_string()))?;
        Self::from_options(opts)
    }

    pub fn load_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_panorama(mut self, source: PanoramaSource) -> Self {
        self.panorama = Some(source);
        self
    }
}

/// Command-line overrides: `[--config file.json] [--lang code] [panorama]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub lang: Option<String>,
    pub panorama: Option<PathBuf>,
}

impl CliArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut out = CliArgs::default();
        let mut it = args.into_iter().skip(1);
        while let Some(a) = it.next() {
            match a.as_str() {
                "--config" => out.config = it.next().map(PathBuf::from),
                "--lang" => out.lang = it.next(),
                _ if a.starts_with("--") => log::warn!("ignoring unknown option {}", a),
                _ => out.panorama = Some(PathBuf::from(a)),
            }
        }
        out
    }

    /// Reads the config file (if any) and applies the positional panorama.
    pub fn to_configuration(&self) -> Result<ViewerConfiguration> {
        let config = match &self.config {
            Some(path) => ViewerConfiguration::load_json_file(path)?,
            None => ViewerConfiguration::default(),
        };
        Ok(match &self.panorama {
            Some(p) => config.with_panorama(PanoramaSource::Path(p.clone())),
            None => config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ViewerConfiguration::default();
        assert_eq!((c.min_fov, c.max_fov, c.default_fov), (30.0, 90.0, 90.0));
        assert_eq!(c.time_anim, Some(Duration::from_millis(2000)));
        assert!((c.anim_speed - 4.0 * PI / 60.0).abs() < 1e-12);
        assert!((parse_speed(DEFAULT_ANIM_SPEED).unwrap() - DEFAULT_ANIM_SPEED_RAD).abs() < 1e-12);
        assert!((c.long_offset - PI / 720.0).abs() < 1e-12);
        assert!(c.use_xmp_data && c.autoload && c.allow_user_interactions);
        assert!(c.panorama.is_none());
    }

    #[test]
    fn fov_range_is_clamped_and_ordered() {
        let c = ViewerConfiguration::from_json_str(r#"{"min_fov": 200, "max_fov": -5}"#).unwrap();
        assert_eq!((c.min_fov, c.max_fov), (1.0, 179.0));

        let c = ViewerConfiguration::from_json_str(r#"{"min_fov": 80, "max_fov": 40, "default_fov": 10}"#).unwrap();
        assert_eq!((c.min_fov, c.max_fov, c.default_fov), (40.0, 80.0, 40.0));
    }

    #[test]
    fn default_lat_is_clamped() {
        let c = ViewerConfiguration::from_json_str(r#"{"default_lat": 3.0, "default_long": 12.5}"#).unwrap();
        assert_eq!(c.default_lat, std::f64::consts::FRAC_PI_2);
        assert_eq!(c.default_long, 12.5);
    }

    #[test]
    fn time_anim_accepts_false_and_millis() {
        let off = ViewerConfiguration::from_json_str(r#"{"time_anim": false}"#).unwrap();
        assert_eq!(off.time_anim, None);
        let on = ViewerConfiguration::from_json_str(r#"{"time_anim": true}"#).unwrap();
        assert_eq!(on.time_anim, Some(Duration::from_millis(2000)));
        let ms = ViewerConfiguration::from_json_str(r#"{"time_anim": 500}"#).unwrap();
        assert_eq!(ms.time_anim, Some(Duration::from_millis(500)));
    }

    #[test]
    fn bad_speed_unit_is_rejected_at_setup() {
        let err = ViewerConfiguration::from_json_str(r#"{"anim_speed": "3 parsecs"}"#).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidSpeedUnit(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            ViewerConfiguration::from_json_str(r#"{"min_fov": "wide"}"#),
            Err(ViewerError::Config(_))
        ));
        assert!(matches!(
            ViewerConfiguration::from_json_str(r#"{"zoom_speed": 1}"#),
            Err(ViewerError::Config(_))
        ));
    }

    #[test]
    fn fixed_size_is_kept() {
        let c = ViewerConfiguration::from_json_str(r#"{"size": {"width": 800, "height": 400}}"#).unwrap();
        assert_eq!(c.size, Some(ViewportSize { width: 800, height: 400 }));
    }

    #[test]
    fn cli_args_collect_overrides() {
        let args = ["bin", "--lang", "en", "pano.jpg", "--config", "opts.json", "--bogus"]
            .iter()
            .map(|s| s.to_string());
        let cli = CliArgs::parse(args);
        assert_eq!(cli.lang.as_deref(), Some("en"));
        assert_eq!(cli.config, Some(PathBuf::from("opts.json")));
        assert_eq!(cli.panorama, Some(PathBuf::from("pano.jpg")));
    }

    #[test]
    fn positional_panorama_overrides_config() {
        let cli = CliArgs {
            panorama: Some(PathBuf::from("a.jpg")),
            ..Default::default()
        };
        let c = cli.to_configuration().unwrap();
        assert_eq!(c.panorama, Some(PanoramaSource::Path(PathBuf::from("a.jpg"))));
    }
}
