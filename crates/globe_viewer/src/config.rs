use crate::fallback::FallbackPolicy;
use clap::{ArgAction, Parser};
use std::{path::PathBuf, time::Duration};

/// `globe_viewer` - a procedurally textured, rotating earth with data overlays.
///
/// Every option can also be set through the environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Strength of the atmospheric rim glow.
    #[arg(long, env = "GLOBE_ATMOSPHERE_DENSITY", default_value_t = 1.5)]
    pub atmosphere_density: f32,

    /// Vertex displacement applied along the normal from the normal map's tint.
    #[arg(long, env = "GLOBE_ELEVATION_SCALE", default_value_t = 0.02)]
    pub elevation_scale: f32,

    /// Multiplier on normal-map detail and specular sharpness.
    #[arg(long, env = "GLOBE_DETAIL_LEVEL", default_value_t = 1.5)]
    pub detail_level: f32,

    /// Globe spin in radians per frame.
    #[arg(long, env = "GLOBE_ROTATION_SPEED", default_value_t = 0.003)]
    pub rotation_speed: f32,

    /// Scale the spin by measured frame time (60 Hz reference) instead of a fixed step.
    #[arg(long, env = "GLOBE_SCALE_ROTATION_BY_DT", default_value_t = false, action = ArgAction::Set)]
    pub scale_rotation_by_dt: bool,

    /// Run raw data points through outlier clamping, clustering and decimation.
    #[arg(long, env = "GLOBE_PREPROCESS", default_value_t = true, action = ArgAction::Set)]
    pub preprocess: bool,

    /// Try the GPU renderer before the software fallback.
    #[arg(long, env = "GLOBE_GPU", default_value_t = true, action = ArgAction::Set)]
    pub gpu: bool,

    /// Draw vegetation/building/landmark marker layers.
    #[arg(long, env = "GLOBE_INSTANCING", default_value_t = true, action = ArgAction::Set)]
    pub instancing: bool,

    /// Fetch map features and weather from the configured endpoints.
    #[arg(long, env = "GLOBE_EXTERNAL_DATA", default_value_t = false, action = ArgAction::Set)]
    pub external_data: bool,

    /// How long the GPU path may wait for its diffuse map before falling back.
    #[arg(long, env = "GLOBE_TEXTURE_TIMEOUT_MS", default_value_t = 3000)]
    pub texture_timeout_ms: u64,

    /// Allow leaving the software fallback for the GPU path later in the session.
    #[arg(long, env = "GLOBE_ALLOW_GPU_RETRY", default_value_t = false, action = ArgAction::Set)]
    pub allow_gpu_retry: bool,

    /// Seed for textures, stars and marker jitter. Defaults to the clock.
    #[arg(long, env = "GLOBE_SEED")]
    pub seed: Option<u64>,

    #[arg(long, env = "GLOBE_STACKS", default_value_t = 100)]
    pub stacks: u32,

    #[arg(long, env = "GLOBE_SLICES", default_value_t = 100)]
    pub slices: u32,

    #[arg(long, env = "GLOBE_OVERPASS_URL", default_value = "https://overpass-api.de/api/interpreter")]
    pub overpass_url: String,

    #[arg(long, env = "GLOBE_WEATHER_URL", default_value = "https://api.openweathermap.org/data/2.5/weather")]
    pub weather_url: String,

    /// OpenWeatherMap key; weather is skipped without one.
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub weather_api_key: Option<String>,

    #[arg(long, env = "GLOBE_FETCH_TIMEOUT_MS", default_value_t = 10_000)]
    pub fetch_timeout_ms: u64,

    /// Where the software renderer writes its frame when no GPU adapter exists.
    #[arg(long, env = "GLOBE_HEADLESS_OUT", default_value = "globe.png")]
    pub headless_out: PathBuf,

    #[arg(long, env = "GLOBE_WIDTH", default_value_t = 1280)]
    pub width: u32,

    #[arg(long, env = "GLOBE_HEIGHT", default_value_t = 720)]
    pub height: u32,
}

/// Shader and animation knobs handed to both renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTunables {
    pub atmosphere_density: f32,
    pub elevation_scale: f32,
    pub detail_level: f32,
    pub rotation_speed: f32,
    pub scale_rotation_by_dt: bool,
}

impl Default for RenderTunables {
    fn default() -> Self {
        Self {
            atmosphere_density: 1.5,
            elevation_scale: 0.02,
            detail_level: 1.5,
            rotation_speed: 0.003,
            scale_rotation_by_dt: false,
        }
    }
}

impl Config {
    pub fn tunables(&self) -> RenderTunables {
        RenderTunables {
            atmosphere_density: self.atmosphere_density,
            elevation_scale: self.elevation_scale,
            detail_level: self.detail_level,
            rotation_speed: self.rotation_speed,
            scale_rotation_by_dt: self.scale_rotation_by_dt,
        }
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        FallbackPolicy {
            gpu_enabled: self.gpu,
            texture_timeout: Duration::from_millis(self.texture_timeout_ms),
            allow_gpu_retry: self.allow_gpu_retry,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// The configured seed, or one taken from the clock.
    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(globe_core::clock_seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_embedding_tunables() {
        let cfg = Config::try_parse_from(["globe_viewer"]).unwrap();
        assert_eq!(cfg.tunables(), RenderTunables::default());
        assert!(cfg.preprocess && cfg.gpu && cfg.instancing);
        assert!(!cfg.external_data);

        let policy = cfg.fallback_policy();
        assert_eq!(policy.texture_timeout, Duration::from_secs(3));
        assert!(!policy.allow_gpu_retry);
    }

    #[test]
    fn toggles_accept_explicit_values() {
        let cfg = Config::try_parse_from([
            "globe_viewer",
            "--gpu",
            "false",
            "--preprocess",
            "false",
            "--seed",
            "7",
            "--rotation-speed",
            "0.01",
        ])
        .unwrap();
        assert!(!cfg.gpu && !cfg.preprocess);
        assert_eq!(cfg.resolved_seed(), 7);
        assert_eq!(cfg.tunables().rotation_speed, 0.01);
        assert!(!cfg.fallback_policy().gpu_enabled);
    }
}
