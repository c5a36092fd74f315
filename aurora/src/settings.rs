use crate::color::Rgb;
use crate::surface::{Scaling, DEFAULT_MAX_PIXEL_RATIO, DEFAULT_RENDER_SCALE};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLOR_PRIMARY: &str = "#00d4ff";
pub const DEFAULT_COLOR_SECONDARY: &str = "#8b5cf6";
pub const DEFAULT_COLOR_BACKGROUND: &str = "#0c1218";
pub const DEFAULT_SPEED: f32 = 0.3;
pub const DEFAULT_INTENSITY: f32 = 1.0;

/// Configuration as supplied by the surrounding UI.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub color_primary: String,
    pub color_secondary: String,
    pub color_background: String,
    pub speed: f32,
    pub intensity: f32,
    pub render_scale: f64,
    pub max_pixel_ratio: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color_primary: DEFAULT_COLOR_PRIMARY.to_string(),
            color_secondary: DEFAULT_COLOR_SECONDARY.to_string(),
            color_background: DEFAULT_COLOR_BACKGROUND.to_string(),
            speed: DEFAULT_SPEED,
            intensity: DEFAULT_INTENSITY,
            render_scale: DEFAULT_RENDER_SCALE,
            max_pixel_ratio: DEFAULT_MAX_PIXEL_RATIO,
        }
    }
}

impl Settings {
    pub fn scaling(&self) -> Scaling {
        Scaling {
            render_scale: self.render_scale,
            max_pixel_ratio: self.max_pixel_ratio,
        }
    }
}

/// The values submitted to the fragment program every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderConfig {
    pub color_primary: Rgb,
    pub color_secondary: Rgb,
    pub color_background: Rgb,
    pub speed: f32,
    pub intensity: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for RenderConfig {
    fn from(settings: &Settings) -> Self {
        let speed = if settings.speed.is_finite() && settings.speed > 0.0 {
            settings.speed
        } else {
            log::warn!(
                "Speed must be a positive number, got {}. Using {}",
                settings.speed,
                DEFAULT_SPEED
            );
            DEFAULT_SPEED
        };

        let intensity = if settings.intensity.is_finite() && settings.intensity >= 0.0 {
            settings.intensity
        } else {
            log::warn!(
                "Intensity must be zero or more, got {}. Using 0",
                settings.intensity
            );
            0.0
        };

        Self {
            color_primary: Rgb::from_hex_or_black(&settings.color_primary),
            color_secondary: Rgb::from_hex_or_black(&settings.color_secondary),
            color_background: Rgb::from_hex_or_black(&settings.color_background),
            speed,
            intensity,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fills_missing_fields_with_defaults() {
        let settings: Settings =
            serde_json::from_str(r##"{ "colorPrimary": "#ff0000", "intensity": 3.5 }"##).unwrap();

        assert_eq!(settings.color_primary, "#ff0000");
        assert_eq!(settings.color_secondary, DEFAULT_COLOR_SECONDARY);
        assert_eq!(settings.color_background, DEFAULT_COLOR_BACKGROUND);
        assert_relative_eq!(settings.speed, DEFAULT_SPEED);
        assert_relative_eq!(settings.intensity, 3.5);
        assert_eq!(settings.scaling(), Scaling::default());
    }

    #[test]
    fn uses_camel_case_keys() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        for key in [
            "colorPrimary",
            "colorSecondary",
            "colorBackground",
            "speed",
            "intensity",
            "renderScale",
            "maxPixelRatio",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn parses_colors_into_the_render_config() {
        let config = RenderConfig::from(&Settings {
            color_secondary: "violet".to_string(),
            speed: 0.4,
            intensity: 1.1,
            ..Default::default()
        });

        assert_eq!(config.color_primary, Rgb::from_hex("#00d4ff").unwrap());
        assert_eq!(config.color_secondary, Rgb::BLACK);
        assert_eq!(config.color_background, Rgb::from_hex("#0c1218").unwrap());
        assert_relative_eq!(config.speed, 0.4);
        assert_relative_eq!(config.intensity, 1.1);
    }

    #[test]
    fn sanitizes_out_of_range_scalars() {
        let config = RenderConfig::from(&Settings {
            speed: 0.0,
            intensity: -2.0,
            ..Default::default()
        });
        assert_relative_eq!(config.speed, DEFAULT_SPEED);
        assert_relative_eq!(config.intensity, 0.0);

        let config = RenderConfig::from(&Settings {
            speed: f32::NAN,
            intensity: f32::INFINITY,
            ..Default::default()
        });
        assert_relative_eq!(config.speed, DEFAULT_SPEED);
        assert_relative_eq!(config.intensity, 0.0);
    }
}
