//! Viewer configuration.
//!
//! Every knob has a default that reproduces the stock viewer. An optional
//! `viewer.ron` next to the models overrides any subset of them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    keys::{AbilityKey, AssetKey, ClassKey},
    resources::texture::load_string,
};

pub const CONFIG_FILE: &str = "viewer.ron";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub assets: AssetPaths,
    pub controller: ControllerConfig,
    pub lighting: LightingConfig,
    pub camera: CameraConfig,
    /// Solid backdrop until `setBackground` swaps it.
    pub background_colour: u32,
    /// Largest bounding box dimension of every normalized model.
    pub model_size: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            assets: AssetPaths::default(),
            controller: ControllerConfig::default(),
            lighting: LightingConfig::default(),
            camera: CameraConfig::default(),
            background_colour: 0x1a1a2e,
            model_size: 2.0,
        }
    }
}

impl ViewerConfig {
    /// Parses a configuration. Controller settings that would break the
    /// rotation are replaced by the defaults as a whole.
    pub fn from_ron(text: &str) -> anyhow::Result<Self> {
        let mut config: Self = ron::from_str(text)?;
        if let Err(e) = config.controller.validate() {
            log::warn!("Ignoring controller settings in {}: {}", CONFIG_FILE, e);
            config.controller = ControllerConfig::default();
        }
        Ok(config)
    }

    /// Reads `viewer.ron` from the asset directory and falls back to the
    /// defaults when it is missing or malformed.
    pub async fn load() -> Self {
        let text = match load_string(CONFIG_FILE).await {
            Ok(text) => text,
            Err(e) => {
                log::info!("No {} found ({}), using defaults.", CONFIG_FILE, e);
                return Self::default();
            }
        };
        match Self::from_ron(&text) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring malformed {}: {}", CONFIG_FILE, e);
                Self::default()
            }
        }
    }
}

/// Where each slot is loaded from, relative to the asset directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// Class models live at `<class_dir>/<class>.glb`.
    pub class_dir: String,
    /// Shared model used by every ability without an override.
    pub ability_placeholder: String,
    pub classes: BTreeMap<ClassKey, String>,
    pub abilities: BTreeMap<AbilityKey, String>,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            class_dir: "models".to_string(),
            ability_placeholder: "models/ability_placeholder.glb".to_string(),
            classes: BTreeMap::new(),
            abilities: BTreeMap::new(),
        }
    }
}

impl AssetPaths {
    pub fn path(&self, key: AssetKey) -> String {
        match key {
            AssetKey::Class(class) => self
                .classes
                .get(&class)
                .cloned()
                .unwrap_or_else(|| format!("{}/{}.glb", self.class_dir, class.name())),
            AssetKey::Ability(ability) => self
                .abilities
                .get(&ability)
                .cloned()
                .unwrap_or_else(|| self.ability_placeholder.clone()),
        }
    }
}

/// Feel of the drag/inertia rotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub horizontal_gain: f32,
    pub vertical_gain: f32,
    pub max_tilt: f32,
    pub friction: f32,
    /// Floor an above-cruise spin is clamped to once friction brings it down.
    pub cruise_speed: f32,
    /// Below this a sub-cruise spin stops.
    pub stop_speed: f32,
    /// Fraction of the tilt removed per idle frame.
    pub return_speed: f32,
    /// Fraction of the remaining distance covered per frame.
    pub smoothing: f32,
    pub initial_velocity: f32,
}

impl ControllerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let values = [
            ("horizontal_gain", self.horizontal_gain),
            ("vertical_gain", self.vertical_gain),
            ("max_tilt", self.max_tilt),
            ("friction", self.friction),
            ("cruise_speed", self.cruise_speed),
            ("stop_speed", self.stop_speed),
            ("return_speed", self.return_speed),
            ("smoothing", self.smoothing),
            ("initial_velocity", self.initial_velocity),
        ];
        for (name, value) in values {
            anyhow::ensure!(value.is_finite(), "{} is {}", name, value);
        }
        anyhow::ensure!(self.max_tilt >= 0.0, "max_tilt {} is negative", self.max_tilt);
        anyhow::ensure!(
            self.cruise_speed >= 0.0 && self.stop_speed >= 0.0,
            "cruise_speed {} and stop_speed {} must not be negative",
            self.cruise_speed,
            self.stop_speed
        );
        for (name, value) in [
            ("friction", self.friction),
            ("return_speed", self.return_speed),
            ("smoothing", self.smoothing),
        ] {
            anyhow::ensure!((0.0..=1.0).contains(&value), "{} {} is outside 0..=1", name, value);
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            horizontal_gain: 0.01,
            vertical_gain: 0.005,
            max_tilt: 0.3,
            friction: 0.95,
            cruise_speed: 0.01,
            stop_speed: 0.001,
            return_speed: 0.1,
            smoothing: 0.1,
            initial_velocity: 0.01,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub key_colour: u32,
    pub key_intensity: f32,
    /// Left and right key light positions; both point at the origin.
    pub key_positions: [[f32; 3]; 2],
    pub ambient_colour: u32,
    pub ambient_intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            key_colour: 0xffaa66,
            key_intensity: 0.9,
            key_positions: [[-8.0, 5.0, 4.0], [8.0, 5.0, 4.0]],
            ambient_colour: 0x404040,
            ambient_intensity: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [0.0, 1.0, 12.0],
            target: [0.0, 0.0, 0.0],
            fovy_degrees: 45.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }
}

/// Splits a `0xRRGGBB` colour into linear RGB components.
///
/// Hex colours are authored in sRGB, lights and clear colours are computed
/// in linear space.
pub fn linear_rgb(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_share_placeholder_between_abilities() {
        let paths = AssetPaths::default();
        assert_eq!(
            paths.path(AssetKey::Ability(AbilityKey::Ability1)),
            paths.path(AssetKey::Ability(AbilityKey::Ability5))
        );
        assert_eq!(
            paths.path(AssetKey::Class(ClassKey::Warrior)),
            "models/warrior.glb"
        );
    }

    #[test]
    fn should_keep_defaults_for_omitted_fields() {
        let config = ViewerConfig::from_ron(
            "(model_size: 3.0, controller: (max_tilt: 0.5), assets: (abilities: { ability2: \"models/shield.glb\" }))",
        )
        .unwrap();
        assert_eq!(config.model_size, 3.0);
        assert_eq!(config.controller.max_tilt, 0.5);
        assert_eq!(config.controller.friction, 0.95);
        assert_eq!(config.background_colour, 0x1a1a2e);
        assert_eq!(
            config.assets.path(AssetKey::Ability(AbilityKey::Ability2)),
            "models/shield.glb"
        );
        assert_eq!(
            config.assets.path(AssetKey::Ability(AbilityKey::Ability3)),
            "models/ability_placeholder.glb"
        );
    }

    #[test]
    fn should_replace_broken_controller_settings() {
        let config =
            ViewerConfig::from_ron("(model_size: 3.0, controller: (max_tilt: -0.3))").unwrap();
        assert_eq!(config.controller, ControllerConfig::default());
        assert_eq!(config.model_size, 3.0);

        let config = ViewerConfig::from_ron("(controller: (friction: 1.5))").unwrap();
        assert_eq!(config.controller, ControllerConfig::default());
    }

    #[test]
    fn should_reject_non_finite_controller_settings() {
        let tuning = ControllerConfig {
            max_tilt: f32::NAN,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn should_ship_the_defaults() {
        let shipped = ViewerConfig::from_ron(include_str!("../assets/viewer.ron")).unwrap();
        assert_eq!(shipped, ViewerConfig::default());
    }

    #[test]
    fn should_convert_hex_to_linear() {
        assert_eq!(linear_rgb(0xffffff), [1.0, 1.0, 1.0]);
        assert_eq!(linear_rgb(0x000000), [0.0, 0.0, 0.0]);
        let [r, g, b] = linear_rgb(0x404040);
        assert!(r > 0.05 && r < 0.06);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }
}
