// SPDX-License-Identifier: Apache-2.0
//! Concrete parameter objects.
//!
//! Field defaults mirror a sensible interactive deployment; every object is
//! replaced whole on remote updates, so partial payloads rely on serde
//! defaults rather than field merging.

use serde::{Deserialize, Serialize};

use crate::ParamObject;

/// Application-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApplicationParams {
    /// Target rate for the rendered-frame broadcast, frames per second.
    /// Zero disables the broadcast.
    pub image_stream_fps: u32,
    /// Encode quality for embedded/broadcast images, 1-100.
    pub image_quality: u8,
    /// Viewport size in pixels.
    pub viewport: [u32; 2],
}

impl Default for ApplicationParams {
    fn default() -> Self {
        Self {
            image_stream_fps: 60,
            image_quality: 90,
            viewport: [800, 600],
        }
    }
}

impl ParamObject for ApplicationParams {
    fn endpoint() -> &'static str {
        "application-parameters"
    }
}

/// Animation playback state for time-varying simulation data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnimationParams {
    /// Currently requested simulation frame.
    pub frame: u32,
    /// Frame increment applied per render loop tick while playing.
    pub delta: i32,
    /// Whether playback advances automatically.
    pub playing: bool,
}

impl ParamObject for AnimationParams {
    fn endpoint() -> &'static str {
        "animation-parameters"
    }
}

/// Renderer selection and quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderingParams {
    /// Name of the active renderer. Must be one of `renderers`.
    pub current: String,
    /// Renderers the backend supports. Not remotely writable in practice;
    /// kept in the object so GET exposes it.
    pub renderers: Vec<String>,
    /// Samples per pixel per frame.
    pub samples_per_pixel: u32,
    /// Background color, RGB in `[0, 1]`.
    pub background_color: [f32; 3],
}

impl Default for RenderingParams {
    fn default() -> Self {
        Self {
            current: "basic".to_owned(),
            renderers: vec!["basic".to_owned(), "raycast".to_owned()],
            samples_per_pixel: 1,
            background_color: [0.0, 0.0, 0.0],
        }
    }
}

impl RenderingParams {
    /// Whether the chosen renderer is one the backend supports.
    pub fn current_is_supported(&self) -> bool {
        self.renderers.iter().any(|r| r == &self.current)
    }
}

impl ParamObject for RenderingParams {
    fn endpoint() -> &'static str {
        "rendering-parameters"
    }
}

/// Camera pose and projection type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CameraParams {
    /// Current camera type. Empty string keeps the previous type.
    pub current: String,
    /// Camera types the engine supports.
    pub types: Vec<String>,
    /// Eye position.
    pub position: [f32; 3],
    /// Look-at target.
    pub target: [f32; 3],
    /// Up vector.
    pub up: [f32; 3],
    /// Vertical field of view, degrees.
    pub fov: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            current: "perspective".to_owned(),
            types: vec!["perspective".to_owned(), "orthographic".to_owned()],
            position: [0.0, 0.0, 1.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov: 45.0,
        }
    }
}

impl CameraParams {
    /// Whether the requested current type is acceptable: empty (keep as is)
    /// or listed in the supported types.
    pub fn current_is_supported(&self) -> bool {
        self.current.is_empty() || self.types.iter().any(|t| t == &self.current)
    }
}

impl ParamObject for CameraParams {
    fn endpoint() -> &'static str {
        "camera"
    }
}

/// Scene-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SceneParams {
    /// Color map file used to seed the transfer function.
    pub color_map_file: String,
    /// Scalar range the color map spans.
    pub color_map_range: [f32; 2],
    /// Environment map file.
    pub environment_map: String,
}

impl ParamObject for SceneParams {
    fn endpoint() -> &'static str {
        "scene-parameters"
    }
}

/// Volume sampling settings. Updates force a scene rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VolumeParams {
    /// Grid dimensions in voxels.
    pub dimensions: [u32; 3],
    /// Spacing between voxels in world units.
    pub element_spacing: [f32; 3],
    /// Grid origin offset in world units.
    pub offset: [f32; 3],
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            dimensions: [0, 0, 0],
            element_spacing: [1.0, 1.0, 1.0],
            offset: [0.0, 0.0, 0.0],
        }
    }
}

impl ParamObject for VolumeParams {
    fn endpoint() -> &'static str {
        "volume-parameters"
    }
}

/// Geometry generation settings. Updates force a scene rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GeometryParams {
    /// Multiplier applied to generated primitive radii.
    pub radius_multiplier: f32,
    /// Tessellation quality, higher is finer.
    pub quality: u32,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            radius_multiplier: 1.0,
            quality: 1,
        }
    }
}

impl ParamObject for GeometryParams {
    fn endpoint() -> &'static str {
        "geometry-parameters"
    }
}

/// Display-wall streaming settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StreamParams {
    /// Whether streaming to a display wall is enabled.
    pub enabled: bool,
    /// Display-wall host.
    pub host: String,
    /// Stream identifier shown on the wall.
    pub id: String,
}

impl ParamObject for StreamParams {
    fn endpoint() -> &'static str {
        "stream-parameters"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observable;
    use serde_json::json;

    #[test]
    fn camera_accepts_supported_type() {
        let mut camera = Observable::<CameraParams>::default();
        let payload = json!({
            "current": "orthographic",
            "types": ["perspective", "orthographic"],
            "position": [0.0, 0.0, 5.0],
        });
        camera
            .apply(&payload, CameraParams::current_is_supported)
            .expect("supported type accepted");
        assert_eq!(camera.get().current, "orthographic");
        assert!(camera.is_modified());
    }

    #[test]
    fn camera_rejects_unsupported_type() {
        let mut camera = Observable::<CameraParams>::default();
        let before = camera.get().clone();
        let payload = json!({"current": "fisheye"});
        assert!(camera
            .apply(&payload, CameraParams::current_is_supported)
            .is_err());
        assert_eq!(camera.get(), &before);
        assert!(!camera.is_modified());
    }

    #[test]
    fn camera_empty_current_keeps_previous_type() {
        let params = CameraParams {
            current: String::new(),
            ..CameraParams::default()
        };
        assert!(params.current_is_supported());
    }

    #[test]
    fn renderer_predicate_checks_supported_list() {
        let mut params = RenderingParams::default();
        assert!(params.current_is_supported());
        params.current = "pathtracer".to_owned();
        assert!(!params.current_is_supported());
    }

    #[test]
    fn partial_payload_falls_back_to_defaults() {
        let mut app = Observable::<ApplicationParams>::default();
        app.apply(&json!({"image-stream-fps": 30}), |_| true)
            .expect("partial payload");
        assert_eq!(app.get().image_stream_fps, 30);
        assert_eq!(app.get().image_quality, ApplicationParams::default().image_quality);
    }
}
