// SPDX-License-Identifier: Apache-2.0
//! Point-cloud blob loading.
//!
//! The one built-in asset format: a flat little-endian `f32` triple per
//! point, as produced by xyz-binary exporters. Both the `add-model` path
//! loader and the binary upload pipeline end up here.

use glam::Vec3;
use lux_proto::RpcError;
use lux_scene::{Bounds, Geometry, Model};

const BYTES_PER_POINT: usize = 3 * std::mem::size_of::<f32>();

/// Parse a flat xyz-float blob into a point model.
pub fn model_from_blob(bytes: &[u8], radius: f32) -> Result<Model, RpcError> {
    if bytes.is_empty() {
        return Err(RpcError::invalid_params("empty point blob"));
    }
    if bytes.len() % BYTES_PER_POINT != 0 {
        return Err(RpcError::invalid_params(format!(
            "point blob length {} is not a multiple of {BYTES_PER_POINT}",
            bytes.len()
        )));
    }

    let mut positions = Vec::with_capacity(bytes.len() / BYTES_PER_POINT);
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for point in bytes.chunks_exact(BYTES_PER_POINT) {
        let mut coords = [0.0f32; 3];
        for (i, coord) in coords.iter_mut().enumerate() {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&point[i * 4..i * 4 + 4]);
            *coord = f32::from_le_bytes(raw);
            if !coord.is_finite() {
                return Err(RpcError::invalid_params("non-finite coordinate in blob"));
            }
        }
        min = min.min(Vec3::from_array(coords));
        max = max.max(Vec3::from_array(coords));
        positions.push(coords);
    }

    Ok(Model::new(
        Geometry::Points { positions, radius },
        Bounds { min, max },
    ))
}

/// Display name for a model loaded from a path.
pub fn name_from_path(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(points: &[[f32; 3]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for p in points {
            for c in p {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn parses_points_and_bounds() {
        let bytes = blob(&[[0.0, 0.0, 0.0], [2.0, -1.0, 3.0]]);
        let model = model_from_blob(&bytes, 0.01).expect("parse");
        let Geometry::Points { positions, radius } = model.geometry() else {
            panic!("expected points");
        };
        assert_eq!(positions.len(), 2);
        assert!((radius - 0.01).abs() < f32::EPSILON);
        assert_eq!(model.bounds().min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(model.bounds().max, Vec3::new(2.0, 0.0, 3.0));
    }

    #[test]
    fn rejects_truncated_blobs() {
        let mut bytes = blob(&[[1.0, 2.0, 3.0]]);
        bytes.pop();
        assert!(model_from_blob(&bytes, 0.01).is_err());
        assert!(model_from_blob(&[], 0.01).is_err());
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let bytes = blob(&[[f32::NAN, 0.0, 0.0]]);
        assert!(model_from_blob(&bytes, 0.01).is_err());
    }

    #[test]
    fn name_falls_back_for_odd_paths() {
        assert_eq!(name_from_path("/data/neurons.xyz"), "neurons");
        assert_eq!(name_from_path(""), "model");
    }
}
