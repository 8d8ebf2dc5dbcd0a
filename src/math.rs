//! Wire-level math types.
//!
//! The source files are little-endian and left-handed with Y up and Z
//! towards the viewer, and positions are stored in inches. Everything
//! downstream works in a right-handed meters convention, so the
//! conversion happens here, inside the binrw `map` closures, and is
//! never re-applied by higher layers.

use binrw::binread;
use cgmath::{Quaternion, Vector2, Vector3};
use serde::Serialize;

/// Inches to meters.
pub const POSITION_SCALE: f32 = 0.0254;

/// A point, read as `(x, y, -z)` and scaled to meters.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct Position(
    #[br(map = |raw: [f32; 3]| Vector3::new(
        raw[0] * POSITION_SCALE,
        raw[1] * POSITION_SCALE,
        -raw[2] * POSITION_SCALE,
    ))]
    pub Vector3<f32>,
);

impl Position {
    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }
}

/// A unit-length direction, read as `(x, y, -z)` without scaling.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct Direction(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], -raw[2]))] pub Vector3<f32>,
);

impl Direction {
    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }
}

/// A rotation, stored on disk as `(x, y, z, w)` and read as `(w, -x, -y, z)`.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct RotationQuat(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], -raw[0], -raw[1], raw[2]))]
    pub  Quaternion<f32>,
);

impl RotationQuat {
    /// `[x, y, z, w]`, the order renderers commonly take.
    pub fn to_slice(&self) -> [f32; 4] {
        let q = &self.0;
        [q.v.x, q.v.y, q.v.z, q.s]
    }
}

/// A texture coordinate, read as `(u, -v)`.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct Uv(#[br(map = |raw: [f32; 2]| Vector2::new(raw[0], -raw[1]))] pub Vector2<f32>);

impl Uv {
    pub fn to_slice(&self) -> [f32; 2] {
        let v = &self.0;
        [v.x, v.y]
    }
}
