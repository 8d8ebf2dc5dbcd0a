//! MOT motion files: per-bone sequences of frame records.
//!
//! Frame 0 is the bind pose and is skipped during playback. Bones are
//! matched against a model's skeleton by name first, id second, at
//! application time; nothing is cross-validated here.

use std::io::Cursor;

use binrw::{binread, BinReaderExt};
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::math::{Position, RotationQuat};
use crate::strings::read_cstr;

#[binread]
#[derive(Debug, Clone, Copy, Serialize)]
#[br(little)]
pub struct MotionFrame {
    pub pos: Position,
    pub rotq: RotationQuat,
    /// Second rotation per frame. Meaning unknown; preserved verbatim.
    pub aux_rotq: RotationQuat,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoneMotion {
    pub name: String,
    pub id: u32,
    pub parent: u32,
    /// One record per frame; `frames[0]` is the bind pose.
    pub frames: Vec<MotionFrame>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mot {
    pub frame_count: u32,
    pub bones: Vec<BoneMotion>,
}

impl Mot {
    pub fn parse(data: &[u8]) -> Result<Mot> {
        let mut reader = Cursor::new(data);

        let magic: [u8; 4] = reader.read_le()?;
        if &magic != b"MOT\0" {
            return Err(Error::BadMagic { expected: "MOT\0" });
        }
        let version: u32 = reader.read_le()?;
        if version != 0 {
            return Err(Error::UnsupportedVersion {
                what: "MOT",
                version,
            });
        }

        let frame_count: u32 = reader.read_le()?;
        let bone_count: u32 = reader.read_le()?;
        let mut bones = Vec::with_capacity(bone_count as usize);
        for _ in 0..bone_count {
            let name = read_cstr(&mut reader)?;
            let id: u32 = reader.read_le()?;
            let parent: u32 = reader.read_le()?;
            let mut frames = Vec::with_capacity(frame_count as usize);
            for _ in 0..frame_count {
                frames.push(reader.read_le::<MotionFrame>()?);
            }
            bones.push(BoneMotion {
                name,
                id,
                parent,
                frames,
            });
        }

        let consumed = reader.position() as usize;
        if consumed != data.len() {
            warn!(
                consumed,
                file_len = data.len(),
                "trailing bytes after MOT data"
            );
        }

        Ok(Mot {
            frame_count,
            bones,
        })
    }
}
