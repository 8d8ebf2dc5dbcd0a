//! Decoder core for the AliceSoft 3D asset family.
//!
//! Four binary formats and two text sidecars make up a renderable
//! character or prop:
//!
//! - **AAR**: container archives with zlib-compressed entries
//!   ([`archive`])
//! - **QNT**: lossless channel-planar images ([`qnt`])
//! - **POL**: polygonal models with materials, meshes and bones
//!   ([`model`])
//! - **MOT**: per-bone motion sequences ([`motion`])
//! - **OPR**/**TXA**: textual rendering overlays and texture-animation
//!   tables ([`overlay`])
//!
//! [`scene::SceneBuilder`] resolves all of the above into plain
//! renderer-neutral resources behind the [`scene::SceneSink`] trait.
//! Coordinate conversion (left-handed inches to right-handed meters)
//! happens once, at the parsing layer, in [`math`].

pub mod archive;
pub mod compression;
pub mod error;
pub mod math;
pub mod model;
pub mod motion;
pub mod overlay;
pub mod qnt;
pub mod scene;
pub mod source;
mod strings;

pub use archive::{AarArchive, Entry, EntryKind};
pub use error::{Error, Result};
pub use model::Pol;
pub use motion::Mot;
pub use overlay::OprOverlay;
pub use qnt::Image;
pub use scene::{SceneBuilder, SceneSink};
pub use source::{AssetSource, DirSource};
