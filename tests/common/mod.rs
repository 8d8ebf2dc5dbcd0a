//! Shared helpers: little-endian byte builders for synthetic AAR, QNT,
//! POL and MOT files, and a sink double that records every call.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use alice3d::error::Result;
use alice3d::scene::{
    GeometrySpec, MaterialSpec, MeshSpec, ResourceId, SceneSink, SkeletonSpec, TextureSlot,
};

/// Little-endian byte builder.
#[derive(Default)]
pub struct Bin(pub Vec<u8>);

impl Bin {
    pub fn new() -> Self {
        Bin::default()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.0.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn vec3(&mut self, v: [f32; 3]) -> &mut Self {
        self.f32(v[0]).f32(v[1]).f32(v[2])
    }

    pub fn quat_xyzw(&mut self, v: [f32; 4]) -> &mut Self {
        self.f32(v[0]).f32(v[1]).f32(v[2]).f32(v[3])
    }

    pub fn cstr(&mut self, s: &str) -> &mut Self {
        self.0.extend_from_slice(s.as_bytes());
        self.0.push(0);
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.0.extend_from_slice(data);
        self
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Wrap a payload in a ZLB frame (compressing it).
pub fn zlb(payload: &[u8]) -> Vec<u8> {
    let packed = deflate(payload);
    let mut bin = Bin::new();
    bin.bytes(b"ZLB\0")
        .u32(0)
        .u32(payload.len() as u32)
        .u32(packed.len() as u32)
        .bytes(&packed);
    bin.0
}

pub enum AarEntry<'a> {
    Raw(&'a str, &'a [u8]),
    /// Payload is compressed into a ZLB frame.
    Compressed(&'a str, &'a [u8]),
    Symlink(&'a str, &'a str),
}

/// Build an AAR archive. Version 2 masks index strings and stores a
/// symlink-target string per entry.
pub fn build_aar(version: u32, entries: &[AarEntry]) -> Vec<u8> {
    let mask = |s: &str| -> Vec<u8> {
        let mut bytes: Vec<u8> = s.bytes().collect();
        bytes.push(0);
        if version == 2 {
            for b in &mut bytes {
                *b = b.wrapping_add(0x60);
            }
        }
        bytes
    };

    // Lay out entry payloads first to learn offsets.
    let mut payloads: Vec<(Vec<u8>, i32, Vec<u8>, Vec<u8>)> = Vec::new();
    for entry in entries {
        match entry {
            AarEntry::Raw(name, data) => {
                payloads.push((data.to_vec(), 1, mask(name), mask("")));
            }
            AarEntry::Compressed(name, data) => {
                payloads.push((zlb(data), 0, mask(name), mask("")));
            }
            AarEntry::Symlink(name, target) => {
                payloads.push((Vec::new(), 2, mask(name), mask(target)));
            }
        }
    }

    let mut index_size = 0usize;
    for (_, _, name, target) in &payloads {
        index_size += 12 + name.len();
        if version == 2 {
            index_size += target.len();
        }
    }
    let data_start = 12 + index_size.max(4); // empty archives still carry the offset word

    let mut bin = Bin::new();
    bin.bytes(b"AAR\0").u32(version).u32(entries.len() as u32);
    if entries.is_empty() {
        bin.u32(data_start as u32);
    } else {
        let mut offset = data_start;
        for (payload, kind, name, target) in &payloads {
            bin.u32(offset as u32).u32(payload.len() as u32).i32(*kind);
            bin.bytes(name);
            if version == 2 {
                bin.bytes(target);
            }
            offset += payload.len();
        }
    }
    for (payload, _, _, _) in &payloads {
        bin.bytes(payload);
    }
    bin.0
}

/// Apply the QNT prediction filter (the encoder side of unfilter) to a
/// single channel plane, then pack it into 2x2 block order.
fn filter_and_block(plane: &[u8], w: usize, h: usize) -> Vec<u8> {
    // Forward filter: delta = predictor - actual.
    let mut filtered = vec![0u8; w * h];
    filtered[0] = plane[0];
    for x in 1..w {
        filtered[x] = plane[x - 1].wrapping_sub(plane[x]);
    }
    for y in 1..h {
        filtered[y * w] = plane[(y - 1) * w].wrapping_sub(plane[y * w]);
        for x in 1..w {
            let up = plane[(y - 1) * w + x] as u16;
            let left = plane[y * w + x - 1] as u16;
            filtered[y * w + x] = (((up + left) >> 1) as u8).wrapping_sub(plane[y * w + x]);
        }
    }

    let mut blocked = Vec::with_capacity(w * h);
    for y in (0..h).step_by(2) {
        for x in (0..w).step_by(2) {
            blocked.push(filtered[y * w + x]);
            blocked.push(filtered[(y + 1) * w + x]);
            blocked.push(filtered[y * w + x + 1]);
            blocked.push(filtered[(y + 1) * w + x + 1]);
        }
    }
    blocked
}

/// Encode RGBA pixels (even dimensions) into a complete QNT file.
/// `with_alpha` adds the separately compressed alpha plane.
pub fn build_qnt(version: u32, width: u32, height: u32, rgba: &[u8], with_alpha: bool) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    assert!(w % 2 == 0 && h % 2 == 0, "builder wants even dimensions");
    assert_eq!(rgba.len(), w * h * 4);

    // Planes are stored for output channel 2, then 1, then 0.
    let mut pixel_plane = Vec::with_capacity(w * h * 3);
    for c in (0..3usize).rev() {
        let plane: Vec<u8> = (0..w * h).map(|i| rgba[i * 4 + c]).collect();
        pixel_plane.extend_from_slice(&filter_and_block(&plane, w, h));
    }
    let pixel_blob = deflate(&pixel_plane);

    let alpha_blob = if with_alpha {
        let plane: Vec<u8> = (0..w * h).map(|i| rgba[i * 4 + 3]).collect();
        // The alpha plane is filtered like any other channel.
        let mut filtered = vec![0u8; w * h];
        filtered[0] = plane[0];
        for x in 1..w {
            filtered[x] = plane[x - 1].wrapping_sub(plane[x]);
        }
        for y in 1..h {
            filtered[y * w] = plane[(y - 1) * w].wrapping_sub(plane[y * w]);
            for x in 1..w {
                let up = plane[(y - 1) * w + x] as u16;
                let left = plane[y * w + x - 1] as u16;
                filtered[y * w + x] = (((up + left) >> 1) as u8).wrapping_sub(plane[y * w + x]);
            }
        }
        Some(deflate(&filtered))
    } else {
        None
    };

    build_qnt_raw(
        version,
        width,
        height,
        &pixel_blob,
        alpha_blob.as_deref().unwrap_or(&[]),
    )
}

/// Assemble a QNT file from pre-compressed blobs.
pub fn build_qnt_raw(
    version: u32,
    width: u32,
    height: u32,
    pixel_blob: &[u8],
    alpha_blob: &[u8],
) -> Vec<u8> {
    let header_size: u32 = if version == 0 { 48 } else { 44 };
    let mut bin = Bin::new();
    bin.bytes(b"QNT\0").u32(version);
    if version >= 1 {
        bin.u32(header_size);
    }
    bin.u32(0) // x
        .u32(0) // y
        .u32(width)
        .u32(height)
        .u32(24)
        .u32(1)
        .u32(pixel_blob.len() as u32)
        .u32(alpha_blob.len() as u32);
    while bin.0.len() < header_size as usize {
        bin.u8(0);
    }
    bin.bytes(pixel_blob).bytes(alpha_blob);
    bin.0
}

// ---------------------------------------------------------------------------
// POL / MOT builders

pub struct PolMaterial<'a> {
    pub name: &'a str,
    /// (filename, raw role id)
    pub textures: &'a [(&'a str, u32)],
    pub children: &'a [PolMaterial<'a>],
}

impl PolMaterial<'_> {
    fn write(&self, bin: &mut Bin, top_level: bool) {
        bin.cstr(self.name);
        bin.u32(self.textures.len() as u32);
        for (file, role) in self.textures {
            bin.cstr(file).u32(*role);
        }
        if top_level {
            bin.u32(self.children.len() as u32);
            for child in self.children {
                child.write(bin, false);
            }
        }
    }
}

pub struct PolVertex<'a> {
    pub pos: [f32; 3],
    /// (bone id, weight)
    pub weights: &'a [(u32, f32)],
}

pub struct PolTriangle<'a> {
    pub verts: [u32; 3],
    pub uvs: [u32; 3],
    pub light_uvs: Option<[u32; 3]>,
    pub colors: [u32; 3],
    pub alphas: Option<[u32; 3]>,
    pub normals: [[f32; 3]; 3],
    pub submaterial: u32,
    pub _marker: std::marker::PhantomData<&'a ()>,
}

impl Default for PolTriangle<'_> {
    fn default() -> Self {
        PolTriangle {
            verts: [0, 1, 2],
            uvs: [0, 1, 2],
            light_uvs: None,
            colors: [0, 0, 0],
            alphas: None,
            normals: [[0.0, 1.0, 0.0]; 3],
            submaterial: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

pub struct PolMesh<'a> {
    pub name: &'a str,
    pub material: i32,
    pub vertices: &'a [PolVertex<'a>],
    pub uvs: &'a [[f32; 2]],
    pub light_uvs: &'a [[f32; 2]],
    /// v1: float triples; v2: RGBA8 written from these (x255).
    pub colors: &'a [[f32; 3]],
    /// v2 only.
    pub alphas: &'a [f32],
    pub triangles: &'a [PolTriangle<'a>],
}

impl Default for PolMesh<'_> {
    fn default() -> Self {
        PolMesh {
            name: "mesh",
            material: 0,
            vertices: &[],
            uvs: &[],
            light_uvs: &[],
            colors: &[],
            alphas: &[],
            triangles: &[],
        }
    }
}

pub struct PolBone<'a> {
    pub name: &'a str,
    pub id: i32,
    pub parent: i32,
    pub pos: [f32; 3],
    /// File order (x, y, z, w).
    pub rotq: [f32; 4],
}

impl Default for PolBone<'_> {
    fn default() -> Self {
        PolBone {
            name: "bone",
            id: 0,
            parent: -1,
            pos: [0.0; 3],
            rotq: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

fn write_mesh(bin: &mut Bin, version: u32, mesh: &PolMesh) {
    bin.i32(0);
    bin.cstr(mesh.name);
    bin.i32(mesh.material);

    bin.u32(mesh.vertices.len() as u32);
    for vertex in mesh.vertices {
        bin.vec3(vertex.pos);
        if version == 1 {
            bin.u32(vertex.weights.len() as u32);
            for (bone, weight) in vertex.weights {
                bin.u32(*bone).f32(*weight);
            }
        } else {
            bin.u16(vertex.weights.len() as u16);
            for (bone, weight) in vertex.weights {
                bin.u16(*bone as u16).f32(*weight);
            }
        }
    }

    bin.u32(mesh.uvs.len() as u32);
    for uv in mesh.uvs {
        bin.f32(uv[0]).f32(uv[1]);
    }
    bin.u32(mesh.light_uvs.len() as u32);
    for uv in mesh.light_uvs {
        bin.f32(uv[0]).f32(uv[1]);
    }

    bin.u32(mesh.colors.len() as u32);
    for color in mesh.colors {
        if version == 1 {
            bin.vec3(*color);
        } else {
            bin.u8((color[0] * 255.0) as u8)
                .u8((color[1] * 255.0) as u8)
                .u8((color[2] * 255.0) as u8)
                .u8(255);
        }
    }
    if version == 2 {
        bin.u32(mesh.alphas.len() as u32);
        for alpha in mesh.alphas {
            bin.u8((alpha * 255.0) as u8);
        }
    }

    bin.u32(mesh.triangles.len() as u32);
    for triangle in mesh.triangles {
        for v in triangle.verts {
            bin.u32(v);
        }
        for uv in triangle.uvs {
            bin.u32(uv);
        }
        if !mesh.light_uvs.is_empty() {
            // Light UV indices live past the UV table.
            let raw = triangle.light_uvs.unwrap_or([0; 3]);
            for i in raw {
                bin.u32(i + mesh.uvs.len() as u32);
            }
        }
        for c in triangle.colors {
            bin.u32(c);
        }
        if version == 2 && !mesh.alphas.is_empty() {
            for a in triangle.alphas.unwrap_or([0; 3]) {
                bin.u32(a);
            }
        }
        for normal in triangle.normals {
            bin.vec3(normal);
        }
        bin.u32(triangle.submaterial);
    }

    if version == 1 {
        bin.u32(1).u32(0);
    }
}

pub fn build_pol(
    version: u32,
    materials: &[PolMaterial],
    meshes: &[PolMesh],
    bones: &[PolBone],
) -> Vec<u8> {
    let mut bin = Bin::new();
    bin.bytes(b"POL\0").u32(version);
    bin.u32(materials.len() as u32);
    for material in materials {
        material.write(&mut bin, true);
    }
    bin.u32(meshes.len() as u32);
    for mesh in meshes {
        write_mesh(&mut bin, version, mesh);
    }
    bin.u32(bones.len() as u32);
    for bone in bones {
        bin.cstr(bone.name)
            .i32(bone.id)
            .i32(bone.parent)
            .vec3(bone.pos)
            .quat_xyzw(bone.rotq);
    }
    bin.0
}

pub struct MotBone<'a> {
    pub name: &'a str,
    pub id: u32,
    pub parent: u32,
    /// (pos, rotq, aux_rotq) per frame, file order quaternions.
    pub frames: &'a [([f32; 3], [f32; 4], [f32; 4])],
}

pub fn build_mot(frame_count: u32, bones: &[MotBone]) -> Vec<u8> {
    let mut bin = Bin::new();
    bin.bytes(b"MOT\0").u32(0).u32(frame_count).u32(bones.len() as u32);
    for bone in bones {
        assert_eq!(bone.frames.len() as u32, frame_count);
        bin.cstr(bone.name).u32(bone.id).u32(bone.parent);
        for (pos, rotq, aux) in bone.frames {
            bin.vec3(*pos).quat_xyzw(*rotq).quat_xyzw(*aux);
        }
    }
    bin.0
}

// ---------------------------------------------------------------------------
// Recording sink

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Texture { width: u32, height: u32 },
    Material(MaterialSpecLite),
    Geometry,
    Skeleton { joints: usize },
    Mesh,
}

/// The fields scene tests assert on, detached from the borrow in
/// `MaterialSpec`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSpecLite {
    pub name: String,
    pub matcap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointPose {
    pub skeleton: ResourceId,
    pub joint: usize,
    pub pos: [f32; 3],
    pub rot: [f32; 4],
}

/// A [`SceneSink`] double that mints sequential ids and records every
/// call for assertions.
#[derive(Default)]
pub struct RecordingSink {
    next_id: u64,
    pub calls: Vec<SinkCall>,
    pub materials: Vec<(ResourceId, MaterialSpec)>,
    pub geometries: Vec<(ResourceId, GeometrySpec)>,
    pub skeletons: Vec<(ResourceId, SkeletonSpec)>,
    pub meshes: Vec<(ResourceId, MeshSpec)>,
    pub joint_poses: Vec<JointPose>,
    pub texture_swaps: Vec<(ResourceId, TextureSlot, ResourceId)>,
    pub texture_offsets: Vec<(ResourceId, [f32; 2])>,
    pub released: Vec<ResourceId>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    fn mint(&mut self) -> ResourceId {
        self.next_id += 1;
        ResourceId(self.next_id)
    }
}

impl SceneSink for RecordingSink {
    fn create_texture(&mut self, texture: alice3d::scene::TextureUpload<'_>) -> Result<ResourceId> {
        assert!(texture.mipmaps);
        assert_eq!(
            texture.pixels.len(),
            (texture.width * texture.height * 4) as usize
        );
        self.calls.push(SinkCall::Texture {
            width: texture.width,
            height: texture.height,
        });
        Ok(self.mint())
    }

    fn create_material(&mut self, material: MaterialSpec) -> Result<ResourceId> {
        let id = self.mint();
        self.calls.push(SinkCall::Material(MaterialSpecLite {
            name: material.name.clone(),
            matcap: material.kind == alice3d::scene::MaterialKind::Matcap,
        }));
        self.materials.push((id, material));
        Ok(id)
    }

    fn create_geometry(&mut self, geometry: GeometrySpec) -> Result<ResourceId> {
        let id = self.mint();
        self.calls.push(SinkCall::Geometry);
        self.geometries.push((id, geometry));
        Ok(id)
    }

    fn create_skeleton(&mut self, skeleton: SkeletonSpec) -> Result<ResourceId> {
        let id = self.mint();
        self.calls.push(SinkCall::Skeleton {
            joints: skeleton.joints.len(),
        });
        self.skeletons.push((id, skeleton));
        Ok(id)
    }

    fn create_mesh(&mut self, mesh: MeshSpec) -> Result<ResourceId> {
        let id = self.mint();
        self.calls.push(SinkCall::Mesh);
        self.meshes.push((id, mesh));
        Ok(id)
    }

    fn set_joint_pose(&mut self, skeleton: ResourceId, joint: usize, pos: [f32; 3], rot: [f32; 4]) {
        self.joint_poses.push(JointPose {
            skeleton,
            joint,
            pos,
            rot,
        });
    }

    fn set_material_texture(
        &mut self,
        material: ResourceId,
        slot: TextureSlot,
        texture: ResourceId,
    ) {
        self.texture_swaps.push((material, slot, texture));
    }

    fn set_texture_offset(&mut self, material: ResourceId, offset: [f32; 2]) {
        self.texture_offsets.push((material, offset));
    }

    fn release(&mut self, id: ResourceId) {
        self.released.push(id);
    }
}

/// An [`alice3d::AssetSource`] over an in-memory name/bytes map.
#[derive(Default)]
pub struct MemSource {
    pub files: Vec<(String, Vec<u8>)>,
}

impl MemSource {
    pub fn new() -> Self {
        MemSource::default()
    }

    pub fn with(mut self, name: &str, data: Vec<u8>) -> Self {
        self.files.push((name.to_owned(), data));
        self
    }
}

impl alice3d::AssetSource for MemSource {
    fn exists(&self, name: &str) -> bool {
        self.files
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    fn filenames(&self) -> Vec<String> {
        self.files.iter().map(|(n, _)| n.clone()).collect()
    }

    fn load(&mut self, name: &str) -> Result<Vec<u8>> {
        self.files
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, d)| d.clone())
            .ok_or_else(|| alice3d::Error::NotFound(name.to_owned()))
    }
}
