// qfiles.rs — on-disk BSP tile format
//
// All records are little-endian on disk. They are read with
// `bytemuck::pod_read_unaligned` and then passed through `to_host`.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::q_shared::{little_float, little_long, little_short, little_ushort};

// ============================================================
// BSP file format
// ============================================================

/// BSP magic: "IBSP" in little-endian
pub const IDBSPHEADER: i32 = (b'P' as i32) << 24 | (b'S' as i32) << 16 | (b'B' as i32) << 8 | b'I' as i32;
pub const BSPVERSION: i32 = 71;

// Upper design bounds
pub const MAX_MAP_MODELS: usize = 1024;
pub const MAX_MAP_TEXINFO: usize = 8192;
pub const MAX_MAP_PLANES: usize = 65536;
pub const MAX_MAP_NODES: usize = 65536;
pub const MAX_MAP_LEAFS: usize = 65536;
pub const MAX_MAP_VERTS: usize = 65536;
pub const MAX_MAP_FACES: usize = 65536;
pub const MAX_MAP_LEAFFACES: usize = 65536;
pub const MAX_MAP_EDGES: usize = 128000;
pub const MAX_MAP_SURFEDGES: usize = 256000;
pub const MAX_MAP_LIGHTING: usize = 0x1000000;

/// Largest luxel size exponent a tile may use (luxels of 1024 units).
pub const MAX_LIGHTQUANT: u8 = 10;

// Lump indices of the lumps the renderer reads
pub const LUMP_PLANES: usize = 1;
pub const LUMP_VERTEXES: usize = 2;
pub const LUMP_NODES: usize = 4;
pub const LUMP_TEXINFO: usize = 5;
pub const LUMP_FACES: usize = 6;
pub const LUMP_LIGHTING: usize = 7;
pub const LUMP_LEAFS: usize = 8;
pub const LUMP_LEAFFACES: usize = 9;
pub const LUMP_EDGES: usize = 11;
pub const LUMP_SURFEDGES: usize = 12;
pub const LUMP_MODELS: usize = 13;
pub const HEADER_LUMPS: usize = 19;

pub const MAXLIGHTMAPS: usize = 4;

/// Style slot terminator in `DFace::styles`.
pub const STYLE_NONE: u8 = 255;

// ============================================================
// Flags
// ============================================================

bitflags! {
    /// texinfo_t flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TexFlags: i32 {
        const LIGHT = 0x1;      // value will hold the light strength
        const SLICK = 0x2;
        const WARP = 0x8;       // turbulent water warp
        const TRANS33 = 0x10;
        const TRANS66 = 0x20;
        const FLOWING = 0x40;   // scroll towards angle
        const NODRAW = 0x80;
        const HINT = 0x100;
        const SKIP = 0x200;
        const ALPHATEST = 0x2000000;
    }
}

impl TexFlags {
    pub const TRANSLUCENT: TexFlags = TexFlags::TRANS33.union(TexFlags::TRANS66);
}

bitflags! {
    /// Leaf contents. Nodes never carry contents in memory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Contents: i32 {
        const SOLID = 1;
        const WINDOW = 2;
        const WATER = 32;
    }
}

// ============================================================
// Records
// ============================================================

/// Byte-order conversion for an on-disk record. Swapping is its own inverse,
/// so the same call serves for reading and writing.
pub trait DiskRecord: Pod {
    fn to_host(self) -> Self;
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct DHeader {
    pub ident: i32,
    pub version: i32,
    pub lumps: [Lump; HEADER_LUMPS],
}

impl DiskRecord for DHeader {
    fn to_host(mut self) -> Self {
        self.ident = little_long(self.ident);
        self.version = little_long(self.version);
        for l in self.lumps.iter_mut() {
            l.fileofs = little_long(l.fileofs);
            l.filelen = little_long(l.filelen);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3], // for sounds or lights
    pub headnode: i32,
    pub firstface: i32,
    pub numfaces: i32, // submodels just draw faces without walking the bsp tree
}

impl DiskRecord for DModel {
    fn to_host(mut self) -> Self {
        for j in 0..3 {
            self.mins[j] = little_float(self.mins[j]);
            self.maxs[j] = little_float(self.maxs[j]);
            self.origin[j] = little_float(self.origin[j]);
        }
        self.headnode = little_long(self.headnode);
        self.firstface = little_long(self.firstface);
        self.numfaces = little_long(self.numfaces);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DVertex {
    pub point: [f32; 3],
}

impl DiskRecord for DVertex {
    fn to_host(mut self) -> Self {
        self.point = self.point.map(little_float);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    pub plane_type: i32, // PLANE_X - PLANE_ANYZ
}

impl DiskRecord for DPlane {
    fn to_host(mut self) -> Self {
        self.normal = self.normal.map(little_float);
        self.dist = little_float(self.dist);
        self.plane_type = little_long(self.plane_type);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DNode {
    pub planenum: i32, // -1 for level grouping nodes
    pub children: [i32; 2], // negative numbers are -(leafs+1), not nodes
    pub mins: [i16; 3], // for frustum culling
    pub maxs: [i16; 3],
    pub firstface: u16,
    pub numfaces: u16, // counting both sides
}

impl DiskRecord for DNode {
    fn to_host(mut self) -> Self {
        self.planenum = little_long(self.planenum);
        self.children = self.children.map(little_long);
        self.mins = self.mins.map(little_short);
        self.maxs = self.maxs.map(little_short);
        self.firstface = little_ushort(self.firstface);
        self.numfaces = little_ushort(self.numfaces);
        self
    }
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct TexInfo {
    pub vecs: [[f32; 4]; 2], // [s/t][xyz offset]
    pub flags: i32,
    pub value: i32, // light emission, etc
    pub texture: [u8; 32], // texture name (textures/*.tga)
    pub nexttexinfo: i32, // for animations, -1 = end of chain
}

impl TexInfo {
    /// Texture name up to the first NUL.
    pub fn texture_name(&self) -> String {
        let end = self.texture.iter().position(|&b| b == 0).unwrap_or(self.texture.len());
        String::from_utf8_lossy(&self.texture[..end]).into_owned()
    }
}

impl DiskRecord for TexInfo {
    fn to_host(mut self) -> Self {
        for v in self.vecs.iter_mut() {
            *v = v.map(little_float);
        }
        self.flags = little_long(self.flags);
        self.value = little_long(self.value);
        self.nexttexinfo = little_long(self.nexttexinfo);
        self
    }
}

/// Note that edge 0 is never used, because negative edge nums are used for
/// counterclockwise use of the edge in a face.
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DEdge {
    pub v: [u16; 2], // vertex numbers
}

impl DiskRecord for DEdge {
    fn to_host(mut self) -> Self {
        self.v = self.v.map(little_ushort);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DFace {
    pub planenum: u16,
    pub side: i16,
    pub firstedge: i32, // we must support > 64k edges
    pub numedges: i16,
    pub texinfo: i16,
    pub styles: [u8; MAXLIGHTMAPS],
    pub lightofs: i32, // start of [numstyles*surfsize] samples
}

impl DiskRecord for DFace {
    fn to_host(mut self) -> Self {
        self.planenum = little_ushort(self.planenum);
        self.side = little_short(self.side);
        self.firstedge = little_long(self.firstedge);
        self.numedges = little_short(self.numedges);
        self.texinfo = little_short(self.texinfo);
        self.lightofs = little_long(self.lightofs);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DLeaf {
    pub contents: i32, // OR of all brushes (not needed?)
    pub cluster: i16,
    pub area: i16,
    pub mins: [i16; 3], // for frustum culling
    pub maxs: [i16; 3],
    pub firstleafface: u16,
    pub numleaffaces: u16,
    pub firstleafbrush: u16,
    pub numleafbrushes: u16,
}

impl DiskRecord for DLeaf {
    fn to_host(mut self) -> Self {
        self.contents = little_long(self.contents);
        self.cluster = little_short(self.cluster);
        self.area = little_short(self.area);
        self.mins = self.mins.map(little_short);
        self.maxs = self.maxs.map(little_short);
        self.firstleafface = little_ushort(self.firstleafface);
        self.numleaffaces = little_ushort(self.numleaffaces);
        self.firstleafbrush = little_ushort(self.firstleafbrush);
        self.numleafbrushes = little_ushort(self.numleafbrushes);
        self
    }
}

impl DiskRecord for i32 {
    fn to_host(self) -> Self {
        little_long(self)
    }
}

impl DiskRecord for u16 {
    fn to_host(self) -> Self {
        little_ushort(self)
    }
}

// ============================================================
// Reading helpers
// ============================================================

/// Read and byte-swap the file header, or `None` if the buffer is too short.
pub fn read_header(buf: &[u8]) -> Option<DHeader> {
    let size = std::mem::size_of::<DHeader>();
    if buf.len() < size {
        return None;
    }
    Some(bytemuck::pod_read_unaligned::<DHeader>(&buf[..size]).to_host())
}

/// Decode a packed array of records. Trailing bytes that do not form a whole
/// record are ignored; callers validate the length first.
pub fn read_records<T: DiskRecord>(data: &[u8]) -> Vec<T> {
    data.chunks_exact(std::mem::size_of::<T>())
        .map(|chunk| bytemuck::pod_read_unaligned::<T>(chunk).to_host())
        .collect()
}

// ============================================================
// Tests
// ============================================================
