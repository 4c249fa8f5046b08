// test_support.rs — recording backend and synthetic map tiles for tests

use std::collections::HashMap;

use bytemuck::Zeroable;

use ufobsp_common::q_shared::{PLANE_X, PLANE_Y};
use ufobsp_common::qfiles::*;

use crate::qgl::{
    BlendMode, GraphicsApi, PixelFormat, PolyVert, TexLayers, TextureHandle, TextureResolver, TextureUnit,
};
use crate::r_error::{LightmapError, LoadError};
use crate::r_rmain::{r_render_frame, FrameStats, RefDef, RenderContext};
use crate::r_tiles::{r_begin_loading, World};

/// Baked light value of every luxel of face 0 of the two leaf tile.
pub const FACE0_SAMPLE: u8 = 64;
/// Baked light value of every luxel of face 1.
pub const FACE1_SAMPLE: u8 = 32;

// ============================================================
// Recording graphics backend
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub verts: Vec<PolyVert>,
    pub layers: TexLayers,
    pub base: Option<TextureHandle>,
    pub lightmap: Option<TextureHandle>,
    pub blend: BlendMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { handle: TextureHandle, width: u32, height: u32 },
    Upload { handle: TextureHandle, data: Vec<u8> },
    SubImage { handle: TextureHandle, x: u32, y: u32, width: u32, height: u32 },
    Bind { unit: TextureUnit, handle: TextureHandle },
    Blend(BlendMode),
    Draw(DrawCall),
}

/// Keeps every call it receives, plus what is bound at the moment.
#[derive(Debug)]
pub struct RecordingApi {
    pub calls: Vec<Call>,
    multitexture: bool,
    next_handle: TextureHandle,
    bound: [Option<TextureHandle>; 2],
    blend: BlendMode,
}

impl RecordingApi {
    pub fn new(multitexture: bool) -> Self {
        Self { calls: Vec::new(), multitexture, next_handle: 1, bound: [None; 2], blend: BlendMode::Opaque }
    }

    /// Data of the most recent full upload to `handle`.
    pub fn last_upload(&self, handle: TextureHandle) -> Option<&[u8]> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Upload { handle: h, data } if *h == handle => Some(data.as_slice()),
            _ => None,
        })
    }

    pub fn sub_image_count(&self, handle: TextureHandle) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::SubImage { handle: h, .. } if *h == handle))
            .count()
    }

    pub fn bind_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Bind { .. })).count()
    }

    pub fn draws(&self) -> Vec<&DrawCall> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn current_blend(&self) -> BlendMode {
        self.blend
    }
}

impl GraphicsApi for RecordingApi {
    fn create_texture(&mut self, width: u32, height: u32, _format: PixelFormat) -> TextureHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.calls.push(Call::Create { handle, width, height });
        handle
    }

    fn upload_texture(&mut self, handle: TextureHandle, width: u32, height: u32, data: &[u8]) {
        assert_eq!(data.len(), (width * height) as usize * 4);
        self.calls.push(Call::Upload { handle, data: data.to_vec() });
    }

    fn update_sub_image(&mut self, handle: TextureHandle, x: u32, y: u32, width: u32, height: u32, data: &[u8]) {
        assert!(data.len() >= (width * height) as usize * 4);
        self.calls.push(Call::SubImage { handle, x, y, width, height });
    }

    fn bind(&mut self, unit: TextureUnit, handle: TextureHandle) {
        self.bound[unit as usize] = Some(handle);
        self.calls.push(Call::Bind { unit, handle });
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
        self.calls.push(Call::Blend(mode));
    }

    fn draw_poly(&mut self, verts: &[PolyVert], layers: TexLayers) {
        assert!(verts.len() >= 3);
        self.calls.push(Call::Draw(DrawCall {
            verts: verts.to_vec(),
            layers,
            base: self.bound[TextureUnit::Base as usize],
            lightmap: self.bound[TextureUnit::Lightmap as usize],
            blend: self.blend,
        }));
    }

    fn has_multitexture(&self) -> bool {
        self.multitexture
    }
}

// ============================================================
// Texture resolver
// ============================================================

/// Knows a fixed set of 64x64 textures.
#[derive(Debug, Default)]
pub struct MapResolver {
    known: HashMap<String, TextureHandle>,
    pub lookups: usize,
}

impl MapResolver {
    pub fn with(paths: &[&str]) -> Self {
        let known = paths
            .iter()
            .enumerate()
            .map(|(i, p)| (p.to_string(), 1000 + i as TextureHandle))
            .collect();
        Self { known, lookups: 0 }
    }
}

impl TextureResolver for MapResolver {
    fn find_image(&mut self, path: &str) -> Option<(TextureHandle, u32, u32)> {
        self.lookups += 1;
        self.known.get(path).map(|&h| (h, 64, 64))
    }
}

// ============================================================
// Synthetic map files
// ============================================================

fn texinfo(name: &str, flags: TexFlags) -> TexInfo {
    let mut ti = TexInfo::zeroed();
    // s follows y, t follows z
    ti.vecs = [[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
    ti.flags = flags.bits();
    ti.texture[..name.len()].copy_from_slice(name.as_bytes());
    ti.nexttexinfo = -1;
    ti
}

fn leaf(mins: [i16; 3], maxs: [i16; 3], first: u16, num: u16) -> DLeaf {
    DLeaf { mins, maxs, firstleafface: first, numleaffaces: num, ..DLeaf::default() }
}

/// Every lump of a map file as editable records.
#[derive(Debug, Clone)]
pub struct BspBuilder {
    pub planes: Vec<DPlane>,
    pub vertexes: Vec<DVertex>,
    pub edges: Vec<DEdge>,
    pub surfedges: Vec<i32>,
    pub texinfo: Vec<TexInfo>,
    pub faces: Vec<DFace>,
    pub lighting: Vec<u8>,
    pub leafs: Vec<DLeaf>,
    pub leaffaces: Vec<u16>,
    pub nodes: Vec<DNode>,
    pub models: Vec<DModel>,
    /// replaces the serialised contents of a lump
    pub raw_lumps: Vec<(usize, Vec<u8>)>,
}

impl BspBuilder {
    /// A 64x64 wall on the plane x = 0 splitting a 64 unit cube into two
    /// leafs. Face 0 looks towards +x into leaf 0, face 1 towards -x into
    /// leaf 1.
    pub fn two_leaf(f0: TexFlags, f1: TexFlags) -> Self {
        let face = |side: i16, firstedge: i32, texinfo: i16, lightofs: i32| DFace {
            planenum: 0,
            side,
            firstedge,
            numedges: 4,
            texinfo,
            styles: [0, STYLE_NONE, STYLE_NONE, STYLE_NONE],
            lightofs,
        };

        // 5x5 luxels, one style each
        let mut lighting = vec![4u8];
        lighting.extend(std::iter::repeat(FACE0_SAMPLE).take(75));
        lighting.extend(std::iter::repeat(FACE1_SAMPLE).take(75));

        Self {
            planes: vec![DPlane { normal: [1.0, 0.0, 0.0], dist: 0.0, plane_type: PLANE_X as i32 }],
            vertexes: vec![
                DVertex { point: [0.0, -32.0, -32.0] },
                DVertex { point: [0.0, 32.0, -32.0] },
                DVertex { point: [0.0, 32.0, 32.0] },
                DVertex { point: [0.0, -32.0, 32.0] },
            ],
            // edge 0 is never referenced
            edges: vec![
                DEdge { v: [0, 0] },
                DEdge { v: [0, 1] },
                DEdge { v: [1, 2] },
                DEdge { v: [2, 3] },
                DEdge { v: [3, 0] },
            ],
            surfedges: vec![1, 2, 3, 4, -4, -3, -2, -1],
            texinfo: vec![texinfo("tex/a", f0), texinfo("tex/b", f1)],
            faces: vec![face(0, 0, 0, 1), face(1, 4, 1, 76)],
            lighting,
            leafs: vec![
                leaf([0, -32, -32], [32, 32, 32], 0, 1),
                leaf([-32, -32, -32], [0, 32, 32], 1, 1),
            ],
            leaffaces: vec![0, 1],
            nodes: vec![DNode {
                planenum: 0,
                children: [-1, -2],
                mins: [-32; 3],
                maxs: [32; 3],
                firstface: 0,
                numfaces: 2,
            }],
            models: vec![DModel {
                mins: [-32.0; 3],
                maxs: [32.0; 3],
                origin: [0.0; 3],
                headnode: 0,
                firstface: 0,
                numfaces: 2,
            }],
            raw_lumps: Vec::new(),
        }
    }

    /// An `n` x `n` grid of 64 unit cells centred on the origin, split by a
    /// balanced axial tree. Every `solid_every`th cell is solid (0 for none).
    /// The wall faces of `two_leaf` are kept so the tile has something to
    /// draw.
    pub fn grid(n: usize, solid_every: usize) -> Self {
        let mut b = Self::two_leaf(TexFlags::empty(), TexFlags::empty());
        b.planes.clear();
        b.nodes.clear();
        b.leafs.clear();
        b.grid_node(0, 0, n, n, n, solid_every);

        let half = n as f32 * 32.0;
        b.models[0].mins = [-half, -half, -64.0];
        b.models[0].maxs = [half, half, 64.0];
        b
    }

    fn grid_node(&mut self, x0: usize, y0: usize, w: usize, h: usize, n: usize, solid_every: usize) -> i32 {
        const CELL: i32 = 64;
        let origin = -(n as i32) * CELL / 2;
        let mins = [(origin + x0 as i32 * CELL) as i16, (origin + y0 as i32 * CELL) as i16, -64];
        let maxs = [
            (origin + (x0 + w) as i32 * CELL) as i16,
            (origin + (y0 + h) as i32 * CELL) as i16,
            64,
        ];

        if w == 1 && h == 1 {
            let index = y0 * n + x0;
            let solid = solid_every > 0 && index % solid_every == solid_every - 1;
            let mut l = leaf(mins, maxs, 0, 0);
            l.contents = if solid { Contents::SOLID.bits() } else { 0 };
            self.leafs.push(l);
            return -(self.leafs.len() as i32);
        }

        let idx = self.nodes.len();
        self.nodes.push(DNode::default());

        let planenum = self.planes.len() as i32;
        let (front, back) = if w >= h {
            let split = w / 2;
            let dist = (origin + (x0 + split) as i32 * CELL) as f32;
            self.planes.push(DPlane { normal: [1.0, 0.0, 0.0], dist, plane_type: PLANE_X as i32 });
            (
                self.grid_node(x0 + split, y0, w - split, h, n, solid_every),
                self.grid_node(x0, y0, split, h, n, solid_every),
            )
        } else {
            let split = h / 2;
            let dist = (origin + (y0 + split) as i32 * CELL) as f32;
            self.planes.push(DPlane { normal: [0.0, 1.0, 0.0], dist, plane_type: PLANE_Y as i32 });
            (
                self.grid_node(x0, y0 + split, w, h - split, n, solid_every),
                self.grid_node(x0, y0, w, split, n, solid_every),
            )
        };

        self.nodes[idx] = DNode { planenum, children: [front, back], mins, maxs, firstface: 0, numfaces: 0 };
        idx as i32
    }

    fn lump(&self, lump: usize) -> Vec<u8> {
        if let Some((_, raw)) = self.raw_lumps.iter().rev().find(|(l, _)| *l == lump) {
            return raw.clone();
        }
        match lump {
            LUMP_PLANES => bytemuck::cast_slice(&self.planes).to_vec(),
            LUMP_VERTEXES => bytemuck::cast_slice(&self.vertexes).to_vec(),
            LUMP_NODES => bytemuck::cast_slice(&self.nodes).to_vec(),
            LUMP_TEXINFO => bytemuck::cast_slice(&self.texinfo).to_vec(),
            LUMP_FACES => bytemuck::cast_slice(&self.faces).to_vec(),
            LUMP_LIGHTING => self.lighting.clone(),
            LUMP_LEAFS => bytemuck::cast_slice(&self.leafs).to_vec(),
            LUMP_LEAFFACES => bytemuck::cast_slice(&self.leaffaces).to_vec(),
            LUMP_EDGES => bytemuck::cast_slice(&self.edges).to_vec(),
            LUMP_SURFEDGES => bytemuck::cast_slice(&self.surfedges).to_vec(),
            LUMP_MODELS => bytemuck::cast_slice(&self.models).to_vec(),
            _ => Vec::new(),
        }
    }

    /// Serialise with the lumps in index order, so the models lump ends the
    /// file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = DHeader { ident: IDBSPHEADER, version: BSPVERSION, lumps: [Lump::default(); HEADER_LUMPS] };
        let mut body = Vec::new();
        let start = std::mem::size_of::<DHeader>();

        for i in 0..HEADER_LUMPS {
            let data = self.lump(i);
            header.lumps[i] = Lump { fileofs: (start + body.len()) as i32, filelen: data.len() as i32 };
            body.extend_from_slice(&data);
        }

        let mut out = bytemuck::bytes_of(&header).to_vec();
        out.extend_from_slice(&body);
        out
    }
}

pub fn two_leaf_bsp() -> Vec<u8> {
    two_leaf_bsp_with(TexFlags::empty(), TexFlags::empty())
}

pub fn two_leaf_bsp_with(f0: TexFlags, f1: TexFlags) -> Vec<u8> {
    BspBuilder::two_leaf(f0, f1).to_bytes()
}

// ============================================================
// Loaded worlds
// ============================================================

#[derive(Debug)]
pub struct Fixture {
    pub world: World,
    pub ctx: RenderContext,
    pub api: RecordingApi,
    resolver: MapResolver,
    files: HashMap<String, Vec<u8>>,
}

impl Fixture {
    pub fn render(&mut self, fd: &RefDef) -> Result<FrameStats, LightmapError> {
        r_render_frame(&mut self.ctx, &mut self.api, &mut self.world, fd)
    }

    pub fn reload(&mut self, tiles: &str, positions: &str) -> Result<(), LoadError> {
        self.world = r_begin_loading(&mut self.ctx, &mut self.api, &mut self.resolver, &self.files, tiles, positions)?;
        Ok(())
    }
}

pub struct FixtureBuilder {
    files: Vec<(String, Vec<u8>)>,
    tiles: String,
    positions: String,
    textures: Vec<String>,
    cvars: Vec<(String, String)>,
    multitexture: bool,
}

impl FixtureBuilder {
    /// A single tile named `t`.
    pub fn new(bsp: Vec<u8>) -> Self {
        Self::world(&[("t", bsp)], "t", "")
    }

    pub fn world(files: &[(&str, Vec<u8>)], tiles: &str, positions: &str) -> Self {
        Self {
            files: files.iter().map(|(n, b)| (n.to_string(), b.clone())).collect(),
            tiles: tiles.to_string(),
            positions: positions.to_string(),
            textures: vec!["textures/tex/a".into(), "textures/tex/b".into()],
            cvars: Vec::new(),
            multitexture: true,
        }
    }

    /// Texture paths the resolver knows, replacing the defaults.
    pub fn textures(mut self, paths: &[&str]) -> Self {
        self.textures = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn cvar(mut self, name: &str, value: &str) -> Self {
        self.cvars.push((name.to_string(), value.to_string()));
        self
    }

    pub fn multitexture(mut self, on: bool) -> Self {
        self.multitexture = on;
        self
    }

    pub fn build(self) -> Result<Fixture, LoadError> {
        let mut ctx = RenderContext::new();
        for (name, value) in &self.cvars {
            ctx.cvars.set(name, value);
        }

        let mut api = RecordingApi::new(self.multitexture);
        let textures: Vec<&str> = self.textures.iter().map(String::as_str).collect();
        let mut resolver = MapResolver::with(&textures);
        let files: HashMap<String, Vec<u8>> = self
            .files
            .into_iter()
            .map(|(n, b)| (format!("maps/{}.bsp", n), b))
            .collect();

        let world = r_begin_loading(&mut ctx, &mut api, &mut resolver, &files, &self.tiles, &self.positions)?;
        Ok(Fixture { world, ctx, api, resolver, files })
    }
}

pub fn try_load_fixture_with(bsp: &[u8], multitexture: bool, cvars: &[(&str, &str)]) -> Result<Fixture, LoadError> {
    let mut b = FixtureBuilder::new(bsp.to_vec()).multitexture(multitexture);
    for (name, value) in cvars {
        b = b.cvar(name, value);
    }
    b.build()
}

pub fn load_fixture_with(bsp: &[u8], multitexture: bool, cvars: &[(&str, &str)]) -> Fixture {
    try_load_fixture_with(bsp, multitexture, cvars).expect("fixture should load")
}

pub fn load_fixture(bsp: &[u8], multitexture: bool) -> Fixture {
    load_fixture_with(bsp, multitexture, &[])
}

pub fn try_load_fixture(bsp: &[u8]) -> Result<Fixture, LoadError> {
    try_load_fixture_with(bsp, true, &[])
}

pub fn load_world_fixture(files: &[(&str, Vec<u8>)], tiles: &str, positions: &str) -> Result<Fixture, LoadError> {
    FixtureBuilder::world(files, tiles, positions).build()
}
