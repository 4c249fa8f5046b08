// r_model_types.rs — in-memory map tile structures
//
// d* structures in ufobsp_common::qfiles are the on-disk representations,
// m* structures here are what the renderer walks. Everything a tile owns is
// addressed by index into the tile's own arrays.

use bitflags::bitflags;

use ufobsp_common::q_shared::{CPlane, Vec3};
use ufobsp_common::qfiles::{Contents, TexFlags, MAXLIGHTMAPS, STYLE_NONE};

use crate::qgl::{PolyVert, TextureHandle};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SurfFlags: i32 {
        const PLANEBACK = 0x2;
        const DRAWTURB = 0x10;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MVertex {
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MEdge {
    pub v: [u16; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MTexInfo {
    pub vecs: [[f32; 4]; 2],
    pub flags: TexFlags,
    /// next texinfo of an animation ring
    pub next: Option<usize>,
    pub numframes: i32,
    /// index into the world image table
    pub image: usize,
}

impl MTexInfo {
    #[inline]
    pub fn axis(&self, i: usize) -> Vec3 {
        [self.vecs[i][0], self.vecs[i][1], self.vecs[i][2]]
    }

    /// Texture space coordinate of `v` along axis `i`, including the offset.
    #[inline]
    pub fn project(&self, v: &Vec3, i: usize) -> f32 {
        v[0] * self.vecs[i][0] + v[1] * self.vecs[i][1] + v[2] * self.vecs[i][2] + self.vecs[i][3]
    }
}

/// A triangle fan, already in world space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlPoly {
    pub verts: Vec<PolyVert>,
}

/// Position of a static lightmap block. Never changes after load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightmapBlock {
    pub page: usize,
    pub s: i32,
    pub t: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MSurface {
    pub plane: usize,
    pub flags: SurfFlags,

    pub firstedge: usize, // look up in tile surfedges, negative numbers are backwards edges
    pub numedges: usize,

    pub texturemins: [i32; 2],
    pub extents: [i32; 2],
    /// luxel size is 1 << lquant texture units
    pub lquant: u8,

    pub texinfo: usize,
    pub polys: Vec<GlPoly>,

    pub lightmap: Option<LightmapBlock>,
    /// origin of this frame's block in the dynamic page
    pub dlight_s: i32,
    pub dlight_t: i32,

    pub styles: [u8; MAXLIGHTMAPS],
    /// style intensity baked into the uploaded lightmap
    pub cached_light: [f32; MAXLIGHTMAPS],
    /// offset into the tile light data
    pub samples: Option<usize>,

    pub dlightframe: i32,
    pub dlightbits: u32,
}

impl MSurface {
    /// Lightmap block size in luxels.
    #[inline]
    pub fn lightmap_size(&self) -> (i32, i32) {
        ((self.extents[0] >> self.lquant) + 1, (self.extents[1] >> self.lquant) + 1)
    }

    /// Number of light styles stored for this face.
    pub fn num_styles(&self) -> usize {
        self.styles.iter().take_while(|&&s| s != STYLE_NONE).count()
    }
}

/// Child of a node: another node or a leaf, both indices into the
/// owning tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(usize),
    Leaf(usize),
}

impl NodeRef {
    /// Decode a disk child number: negative numbers are -(leaf + 1).
    pub fn from_disk(child: i32) -> NodeRef {
        if child >= 0 {
            NodeRef::Node(child as usize)
        } else {
            NodeRef::Leaf((-1 - child) as usize)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MNode {
    /// None for nodes that only group level subtrees
    pub plane: Option<usize>,
    pub children: [NodeRef; 2],
    pub mins: Vec3,
    pub maxs: Vec3,
    pub parent: Option<usize>,

    pub firstsurface: usize,
    pub numsurfaces: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MLeaf {
    pub contents: Contents,
    pub cluster: i32,
    pub area: i32,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub parent: Option<usize>,

    pub firstmarksurface: usize,
    pub nummarksurfaces: usize,
}

impl MLeaf {
    #[inline]
    pub fn is_solid(&self) -> bool {
        self.contents.contains(Contents::SOLID)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub radius: f32,
    pub headnode: usize,
    pub firstface: usize,
    pub numfaces: usize,
}

/// One loaded map file placed in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub name: String,
    pub shift: Vec3,
    pub checksum: u16,
    pub lightquant: u8,

    pub planes: Vec<CPlane>,
    pub vertexes: Vec<MVertex>,
    pub edges: Vec<MEdge>,
    pub surfedges: Vec<i32>,
    pub texinfo: Vec<MTexInfo>,
    pub surfaces: Vec<MSurface>,
    pub marksurfaces: Vec<usize>,
    pub leafs: Vec<MLeaf>,
    pub nodes: Vec<MNode>,
    pub submodels: Vec<MModel>,
    pub lightdata: Vec<u8>,
}

/// Submodels below this index are level brushes drawn with the world.
pub const NUM_LEVEL_BRUSHES: usize = 256;

impl Tile {
    /// Head nodes of the level brushes shown at `worldlevel`: submodel 0
    /// always, then every brush whose index shares a bit with the level.
    pub fn level_headnodes(&self, worldlevel: i32) -> impl Iterator<Item = NodeRef> + '_ {
        let mask = 1u32.checked_shl(worldlevel.max(0) as u32).unwrap_or(0);
        self.submodels
            .iter()
            .enumerate()
            .take(NUM_LEVEL_BRUSHES)
            .filter(move |&(i, model)| (i == 0 || (i as u32) & mask != 0) && model.numfaces > 0)
            .map(|(_, model)| NodeRef::Node(model.headnode))
    }

    /// Bounds of a node or leaf.
    pub fn bounds(&self, r: NodeRef) -> (&Vec3, &Vec3) {
        match r {
            NodeRef::Node(n) => (&self.nodes[n].mins, &self.nodes[n].maxs),
            NodeRef::Leaf(l) => (&self.leafs[l].mins, &self.leafs[l].maxs),
        }
    }

    /// Vertex at position `i` of a face's edge loop, honouring edge winding.
    pub fn surf_vertex(&self, surf: &MSurface, i: usize) -> Vec3 {
        let lindex = self.surfedges[surf.firstedge + i];
        let v = if lindex >= 0 {
            self.edges[lindex as usize].v[0]
        } else {
            self.edges[(-lindex) as usize].v[1]
        };
        self.vertexes[v as usize].position
    }
}

/// A texture known to the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Reference to one face of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfRef {
    pub tile: usize,
    pub surf: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ref_from_disk() {
        assert_eq!(NodeRef::from_disk(0), NodeRef::Node(0));
        assert_eq!(NodeRef::from_disk(5), NodeRef::Node(5));
        assert_eq!(NodeRef::from_disk(-1), NodeRef::Leaf(0));
        assert_eq!(NodeRef::from_disk(-3), NodeRef::Leaf(2));
    }

    #[test]
    fn test_surface_flag_values() {
        assert_eq!(SurfFlags::PLANEBACK.bits(), 2);
        assert_eq!(SurfFlags::DRAWTURB.bits(), 0x10);
    }

    #[test]
    fn test_texinfo_project() {
        let ti = MTexInfo {
            vecs: [[1.0, 0.0, 0.0, 8.0], [0.0, 0.5, 0.0, -2.0]],
            flags: TexFlags::empty(),
            next: None,
            numframes: 1,
            image: 0,
        };
        assert_eq!(ti.project(&[3.0, 4.0, 9.0], 0), 11.0);
        assert_eq!(ti.project(&[3.0, 4.0, 9.0], 1), 0.0);
        assert_eq!(ti.axis(1), [0.0, 0.5, 0.0]);
    }
}
