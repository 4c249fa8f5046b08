// r_model.rs — map tile loading
//
// A tile is read lump by lump into a `Tile`. Faces are measured, given a
// static lightmap block and turned into polygons while loading, then the
// whole tile is moved to its place in the world.

use ufobsp_common::common::{com_dprintf, com_wprintf, crc_block};
use ufobsp_common::q_shared::{dot_product, radius_from_bounds, vector_add, CPlane, Vec3};
use ufobsp_common::qfiles::*;

use crate::qgl::{GraphicsApi, TextureResolver};
use crate::r_error::LoadError;
use crate::r_image::{ImageTable, NOTEXTURE};
use crate::r_lightmap::LightmapState;
use crate::r_model_types::*;
use crate::r_rmain::RenderConfig;
use crate::r_rsurf::build_polygon_from_surface;
use crate::r_warp::r_subdivide_surface;

/// Luxels along one axis of a face, far beyond any page size.
const MAX_SURFACE_LUXELS: f32 = 65536.0;
/// Texture coordinates must stay well inside `i32` once shifted.
const MAX_TEXTURE_COORD: f32 = (1 << 30) as f32;

/// Shared state while loading one tile.
struct Loader<'a> {
    name: &'a str,
    buf: &'a [u8],
    header: DHeader,
    tile: Tile,
}

impl<'a> Loader<'a> {
    fn lump_bytes(&self, lump: usize) -> Result<&'a [u8], LoadError> {
        let l = self.header.lumps[lump];
        let bad = || LoadError::LumpOutOfBounds { name: self.name.to_string(), lump };
        let ofs = usize::try_from(l.fileofs).map_err(|_| bad())?;
        let len = usize::try_from(l.filelen).map_err(|_| bad())?;
        let end = ofs.checked_add(len).ok_or_else(bad)?;
        self.buf.get(ofs..end).ok_or_else(bad)
    }

    fn records<T: DiskRecord>(&self, lump: usize, what: &'static str, max: usize) -> Result<Vec<T>, LoadError> {
        let data = self.lump_bytes(lump)?;
        let size = std::mem::size_of::<T>();
        if data.len() % size != 0 {
            return Err(LoadError::FunnyLumpSize { name: self.name.to_string(), what });
        }
        let count = data.len() / size;
        if count > max {
            return Err(self.too_large(what, count, max));
        }
        Ok(read_records(data))
    }

    fn too_large(&self, what: &'static str, count: usize, max: usize) -> LoadError {
        LoadError::LumpTooLarge { name: self.name.to_string(), what, count, max }
    }

    fn bad_index(&self, what: &'static str, index: i64) -> LoadError {
        LoadError::BadIndex { name: self.name.to_string(), what, index }
    }

    fn load_vertexes(&mut self) -> Result<(), LoadError> {
        let input: Vec<DVertex> = self.records(LUMP_VERTEXES, "vertexes", MAX_MAP_VERTS)?;
        self.tile.vertexes = input.iter().map(|v| MVertex { position: v.point }).collect();
        com_dprintf(&format!("...verts: {}\n", self.tile.vertexes.len()));
        Ok(())
    }

    fn load_edges(&mut self) -> Result<(), LoadError> {
        let input: Vec<DEdge> = self.records(LUMP_EDGES, "edges", MAX_MAP_EDGES)?;
        let numverts = self.tile.vertexes.len();
        if let Some(e) = input.iter().find(|e| e.v.iter().any(|&v| v as usize >= numverts)) {
            return Err(self.bad_index("edge vertex", e.v[0].max(e.v[1]) as i64));
        }
        self.tile.edges = input.iter().map(|e| MEdge { v: e.v }).collect();
        com_dprintf(&format!("...edges: {}\n", self.tile.edges.len()));
        Ok(())
    }

    fn load_surfedges(&mut self) -> Result<(), LoadError> {
        let input: Vec<i32> = self.records(LUMP_SURFEDGES, "surfedges", MAX_MAP_SURFEDGES)?;
        if !(1..MAX_MAP_SURFEDGES).contains(&input.len()) {
            return Err(LoadError::BadSurfedgeCount { name: self.name.to_string(), count: input.len() });
        }
        let numedges = self.tile.edges.len() as i64;
        if let Some(&e) = input.iter().find(|&&e| (e as i64).abs() >= numedges) {
            return Err(self.bad_index("surfedge", e as i64));
        }
        self.tile.surfedges = input;
        com_dprintf(&format!("...surfedges: {}\n", self.tile.surfedges.len()));
        Ok(())
    }

    fn load_lighting(&mut self, config: &RenderConfig) -> Result<(), LoadError> {
        let data = self.lump_bytes(LUMP_LIGHTING)?;
        if data.len() > MAX_MAP_LIGHTING {
            return Err(self.too_large("lighting", data.len(), MAX_MAP_LIGHTING));
        }
        match data.first() {
            Some(&q) => {
                if q > MAX_LIGHTQUANT {
                    return Err(LoadError::BadLightQuant { name: self.name.to_string(), quant: q });
                }
                self.tile.lightquant = q;
                self.tile.lightdata = data.to_vec();
            }
            None => {
                self.tile.lightquant = config.default_lightquant;
                self.tile.lightdata = Vec::new();
            }
        }
        com_dprintf(&format!("...lightquant: {}\n", self.tile.lightquant));
        Ok(())
    }

    fn load_planes(&mut self) -> Result<(), LoadError> {
        let input: Vec<DPlane> = self.records(LUMP_PLANES, "planes", MAX_MAP_PLANES)?;
        self.tile.planes = input
            .iter()
            .map(|p| CPlane::new(p.normal, p.dist, p.plane_type as u8))
            .collect();
        com_dprintf(&format!("...planes: {}\n", self.tile.planes.len()));
        Ok(())
    }

    fn load_texinfo<R: TextureResolver + ?Sized>(
        &mut self,
        resolver: &mut R,
        images: &mut ImageTable,
    ) -> Result<(), LoadError> {
        let input: Vec<TexInfo> = self.records(LUMP_TEXINFO, "texinfo", MAX_MAP_TEXINFO)?;
        let count = input.len();

        let mut out = Vec::with_capacity(count);
        for ti in &input {
            let next = if ti.nexttexinfo > 0 {
                if ti.nexttexinfo as usize >= count {
                    return Err(self.bad_index("texinfo", ti.nexttexinfo as i64));
                }
                Some(ti.nexttexinfo as usize)
            } else {
                None
            };

            let path = texture_path(ti);
            let image = match images.find_image(resolver, &path) {
                Some(i) => i,
                None => {
                    com_wprintf(&format!("Couldn't load {}\n", path));
                    NOTEXTURE
                }
            };

            out.push(MTexInfo {
                vecs: ti.vecs,
                flags: TexFlags::from_bits_retain(ti.flags),
                next,
                numframes: 1,
                image,
            });
        }

        // count animation frames
        for i in 0..count {
            let mut step = out[i].next;
            let mut frames = 1;
            while let Some(s) = step {
                if s == i || frames > count {
                    break;
                }
                frames += 1;
                step = out[s].next;
            }
            out[i].numframes = frames as i32;
        }

        self.tile.texinfo = out;
        com_dprintf(&format!("...texinfo: {}\n", count));
        Ok(())
    }

    /// Texture extents of a face in luxel-aligned units.
    fn calc_surface_extents(&self, surf: &mut MSurface, face: usize) -> Result<(), LoadError> {
        let mut mins = [999999.0f32; 2];
        let mut maxs = [-99999.0f32; 2];
        let tex = &self.tile.texinfo[surf.texinfo];

        for i in 0..surf.numedges {
            let v = self.tile.surf_vertex(surf, i);
            for j in 0..2 {
                let val = tex.project(&v, j);
                mins[j] = mins[j].min(val);
                maxs[j] = maxs[j].max(val);
            }
        }

        let luxel = (1 << surf.lquant) as f32;
        for i in 0..2 {
            let bmins = (mins[i] / luxel).floor();
            let bmaxs = (maxs[i] / luxel).ceil();
            let span = bmaxs - bmins;
            // inverted when the face has no vertices
            if !(0.0..=MAX_SURFACE_LUXELS).contains(&span) || !((bmins * luxel).abs() < MAX_TEXTURE_COORD) {
                return Err(LoadError::BadExtents { name: self.name.to_string(), face });
            }
            surf.texturemins[i] = (bmins as i32) << surf.lquant;
            surf.extents[i] = (span as i32) << surf.lquant;
        }
        Ok(())
    }

    fn load_faces<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        images: &ImageTable,
        lightmaps: &mut LightmapState,
        config: &RenderConfig,
    ) -> Result<(), LoadError> {
        let input: Vec<DFace> = self.records(LUMP_FACES, "faces", MAX_MAP_FACES)?;
        self.tile.surfaces = Vec::with_capacity(input.len());

        for (surfnum, face) in input.iter().enumerate() {
            let plane = face.planenum as usize;
            if plane >= self.tile.planes.len() {
                return Err(self.bad_index("plane", plane as i64));
            }
            let texinfo = usize::try_from(face.texinfo)
                .ok()
                .filter(|&t| t < self.tile.texinfo.len())
                .ok_or_else(|| self.bad_index("texinfo", face.texinfo as i64))?;
            let firstedge = usize::try_from(face.firstedge)
                .map_err(|_| self.bad_index("firstedge", face.firstedge as i64))?;
            let numedges = usize::try_from(face.numedges)
                .ok()
                .filter(|&n| firstedge + n <= self.tile.surfedges.len())
                .ok_or_else(|| self.bad_index("numedges", face.numedges as i64))?;

            let mut surf = MSurface {
                plane,
                flags: if face.side != 0 { SurfFlags::PLANEBACK } else { SurfFlags::empty() },
                firstedge,
                numedges,
                texturemins: [0; 2],
                extents: [0; 2],
                lquant: self.tile.lightquant,
                texinfo,
                polys: Vec::new(),
                lightmap: None,
                dlight_s: 0,
                dlight_t: 0,
                styles: face.styles,
                cached_light: [0.0; MAXLIGHTMAPS],
                samples: None,
                dlightframe: 0,
                dlightbits: 0,
            };

            self.calc_surface_extents(&mut surf, surfnum)?;

            // lighting info
            if face.lightofs >= 0 && !self.tile.lightdata.is_empty() {
                surf.samples = Some(face.lightofs as usize);
            }

            let flags = self.tile.texinfo[texinfo].flags;
            if flags.contains(TexFlags::WARP) {
                surf.flags |= SurfFlags::DRAWTURB;
                surf.extents = [16384; 2];
                surf.texturemins = [-8192; 2];
                surf.polys = r_subdivide_surface(&self.tile, &surf); // cut up polygon for warps
            }

            let lightmapped = !flags.intersects(TexFlags::TRANSLUCENT | TexFlags::WARP);
            if lightmapped {
                if let Some(ofs) = surf.samples {
                    let (smax, tmax) = surf.lightmap_size();
                    let len = surf.num_styles() * smax as usize * tmax as usize * 3;
                    if ofs + len > self.tile.lightdata.len() {
                        return Err(LoadError::BadLightOffset { name: self.name.to_string(), face: surfnum });
                    }
                }
            }

            self.tile.surfaces.push(surf);

            // create lightmaps and polygons
            if lightmapped {
                lightmaps.create_surface_lightmap(api, &mut self.tile, surfnum, config.modulate)?;
            }
            if !flags.contains(TexFlags::WARP) {
                let surf = &self.tile.surfaces[surfnum];
                let image = images.get(self.tile.texinfo[texinfo].image);
                let poly = build_polygon_from_surface(&self.tile, surf, image, lightmaps.block_size());
                self.tile.surfaces[surfnum].polys = vec![poly];
            }
        }

        com_dprintf(&format!("...faces: {}\n", self.tile.surfaces.len()));
        Ok(())
    }

    /// Move vertices and planes from tile space to world space.
    fn shift_tile(&mut self, shift: &Vec3) {
        for v in self.tile.vertexes.iter_mut() {
            v.position = vector_add(&v.position, shift);
        }
        for p in self.tile.planes.iter_mut() {
            p.dist += dot_product(&p.normal, shift);
        }
    }

    fn load_marksurfaces(&mut self) -> Result<(), LoadError> {
        let input: Vec<u16> = self.records(LUMP_LEAFFACES, "leaffaces", MAX_MAP_LEAFFACES)?;
        let numsurfaces = self.tile.surfaces.len();
        if let Some(&j) = input.iter().find(|&&j| j as usize >= numsurfaces) {
            return Err(self.bad_index("marksurface", j as i64));
        }
        self.tile.marksurfaces = input.into_iter().map(|j| j as usize).collect();
        Ok(())
    }

    fn load_leafs(&mut self, shift: &Vec3) -> Result<(), LoadError> {
        let input: Vec<DLeaf> = self.records(LUMP_LEAFS, "leafs", MAX_MAP_LEAFS)?;
        let nummark = self.tile.marksurfaces.len();

        let mut out = Vec::with_capacity(input.len());
        for l in &input {
            let first = l.firstleafface as usize;
            let num = l.numleaffaces as usize;
            if first + num > nummark {
                return Err(self.bad_index("leafface", (first + num) as i64));
            }
            out.push(MLeaf {
                contents: Contents::from_bits_retain(l.contents),
                cluster: l.cluster as i32,
                area: l.area as i32,
                mins: bounds_to_world(&l.mins, shift),
                maxs: bounds_to_world(&l.maxs, shift),
                parent: None,
                firstmarksurface: first,
                nummarksurfaces: num,
            });
        }

        self.tile.leafs = out;
        com_dprintf(&format!("...leafs: {}\n", self.tile.leafs.len()));
        Ok(())
    }

    fn load_nodes(&mut self, shift: &Vec3) -> Result<(), LoadError> {
        let input: Vec<DNode> = self.records(LUMP_NODES, "nodes", MAX_MAP_NODES)?;
        let (numnodes, numleafs) = (input.len(), self.tile.leafs.len());

        let mut out = Vec::with_capacity(numnodes);
        for n in &input {
            let plane = match n.planenum {
                -1 => None,
                p if p >= 0 && (p as usize) < self.tile.planes.len() => Some(p as usize),
                p => return Err(self.bad_index("node plane", p as i64)),
            };

            let mut children = [NodeRef::Leaf(0); 2];
            for (j, &c) in n.children.iter().enumerate() {
                children[j] = match NodeRef::from_disk(c) {
                    NodeRef::Node(i) if i < numnodes => NodeRef::Node(i),
                    NodeRef::Leaf(i) if i < numleafs => NodeRef::Leaf(i),
                    _ => return Err(self.bad_index("node child", c as i64)),
                };
            }

            let first = n.firstface as usize;
            if first + n.numfaces as usize > self.tile.surfaces.len() {
                return Err(self.bad_index("node face", (first + n.numfaces as usize) as i64));
            }

            out.push(MNode {
                plane,
                children,
                mins: bounds_to_world(&n.mins, shift),
                maxs: bounds_to_world(&n.maxs, shift),
                parent: None,
                firstsurface: first,
                numsurfaces: n.numfaces as usize,
            });
        }

        self.tile.nodes = out;
        com_dprintf(&format!("...nodes: {}\n", self.tile.nodes.len()));
        Ok(())
    }

    fn load_submodels(&mut self, shift: &Vec3) -> Result<(), LoadError> {
        let input: Vec<DModel> = self.records(LUMP_MODELS, "models", MAX_MAP_MODELS)?;
        if input.is_empty() {
            return Err(LoadError::NoSubmodels { name: self.name.to_string() });
        }

        let mut out = Vec::with_capacity(input.len());
        for (i, m) in input.iter().enumerate() {
            let headnode = usize::try_from(m.headnode)
                .ok()
                .filter(|&h| h < self.tile.nodes.len())
                .ok_or_else(|| LoadError::BadHeadnode { name: self.name.to_string(), model: i })?;
            let firstface = usize::try_from(m.firstface).unwrap_or(usize::MAX);
            let numfaces = usize::try_from(m.numfaces).unwrap_or(usize::MAX);
            if firstface.saturating_add(numfaces) > self.tile.surfaces.len() {
                return Err(self.bad_index("model face", m.firstface as i64));
            }

            let mut mins = [0.0; 3];
            let mut maxs = [0.0; 3];
            let mut origin = [0.0; 3];
            for j in 0..3 {
                // spread the mins / maxs by a pixel
                mins[j] = m.mins[j] - 1.0 + shift[j];
                maxs[j] = m.maxs[j] + 1.0 + shift[j];
                origin[j] = m.origin[j] + shift[j];
            }

            out.push(MModel {
                mins,
                maxs,
                origin,
                radius: radius_from_bounds(&mins, &maxs),
                headnode,
                firstface,
                numfaces,
            });
        }

        self.tile.submodels = out;
        // sets nodes and leafs
        for i in 0..self.tile.submodels.len() {
            let head = self.tile.submodels[i].headnode;
            mod_set_parent(&mut self.tile, head);
        }
        com_dprintf(&format!("...submodels: {}\n", self.tile.submodels.len()));
        Ok(())
    }
}

fn bounds_to_world(b: &[i16; 3], shift: &Vec3) -> Vec3 {
    [b[0] as f32 + shift[0], b[1] as f32 + shift[1], b[2] as f32 + shift[2]]
}

/// Record the parent of every node and leaf reachable from `root`.
fn mod_set_parent(tile: &mut Tile, root: usize) {
    let mut seen = vec![false; tile.nodes.len()];
    let mut stack = vec![(NodeRef::Node(root), None)];
    while let Some((node, parent)) = stack.pop() {
        match node {
            NodeRef::Leaf(l) => tile.leafs[l].parent = parent,
            NodeRef::Node(n) => {
                if seen[n] {
                    continue;
                }
                seen[n] = true;
                tile.nodes[n].parent = parent;
                for &child in tile.nodes[n].children.iter().rev() {
                    stack.push((child, Some(n)));
                }
            }
        }
    }
}

fn texture_path(ti: &TexInfo) -> String {
    format!("textures/{}", ti.texture_name())
}

/// Game paths of the textures a tile refers to, without duplicates. Lets a
/// caller decode images ahead of loading; an unreadable tile yields none.
pub fn tile_texture_paths(buf: &[u8]) -> Vec<String> {
    let Some(header) = read_header(buf).filter(|h| h.ident == IDBSPHEADER) else {
        return Vec::new();
    };
    let l = header.lumps[LUMP_TEXINFO];
    let (Ok(ofs), Ok(len)) = (usize::try_from(l.fileofs), usize::try_from(l.filelen)) else {
        return Vec::new();
    };
    let Some(data) = ofs.checked_add(len).and_then(|end| buf.get(ofs..end)) else {
        return Vec::new();
    };

    let mut out: Vec<String> = Vec::new();
    for ti in read_records::<TexInfo>(data) {
        let path = texture_path(&ti);
        if !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

/// Load one map tile from `buf` and place it at `shift`.
///
/// Static lightmaps are packed into `lightmaps`; the caller brackets a
/// world's tiles with `begin_building` / `end_building`.
pub fn mod_load_brush_model<A, R>(
    api: &mut A,
    resolver: &mut R,
    images: &mut ImageTable,
    lightmaps: &mut LightmapState,
    config: &RenderConfig,
    name: &str,
    buf: &[u8],
    shift: Vec3,
) -> Result<Tile, LoadError>
where
    A: GraphicsApi + ?Sized,
    R: TextureResolver + ?Sized,
{
    let header = read_header(buf).ok_or_else(|| LoadError::BadIdent { name: name.to_string() })?;
    if header.ident != IDBSPHEADER {
        return Err(LoadError::BadIdent { name: name.to_string() });
    }
    if header.version != BSPVERSION {
        return Err(LoadError::BadVersion { name: name.to_string(), found: header.version, expected: BSPVERSION });
    }

    let mut ld = Loader {
        name,
        buf,
        header,
        tile: Tile {
            name: name.to_string(),
            shift,
            checksum: crc_block(buf),
            lightquant: config.default_lightquant,
            planes: Vec::new(),
            vertexes: Vec::new(),
            edges: Vec::new(),
            surfedges: Vec::new(),
            texinfo: Vec::new(),
            surfaces: Vec::new(),
            marksurfaces: Vec::new(),
            leafs: Vec::new(),
            nodes: Vec::new(),
            submodels: Vec::new(),
            lightdata: Vec::new(),
        },
    };

    // load into heap
    ld.load_vertexes()?;
    ld.load_edges()?;
    ld.load_surfedges()?;
    ld.load_lighting(config)?;
    ld.load_planes()?;
    ld.load_texinfo(resolver, images)?;
    ld.load_faces(api, images, lightmaps, config)?;
    ld.shift_tile(&shift);
    ld.load_marksurfaces()?;
    ld.load_leafs(&shift)?;
    ld.load_nodes(&shift)?;
    ld.load_submodels(&shift)?;

    com_dprintf(&format!(
        "{}: checksum {:04x}, shift ({} {} {})\n",
        name, ld.tile.checksum, shift[0], shift[1], shift[2]
    ));
    Ok(ld.tile)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_load_two_leaf_tile() {
        let fx = load_fixture(&two_leaf_bsp(), true);
        let tile = &fx.world.tiles[0];

        assert_eq!(tile.lightquant, 4);
        assert_eq!(tile.surfaces.len(), 2);
        assert_eq!(tile.leafs.len(), 2);
        assert_eq!(tile.nodes.len(), 1);
        assert_eq!(tile.submodels.len(), 1);
        assert_eq!(tile.submodels[0].headnode, 0);

        let s0 = &tile.surfaces[0];
        assert_eq!(s0.texturemins, [-32, -32]);
        assert_eq!(s0.extents, [64, 64]);
        assert_eq!(s0.lightmap_size(), (5, 5));
        assert_eq!(s0.samples, Some(1));
        assert!(!s0.flags.contains(SurfFlags::PLANEBACK));
        assert!(tile.surfaces[1].flags.contains(SurfFlags::PLANEBACK));

        assert_eq!(tile.leafs[0].parent, Some(0));
        assert_eq!(tile.leafs[1].parent, Some(0));
        assert_eq!(tile.nodes[0].parent, None);
        assert_eq!(tile.nodes[0].plane, Some(0));
        assert_eq!(tile.nodes[0].children, [NodeRef::Leaf(0), NodeRef::Leaf(1)]);

        // submodel bounds are spread by one unit
        assert_eq!(tile.submodels[0].mins, [-33.0; 3]);
        assert_eq!(tile.submodels[0].maxs, [33.0; 3]);
    }

    #[test]
    fn test_loading_twice_is_identical() {
        let a = load_fixture(&two_leaf_bsp(), true);
        let b = load_fixture(&two_leaf_bsp(), true);
        assert_eq!(a.world.tiles[0], b.world.tiles[0]);
    }

    #[test]
    fn test_shift_moves_geometry() {
        let plain = load_fixture(&two_leaf_bsp(), true);
        let moved = load_world_fixture(&[("a", two_leaf_bsp())], "a", "2 1").unwrap();
        let (p, m) = (&plain.world.tiles[0], &moved.world.tiles[0]);
        assert_eq!(m.shift, [64.0, 32.0, 0.0]);

        for (a, b) in p.vertexes.iter().zip(&m.vertexes) {
            assert_eq!(vector_add(&a.position, &m.shift), b.position);
        }
        // the splitting plane is x = 0 in tile space
        assert_eq!(m.planes[0].dist, 64.0);
        assert_eq!(m.leafs[0].mins, [64.0, 0.0, -32.0]);
        assert_eq!(m.nodes[0].maxs, [96.0, 64.0, 32.0]);
        // texture space does not move
        assert_eq!(p.surfaces[0].texturemins, m.surfaces[0].texturemins);
        for (a, b) in p.surfaces[0].polys[0].verts.iter().zip(&m.surfaces[0].polys[0].verts) {
            assert_eq!(a.st, b.st);
            assert_eq!(vector_add(&a.pos, &m.shift), b.pos);
        }
    }

    #[test]
    fn test_tile_texture_paths() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.texinfo.push(bsp.texinfo[0]);
        assert_eq!(tile_texture_paths(&bsp.to_bytes()), vec!["textures/tex/a", "textures/tex/b"]);
        assert!(tile_texture_paths(b"nope").is_empty());
    }

    #[test]
    fn test_missing_texture_uses_placeholder() {
        let mut fx = FixtureBuilder::new(two_leaf_bsp()).textures(&["textures/tex/a"]).build().unwrap();
        let tile = fx.world.tiles.remove(0);
        assert_ne!(tile.texinfo[0].image, NOTEXTURE);
        assert_eq!(tile.texinfo[1].image, NOTEXTURE);
    }

    #[test]
    fn test_animation_ring_length() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.texinfo[0].nexttexinfo = 1;
        bsp.texinfo[1].nexttexinfo = 0; // 0 ends the chain
        let fx = load_fixture(&bsp.to_bytes(), true);
        let ti = &fx.world.tiles[0].texinfo;
        assert_eq!(ti[0].next, Some(1));
        assert_eq!(ti[0].numframes, 2);
        assert_eq!(ti[1].next, None);
        assert_eq!(ti[1].numframes, 1);
    }

    #[test]
    fn test_translucent_face_gets_no_lightmap() {
        let fx = load_fixture(&two_leaf_bsp_with(TexFlags::empty(), TexFlags::TRANS33), true);
        let tile = &fx.world.tiles[0];
        assert!(tile.surfaces[0].lightmap.is_some());
        assert!(tile.surfaces[1].lightmap.is_none());
        assert_eq!(tile.surfaces[1].polys.len(), 1);
        assert!(tile.surfaces[1].polys[0].verts.iter().all(|v| v.lm == [0.0, 0.0]));
    }

    #[test]
    fn test_empty_lighting_uses_default_quant() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.lighting.clear();
        let fx = FixtureBuilder::new(bsp.to_bytes()).cvar("r_default_lightquant", "3").build().unwrap();
        let s = &fx.world.tiles[0].surfaces[0];
        assert_eq!(fx.world.tiles[0].lightquant, 3);
        assert_eq!(s.samples, None);
        assert_eq!(s.lightmap_size(), (9, 9));
    }

    // ============================================================
    // Errors
    // ============================================================

    #[test]
    fn test_bad_version() {
        let mut bytes = two_leaf_bsp();
        bytes[4..8].copy_from_slice(&38i32.to_le_bytes());
        let err = try_load_fixture(&bytes).unwrap_err();
        assert_eq!(err, LoadError::BadVersion { name: "maps/t.bsp".into(), found: 38, expected: 71 });
    }

    #[test]
    fn test_bad_ident() {
        let mut bytes = two_leaf_bsp();
        bytes[0] = b'X';
        assert!(matches!(try_load_fixture(&bytes), Err(LoadError::BadIdent { .. })));
        assert!(matches!(try_load_fixture(&bytes[..10]), Err(LoadError::BadIdent { .. })));
    }

    #[test]
    fn test_funny_lump_size() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.raw_lumps.push((LUMP_VERTEXES, vec![0u8; 13]));
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert_eq!(err, LoadError::FunnyLumpSize { name: "maps/t.bsp".into(), what: "vertexes" });
    }

    #[test]
    fn test_lump_out_of_bounds() {
        let bytes = two_leaf_bsp();
        let cut = &bytes[..bytes.len() - 4];
        assert!(matches!(try_load_fixture(cut), Err(LoadError::LumpOutOfBounds { .. })));
    }

    #[test]
    fn test_no_surfedges() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.surfedges.clear();
        bsp.faces.clear();
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::BadSurfedgeCount { count: 0, .. }));
    }

    #[test]
    fn test_bad_texinfo_index() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.faces[1].texinfo = 7;
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::BadIndex { what: "texinfo", index: 7, .. }));
    }

    #[test]
    fn test_bad_marksurface() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.leaffaces[1] = 9;
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::BadIndex { what: "marksurface", index: 9, .. }));
    }

    #[test]
    fn test_bad_light_offset() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.faces[1].lightofs = 100;
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert_eq!(err, LoadError::BadLightOffset { name: "maps/t.bsp".into(), face: 1 });
    }

    #[test]
    fn test_bad_light_quant() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.lighting[0] = 40;
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert_eq!(err, LoadError::BadLightQuant { name: "maps/t.bsp".into(), quant: 40 });

        // the largest accepted quant: 1024 unit luxels, the wall spans two
        bsp.lighting[0] = MAX_LIGHTQUANT;
        let fx = load_fixture(&bsp.to_bytes(), true);
        let tile = &fx.world.tiles[0];
        assert_eq!(tile.lightquant, MAX_LIGHTQUANT);
        assert_eq!(tile.surfaces[0].lightmap_size(), (3, 3));
    }

    #[test]
    fn test_face_without_edges_has_bad_extents() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.faces[1].numedges = 0;
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert_eq!(err, LoadError::BadExtents { name: "maps/t.bsp".into(), face: 1 });
    }

    #[test]
    fn test_huge_texture_vectors_have_bad_extents() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.texinfo[0].vecs[0][1] = 1.0e30;
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert_eq!(err, LoadError::BadExtents { name: "maps/t.bsp".into(), face: 0 });
    }

    #[test]
    fn test_lump_record_limits() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.vertexes = vec![DVertex { point: [0.0; 3] }; MAX_MAP_VERTS + 1];
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert_eq!(
            err,
            LoadError::LumpTooLarge {
                name: "maps/t.bsp".into(),
                what: "vertexes",
                count: MAX_MAP_VERTS + 1,
                max: MAX_MAP_VERTS
            }
        );

        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        let world_model = bsp.models[0];
        bsp.models = vec![world_model; MAX_MAP_MODELS + 1];
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::LumpTooLarge { what: "models", .. }));
    }

    #[test]
    fn test_missing_world_model() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.models.clear();
        assert!(matches!(try_load_fixture(&bsp.to_bytes()), Err(LoadError::NoSubmodels { .. })));
    }

    #[test]
    fn test_bad_headnode() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.models[0].headnode = 3;
        let err = try_load_fixture(&bsp.to_bytes()).unwrap_err();
        assert_eq!(err, LoadError::BadHeadnode { name: "maps/t.bsp".into(), model: 0 });
    }

    #[test]
    fn test_planeless_node_allowed() {
        let mut bsp = BspBuilder::two_leaf(TexFlags::empty(), TexFlags::empty());
        bsp.nodes[0].planenum = -1;
        bsp.nodes[0].numfaces = 0;
        let fx = load_fixture(&bsp.to_bytes(), true);
        assert_eq!(fx.world.tiles[0].nodes[0].plane, None);
    }
}
