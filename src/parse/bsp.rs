use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use nom::{self, IResult, le_f32, le_i32, le_u32, le_u8};

use super::util::{fixed_length_ascii, naive_eof};
use ::errors::{ErrorKind, Result, INVALID_MAGIC_CODE, nom_to_result};


pub const BSP_MAGIC: &[u8; 4] = b"IBSP";
/// Quake III Arena uses 46; Return to Castle Wolfenstein and friends use 47 with the same layout.
pub const SUPPORTED_VERSIONS: [u32; 2] = [46, 47];
pub const LUMP_COUNT: usize = 17;
pub const HEADER_SIZE: usize = 8 + LUMP_COUNT * 8;

pub const TEXTURE_SIZE: usize = 72;
pub const VERTEX_SIZE: usize = 44;
pub const MESH_VERT_SIZE: usize = 4;
pub const EFFECT_SIZE: usize = 72;
pub const FACE_SIZE: usize = 104;
pub const LIGHTMAP_DIMENSION: usize = 128;
pub const LIGHTMAP_SIZE: usize = LIGHTMAP_DIMENSION * LIGHTMAP_DIMENSION * 3;

/// Texture name meaning "nothing to draw here".
pub const NO_SHADER: &str = "noshader";


/// The lumps, in directory order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LumpKind {
    Entities,
    Textures,
    Planes,
    Nodes,
    Leafs,
    LeafFaces,
    LeafBrushes,
    Models,
    Brushes,
    BrushSides,
    Vertices,
    MeshVerts,
    Effects,
    Faces,
    Lightmaps,
    LightVols,
    VisData,
}

pub static ALL_LUMPS: [LumpKind; LUMP_COUNT] = [
    LumpKind::Entities,
    LumpKind::Textures,
    LumpKind::Planes,
    LumpKind::Nodes,
    LumpKind::Leafs,
    LumpKind::LeafFaces,
    LumpKind::LeafBrushes,
    LumpKind::Models,
    LumpKind::Brushes,
    LumpKind::BrushSides,
    LumpKind::Vertices,
    LumpKind::MeshVerts,
    LumpKind::Effects,
    LumpKind::Faces,
    LumpKind::Lightmaps,
    LumpKind::LightVols,
    LumpKind::VisData,
];

impl LumpKind {
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match *self {
            LumpKind::Entities => "entities",
            LumpKind::Textures => "textures",
            LumpKind::Planes => "planes",
            LumpKind::Nodes => "nodes",
            LumpKind::Leafs => "leafs",
            LumpKind::LeafFaces => "leaf faces",
            LumpKind::LeafBrushes => "leaf brushes",
            LumpKind::Models => "models",
            LumpKind::Brushes => "brushes",
            LumpKind::BrushSides => "brush sides",
            LumpKind::Vertices => "vertices",
            LumpKind::MeshVerts => "mesh verts",
            LumpKind::Effects => "effects",
            LumpKind::Faces => "faces",
            LumpKind::Lightmaps => "lightmaps",
            LumpKind::LightVols => "light volumes",
            LumpKind::VisData => "visdata",
        }
    }
}


bitflags! {
    /// Per-surface flags from the texture lump, as written by q3map.
    pub struct SurfaceFlags: u32 {
        const NODAMAGE = 0x1;
        const SLICK = 0x2;
        const SKY = 0x4;
        const LADDER = 0x8;
        const NOIMPACT = 0x10;
        const NOMARKS = 0x20;
        const FLESH = 0x40;
        const NODRAW = 0x80;
        const HINT = 0x100;
        const SKIP = 0x200;
        const NOLIGHTMAP = 0x400;
        const POINTLIGHT = 0x800;
        const METALSTEPS = 0x1000;
        const NOSTEPS = 0x2000;
        const NONSOLID = 0x4000;
        const LIGHTFILTER = 0x8000;
        const ALPHASHADOW = 0x10000;
        const NODLIGHT = 0x20000;
        const DUST = 0x40000;
    }
}

bitflags! {
    pub struct ContentFlags: u32 {
        const SOLID = 0x1;
        const LAVA = 0x8;
        const SLIME = 0x10;
        const WATER = 0x20;
        const FOG = 0x40;
        const AREAPORTAL = 0x8000;
        const PLAYERCLIP = 0x10000;
        const MONSTERCLIP = 0x20000;
        const TELEPORTER = 0x40000;
        const JUMPPAD = 0x80000;
        const CLUSTERPORTAL = 0x100000;
        const DONOTENTER = 0x200000;
        const BOTCLIP = 0x400000;
        const MOVER = 0x800000;
        const ORIGIN = 0x1000000;
        const BODY = 0x2000000;
        const CORPSE = 0x4000000;
        const DETAIL = 0x8000000;
        const STRUCTURAL = 0x10000000;
        const TRANSLUCENT = 0x20000000;
        const TRIGGER = 0x40000000;
        const NODROP = 0x80000000;
    }
}


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LumpEntry {
    pub offset: u32,
    pub length: u32,
}

impl LumpEntry {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        Ok(())
    }
}

named!(lump_entry<LumpEntry>, do_parse!(
    offset: le_u32 >>
    length: le_u32 >>
    (LumpEntry{ offset, length })
));

#[derive(Clone, Debug)]
pub struct BareBspHeader {
    pub version: u32,
    pub lumps: Vec<LumpEntry>,
}

named!(bsp_header<BareBspHeader>, do_parse!(
    return_error!(
        nom::ErrorKind::Custom(INVALID_MAGIC_CODE),
        tag!(BSP_MAGIC)) >>
    version: le_u32 >>
    lumps: count!(lump_entry, LUMP_COUNT) >>
    (BareBspHeader{ version, lumps })
));


named!(vec2<[f32; 2]>, do_parse!(
    x: le_f32 >> y: le_f32 >>
    ([x, y])
));

named!(vec3<[f32; 3]>, do_parse!(
    x: le_f32 >> y: le_f32 >> z: le_f32 >>
    ([x, y, z])
));

named!(pair_u32<[u32; 2]>, do_parse!(
    a: le_u32 >> b: le_u32 >>
    ([a, b])
));

fn write_floats(writer: &mut Write, values: &[f32]) -> Result<()> {
    for &value in values {
        writer.write_f32::<LittleEndian>(value)?;
    }
    Ok(())
}

fn write_name(writer: &mut Write, name: &str, len: usize) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() > len {
        bail!(ErrorKind::ParseError("name too long to write", bytes.len()));
    }
    writer.write_all(bytes)?;
    for _ in bytes.len()..len {
        writer.write_u8(0)?;
    }
    Ok(())
}


#[derive(Clone, Debug)]
pub struct BareTexture<'a> {
    pub name: &'a str,
    pub flags: SurfaceFlags,
    pub contents: ContentFlags,
}

impl<'a> BareTexture<'a> {
    pub fn is_unbound(&self) -> bool {
        self.name == NO_SHADER
    }

    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        write_name(writer, self.name, 64)?;
        writer.write_u32::<LittleEndian>(self.flags.bits())?;
        writer.write_u32::<LittleEndian>(self.contents.bits())?;
        Ok(())
    }
}

named!(textures_lump<Vec<BareTexture>>, terminated!(many0!(complete!(do_parse!(
    name: call!(fixed_length_ascii, 64) >>
    flags: le_u32 >>
    contents: le_u32 >>
    (BareTexture{
        name,
        flags: SurfaceFlags::from_bits_truncate(flags),
        contents: ContentFlags::from_bits_truncate(contents),
    })
))), naive_eof));


#[derive(Clone, Debug, PartialEq)]
pub struct BareVertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
    pub lightmap_coord: [f32; 2],
    pub normal: [f32; 3],
    pub color: [u8; 4],
}

impl BareVertex {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        write_floats(writer, &self.position)?;
        write_floats(writer, &self.texcoord)?;
        write_floats(writer, &self.lightmap_coord)?;
        write_floats(writer, &self.normal)?;
        writer.write_all(&self.color)?;
        Ok(())
    }
}

named!(vertices_lump<Vec<BareVertex>>, terminated!(many0!(complete!(do_parse!(
    position: vec3 >>
    texcoord: vec2 >>
    lightmap_coord: vec2 >>
    normal: vec3 >>
    r: le_u8 >> g: le_u8 >> b: le_u8 >> a: le_u8 >>
    (BareVertex{ position, texcoord, lightmap_coord, normal, color: [r, g, b, a] })
))), naive_eof));

named!(mesh_verts_lump<Vec<u32>>, terminated!(many0!(complete!(le_u32)), naive_eof));


#[derive(Clone, Debug)]
pub struct BareEffect<'a> {
    pub name: &'a str,
    pub brush: i32,
    pub unknown: i32,
}

impl<'a> BareEffect<'a> {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        write_name(writer, self.name, 64)?;
        writer.write_i32::<LittleEndian>(self.brush)?;
        writer.write_i32::<LittleEndian>(self.unknown)?;
        Ok(())
    }
}

named!(effects_lump<Vec<BareEffect>>, terminated!(many0!(complete!(do_parse!(
    name: call!(fixed_length_ascii, 64) >>
    brush: le_i32 >>
    unknown: le_i32 >>
    (BareEffect{ name, brush, unknown })
))), naive_eof));


/// What a face is made of.  Only polygons and meshes are plain triangle lists; patches are
/// Bezier control grids and billboards are sprites.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaceKind {
    Polygon,
    Patch,
    Mesh,
    Billboard,
    Unknown(u32),
}

impl FaceKind {
    pub fn from_raw(raw: u32) -> FaceKind {
        match raw {
            1 => FaceKind::Polygon,
            2 => FaceKind::Patch,
            3 => FaceKind::Mesh,
            4 => FaceKind::Billboard,
            other => FaceKind::Unknown(other),
        }
    }

    pub fn to_raw(&self) -> u32 {
        match *self {
            FaceKind::Polygon => 1,
            FaceKind::Patch => 2,
            FaceKind::Mesh => 3,
            FaceKind::Billboard => 4,
            FaceKind::Unknown(raw) => raw,
        }
    }

    pub fn is_renderable(&self) -> bool {
        match *self {
            FaceKind::Polygon | FaceKind::Mesh => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BareFace {
    pub texture: u32,
    /// -1 for none
    pub effect: i32,
    pub kind: FaceKind,
    pub vertex: u32,
    pub vertex_count: u32,
    pub mesh_vert: u32,
    pub mesh_vert_count: u32,
    /// -1 for none
    pub lightmap: i32,
    pub lightmap_start: [u32; 2],
    pub lightmap_size: [u32; 2],
    pub lightmap_origin: [f32; 3],
    pub lightmap_vecs: [[f32; 3]; 2],
    pub normal: [f32; 3],
    pub patch_size: [u32; 2],
}

impl BareFace {
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.texture)?;
        writer.write_i32::<LittleEndian>(self.effect)?;
        writer.write_u32::<LittleEndian>(self.kind.to_raw())?;
        writer.write_u32::<LittleEndian>(self.vertex)?;
        writer.write_u32::<LittleEndian>(self.vertex_count)?;
        writer.write_u32::<LittleEndian>(self.mesh_vert)?;
        writer.write_u32::<LittleEndian>(self.mesh_vert_count)?;
        writer.write_i32::<LittleEndian>(self.lightmap)?;
        for &n in self.lightmap_start.iter().chain(self.lightmap_size.iter()) {
            writer.write_u32::<LittleEndian>(n)?;
        }
        write_floats(writer, &self.lightmap_origin)?;
        write_floats(writer, &self.lightmap_vecs[0])?;
        write_floats(writer, &self.lightmap_vecs[1])?;
        write_floats(writer, &self.normal)?;
        writer.write_u32::<LittleEndian>(self.patch_size[0])?;
        writer.write_u32::<LittleEndian>(self.patch_size[1])?;
        Ok(())
    }
}

named!(faces_lump<Vec<BareFace>>, terminated!(many0!(complete!(do_parse!(
    texture: le_u32 >>
    effect: le_i32 >>
    kind: le_u32 >>
    vertex: le_u32 >>
    vertex_count: le_u32 >>
    mesh_vert: le_u32 >>
    mesh_vert_count: le_u32 >>
    lightmap: le_i32 >>
    lightmap_start: pair_u32 >>
    lightmap_size: pair_u32 >>
    lightmap_origin: vec3 >>
    s_vec: vec3 >>
    t_vec: vec3 >>
    normal: vec3 >>
    patch_size: pair_u32 >>
    (BareFace{
        texture,
        effect,
        kind: FaceKind::from_raw(kind),
        vertex,
        vertex_count,
        mesh_vert,
        mesh_vert_count,
        lightmap,
        lightmap_start,
        lightmap_size,
        lightmap_origin,
        lightmap_vecs: [s_vec, t_vec],
        normal,
        patch_size,
    })
))), naive_eof));


/// Low-level view of a parsed level.  Record lumps are decoded; everything else stays a slice of
/// the level buffer, which must outlive this.
#[derive(Debug)]
pub struct BareBsp<'a> {
    pub buffer: &'a [u8],
    pub header: BareBspHeader,

    pub entities: &'a [u8],
    pub textures: Vec<BareTexture<'a>>,
    pub vertices: Vec<BareVertex>,
    pub mesh_verts: Vec<u32>,
    pub effects: Vec<BareEffect<'a>>,
    pub faces: Vec<BareFace>,
    /// Raw 128×128 RGB blocks
    pub lightmaps: Vec<&'a [u8]>,
    pub visdata: &'a [u8],
}

impl<'a> BareBsp<'a> {
    /// Raw bytes of any lump.  Every lump was bounds-checked during parsing.
    pub fn lump(&self, kind: LumpKind) -> &'a [u8] {
        lump_slice(self.buffer, &self.header, kind).unwrap_or(&[])
    }
}

fn lump_slice<'a>(buf: &'a [u8], header: &BareBspHeader, kind: LumpKind) -> Result<&'a [u8]> {
    let entry = header.lumps[kind.index()];
    let start = entry.offset as usize;
    let end = start + entry.length as usize;
    buf.get(start..end).ok_or_else(|| ErrorKind::LumpOutOfBounds(kind.name()).into())
}

fn parse_records<'a, T, F>(buf: &'a [u8], header: &BareBspHeader, kind: LumpKind, size: usize, parser: F) -> Result<Vec<T>>
    where F: Fn(&'a [u8]) -> IResult<&'a [u8], Vec<T>>
{
    let lump = lump_slice(buf, header, kind)?;
    if lump.len() % size != 0 {
        bail!(ErrorKind::TruncatedLump(kind.name(), lump.len(), size));
    }
    nom_to_result(kind.name(), lump, parser(lump))
}


/// Parse a complete IBSP level.
pub fn parse_bsp(buf: &[u8]) -> Result<BareBsp> {
    let header = nom_to_result("IBSP header", buf, bsp_header(buf))?;
    if !SUPPORTED_VERSIONS.contains(&header.version) {
        bail!(ErrorKind::UnsupportedVersion(header.version));
    }
    for &kind in ALL_LUMPS.iter() {
        lump_slice(buf, &header, kind)?;
    }

    let textures = parse_records(buf, &header, LumpKind::Textures, TEXTURE_SIZE, textures_lump)?;
    let vertices = parse_records(buf, &header, LumpKind::Vertices, VERTEX_SIZE, vertices_lump)?;
    let mesh_verts = parse_records(buf, &header, LumpKind::MeshVerts, MESH_VERT_SIZE, mesh_verts_lump)?;
    let effects = parse_records(buf, &header, LumpKind::Effects, EFFECT_SIZE, effects_lump)?;
    let faces = parse_records(buf, &header, LumpKind::Faces, FACE_SIZE, faces_lump)?;

    let lightmap_lump = lump_slice(buf, &header, LumpKind::Lightmaps)?;
    if lightmap_lump.len() % LIGHTMAP_SIZE != 0 {
        bail!(ErrorKind::TruncatedLump(LumpKind::Lightmaps.name(), lightmap_lump.len(), LIGHTMAP_SIZE));
    }
    let lightmaps = lightmap_lump.chunks(LIGHTMAP_SIZE).collect();

    Ok(BareBsp{
        buffer: buf,
        entities: lump_slice(buf, &header, LumpKind::Entities)?,
        visdata: lump_slice(buf, &header, LumpKind::VisData)?,
        header,
        textures,
        vertices,
        mesh_verts,
        effects,
        faces,
        lightmaps,
    })
}
