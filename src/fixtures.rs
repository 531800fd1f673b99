//! Synthetic archives and levels for tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;

use ::archive::Archive;
use ::errors::{ErrorKind, Result};
use ::parse::bsp::{
    BareEffect, BareFace, BareTexture, BareVertex, ContentFlags, FaceKind, LumpEntry, LumpKind,
    SurfaceFlags, BSP_MAGIC, HEADER_SIZE, LIGHTMAP_SIZE, LUMP_COUNT,
};


pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}


struct PendingEntry {
    path: Vec<u8>,
    method: u16,
    data: Vec<u8>,
    uncompressed_size: u32,
}

/// Writes a minimal zip: local headers and data, then the central directory, then the end
/// record.  CRCs are left as zero since nothing checks them.
pub struct ZipBuilder {
    entries: Vec<PendingEntry>,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> ZipBuilder {
        ZipBuilder{ entries: Vec::new(), comment: Vec::new() }
    }

    pub fn add_raw(&mut self, path: &str, method: u16, data: &[u8], uncompressed_size: u32) -> &mut Self {
        self.entries.push(PendingEntry{
            path: path.as_bytes().to_vec(),
            method,
            data: data.to_vec(),
            uncompressed_size,
        });
        self
    }

    pub fn add_stored(&mut self, path: &str, data: &[u8]) -> &mut Self {
        self.add_raw(path, 0, data, data.len() as u32)
    }

    pub fn add_deflated(&mut self, path: &str, data: &[u8]) -> &mut Self {
        let compressed = deflate(data);
        self.add_raw(path, 8, &compressed, data.len() as u32)
    }

    pub fn comment(&mut self, comment: &[u8]) -> &mut Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::new();
        for entry in &self.entries {
            offsets.push(out.len() as u32);
            out.write_all(b"PK\x03\x04").unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
            out.write_u16::<LittleEndian>(entry.path.len() as u16).unwrap();
            // A little extra field, so the data start has to be computed properly
            out.write_u16::<LittleEndian>(4).unwrap();
            out.write_all(&entry.path).unwrap();
            out.write_all(b"\xfe\xca\x00\x00").unwrap();
            out.write_all(&entry.data).unwrap();
        }

        let directory_offset = out.len();
        for (entry, &offset) in self.entries.iter().zip(offsets.iter()) {
            out.write_all(b"PK\x01\x02").unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
            out.write_u16::<LittleEndian>(entry.path.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(offset).unwrap();
            out.write_all(&entry.path).unwrap();
        }
        let directory_size = out.len() - directory_offset;

        out.write_all(b"PK\x05\x06").unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.entries.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(self.entries.len() as u16).unwrap();
        out.write_u32::<LittleEndian>(directory_size as u32).unwrap();
        out.write_u32::<LittleEndian>(directory_offset as u32).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.write_all(&self.comment).unwrap();
        out
    }
}


/// Assembles an IBSP buffer from whatever lumps were set; the rest are empty.
pub struct BspBuilder {
    pub version: u32,
    lumps: Vec<Vec<u8>>,
}

impl BspBuilder {
    pub fn new() -> BspBuilder {
        BspBuilder{ version: 46, lumps: vec![Vec::new(); LUMP_COUNT] }
    }

    pub fn set_lump(&mut self, kind: LumpKind, data: Vec<u8>) -> &mut Self {
        self.lumps[kind.index()] = data;
        self
    }

    pub fn entities(&mut self, text: &[u8]) -> &mut Self {
        self.set_lump(LumpKind::Entities, text.to_vec())
    }

    /// (name, content flags) pairs
    pub fn textures(&mut self, textures: &[(&str, u32)]) -> &mut Self {
        let mut data = Vec::new();
        for &(name, contents) in textures {
            BareTexture{
                name,
                flags: SurfaceFlags::empty(),
                contents: ContentFlags::from_bits_truncate(contents),
            }.write_to(&mut data).unwrap();
        }
        self.set_lump(LumpKind::Textures, data)
    }

    pub fn vertices(&mut self, vertices: &[BareVertex]) -> &mut Self {
        let mut data = Vec::new();
        for vertex in vertices {
            vertex.write_to(&mut data).unwrap();
        }
        self.set_lump(LumpKind::Vertices, data)
    }

    pub fn mesh_verts(&mut self, mesh_verts: &[u32]) -> &mut Self {
        let mut data = Vec::new();
        for &mesh_vert in mesh_verts {
            data.write_u32::<LittleEndian>(mesh_vert).unwrap();
        }
        self.set_lump(LumpKind::MeshVerts, data)
    }

    pub fn effects(&mut self, effects: &[BareEffect]) -> &mut Self {
        let mut data = Vec::new();
        for effect in effects {
            effect.write_to(&mut data).unwrap();
        }
        self.set_lump(LumpKind::Effects, data)
    }

    pub fn faces(&mut self, faces: &[BareFace]) -> &mut Self {
        let mut data = Vec::new();
        for face in faces {
            face.write_to(&mut data).unwrap();
        }
        self.set_lump(LumpKind::Faces, data)
    }

    /// Lightmaps filled with a repeating (10, 20, 30) texel
    pub fn lightmaps(&mut self, count: usize) -> &mut Self {
        let mut data = Vec::with_capacity(count * LIGHTMAP_SIZE);
        for _ in 0..count * LIGHTMAP_SIZE / 3 {
            data.extend_from_slice(&[10, 20, 30]);
        }
        self.set_lump(LumpKind::Lightmaps, data)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_all(BSP_MAGIC).unwrap();
        out.write_u32::<LittleEndian>(self.version).unwrap();
        let mut offset = HEADER_SIZE;
        for lump in &self.lumps {
            LumpEntry{ offset: offset as u32, length: lump.len() as u32 }.write_to(&mut out).unwrap();
            offset += lump.len();
        }
        for lump in &self.lumps {
            out.write_all(lump).unwrap();
        }
        out
    }
}

/// A vertex on the floor plane (z = 0 in file coordinates), facing up.
pub fn vertex(x: f32, y: f32, z: f32) -> BareVertex {
    BareVertex{
        position: [x, y, z],
        texcoord: [x / 64.0, y / 64.0],
        lightmap_coord: [0.5, 0.5],
        normal: [0.0, 0.0, 1.0],
        color: [255, 255, 255, 255],
    }
}

pub fn face(kind: FaceKind, texture: u32, vertex: u32, vertex_count: u32, mesh_vert: u32, mesh_vert_count: u32, lightmap: i32) -> BareFace {
    BareFace{
        texture,
        effect: -1,
        kind,
        vertex,
        vertex_count,
        mesh_vert,
        mesh_vert_count,
        lightmap,
        lightmap_start: [0, 0],
        lightmap_size: [0, 0],
        lightmap_origin: [0.0, 0.0, 0.0],
        lightmap_vecs: [[0.0; 3], [0.0; 3]],
        normal: [0.0, 0.0, 1.0],
        patch_size: [0, 0],
    }
}

pub const SAMPLE_ENTITIES: &[u8] = b"{\n\"classname\" \"worldspawn\"\n\"message\" \"Test Arena\"\n}\n\
{\n\"classname\" \"info_player_start\"\n\"origin\" \"0 0 0\"\n}\n\
{\n\"classname\" \"info_player_deathmatch\"\n\"origin\" \"32 64 24\"\n\"angle\" \"90\"\n}\n\
{\n\"classname\" \"weapon_railgun\"\n\"origin\" \"96 32 16\"\n}\n\0";

/// Two quads' worth of floor: a polygon face using mesh verts 0..6 from vertex 0, a patch that
/// should be skipped, and a mesh face using mesh verts 3..6 from vertex 2.
pub fn sample_level() -> Vec<u8> {
    let mut patch = face(FaceKind::Patch, 1, 0, 4, 0, 0, -1);
    patch.patch_size = [3, 3];

    let mut visdata = Vec::new();
    visdata.write_i32::<LittleEndian>(2).unwrap();
    visdata.write_i32::<LittleEndian>(1).unwrap();
    visdata.extend_from_slice(&[0b01, 0b11]);

    BspBuilder::new()
        .entities(SAMPLE_ENTITIES)
        .textures(&[("noshader", 0), ("textures/base/wall", 1)])
        .vertices(&[
            vertex(0.0, 0.0, 0.0),
            vertex(64.0, 0.0, 0.0),
            vertex(64.0, 64.0, 0.0),
            vertex(0.0, 64.0, 0.0),
            vertex(128.0, 0.0, 0.0),
            vertex(128.0, 64.0, 0.0),
        ])
        .mesh_verts(&[0, 1, 2, 0, 2, 3])
        .effects(&[BareEffect{ name: "textures/liquids/fog", brush: 0, unknown: -1 }])
        .faces(&[
            face(FaceKind::Polygon, 1, 0, 4, 0, 6, 0),
            patch,
            face(FaceKind::Mesh, 0, 2, 4, 3, 3, -1),
        ])
        .lightmaps(1)
        .set_lump(LumpKind::VisData, visdata)
        .build()
}

/// A 2×1 uncompressed truecolor TGA: one red texel, one green.
pub fn tiny_tga() -> Vec<u8> {
    let mut out = vec![0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    out.write_u16::<LittleEndian>(2).unwrap();
    out.write_u16::<LittleEndian>(1).unwrap();
    out.push(24);
    out.push(0x20);
    out.extend_from_slice(&[0, 0, 255, 0, 255, 0]);
    out
}

/// The sample level packed the way a real pk3 would have it.
pub fn sample_pk3() -> Vec<u8> {
    let mut builder = ZipBuilder::new();
    builder.add_stored("maps/", b"");
    builder.add_deflated("maps/test.bsp", &sample_level());
    builder.add_stored("textures/base/wall.tga", &tiny_tga());
    builder.add_deflated("scripts/test.shader", b"textures/base/wall\n{\n\tsurfaceparm nomarks\n}\n");
    builder.finish()
}


/// An archive that's just a map, recording every lookup.
pub struct MemoryArchive {
    entries: HashMap<String, Vec<u8>>,
    lookups: RefCell<Vec<String>>,
}

impl MemoryArchive {
    pub fn new() -> MemoryArchive {
        MemoryArchive{ entries: HashMap::new(), lookups: RefCell::new(Vec::new()) }
    }

    pub fn insert(&mut self, path: &str, data: Vec<u8>) {
        self.entries.insert(path.to_owned(), data);
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }
}

impl Archive for MemoryArchive {
    fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        self.lookups.borrow_mut().push(path.to_owned());
        match self.entries.get(path) {
            Some(data) => Ok(data.clone()),
            None => Err(ErrorKind::EntryNotFound(path.to_owned()).into()),
        }
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}
