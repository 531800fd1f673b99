use std::slice;

use ::errors::{ErrorKind, Result};
use ::geom::{Bounds, Point, Vector};
use ::parse::bsp::{BareBsp, BareFace, BareVertex, ContentFlags, FaceKind, SurfaceFlags, NO_SHADER};
use ::parse::entities::{Entity, parse_entities};
use ::universe::SPAWN_CLASSNAMES;


/// Level files are z-up; everything here is y-up, with z pointing south.
fn remap(v: [f32; 3]) -> [f32; 3] {
    [v[0], -v[2], -v[1]]
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Point,
    pub texcoord: [f32; 2],
    pub lightmap_coord: [f32; 2],
    pub normal: Vector,
    pub color: [u8; 4],
}

impl Vertex {
    fn from_bare(bare: &BareVertex) -> Vertex {
        let position = remap(bare.position);
        let normal = remap(bare.normal);
        Vertex{
            position: Point::new(position[0], position[1], position[2]),
            texcoord: bare.texcoord,
            lightmap_coord: bare.lightmap_coord,
            normal: Vector::new(normal[0], normal[1], normal[2]),
            color: bare.color,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub name: String,
    pub flags: SurfaceFlags,
    pub contents: ContentFlags,
}

impl Texture {
    /// The "noshader" sentinel; there's nothing to look up or draw.
    pub fn is_unbound(&self) -> bool {
        self.name == NO_SHADER
    }
}

#[derive(Clone, Debug)]
pub struct Effect {
    pub name: String,
    pub brush: i32,
}

/// One contiguous run of `Level::indices`, drawn with a single texture and lightmap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaceDraw {
    /// Index into the level's face lump
    pub face: usize,
    pub kind: FaceKind,
    pub texture: usize,
    pub lightmap: Option<usize>,
    pub first_index: usize,
    pub index_count: usize,
}


/// Expand a 128×128 RGB lightmap to RGBA, with every alpha opaque.
pub fn expand_lightmap(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for pixel in rgb.chunks(3) {
        rgba.extend_from_slice(pixel);
        rgba.push(0xff);
    }
    rgba
}


/// A level ready to hand to a renderer: flat vertex and index buffers, a draw per renderable
/// face, and everything the draws refer to.  Owns all of its data.
pub struct Level {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub draws: Vec<FaceDraw>,
    pub textures: Vec<Texture>,
    /// RGBA, 128×128 each
    pub lightmaps: Vec<Vec<u8>>,
    pub effects: Vec<Effect>,
    pub entities: Vec<Entity>,
    /// Faces that exist but aren't triangle lists (patches, billboards, unknown types)
    pub skipped_faces: usize,
}

impl Level {
    pub fn from_bare(bare: &BareBsp) -> Result<Level> {
        let mut indices = Vec::new();
        let mut draws = Vec::new();
        let mut skipped_faces = 0;

        for (i, face) in bare.faces.iter().enumerate() {
            if !face.kind.is_renderable() {
                skipped_faces += 1;
                continue;
            }

            let first_index = indices.len();
            face_indices(bare, face, &mut indices)?;

            let texture = face.texture as usize;
            if texture >= bare.textures.len() {
                bail!(ErrorKind::BadReference("texture", texture));
            }
            // Negative means vertex lit or unlit; q3map2 uses several different values
            let lightmap = if face.lightmap < 0 {
                None
            }
            else {
                let lightmap = face.lightmap as usize;
                if lightmap >= bare.lightmaps.len() {
                    bail!(ErrorKind::BadReference("lightmap", lightmap));
                }
                Some(lightmap)
            };

            draws.push(FaceDraw{
                face: i,
                kind: face.kind,
                texture,
                lightmap,
                first_index,
                index_count: indices.len() - first_index,
            });
        }

        Ok(Level{
            vertices: bare.vertices.iter().map(Vertex::from_bare).collect(),
            indices,
            draws,
            textures: bare.textures.iter().map(|texture| Texture{
                name: texture.name.to_owned(),
                flags: texture.flags,
                contents: texture.contents,
            }).collect(),
            lightmaps: bare.lightmaps.iter().map(|rgb| expand_lightmap(rgb)).collect(),
            effects: bare.effects.iter().map(|effect| Effect{
                name: effect.name.to_owned(),
                brush: effect.brush,
            }).collect(),
            entities: parse_entities(bare.entities)?,
            skipped_faces,
        })
    }

    /// The first entity of the most preferred spawn classname.
    pub fn spawn_point(&self) -> Option<&Entity> {
        SPAWN_CLASSNAMES.iter()
            .filter_map(|&classname| self.entities.iter().find(|entity| entity.classname == classname))
            .next()
    }

    pub fn iter_entities(&self) -> slice::Iter<Entity> {
        self.entities.iter()
    }

    /// Triangles of a single draw, as vertex positions.
    pub fn draw_triangles<'a>(&'a self, draw: &FaceDraw) -> impl Iterator<Item=[Point; 3]> + 'a {
        self.indices[draw.first_index..draw.first_index + draw.index_count]
            .chunks(3)
            .filter(|triangle| triangle.len() == 3)
            .map(move |triangle| [
                self.vertices[triangle[0] as usize].position,
                self.vertices[triangle[1] as usize].position,
                self.vertices[triangle[2] as usize].position,
            ])
    }

    /// Bounding box of everything actually drawn, or None for a level with nothing to draw.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut positions = self.indices.iter().map(|&i| self.vertices[i as usize].position);
        let mut bounds = Bounds::from_point(positions.next()?);
        for position in positions {
            bounds.extend(position);
        }
        Some(bounds)
    }
}

/// Append a face's absolute vertex indices: each mesh vert is an offset from the face's first
/// vertex.
fn face_indices(bare: &BareBsp, face: &BareFace, indices: &mut Vec<u32>) -> Result<()> {
    let base = face.vertex as usize;
    let first = face.mesh_vert as usize;
    for mesh_vert in first..first + face.mesh_vert_count as usize {
        let offset = match bare.mesh_verts.get(mesh_vert) {
            Some(&offset) => offset as usize,
            None => { bail!(ErrorKind::BadReference("mesh vert", mesh_vert)); }
        };
        let vertex = base + offset;
        if vertex >= bare.vertices.len() {
            bail!(ErrorKind::BadReference("vertex", vertex));
        }
        indices.push(vertex as u32);
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use ::errors::ErrorKind;
    use ::fixtures::{BspBuilder, face, sample_level, vertex};
    use ::parse::bsp::{parse_bsp, LIGHTMAP_SIZE};

    fn sample() -> Level {
        let buf = sample_level();
        let bare = parse_bsp(&buf).unwrap();
        Level::from_bare(&bare).unwrap()
    }

    #[test]
    fn indices_go_through_mesh_verts() {
        let level = sample();
        assert_eq!(level.indices, vec![0, 1, 2, 0, 2, 3, 2, 4, 5]);
        assert_eq!(level.skipped_faces, 1);
        assert_eq!(level.draws, vec![
            FaceDraw{ face: 0, kind: FaceKind::Polygon, texture: 1, lightmap: Some(0), first_index: 0, index_count: 6 },
            FaceDraw{ face: 2, kind: FaceKind::Mesh, texture: 0, lightmap: None, first_index: 6, index_count: 3 },
        ]);
    }

    #[test]
    fn textures_and_effects_are_owned() {
        let level = sample();
        assert_eq!(level.textures.len(), 2);
        assert!(level.textures[0].is_unbound());
        assert!(!level.textures[1].is_unbound());
        assert_eq!(level.effects.len(), 1);
        assert_eq!(level.effects[0].name, "textures/liquids/fog");
    }

    #[test]
    fn axes_are_remapped() {
        let level = sample();
        assert_eq!(level.vertices[2].position, Point::new(64.0, 0.0, -64.0));
        assert_eq!(level.vertices[2].normal, Vector::new(0.0, -1.0, 0.0));
        let bounds = level.bounds().unwrap();
        assert_eq!(bounds.min, Point::new(0.0, 0.0, -64.0));
        assert_eq!(bounds.max, Point::new(128.0, 0.0, 0.0));
    }

    #[test]
    fn triangles_per_draw() {
        let level = sample();
        let triangles: Vec<_> = level.draw_triangles(&level.draws[0]).collect();
        assert_eq!(triangles.len(), 2);
        assert_eq!(triangles[1][2], level.vertices[3].position);
    }

    #[test]
    fn lightmaps_are_expanded() {
        let level = sample();
        assert_eq!(level.lightmaps.len(), 1);
        assert_eq!(level.lightmaps[0].len(), LIGHTMAP_SIZE / 3 * 4);
        assert_eq!(&level.lightmaps[0][..8], &[10, 20, 30, 255, 10, 20, 30, 255]);
    }

    #[test]
    fn expand_lightmap_inserts_alpha() {
        assert_eq!(expand_lightmap(&[1, 2, 3, 4, 5, 6]), vec![1, 2, 3, 255, 4, 5, 6, 255]);
        assert!(expand_lightmap(&[]).is_empty());
    }

    #[test]
    fn spawn_prefers_deathmatch() {
        let level = sample();
        let spawn = level.spawn_point().unwrap();
        assert_eq!(spawn.classname, "info_player_deathmatch");
        assert_eq!(spawn.origin, Point::new(32.0, -24.0, -64.0));
        assert_eq!(spawn.angle, 90);
        assert_eq!(level.iter_entities().count(), 4);
    }

    #[test]
    fn spawn_falls_back() {
        let mut builder = BspBuilder::new();
        builder.entities(b"{ \"classname\" \"worldspawn\" }\n{ \"classname\" \"team_CTF_blueplayer\" \"origin\" \"1 2 3\" }\n");
        let buf = builder.build();
        let level = Level::from_bare(&parse_bsp(&buf).unwrap()).unwrap();
        assert_eq!(level.spawn_point().unwrap().classname, "team_CTF_blueplayer");

        let buf = BspBuilder::new().build();
        let level = Level::from_bare(&parse_bsp(&buf).unwrap()).unwrap();
        assert!(level.spawn_point().is_none());
        assert!(level.bounds().is_none());
    }

    fn expect_bad_reference(builder: &BspBuilder, expected: &str, expected_index: usize) {
        let buf = builder.build();
        let bare = parse_bsp(&buf).unwrap();
        let err = match Level::from_bare(&bare) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        match *err.kind() {
            ErrorKind::BadReference(what, index) => {
                assert_eq!(what, expected);
                assert_eq!(index, expected_index);
            }
            ref other => panic!("expected BadReference, got {:?}", other),
        }
    }

    #[test]
    fn bad_references() {
        let mut builder = BspBuilder::new();
        builder.textures(&[("textures/base/wall", 0)]);
        builder.vertices(&[vertex(0.0, 0.0, 0.0), vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0)]);
        builder.mesh_verts(&[0, 1, 2, 0]);

        // Mesh vert range runs off the end
        builder.faces(&[face(FaceKind::Polygon, 0, 0, 3, 2, 3, -1)]);
        expect_bad_reference(&builder, "mesh vert", 4);

        // Mesh vert points past the vertices
        builder.faces(&[face(FaceKind::Polygon, 0, 1, 3, 0, 3, -1)]);
        expect_bad_reference(&builder, "vertex", 3);

        builder.faces(&[face(FaceKind::Mesh, 5, 0, 3, 0, 3, -1)]);
        expect_bad_reference(&builder, "texture", 5);

        builder.faces(&[face(FaceKind::Polygon, 0, 0, 3, 0, 3, 2)]);
        expect_bad_reference(&builder, "lightmap", 2);

        // None of that matters for faces that aren't drawn
        builder.faces(&[face(FaceKind::Patch, 5, 9, 3, 9, 3, 2)]);
        let buf = builder.build();
        let level = Level::from_bare(&parse_bsp(&buf).unwrap()).unwrap();
        assert!(level.draws.is_empty());
        assert_eq!(level.skipped_faces, 1);
    }
}
