extern crate bit_vec;
#[macro_use]
extern crate bitflags;
extern crate byteorder;
#[macro_use]
extern crate error_chain;
extern crate euclid;
extern crate image;
#[macro_use]
extern crate log;
extern crate memmap;
#[macro_use]
extern crate nom;

#[cfg(test)]
extern crate flate2;

pub mod archive;
pub mod errors;
pub mod geom;
pub mod inflate;
pub mod input_buffer;
pub mod level;
pub mod load_log;
pub mod parse;
pub mod textures;
pub mod universe;
pub mod vis;

#[cfg(test)]
mod fixtures;

pub use archive::{Archive, Namespace};
pub use archive::pk3::{BarePk3, BareZipEntry, CompressionMethod};
pub use errors::{Error, ErrorKind, Result};
pub use level::{FaceDraw, Level};
pub use load_log::LoadLog;
pub use parse::bsp::{BareBsp, parse_bsp};
pub use parse::entities::{Entity, parse_entities};
pub use parse::zip::parse_pk3;
pub use textures::{DecodedTexture, Placeholder, TextureSlot};
pub use vis::Visibility;


/// Everything a renderer needs for one level.
pub struct LoadedLevel {
    pub level: Level,
    /// Parallel to `level.textures`
    pub textures: Vec<TextureSlot>,
    pub visibility: Visibility,
}

impl LoadedLevel {
    pub fn count_textures(&self) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for slot in &self.textures {
            match *slot {
                TextureSlot::Loaded(_) => counts.0 += 1,
                TextureSlot::Missing => counts.1 += 1,
                TextureSlot::Undecodable(_) => counts.2 += 1,
                TextureSlot::Unbound => counts.3 += 1,
            }
        }
        counts
    }
}

/// Extract a level from an archive and build everything it needs: geometry, entities,
/// visibility, and decoded textures.  Missing or broken textures don't fail the load; they're
/// reported through `log` and left as placeholder slots.
pub fn load_level<A: Archive + ?Sized>(archive: &A, map_path: &str, log: &LoadLog) -> Result<LoadedLevel> {
    let bytes = archive.read_entry(map_path)?;
    log.info(format_args!("extracted {} ({} bytes)", map_path, bytes.len()));

    let bare = parse_bsp(&bytes)?;
    log.info(format_args!(
        "parsed IBSP version {}: {} faces, {} vertices, {} textures, {} lightmaps",
        bare.header.version, bare.faces.len(), bare.vertices.len(), bare.textures.len(), bare.lightmaps.len()));

    let level = Level::from_bare(&bare)?;
    log.info(format_args!(
        "built {} draws from {} indices, skipped {} faces, {} entities",
        level.draws.len(), level.indices.len(), level.skipped_faces, level.entities.len()));
    match level.spawn_point() {
        Some(spawn) => log.info(format_args!(
            "spawning at {} ({}, {}, {}) facing {}",
            spawn.classname, spawn.origin.x, spawn.origin.y, spawn.origin.z, spawn.angle)),
        None => log.warn(format_args!("no spawn point")),
    }

    let visibility = Visibility::parse(bare.visdata)?;

    let textures = textures::resolve_textures(archive, &level.textures, log);
    let loaded = LoadedLevel{ level, textures, visibility };
    let (found, missing, undecodable, unbound) = loaded.count_textures();
    log.info(format_args!(
        "textures: {} loaded, {} missing, {} undecodable, {} unbound",
        found, missing, undecodable, unbound));

    Ok(loaded)
}
