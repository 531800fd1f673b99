pub mod pk3;

use ::errors::Result;


/// Anything that can hand out whole files by path.  Level loading and texture resolution only
/// need this much, so they don't care whether the bytes come from a real archive.
pub trait Archive {
    /// Return the complete, uncompressed contents of the entry whose path matches `path` exactly.
    /// Fails with `EntryNotFound` when there's no such entry.
    fn read_entry(&self, path: &str) -> Result<Vec<u8>>;

    fn contains(&self, path: &str) -> bool;
}


/// Rough classification of an archive entry, based only on its top-level directory.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Maps,
    Textures,
    Models,
    Scripts,
    Sound,
    Graphics,
    Other,
}

impl Namespace {
    pub fn of(path: &[u8]) -> Namespace {
        let top = match path.iter().position(|&b| b == b'/') {
            Some(slash) => &path[..slash],
            None => return Namespace::Other,
        };
        // Paths in pk3s are conventionally lowercase, but nothing enforces it
        let top = top.to_ascii_lowercase();
        match &top[..] {
            b"maps" => Namespace::Maps,
            b"textures" | b"env" => Namespace::Textures,
            b"models" => Namespace::Models,
            b"scripts" => Namespace::Scripts,
            b"sound" | b"music" => Namespace::Sound,
            b"gfx" | b"menu" | b"sprites" => Namespace::Graphics,
            _ => Namespace::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Namespace::Maps => "maps",
            Namespace::Textures => "textures",
            Namespace::Models => "models",
            Namespace::Scripts => "scripts",
            Namespace::Sound => "sound",
            Namespace::Graphics => "graphics",
            Namespace::Other => "other",
        }
    }
}
