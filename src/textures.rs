use std::path::Path;

use image::{self, ImageFormat};

use ::archive::Archive;
use ::errors::{Error, ErrorKind, Result};
use ::level::Texture;
use ::load_log::LoadLog;


pub const PLACEHOLDER_SIZE: u32 = 32;

/// Extensions tried, in order, when a texture's name doesn't match an entry as-is.
pub static TEXTURE_EXTENSIONS: [&str; 2] = ["tga", "jpg"];


/// Which stand-in to draw when a texture can't be used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// The file exists but couldn't be decoded; magenta
    Undecodable,
    /// No file by that name; cyan
    MissingFile,
}

impl Placeholder {
    pub fn color(&self) -> [u8; 4] {
        match *self {
            Placeholder::Undecodable => [0xff, 0x00, 0xff, 0xff],
            Placeholder::MissingFile => [0x00, 0xff, 0xff, 0xff],
        }
    }
}

/// Tightly packed RGBA8 texels, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedTexture {
    pub fn placeholder(placeholder: Placeholder) -> DecodedTexture {
        let texel_count = (PLACEHOLDER_SIZE * PLACEHOLDER_SIZE) as usize;
        let color = placeholder.color();
        let mut rgba = Vec::with_capacity(texel_count * 4);
        for _ in 0..texel_count {
            rgba.extend_from_slice(&color);
        }
        DecodedTexture{ width: PLACEHOLDER_SIZE, height: PLACEHOLDER_SIZE, rgba }
    }

    /// Decode an image file.  TGA has no signature, so the format comes from the path's
    /// extension when there is one.
    pub fn decode(bytes: &[u8], path: &str) -> Result<DecodedTexture> {
        let decoded = match ImageFormat::from_path(Path::new(path)) {
            Ok(format) => image::load_from_memory_with_format(bytes, format)?,
            Err(_) => image::load_from_memory(bytes)?,
        };
        let rgba = decoded.to_rgba8();
        Ok(DecodedTexture{
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}


/// What became of one entry in a level's texture list.
#[derive(Clone, Debug)]
pub enum TextureSlot {
    /// "noshader"; never looked up
    Unbound,
    Missing,
    Undecodable(String),
    Loaded(DecodedTexture),
}

impl TextureSlot {
    pub fn placeholder(&self) -> Option<Placeholder> {
        match *self {
            TextureSlot::Missing => Some(Placeholder::MissingFile),
            TextureSlot::Undecodable(_) => Some(Placeholder::Undecodable),
            _ => None,
        }
    }

    /// The texels to upload for this slot, substituting a placeholder where needed.  Unbound
    /// slots have nothing to upload.
    pub fn texels(&self) -> Option<DecodedTexture> {
        match *self {
            TextureSlot::Unbound => None,
            TextureSlot::Loaded(ref texture) => Some(texture.clone()),
            _ => self.placeholder().map(DecodedTexture::placeholder),
        }
    }
}


fn is_not_found(err: &Error) -> bool {
    match *err.kind() {
        ErrorKind::EntryNotFound(_) => true,
        _ => false,
    }
}

/// Archive paths to try for a texture name, most specific first.
pub fn candidate_paths(name: &str) -> Vec<String> {
    let mut paths = vec![name.to_owned()];
    for extension in TEXTURE_EXTENSIONS.iter() {
        paths.push(format!("{}.{}", name, extension));
    }
    paths
}

pub fn resolve_texture<A: Archive + ?Sized>(archive: &A, texture: &Texture, log: &LoadLog) -> TextureSlot {
    if texture.is_unbound() {
        return TextureSlot::Unbound;
    }

    for path in candidate_paths(&texture.name) {
        let bytes = match archive.read_entry(&path) {
            Ok(bytes) => bytes,
            Err(ref err) if is_not_found(err) => continue,
            Err(err) => {
                log.warn(format_args!("could not extract texture '{}': {}", path, err));
                return TextureSlot::Undecodable(err.to_string());
            }
        };

        return match DecodedTexture::decode(&bytes, &path) {
            Ok(decoded) => {
                log.debug(format_args!("loaded '{}' ({}×{})", path, decoded.width, decoded.height));
                TextureSlot::Loaded(decoded)
            }
            Err(err) => {
                log.warn(format_args!("could not decode texture '{}': {}", path, err));
                TextureSlot::Undecodable(err.to_string())
            }
        };
    }

    log.warn(format_args!("could not find texture '{}'", texture.name));
    TextureSlot::Missing
}

/// Resolve every texture in a level, keeping the level's texture indices.
pub fn resolve_textures<A: Archive + ?Sized>(archive: &A, textures: &[Texture], log: &LoadLog) -> Vec<TextureSlot> {
    textures.iter().map(|texture| resolve_texture(archive, texture, log)).collect()
}
