use std::io;

use image;
use nom::{self, Context, ErrorKind as NomErrorKind, IResult};

/// nom error code used by `return_error!` around magic-number tags, so a bad signature can be
/// told apart from any other parse failure.
pub const INVALID_MAGIC_CODE: u32 = 1;

error_chain! {
    foreign_links {
        Io(io::Error);
        Image(image::ImageError);
    }

    errors {
        ParseError(whence: &'static str, offset: usize) {
            description("nonspecific parse error")
            display("nonspecific parse error in {} at byte {}", whence, offset)
        }
        TruncatedData(whence: &'static str) {
            description("unexpected end of input")
            display("unexpected end of input while parsing {}", whence)
        }
        InvalidMagic(whence: &'static str) {
            description("invalid magic")
            display("invalid magic in {}", whence)
        }
        MissingDirectory {
            description("missing central directory")
            display("no end-of-central-directory record found; not a complete zip archive")
        }
        EntryNotFound(path: String) {
            description("archive entry not found")
            display("no archive entry named '{}'", path)
        }
        UnsupportedMethod(path: String, method: u16) {
            description("unsupported compression method")
            display("unsupported compression method {} for '{}'", method, path)
        }
        LocalHeaderMismatch(path: String) {
            description("local header disagrees with the central directory")
            display("local header for '{}' disagrees with the central directory", path)
        }
        CorruptStream(reason: &'static str) {
            description("corrupt deflate stream")
            display("corrupt deflate stream: {}", reason)
        }
        UnsupportedVersion(version: u32) {
            description("unsupported level version")
            display("unsupported IBSP version {}", version)
        }
        LumpOutOfBounds(lump: &'static str) {
            description("lump outside the level buffer")
            display("{} lump extends past the end of the level", lump)
        }
        TruncatedLump(lump: &'static str, length: usize, size: usize) {
            description("lump length is not a whole number of records")
            display("{} lump is {} bytes, which is not a multiple of {}", lump, length, size)
        }
        BadReference(what: &'static str, index: usize) {
            description("reference to a nonexistent record")
            display("{} index {} is out of range", what, index)
        }
        MalformedEntityBlock(offset: usize, reason: &'static str) {
            description("malformed entity text")
            display("malformed entity text at byte {}: {}", offset, reason)
        }
    }
}

fn is_magic_failure<I>(context: &Context<I, u32>) -> bool {
    let magic = NomErrorKind::Custom(INVALID_MAGIC_CODE);
    match *context {
        Context::Code(_, ref kind) => *kind == magic,
        Context::List(ref list) => list.iter().any(|&(_, ref kind)| *kind == magic),
    }
}

fn failure_offset(buf: &[u8], context: &Context<&[u8], u32>) -> usize {
    let rest = match *context {
        Context::Code(rest, _) => rest,
        Context::List(ref list) => match list.first() {
            Some(&(rest, _)) => rest,
            None => buf,
        },
    };
    buf.len().saturating_sub(rest.len())
}

/// Convert a nom result over `buf` into one of ours, discarding the leftovers.
pub fn nom_to_result<'a, O>(whence: &'static str, buf: &'a [u8], result: IResult<&'a [u8], O>) -> Result<O> {
    match result {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Incomplete(_)) => Err(ErrorKind::TruncatedData(whence).into()),
        Err(nom::Err::Error(context)) | Err(nom::Err::Failure(context)) => {
            if is_magic_failure(&context) {
                Err(ErrorKind::InvalidMagic(whence).into())
            }
            else {
                Err(ErrorKind::ParseError(whence, failure_offset(buf, &context)).into())
            }
        }
    }
}
