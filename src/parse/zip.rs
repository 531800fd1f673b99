use byteorder::{ByteOrder, LittleEndian};
use nom::{self, le_u16, le_u32};

use ::archive::pk3::{BareEndOfCentralDirectory, BareLocalHeader, BarePk3, BareZipEntry};
use ::errors::{ErrorKind, Result, INVALID_MAGIC_CODE, nom_to_result};


pub const LOCAL_HEADER_SIGNATURE: &[u8; 4] = b"PK\x03\x04";
pub const CENTRAL_DIRECTORY_SIGNATURE: &[u8; 4] = b"PK\x01\x02";
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: &[u8; 4] = b"PK\x05\x06";

/// Fixed portions of each record, signatures included.
pub const LOCAL_HEADER_SIZE: usize = 30;
pub const CENTRAL_DIRECTORY_RECORD_SIZE: usize = 46;
pub const END_OF_CENTRAL_DIRECTORY_SIZE: usize = 22;


named!(end_of_central_directory<BareEndOfCentralDirectory>, do_parse!(
    return_error!(
        nom::ErrorKind::Custom(INVALID_MAGIC_CODE),
        tag!(END_OF_CENTRAL_DIRECTORY_SIGNATURE)) >>
    disk: le_u16 >>
    directory_disk: le_u16 >>
    disk_record_count: le_u16 >>
    record_count: le_u16 >>
    directory_size: le_u32 >>
    directory_offset: le_u32 >>
    comment_length: le_u16 >>
    (BareEndOfCentralDirectory{
        disk,
        directory_disk,
        disk_record_count,
        record_count,
        directory_size,
        directory_offset,
        comment_length,
    })
));

named!(pub central_directory_record<BareZipEntry>, do_parse!(
    return_error!(
        nom::ErrorKind::Custom(INVALID_MAGIC_CODE),
        tag!(CENTRAL_DIRECTORY_SIGNATURE)) >>
    le_u16 >>  // version made by
    le_u16 >>  // version needed to extract
    flags: le_u16 >>
    method: le_u16 >>
    modified_time: le_u16 >>
    modified_date: le_u16 >>
    crc32: le_u32 >>
    compressed_size: le_u32 >>
    uncompressed_size: le_u32 >>
    name_length: le_u16 >>
    extra_length: le_u16 >>
    comment_length: le_u16 >>
    le_u16 >>  // starting disk, always 0 for us
    le_u16 >>  // internal attributes
    le_u32 >>  // external attributes
    local_header_offset: le_u32 >>
    path: take!(name_length) >>
    take!(extra_length) >>
    take!(comment_length) >>
    (BareZipEntry{
        path,
        flags,
        method,
        modified_time,
        modified_date,
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
    })
));

// The sizes here are often zero (when bit 3 of the flags is set), so only the variable field
// lengths are trusted; sizes come from the central directory
named!(pub local_file_header<BareLocalHeader>, do_parse!(
    return_error!(
        nom::ErrorKind::Custom(INVALID_MAGIC_CODE),
        tag!(LOCAL_HEADER_SIGNATURE)) >>
    le_u16 >>  // version needed to extract
    le_u16 >>  // flags
    method: le_u16 >>
    le_u16 >>  // modification time
    le_u16 >>  // modification date
    le_u32 >>  // crc
    le_u32 >>  // compressed size
    le_u32 >>  // uncompressed size
    name_length: le_u16 >>
    extra_length: le_u16 >>
    take!(name_length) >>
    take!(extra_length) >>
    (BareLocalHeader{
        method,
        name_length,
        extra_length,
    })
));


/// Find the end-of-central-directory record by searching backwards from the last position where
/// a whole record would still fit.  The search never looks below offset 4, which is occupied by
/// the first local header's signature.
///
/// An archive comment can itself contain the signature, so a candidate only counts when its
/// comment length reaches exactly to the end of the buffer.  If no candidate does (trailing junk
/// after the archive), the last signature in the buffer is used.
pub fn find_end_of_central_directory(buf: &[u8]) -> Option<usize> {
    if buf.len() < 4 + END_OF_CENTRAL_DIRECTORY_SIZE {
        return None;
    }
    let last = buf.len() - END_OF_CENTRAL_DIRECTORY_SIZE;
    let mut candidates = (4..last + 1).rev()
        .filter(|&offset| &buf[offset..offset + 4] == END_OF_CENTRAL_DIRECTORY_SIGNATURE);
    let first = candidates.next()?;
    let fits = |offset: usize| {
        let comment_length = LittleEndian::read_u16(&buf[offset + 20..offset + 22]) as usize;
        offset + END_OF_CENTRAL_DIRECTORY_SIZE + comment_length == buf.len()
    };
    if fits(first) {
        return Some(first);
    }
    Some(candidates.find(|&offset| fits(offset)).unwrap_or(first))
}


/// Open a PK3 (zip) archive that's already entirely in memory.
///
/// This only resolves the end-of-central-directory record; entries are read lazily with
/// `BarePk3::iter` and friends.
pub fn parse_pk3(buf: &[u8]) -> Result<BarePk3> {
    if !buf.starts_with(&LOCAL_HEADER_SIGNATURE[..3]) {
        bail!(ErrorKind::InvalidMagic("pk3 header"));
    }

    let eocd_offset = find_end_of_central_directory(buf).ok_or(ErrorKind::MissingDirectory)?;
    let eocd_buf = &buf[eocd_offset..];
    let end_of_directory = nom_to_result("end of central directory", eocd_buf, end_of_central_directory(eocd_buf))?;

    if end_of_directory.directory_offset as usize > eocd_offset {
        bail!(ErrorKind::TruncatedData("central directory"));
    }

    Ok(BarePk3{ buffer: buf, end_of_directory, end_of_directory_offset: eocd_offset })
}
