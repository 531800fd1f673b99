use std::borrow::Cow;
use std::cmp;

use super::{Archive, Namespace};
use ::errors::{ErrorKind, Result, nom_to_result};
use ::inflate::inflate_to_vec;
use ::parse::zip::{central_directory_record, local_file_header, LOCAL_HEADER_SIZE};


/// How an entry's bytes are stored.  Only the two methods Quake 3 tools ever produce are
/// supported; anything else is kept around so it can be reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflated,
    Unsupported(u16),
}

impl CompressionMethod {
    pub fn from_raw(method: u16) -> CompressionMethod {
        match method {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Unsupported(other),
        }
    }
}


#[derive(Clone, Debug)]
pub struct BareEndOfCentralDirectory {
    pub disk: u16,
    pub directory_disk: u16,
    pub disk_record_count: u16,
    pub record_count: u16,
    pub directory_size: u32,
    pub directory_offset: u32,
    pub comment_length: u16,
}

/// The only parts of a local header we need are the lengths of its variable fields, which aren't
/// guaranteed to match the central directory's copies, and the method as a consistency check.
#[derive(Clone, Debug)]
pub struct BareLocalHeader {
    pub method: u16,
    pub name_length: u16,
    pub extra_length: u16,
}

/// One central directory record.  All offsets are relative to the start of the archive.
#[derive(Clone, Debug)]
pub struct BareZipEntry<'a> {
    pub path: &'a [u8],
    pub flags: u16,
    pub method: u16,
    pub modified_time: u16,
    pub modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
}

impl<'a> BareZipEntry<'a> {
    /// The entry path for display; zip doesn't promise any particular encoding.
    pub fn path_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.path)
    }

    pub fn compression(&self) -> CompressionMethod {
        CompressionMethod::from_raw(self.method)
    }

    pub fn namespace(&self) -> Namespace {
        Namespace::of(self.path)
    }

    pub fn is_directory(&self) -> bool {
        self.path.last() == Some(&b'/')
    }

    /// A stored entry ought to have identical sizes.  When it doesn't, extraction still works
    /// but the caller may want to complain.
    pub fn has_stored_size_mismatch(&self) -> bool {
        self.compression() == CompressionMethod::Stored && self.compressed_size != self.uncompressed_size
    }
}


/// Low-level interface to a zip archive living in a byte buffer.  Nothing is copied until an
/// entry is extracted.
#[derive(Debug)]
pub struct BarePk3<'a> {
    pub buffer: &'a [u8],
    pub end_of_directory: BareEndOfCentralDirectory,
    pub end_of_directory_offset: usize,
}

impl<'a> BarePk3<'a> {
    pub fn len(&self) -> usize {
        self.end_of_directory.record_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the central directory in order.  A malformed record ends the walk after yielding its
    /// error.
    pub fn iter(&self) -> CentralDirectoryIterator<'a> {
        let start = self.end_of_directory.directory_offset as usize;
        CentralDirectoryIterator {
            buffer: self.buffer,
            remaining_input: self.buffer.get(start..).unwrap_or(&[]),
            remaining_records: self.end_of_directory.record_count,
        }
    }

    /// Find the first entry whose path is exactly `path`.  No case folding, no prefix matching.
    pub fn find_entry(&self, path: &[u8]) -> Result<BareZipEntry<'a>> {
        for entry in self.iter() {
            let entry = entry?;
            if entry.path.len() == path.len() && entry.path == path {
                return Ok(entry);
            }
        }
        Err(ErrorKind::EntryNotFound(String::from_utf8_lossy(path).into_owned()).into())
    }

    /// The raw (possibly compressed) bytes of an entry, located via its local header.
    pub fn entry_data(&self, entry: &BareZipEntry) -> Result<&'a [u8]> {
        let offset = entry.local_header_offset as usize;
        let header_buf = self.buffer.get(offset..)
            .ok_or(ErrorKind::TruncatedData("local file header"))?;
        let header = nom_to_result("local file header", header_buf, local_file_header(header_buf))?;
        if header.method != entry.method {
            bail!(ErrorKind::LocalHeaderMismatch(entry.path_lossy().into_owned()));
        }

        let start = offset + LOCAL_HEADER_SIZE + header.name_length as usize + header.extra_length as usize;
        let end = start + entry.compressed_size as usize;
        self.buffer.get(start..end)
            .ok_or_else(|| ErrorKind::TruncatedData("entry data").into())
    }

    /// Produce the full uncompressed contents of an entry.  The result is always exactly
    /// `uncompressed_size` bytes long.
    pub fn extract(&self, entry: &BareZipEntry) -> Result<Vec<u8>> {
        let data = self.entry_data(entry)?;
        let size = entry.uncompressed_size as usize;
        match entry.compression() {
            CompressionMethod::Stored => {
                // Trust the uncompressed size; a short copy leaves zeroes, a long one truncates
                if entry.has_stored_size_mismatch() {
                    warn!("stored entry '{}' claims {} bytes but holds {}",
                        entry.path_lossy(), entry.uncompressed_size, entry.compressed_size);
                }
                let mut out = data[..cmp::min(size, data.len())].to_vec();
                out.resize(size, 0);
                Ok(out)
            }
            CompressionMethod::Deflated => inflate_to_vec(data, size),
            CompressionMethod::Unsupported(method) => {
                Err(ErrorKind::UnsupportedMethod(entry.path_lossy().into_owned(), method).into())
            }
        }
    }

    /// Level files under `maps/`.  Unreadable directory records are skipped.
    pub fn iter_maps(&self) -> impl Iterator<Item=BareZipEntry<'a>> {
        self.iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.namespace() == Namespace::Maps && entry.path.to_ascii_lowercase().ends_with(b".bsp")
            })
    }

    pub fn read(&self, path: &[u8]) -> Result<Vec<u8>> {
        let entry = self.find_entry(path)?;
        self.extract(&entry)
    }
}

impl<'a> Archive for BarePk3<'a> {
    fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        self.read(path.as_bytes())
    }

    fn contains(&self, path: &str) -> bool {
        self.find_entry(path.as_bytes()).is_ok()
    }
}


pub struct CentralDirectoryIterator<'a> {
    buffer: &'a [u8],
    remaining_input: &'a [u8],
    remaining_records: u16,
}

impl<'a> Iterator for CentralDirectoryIterator<'a> {
    type Item = Result<BareZipEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining_records == 0 {
            return None;
        }
        self.remaining_records -= 1;

        match central_directory_record(self.remaining_input) {
            Ok((leftovers, entry)) => {
                self.remaining_input = leftovers;
                Some(Ok(entry))
            }
            Err(err) => {
                self.remaining_records = 0;
                Some(nom_to_result("central directory record", self.buffer, Err(err)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining_records as usize))
    }
}
