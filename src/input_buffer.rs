use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use memmap::{Mmap, MmapOptions};

use errors::Result;

/// The whole of an archive, as one byte slice, however it was obtained.
///
/// Archives are read entirely up front; everything downstream borrows from `bytes()`, so the
/// buffer has to outlive any parsed archive or level.
pub enum InputBuffer {
    Stdin(Vec<u8>),
    File(Mmap),
    Memory(Vec<u8>),
}

impl InputBuffer {
    /// Reads all of `stdin` into memory.
    pub fn new_from_stdin() -> Result<InputBuffer> {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;

        Ok(InputBuffer::Stdin(buf))
    }

    /// Maps a file read-only.  An empty file can't be mapped, so it's read as an empty buffer
    /// instead.
    pub fn new_from_file<P>(path: P) -> Result<InputBuffer>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(InputBuffer::Memory(Vec::new()));
        }
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(InputBuffer::File(mmap))
    }

    /// `-` means stdin, as is tradition; anything else is a file.
    pub fn open(name: &str) -> Result<InputBuffer> {
        if name == "-" {
            InputBuffer::new_from_stdin()
        }
        else {
            InputBuffer::new_from_file(name)
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match *self {
            InputBuffer::Stdin(ref v) | InputBuffer::Memory(ref v) => &*v,
            InputBuffer::File(ref m) => &*m,
        }
    }
}
