//! Raw DEFLATE (RFC 1951) decompression.
//!
//! PK3 entries store their data as a bare DEFLATE stream, with no zlib or gzip wrapper, and the
//! central directory tells us exactly how big the output will be.  So rather than growing a
//! buffer, the decoder writes into a caller-provided slice and uses the slice itself as the
//! sliding window for back-references.  All scratch space lives on the stack; nothing survives
//! between calls.

use byteorder::{ByteOrder, LittleEndian};

use ::errors::{ErrorKind, Result};

/// Longest code length DEFLATE allows.
const MAX_BITS: usize = 15;
/// Literal/length codes, including the two that may never appear in valid data.
const MAX_LITERAL_CODES: usize = 286;
const MAX_DISTANCE_CODES: usize = 30;
const FIXED_LITERAL_CODES: usize = 288;
const END_OF_BLOCK: u16 = 256;
/// Most output one input byte can produce: a 258-byte match costs at least two bits.
pub const MAX_EXPANSION: usize = 1032;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31,
    35, 43, 51, 59, 67, 83, 99, 115, 131, 163, 195, 227, 258,
];
const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2,
    3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193,
    257, 385, 513, 769, 1025, 1537, 2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DISTANCE_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6,
    7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13,
];
/// Order in which a dynamic block transmits the code-length code lengths.
const CODE_LENGTH_ORDER: [usize; 19] = [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];


/// LSB-first bit cursor over the compressed bytes.
struct BitCursor<'a> {
    input: &'a [u8],
    position: usize,
    bit_buffer: u32,
    bit_count: u32,
}

impl<'a> BitCursor<'a> {
    fn new(input: &'a [u8]) -> Self {
        BitCursor {
            input,
            position: 0,
            bit_buffer: 0,
            bit_count: 0,
        }
    }

    fn bits(&mut self, count: u32) -> Result<u32> {
        debug_assert!(count <= 16);
        while self.bit_count < count {
            let byte = match self.input.get(self.position) {
                Some(&byte) => byte,
                None => { bail!(ErrorKind::CorruptStream("ran out of input")); }
            };
            self.bit_buffer |= (byte as u32) << self.bit_count;
            self.position += 1;
            self.bit_count += 8;
        }
        let value = self.bit_buffer & ((1u32 << count) - 1);
        self.bit_buffer >>= count;
        self.bit_count -= count;
        Ok(value)
    }

    /// Throw away any bits left in the current byte.  Only whole bytes are ever loaded into the
    /// buffer, so whatever remains is the tail of the last byte read.
    fn align(&mut self) {
        self.bit_buffer = 0;
        self.bit_count = 0;
    }

    fn take_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        debug_assert_eq!(self.bit_count, 0);
        let end = self.position.checked_add(count)
            .ok_or(ErrorKind::CorruptStream("ran out of input"))?;
        if end > self.input.len() {
            bail!(ErrorKind::CorruptStream("ran out of input"));
        }
        let bytes = &self.input[self.position..end];
        self.position = end;
        Ok(bytes)
    }
}


/// Canonical Huffman decoding table: how many codes there are of each length, and the symbols
/// sorted by code.
struct Huffman {
    counts: [u16; MAX_BITS + 1],
    symbols: [u16; FIXED_LITERAL_CODES],
}

/// How complete a set of code lengths turned out to be.
enum Completeness {
    Complete,
    /// Some codes were left unused; only legal in a couple of degenerate cases.
    Incomplete,
}

impl Huffman {
    fn new(lengths: &[u8]) -> Result<(Huffman, Completeness)> {
        let mut huffman = Huffman {
            counts: [0; MAX_BITS + 1],
            symbols: [0; FIXED_LITERAL_CODES],
        };
        for &length in lengths {
            huffman.counts[length as usize] += 1;
        }
        if huffman.counts[0] as usize == lengths.len() {
            // No codes at all.  Decoding will fail if anything tries to use this table.
            return Ok((huffman, Completeness::Incomplete));
        }

        let mut left: i32 = 1;
        for length in 1..(MAX_BITS + 1) {
            left <<= 1;
            left -= huffman.counts[length] as i32;
            if left < 0 {
                bail!(ErrorKind::CorruptStream("over-subscribed code lengths"));
            }
        }

        let mut offsets = [0u16; MAX_BITS + 1];
        for length in 1..MAX_BITS {
            offsets[length + 1] = offsets[length] + huffman.counts[length];
        }
        for (symbol, &length) in lengths.iter().enumerate() {
            if length != 0 {
                huffman.symbols[offsets[length as usize] as usize] = symbol as u16;
                offsets[length as usize] += 1;
            }
        }

        let completeness = if left > 0 { Completeness::Incomplete } else { Completeness::Complete };
        Ok((huffman, completeness))
    }

    /// Whether every code in the set is one bit long, the only shape an incomplete code may take.
    fn single_short_code(&self, total: usize) -> bool {
        total - self.counts[0] as usize == self.counts[1] as usize
    }

    fn decode(&self, cursor: &mut BitCursor) -> Result<u16> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for length in 1..(MAX_BITS + 1) {
            code |= cursor.bits(1)? as i32;
            let count = self.counts[length] as i32;
            if code - count < first {
                return Ok(self.symbols[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Err(ErrorKind::CorruptStream("ran out of codes").into())
    }
}


/// Output side: the destination slice plus how much of it has been written.
struct Window<'o> {
    out: &'o mut [u8],
    written: usize,
}

impl<'o> Window<'o> {
    fn push(&mut self, byte: u8) -> Result<()> {
        if self.written >= self.out.len() {
            bail!(ErrorKind::CorruptStream("output overflow"));
        }
        self.out[self.written] = byte;
        self.written += 1;
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.written + bytes.len();
        if end > self.out.len() {
            bail!(ErrorKind::CorruptStream("output overflow"));
        }
        self.out[self.written..end].copy_from_slice(bytes);
        self.written = end;
        Ok(())
    }

    fn copy_back(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance > self.written {
            bail!(ErrorKind::CorruptStream("distance too far back"));
        }
        if self.written + length > self.out.len() {
            bail!(ErrorKind::CorruptStream("output overflow"));
        }
        // Byte at a time, since the source and destination may overlap
        for _ in 0..length {
            self.out[self.written] = self.out[self.written - distance];
            self.written += 1;
        }
        Ok(())
    }
}


fn stored_block(cursor: &mut BitCursor, window: &mut Window) -> Result<()> {
    cursor.align();
    let header = cursor.take_bytes(4)?;
    let length = LittleEndian::read_u16(&header[0..2]);
    let complement = LittleEndian::read_u16(&header[2..4]);
    if length != !complement {
        bail!(ErrorKind::CorruptStream("stored block length does not match its complement"));
    }
    let bytes = cursor.take_bytes(length as usize)?;
    window.extend(bytes)
}

fn compressed_block(cursor: &mut BitCursor, window: &mut Window, literals: &Huffman, distances: &Huffman) -> Result<()> {
    loop {
        let symbol = literals.decode(cursor)?;
        if symbol < 256 {
            window.push(symbol as u8)?;
        }
        else if symbol == END_OF_BLOCK {
            return Ok(());
        }
        else {
            let length_index = (symbol - 257) as usize;
            if length_index >= LENGTH_BASE.len() {
                bail!(ErrorKind::CorruptStream("invalid length symbol"));
            }
            let length = LENGTH_BASE[length_index] as usize
                + cursor.bits(LENGTH_EXTRA[length_index] as u32)? as usize;

            let distance_index = distances.decode(cursor)? as usize;
            if distance_index >= DISTANCE_BASE.len() {
                bail!(ErrorKind::CorruptStream("invalid distance symbol"));
            }
            let distance = DISTANCE_BASE[distance_index] as usize
                + cursor.bits(DISTANCE_EXTRA[distance_index] as u32)? as usize;

            window.copy_back(distance, length)?;
        }
    }
}

fn fixed_tables() -> Result<(Huffman, Huffman)> {
    let mut lengths = [0u8; FIXED_LITERAL_CODES];
    for (symbol, length) in lengths.iter_mut().enumerate() {
        *length = match symbol {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8,
        };
    }
    let (literals, _) = Huffman::new(&lengths)?;
    let (distances, _) = Huffman::new(&[5u8; MAX_DISTANCE_CODES])?;
    Ok((literals, distances))
}

fn dynamic_tables(cursor: &mut BitCursor) -> Result<(Huffman, Huffman)> {
    let literal_count = cursor.bits(5)? as usize + 257;
    let distance_count = cursor.bits(5)? as usize + 1;
    let code_length_count = cursor.bits(4)? as usize + 4;
    if literal_count > MAX_LITERAL_CODES || distance_count > MAX_DISTANCE_CODES {
        bail!(ErrorKind::CorruptStream("too many length or distance codes"));
    }

    let mut code_lengths = [0u8; 19];
    for &slot in CODE_LENGTH_ORDER.iter().take(code_length_count) {
        code_lengths[slot] = cursor.bits(3)? as u8;
    }
    let code_length_code = match Huffman::new(&code_lengths)? {
        (huffman, Completeness::Complete) => huffman,
        (_, Completeness::Incomplete) => { bail!(ErrorKind::CorruptStream("incomplete code-length code")); }
    };

    // Literal/length and distance lengths are sent as one run, so repeats may straddle the two
    let total = literal_count + distance_count;
    let mut lengths = [0u8; MAX_LITERAL_CODES + MAX_DISTANCE_CODES];
    let mut index = 0;
    while index < total {
        let symbol = code_length_code.decode(cursor)?;
        if symbol < 16 {
            lengths[index] = symbol as u8;
            index += 1;
            continue;
        }

        let (value, repeat) = match symbol {
            16 => {
                if index == 0 {
                    bail!(ErrorKind::CorruptStream("repeat with no previous length"));
                }
                (lengths[index - 1], 3 + cursor.bits(2)? as usize)
            }
            17 => (0, 3 + cursor.bits(3)? as usize),
            _ => (0, 11 + cursor.bits(7)? as usize),
        };
        if index + repeat > total {
            bail!(ErrorKind::CorruptStream("too many lengths"));
        }
        for length in lengths[index..index + repeat].iter_mut() {
            *length = value;
        }
        index += repeat;
    }

    if lengths[END_OF_BLOCK as usize] == 0 {
        bail!(ErrorKind::CorruptStream("no end-of-block code"));
    }

    let (literals, completeness) = Huffman::new(&lengths[..literal_count])?;
    if let Completeness::Incomplete = completeness {
        if !literals.single_short_code(literal_count) {
            bail!(ErrorKind::CorruptStream("incomplete literal/length code"));
        }
    }
    let (distances, completeness) = Huffman::new(&lengths[literal_count..total])?;
    if let Completeness::Incomplete = completeness {
        if !distances.single_short_code(distance_count) {
            bail!(ErrorKind::CorruptStream("incomplete distance code"));
        }
    }
    Ok((literals, distances))
}


/// Decompress a raw DEFLATE stream into `out`, returning how many bytes were written.
///
/// Decoding stops after the block flagged as final; anything after it in `compressed` is
/// ignored.  `out` must already be as large as the expected output, since it doubles as the
/// back-reference window; running past its end is an error.
pub fn inflate(compressed: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut cursor = BitCursor::new(compressed);
    let mut window = Window { out, written: 0 };

    loop {
        let is_final = cursor.bits(1)? == 1;
        match cursor.bits(2)? {
            0 => stored_block(&mut cursor, &mut window)?,
            1 => {
                let (literals, distances) = fixed_tables()?;
                compressed_block(&mut cursor, &mut window, &literals, &distances)?;
            }
            2 => {
                let (literals, distances) = dynamic_tables(&mut cursor)?;
                compressed_block(&mut cursor, &mut window, &literals, &distances)?;
            }
            _ => { bail!(ErrorKind::CorruptStream("invalid block type")); }
        }
        if is_final {
            break;
        }
    }

    Ok(window.written)
}

/// Decompress into a freshly allocated buffer of exactly `uncompressed_len` bytes.  A stream that
/// ends early counts as corrupt, since the archive promised more.
pub fn inflate_to_vec(compressed: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    if uncompressed_len > compressed.len().saturating_mul(MAX_EXPANSION) {
        bail!(ErrorKind::CorruptStream("expected length is more than the stream could produce"));
    }
    let mut out = vec![0u8; uncompressed_len];
    let written = inflate(compressed, &mut out)?;
    if written != uncompressed_len {
        bail!(ErrorKind::CorruptStream("stream ended before the expected length"));
    }
    Ok(out)
}


#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::DeflateEncoder;

    use super::*;
    use ::errors::{Error, ErrorKind};

    /// Just enough of an encoder to hand-assemble fixed-Huffman and stored blocks.
    struct BitWriter {
        bytes: Vec<u8>,
        bit_count: usize,
    }

    impl BitWriter {
        fn new() -> Self {
            BitWriter { bytes: Vec::new(), bit_count: 0 }
        }

        fn put(&mut self, value: u32, count: usize) {
            for i in 0..count {
                if self.bit_count % 8 == 0 {
                    self.bytes.push(0);
                }
                let bit = ((value >> i) & 1) as u8;
                let last = self.bytes.len() - 1;
                self.bytes[last] |= bit << (self.bit_count % 8);
                self.bit_count += 1;
            }
        }

        /// Huffman codes go out most significant bit first.
        fn put_code(&mut self, code: u32, count: usize) {
            for i in (0..count).rev() {
                self.put((code >> i) & 1, 1);
            }
        }

        fn fixed_literal(&mut self, symbol: u32) {
            match symbol {
                0..=143 => self.put_code(0x30 + symbol, 8),
                144..=255 => self.put_code(0x190 + symbol - 144, 9),
                256..=279 => self.put_code(symbol - 256, 7),
                _ => self.put_code(0xc0 + symbol - 280, 8),
            }
        }

        fn align(&mut self) {
            self.bit_count = self.bytes.len() * 8;
        }

        fn stored(&mut self, is_final: bool, data: &[u8]) {
            self.put(is_final as u32, 1);
            self.put(0, 2);
            self.align();
            let length = data.len() as u16;
            self.bytes.extend_from_slice(&[length as u8, (length >> 8) as u8]);
            self.bytes.extend_from_slice(&[!length as u8, (!length >> 8) as u8]);
            self.bytes.extend_from_slice(data);
            self.bit_count = self.bytes.len() * 8;
        }
    }

    fn deflate(data: &[u8], level: Compression) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), level);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn sample_text() -> Vec<u8> {
        let mut text = Vec::new();
        for i in 0..400 {
            write!(&mut text, "{{ \"classname\" \"light\" \"origin\" \"{} {} {}\" \"light\" \"{}\" }}\n",
                i * 16, (i * 7) % 512, -(i as i32) * 3, 100 + i % 50).unwrap();
        }
        text
    }

    fn assert_corrupt(err: Error) {
        match *err.kind() {
            ErrorKind::CorruptStream(_) => {}
            ref other => panic!("expected a corrupt stream, got {:?}", other),
        }
    }

    #[test]
    fn single_fixed_literal() {
        // "a" as emitted by zlib at any compression level
        let mut out = [0u8; 1];
        assert_eq!(inflate(&[0x4b, 0x04, 0x00], &mut out).unwrap(), 1);
        assert_eq!(&out, b"a");
    }

    #[test]
    fn fixed_block_with_overlapping_back_reference() {
        let mut writer = BitWriter::new();
        writer.put(1, 1);
        writer.put(1, 2);
        for &byte in b"abc" {
            writer.fixed_literal(byte as u32);
        }
        // length 7 is symbol 261, distance 3 is distance code 2
        writer.fixed_literal(261);
        writer.put_code(2, 5);
        writer.fixed_literal(256);

        let out = inflate_to_vec(&writer.bytes, 10).unwrap();
        assert_eq!(&out[..], b"abcabcabca");
    }

    #[test]
    fn stored_then_fixed_in_one_stream() {
        let mut writer = BitWriter::new();
        writer.stored(false, b"hello ");
        writer.put(1, 1);
        writer.put(1, 2);
        for &byte in b"world" {
            writer.fixed_literal(byte as u32);
        }
        writer.fixed_literal(256);

        let out = inflate_to_vec(&writer.bytes, 11).unwrap();
        assert_eq!(&out[..], b"hello world");
    }

    #[test]
    fn stored_only_stream_from_encoder() {
        let text = sample_text();
        let compressed = deflate(&text, Compression::none());
        assert_eq!(inflate_to_vec(&compressed, text.len()).unwrap(), text);
    }

    #[test]
    fn dynamic_stream_from_encoder() {
        let text = sample_text();
        let compressed = deflate(&text, Compression::best());
        assert!(compressed.len() < text.len());
        assert_eq!(inflate_to_vec(&compressed, text.len()).unwrap(), text);
    }

    #[test]
    fn multiple_blocks_from_encoder() {
        // Large, partly incompressible input makes the encoder split it across blocks
        let mut data = Vec::new();
        let mut state: u32 = 0x1234_5678;
        for i in 0..200_000u32 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            if (i / 4096) % 2 == 0 {
                data.push((state >> 16) as u8);
            }
            else {
                data.push(b"lightmap"[(i % 8) as usize]);
            }
        }
        let compressed = deflate(&data, Compression::default());
        assert_eq!(inflate_to_vec(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn trailing_garbage_is_ignored() {
        let mut out = [0u8; 1];
        assert_eq!(inflate(&[0x4b, 0x04, 0x00, 0xde, 0xad], &mut out).unwrap(), 1);
    }

    #[test]
    fn invalid_block_type() {
        let mut out = [0u8; 16];
        assert_corrupt(inflate(&[0x07], &mut out).unwrap_err());
    }

    #[test]
    fn distance_before_start_of_output() {
        let mut writer = BitWriter::new();
        writer.put(1, 1);
        writer.put(1, 2);
        writer.fixed_literal(b'x' as u32);
        // length 3, distance 2: only one byte exists so far
        writer.fixed_literal(257);
        writer.put_code(1, 5);
        writer.fixed_literal(256);

        let mut out = [0u8; 16];
        assert_corrupt(inflate(&writer.bytes, &mut out).unwrap_err());
    }

    #[test]
    fn output_overflow() {
        let mut writer = BitWriter::new();
        writer.put(1, 1);
        writer.put(1, 2);
        for &byte in b"abc" {
            writer.fixed_literal(byte as u32);
        }
        writer.fixed_literal(256);

        let mut out = [0u8; 2];
        assert_corrupt(inflate(&writer.bytes, &mut out).unwrap_err());
    }

    #[test]
    fn stored_length_mismatch() {
        let mut bytes = vec![0x01, 0x03, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(b"abc");
        let mut out = [0u8; 3];
        assert_corrupt(inflate(&bytes, &mut out).unwrap_err());
    }

    #[test]
    fn truncated_input() {
        let text = sample_text();
        let compressed = deflate(&text, Compression::best());
        let half = &compressed[..compressed.len() / 2];
        assert_corrupt(inflate_to_vec(half, text.len()).unwrap_err());
    }

    #[test]
    fn short_output_is_corrupt() {
        assert_corrupt(inflate_to_vec(&[0x4b, 0x04, 0x00], 2).unwrap_err());
    }

    #[test]
    fn impossible_length_is_rejected_up_front() {
        assert_corrupt(inflate_to_vec(&[0x03, 0x00], usize::max_value()).unwrap_err());
        assert_corrupt(inflate_to_vec(&[], 1).unwrap_err());
    }

    #[test]
    fn over_subscribed_lengths_are_rejected() {
        assert!(Huffman::new(&[1, 1, 1]).is_err());
    }
}
