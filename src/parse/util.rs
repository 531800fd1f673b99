use std::str;

use nom::{self, IResult, Needed};

/// nom error code for a name field containing something other than printable ASCII.
pub const BOGUS_NAME_CODE: u32 = 2;


/// Read a NUL-padded ASCII name occupying exactly `len` bytes.  Whatever follows the first NUL is
/// padding and is skipped without being checked, since compilers don't always zero it.
pub fn fixed_length_ascii(input: &[u8], len: usize) -> IResult<&[u8], &str> {
    if input.len() < len {
        return Err(nom::Err::Incomplete(Needed::Size(len)));
    }

    for i in 0..len {
        match input[i] {
            0 => {
                // This is the end
                let s = unsafe { str::from_utf8_unchecked(&input[..i]) };
                return Ok((&input[len..], s));
            }
            32..=126 => {
                // OK
            }
            _ => {
                // Totally bogus character
                return Err(nom::Err::Error(nom::Context::Code(&input[i..], nom::ErrorKind::Custom(BOGUS_NAME_CODE))));
            }
        }
    }

    Ok((&input[len..], unsafe { str::from_utf8_unchecked(&input[..len]) }))
}

/// Succeeds only on an empty slice.  Used to make sure a lump was consumed entirely.
pub fn naive_eof(input: &[u8]) -> IResult<&[u8], ()> {
    if input.is_empty() {
        Ok((input, ()))
    }
    else {
        Err(nom::Err::Error(nom::Context::Code(input, nom::ErrorKind::Eof)))
    }
}
