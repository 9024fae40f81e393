//! Block-level concatenation of BGZF files.
//!
//! A BGZF file is a series of independent gzip members, terminated by a
//! fixed empty block. Concatenating the members of several files, with only
//! the final terminator kept, gives a valid BGZF file whose decompressed
//! content is the concatenation of the inputs. No data is recompressed.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::consolidate::ConsolidateError;

/// The empty block that ends every BGZF file
pub const EOF_BLOCK: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// gzip magic, deflate, FEXTRA set, then the `BC` extra subfield
const BLOCK_HEADER_LEN: usize = 18;

fn is_block_header(buf: &[u8]) -> bool {
    buf.len() >= BLOCK_HEADER_LEN
        && buf[..4] == [0x1f, 0x8b, 0x08, 0x04]
        && buf[12..14] == [b'B', b'C']
        && buf[14..16] == [0x02, 0x00]
}

/// Append the blocks of each input to `out` in order, then one EOF block.
///
/// Each input must start with a BGZF block header. A trailing EOF block is
/// dropped from each input; inputs without one are copied whole.
///
/// # Errors
///
/// Returns `ConsolidateError::NotBgzf` for an input that is not BGZF, or
/// `ConsolidateError::Io` on read or write failure.
pub fn concat<P, W>(inputs: &[P], out: &mut W) -> Result<u64, ConsolidateError>
where
    P: AsRef<Path>,
    W: Write,
{
    let mut written = 0;

    for input in inputs {
        let path = input.as_ref();
        let io_error = |source| ConsolidateError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_error)?;
        let len = file.metadata().map_err(io_error)?.len();
        let data_len = block_data_len(&mut file, len)
            .map_err(io_error)?
            .ok_or_else(|| ConsolidateError::NotBgzf(path.to_path_buf()))?;

        file.seek(SeekFrom::Start(0)).map_err(io_error)?;
        written += io::copy(&mut file.take(data_len), out).map_err(io_error)?;
    }

    out.write_all(&EOF_BLOCK).map_err(|source| ConsolidateError::Io {
        path: "<concatenated output>".into(),
        source,
    })?;
    Ok(written + EOF_BLOCK.len() as u64)
}

/// Length of `file` without its trailing EOF block, or `None` if the file
/// does not start with a BGZF block.
fn block_data_len(file: &mut File, len: u64) -> io::Result<Option<u64>> {
    if len < BLOCK_HEADER_LEN as u64 {
        return Ok(None);
    }

    let mut header = [0u8; BLOCK_HEADER_LEN];
    file.read_exact(&mut header)?;
    if !is_block_header(&header) {
        return Ok(None);
    }

    let eof_len = EOF_BLOCK.len() as u64;
    if len >= eof_len {
        let mut tail = [0u8; EOF_BLOCK.len()];
        file.seek(SeekFrom::Start(len - eof_len))?;
        file.read_exact(&mut tail)?;
        if tail == EOF_BLOCK {
            return Ok(Some(len - eof_len));
        }
    }

    Ok(Some(len))
}
