//! Compressed RTF support ([MS-OXRTFCP]).
//!
//! Outlook stores the encapsulating RTF stream LZFu-compressed in the
//! `PR_RTF_COMPRESSED` property, or raw behind a `MELA` header. The facade
//! detects either signature and decompresses before de-encapsulation.
//! Compression is never produced here; round-tripping back to RTF is out of
//! scope.

use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy_derive::{FromBytes as DeriveFromBytes, Immutable, KnownLayout};

/// Magic signature for LZFu-compressed RTF.
const COMPRESSED_SIGNATURE: &[u8; 4] = b"LZFu";

/// Magic signature for raw RTF stored behind a compression header.
const UNCOMPRESSED_SIGNATURE: &[u8; 4] = b"MELA";

/// Initial dictionary contents, fixed by the protocol.
const INIT_DICT: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}\
{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArial\
Times New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\
\\b\\i\\u\\tab\\tx";

/// Size of the initial dictionary contents.
const INIT_DICT_SIZE: usize = 207;

/// Sliding dictionary size.
const MAX_DICT_SIZE: usize = 4096;

/// Compressed RTF header (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, DeriveFromBytes, Immutable, KnownLayout)]
struct CompressedRtfHeader {
    /// Total size of the stream excluding this field (little-endian)
    compressed_size: [u8; 4],
    /// Size of the uncompressed data (little-endian)
    raw_size: [u8; 4],
    /// Compression type signature
    compression_type: [u8; 4],
    /// CRC32 over the compressed payload (little-endian)
    crc32: [u8; 4],
}

impl CompressedRtfHeader {
    #[inline]
    fn compressed_size(&self) -> u32 {
        u32::from_le_bytes(self.compressed_size)
    }

    #[inline]
    fn raw_size(&self) -> u32 {
        u32::from_le_bytes(self.raw_size)
    }

    #[inline]
    fn crc32(&self) -> u32 {
        u32::from_le_bytes(self.crc32)
    }
}

/// Detect a compressed RTF stream by its header signature.
pub fn is_compressed_rtf(data: &[u8]) -> bool {
    if data.len() < 16 {
        return false;
    }
    let signature = &data[8..12];
    signature == COMPRESSED_SIGNATURE || signature == UNCOMPRESSED_SIGNATURE
}

/// Decompress a `LZFu`/`MELA` stream into raw RTF bytes.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 16 {
        return Err(Error::MalformedRtf(
            "compressed RTF header must be at least 16 bytes".to_string(),
        ));
    }
    let header = CompressedRtfHeader::read_from_bytes(&data[..16])
        .map_err(|_| Error::MalformedRtf("failed to read compressed RTF header".to_string()))?;
    let payload = &data[16..];

    // COMPSIZE counts everything after its own field; tolerate writers that
    // get it wrong, but note the discrepancy.
    let declared = header.compressed_size() as usize;
    if declared != payload.len() + 12 {
        log::debug!(
            "compressed RTF header declares {} byte(s), stream carries {}",
            declared,
            payload.len() + 12
        );
    }

    match &header.compression_type {
        sig if sig == COMPRESSED_SIGNATURE => decompress_lzfu(payload, &header),
        sig if sig == UNCOMPRESSED_SIGNATURE => {
            // MELA carries the body raw; CRC is defined to be zero.
            if header.crc32() != 0 {
                return Err(Error::MalformedRtf(
                    "CRC32 must be zero for an uncompressed (MELA) stream".to_string(),
                ));
            }
            let size = (header.raw_size() as usize).min(payload.len());
            Ok(payload[..size].to_vec())
        },
        other => Err(Error::MalformedRtf(format!(
            "unknown RTF compression type {:?}",
            other
        ))),
    }
}

/// LZFu proper: a 4 KiB sliding dictionary pre-seeded with common RTF text,
/// control bytes selecting literal versus (offset, length) reference tokens.
fn decompress_lzfu(payload: &[u8], header: &CompressedRtfHeader) -> Result<Vec<u8>> {
    let crc = crc_fast::checksum(crc_fast::CrcAlgorithm::Crc32IsoHdlc, payload) as u32;
    if crc != header.crc32() {
        return Err(Error::MalformedRtf(format!(
            "compressed RTF CRC32 mismatch: header says {:#010x}, payload hashes to {:#010x}",
            header.crc32(),
            crc
        )));
    }

    let mut dict = [b' '; MAX_DICT_SIZE];
    dict[..INIT_DICT_SIZE].copy_from_slice(INIT_DICT);
    let mut write_offset = INIT_DICT_SIZE;

    let mut output = Vec::with_capacity(header.raw_size() as usize);
    let mut pos = 0;

    'stream: while pos < payload.len() {
        let control = payload[pos];
        pos += 1;

        for bit in 0..8 {
            if control & (1 << bit) != 0 {
                // Reference token: 12-bit dictionary offset, 4-bit length.
                let Some(token) = payload.get(pos..pos + 2) else {
                    break 'stream;
                };
                pos += 2;
                let token = u16::from_be_bytes([token[0], token[1]]);
                let offset = (token >> 4) as usize;
                let length = (token & 0x0F) as usize + 2;

                // A reference to the current write position ends the stream.
                if offset == write_offset {
                    log::debug!("decompressed {} RTF byte(s)", output.len());
                    return Ok(output);
                }

                for step in 0..length {
                    let byte = dict[(offset + step) % MAX_DICT_SIZE];
                    output.push(byte);
                    dict[write_offset] = byte;
                    write_offset = (write_offset + 1) % MAX_DICT_SIZE;
                }
            } else {
                let Some(&byte) = payload.get(pos) else {
                    break 'stream;
                };
                pos += 1;
                output.push(byte);
                dict[write_offset] = byte;
                write_offset = (write_offset + 1) % MAX_DICT_SIZE;
            }
        }
    }

    // Streams without an explicit end token simply run out of payload.
    log::debug!("decompressed {} RTF byte(s)", output.len());
    Ok(output)
}
