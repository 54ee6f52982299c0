//! Single-stream decompression for index payloads.
//!
//! Catalogs publish their index as one xz stream; a single gzip member is
//! accepted as well. The format is picked from the leading magic bytes.
//!
//! The whole payload is decoded into memory. The output buffer grows in
//! fixed steps as data arrives; the size hints of the decoders are never
//! trusted.

use std::fmt;
use std::io::{BufRead, BufReader, Cursor, Read};

use flate2::bufread::GzDecoder;
use tracing::debug;
use xz2::stream::{Action, Status, Stream};

use crate::error::{SyncError, SyncResult};

const XZ_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const OUTPUT_STEP: usize = 64 * 1024;

/// Container formats understood by [`extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// One `.xz` stream (LZMA2).
    Xz,
    /// One gzip member (deflate).
    Gzip,
}

impl CompressionFormat {
    /// Identify the format from the first bytes of a payload.
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(&XZ_MAGIC) {
            Some(Self::Xz)
        } else if header.starts_with(&GZIP_MAGIC) {
            Some(Self::Gzip)
        } else {
            None
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xz => write!(f, "xz"),
            Self::Gzip => write!(f, "gzip"),
        }
    }
}

/// Fully decompress a stream holding exactly one xz stream or gzip member.
///
/// # Errors
///
/// Returns [`SyncError::Decompression`] if:
/// - the input is empty or starts with neither magic
/// - the payload is corrupt or truncated
/// - any bytes follow the end of the payload
pub fn extract<R: Read>(mut input: R) -> SyncResult<Vec<u8>> {
    let mut header = Vec::with_capacity(XZ_MAGIC.len());
    (&mut input)
        .take(XZ_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .map_err(|e| SyncError::Decompression(format!("cannot read compressed data: {}", e)))?;
    if header.is_empty() {
        return Err(SyncError::Decompression(
            "compressed stream is empty".to_string(),
        ));
    }
    let format = CompressionFormat::detect(&header).ok_or_else(|| {
        SyncError::Decompression("unrecognized compression format".to_string())
    })?;

    let mut reader = BufReader::new(Cursor::new(header).chain(input));
    let mut content = Vec::new();
    let mut rest = match format {
        CompressionFormat::Xz => {
            decode_xz(&mut reader, &mut content)?;
            reader
        }
        CompressionFormat::Gzip => {
            let mut decoder = GzDecoder::new(reader);
            decoder
                .read_to_end(&mut content)
                .map_err(|e| SyncError::Decompression(e.to_string()))?;
            decoder.into_inner()
        }
    };

    let trailing = rest
        .fill_buf()
        .map_err(|e| SyncError::Decompression(format!("cannot read past payload: {}", e)))?;
    if !trailing.is_empty() {
        return Err(SyncError::Decompression(
            "remaining data found after end of compressed payload".to_string(),
        ));
    }

    debug!(%format, bytes = content.len(), "Extracted compressed payload");
    Ok(content)
}

/// Decode one xz stream, consuming exactly its bytes from `reader`.
fn decode_xz<R: BufRead>(reader: &mut R, content: &mut Vec<u8>) -> SyncResult<()> {
    // No CONCATENATED flag: decoding stops at the first stream footer.
    let mut stream = Stream::new_stream_decoder(u64::MAX, 0)
        .map_err(|e| SyncError::Decompression(e.to_string()))?;

    loop {
        if content.capacity() - content.len() < OUTPUT_STEP {
            content.reserve(OUTPUT_STEP);
        }

        let input = reader
            .fill_buf()
            .map_err(|e| SyncError::Decompression(format!("cannot read compressed data: {}", e)))?;
        let eof = input.is_empty();
        let before_in = stream.total_in();
        let before_out = stream.total_out();
        let status = stream
            .process_vec(input, content, Action::Run)
            .map_err(|e| SyncError::Decompression(format!("corrupt xz stream: {}", e)))?;
        let consumed = (stream.total_in() - before_in) as usize;
        let produced = stream.total_out() - before_out;
        reader.consume(consumed);

        if status == Status::StreamEnd {
            return Ok(());
        }
        if consumed == 0 && produced == 0 {
            let reason = if eof {
                "xz stream ended before its footer"
            } else {
                "xz decoder made no progress"
            };
            return Err(SyncError::Decompression(reason.to_string()));
        }
    }
}
