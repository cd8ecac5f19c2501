//! Reversible byte transforms applied to entity payloads.
//!
//! `decode(encode(b)) == b` for every codec and every input. Codecs compose
//! through [`CodecChain`], an explicit ordered list of stages applied forward
//! on encode and in reverse on decode, so a pipeline like snappy-over-raw is
//! introspectable and each stage testable in isolation. None of the codecs
//! assume a maximum payload size.

use std::io::{Read, Write};

use crate::error::CodecError;

/// A reversible byte transform.
pub trait Codec: Send + Sync {
    /// Stable name used in error messages and logs.
    fn name(&self) -> &'static str;
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

fn encode_err(codec: &'static str, source: std::io::Error) -> CodecError {
    CodecError::Encode { codec, source }
}

fn decode_err(codec: &'static str, source: std::io::Error) -> CodecError {
    CodecError::Decode { codec, source }
}

/// Pass-through codec, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Codec for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(input.to_vec())
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(input.to_vec())
    }
}

/// Gzip (DEFLATE with gzip framing).
#[derive(Debug, Clone, Copy, Default)]
pub struct Gzip;

impl Codec for Gzip {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(input).map_err(|e| encode_err("gzip", e))?;
        enc.finish().map_err(|e| encode_err("gzip", e))
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(input)
            .read_to_end(&mut out)
            .map_err(|e| decode_err("gzip", e))?;
        Ok(out)
    }
}

/// Snappy raw block format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snappy;

impl Codec for Snappy {
    fn name(&self) -> &'static str {
        "snappy"
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        snap::raw::Encoder::new().compress_vec(input).map_err(|e| {
            encode_err(
                "snappy",
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        snap::raw::Decoder::new()
            .decompress_vec(input)
            .map_err(|e| {
                decode_err(
                    "snappy",
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                )
            })
    }
}

/// Zstandard.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    /// Compression level; 0 selects the zstd default.
    pub level: i32,
}

impl Default for Zstd {
    fn default() -> Self {
        Zstd { level: 0 }
    }
}

impl Codec for Zstd {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(input, self.level).map_err(|e| encode_err("zstd", e))
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(input).map_err(|e| decode_err("zstd", e))
    }
}

/// Ordered list of codec stages.
///
/// Encode applies stages first-to-last; decode applies them last-to-first.
/// An empty chain is the identity transform.
#[derive(Default)]
pub struct CodecChain {
    stages: Vec<Box<dyn Codec>>,
}

impl CodecChain {
    /// The identity chain (no stages).
    pub fn identity() -> Self {
        CodecChain { stages: Vec::new() }
    }

    pub fn new(stages: Vec<Box<dyn Codec>>) -> Self {
        CodecChain { stages }
    }

    /// Single-stage convenience constructor.
    pub fn single(codec: impl Codec + 'static) -> Self {
        CodecChain {
            stages: vec![Box::new(codec)],
        }
    }

    /// Append a stage; it runs after the existing ones on encode.
    pub fn push(mut self, codec: impl Codec + 'static) -> Self {
        self.stages.push(Box::new(codec));
        self
    }

    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names, outermost last.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|c| c.name()).collect()
    }
}

impl Codec for CodecChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut cur = input.to_vec();
        for stage in &self.stages {
            cur = stage.encode(&cur)?;
        }
        Ok(cur)
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut cur = input.to_vec();
        for stage in self.stages.iter().rev() {
            cur = stage.decode(&cur)?;
        }
        Ok(cur)
    }
}

impl std::fmt::Debug for CodecChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}
