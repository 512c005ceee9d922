//! Streaming body compression.
//!
//! A [`Compressor`] is fed body slices one by one and hands back whatever
//! compressed output the underlying codec produced so far, which is often
//! nothing for small inputs. [`Compressor::finish`] flushes the rest of the
//! stream, trailer included.

use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};
use std::fmt;
use std::io;
use std::io::Write;
use tracing::trace;
use zstd::stream::write::Encoder as ZstdEncoder;

/// Content codings a body can be compressed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCoding {
    /// raw deflate stream, no zlib header
    Deflate,
    Gzip,
    Zstd,
    Br,
}

impl ContentCoding {
    /// The token used in `Content-Encoding` and `Accept-Encoding`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Deflate => "deflate",
            ContentCoding::Gzip => "gzip",
            ContentCoding::Zstd => "zstd",
            ContentCoding::Br => "br",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "deflate" => Some(ContentCoding::Deflate),
            "gzip" | "x-gzip" => Some(ContentCoding::Gzip),
            "zstd" => Some(ContentCoding::Zstd),
            "br" => Some(ContentCoding::Br),
            _ => None,
        }
    }

    /// Picks a coding from an `Accept-Encoding` value, preferring zstd, then br, gzip and deflate.
    ///
    /// Quality values are not weighed, but codings explicitly refused with `q=0` are skipped.
    pub fn select(accept_encoding: &str) -> Option<Self> {
        let accepted = accept_encoding
            .split(',')
            .filter_map(|part| {
                let mut params = part.split(';');
                let coding = Self::from_token(params.next()?)?;
                let refused = params.any(|param| {
                    param.trim().strip_prefix("q=").is_some_and(|q| q.trim().parse::<f32>().is_ok_and(|q| q <= 0.0))
                });
                (!refused).then_some(coding)
            })
            .collect::<Vec<_>>();

        [ContentCoding::Zstd, ContentCoding::Br, ContentCoding::Gzip, ContentCoding::Deflate]
            .into_iter()
            .find(|coding| accepted.contains(coding))
    }
}

impl fmt::Display for ContentCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collects compressed output until it is taken.
struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Inner {
    Deflate(DeflateEncoder<Writer>),
    Gzip(GzEncoder<Writer>),
    Zstd(ZstdEncoder<'static, Writer>),
    Br(Box<brotli::CompressorWriter<Writer>>),
}

/// A streaming compressor for one body.
pub struct Compressor {
    coding: ContentCoding,
    inner: Inner,
}

impl Compressor {
    pub fn new(coding: ContentCoding) -> io::Result<Self> {
        let inner = match coding {
            ContentCoding::Deflate => Inner::Deflate(DeflateEncoder::new(Writer::new(), Compression::default())),
            ContentCoding::Gzip => Inner::Gzip(GzEncoder::new(Writer::new(), Compression::default())),
            ContentCoding::Zstd => Inner::Zstd(ZstdEncoder::new(Writer::new(), 6)?),
            ContentCoding::Br => Inner::Br(Box::new(brotli::CompressorWriter::new(
                Writer::new(),
                32 * 1024, // 32 KiB buffer
                3,         // BROTLI_PARAM_QUALITY
                22,        // BROTLI_PARAM_LGWIN
            ))),
        };
        Ok(Self { coding, inner })
    }

    pub fn coding(&self) -> ContentCoding {
        self.coding
    }

    /// Feeds `data` and returns the output produced so far, possibly empty.
    pub fn compress(&mut self, data: &[u8]) -> io::Result<Bytes> {
        let result = match &mut self.inner {
            Inner::Deflate(encoder) => encoder.write_all(data),
            Inner::Gzip(encoder) => encoder.write_all(data),
            Inner::Zstd(encoder) => encoder.write_all(data),
            Inner::Br(encoder) => encoder.write_all(data),
        };
        if let Err(err) = result {
            trace!(coding = %self.coding, "error compressing body: {}", err);
            return Err(err);
        }

        Ok(match &mut self.inner {
            Inner::Deflate(encoder) => encoder.get_mut().take(),
            Inner::Gzip(encoder) => encoder.get_mut().take(),
            Inner::Zstd(encoder) => encoder.get_mut().take(),
            Inner::Br(encoder) => encoder.get_mut().take(),
        })
    }

    /// Ends the stream and returns the remaining output.
    pub fn finish(self) -> io::Result<Bytes> {
        match self.inner {
            Inner::Deflate(encoder) => Ok(encoder.finish()?.buf.freeze()),
            Inner::Gzip(encoder) => Ok(encoder.finish()?.buf.freeze()),
            Inner::Zstd(encoder) => Ok(encoder.finish()?.buf.freeze()),
            Inner::Br(mut encoder) => {
                encoder.flush()?;
                Ok(encoder.into_inner().buf.freeze())
            }
        }
    }
}

impl fmt::Debug for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compressor").field("coding", &self.coding).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{DeflateDecoder, GzDecoder};
    use std::io::Read;

    fn compress_all(coding: ContentCoding, parts: &[&[u8]]) -> Vec<u8> {
        let mut compressor = Compressor::new(coding).unwrap();
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(&compressor.compress(part).unwrap());
        }
        out.extend_from_slice(&compressor.finish().unwrap());
        out
    }

    #[test]
    fn test_deflate_is_raw_stream() {
        let out = compress_all(ContentCoding::Deflate, &[b"hello ", b"world"]);

        let mut plain = String::new();
        DeflateDecoder::new(&out[..]).read_to_string(&mut plain).unwrap();
        assert_eq!(plain, "hello world");
    }

    #[test]
    fn test_gzip_stream() {
        let out = compress_all(ContentCoding::Gzip, &[b"abc", b"", b"abc"]);

        assert_eq!(&out[..2], &[0x1f, 0x8b]);
        let mut plain = String::new();
        GzDecoder::new(&out[..]).read_to_string(&mut plain).unwrap();
        assert_eq!(plain, "abcabc");
    }

    #[test]
    fn test_zstd_stream() {
        let out = compress_all(ContentCoding::Zstd, &[b"zstd body"]);
        assert_eq!(zstd::decode_all(&out[..]).unwrap(), b"zstd body");
    }

    #[test]
    fn test_br_stream() {
        let repeated = b"brotli ".repeat(10_000);
        let out = compress_all(ContentCoding::Br, &[b"brotli body", b"", &repeated]);
        assert!(out.len() < repeated.len());

        let mut plain = Vec::new();
        brotli::Decompressor::new(&out[..], 4096).read_to_end(&mut plain).unwrap();
        assert_eq!(&plain[..11], b"brotli body");
        assert_eq!(&plain[11..], &repeated[..]);
    }

    #[test]
    fn test_select() {
        assert_eq!(ContentCoding::select("gzip, deflate, br"), Some(ContentCoding::Br));
        assert_eq!(ContentCoding::select("deflate, gzip;q=0.5"), Some(ContentCoding::Gzip));
        assert_eq!(ContentCoding::select("br;q=0, deflate"), Some(ContentCoding::Deflate));
        assert_eq!(ContentCoding::select("identity"), None);
        assert_eq!(ContentCoding::from_token(" GZIP "), Some(ContentCoding::Gzip));
    }
}
