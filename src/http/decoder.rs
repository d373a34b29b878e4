//! Response body content decoding.
//!
//! Mirrors the role of Chromium's `FilterSourceStream` chain, reduced to a
//! single pass over a fully buffered body: the `content-encoding` header
//! selects at most one decoder.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use bytes::Bytes;
use std::io::Read;

/// Encodings the pipeline knows how to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Deflate,
    Gzip,
    Brotli,
}

impl ContentEncoding {
    /// Pick the decoder for a `content-encoding` value.
    ///
    /// Matching is by substring and case-sensitive, checked in the order
    /// deflate, gzip, br.
    pub fn from_header_value(value: &str) -> Self {
        if value.contains("deflate") {
            ContentEncoding::Deflate
        } else if value.contains("gzip") {
            ContentEncoding::Gzip
        } else if value.contains("br") {
            ContentEncoding::Brotli
        } else {
            ContentEncoding::Identity
        }
    }

    pub fn from_headers(headers: &OrderedHeaderMap) -> Self {
        headers
            .get_str("content-encoding")
            .map(Self::from_header_value)
            .unwrap_or(ContentEncoding::Identity)
    }
}

/// Decode `body` according to the response headers.
///
/// Bodies without a recognized encoding come back unchanged (no copy).
/// A body that fails to decode is an error, never a silent passthrough.
pub fn decompress(body: &Bytes, headers: &OrderedHeaderMap) -> Result<Bytes, NetError> {
    let encoding = ContentEncoding::from_headers(headers);
    if body.is_empty() {
        return Ok(body.clone());
    }

    let decoded = match encoding {
        ContentEncoding::Identity => return Ok(body.clone()),
        ContentEncoding::Deflate => inflate(body)?,
        ContentEncoding::Gzip => read_all(flate2::read::MultiGzDecoder::new(body.as_ref()))?,
        ContentEncoding::Brotli => read_all(brotli::Decompressor::new(body.as_ref(), 4096))?,
    };

    tracing::debug!(
        encoding = ?encoding,
        raw = body.len(),
        decoded = decoded.len(),
        "response body decoded"
    );
    Ok(Bytes::from(decoded))
}

/// HTTP `deflate` is zlib-wrapped, but some servers send a raw stream.
fn inflate(body: &[u8]) -> Result<Vec<u8>, NetError> {
    match read_all(flate2::read::ZlibDecoder::new(body)) {
        Ok(out) => Ok(out),
        Err(_) => read_all(flate2::read::DeflateDecoder::new(body)),
    }
}

fn read_all<R: Read>(mut reader: R) -> Result<Vec<u8>, NetError> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).map_err(|e| {
        tracing::debug!(error = %e, "content decoding failed");
        NetError::ContentDecodingFailed
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn headers_with(encoding: &str) -> OrderedHeaderMap {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("content-encoding", encoding).unwrap();
        headers
    }

    #[test]
    fn test_passthrough_without_header() {
        let body = Bytes::from_static(b"\x1f\x8b not really gzip");
        let out = decompress(&body, &OrderedHeaderMap::new()).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_unknown_encoding_passthrough() {
        let body = Bytes::from_static(b"plain");
        let out = decompress(&body, &headers_with("zstd")).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_gzip() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello").unwrap();
        let body = Bytes::from(enc.finish().unwrap());

        let out = decompress(&body, &headers_with("gzip")).unwrap();
        assert_eq!(&out[..], b"hello");
    }

    #[test]
    fn test_deflate_zlib_and_raw() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"zlib body").unwrap();
        let body = Bytes::from(enc.finish().unwrap());
        assert_eq!(&decompress(&body, &headers_with("deflate")).unwrap()[..], b"zlib body");

        let mut enc = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"raw body").unwrap();
        let body = Bytes::from(enc.finish().unwrap());
        assert_eq!(&decompress(&body, &headers_with("deflate")).unwrap()[..], b"raw body");
    }

    #[test]
    fn test_brotli() {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(b"brotli body").unwrap();
        }
        let body = Bytes::from(compressed);
        assert_eq!(&decompress(&body, &headers_with("br")).unwrap()[..], b"brotli body");
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let body = Bytes::from_static(b"definitely not gzip");
        let err = decompress(&body, &headers_with("gzip")).unwrap_err();
        assert_eq!(err, NetError::ContentDecodingFailed);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert_eq!(ContentEncoding::from_header_value("GZIP"), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_header_value("x-gzip"), ContentEncoding::Gzip);
    }
}
