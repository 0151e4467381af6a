//! Swap image format for a sealed segment's backing array.
//!
//! ```text
//! Offset  Size  Field
//! 0       4     magic: b"CVSG"
//! 4       2     version: u16 = 1
//! 6       1     element kind: u8
//! 7       1     reserved: 0x00
//! 8       8     element_count: u64
//! 16      8     payload_len: u64
//! 24      8     reserved: 0x00
//! 32      N     payload: element_count × width, little-endian
//! 32+N    32    blake3 digest of payload
//! ```
//!
//! Floats are encoded through their bit patterns, so decode(encode(a))
//! is bit-for-bit identical to `a`.

use std::io::Write;

use crate::element::{Element, ElementKind};
use crate::error::{Result, VectorError};

// ── Constants ──────────────────────────────────────────────────────

/// Magic bytes for swap images.
pub const SWAP_MAGIC: [u8; 4] = *b"CVSG";

pub const SWAP_FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
pub const SWAP_HEADER_SIZE: usize = 32;

/// blake3 digest size in bytes.
pub const DIGEST_SIZE: usize = 32;

// ── Header ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub kind: ElementKind,
    pub element_count: u64,
    pub payload_len: u64,
}

impl SwapHeader {
    pub fn new(kind: ElementKind, element_count: u64) -> Self {
        Self {
            magic: SWAP_MAGIC,
            version: SWAP_FORMAT_VERSION,
            kind,
            element_count,
            payload_len: element_count * kind.width() as u64,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0u8; SWAP_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.kind as u8;
        buf[8..16].copy_from_slice(&self.element_count.to_le_bytes());
        buf[16..24].copy_from_slice(&self.payload_len.to_le_bytes());
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Parse and validate a header from `bytes` (>= SWAP_HEADER_SIZE).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SWAP_HEADER_SIZE {
            return Err(VectorError::InvalidFormat("Swap image too small".into()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != SWAP_MAGIC {
            return Err(VectorError::InvalidFormat(format!(
                "Not a swap image: expected CVSG, got {magic:?}"
            )));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != SWAP_FORMAT_VERSION {
            return Err(VectorError::InvalidFormat(format!(
                "Unsupported swap image version: {version}"
            )));
        }
        let kind = ElementKind::from_u8(bytes[6]).ok_or_else(|| {
            VectorError::InvalidFormat(format!("Unknown element kind: {}", bytes[6]))
        })?;
        let element_count = read_u64(&bytes[8..16]);
        let payload_len = read_u64(&bytes[16..24]);
        let expected = element_count
            .checked_mul(kind.width() as u64)
            .ok_or_else(|| VectorError::InvalidFormat("element_count overflows".into()))?;
        if payload_len != expected {
            return Err(VectorError::InvalidFormat(
                "payload_len does not match element count".into(),
            ));
        }
        Ok(Self {
            magic,
            version,
            kind,
            element_count,
            payload_len,
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

// ── Encode / Decode ────────────────────────────────────────────────

/// Encode a backing array into a swap image.
pub fn encode_values<T: Element>(values: &[T]) -> Vec<u8> {
    let width = T::KIND.width();
    let mut out = Vec::with_capacity(SWAP_HEADER_SIZE + values.len() * width + DIGEST_SIZE);
    let header = SwapHeader::new(T::KIND, values.len() as u64);
    // Writing into a Vec cannot fail.
    let _ = header.write_to(&mut out);

    for &v in values {
        v.encode(&mut out);
    }
    let digest = blake3::hash(&out[SWAP_HEADER_SIZE..]);
    out.extend_from_slice(digest.as_bytes());
    out
}

/// Decode a swap image produced by [`encode_values`].
pub fn decode_values<T: Element>(bytes: &[u8]) -> Result<Vec<T>> {
    let header = SwapHeader::from_bytes(bytes)?;
    if header.kind != T::KIND {
        return Err(VectorError::IncompatibleSegment {
            source_kind: header.kind,
            target_kind: T::KIND,
        });
    }

    // Header fields are not covered by the digest.
    let (payload_end, image_len) = usize::try_from(header.payload_len)
        .ok()
        .and_then(|len| SWAP_HEADER_SIZE.checked_add(len))
        .and_then(|end| Some((end, end.checked_add(DIGEST_SIZE)?)))
        .ok_or_else(|| VectorError::InvalidFormat("payload_len overflows".into()))?;
    if bytes.len() != image_len {
        return Err(VectorError::InvalidFormat(format!(
            "Swap image length {} does not match header ({image_len} expected)",
            bytes.len()
        )));
    }

    let payload = &bytes[SWAP_HEADER_SIZE..payload_end];
    let digest = blake3::hash(payload);
    if digest.as_bytes()[..] != bytes[payload_end..] {
        return Err(VectorError::InvalidFormat("Swap image digest mismatch".into()));
    }

    Ok(payload
        .chunks_exact(T::KIND.width())
        .map(T::decode)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::StringCode;

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        SwapHeader::new(ElementKind::Double, 3).write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SWAP_HEADER_SIZE);
        assert_eq!(&buf[0..4], b"CVSG");
        assert_eq!(buf[6], ElementKind::Double as u8);

        let header = SwapHeader::from_bytes(&buf).unwrap();
        assert_eq!(header.element_count, 3);
        assert_eq!(header.payload_len, 24);
    }

    #[test]
    fn test_image_size() {
        let image = encode_values(&[1i32, 2, 3]);
        assert_eq!(image.len(), SWAP_HEADER_SIZE + 12 + DIGEST_SIZE);
    }

    #[test]
    fn test_decode_bit_exact() {
        let values = [f64::NAN, -0.0, f64::MIN_POSITIVE, 1.0e308, -3.25];
        let decoded: Vec<f64> = decode_values(&encode_values(&values)).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&decoded), bits(&values));

        let codes = [StringCode(0), StringCode(9)];
        assert_eq!(decode_values::<StringCode>(&encode_values(&codes)).unwrap(), codes);
    }

    #[test]
    fn test_empty_image() {
        let decoded: Vec<i16> = decode_values(&encode_values::<i16>(&[])).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_kind_mismatch() {
        let image = encode_values(&[1i32, 2]);
        let err = decode_values::<f32>(&image).unwrap_err();
        assert_eq!(err.code(), "INCOMPATIBLE_SEGMENT");
    }

    #[test]
    fn test_corruption_detected() {
        let mut image = encode_values(&[10i64, 20, 30]);
        image[SWAP_HEADER_SIZE + 3] ^= 0xff;
        let err = decode_values::<i64>(&image).unwrap_err();
        assert!(err.to_string().contains("digest"));

        let mut image = encode_values(&[10i64]);
        image[0] = b'X';
        assert!(decode_values::<i64>(&image).is_err());

        let image = encode_values(&[10i64, 20]);
        assert!(decode_values::<i64>(&image[..image.len() - 1]).is_err());
    }

    #[test]
    fn test_oversized_header_counts_rejected() {
        let mut image = encode_values(&[10i64, 20]);
        image[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = decode_values::<i64>(&image).unwrap_err();
        assert_eq!(err.code(), "INVALID_FORMAT");
        assert!(err.to_string().contains("overflows"));

        // Consistent but huge counts: the multiply fits, the length does not.
        let mut image = encode_values(&[1i8]);
        image[8..16].copy_from_slice(&(u64::MAX - 1).to_le_bytes());
        image[16..24].copy_from_slice(&(u64::MAX - 1).to_le_bytes());
        assert_eq!(decode_values::<i8>(&image).unwrap_err().code(), "INVALID_FORMAT");
    }
}
