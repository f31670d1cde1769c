//! Fixed-width vector encoding and similarity math
//!
//! Stored vectors are a packed little-endian `f32` sequence with no header or
//! padding. The dimension lives in its own column and is checked against the
//! blob length when decoding.

/// Encode a vector as packed little-endian `f32` bytes
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode exactly `dim` floats from `bytes`.
///
/// Returns `None` when the blob is shorter than `dim * 4` bytes. Trailing
/// bytes beyond the declared dimension are ignored.
pub fn decode(bytes: &[u8], dim: usize) -> Option<Vec<f32>> {
    let needed = dim.checked_mul(4)?;
    if bytes.len() < needed {
        return None;
    }
    Some(
        bytes[..needed]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

pub fn l2_norm(vector: &[f32]) -> f64 {
    vector.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt()
}

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum()
}

/// Cosine similarity given precomputed norms; `None` when the score is not a
/// finite number or either norm is zero.
pub fn cosine(a: &[f32], a_norm: f64, b: &[f32], b_norm: f64) -> Option<f64> {
    if a.len() != b.len() || a_norm == 0.0 || b_norm == 0.0 {
        return None;
    }
    let score = dot(a, b) / (a_norm * b_norm);
    score.is_finite().then_some(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_little_endian() {
        let bytes = encode(&[1.0]);
        assert_eq!(bytes, 1.0f32.to_le_bytes().to_vec());
        assert_eq!(encode(&[0.5, -2.0]).len(), 8);
    }

    #[test]
    fn test_decode_short_blob() {
        let bytes = encode(&[1.0, 2.0, 3.0]);
        assert_eq!(decode(&bytes, 3), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(decode(&bytes, 2), Some(vec![1.0, 2.0]));
        assert_eq!(decode(&bytes[..11], 3), None);
        assert_eq!(decode(&[], 0), Some(vec![]));
    }

    #[test]
    fn test_cosine_identical_is_one() {
        let v = vec![0.3, -1.2, 4.5, 0.01];
        let n = l2_norm(&v);
        let score = cosine(&v, n, &v, n).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_guards() {
        let a = vec![1.0, 0.0];
        let zero = vec![0.0, 0.0];
        assert_eq!(cosine(&a, 1.0, &zero, 0.0), None);
        assert_eq!(cosine(&a, 1.0, &[1.0, 0.0, 0.0], 1.0), None);
        let nan = vec![f32::NAN, 1.0];
        assert_eq!(cosine(&a, 1.0, &nan, 1.0), None);
        let opposite = cosine(&a, 1.0, &[-1.0, 0.0], 1.0).unwrap();
        assert!((opposite + 1.0).abs() < 1e-9);
    }
}
