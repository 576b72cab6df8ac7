//! Vector compression adapters: scalar quantization (8/16-bit)
//! and sparse random projection. Both compress `Vec<f32>` down for storage;
//! only scalar quantization supports decompression.
use meridian_core::{ErrorBuilder, MemoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationBits {
    Eight,
    Sixteen,
}

impl QuantizationBits {
    fn max_level(self) -> i64 {
        match self {
            Self::Eight => i8::MAX as i64,
            Self::Sixteen => i16::MAX as i64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressedVector {
    pub codes: Vec<i32>,
    pub min: f32,
    pub max: f32,
    pub bits: QuantizationBits,
}

/// Symmetric-range scalar quantizer. `min`/`max` are auto-computed from the
/// first vector compressed if not supplied up front.
pub struct ScalarQuantizer {
    bits: QuantizationBits,
    range: Option<(f32, f32)>,
}

impl ScalarQuantizer {
    pub fn new(bits: QuantizationBits) -> Self {
        Self { bits, range: None }
    }

    pub fn with_range(bits: QuantizationBits, min: f32, max: f32) -> Result<Self, MemoryError> {
        if min >= max {
            return Err(ErrorBuilder::new("quantization range requires min < max")
                .field("range")
                .validation());
        }
        Ok(Self { bits, range: Some((min, max)) })
    }

    pub fn compress(&mut self, vector: &[f32]) -> Result<CompressedVector, MemoryError> {
        let (min, max) = match self.range {
            Some(range) => range,
            None => {
                let min = vector.iter().cloned().fold(f32::INFINITY, f32::min);
                let max = vector.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let (min, max) = if min < max { (min, max) } else { (min - 1.0, max + 1.0) };
                self.range = Some((min, max));
                (min, max)
            }
        };
        let level = self.bits.max_level() as f32;
        let codes = vector
            .iter()
            .map(|v| {
                let normalized = ((v - min) / (max - min)) * 2.0 - 1.0;
                (normalized.clamp(-1.0, 1.0) * level).round() as i32
            })
            .collect();
        Ok(CompressedVector { codes, min, max, bits: self.bits })
    }

    pub fn decompress(vector: &CompressedVector) -> Vec<f32> {
        let level = vector.bits.max_level() as f32;
        vector
            .codes
            .iter()
            .map(|&code| {
                let normalized = code as f32 / level;
                ((normalized + 1.0) / 2.0) * (vector.max - vector.min) + vector.min
            })
            .collect()
    }

    /// Fraction of the 32-bit baseline this format saves.
    pub fn savings_pct(bits: QuantizationBits) -> f32 {
        match bits {
            QuantizationBits::Eight => 0.75,
            QuantizationBits::Sixteen => 0.50,
        }
    }
}

/// Deterministic ternary projection matrix from `dim_in` to `dim_out`,
/// entries in `{-1, 0, +1}` at `density` non-zero, scaled by `1/sqrt(dim_out)`.
/// Lossy and one-way: decompression is unsupported.
pub struct SparseRandomProjection {
    dim_in: usize,
    dim_out: usize,
    seed: u64,
    density: f32,
    matrix: Option<Vec<Vec<f32>>>,
}

impl SparseRandomProjection {
    pub fn new(dim_in: usize, dim_out: usize, seed: u64) -> Result<Self, MemoryError> {
        if dim_out >= dim_in {
            return Err(ErrorBuilder::new("output dimension must be smaller than input dimension")
                .field("dim_out")
                .validation());
        }
        Ok(Self {
            dim_in,
            dim_out,
            seed,
            density: 1.0 / 3.0,
            matrix: None,
        })
    }

    fn ensure_matrix(&mut self) -> &Vec<Vec<f32>> {
        if self.matrix.is_none() {
            let scale = 1.0 / (self.dim_out as f32).sqrt();
            let mut state = self.seed.max(1);
            let mut rows = Vec::with_capacity(self.dim_out);
            for _ in 0..self.dim_out {
                let mut row = Vec::with_capacity(self.dim_in);
                for _ in 0..self.dim_in {
                    state = xorshift64(state);
                    let unit = (state as f64) / (u64::MAX as f64);
                    let entry = if unit < (self.density / 2.0) as f64 {
                        -scale
                    } else if unit < self.density as f64 {
                        scale
                    } else {
                        0.0
                    };
                    row.push(entry);
                }
                rows.push(row);
            }
            self.matrix = Some(rows);
        }
        self.matrix.as_ref().unwrap()
    }

    pub fn compress(&mut self, vector: &[f32]) -> Result<Vec<f32>, MemoryError> {
        if vector.len() != self.dim_in {
            return Err(ErrorBuilder::new(format!(
                "expected input dimension {}, got {}",
                self.dim_in,
                vector.len()
            ))
            .field("vector")
            .validation());
        }
        let matrix = self.ensure_matrix();
        Ok(matrix
            .iter()
            .map(|row| row.iter().zip(vector).map(|(m, v)| m * v).sum())
            .collect())
    }

    pub fn decompress(&self, _vector: &[f32]) -> Result<Vec<f32>, MemoryError> {
        Err(ErrorBuilder::new("sparse random projection is not invertible")
            .build(MemoryError::VectorError))
    }
}

fn xorshift64(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vector(dim: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.max(1);
        let mut v: Vec<f32> = (0..dim)
            .map(|_| {
                state = xorshift64(state);
                (state as f64 / u64::MAX as f64) as f32 * 2.0 - 1.0
            })
            .collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
        v
    }

    #[test]
    fn scalar_quantization_round_trip_preserves_similarity_8bit() {
        let v = unit_vector(64, 7);
        let mut q = ScalarQuantizer::new(QuantizationBits::Eight);
        let compressed = q.compress(&v).unwrap();
        let restored = ScalarQuantizer::decompress(&compressed);
        assert!(cosine_similarity(&v, &restored) >= 0.95);
    }

    #[test]
    fn scalar_quantization_round_trip_preserves_similarity_16bit() {
        let v = unit_vector(64, 11);
        let mut q = ScalarQuantizer::new(QuantizationBits::Sixteen);
        let compressed = q.compress(&v).unwrap();
        let restored = ScalarQuantizer::decompress(&compressed);
        assert!(cosine_similarity(&v, &restored) >= 0.999);
    }

    #[test]
    fn quantizer_rejects_inverted_range() {
        assert!(ScalarQuantizer::with_range(QuantizationBits::Eight, 1.0, -1.0).is_err());
    }

    #[test]
    fn sparse_projection_is_deterministic_given_seed() {
        let v = unit_vector(128, 3);
        let mut a = SparseRandomProjection::new(128, 32, 42).unwrap();
        let mut b = SparseRandomProjection::new(128, 32, 42).unwrap();
        assert_eq!(a.compress(&v).unwrap(), b.compress(&v).unwrap());
    }

    #[test]
    fn sparse_projection_decompress_errors() {
        let mut p = SparseRandomProjection::new(128, 32, 1).unwrap();
        let v = unit_vector(128, 1);
        let compressed = p.compress(&v).unwrap();
        assert!(p.decompress(&compressed).is_err());
    }
}
