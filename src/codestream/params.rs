//! Coding, quantization and component parameters.
//!
//! These mirror the COD/COC, QCD/QCC and SIZ marker contents
//! (ISO/IEC 15444-1 A.5 and A.6) that the delivery core actually needs.

use serde::{Deserialize, Serialize};

use super::subband::SubbandKind;

/// Largest precinct exponent the standard allows, used when a codestream
/// signals no explicit precinct partition.
pub const MAX_PRECINCT_EXPONENT: u8 = 15;

/// Default number of wavelet decomposition levels (COD default).
pub const DEFAULT_DECOMPOSITION_LEVELS: u8 = 5;

/// Default code-block size exponent (64x64 blocks).
pub const DEFAULT_CODE_BLOCK_EXPONENT: u8 = 6;

/// Default number of guard bits (QCD default).
pub const DEFAULT_GUARD_BITS: u8 = 2;

/// Wavelet filter family (Table A.20 plus the integer variants).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveletFilter {
    /// Reversible 5/3 lifting filter
    #[default]
    Reversible53,
    /// Irreversible 9/7 filter
    Irreversible97,
    /// Integer-arithmetic 5/3 variant
    Integer53,
    /// Integer-arithmetic 9/7 variant
    Integer97,
}

impl WaveletFilter {
    pub fn is_reversible(&self) -> bool {
        !matches!(self, WaveletFilter::Irreversible97)
    }

    /// Samples of boundary extension each side when a region is projected
    /// to the next lower resolution level.
    pub fn support_extension(&self) -> u32 {
        match self {
            WaveletFilter::Reversible53 | WaveletFilter::Integer53 => 1,
            WaveletFilter::Irreversible97 | WaveletFilter::Integer97 => 2,
        }
    }
}

/// Precinct partition exponents for one resolution level (PPx, PPy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecinctExponents {
    pub x: u8,
    pub y: u8,
}

impl PrecinctExponents {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    pub const MAXIMAL: PrecinctExponents =
        PrecinctExponents::new(MAX_PRECINCT_EXPONENT, MAX_PRECINCT_EXPONENT);
}

/// Coding style parameters (COD/COC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodingParameters {
    /// Number of wavelet decomposition levels (N_L)
    pub decomposition_levels: u8,

    /// Wavelet filter
    pub filter: WaveletFilter,

    /// Number of quality layers in the codestream
    pub layers: u16,

    /// Code-block width exponent (xcb)
    pub code_block_width_exp: u8,

    /// Code-block height exponent (ycb)
    pub code_block_height_exp: u8,

    /// Precinct exponents indexed by resolution level. An empty list means
    /// maximal precincts; a short list repeats its last entry.
    pub precincts: Vec<PrecinctExponents>,
}

impl Default for CodingParameters {
    fn default() -> Self {
        Self {
            decomposition_levels: DEFAULT_DECOMPOSITION_LEVELS,
            filter: WaveletFilter::default(),
            layers: 1,
            code_block_width_exp: DEFAULT_CODE_BLOCK_EXPONENT,
            code_block_height_exp: DEFAULT_CODE_BLOCK_EXPONENT,
            precincts: Vec::new(),
        }
    }
}

impl CodingParameters {
    /// Precinct exponents in effect at resolution level `r`.
    pub fn precinct_exponents(&self, r: u8) -> PrecinctExponents {
        self.precincts
            .get(r as usize)
            .or_else(|| self.precincts.last())
            .copied()
            .unwrap_or(PrecinctExponents::MAXIMAL)
    }
}

/// Quantization style (Table A.28).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationStyle {
    #[default]
    NoQuantization,
    ScalarDerived,
    ScalarExpounded,
}

/// Quantization parameters (QCD/QCC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationParameters {
    pub style: QuantizationStyle,

    /// Number of guard bits (G)
    pub guard_bits: u8,

    /// Step-size exponents, LL first then (HL, LH, HH) per level. Derived
    /// quantization signals only the first entry.
    pub exponents: Vec<u8>,
}

impl Default for QuantizationParameters {
    fn default() -> Self {
        Self {
            style: QuantizationStyle::default(),
            guard_bits: DEFAULT_GUARD_BITS,
            exponents: Vec::new(),
        }
    }
}

impl QuantizationParameters {
    /// Step-size exponent of a subband.
    ///
    /// Missing entries fall back to `precision + gain`, which is what a
    /// reversible encoder would have signalled.
    pub fn exponent(&self, band: SubbandKind, resolution: u8, levels: u8, precision: u8) -> u8 {
        let fallback = precision.saturating_add(band.gain_bits());
        match self.style {
            QuantizationStyle::NoQuantization | QuantizationStyle::ScalarExpounded => {
                let index = if resolution == 0 {
                    0
                } else {
                    1 + 3 * (resolution as usize - 1) + band.position()
                };
                self.exponents.get(index).copied().unwrap_or(fallback)
            }
            QuantizationStyle::ScalarDerived => {
                let e0 = self.exponents.first().copied().unwrap_or(precision);
                // epsilon_b = epsilon_0 - N_L + n_b (E-5)
                let n_b = if resolution == 0 {
                    levels
                } else {
                    (levels + 1).saturating_sub(resolution)
                };
                (e0 as i32 - levels as i32 + n_b as i32).max(0) as u8
            }
        }
    }

    /// Number of magnitude bit-planes `M_b = G + epsilon_b - 1` (E-2).
    pub fn magnitude_bits(&self, band: SubbandKind, resolution: u8, levels: u8, precision: u8) -> u8 {
        (self.guard_bits + self.exponent(band, resolution, levels, precision)).saturating_sub(1)
    }
}

/// Per-component SIZ information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentInfo {
    /// Bit depth
    pub precision: u8,

    /// Whether samples are signed
    pub signed: bool,

    /// Horizontal sub-sampling (XRsiz)
    pub dx: u8,

    /// Vertical sub-sampling (YRsiz)
    pub dy: u8,
}

impl Default for ComponentInfo {
    fn default() -> Self {
        Self {
            precision: 8,
            signed: false,
            dx: 1,
            dy: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precinct_exponents_repeat_last() {
        let coding = CodingParameters {
            precincts: vec![PrecinctExponents::new(5, 5), PrecinctExponents::new(6, 7)],
            ..Default::default()
        };
        assert_eq!(coding.precinct_exponents(0), PrecinctExponents::new(5, 5));
        assert_eq!(coding.precinct_exponents(1), PrecinctExponents::new(6, 7));
        assert_eq!(coding.precinct_exponents(4), PrecinctExponents::new(6, 7));
        assert_eq!(
            CodingParameters::default().precinct_exponents(2),
            PrecinctExponents::MAXIMAL
        );
    }

    #[test]
    fn test_expounded_exponent_lookup() {
        let q = QuantizationParameters {
            style: QuantizationStyle::ScalarExpounded,
            guard_bits: 1,
            exponents: vec![10, 11, 12, 13, 14, 15, 16],
        };
        assert_eq!(q.exponent(SubbandKind::LowLow, 0, 2, 8), 10);
        assert_eq!(q.exponent(SubbandKind::HighLow, 1, 2, 8), 11);
        assert_eq!(q.exponent(SubbandKind::HighHigh, 2, 2, 8), 16);
        assert_eq!(q.magnitude_bits(SubbandKind::HighHigh, 2, 2, 8), 16);
    }

    #[test]
    fn test_reversible_fallback_uses_gain() {
        let q = QuantizationParameters::default();
        assert_eq!(q.exponent(SubbandKind::LowLow, 0, 5, 8), 8);
        assert_eq!(q.exponent(SubbandKind::LowHigh, 3, 5, 8), 9);
        assert_eq!(q.exponent(SubbandKind::HighHigh, 3, 5, 8), 10);
        // G + eps - 1 = 2 + 10 - 1
        assert_eq!(q.magnitude_bits(SubbandKind::HighHigh, 3, 5, 8), 11);
    }

    #[test]
    fn test_derived_exponent() {
        let q = QuantizationParameters {
            style: QuantizationStyle::ScalarDerived,
            guard_bits: 2,
            exponents: vec![12],
        };
        assert_eq!(q.exponent(SubbandKind::LowLow, 0, 3, 8), 12);
        assert_eq!(q.exponent(SubbandKind::HighLow, 1, 3, 8), 12);
        assert_eq!(q.exponent(SubbandKind::HighLow, 3, 3, 8), 10);
    }

    #[test]
    fn test_filter_extension() {
        assert_eq!(WaveletFilter::Reversible53.support_extension(), 1);
        assert_eq!(WaveletFilter::Irreversible97.support_extension(), 2);
        assert!(!WaveletFilter::Irreversible97.is_reversible());
        assert!(WaveletFilter::Integer97.is_reversible());
    }
}
