//! Power-of-two resolution scaling and discard-level selection.
//!
//! A codestream with `N` wavelet decomposition levels can be rendered at
//! `N + 1` frame sizes. Discarding `d` levels divides every reference-grid
//! coordinate by `2^d`, rounding up (ISO/IEC 15444-1 equation B-14), so
//! the frame at `d` is `ceil(Xsiz / 2^d) - ceil(XOsiz / 2^d)` wide.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::rect::{Rect, Size};

/// `ceil(value / 2^exp)`, well-defined for any exponent.
#[inline]
pub fn ceil_div_pow2(value: u32, exp: u32) -> u32 {
    if exp >= 32 {
        return u32::from(value > 0);
    }
    ((value as u64 + (1u64 << exp) - 1) >> exp) as u32
}

/// `floor(value / 2^exp)`, well-defined for any exponent.
#[inline]
pub fn floor_div_pow2(value: u32, exp: u32) -> u32 {
    if exp >= 32 {
        return 0;
    }
    value >> exp
}

/// `value * 2^exp`, saturating at `u32::MAX`.
#[inline]
pub fn mul_pow2(value: u32, exp: u32) -> u32 {
    if value == 0 {
        return 0;
    }
    if exp >= 32 {
        return u32::MAX;
    }
    ((value as u64) << exp).min(u32::MAX as u64) as u32
}

/// `ceil(a / b)` for signed operands. `b` must be positive.
#[inline]
pub fn ceil_div_i64(a: i64, b: i64) -> i64 {
    let q = a.div_euclid(b);
    if a.rem_euclid(b) == 0 {
        q
    } else {
        q + 1
    }
}

/// Scale a reference-grid rectangle down by `2^exp`, rounding both edges up.
pub fn scale_down(rect: &Rect, exp: u32) -> Rect {
    Rect::new(
        ceil_div_pow2(rect.x0, exp),
        ceil_div_pow2(rect.y0, exp),
        ceil_div_pow2(rect.x1, exp),
        ceil_div_pow2(rect.y1, exp),
    )
}

/// Frame size of an image area after discarding `discard_levels`.
///
/// `image` is the image area on the reference grid: `x0 = XOsiz`,
/// `x1 = Xsiz` (and likewise in y).
pub fn frame_size(image: &Rect, discard_levels: u8) -> Size {
    scale_down(image, discard_levels as u32).size()
}

/// How a requested frame size snaps onto one of the available frame sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RoundDirection {
    /// Smallest available frame that still covers the request
    #[default]
    Down,
    /// Largest available frame that fits inside the request
    Up,
    /// Frame whose area is closest to the requested area
    Closest,
}

/// Pick the number of discard levels that serves `requested` under `round`.
///
/// The result is always in `0..=max_levels`. If no frame satisfies the
/// policy (for example the request is smaller than the frame at
/// `max_levels`), `max_levels` is returned.
///
/// # Arguments
///
/// * `image` - Image area on the reference grid
/// * `requested` - Frame size the client asked for (`fsiz`)
/// * `round` - How to snap onto the available frames
/// * `max_levels` - Fewest decomposition levels over all tile-components
///
/// # Returns
///
/// The number of highest resolution levels to leave out.
pub fn determine_discard_levels(
    image: &Rect,
    requested: Size,
    round: RoundDirection,
    max_levels: u8,
) -> u8 {
    match round {
        RoundDirection::Down => round_down(image, requested, max_levels),
        RoundDirection::Up => {
            let mut d = 0;
            while d < max_levels && !frame_size(image, d).fits_within(requested) {
                d += 1;
            }
            d
        }
        RoundDirection::Closest => {
            let upper = round_down(image, requested, max_levels);
            if upper >= max_levels {
                return max_levels;
            }
            let lower = upper + 1;

            let requested_area = requested.area();
            let upper_area = frame_size(image, upper).area();
            let lower_area = frame_size(image, lower).area();

            // Ties keep the higher resolution; the lower frame only wins
            // when it is strictly closer and does not exceed the request.
            let upper_diff = upper_area.abs_diff(requested_area);
            let lower_diff = lower_area.abs_diff(requested_area);
            if lower_area <= requested_area && lower_diff < upper_diff {
                lower
            } else {
                upper
            }
        }
    }
}

fn round_down(image: &Rect, requested: Size, max_levels: u8) -> u8 {
    let mut d = 0;
    while d < max_levels && frame_size(image, d + 1).covers(requested) {
        d += 1;
    }
    d
}

/// Map a region expressed on the requested frame onto the frame that is
/// actually served (ISO/IEC 15444-9 C.4.1).
///
/// Offsets scale with floor, far edges with ceiling, and the result is
/// clipped to `actual`. A non-empty input always maps to a non-empty output.
///
/// # Arguments
///
/// * `region` - Region on the requested frame (`roff`, `rsiz`)
/// * `requested` - The requested frame size
/// * `actual` - The frame size chosen by [`determine_discard_levels`]
pub fn map_region_to_suitable_resolution_grid(
    region: &Rect,
    requested: Size,
    actual: Size,
) -> Rect {
    if requested == actual || requested.is_empty() {
        return region.intersect(&Rect::new(0, 0, actual.width, actual.height));
    }

    let scale_floor = |v: u32, num: u32, den: u32| -> u32 {
        ((v as u64 * num as u64) / den as u64).min(num as u64) as u32
    };
    let scale_ceil = |v: u32, num: u32, den: u32| -> u32 {
        ((v as u64 * num as u64).div_ceil(den as u64)).min(num as u64) as u32
    };

    let x0 = scale_floor(region.x0, actual.width, requested.width);
    let y0 = scale_floor(region.y0, actual.height, requested.height);
    let mut x1 = scale_ceil(region.x1, actual.width, requested.width);
    let mut y1 = scale_ceil(region.y1, actual.height, requested.height);

    if !region.is_empty() {
        if x1 <= x0 {
            x1 = (x0 + 1).min(actual.width);
        }
        if y1 <= y0 {
            y1 = (y0 + 1).min(actual.height);
        }
    }

    Rect::new(x0, y0, x1, y1)
}

/// Map a region on the frame at `discard_levels` back onto the full
/// resolution reference grid, clipped to the image area.
pub fn map_region_to_high_resolution_grid(
    region: &Rect,
    discard_levels: u8,
    image: &Rect,
) -> Rect {
    let d = discard_levels as u32;
    let ox = ceil_div_pow2(image.x0, d);
    let oy = ceil_div_pow2(image.y0, d);

    Rect::new(
        mul_pow2(region.x0.saturating_add(ox), d),
        mul_pow2(region.y0.saturating_add(oy), d),
        mul_pow2(region.x1.saturating_add(ox), d),
        mul_pow2(region.y1.saturating_add(oy), d),
    )
    .intersect(image)
}
