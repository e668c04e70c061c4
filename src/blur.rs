//! Exponential blur for glyph bitmaps.
//!
//! Based on "Exponential blur" by Jani Huhtanen, 2006. Each sweep is a
//! one-pole IIR filter; running it forward and backward along rows and
//! columns twice approximates a gaussian at a fraction of the cost.

/// Fixed-point precision of the filter coefficient.
const APREC: i32 = 16;
/// Fixed-point precision of the accumulator.
const ZPREC: i32 = 7;

/// Blurs the `width × height` region at the start of `data` in place.
///
/// `stride` is the distance in bytes between the starts of two rows.
/// The outermost pixels of the region are forced to zero so blurred
/// glyphs never bleed into their atlas neighbours.
pub fn blur(data: &mut [u8], width: usize, height: usize, stride: usize, radius: i32) {
    if radius < 1 || width == 0 || height == 0 {
        return;
    }
    debug_assert!(data.len() >= (height - 1) * stride + width);

    // Pick alpha so that 90% of the (infinite) kernel lies within the radius.
    let sigma = radius as f32 * 0.577_350_26; // 1 / sqrt(3)
    let alpha = ((1 << APREC) as f32 * (1.0 - (-2.3 / (sigma + 1.0)).exp())) as i32;

    blur_vertical(data, width, height, stride, alpha);
    blur_horizontal(data, width, height, stride, alpha);
    blur_vertical(data, width, height, stride, alpha);
    blur_horizontal(data, width, height, stride, alpha);
}

#[inline]
fn step(z: &mut i32, pixel: &mut u8, alpha: i32) {
    *z += (alpha * ((i32::from(*pixel) << ZPREC) - *z)) >> APREC;
    *pixel = (*z >> ZPREC) as u8;
}

/// Filters along each row.
fn blur_horizontal(data: &mut [u8], width: usize, height: usize, stride: usize, alpha: i32) {
    for y in 0..height {
        let row = &mut data[y * stride..y * stride + width];

        let mut z = 0;
        for pixel in &mut row[1..] {
            step(&mut z, pixel, alpha);
        }
        row[width - 1] = 0;

        z = 0;
        for pixel in row[..width - 1].iter_mut().rev() {
            step(&mut z, pixel, alpha);
        }
        row[0] = 0;
    }
}

/// Filters along each column.
fn blur_vertical(data: &mut [u8], width: usize, height: usize, stride: usize, alpha: i32) {
    for x in 0..width {
        let mut z = 0;
        for y in 1..height {
            step(&mut z, &mut data[y * stride + x], alpha);
        }
        data[(height - 1) * stride + x] = 0;

        z = 0;
        for y in (0..height - 1).rev() {
            step(&mut z, &mut data[y * stride + x], alpha);
        }
        data[x] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot() -> Vec<u8> {
        let mut data = vec![0u8; 25];
        data[2 * 5 + 2] = 0xff;
        data
    }

    #[test]
    fn passes_follow_their_axis() {
        let alpha = 1 << (APREC - 1);

        let mut data = dot();
        blur_horizontal(&mut data, 5, 5, 5, alpha);
        let row = &data[10..15];
        assert!(row[1] > 0 && row[3] > 0, "{:?}", row);
        assert!(data[..10].iter().chain(&data[15..]).all(|&c| c == 0));

        let mut data = dot();
        blur_vertical(&mut data, 5, 5, 5, alpha);
        assert!(data[5 + 2] > 0 && data[15 + 2] > 0, "{:?}", data);
        for (i, &c) in data.iter().enumerate() {
            if i % 5 != 2 {
                assert_eq!(c, 0, "pixel {} outside the column", i);
            }
        }
    }

    fn square(size: usize, stride: usize) -> Vec<u8> {
        let mut data = vec![0u8; stride * size];
        for y in 2..size - 2 {
            for x in 2..size - 2 {
                data[y * stride + x] = 255;
            }
        }
        data
    }

    #[test]
    fn zero_radius_is_a_no_op() {
        let mut data = square(16, 20);
        let before = data.clone();
        blur(&mut data, 16, 16, 20, 0);
        assert_eq!(data, before);
        blur(&mut data, 16, 16, 20, -3);
        assert_eq!(data, before);
    }

    #[test]
    fn borders_are_forced_to_zero() {
        let (w, h, stride) = (16, 12, 24);
        let mut data = vec![255u8; stride * h];
        blur(&mut data, w, h, stride, 3);

        for y in 0..h {
            assert_eq!(data[y * stride], 0, "row {} start", y);
            assert_eq!(data[y * stride + w - 1], 0, "row {} end", y);
        }
        for x in 0..w {
            assert_eq!(data[x], 0, "column {} start", x);
            assert_eq!(data[(h - 1) * stride + x], 0, "column {} end", x);
        }
    }

    #[test]
    fn bytes_outside_the_region_are_untouched() {
        let (w, h, stride) = (8, 8, 12);
        let mut data = vec![200u8; stride * h];
        blur(&mut data, w, h, stride, 2);
        for y in 0..h {
            assert!(data[y * stride + w..(y + 1) * stride].iter().all(|&b| b == 200));
        }
    }

    #[test]
    fn blur_spreads_coverage() {
        let mut data = square(24, 24);
        let center_before = data[12 * 24 + 12];
        blur(&mut data, 24, 24, 24, 4);

        // Energy leaks outside the original square...
        assert!(data[12 * 24 + 1] > 0);
        // ...and the interior is softened.
        assert!(data[12 * 24 + 12] <= center_before);
        assert!(data[12 * 24 + 12] > 0);
    }
}
