//! Square crop around the reference pixel, then resample to a fixed grid.

use crate::domain::model::Magnetogram;
use crate::utils::error::{EtlError, Result};

const ROTATION_EPSILON_DEG: f64 = 1e-6;

/// Keys cubic convolution kernel, a = -0.5.
fn cubic_weight(x: f64) -> f64 {
    const A: f64 = -0.5;
    let x = x.abs();
    if x <= 1.0 {
        (A + 2.0) * x.powi(3) - (A + 3.0) * x.powi(2) + 1.0
    } else if x < 2.0 {
        A * x.powi(3) - 5.0 * A * x.powi(2) + 8.0 * A * x - 4.0 * A
    } else {
        0.0
    }
}

fn sample_cubic(map: &Magnetogram, sx: f64, sy: f64) -> f64 {
    let (w, h) = (map.width as f64, map.height as f64);
    if sx < -0.5 || sy < -0.5 || sx > w - 0.5 || sy > h - 0.5 {
        return f64::NAN;
    }

    let x0 = sx.floor();
    let y0 = sy.floor();
    let (tx, ty) = (sx - x0, sy - y0);
    let clamp = |v: f64, len: usize| v.clamp(0.0, (len - 1) as f64) as usize;

    let mut value = 0.0;
    for j in -1..=2 {
        let wy = cubic_weight(ty - j as f64);
        if wy == 0.0 {
            continue;
        }
        let row = clamp(y0 + j as f64, map.height);
        for i in -1..=2 {
            let wx = cubic_weight(tx - i as f64);
            if wx == 0.0 {
                continue;
            }
            let col = clamp(x0 + i as f64, map.width);
            value += wx * wy * map.get(col, row);
        }
    }
    value
}

/// Rotates the data so solar north is up, about the reference pixel.
/// The array shape is kept; pixels rotated in from outside are NaN.
pub fn rotate_north_up(map: Magnetogram) -> Magnetogram {
    if map.meta.crota2.abs() <= ROTATION_EPSILON_DEG {
        return map;
    }

    let theta = map.meta.crota2.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (xc, yc) = map.reference_pixel();

    let mut data = Vec::with_capacity(map.data.len());
    for y in 0..map.height {
        for x in 0..map.width {
            let dx = x as f64 - xc;
            let dy = y as f64 - yc;
            let sx = xc + cos * dx - sin * dy;
            let sy = yc + sin * dx + cos * dy;
            data.push(sample_cubic(&map, sx, sy));
        }
    }

    tracing::debug!("Rotated map by {:.4} deg", map.meta.crota2);
    let mut meta = map.meta;
    meta.crota2 = 0.0;
    Magnetogram::new(map.width, map.height, data, meta)
}

/// Crops to a square whose side is the largest multiple of `multiple` that
/// fits the shorter axis, centred on the reference pixel.
pub fn crop_square(map: &Magnetogram, multiple: usize) -> Result<Magnetogram> {
    let smin = map.width.min(map.height);
    let side = smin - smin % multiple.max(1);
    if side == 0 {
        return Err(EtlError::ResampleError {
            message: format!(
                "map is {}x{}, smaller than crop multiple {}",
                map.width, map.height, multiple
            ),
        });
    }

    let (xc, yc) = map.reference_pixel();
    let half = side as f64 / 2.0;
    // Truncation toward zero, then clamp into the array.
    let window = |centre: f64, len: usize| {
        let lo = ((centre - half) as i64).clamp(0, len as i64) as usize;
        let hi = ((centre + half) as i64).clamp(0, len as i64) as usize;
        (lo, hi)
    };
    let (c0, c1) = window(xc, map.width);
    let (r0, r1) = window(yc, map.height);

    if c1 <= c0 || r1 <= r0 {
        return Err(EtlError::ResampleError {
            message: format!(
                "reference pixel ({:.1}, {:.1}) lies outside the {}x{} map",
                xc, yc, map.width, map.height
            ),
        });
    }

    let width = c1 - c0;
    let height = r1 - r0;
    let mut data = Vec::with_capacity(width * height);
    for row in r0..r1 {
        let start = row * map.width;
        data.extend_from_slice(&map.data[start + c0..start + c1]);
    }

    let mut meta = map.meta.clone();
    meta.crpix1 -= c0 as f64;
    meta.crpix2 -= r0 as f64;

    Ok(Magnetogram::new(width, height, data, meta))
}

/// Bilinear resample onto a `new_width` x `new_height` grid.
pub fn resample(map: &Magnetogram, new_width: usize, new_height: usize) -> Result<Magnetogram> {
    if new_width == 0 || new_height == 0 || map.width == 0 || map.height == 0 {
        return Err(EtlError::ResampleError {
            message: format!(
                "cannot resample {}x{} to {}x{}",
                map.width, map.height, new_width, new_height
            ),
        });
    }

    let scale_x = map.width as f64 / new_width as f64;
    let scale_y = map.height as f64 / new_height as f64;
    let last_x = (map.width - 1) as f64;
    let last_y = (map.height - 1) as f64;

    let mut data = Vec::with_capacity(new_width * new_height);
    for j in 0..new_height {
        let sy = (j as f64 * scale_y).min(last_y);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(map.height - 1);
        let fy = sy - y0 as f64;
        for i in 0..new_width {
            let sx = (i as f64 * scale_x).min(last_x);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(map.width - 1);
            let fx = sx - x0 as f64;

            let bottom = map.get(x0, y0) * (1.0 - fx) + map.get(x1, y0) * fx;
            let top = map.get(x0, y1) * (1.0 - fx) + map.get(x1, y1) * fx;
            data.push(bottom * (1.0 - fy) + top * fy);
        }
    }

    let mut meta = map.meta.clone();
    meta.cdelt1 *= scale_x;
    meta.cdelt2 *= scale_y;
    meta.crpix1 = (meta.crpix1 - 0.5) / scale_x + 0.5;
    meta.crpix2 = (meta.crpix2 - 0.5) / scale_y + 0.5;

    Ok(Magnetogram::new(new_width, new_height, data, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MapMeta;

    fn map_with(width: usize, height: usize, crpix: (f64, f64), f: impl Fn(usize, usize) -> f64) -> Magnetogram {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        let meta = MapMeta {
            crpix1: crpix.0,
            crpix2: crpix.1,
            cdelt1: 0.03,
            cdelt2: 0.03,
            ..MapMeta::default()
        };
        Magnetogram::new(width, height, data, meta)
    }

    #[test]
    fn test_crop_square_centres_on_reference_pixel() {
        let map = map_with(250, 230, (126.0, 116.0), |x, y| (y * 1000 + x) as f64);

        let cropped = crop_square(&map, 100).unwrap();

        assert_eq!((cropped.width, cropped.height), (200, 200));
        // rows 15..215, cols 25..225
        assert_eq!(cropped.get(0, 0), (15 * 1000 + 25) as f64);
        assert_eq!(cropped.get(199, 199), (214 * 1000 + 224) as f64);
        assert_eq!(cropped.meta.crpix1, 101.0);
        assert_eq!(cropped.meta.crpix2, 101.0);
    }

    #[test]
    fn test_crop_square_clamps_off_centre_window() {
        let map = map_with(300, 300, (21.0, 151.0), |_, _| 1.0);

        let cropped = crop_square(&map, 100).unwrap();

        // cols int(20 - 150) .. int(20 + 150) clamps to 0..170
        assert_eq!(cropped.width, 170);
        assert_eq!(cropped.height, 300);
        assert_eq!(cropped.meta.crpix1, 21.0);
    }

    #[test]
    fn test_crop_square_rejects_small_maps() {
        let map = map_with(99, 400, (50.0, 200.0), |_, _| 0.0);
        assert!(matches!(
            crop_square(&map, 100),
            Err(EtlError::ResampleError { .. })
        ));
    }

    #[test]
    fn test_resample_halves_linear_ramp() {
        let map = map_with(200, 200, (101.0, 101.0), |x, _| x as f64);

        let small = resample(&map, 100, 100).unwrap();

        assert_eq!((small.width, small.height), (100, 100));
        for i in [0usize, 1, 37, 99] {
            assert!((small.get(i, 50) - (2 * i) as f64).abs() < 1e-9);
        }
        assert!((small.meta.cdelt1 - 0.06).abs() < 1e-12);
        assert!((small.meta.crpix1 - 50.75).abs() < 1e-12);
    }

    #[test]
    fn test_resample_keeps_constant_field() {
        let map = map_with(300, 300, (150.0, 150.0), |_, _| -42.5);
        let small = resample(&map, 100, 100).unwrap();
        assert!(small.data.iter().all(|v| (*v + 42.5).abs() < 1e-9));
    }

    #[test]
    fn test_rotate_north_up_without_roll_is_identity() {
        let map = map_with(5, 5, (3.0, 3.0), |x, y| (x + 10 * y) as f64);
        let rotated = rotate_north_up(map.clone());
        assert_eq!(rotated, map);
    }

    #[test]
    fn test_rotate_half_turn_mirrors_about_reference() {
        let mut map = map_with(5, 5, (3.0, 3.0), |x, y| (x + 10 * y) as f64);
        map.meta.crota2 = 180.0;

        let rotated = rotate_north_up(map.clone());

        assert_eq!(rotated.meta.crota2, 0.0);
        for y in 0..5 {
            for x in 0..5 {
                let expected = map.get(4 - x, 4 - y);
                assert!((rotated.get(x, y) - expected).abs() < 1e-9, "({x},{y})");
            }
        }
    }

    #[test]
    fn test_rotate_quarter_turn_maps_axes() {
        let mut map = map_with(5, 5, (3.0, 3.0), |x, y| (x + 10 * y) as f64);
        map.meta.crota2 = 90.0;

        let rotated = rotate_north_up(map.clone());

        for y in 0..5 {
            for x in 0..5 {
                let expected = map.get(4 - y, x);
                assert!((rotated.get(x, y) - expected).abs() < 1e-9, "({x},{y})");
            }
        }
    }

    #[test]
    fn test_rotate_oblique_fills_outside_with_nan() {
        let mut map = map_with(5, 5, (3.0, 3.0), |_, _| 7.0);
        map.meta.crota2 = 45.0;

        let rotated = rotate_north_up(map);

        assert_eq!((rotated.width, rotated.height), (5, 5));
        for (x, y) in [(0, 0), (4, 0), (0, 4), (4, 4)] {
            assert!(rotated.get(x, y).is_nan(), "corner ({x},{y})");
        }
        assert!((rotated.get(2, 2) - 7.0).abs() < 1e-9);
        assert!((rotated.get(2, 1) - 7.0).abs() < 1e-9);
    }
}
