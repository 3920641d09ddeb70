use crate::domain::model::Magnetogram;
use crate::utils::error::Result;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::Cursor;

const GUTTER: u32 = 10;
/// Missing data shows as background, like the gutter.
const NO_DATA: u8 = 255;

fn to_gray(value: f64, saturation: f64) -> u8 {
    if value.is_nan() {
        return NO_DATA;
    }
    let clipped = value.clamp(-saturation, saturation);
    ((clipped + saturation) / (2.0 * saturation) * 255.0).round() as u8
}

/// Grayscale panel with row 0 of the map at the bottom.
fn panel(map: &Magnetogram, saturation: f64) -> GrayImage {
    GrayImage::from_fn(map.width as u32, map.height as u32, |x, y| {
        let row = map.height - 1 - y as usize;
        Luma([to_gray(map.get(x as usize, row), saturation)])
    })
}

/// Original and resampled maps side by side, both clipped to
/// `[-saturation, saturation]`, encoded as PNG.
pub fn render_side_by_side(
    original: &Magnetogram,
    resampled: &Magnetogram,
    saturation: f64,
) -> Result<Vec<u8>> {
    let left = panel(original, saturation);
    let right = panel(resampled, saturation);

    let height = left.height();
    let scaled_width = ((right.width() as u64 * height as u64) / right.height().max(1) as u64).max(1) as u32;
    let right = imageops::resize(&right, scaled_width, height, FilterType::Nearest);

    let mut canvas = GrayImage::from_pixel(left.width() + GUTTER + right.width(), height, Luma([255]));
    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(&mut canvas, &right, (left.width() + GUTTER) as i64, 0);

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(canvas).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MapMeta;

    #[test]
    fn test_to_gray_saturates() {
        assert_eq!(to_gray(-900.0, 500.0), 0);
        assert_eq!(to_gray(500.0, 500.0), 255);
        assert_eq!(to_gray(0.0, 500.0), 128);
        assert_eq!(to_gray(f64::NAN, 500.0), NO_DATA);
    }

    #[test]
    fn test_side_by_side_layout() {
        // bottom row -500, top row +500
        let original = Magnetogram::new(
            4,
            2,
            vec![-500.0, -500.0, -500.0, -500.0, 500.0, 500.0, 500.0, 500.0],
            MapMeta::default(),
        );
        let resampled = Magnetogram::new(2, 1, vec![0.0, 0.0], MapMeta::default());

        let png = render_side_by_side(&original, &resampled, 500.0).unwrap();
        let image = image::load_from_memory(&png).unwrap().to_luma8();

        assert_eq!(image.dimensions(), (4 + GUTTER + 4, 2));
        assert_eq!(image.get_pixel(0, 0)[0], 255);
        assert_eq!(image.get_pixel(0, 1)[0], 0);
        assert_eq!(image.get_pixel(4, 0)[0], 255);
        assert_eq!(image.get_pixel(4 + GUTTER, 1)[0], 128);
    }
}
