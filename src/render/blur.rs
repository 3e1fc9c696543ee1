// SPDX-License-Identifier: GPL-3.0-only

//! Separable box blur with clamped edges

use image::RgbaImage;

/// Blur the colour channels of `image` in place; alpha is left alone
///
/// Two sliding-window passes (horizontal then vertical), each averaging
/// `2 * radius + 1` pixels. Edges repeat the border pixel so the frame does
/// not darken towards its sides.
pub fn box_blur(image: &mut RgbaImage, radius: u32) {
    let (width, height) = image.dimensions();
    if radius == 0 || width == 0 || height == 0 {
        return;
    }

    let w = width as usize;
    let h = height as usize;
    let r = radius as usize;
    let window = (2 * r + 1) as u32;

    let src = image.as_raw().clone();
    let mut tmp = src.clone();

    // Pass 1: rows, src → tmp
    for y in 0..h {
        let row = y * w;
        for channel in 0..3 {
            let at = |x: usize| src[(row + x) * 4 + channel] as u32;
            let mut sum = at(0) * (r as u32 + 1);
            for x in 1..=r {
                sum += at(x.min(w - 1));
            }
            for x in 0..w {
                tmp[(row + x) * 4 + channel] = ((sum + window / 2) / window) as u8;
                let leaving = at(x.saturating_sub(r));
                let entering = at((x + r + 1).min(w - 1));
                sum = sum + entering - leaving;
            }
        }
    }

    // Pass 2: columns, tmp → image
    let dst: &mut [u8] = image;
    for x in 0..w {
        for channel in 0..3 {
            let at = |y: usize| tmp[(y * w + x) * 4 + channel] as u32;
            let mut sum = at(0) * (r as u32 + 1);
            for y in 1..=r {
                sum += at(y.min(h - 1));
            }
            for y in 0..h {
                dst[(y * w + x) * 4 + channel] = ((sum + window / 2) / window) as u8;
                let leaving = at(y.saturating_sub(r));
                let entering = at((y + r + 1).min(h - 1));
                sum = sum + entering - leaving;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_flat_image_unchanged() {
        let mut image = RgbaImage::from_pixel(9, 7, Rgba([90, 120, 30, 200]));
        let before = image.clone();
        box_blur(&mut image, 3);
        assert_eq!(image, before);
    }

    #[test]
    fn test_zero_radius_is_noop() {
        let mut image = RgbaImage::from_fn(5, 5, |x, _| Rgba([(x * 50) as u8, 0, 0, 255]));
        let before = image.clone();
        box_blur(&mut image, 0);
        assert_eq!(image, before);
    }

    #[test]
    fn test_spreads_a_bright_dot() {
        let mut image = RgbaImage::from_pixel(7, 7, Rgba([0, 0, 0, 255]));
        image.put_pixel(3, 3, Rgba([255, 255, 255, 255]));
        box_blur(&mut image, 1);

        // 255 / 9 in each direct neighbour
        assert_eq!(image.get_pixel(3, 3)[0], 28);
        assert_eq!(image.get_pixel(2, 2)[0], 28);
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(3, 3)[3], 255);
    }

    #[test]
    fn test_radius_larger_than_image() {
        let mut image = RgbaImage::from_fn(3, 1, |x, _| Rgba([(x * 100) as u8, 0, 0, 255]));
        box_blur(&mut image, 10);
        let values: Vec<u8> = image.pixels().map(|p| p[0]).collect();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(values[0] > 0 && values[2] < 200);
    }
}
