//! Gridline removal on synthetic scanned forms.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use layoutrecon_core::gridlines::{GridlineParams, clean_page, detect_gridlines, remove_gridlines};

/// A 300x200 form: table frame, one inner ruling line each way, a few glyphs.
fn form() -> GrayImage {
    let mut img = GrayImage::from_pixel(300, 200, Luma([250]));
    for x in 20..280 {
        for y in [20u32, 100, 180] {
            img.put_pixel(x, y, Luma([10]));
        }
    }
    for y in 20..=180 {
        for x in [20u32, 150, 279] {
            img.put_pixel(x, y, Luma([10]));
        }
    }
    // glyph-sized blobs inside the cells
    for (gx, gy) in [(40u32, 50u32), (70, 50), (180, 130)] {
        for x in gx..gx + 8 {
            for y in gy..gy + 12 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
    }
    img
}

#[test]
fn test_detects_frame_and_inner_lines() {
    let masks = detect_gridlines(&form(), &GridlineParams::default()).unwrap();
    assert!(!masks.is_empty());
    assert_eq!(masks.horizontal_lines, 3);
    assert_eq!(masks.vertical_lines, 3);
}

#[test]
fn test_lines_removed_and_glyphs_kept() {
    let image = DynamicImage::ImageLuma8(form());
    let cleaned = remove_gridlines(&image, &GridlineParams::default()).unwrap();
    let gray = cleaned.to_luma8();

    assert_eq!(gray.get_pixel(100, 100)[0], 255);
    assert_eq!(gray.get_pixel(150, 60)[0], 255);
    assert!(gray.get_pixel(44, 56)[0] < 128);
    assert!(gray.get_pixel(184, 136)[0] < 128);
    assert_eq!(gray.dimensions(), (300, 200));
}

#[test]
fn test_color_page_keeps_its_color_type() {
    let mut rgb = RgbImage::from_pixel(120, 80, Rgb([240, 240, 240]));
    for x in 5..115 {
        rgb.put_pixel(x, 40, Rgb([30, 30, 30]));
    }
    let cleaned = clean_page(&DynamicImage::ImageRgb8(rgb), &GridlineParams::default());
    let out = cleaned.as_rgb8().unwrap();
    assert_eq!(out.get_pixel(60, 40), &Rgb([255, 255, 255]));
    assert_eq!(out.get_pixel(60, 10), &Rgb([240, 240, 240]));
}

#[test]
fn test_short_strokes_are_not_lines() {
    let mut img = GrayImage::from_pixel(200, 60, Luma([255]));
    for x in 50..100 {
        img.put_pixel(x, 30, Luma([0]));
    }
    let masks = detect_gridlines(&img, &GridlineParams::default()).unwrap();
    assert!(masks.is_empty());
}
