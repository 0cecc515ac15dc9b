//! Ruling-line removal for scanned pages.
//!
//! Table borders confuse the layout model: they get tokenized as glyphs or
//! stretch neighbouring boxes. Ruling lines are long and thin while glyphs
//! are not, so a morphological opening with a long one-pixel line element
//! isolates them without any text/line classifier.
//!
//! Steps:
//! 1. grayscale, Gaussian-weighted adaptive threshold, inverted so dark
//!    strokes become foreground;
//! 2. opening with a horizontal `kernel_length x 1` element, then with a
//!    vertical `1 x kernel_length` element, each applied `iterations` times;
//! 3. every connected component left in either mask, grown by `margin`
//!    pixels, is painted with the background color in the source image.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Primitive};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology;
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, warn};

use crate::error::{Error, Result};

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Parameters for ruling-line detection, in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct GridlineParams {
    /// Side of the neighbourhood used by the adaptive threshold. Must be odd
    /// and at least 3.
    pub block_size: u32,

    /// Constant subtracted from the local weighted mean; a pixel is
    /// foreground if it is at most `mean - threshold_offset`.
    pub threshold_offset: f32,

    /// Length of the line structuring element.
    pub kernel_length: u32,

    /// How many times erosion and dilation are each applied.
    pub iterations: u32,

    /// Extra pixels erased around each detected line.
    pub margin: u8,
}

impl Default for GridlineParams {
    fn default() -> Self {
        Self {
            block_size: 11,
            threshold_offset: 2.0,
            kernel_length: 40,
            iterations: 2,
            margin: 1,
        }
    }
}

impl GridlineParams {
    fn validate(&self) -> Result<()> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(Error::InvalidParameter(format!(
                "block_size must be odd and >= 3, got {}",
                self.block_size
            )));
        }
        if self.kernel_length == 0 || self.iterations == 0 {
            return Err(Error::InvalidParameter(
                "kernel_length and iterations must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Shortest run that survives the iterated opening.
    ///
    /// Eroding `n` times with a segment of length `k` equals one erosion with
    /// a segment of length `n * (k - 1) + 1`, and the same holds for the
    /// dilation that follows.
    pub fn min_line_length(&self) -> u32 {
        self.iterations * (self.kernel_length - 1) + 1
    }

    /// Gaussian sigma matching a `block_size` window.
    fn sigma(&self) -> f32 {
        0.3 * ((self.block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Line masks found on a page.
#[derive(Debug, Clone)]
pub struct GridlineMasks {
    pub horizontal: GrayImage,
    pub vertical: GrayImage,
    /// Number of connected horizontal line components.
    pub horizontal_lines: u32,
    /// Number of connected vertical line components.
    pub vertical_lines: u32,
}

impl GridlineMasks {
    pub fn is_empty(&self) -> bool {
        self.horizontal_lines == 0 && self.vertical_lines == 0
    }

    /// Union of both masks.
    pub fn combined(&self) -> GrayImage {
        let mut out = self.horizontal.clone();
        for (o, v) in out.pixels_mut().zip(self.vertical.pixels()) {
            o[0] = o[0].max(v[0]);
        }
        out
    }
}

/// Inverted adaptive threshold: dark strokes become [`FOREGROUND`].
pub fn binarize(gray: &GrayImage, params: &GridlineParams) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, params.sigma());
    let mut out = GrayImage::new(gray.width(), gray.height());
    for ((o, g), m) in out
        .pixels_mut()
        .zip(gray.pixels())
        .zip(local_mean.pixels())
    {
        let threshold = m[0] as f32 - params.threshold_offset;
        o[0] = if g[0] as f32 <= threshold {
            FOREGROUND
        } else {
            BACKGROUND
        };
    }
    out
}

/// Opening of a binary mask with a one-pixel line of `min_run` pixels.
///
/// The result keeps exactly the foreground runs along `orientation` that
/// are at least `min_run` long. Pixels outside the image count as
/// background.
pub fn open_lines(mask: &GrayImage, min_run: u32, orientation: Orientation) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    let (lanes, lane_len) = match orientation {
        Orientation::Horizontal => (height, width),
        Orientation::Vertical => (width, height),
    };
    let coord = |lane: u32, pos: u32| match orientation {
        Orientation::Horizontal => (pos, lane),
        Orientation::Vertical => (lane, pos),
    };

    for lane in 0..lanes {
        let mut run_start: Option<u32> = None;
        for pos in 0..=lane_len {
            let on = pos < lane_len && {
                let (x, y) = coord(lane, pos);
                mask.get_pixel(x, y)[0] == FOREGROUND
            };
            match (on, run_start) {
                (true, None) => run_start = Some(pos),
                (false, Some(start)) => {
                    if pos - start >= min_run {
                        for p in start..pos {
                            let (x, y) = coord(lane, p);
                            out.put_pixel(x, y, Luma([FOREGROUND]));
                        }
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
    }
    out
}

fn count_components(mask: &GrayImage) -> u32 {
    let labels = connected_components(mask, Connectivity::Eight, Luma([BACKGROUND]));
    labels.pixels().map(|p| p[0]).max().unwrap_or(0)
}

/// Detect horizontal and vertical ruling lines in a grayscale page.
pub fn detect_gridlines(gray: &GrayImage, params: &GridlineParams) -> Result<GridlineMasks> {
    params.validate()?;
    let binary = binarize(gray, params);
    let min_run = params.min_line_length();

    let horizontal = open_lines(&binary, min_run, Orientation::Horizontal);
    let vertical = open_lines(&binary, min_run, Orientation::Vertical);
    let horizontal_lines = count_components(&horizontal);
    let vertical_lines = count_components(&vertical);

    Ok(GridlineMasks {
        horizontal,
        vertical,
        horizontal_lines,
        vertical_lines,
    })
}

/// Combined line mask of a grayscale page.
pub fn detect_line_mask(gray: &GrayImage, params: &GridlineParams) -> Result<GrayImage> {
    Ok(detect_gridlines(gray, params)?.combined())
}

/// Set the color channels of every masked pixel to their maximum (white),
/// leaving alpha untouched.
fn paint_background<P>(
    buf: &mut ImageBuffer<P, Vec<P::Subpixel>>,
    mask: &GrayImage,
    has_alpha: bool,
) where
    P: Pixel,
{
    let max = <P::Subpixel as Primitive>::DEFAULT_MAX_VALUE;
    let color_channels = if has_alpha {
        P::CHANNEL_COUNT as usize - 1
    } else {
        P::CHANNEL_COUNT as usize
    };
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == BACKGROUND {
            continue;
        }
        let px = buf.get_pixel_mut(x, y);
        for c in px.channels_mut().iter_mut().take(color_channels) {
            *c = max;
        }
    }
}

fn erase(image: &DynamicImage, mask: &GrayImage) -> Result<DynamicImage> {
    let has_alpha = image.color().has_alpha();
    let mut out = image.clone();
    match &mut out {
        DynamicImage::ImageLuma8(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageLumaA8(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageRgb8(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageRgba8(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageLuma16(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageLumaA16(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageRgb16(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageRgba16(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageRgb32F(buf) => paint_background(buf, mask, has_alpha),
        DynamicImage::ImageRgba32F(buf) => paint_background(buf, mask, has_alpha),
        other => {
            return Err(Error::InvalidParameter(format!(
                "unsupported color model {:?}",
                other.color()
            )));
        }
    }
    Ok(out)
}

/// Remove ruling lines from a page image.
///
/// The output has the same dimensions and color model as the input. An
/// image without lines comes back unchanged.
///
/// # Errors
/// `MissingImage` for a zero-sized image, `InvalidParameter` for bad
/// parameters or an unsupported color model.
pub fn remove_gridlines(image: &DynamicImage, params: &GridlineParams) -> Result<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::MissingImage {
            path: "<memory>".into(),
            reason: "image has zero width or height".into(),
        });
    }

    let masks = detect_gridlines(&image.to_luma8(), params)?;
    if masks.is_empty() {
        debug!("no ruling lines detected");
        return Ok(image.clone());
    }
    debug!(
        horizontal = masks.horizontal_lines,
        vertical = masks.vertical_lines,
        "removing ruling lines"
    );

    let mut erase_mask = masks.combined();
    if params.margin > 0 {
        erase_mask = morphology::dilate(&erase_mask, Norm::LInf, params.margin);
    }
    erase(image, &erase_mask)
}

/// Best-effort [`remove_gridlines`]: any failure yields the original image.
pub fn clean_page(image: &DynamicImage, params: &GridlineParams) -> DynamicImage {
    match remove_gridlines(image, params) {
        Ok(cleaned) => cleaned,
        Err(err) => {
            warn!("gridline removal failed, using original image: {err}");
            image.clone()
        }
    }
}

/// Decode a page image from disk.
pub fn load_page_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| Error::MissingImage {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn fill(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn test_min_line_length() {
        assert_eq!(GridlineParams::default().min_line_length(), 79);
    }

    #[test]
    fn test_open_lines_keeps_long_runs_only() {
        let mut mask = GrayImage::new(20, 3);
        for x in 0..12 {
            mask.put_pixel(x, 1, Luma([FOREGROUND]));
        }
        for x in 15..18 {
            mask.put_pixel(x, 1, Luma([FOREGROUND]));
        }
        let opened = open_lines(&mask, 10, Orientation::Horizontal);
        assert_eq!(opened.get_pixel(0, 1)[0], FOREGROUND);
        assert_eq!(opened.get_pixel(11, 1)[0], FOREGROUND);
        assert_eq!(opened.get_pixel(16, 1)[0], BACKGROUND);

        let opened = open_lines(&mask, 10, Orientation::Vertical);
        assert!(opened.pixels().all(|p| p[0] == BACKGROUND));
    }

    #[test]
    fn test_removes_horizontal_line_and_keeps_text() {
        let mut img = RgbImage::from_pixel(400, 120, WHITE);
        fill(&mut img, 50, 80, 350, 82, BLACK);
        // glyph-sized block and a short dash
        fill(&mut img, 100, 40, 108, 52, BLACK);
        fill(&mut img, 200, 45, 230, 47, BLACK);

        let cleaned = remove_gridlines(&DynamicImage::ImageRgb8(img), &GridlineParams::default())
            .unwrap()
            .to_rgb8();

        assert_eq!(*cleaned.get_pixel(200, 80), WHITE);
        assert_eq!(*cleaned.get_pixel(50, 81), WHITE);
        assert_eq!(*cleaned.get_pixel(349, 81), WHITE);
        assert_eq!(*cleaned.get_pixel(104, 46), BLACK);
        assert_eq!(*cleaned.get_pixel(215, 46), BLACK);
    }

    #[test]
    fn test_removes_vertical_line() {
        let mut img = RgbImage::from_pixel(120, 300, WHITE);
        fill(&mut img, 60, 20, 62, 280, BLACK);
        fill(&mut img, 20, 100, 28, 112, BLACK);

        let gray = DynamicImage::ImageRgb8(img.clone()).to_luma8();
        let masks = detect_gridlines(&gray, &GridlineParams::default()).unwrap();
        assert_eq!(masks.vertical_lines, 1);
        assert_eq!(masks.horizontal_lines, 0);

        let cleaned = remove_gridlines(&DynamicImage::ImageRgb8(img), &GridlineParams::default())
            .unwrap()
            .to_rgb8();
        assert_eq!(*cleaned.get_pixel(61, 150), WHITE);
        assert_eq!(*cleaned.get_pixel(24, 106), BLACK);
    }

    #[test]
    fn test_blank_page_unchanged() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, WHITE));
        let cleaned = remove_gridlines(&img, &GridlineParams::default()).unwrap();
        assert_eq!(cleaned, img);
    }

    #[test]
    fn test_color_model_and_alpha_preserved() {
        let mut img = RgbaImage::from_pixel(300, 40, Rgba([255, 255, 255, 255]));
        for x in 10..290 {
            img.put_pixel(x, 20, Rgba([0, 0, 0, 128]));
        }
        let input = DynamicImage::ImageRgba8(img);
        let cleaned = remove_gridlines(&input, &GridlineParams::default()).unwrap();
        assert_eq!(cleaned.color(), input.color());
        assert_eq!((cleaned.width(), cleaned.height()), (300, 40));
        let rgba = cleaned.to_rgba8();
        assert_eq!(*rgba.get_pixel(150, 20), Rgba([255, 255, 255, 128]));
    }

    #[test]
    fn test_invalid_params_fall_back_to_original() {
        let mut img = RgbImage::from_pixel(200, 20, WHITE);
        fill(&mut img, 10, 10, 190, 11, BLACK);
        let input = DynamicImage::ImageRgb8(img);
        let params = GridlineParams {
            block_size: 4,
            ..GridlineParams::default()
        };
        assert!(matches!(
            remove_gridlines(&input, &params),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(clean_page(&input, &params), input);
    }

    #[test]
    fn test_zero_sized_image_is_missing() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            remove_gridlines(&img, &GridlineParams::default()),
            Err(Error::MissingImage { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_page_image(Path::new("/nonexistent/page-1.png"));
        assert!(matches!(err, Err(Error::MissingImage { .. })));
    }
}
