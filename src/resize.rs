//! Bounding-box resize without upscaling.

use image::imageops::FilterType;
use image::DynamicImage;

/// Dimensions that fit `width x height` into `max_width x max_height`,
/// preserving aspect ratio.
///
/// The constraining axis lands exactly on its bound and the other axis is
/// floored. Integer arithmetic keeps results stable where
/// `floor(w * ratio)` in floating point would drift a pixel.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let (w, h) = (width as u64, height as u64);
    let (mw, mh) = (max_width as u64, max_height as u64);

    // max_width / width <= max_height / height
    let (new_w, new_h) = if mw * h <= mh * w {
        (mw, h * mw / w)
    } else {
        (w * mh / h, mh)
    };

    (new_w.max(1) as u32, new_h.max(1) as u32)
}

/// Fit `image` into the bounding box. Images already inside the box are
/// returned untouched.
pub fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (new_w, new_h) = fit_dimensions(width, height, max_width, max_height);

    if (new_w, new_h) == (width, height) {
        return image;
    }

    tracing::debug!(
        "Resizing {}x{} to {}x{} (bounds {}x{})",
        width,
        height,
        new_w,
        new_h,
        max_width,
        max_height
    );
    image.resize_exact(new_w, new_h, FilterType::Triangle)
}
