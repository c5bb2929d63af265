use image::{Rgba, RgbaImage, imageops::FilterType};

pub fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), Rgba(color))
}

/// Two-tone checkerboard with `cell`-pixel squares.
pub fn checker(width: u32, height: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> RgbaImage {
    let cell = cell.max(1);
    RgbaImage::from_fn(width.max(1), height.max(1), |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgba(a)
        } else {
            Rgba(b)
        }
    })
}

/// Tangent-space normal map pointing straight out of the surface.
pub fn flat_normal_map(width: u32, height: u32) -> RgbaImage {
    solid(width, height, [128, 128, 255, 255])
}

/// Resize to exactly `width x height`; returns the input untouched when it already fits.
pub fn fit_to(image: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    tracing::debug!(
        from = ?image.dimensions(),
        to = ?(width, height),
        "resizing texture"
    );
    image::imageops::resize(&image, width, height, FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_alternates() {
        let img = checker(4, 4, 2, [255, 0, 0, 255], [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(2, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(2, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn fit_to_resizes_only_when_needed() {
        let img = solid(8, 8, [1, 2, 3, 4]);
        assert_eq!(fit_to(img.clone(), 8, 8), img);
        let resized = fit_to(img, 4, 2);
        assert_eq!(resized.dimensions(), (4, 2));
        assert_eq!(resized.get_pixel(3, 1).0, [1, 2, 3, 4]);
    }

    #[test]
    fn zero_sizes_clamped() {
        assert_eq!(solid(0, 0, [0; 4]).dimensions(), (1, 1));
    }
}
