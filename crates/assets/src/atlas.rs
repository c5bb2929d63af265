use glam::Vec2;
use image::RgbaImage;

/// Normalized texture rectangle inside an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// A packed atlas: one image plus the UV rectangle of every slot.
#[derive(Debug, Clone)]
pub struct Atlas {
    pub image: RgbaImage,
    pub slots: Vec<UvRect>,
}

impl Atlas {
    /// UV rectangle of `slot`; the whole atlas for unknown slots.
    pub fn uv(&self, slot: u32) -> UvRect {
        self.slots.get(slot as usize).copied().unwrap_or(UvRect::FULL)
    }
}

/// Collects images and packs them into a single atlas with a shelf packer.
///
/// Slots are handed out in insertion order. Every image is surrounded by a
/// transparent `padding` border so filtering does not bleed between slots.
#[derive(Debug)]
pub struct AtlasBuilder {
    max_width: u32,
    padding: u32,
    images: Vec<RgbaImage>,
}

struct Placement {
    x: u32,
    y: u32,
}

impl AtlasBuilder {
    pub fn new(max_width: u32) -> Self {
        Self {
            max_width: max_width.max(1),
            padding: 1,
            images: Vec::new(),
        }
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Queue an image and return its slot id.
    pub fn add(&mut self, image: RgbaImage) -> u32 {
        self.images.push(image);
        (self.images.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn pack(&self) -> (Vec<Placement>, u32, u32) {
        // Tallest first fills shelves better.
        let mut order: Vec<usize> = (0..self.images.len()).collect();
        order.sort_by(|&a, &b| self.images[b].height().cmp(&self.images[a].height()));

        let pad = self.padding;
        let widest = self
            .images
            .iter()
            .map(|i| i.width() + 2 * pad)
            .max()
            .unwrap_or(1);
        let row_width = self.max_width.max(widest);

        let mut placements: Vec<Option<Placement>> = (0..self.images.len()).map(|_| None).collect();
        let (mut cur_x, mut cur_y, mut row_h) = (0u32, 0u32, 0u32);
        for i in order {
            let (w, h) = self.images[i].dimensions();
            let (w, h) = (w + 2 * pad, h + 2 * pad);
            if cur_x + w > row_width {
                cur_y += row_h;
                cur_x = 0;
                row_h = 0;
            }
            placements[i] = Some(Placement {
                x: cur_x + pad,
                y: cur_y + pad,
            });
            cur_x += w;
            row_h = row_h.max(h);
        }

        let atlas_w = row_width.next_power_of_two();
        let atlas_h = (cur_y + row_h).next_power_of_two().max(1);
        (placements.into_iter().flatten().collect(), atlas_w, atlas_h)
    }

    pub fn build(self) -> Atlas {
        let (placements, atlas_w, atlas_h) = self.pack();
        let mut image = RgbaImage::new(atlas_w, atlas_h);
        let mut slots = Vec::with_capacity(self.images.len());
        for (img, p) in self.images.iter().zip(&placements) {
            image::imageops::replace(&mut image, img, p.x as i64, p.y as i64);
            slots.push(UvRect {
                min: Vec2::new(p.x as f32 / atlas_w as f32, p.y as f32 / atlas_h as f32),
                max: Vec2::new(
                    (p.x + img.width()) as f32 / atlas_w as f32,
                    (p.y + img.height()) as f32 / atlas_h as f32,
                ),
            });
        }
        tracing::debug!(
            slots = slots.len(),
            width = atlas_w,
            height = atlas_h,
            "atlas built"
        );
        Atlas { image, slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::solid;

    #[test]
    fn empty_atlas_is_one_pixel_high() {
        let atlas = AtlasBuilder::new(64).build();
        assert!(atlas.slots.is_empty());
        assert_eq!(atlas.image.height(), 1);
        assert_eq!(atlas.uv(3), UvRect::FULL);
    }

    #[test]
    fn slots_follow_insertion_order() {
        let mut b = AtlasBuilder::new(256).with_padding(0);
        let small = b.add(solid(8, 8, [255, 0, 0, 255]));
        let tall = b.add(solid(8, 32, [0, 255, 0, 255]));
        assert_eq!((small, tall), (0, 1));
        let atlas = b.build();

        // The taller image is packed first, at the origin.
        let uv = atlas.uv(tall);
        assert_eq!(uv.min, Vec2::ZERO);
        let px = |u: f32, v: f32| {
            *atlas.image.get_pixel(
                (u * atlas.image.width() as f32) as u32,
                (v * atlas.image.height() as f32) as u32,
            )
        };
        assert_eq!(px(uv.min.x, uv.min.y).0, [0, 255, 0, 255]);
        let uv = atlas.uv(small);
        assert_eq!(px(uv.min.x, uv.min.y).0, [255, 0, 0, 255]);
    }

    #[test]
    fn wraps_to_next_shelf() {
        let mut b = AtlasBuilder::new(64).with_padding(0);
        for _ in 0..3 {
            b.add(solid(30, 10, [9, 9, 9, 255]));
        }
        let atlas = b.build();
        let rows: Vec<f32> = atlas.slots.iter().map(|s| s.min.y).collect();
        assert_eq!(rows.iter().filter(|&&y| y == 0.0).count(), 2);
        assert_eq!(rows.iter().filter(|&&y| y > 0.0).count(), 1);
    }

    #[test]
    fn padding_keeps_border_transparent() {
        let mut b = AtlasBuilder::new(64);
        b.add(solid(4, 4, [255, 255, 255, 255]));
        let atlas = b.build();
        assert_eq!(atlas.image.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(atlas.image.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn oversized_image_widens_row() {
        let mut b = AtlasBuilder::new(16).with_padding(0);
        b.add(solid(40, 4, [1, 1, 1, 255]));
        let atlas = b.build();
        assert_eq!(atlas.image.width(), 64);
        assert!(atlas.uv(0).max.x <= 1.0);
    }
}
