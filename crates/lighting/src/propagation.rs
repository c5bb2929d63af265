use std::collections::VecDeque;

use crawl_common::{CellCoord, Grid};
use glam::Vec3;

use crate::tiers::tier_for_symbol;

/// Level assigned to every light-emitting cell before propagation.
pub const MAX_LIGHT_LEVEL: u8 = 7;

/// Number of discrete brightness steps.
pub const LIGHT_DIVISIONS: usize = MAX_LIGHT_LEVEL as usize + 1;

/// Tint applied to light-map colors.
pub const WARM_WHITE: Vec3 = Vec3::new(1.0, 0.9, 0.8);

const FALLOFF: f32 = 3.5;

const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Brightness per light level. Index 0 is the darkest, the last entry is 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessTable([f32; LIGHT_DIVISIONS]);

impl BrightnessTable {
    pub fn new() -> Self {
        let mut levels = [0.0; LIGHT_DIVISIONS];
        let mut value = 1.0;
        for slot in levels.iter_mut() {
            *slot = value;
            value /= FALLOFF;
        }
        levels.reverse();
        Self(levels)
    }

    pub fn get(&self, level: u8) -> f32 {
        self.0[(level as usize).min(LIGHT_DIVISIONS - 1)]
    }

    /// Brightness of a fractional level, interpolated between the two nearest steps.
    pub fn sample(&self, level: f32) -> f32 {
        let level = level.clamp(0.0, MAX_LIGHT_LEVEL as f32);
        let lo = level.floor() as usize;
        let hi = (lo + 1).min(LIGHT_DIVISIONS - 1);
        let t = level - lo as f32;
        self.0[lo] + (self.0[hi] - self.0[lo]) * t
    }

    pub fn darkest(&self) -> f32 {
        self.0[0]
    }
}

impl Default for BrightnessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-cell light levels computed by a multi-source flood fill.
#[derive(Debug, Clone)]
pub struct LightMap {
    width: i32,
    height: i32,
    levels: Vec<u8>,
    table: BrightnessTable,
    brightness_scale: f32,
}

impl LightMap {
    /// Digits emit light, walls block it.
    pub fn from_grid(grid: &Grid) -> Self {
        Self::compute(
            grid,
            |s| tier_for_symbol(s).is_some(),
            |s| s == Grid::WALL,
        )
    }

    /// Flood fill from every cell matching `is_source`.
    ///
    /// A neighbor is raised to `level - 1` only when it currently holds less;
    /// blocked neighbors are raised but not enqueued.
    pub fn compute(
        grid: &Grid,
        is_source: impl Fn(u8) -> bool,
        is_blocked: impl Fn(u8) -> bool,
    ) -> Self {
        let (width, height) = (grid.width(), grid.height());
        let mut levels = vec![0u8; grid.len()];
        let mut queue = VecDeque::new();

        for (c, symbol) in grid.iter() {
            if is_source(symbol) {
                if let Some(i) = grid.index(c.x, c.y) {
                    levels[i] = MAX_LIGHT_LEVEL;
                    queue.push_back(c);
                }
            }
        }
        let sources = queue.len();

        while let Some(c) = queue.pop_front() {
            let Some(i) = grid.index(c.x, c.y) else {
                continue;
            };
            let current = levels[i];
            if current <= 1 {
                continue;
            }
            for (dx, dy) in NEIGHBORS {
                let (nx, ny) = (c.x + dx, c.y + dy);
                let Some(n) = grid.index(nx, ny) else {
                    continue;
                };
                if levels[n] < current - 1 {
                    levels[n] = current - 1;
                    if !is_blocked(grid.get(nx, ny)) {
                        queue.push_back(CellCoord::new(nx, ny));
                    }
                }
            }
        }

        tracing::debug!(width, height, sources, "light map computed");

        Self {
            width,
            height,
            levels,
            table: BrightnessTable::new(),
            brightness_scale: 1.0,
        }
    }

    /// Multiplier applied to every color query.
    pub fn with_brightness_scale(mut self, scale: f32) -> Self {
        self.brightness_scale = scale;
        self
    }

    pub fn brightness_scale(&self) -> f32 {
        self.brightness_scale
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    /// Level at `(x, y)`; 0 outside the map.
    pub fn level(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        self.levels[(y * self.width + x) as usize]
    }

    pub fn brightness(&self, x: i32, y: i32) -> f32 {
        self.table.get(self.level(x, y))
    }

    pub fn color(&self, c: CellCoord) -> Vec3 {
        self.level_color(self.level(c.x, c.y) as f32)
    }

    /// Color at the edge shared by two cells.
    pub fn blend2(&self, a: CellCoord, b: CellCoord) -> Vec3 {
        let avg = (self.level(a.x, a.y) as f32 + self.level(b.x, b.y) as f32) / 2.0;
        self.level_color(avg)
    }

    /// Color at the corner shared by four cells.
    pub fn blend4(&self, cells: [CellCoord; 4]) -> Vec3 {
        let sum: f32 = cells.iter().map(|c| self.level(c.x, c.y) as f32).sum();
        self.level_color(sum / 4.0)
    }

    fn level_color(&self, level: f32) -> Vec3 {
        (WARM_WHITE * self.table.sample(level) * self.brightness_scale).clamp(Vec3::ZERO, Vec3::ONE)
    }

    /// Text dump, one digit per cell.
    pub fn to_rows(&self) -> Vec<String> {
        self.levels
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|l| char::from(b'0' + *l)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> Grid {
        Grid::from_rows(rows).unwrap()
    }

    /// Hop distance from the nearest source through non-wall cells.
    fn hop_distances(g: &Grid) -> Vec<Option<u32>> {
        let mut dist = vec![None; g.len()];
        let mut queue = VecDeque::new();
        for (c, s) in g.iter() {
            if s.is_ascii_digit() {
                dist[g.index(c.x, c.y).unwrap()] = Some(0);
                queue.push_back(c);
            }
        }
        while let Some(c) = queue.pop_front() {
            let d = dist[g.index(c.x, c.y).unwrap()].unwrap();
            for (dx, dy) in NEIGHBORS {
                let (nx, ny) = (c.x + dx, c.y + dy);
                if let Some(n) = g.index(nx, ny) {
                    if dist[n].is_none() && !g.is_wall(nx, ny) {
                        dist[n] = Some(d + 1);
                        queue.push_back(CellCoord::new(nx, ny));
                    }
                }
            }
        }
        dist
    }

    #[test]
    fn brightness_table_reversed_falloff() {
        let t = BrightnessTable::new();
        assert_eq!(t.get(MAX_LIGHT_LEVEL), 1.0);
        assert!((t.get(6) - 1.0 / 3.5).abs() < 1e-6);
        for l in 1..LIGHT_DIVISIONS as u8 {
            assert!(t.get(l) > t.get(l - 1));
        }
        assert_eq!(t.darkest(), t.get(0));
    }

    #[test]
    fn sample_interpolates() {
        let t = BrightnessTable::new();
        let mid = t.sample(6.5);
        assert!(mid > t.get(6) && mid < t.get(7));
        assert_eq!(t.sample(-3.0), t.get(0));
        assert_eq!(t.sample(42.0), t.get(7));
    }

    #[test]
    fn source_decays_by_one_per_hop() {
        let g = grid(&["#########", "#4      #", "#########"]);
        let map = LightMap::from_grid(&g);
        assert_eq!(map.level(1, 1), 7);
        assert_eq!(map.level(2, 1), 6);
        assert_eq!(map.level(7, 1), 1);
    }

    #[test]
    fn walls_lit_but_do_not_propagate() {
        let g = grid(&["1#  "]);
        let map = LightMap::from_grid(&g);
        assert_eq!(map.level(0, 0), 7);
        assert_eq!(map.level(1, 0), 6);
        assert_eq!(map.level(2, 0), 0);
        assert_eq!(map.level(3, 0), 0);
    }

    #[test]
    fn monotonic_with_hop_distance() {
        let g = grid(&[
            "##########",
            "#1   #   #",
            "# ## # # #",
            "#    #  3#",
            "#### ### #",
            "#        #",
            "##########",
        ]);
        let map = LightMap::from_grid(&g);
        let dist = hop_distances(&g);
        for (c, s) in g.iter() {
            let level = map.level(c.x, c.y);
            assert!(level <= MAX_LIGHT_LEVEL);
            if s == Grid::WALL {
                continue;
            }
            if let Some(d) = dist[g.index(c.x, c.y).unwrap()] {
                let expected = (MAX_LIGHT_LEVEL as i32 - d as i32).max(0) as u8;
                assert_eq!(level, expected, "cell {c:?} at distance {d}");
                for (dx, dy) in NEIGHBORS {
                    let (nx, ny) = (c.x + dx, c.y + dy);
                    if let Some(n) = g.index(nx, ny) {
                        if let Some(nd) = dist[n] {
                            if nd > d {
                                assert!(map.level(nx, ny) <= level);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn out_of_bounds_is_darkest() {
        let g = grid(&["5"]);
        let map = LightMap::from_grid(&g);
        assert_eq!(map.level(-1, 0), 0);
        assert_eq!(map.level(0, 9), 0);
        assert_eq!(map.brightness(4, 4), BrightnessTable::new().darkest());
    }

    #[test]
    fn colors_blend_and_clamp() {
        let g = grid(&["9  "]);
        let map = LightMap::from_grid(&g);
        let full = map.color(CellCoord::new(0, 0));
        assert!((full - WARM_WHITE).length() < 1e-6);

        let edge = map.blend2(CellCoord::new(0, 0), CellCoord::new(1, 0));
        assert!(edge.x < full.x && edge.x > map.color(CellCoord::new(1, 0)).x);

        let corner = map.blend4([
            CellCoord::new(0, 0),
            CellCoord::new(1, 0),
            CellCoord::new(0, -1),
            CellCoord::new(1, -1),
        ]);
        assert!(corner.x < edge.x);

        let bright = map.clone().with_brightness_scale(10.0);
        assert_eq!(bright.color(CellCoord::new(0, 0)), Vec3::ONE);
    }

    #[test]
    fn dump_rows() {
        let g = grid(&["7 #"]);
        let map = LightMap::from_grid(&g);
        assert_eq!(map.to_rows(), vec!["765".to_string()]);
    }
}
