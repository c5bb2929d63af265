use crawl_common::{CellCoord, CellCorner, HALF_CUBE};
use glam::{IVec2, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Direction symbol of a blueprint whose sprite looks the same from every side.
pub const UNIDIRECTIONAL: u8 = b'*';

const DIRECTIONS: [IVec2; 4] = [
    IVec2::new(0, -1),
    IVec2::new(0, 1),
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpriteKind {
    Monster,
    Object,
}

/// Which pre-rendered view of a sprite faces the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteFacing {
    Front = 0,
    Back = 1,
    Left = 2,
    Right = 3,
}

impl SpriteFacing {
    /// File suffixes, in texture-slot order.
    pub const SUFFIXES: [&'static str; 4] = ["_front", "_back", "_left", "_right"];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Scale a frame resolution so its longer side becomes `scale`.
pub fn normalize_resolution(width: u32, height: u32, scale: f32) -> Vec2 {
    let max = width.max(height).max(1) as f32;
    Vec2::new(width as f32 / max, height as f32 / max) * scale
}

/// Template for sprites spawned from a map symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub kind: SpriteKind,
    pub map_symbol: u8,
    pub dir_symbol: u8,
    /// Path without extension; directional sprites append a facing suffix.
    pub texture_base: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub scale: f32,
    /// Atlas slots in [`SpriteFacing`] order. Unidirectional blueprints use slot 0 only.
    #[serde(default)]
    pub textures: [u32; 4],
}

impl Blueprint {
    pub fn new(
        kind: SpriteKind,
        map_symbol: u8,
        dir_symbol: u8,
        texture_base: impl Into<String>,
        frame_width: u32,
        frame_height: u32,
        scale: f32,
    ) -> Self {
        Self {
            kind,
            map_symbol,
            dir_symbol,
            texture_base: texture_base.into(),
            frame_width,
            frame_height,
            scale,
            textures: [0; 4],
        }
    }

    pub fn is_unidirectional(&self) -> bool {
        self.dir_symbol == UNIDIRECTIONAL
    }

    /// Image files this blueprint needs, in texture-slot order.
    pub fn texture_paths(&self) -> Vec<String> {
        if self.is_unidirectional() {
            vec![format!("{}.png", self.texture_base)]
        } else {
            SpriteFacing::SUFFIXES
                .iter()
                .map(|s| format!("{}{s}.png", self.texture_base))
                .collect()
        }
    }

    pub fn sprite_size(&self) -> Vec2 {
        normalize_resolution(self.frame_width, self.frame_height, self.scale)
    }
}

/// A monster or object standing in a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteEntity {
    pub kind: SpriteKind,
    pub cell: CellCoord,
    pub corner: CellCorner,
    pub size: Vec2,
    pub direction: IVec2,
    pub textures: [u32; 4],
    pub unidirectional: bool,
}

impl SpriteEntity {
    pub fn spawn(blueprint: &Blueprint, cell: CellCoord, rng: &mut SpawnRng) -> Self {
        let corner = CellCorner::ALL[rng.pick(CellCorner::ALL.len())];
        let direction = DIRECTIONS[rng.pick(DIRECTIONS.len())];
        Self {
            kind: blueprint.kind,
            cell,
            corner,
            size: blueprint.sprite_size(),
            direction,
            textures: blueprint.textures,
            unidirectional: blueprint.is_unidirectional(),
        }
    }

    /// Feet on the floor, pushed into the chosen corner.
    pub fn world_position(&self) -> Vec3 {
        let mut pos = self.cell.world_center();
        pos.y = -HALF_CUBE + self.size.y / 2.0;
        let inset = HALF_CUBE - self.size.x / 2.0;
        let (sx, sz) = self.corner.signs();
        pos.x += sx * inset;
        pos.z += sz * inset;
        pos
    }

    /// Bucket the camera-relative facing into one of four views.
    ///
    /// `camera_front` is the camera's world-space front vector.
    pub fn facing(&self, camera_front: Vec3) -> SpriteFacing {
        let cam = Vec2::new(-camera_front.x, -camera_front.z);
        let dir = self.direction.as_vec2();
        let dot = cam.dot(dir);
        if dot > std::f32::consts::FRAC_1_SQRT_2 {
            SpriteFacing::Front
        } else if dot < -std::f32::consts::FRAC_1_SQRT_2 {
            SpriteFacing::Back
        } else if cam.x * dir.y - cam.y * dir.x < 0.0 {
            SpriteFacing::Left
        } else {
            SpriteFacing::Right
        }
    }

    /// Atlas slot to draw for the given camera front.
    pub fn texture_for(&self, camera_front: Vec3) -> u32 {
        if self.unidirectional {
            self.textures[0]
        } else {
            self.textures[self.facing(camera_front).index()]
        }
    }
}

/// SplitMix64 stream used for spawn placement.
#[derive(Debug, Clone)]
pub struct SpawnRng {
    state: u64,
}

impl SpawnRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform-ish index in `0..n`.
    pub fn pick(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_u64() % n as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goblin() -> Blueprint {
        let mut bp = Blueprint::new(SpriteKind::Monster, b'M', b'N', "assets/goblin", 50, 64, 2.5);
        bp.textures = [10, 11, 12, 13];
        bp
    }

    fn entity(direction: IVec2, corner: CellCorner) -> SpriteEntity {
        SpriteEntity {
            kind: SpriteKind::Monster,
            cell: CellCoord::new(2, 3),
            corner,
            size: Vec2::new(1.0, 2.0),
            direction,
            textures: [10, 11, 12, 13],
            unidirectional: false,
        }
    }

    #[test]
    fn resolution_normalized_to_longest_side() {
        let s = normalize_resolution(50, 64, 2.5);
        assert!((s.y - 2.5).abs() < 1e-6);
        assert!((s.x - 50.0 / 64.0 * 2.5).abs() < 1e-6);
        assert_eq!(normalize_resolution(10, 10, 1.0), Vec2::ONE);
    }

    #[test]
    fn texture_paths_by_direction_mode() {
        assert_eq!(
            goblin().texture_paths(),
            vec![
                "assets/goblin_front.png",
                "assets/goblin_back.png",
                "assets/goblin_left.png",
                "assets/goblin_right.png"
            ]
        );
        let skeleton = Blueprint::new(SpriteKind::Object, b'S', b'*', "assets/skeleton", 64, 22, 1.0);
        assert!(skeleton.is_unidirectional());
        assert_eq!(skeleton.texture_paths(), vec!["assets/skeleton.png"]);
    }

    #[test]
    fn world_position_in_corner() {
        let e = entity(IVec2::new(0, 1), CellCorner::Nw);
        let p = e.world_position();
        assert!((p.y - (-1.5 + 1.0)).abs() < 1e-6);
        assert!((p.x - (6.0 - 1.0)).abs() < 1e-6);
        assert!((p.z - (9.0 - 1.0)).abs() < 1e-6);

        let c = entity(IVec2::new(0, 1), CellCorner::Center).world_position();
        assert_eq!((c.x, c.z), (6.0, 9.0));
    }

    #[test]
    fn facing_buckets() {
        // Default camera looks down -Z, so the camera-facing vector is (0, 1).
        let front = Vec3::new(0.0, 0.0, -1.0);
        assert_eq!(entity(IVec2::new(0, 1), CellCorner::Center).facing(front), SpriteFacing::Front);
        assert_eq!(entity(IVec2::new(0, -1), CellCorner::Center).facing(front), SpriteFacing::Back);
        assert_eq!(entity(IVec2::new(1, 0), CellCorner::Center).facing(front), SpriteFacing::Left);
        assert_eq!(entity(IVec2::new(-1, 0), CellCorner::Center).facing(front), SpriteFacing::Right);
    }

    #[test]
    fn unidirectional_uses_single_texture() {
        let mut e = entity(IVec2::new(0, -1), CellCorner::Center);
        e.unidirectional = true;
        assert_eq!(e.texture_for(Vec3::new(0.0, 0.0, -1.0)), 10);
        e.unidirectional = false;
        assert_eq!(e.texture_for(Vec3::new(0.0, 0.0, -1.0)), 11);
    }

    #[test]
    fn spawn_is_deterministic() {
        let bp = goblin();
        let a = SpriteEntity::spawn(&bp, CellCoord::new(1, 1), &mut SpawnRng::new(42));
        let b = SpriteEntity::spawn(&bp, CellCoord::new(1, 1), &mut SpawnRng::new(42));
        assert_eq!(a, b);
        assert_eq!(a.textures, bp.textures);
        assert_eq!(a.size, bp.sprite_size());
    }

    #[test]
    fn spawn_reaches_every_corner() {
        let bp = goblin();
        let mut rng = SpawnRng::new(1);
        let corners: Vec<CellCorner> = (0..200)
            .map(|_| SpriteEntity::spawn(&bp, CellCoord::new(1, 1), &mut rng).corner)
            .collect();
        for corner in CellCorner::ALL {
            assert!(corners.contains(&corner), "{corner:?} never spawned");
        }
    }

    #[test]
    fn rng_pick_in_range() {
        let mut rng = SpawnRng::new(7);
        for _ in 0..100 {
            assert!(rng.pick(4) < 4);
        }
        assert_eq!(rng.pick(0), 0);
    }
}
