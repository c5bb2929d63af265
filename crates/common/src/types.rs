use glam::{IVec2, Vec3};
use serde::{Deserialize, Serialize};

/// Edge length of one grid cell in world units.
pub const CUBE_SIZE: f32 = 3.0;

/// Half of [`CUBE_SIZE`]; the distance from a cell center to any of its faces.
pub const HALF_CUBE: f32 = CUBE_SIZE / 2.0;

/// A cell coordinate in the level grid. `y` runs along world +Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World-space center of the cell. Cells sit on the `y = 0` plane.
    pub fn world_center(self) -> Vec3 {
        Vec3::new(self.x as f32 * CUBE_SIZE, 0.0, self.y as f32 * CUBE_SIZE)
    }

    pub fn offset(self, delta: IVec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y)
    }

    pub fn as_ivec2(self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }
}

impl From<IVec2> for CellCoord {
    fn from(v: IVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

/// The face of a cell cube an object is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CubeSide {
    North,
    South,
    West,
    East,
    Top,
    Bottom,
}

/// Where a sprite stands inside its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellCorner {
    Nw,
    Ne,
    Sw,
    Se,
    Center,
}

impl CellCorner {
    /// Every spawn position, `Center` included.
    pub const ALL: [CellCorner; 5] = [Self::Nw, Self::Ne, Self::Sw, Self::Se, Self::Center];

    /// Sign of the offset from the cell center along world X and Z.
    pub fn signs(self) -> (f32, f32) {
        match self {
            Self::Nw => (-1.0, -1.0),
            Self::Ne => (1.0, -1.0),
            Self::Sw => (-1.0, 1.0),
            Self::Se => (1.0, 1.0),
            Self::Center => (0.0, 0.0),
        }
    }
}

/// Orientation of a door: `Xy` spans the X axis, `Zy` spans the Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellAxis {
    Xy,
    Zy,
}

/// Array-texture layer used by a cube face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallTexture {
    Wall = 0,
    Floor = 1,
    Ceiling = 2,
}

impl WallTexture {
    pub const LAYERS: [WallTexture; 3] = [Self::Wall, Self::Floor, Self::Ceiling];

    pub fn layer(self) -> f32 {
        self as u32 as f32
    }
}

/// A discrete player step or turn; the camera animates each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
    TurnLeft,
    TurnRight,
}

impl Movement {
    pub fn is_turn(self) -> bool {
        matches!(self, Self::TurnLeft | Self::TurnRight)
    }
}

/// Opaque index into the renderer's model table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelHandle(pub u32);

impl ModelHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Rotate a grid direction by `turns` quarter turns. Positive turns go from +Y toward -X.
pub fn rotate_quarter(dir: IVec2, turns: i32) -> IVec2 {
    match turns.rem_euclid(4) {
        0 => dir,
        1 => IVec2::new(-dir.y, dir.x),
        2 => -dir,
        _ => IVec2::new(dir.y, -dir.x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_world_center() {
        let c = CellCoord::new(2, 5);
        assert_eq!(c.world_center(), Vec3::new(6.0, 0.0, 15.0));
    }

    #[test]
    fn quarter_turns() {
        let south = IVec2::new(0, 1);
        assert_eq!(rotate_quarter(south, 1), IVec2::new(-1, 0));
        assert_eq!(rotate_quarter(south, -1), IVec2::new(1, 0));
        assert_eq!(rotate_quarter(south, 2), IVec2::new(0, -1));
        assert_eq!(rotate_quarter(south, 4), south);
        assert_eq!(rotate_quarter(rotate_quarter(south, 1), -1), south);
    }

    #[test]
    fn corner_signs() {
        assert_eq!(CellCorner::Nw.signs(), (-1.0, -1.0));
        assert_eq!(CellCorner::Se.signs(), (1.0, 1.0));
        assert_eq!(CellCorner::Center.signs(), (0.0, 0.0));
    }

    #[test]
    fn turns_are_flagged() {
        assert!(Movement::TurnLeft.is_turn());
        assert!(!Movement::Forward.is_turn());
    }

    #[test]
    fn wall_texture_layers() {
        assert_eq!(WallTexture::Wall.layer(), 0.0);
        assert_eq!(WallTexture::Ceiling.layer(), 2.0);
    }
}
