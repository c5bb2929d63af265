//! Shared types: the level grid, cell/cube enums, vertex layouts and tangent generation.
//!
//! # Invariants
//! - Grid index is always `y * width + x`.
//! - Out-of-bounds grid reads are walls.
//! - Vertex layouts are `#[repr(C)]` and match the GPU attribute contract.

mod grid;
mod tangent;
mod types;
mod vertex;

pub use grid::{Grid, GridError};
pub use tangent::{TangentVertex, generate_tangents};
pub use types::{
    CUBE_SIZE, CellAxis, CellCoord, CellCorner, CubeSide, HALF_CUBE, ModelHandle, Movement,
    WallTexture, rotate_quarter,
};
pub use vertex::{MeshVertex, TexturedVertex};

pub fn crate_info() -> &'static str {
    "crawl-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
