//! YAML level manifests.

use std::collections::BTreeMap;
use std::path::Path;

use crawl_assets::ModelSpec;
use crawl_common::{CubeSide, Grid, GridError};
use crawl_level::{Blueprint, SpriteKind};
use serde::{Deserialize, Serialize};

use crate::settings::RenderSettings;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid manifest YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("symbol {0:?} is not a single ASCII character")]
    InvalidSymbol(char),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// A sprite template keyed by its map symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintSpec {
    pub symbol: char,
    /// `*` for sprites that look the same from every side.
    pub direction: char,
    /// Image path without extension or facing suffix.
    pub texture: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub scale: f32,
}

impl BlueprintSpec {
    fn to_blueprint(&self, kind: SpriteKind) -> Result<Blueprint, ManifestError> {
        Ok(Blueprint::new(
            kind,
            ascii(self.symbol)?,
            ascii(self.direction)?,
            self.texture.clone(),
            self.frame_width,
            self.frame_height,
            self.scale,
        ))
    }
}

fn ascii(c: char) -> Result<u8, ManifestError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ManifestError::InvalidSymbol(c))
    }
}

/// Image paths for one wall layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceTextures {
    pub diffuse: String,
    pub normal: String,
    pub specular: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallSet {
    pub wall: SurfaceTextures,
    pub floor: SurfaceTextures,
    pub ceiling: SurfaceTextures,
}

impl WallSet {
    /// Layers in array-texture order.
    pub fn layers(&self) -> [&SurfaceTextures; 3] {
        [&self.wall, &self.floor, &self.ceiling]
    }
}

/// A named model placed on a face of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub model: String,
    pub x: i32,
    pub y: i32,
    pub align: CubeSide,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

/// Everything needed to load one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelManifest {
    pub name: String,
    #[serde(default)]
    pub seed: u64,
    /// Map rows, all the same width.
    pub map: Vec<String>,
    #[serde(default)]
    pub monsters: Vec<BlueprintSpec>,
    #[serde(default)]
    pub objects: Vec<BlueprintSpec>,
    pub walls: WallSet,
    pub door_model: ModelSpec,
    #[serde(default)]
    pub models: BTreeMap<String, ModelSpec>,
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,
    #[serde(default)]
    pub render: Option<RenderSettings>,
}

impl LevelManifest {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let manifest = Self::from_yaml_str(&text)?;
        tracing::info!(path = %path.display(), name = %manifest.name, "manifest loaded");
        Ok(manifest)
    }

    /// The reference 9x9 level with its torches, barrels and benches.
    pub fn builtin() -> Result<Self, ManifestError> {
        Self::from_yaml_str(BUILTIN_MANIFEST)
    }

    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn grid(&self) -> Result<Grid, ManifestError> {
        Ok(Grid::from_rows(&self.map)?)
    }

    /// Monster blueprints followed by object blueprints.
    pub fn blueprints(&self) -> Result<Vec<Blueprint>, ManifestError> {
        let monsters = self.monsters.iter().map(|b| b.to_blueprint(SpriteKind::Monster));
        let objects = self.objects.iter().map(|b| b.to_blueprint(SpriteKind::Object));
        monsters.chain(objects).collect()
    }

    /// Effective render settings: the manifest's own, or the defaults.
    pub fn render_settings(&self) -> RenderSettings {
        self.render.clone().unwrap_or_default()
    }
}

const BUILTIN_MANIFEST: &str = include_str!("../levels/test_map_1.yaml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_parses() {
        let m = LevelManifest::builtin().unwrap();
        let grid = m.grid().unwrap();
        assert_eq!((grid.width(), grid.height()), (9, 9));
        assert_eq!(m.monsters.len(), 3);
        assert_eq!(m.instances.len(), 18);
        assert!(m.instances.iter().all(|i| m.models.contains_key(&i.model)));
        assert_eq!(m.instances[6].align, CubeSide::East);
        assert_eq!(m.instances[0].scale, 1.0);
        assert!(m.render.is_none());
    }

    #[test]
    fn builtin_map_rows_survive_quoting() {
        let m = LevelManifest::builtin().unwrap();
        assert_eq!(m.name, "test_map_1");
        assert_eq!(m.map.first().map(String::as_str), Some("#########"));
        assert_eq!(m.map[7], "#P4d    #");
        assert!(m.map.iter().all(|row| row.len() == 9));
        assert_eq!(m.walls.floor.diffuse, "assets/textures/wood_floor.png");
    }

    #[test]
    fn blueprints_keep_kind_and_symbols() {
        let m = LevelManifest::builtin().unwrap();
        let bps = m.blueprints().unwrap();
        assert_eq!(bps.len(), 5);
        assert_eq!(bps[0].kind, SpriteKind::Monster);
        assert_eq!(bps[0].map_symbol, b'M');
        assert!(bps[3].is_unidirectional());
        assert_eq!(bps[3].kind, SpriteKind::Object);
    }

    #[test]
    fn non_ascii_symbol_rejected() {
        let mut m = LevelManifest::builtin().unwrap();
        m.monsters[0].symbol = 'é';
        assert!(matches!(m.blueprints(), Err(ManifestError::InvalidSymbol('é'))));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.yaml");
        let mut m = LevelManifest::builtin().unwrap();
        m.render = Some(RenderSettings {
            shadows: false,
            ..RenderSettings::default()
        });
        std::fs::write(&path, m.to_yaml().unwrap()).unwrap();
        let back = LevelManifest::load(&path).unwrap();
        assert_eq!(back, m);
        assert!(!back.render_settings().shadows);
    }

    #[test]
    fn missing_file_and_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LevelManifest::load(dir.path().join("none.yaml")),
            Err(ManifestError::Io { .. })
        ));
        assert!(matches!(
            LevelManifest::from_yaml_str("name: [unclosed"),
            Err(ManifestError::Yaml(_))
        ));
    }

    #[test]
    fn ragged_map_is_a_grid_error() {
        let mut m = LevelManifest::builtin().unwrap();
        m.map[3].push('#');
        assert!(matches!(m.grid(), Err(ManifestError::Grid(_))));
    }
}
