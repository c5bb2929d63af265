use std::collections::BTreeMap;

use crawl_common::{CellCoord, CubeSide, Grid, GridError, ModelHandle, Movement, rotate_quarter};
use crawl_lighting::{Light, LightMap, tier_for_symbol};
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::door::{DOOR_SYMBOL_XY, DOOR_SYMBOL_ZY, Door, DoorPhase};
use crate::sprite::{Blueprint, SpawnRng, SpriteEntity, SpriteKind};

/// Map symbol of the player spawn.
pub const PLAYER_SYMBOL: u8 = b'P';

const MOVE_DURATION: f32 = 0.35;
const TURN_DURATION: f32 = 0.25;

/// Symbols with a fixed meaning that blueprints may not claim.
const RESERVED_SYMBOLS: [u8; 4] = [Grid::WALL, PLAYER_SYMBOL, DOOR_SYMBOL_XY, DOOR_SYMBOL_ZY];

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("invalid map: {0}")]
    Grid(#[from] GridError),
    #[error("map has no player spawn ('P')")]
    NoPlayerSpawn,
    #[error("blueprint symbol '{}' is reserved", char::from(*.0))]
    ReservedSymbol(u8),
    #[error("blueprint symbol '{}' defined twice", char::from(*.0))]
    DuplicateBlueprint(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub cell: CellCoord,
    /// Grid direction the player faces away from; stepping forward subtracts it.
    pub direction: IVec2,
}

impl Player {
    /// The cell directly ahead of the player.
    pub fn facing_cell(&self) -> CellCoord {
        self.cell.offset(-self.direction)
    }
}

/// A static model anchored to one face of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelInstance {
    pub cell: CellCoord,
    pub align: CubeSide,
    pub scale: f32,
    pub model: ModelHandle,
}

/// A record of every state change, drained by the frame loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LevelEvent {
    Loaded { width: i32, height: i32 },
    PlayerMoved { from: CellCoord, to: CellCoord },
    PlayerTurned { direction: IVec2 },
    MoveBlocked { target: CellCoord },
    DoorTriggered { cell: CellCoord, phase: DoorPhase },
    DoorSettled { cell: CellCoord, phase: DoorPhase },
    FreecamToggled { enabled: bool },
}

/// The authoritative level state.
#[derive(Debug, Clone)]
pub struct Level {
    grid: Grid,
    pub player: Player,
    pub freecam: bool,
    pub move_duration: f32,
    pub turn_duration: f32,
    pub monsters: Vec<SpriteEntity>,
    pub objects: Vec<SpriteEntity>,
    pub doors: Vec<Door>,
    pub model_instances: Vec<ModelInstance>,
    blueprints: BTreeMap<u8, Blueprint>,
    lights: Vec<Light>,
    light_map: LightMap,
    seed: u64,
    event_log: Vec<LevelEvent>,
}

impl Level {
    /// Scan the grid and spawn the player, doors, lights and sprites.
    ///
    /// The first `P` in row-major order wins; a map without one is rejected.
    pub fn load(grid: Grid, blueprints: Vec<Blueprint>, seed: u64) -> Result<Self, LevelError> {
        let _span = tracing::info_span!("load_level").entered();

        let mut by_symbol = BTreeMap::new();
        for bp in blueprints {
            if RESERVED_SYMBOLS.contains(&bp.map_symbol)
                || tier_for_symbol(bp.map_symbol).is_some()
                || bp.map_symbol == b' '
            {
                return Err(LevelError::ReservedSymbol(bp.map_symbol));
            }
            let symbol = bp.map_symbol;
            if by_symbol.insert(symbol, bp).is_some() {
                return Err(LevelError::DuplicateBlueprint(symbol));
            }
        }

        let spawns = grid.find_all(PLAYER_SYMBOL);
        let spawn = *spawns.first().ok_or(LevelError::NoPlayerSpawn)?;
        if spawns.len() > 1 {
            tracing::warn!(
                extra = spawns.len() - 1,
                "map has several player spawns, using the first"
            );
        }

        let mut rng = SpawnRng::new(seed);
        let mut doors = Vec::new();
        let mut monsters = Vec::new();
        let mut objects = Vec::new();
        for (cell, symbol) in grid.iter() {
            if let Some(door) = Door::from_symbol(cell, symbol) {
                doors.push(door);
            } else if let Some(bp) = by_symbol.get(&symbol) {
                let entity = SpriteEntity::spawn(bp, cell, &mut rng);
                tracing::debug!(?cell, kind = ?bp.kind, corner = ?entity.corner, "spawned sprite");
                match bp.kind {
                    SpriteKind::Monster => monsters.push(entity),
                    SpriteKind::Object => objects.push(entity),
                }
            }
        }

        let lights = Light::scan(&grid);
        let light_map = LightMap::from_grid(&grid);

        tracing::info!(
            width = grid.width(),
            height = grid.height(),
            doors = doors.len(),
            monsters = monsters.len(),
            objects = objects.len(),
            lights = lights.len(),
            "level loaded"
        );

        let event_log = vec![LevelEvent::Loaded {
            width: grid.width(),
            height: grid.height(),
        }];

        Ok(Self {
            grid,
            player: Player {
                cell: spawn,
                direction: IVec2::new(0, 1),
            },
            freecam: false,
            move_duration: MOVE_DURATION,
            turn_duration: TURN_DURATION,
            monsters,
            objects,
            doors,
            model_instances: Vec::new(),
            blueprints: by_symbol,
            lights,
            light_map,
            seed,
            event_log,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn width(&self) -> i32 {
        self.grid.width()
    }

    pub fn height(&self) -> i32 {
        self.grid.height()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn light_map(&self) -> &LightMap {
        &self.light_map
    }

    /// Replace the light map, e.g. to apply a brightness scale.
    pub fn set_light_map(&mut self, light_map: LightMap) {
        self.light_map = light_map;
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &Blueprint> {
        self.blueprints.values()
    }

    pub fn is_open(&self, cell: CellCoord) -> bool {
        self.grid.at(cell) != Grid::WALL
    }

    pub fn door_at(&self, cell: CellCoord) -> Option<&Door> {
        self.doors.iter().find(|d| d.cell == cell)
    }

    pub fn create_model_instance(
        &mut self,
        cell: CellCoord,
        align: CubeSide,
        scale: f32,
        model: ModelHandle,
    ) {
        self.model_instances.push(ModelInstance {
            cell,
            align,
            scale,
            model,
        });
    }

    /// Step or turn the player. Returns the animation to play, or `None` if refused.
    ///
    /// Steps into walls and doors that are not fully open are refused. Ignored in freecam.
    pub fn move_player(&mut self, movement: Movement) -> Option<(Movement, f32)> {
        if self.freecam {
            return None;
        }
        let dir = self.player.direction;
        let step = match movement {
            Movement::Forward => -dir,
            Movement::Backward => dir,
            Movement::Left => rotate_quarter(dir, 1),
            Movement::Right => rotate_quarter(dir, -1),
            Movement::TurnLeft | Movement::TurnRight => {
                let turns = if movement == Movement::TurnLeft { -1 } else { 1 };
                self.player.direction = rotate_quarter(dir, turns);
                self.event_log.push(LevelEvent::PlayerTurned {
                    direction: self.player.direction,
                });
                return Some((movement, self.turn_duration));
            }
        };

        let from = self.player.cell;
        let to = from.offset(step);
        let blocked_by_door = self.door_at(to).is_some_and(|d| !d.is_passable());
        if !self.is_open(to) || blocked_by_door {
            tracing::debug!(?from, ?to, "move blocked");
            self.event_log.push(LevelEvent::MoveBlocked { target: to });
            return None;
        }
        self.player.cell = to;
        self.event_log.push(LevelEvent::PlayerMoved { from, to });
        Some((movement, self.move_duration))
    }

    /// Use the door in front of the player. Returns whether a transition started.
    pub fn use_door(&mut self) -> bool {
        let target = self.player.facing_cell();
        let Some(door) = self.doors.iter_mut().find(|d| d.cell == target) else {
            return false;
        };
        if !door.toggle() {
            return false;
        }
        tracing::debug!(cell = ?target, phase = ?door.phase(), "door triggered");
        self.event_log.push(LevelEvent::DoorTriggered {
            cell: target,
            phase: door.phase(),
        });
        true
    }

    pub fn toggle_freecam(&mut self) -> bool {
        self.freecam = !self.freecam;
        self.event_log.push(LevelEvent::FreecamToggled {
            enabled: self.freecam,
        });
        self.freecam
    }

    /// Advance door animations.
    pub fn update(&mut self, dt: f32) {
        for door in &mut self.doors {
            if let Some(phase) = door.update(dt) {
                self.event_log.push(LevelEvent::DoorSettled {
                    cell: door.cell,
                    phase,
                });
            }
        }
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<LevelEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[LevelEvent] {
        &self.event_log
    }
}
