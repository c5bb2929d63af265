use crawl_common::{CUBE_SIZE, CellAxis, CellCoord};
use serde::{Deserialize, Serialize};

/// Door spanning the X axis.
pub const DOOR_SYMBOL_XY: u8 = b'D';
/// Door spanning the Z axis.
pub const DOOR_SYMBOL_ZY: u8 = b'd';

/// Seconds a triggered open or close takes.
pub const DOOR_TRANSITION_SECONDS: f32 = 1.0;

const SPAWN_DURATION: f32 = 5.0;

/// Vertical travel of a fully open door leaf.
const OPEN_OFFSET_Y: f32 = -CUBE_SIZE + 0.075;

/// Coarse state of a door, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorPhase {
    Closed,
    Opening,
    Open,
    Closing,
}

/// A sliding door occupying one grid cell.
///
/// `opening` and `closing` are never both set. The leaf travels linearly from
/// 0 to `target_offset_y` while opening and back while closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Door {
    pub cell: CellCoord,
    pub axis: CellAxis,
    pub open: bool,
    pub opening: bool,
    pub closing: bool,
    pub duration: f32,
    pub elapsed: f32,
    pub offset_y: f32,
    pub target_offset_y: f32,
}

impl Door {
    pub fn new(cell: CellCoord, axis: CellAxis) -> Self {
        Self {
            cell,
            axis,
            open: false,
            opening: false,
            closing: false,
            duration: SPAWN_DURATION,
            elapsed: 0.0,
            offset_y: 0.0,
            target_offset_y: OPEN_OFFSET_Y,
        }
    }

    /// Door for a map symbol, if it is one.
    pub fn from_symbol(cell: CellCoord, symbol: u8) -> Option<Self> {
        match symbol {
            DOOR_SYMBOL_XY => Some(Self::new(cell, CellAxis::Xy)),
            DOOR_SYMBOL_ZY => Some(Self::new(cell, CellAxis::Zy)),
            _ => None,
        }
    }

    pub fn phase(&self) -> DoorPhase {
        match (self.open, self.opening, self.closing) {
            (_, true, _) => DoorPhase::Opening,
            (_, _, true) => DoorPhase::Closing,
            (true, _, _) => DoorPhase::Open,
            (false, _, _) => DoorPhase::Closed,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.opening || self.closing
    }

    /// Only a fully open, idle door can be walked through.
    pub fn is_passable(&self) -> bool {
        self.open && !self.is_transitioning()
    }

    /// Start opening a closed, idle door. Returns whether anything changed.
    pub fn open(&mut self) -> bool {
        if self.open || self.is_transitioning() {
            return false;
        }
        self.begin(true);
        true
    }

    /// Start closing an open, idle door. Returns whether anything changed.
    pub fn close(&mut self) -> bool {
        if !self.open || self.is_transitioning() {
            return false;
        }
        self.begin(false);
        true
    }

    /// Open a closed door or close an open one; no-op mid-transition.
    pub fn toggle(&mut self) -> bool {
        if self.open { self.close() } else { self.open() }
    }

    fn begin(&mut self, opening: bool) {
        self.opening = opening;
        self.closing = !opening;
        self.elapsed = 0.0;
        self.duration = DOOR_TRANSITION_SECONDS;
    }

    /// Advance an active transition. Returns the phase reached when it completes.
    pub fn update(&mut self, dt: f32) -> Option<DoorPhase> {
        if !self.is_transitioning() {
            return None;
        }
        self.elapsed = (self.elapsed + dt).min(self.duration);
        let t = if self.duration > 0.0 {
            self.elapsed / self.duration
        } else {
            1.0
        };
        self.offset_y = if self.opening {
            t * self.target_offset_y
        } else {
            (1.0 - t) * self.target_offset_y
        };

        if self.elapsed >= self.duration {
            self.open = !self.open;
            self.opening = false;
            self.closing = false;
            return Some(self.phase());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door() -> Door {
        Door::new(CellCoord::new(2, 6), CellAxis::Xy)
    }

    fn run(d: &mut Door, total: f32, steps: usize) {
        for _ in 0..steps {
            d.update(total / steps as f32);
        }
    }

    #[test]
    fn symbols_map_to_axes() {
        let c = CellCoord::new(0, 0);
        assert_eq!(Door::from_symbol(c, b'D').unwrap().axis, CellAxis::Xy);
        assert_eq!(Door::from_symbol(c, b'd').unwrap().axis, CellAxis::Zy);
        assert!(Door::from_symbol(c, b'#').is_none());
    }

    #[test]
    fn spawned_closed() {
        let d = door();
        assert_eq!(d.phase(), DoorPhase::Closed);
        assert_eq!(d.duration, 5.0);
        assert!((d.target_offset_y - (-2.925)).abs() < 1e-6);
        assert!(!d.is_passable());
    }

    #[test]
    fn opens_after_duration() {
        let mut d = door();
        assert!(d.open());
        assert_eq!(d.phase(), DoorPhase::Opening);
        d.update(0.5);
        assert!((d.offset_y - 0.5 * d.target_offset_y).abs() < 1e-6);
        assert_eq!(d.update(0.5), Some(DoorPhase::Open));
        assert!(d.open);
        assert!(!d.opening && !d.closing);
        assert!((d.offset_y - d.target_offset_y).abs() < 1e-6);
        assert!(d.is_passable());
    }

    #[test]
    fn step_size_does_not_matter() {
        for steps in [1, 3, 7, 60, 1000] {
            let mut d = door();
            d.open();
            run(&mut d, DOOR_TRANSITION_SECONDS, steps);
            d.update(1e-4);
            assert!(d.open, "{steps} steps");
            assert!(!d.is_transitioning());
        }
    }

    #[test]
    fn elapsed_saturates() {
        let mut d = door();
        d.open();
        d.update(10.0);
        assert_eq!(d.elapsed, d.duration);
        assert!(d.open);
    }

    #[test]
    fn open_on_open_door_is_noop() {
        let mut d = door();
        d.open();
        d.update(1.0);
        let before = d.clone();
        assert!(!d.open());
        assert_eq!(d, before);
    }

    #[test]
    fn retrigger_mid_transition_is_noop() {
        let mut d = door();
        d.open();
        d.update(0.25);
        let before = d.clone();
        assert!(!d.toggle());
        assert!(!d.close());
        assert_eq!(d, before);
    }

    #[test]
    fn closing_reverses_offset() {
        let mut d = door();
        d.toggle();
        d.update(1.0);
        assert!(d.toggle());
        assert_eq!(d.phase(), DoorPhase::Closing);
        d.update(0.25);
        assert!((d.offset_y - 0.75 * d.target_offset_y).abs() < 1e-6);
        assert_eq!(d.update(0.75), Some(DoorPhase::Closed));
        assert!(!d.open);
        assert!(d.offset_y.abs() < 1e-6);
    }

    #[test]
    fn idle_update_is_noop() {
        let mut d = door();
        let before = d.clone();
        assert_eq!(d.update(0.5), None);
        assert_eq!(d, before);
    }
}
