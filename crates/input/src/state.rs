use glam::Vec2;

/// Direction keys currently held down, polled each frame for freecam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl HeldKeys {
    pub fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

/// Continuous input sampled once per frame.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HeldKeys,
    mouse_delta: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> HeldKeys {
        self.held
    }

    pub fn set_forward(&mut self, down: bool) {
        self.held.forward = down;
    }

    pub fn set_backward(&mut self, down: bool) {
        self.held.backward = down;
    }

    pub fn set_left(&mut self, down: bool) {
        self.held.left = down;
    }

    pub fn set_right(&mut self, down: bool) {
        self.held.right = down;
    }

    /// Accumulate relative mouse motion until the next [`take_mouse_delta`](Self::take_mouse_delta).
    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.mouse_delta += Vec2::new(dx, dy);
    }

    pub fn take_mouse_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.mouse_delta)
    }

    /// Forget held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held = HeldKeys::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_tracked() {
        let mut s = InputState::new();
        assert!(!s.held().any());
        s.set_forward(true);
        s.set_right(true);
        assert!(s.held().forward && s.held().right);
        s.set_forward(false);
        assert!(!s.held().forward);
        s.release_all();
        assert!(!s.held().any());
    }

    #[test]
    fn mouse_delta_accumulates_and_resets() {
        let mut s = InputState::new();
        s.add_mouse_delta(2.0, -1.0);
        s.add_mouse_delta(1.0, 3.0);
        assert_eq!(s.take_mouse_delta(), Vec2::new(3.0, 2.0));
        assert_eq!(s.take_mouse_delta(), Vec2::ZERO);
    }
}
