use std::collections::VecDeque;

use crawl_common::Movement;
use glam::{Mat4, Vec3};

const DEFAULT_YAW: f32 = -90.0;
const DEFAULT_PITCH: f32 = 0.0;
const FREECAM_SPEED: f32 = 3.0;
const MOUSE_SENSITIVITY: f32 = 0.075;
const PITCH_LIMIT: f32 = 89.0;
const TURN_DEGREES: f32 = 90.0;

/// One queued grid move or turn.
///
/// For turns `distance` is the signed yaw change in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraAnimation {
    pub movement: Movement,
    pub duration: f32,
    pub distance: f32,
    pub elapsed: f32,
    anchor_position: Vec3,
    anchor_yaw: f32,
}

/// Vertical sway applied to the view while walking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadBob {
    pub frequency: f32,
    pub magnitude: f32,
    phase: f32,
    displacement: f32,
}

impl Default for HeadBob {
    fn default() -> Self {
        Self {
            frequency: 2.5,
            magnitude: 0.05,
            phase: 0.0,
            displacement: 0.0,
        }
    }
}

impl HeadBob {
    fn advance(&mut self, dt: f32) {
        self.displacement =
            self.magnitude * (std::f32::consts::TAU * self.frequency * self.phase).sin();
        self.phase += dt;
    }

    pub fn displacement(&self) -> f32 {
        self.displacement
    }
}

/// A derived view used for drawing and culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub eye: Vec3,
    pub front: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    /// Head-bob height added to the eye in the view matrix only.
    pub bob: f32,
}

impl RenderView {
    pub fn target(&self) -> Vec3 {
        self.eye + self.front
    }

    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.eye + Vec3::Y * self.bob;
        Mat4::look_at_rh(eye, eye + self.front, self.up)
    }
}

/// First-person camera driven by grid moves, with an optional free-fly mode.
///
/// Angles are in degrees. The animation queue is FIFO; only the front entry
/// advances, and when it finishes the next one is re-anchored to the current pose.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    world_up: Vec3,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    pub speed: f32,
    pub sensitivity: f32,
    animations: VecDeque<CameraAnimation>,
    head_bob: HeadBob,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            world_up: Vec3::Y,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            speed: FREECAM_SPEED,
            sensitivity: MOUSE_SENSITIVITY,
            animations: VecDeque::new(),
            head_bob: HeadBob::default(),
        };
        camera.update_vectors();
        camera
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn head_bob(&self) -> &HeadBob {
        &self.head_bob
    }

    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    fn update_vectors(&mut self) {
        self.front = front_from_angles(self.yaw, self.pitch);
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }

    /// Queue a move or turn. Turns ignore `distance` and rotate 90 degrees.
    pub fn animate(&mut self, movement: Movement, duration: f32, distance: f32) {
        let distance = match movement {
            Movement::TurnLeft => -TURN_DEGREES,
            Movement::TurnRight => TURN_DEGREES,
            _ => distance,
        };
        self.animations.push_back(CameraAnimation {
            movement,
            duration,
            distance,
            elapsed: 0.0,
            anchor_position: self.position,
            anchor_yaw: self.yaw,
        });
    }

    pub fn is_animating(&self) -> bool {
        !self.animations.is_empty()
    }

    pub fn pending_animations(&self) -> usize {
        self.animations.len()
    }

    /// Advance the front animation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let Some(anim) = self.animations.front_mut() else {
            return;
        };
        anim.elapsed = (anim.elapsed + dt).min(anim.duration);
        let t = if anim.duration > 0.0 {
            anim.elapsed / anim.duration
        } else {
            1.0
        };
        let d = anim.distance * t;
        let done = anim.elapsed >= anim.duration;
        let anim = *anim;

        match anim.movement {
            Movement::Forward => self.position = anim.anchor_position + self.front * d,
            Movement::Backward => self.position = anim.anchor_position - self.front * d,
            Movement::Left => self.position = anim.anchor_position - self.right * d,
            Movement::Right => self.position = anim.anchor_position + self.right * d,
            Movement::TurnLeft | Movement::TurnRight => {
                self.yaw = anim.anchor_yaw + d;
                self.update_vectors();
            }
        }
        if !anim.movement.is_turn() {
            self.head_bob.advance(dt);
        }

        if done {
            self.animations.pop_front();
            let (position, yaw) = (self.position, self.yaw);
            if let Some(next) = self.animations.front_mut() {
                next.anchor_position = position;
                next.anchor_yaw = yaw;
            }
        }
    }

    /// Free-fly translation along the current basis.
    pub fn process_keyboard(&mut self, movement: Movement, dt: f32) {
        let velocity = self.speed * dt;
        match movement {
            Movement::Forward => self.position += self.front * velocity,
            Movement::Backward => self.position -= self.front * velocity,
            Movement::Left => self.position -= self.right * velocity,
            Movement::Right => self.position += self.right * velocity,
            Movement::TurnLeft | Movement::TurnRight => {}
        }
    }

    /// Mouse look; `dy` is screen-space (down is positive).
    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        let yaw = self.yaw + dx * self.sensitivity;
        let pitch = self.pitch - dy * self.sensitivity;
        self.set_orientation(yaw, pitch);
    }

    pub fn view(&self) -> RenderView {
        RenderView {
            eye: self.position,
            front: self.front,
            right: self.right,
            up: self.up,
            bob: self.head_bob.displacement,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view().view_matrix()
    }

    /// The over-the-shoulder view used for drawing: pitched down by `head_tilt`
    /// degrees and pulled back along the un-tilted front by `pullback`.
    pub fn render_view(&self, head_tilt: f32, pullback: f32) -> RenderView {
        let pitch = self.pitch - head_tilt;
        let front = front_from_angles(self.yaw, pitch);
        let right = front.cross(self.world_up).normalize();
        RenderView {
            eye: self.position - self.front * pullback,
            front,
            right,
            up: right.cross(front).normalize(),
            bob: self.head_bob.displacement,
        }
    }
}

fn front_from_angles(yaw: f32, pitch: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let cam = Camera::default();
        assert!((cam.front() - Vec3::NEG_Z).length() < 1e-5);
        assert!((cam.right() - Vec3::X).length() < 1e-5);
        assert!((cam.up() - Vec3::Y).length() < 1e-5);
        assert!(!cam.view_matrix().col(0).x.is_nan());
    }

    #[test]
    fn forward_move_completes_exactly() {
        let mut cam = Camera::new(Vec3::new(3.0, 0.25, 21.0));
        let start = cam.position;
        let front = cam.front();
        cam.animate(Movement::Forward, 0.35, 3.0);
        cam.update(0.35);
        assert!((cam.position - (start + front * 3.0)).length() < 1e-5);
        assert!(!cam.is_animating());
    }

    #[test]
    fn partial_update_interpolates() {
        let mut cam = Camera::default();
        cam.animate(Movement::Right, 1.0, 3.0);
        cam.update(0.5);
        assert!((cam.position - Vec3::new(1.5, 0.0, 0.0)).length() < 1e-5);
        assert!(cam.is_animating());
        assert!(cam.head_bob().phase > 0.0);
    }

    #[test]
    fn turns_rotate_ninety_degrees() {
        let mut cam = Camera::default();
        cam.animate(Movement::TurnLeft, 0.25, 0.0);
        for _ in 0..4 {
            cam.update(0.1);
        }
        assert!((cam.yaw() - -180.0).abs() < 1e-4);
        assert!((cam.front() - Vec3::NEG_X).length() < 1e-5);
        assert!(!cam.is_animating());
    }

    #[test]
    fn queued_animation_reanchors() {
        let mut cam = Camera::default();
        cam.animate(Movement::Forward, 0.2, 3.0);
        cam.animate(Movement::TurnRight, 0.2, 0.0);
        cam.animate(Movement::Forward, 0.2, 3.0);
        assert_eq!(cam.pending_animations(), 3);
        for _ in 0..3 {
            cam.update(0.25);
        }
        // North 3, then east 3.
        assert!((cam.position - Vec3::new(3.0, 0.0, -3.0)).length() < 1e-4);
        assert_eq!(cam.pending_animations(), 0);
    }

    #[test]
    fn freecam_mouse_clamps_pitch() {
        let mut cam = Camera::default();
        cam.process_mouse(0.0, -10_000.0);
        assert_eq!(cam.pitch(), PITCH_LIMIT);
        cam.process_keyboard(Movement::Forward, 1.0);
        assert!(cam.position.y > 2.9);
    }

    #[test]
    fn render_view_pulls_back_and_tilts() {
        let cam = Camera::new(Vec3::new(0.0, 0.25, 0.0));
        let view = cam.render_view(3.0, 1.45);
        assert!((view.eye - Vec3::new(0.0, 0.25, 1.45)).length() < 1e-5);
        assert!(view.front.y < 0.0);
        assert!((view.front.y - (-3.0f32).to_radians().sin()).abs() < 1e-5);
    }
}
