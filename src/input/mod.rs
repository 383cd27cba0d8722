use std::collections::HashSet;
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

/// Raw hardware state for a single frame. Polled once per frame by the
/// active screen; nothing is buffered across frames.
#[derive(Debug, Default)]
pub struct InputState {
    pub keys_held: HashSet<KeyCode>,
    pub keys_pressed: HashSet<KeyCode>,
    pub keys_released: HashSet<KeyCode>,

    pub mouse_pos: [f32; 2],
    /// Cursor movement since the last frame, in pixels.
    pub mouse_delta: [f32; 2],
    pub mouse_held: HashSet<MouseButton>,
    pub mouse_pressed: HashSet<MouseButton>,
    pub mouse_released: HashSet<MouseButton>,

    cursor_locked: bool,
    lock_changed: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_frame_state(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.mouse_pressed.clear();
        self.mouse_released.clear();
        self.mouse_delta = [0.0, 0.0];
    }

    pub fn press_key(&mut self, key: KeyCode) {
        if self.keys_held.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
        self.keys_released.insert(key);
    }

    pub fn press_mouse(&mut self, button: MouseButton) {
        if self.mouse_held.insert(button) {
            self.mouse_pressed.insert(button);
        }
    }

    pub fn release_mouse(&mut self, button: MouseButton) {
        self.mouse_held.remove(&button);
        self.mouse_released.insert(button);
    }

    /// Record a new cursor position; the difference accumulates into `mouse_delta`.
    pub fn move_cursor(&mut self, x: f32, y: f32) {
        self.mouse_delta[0] += x - self.mouse_pos[0];
        self.mouse_delta[1] += y - self.mouse_pos[1];
        self.mouse_pos = [x, y];
    }

    /// Relative motion while the cursor is locked (no absolute position).
    pub fn add_motion(&mut self, dx: f32, dy: f32) {
        self.mouse_delta[0] += dx;
        self.mouse_delta[1] += dy;
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool { self.keys_held.contains(&key) }
    pub fn is_key_pressed(&self, key: KeyCode) -> bool { self.keys_pressed.contains(&key) }
    pub fn is_key_released(&self, key: KeyCode) -> bool { self.keys_released.contains(&key) }

    pub fn is_mouse_held(&self, button: MouseButton) -> bool { self.mouse_held.contains(&button) }
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool { self.mouse_pressed.contains(&button) }
    pub fn is_mouse_released(&self, button: MouseButton) -> bool { self.mouse_released.contains(&button) }

    /// Returns true if the mouse is currently within the given pixel bounds.
    pub fn is_mouse_over(&self, x: f32, y: f32, w: f32, h: f32) -> bool {
        let [mx, my] = self.mouse_pos;
        mx >= x && mx < x + w && my >= y && my < y + h
    }

    /// Returns true if the mouse was clicked (pressed) within the given bounds this frame.
    pub fn was_clicked(&self, x: f32, y: f32, w: f32, h: f32) -> bool {
        self.is_mouse_pressed(MouseButton::Left) && self.is_mouse_over(x, y, w, h)
    }

    /// Ask the window to grab and hide the cursor (or release it).
    pub fn request_cursor_lock(&mut self, locked: bool) {
        if self.cursor_locked != locked {
            self.cursor_locked = locked;
            self.lock_changed = true;
        }
    }

    pub fn cursor_locked(&self) -> bool {
        self.cursor_locked
    }

    /// The pending lock request, if it changed since the last call.
    pub fn take_lock_request(&mut self) -> Option<bool> {
        std::mem::take(&mut self.lock_changed).then_some(self.cursor_locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_is_edge_triggered() {
        let mut input = InputState::new();
        input.press_key(KeyCode::Escape);
        assert!(input.is_key_pressed(KeyCode::Escape));
        input.clear_frame_state();
        input.press_key(KeyCode::Escape);
        assert!(!input.is_key_pressed(KeyCode::Escape));
        assert!(input.is_key_held(KeyCode::Escape));
    }

    #[test]
    fn cursor_delta_accumulates_until_cleared() {
        let mut input = InputState::new();
        input.move_cursor(10.0, 5.0);
        input.move_cursor(12.0, 4.0);
        assert_eq!(input.mouse_delta, [12.0, 4.0]);
        input.clear_frame_state();
        assert_eq!(input.mouse_delta, [0.0, 0.0]);
        assert_eq!(input.mouse_pos, [12.0, 4.0]);
    }

    #[test]
    fn lock_request_reported_once() {
        let mut input = InputState::new();
        input.request_cursor_lock(true);
        assert_eq!(input.take_lock_request(), Some(true));
        assert_eq!(input.take_lock_request(), None);
        input.request_cursor_lock(true);
        assert_eq!(input.take_lock_request(), None);
    }

    #[test]
    fn click_hit_test() {
        let mut input = InputState::new();
        input.move_cursor(50.0, 50.0);
        input.press_mouse(MouseButton::Left);
        assert!(input.was_clicked(40.0, 40.0, 20.0, 20.0));
        assert!(!input.was_clicked(0.0, 0.0, 20.0, 20.0));
    }
}
