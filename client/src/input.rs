//! Keyboard sampling and translation into room requests

use macroquad::prelude::*;
use shared::{Inputs, Request, XDirection, YDirection};

/// Keys relevant to the game for one frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub freeze: bool,
    pub start: bool,
}

impl KeyState {
    /// Reads the keyboard (WASD or arrow keys, Space to freeze, Enter to start).
    pub fn sample() -> Self {
        Self {
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            freeze: is_key_down(KeyCode::Space),
            start: is_key_down(KeyCode::Enter),
        }
    }

    pub fn inputs(&self) -> Inputs {
        let horizontal = match (self.left, self.right) {
            (true, false) => XDirection::Left,
            (false, true) => XDirection::Right,
            _ => XDirection::None,
        };
        let vertical = match (self.up, self.down) {
            (true, false) => YDirection::Up,
            (false, true) => YDirection::Down,
            _ => YDirection::None,
        };
        Inputs {
            horizontal,
            vertical,
        }
    }
}

/// Turns key state into requests: movement only when it changes, actions on key press.
pub struct InputManager {
    current_inputs: Inputs,

    // Previous frame key states for edge detection
    prev_freeze: bool,
    prev_start: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            current_inputs: Inputs::default(),
            prev_freeze: false,
            prev_start: false,
        }
    }

    pub fn update(&mut self) -> Vec<Request> {
        self.process(KeyState::sample())
    }

    pub fn process(&mut self, keys: KeyState) -> Vec<Request> {
        let mut requests = Vec::new();

        let inputs = keys.inputs();
        if inputs != self.current_inputs {
            self.current_inputs = inputs;
            requests.push(Request::SetInputs { inputs });
        }

        // Detect key press events (current && !previous)
        if keys.freeze && !self.prev_freeze {
            requests.push(Request::Freeze);
        }
        if keys.start && !self.prev_start {
            requests.push(Request::StartGame);
        }

        self.prev_freeze = keys.freeze;
        self.prev_start = keys.start;

        requests
    }

    pub fn current_inputs(&self) -> Inputs {
        self.current_inputs
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert_eq!(input_manager.current_inputs(), Inputs::default());
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let keys = KeyState {
            left: true,
            right: true,
            up: true,
            down: true,
            ..KeyState::default()
        };
        assert_eq!(keys.inputs(), Inputs::default());
    }

    #[test]
    fn test_movement_sent_only_on_change() {
        let mut manager = InputManager::new();
        let keys = KeyState {
            right: true,
            up: true,
            ..KeyState::default()
        };

        let first = manager.process(keys);
        let expected = Inputs {
            horizontal: XDirection::Right,
            vertical: YDirection::Up,
        };
        assert_eq!(first, vec![Request::SetInputs { inputs: expected }]);
        assert!(manager.process(keys).is_empty());

        let released = manager.process(KeyState::default());
        assert_eq!(
            released,
            vec![Request::SetInputs {
                inputs: Inputs::default()
            }]
        );
    }

    #[test]
    fn test_actions_fire_on_press_only() {
        let mut manager = InputManager::new();
        let held = KeyState {
            freeze: true,
            start: true,
            ..KeyState::default()
        };

        assert_eq!(
            manager.process(held),
            vec![Request::Freeze, Request::StartGame]
        );
        assert!(manager.process(held).is_empty());

        manager.process(KeyState::default());
        assert_eq!(manager.process(held).len(), 2);
    }
}
