//! Keyboard input: raw key events mapped onto six logical movement flags.
//!
//! Hosts either call [`InputTracker::on_key_down`] / [`InputTracker::on_key_up`] directly
//! from the frame loop or push [`InputEvent`]s through an [`InputSender`], which the
//! controller drains at the start of every tick.

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Physical keys the character controller understands.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Space,
    Shift,
}

impl Key {
    /// Map a legacy DOM `keyCode` to a key. Codes outside the table yield `None`.
    pub fn from_code(code: u32) -> Option<Key> {
        Some(match code {
            87 => Key::W,
            65 => Key::A,
            83 => Key::S,
            68 => Key::D,
            38 => Key::ArrowUp,
            40 => Key::ArrowDown,
            37 => Key::ArrowLeft,
            39 => Key::ArrowRight,
            32 => Key::Space,
            16 => Key::Shift,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Key::W => 87,
            Key::A => 65,
            Key::S => 83,
            Key::D => 68,
            Key::ArrowUp => 38,
            Key::ArrowDown => 40,
            Key::ArrowLeft => 37,
            Key::ArrowRight => 39,
            Key::Space => 32,
            Key::Shift => 16,
        }
    }
}

/// Logical movement flags read by the integrator and the state machine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub dance: bool,
    pub sprint: bool,
}

impl InputState {
    #[inline]
    pub fn moving(&self) -> bool {
        self.forward || self.backward
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    Pressed(Key),
    Released(Key),
}

impl InputEvent {
    /// Build an event from a raw key code; unmapped codes yield `None`.
    pub fn from_code(code: u32, pressed: bool) -> Option<Self> {
        let key = Key::from_code(code)?;
        Some(if pressed {
            InputEvent::Pressed(key)
        } else {
            InputEvent::Released(key)
        })
    }
}

/// Cloneable producer half of the input channel. Safe to hand to other threads.
#[derive(Clone, Debug)]
pub struct InputSender {
    tx: Sender<InputEvent>,
}

impl InputSender {
    /// Queue an event for the next tick. Returns false once the controller is gone.
    pub fn send(&self, event: InputEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.send(InputEvent::Pressed(key))
    }

    pub fn key_up(&self, key: Key) -> bool {
        self.send(InputEvent::Released(key))
    }
}

/// Pure event-to-flag mapper owning the current [`InputState`].
#[derive(Debug)]
pub struct InputTracker {
    keys: InputState,
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl Default for InputTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InputTracker {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            keys: InputState::default(),
            tx,
            rx,
        }
    }

    #[inline]
    pub fn state(&self) -> &InputState {
        &self.keys
    }

    pub fn sender(&self) -> InputSender {
        InputSender {
            tx: self.tx.clone(),
        }
    }

    pub fn on_key_down(&mut self, key: Key) {
        log::trace!("key down: {key:?} ({})", key.code());
        let keys = &mut self.keys;
        match key {
            Key::W | Key::ArrowUp => keys.forward = true,
            Key::S | Key::ArrowDown => keys.backward = true,
            Key::A | Key::ArrowLeft => keys.left = true,
            // D is the dance key; it also cancels any held right turn.
            Key::D => {
                keys.dance = true;
                keys.right = false;
            }
            Key::ArrowRight => keys.right = true,
            Key::Shift => keys.sprint = true,
            Key::Space => {}
        }
    }

    pub fn on_key_up(&mut self, key: Key) {
        log::trace!("key up: {key:?} ({})", key.code());
        let keys = &mut self.keys;
        match key {
            Key::W | Key::ArrowUp => keys.forward = false,
            Key::S | Key::ArrowDown => keys.backward = false,
            Key::A | Key::ArrowLeft => keys.left = false,
            // Releasing D leaves `right` untouched so the character does not start spinning.
            Key::D => keys.dance = false,
            Key::ArrowRight => keys.right = false,
            Key::Shift => keys.sprint = false,
            Key::Space => {}
        }
    }

    /// Raw key-code entry points; codes outside the table are ignored.
    pub fn on_code_down(&mut self, code: u32) {
        if let Some(key) = Key::from_code(code) {
            self.on_key_down(key);
        }
    }

    pub fn on_code_up(&mut self, code: u32) {
        if let Some(key) = Key::from_code(code) {
            self.on_key_up(key);
        }
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Pressed(key) => self.on_key_down(key),
            InputEvent::Released(key) => self.on_key_up(key),
        }
    }

    /// Apply every queued event in arrival order. Returns how many were applied.
    pub fn drain_events(&mut self) -> usize {
        let mut n = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_and_arrow_keys_share_flags() {
        let mut t = InputTracker::new();
        t.on_key_down(Key::ArrowUp);
        assert!(t.state().forward);
        t.on_key_up(Key::W);
        assert!(!t.state().forward);

        t.on_key_down(Key::S);
        t.on_key_down(Key::ArrowLeft);
        t.on_key_down(Key::Shift);
        assert!(t.state().backward && t.state().left && t.state().sprint);
    }

    /// D triggers dance and cancels right turn; releasing it does not restore the turn.
    /// There is deliberately no letter key for turning right.
    #[test]
    fn d_key_asymmetry_is_preserved() {
        let mut t = InputTracker::new();
        t.on_key_down(Key::ArrowRight);
        assert!(t.state().right);

        t.on_key_down(Key::D);
        assert!(t.state().dance);
        assert!(!t.state().right);

        t.on_key_up(Key::D);
        assert!(!t.state().dance);
        assert!(!t.state().right);

        t.on_key_up(Key::ArrowRight);
        t.on_key_down(Key::D);
        t.on_key_up(Key::D);
        assert_eq!(*t.state(), InputState::default());
    }

    #[test]
    fn unmapped_codes_are_ignored() {
        let mut t = InputTracker::new();
        t.on_code_down(90); // Z
        t.on_code_down(32); // Space is mapped as a key but drives no flag
        assert_eq!(*t.state(), InputState::default());
        assert!(InputEvent::from_code(1234, true).is_none());

        t.on_code_down(87);
        assert!(t.state().forward);
    }

    #[test]
    fn key_codes_round_trip_through_table() {
        for code in [87, 65, 83, 68, 38, 40, 37, 39, 32, 16] {
            assert_eq!(Key::from_code(code).map(Key::code), Some(code));
        }
    }

    #[test]
    fn queued_events_apply_in_order_on_drain() {
        let mut t = InputTracker::new();
        let tx = t.sender();
        assert!(tx.key_down(Key::W));
        assert!(tx.key_down(Key::Shift));
        assert!(tx.key_up(Key::W));
        // Nothing changes until the owner drains.
        assert_eq!(*t.state(), InputState::default());

        assert_eq!(t.drain_events(), 3);
        assert!(!t.state().forward);
        assert!(t.state().sprint);
    }

    #[test]
    fn sender_works_across_threads() {
        let mut t = InputTracker::new();
        let tx = t.sender();
        std::thread::spawn(move || {
            tx.key_down(Key::ArrowLeft);
        })
        .join()
        .unwrap();
        t.drain_events();
        assert!(t.state().left);
    }
}
