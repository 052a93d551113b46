//! Contracts between the interpreter and the outside world, plus the
//! headless implementations used by tests and the CLI.

use std::collections::VecDeque;
use std::io::Write;

use crate::framebuffer::{FrameChanges, Framebuffer};
use crate::NUM_KEYS;

/// Pressed state of keys `0x0..=0xF`.
pub type KeyState = [bool; NUM_KEYS];

/// Receives the picture after every cycle that changed it.
pub trait Display {
    fn draw_frame(&mut self, frame: &Framebuffer);

    /// Incremental variant. `frame` is the state after `changes` were applied,
    /// so implementations that don't track pixels can just redraw it.
    fn apply_changes(&mut self, _changes: &FrameChanges, frame: &Framebuffer) {
        self.draw_frame(frame);
    }
}

/// Source of key state. Polled at the start of every step, and repeatedly
/// while `Fx0A` waits.
pub trait Keyboard {
    fn pressed_keys(&mut self) -> KeyState;
}

/// Tone output. Only called when the tone turns on or off.
pub trait Speaker {
    fn start_tone(&mut self);
    fn stop_tone(&mut self);
}

impl Keyboard for KeyState {
    fn pressed_keys(&mut self) -> KeyState {
        *self
    }
}

/// Key state written by the caller, e.g. from window events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keypad {
    keys: KeyState,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, idx: usize, pressed: bool) {
        match self.keys.get_mut(idx) {
            Some(key) => *key = pressed,
            None => log::warn!("Ignoring invalid key index: {}", idx),
        }
    }

    pub fn is_pressed(&self, idx: usize) -> bool {
        self.keys.get(idx).copied().unwrap_or(false)
    }

    pub fn release_all(&mut self) {
        self.keys = [false; NUM_KEYS];
    }
}

impl Keyboard for Keypad {
    fn pressed_keys(&mut self) -> KeyState {
        self.keys
    }
}

/// Plays back a fixed sequence of key states, one per poll. The last state
/// repeats forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeyboard {
    script: VecDeque<KeyState>,
    polls: usize,
}

impl ScriptedKeyboard {
    pub fn new(script: impl IntoIterator<Item = KeyState>) -> Self {
        Self {
            script: script.into_iter().collect(),
            polls: 0,
        }
    }

    /// `idle_polls` polls with nothing pressed, then `key` held down.
    pub fn press_after(idle_polls: usize, key: usize) -> Self {
        let mut pressed = [false; NUM_KEYS];
        pressed[key] = true;
        Self::new(
            std::iter::repeat([false; NUM_KEYS])
                .take(idle_polls)
                .chain(std::iter::once(pressed)),
        )
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl Keyboard for ScriptedKeyboard {
    fn pressed_keys(&mut self) -> KeyState {
        self.polls += 1;
        if self.script.len() > 1 {
            self.script.pop_front().unwrap_or_default()
        } else {
            self.script.front().copied().unwrap_or_default()
        }
    }
}

/// Keeps every frame it is handed, oldest first.
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    frames: Vec<Framebuffer>,
    pixel_updates: usize,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Framebuffer] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&Framebuffer> {
        self.frames.last()
    }

    /// Number of individual pixel changes received through `apply_changes`.
    pub fn pixel_updates(&self) -> usize {
        self.pixel_updates
    }
}

impl Display for FrameRecorder {
    fn draw_frame(&mut self, frame: &Framebuffer) {
        self.frames.push(*frame);
    }

    fn apply_changes(&mut self, changes: &FrameChanges, frame: &Framebuffer) {
        self.pixel_updates += changes.pixels.len();
        self.draw_frame(frame);
    }
}

/// Holds only the most recent frame.
#[derive(Debug, Clone, Default)]
pub struct LatestFrame {
    frame: Framebuffer,
    dirty: bool,
}

impl LatestFrame {
    pub fn frame(&self) -> &Framebuffer {
        &self.frame
    }

    /// Whether a new frame arrived since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Display for LatestFrame {
    fn draw_frame(&mut self, frame: &Framebuffer) {
        self.frame = *frame;
        self.dirty = true;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Mute;

impl Speaker for Mute {
    fn start_tone(&mut self) {}
    fn stop_tone(&mut self) {}
}

/// Reports tone changes through the `log` facade and counts them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker {
    pub starts: usize,
    pub stops: usize,
}

impl Speaker for LogSpeaker {
    fn start_tone(&mut self) {
        self.starts += 1;
        log::debug!("Tone on");
    }

    fn stop_tone(&mut self) {
        self.stops += 1;
        log::debug!("Tone off");
    }
}

/// Rings the terminal bell when the tone starts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Speaker for TerminalBell {
    fn start_tone(&mut self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            log::warn!("Failed to ring terminal bell: {e}");
        }
    }

    fn stop_tone(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypad_ignores_out_of_range_keys() {
        let mut keypad = Keypad::new();
        keypad.set_key(0xA, true);
        keypad.set_key(16, true);
        assert!(keypad.is_pressed(0xA));
        assert!(!keypad.is_pressed(16));
        assert_eq!(keypad.pressed_keys().iter().filter(|k| **k).count(), 1);
        keypad.release_all();
        assert!(!keypad.is_pressed(0xA));
    }

    #[test]
    fn scripted_keyboard_repeats_last_state() {
        let mut keyboard = ScriptedKeyboard::press_after(2, 0x7);
        assert!(!keyboard.pressed_keys()[0x7]);
        assert!(!keyboard.pressed_keys()[0x7]);
        assert!(keyboard.pressed_keys()[0x7]);
        assert!(keyboard.pressed_keys()[0x7]);
        assert_eq!(keyboard.polls(), 4);
    }

    #[test]
    fn empty_script_reports_nothing_pressed() {
        let mut keyboard = ScriptedKeyboard::default();
        assert_eq!(keyboard.pressed_keys(), [false; NUM_KEYS]);
    }

    #[test]
    fn frame_recorder_counts_pixel_updates() {
        let mut recorder = FrameRecorder::new();
        let mut frame = Framebuffer::default();
        frame.toggle(0, 0);
        let changes = FrameChanges {
            changed: true,
            cleared: false,
            pixels: vec![crate::PixelChange {
                x: 0,
                y: 0,
                lit: true,
            }],
        };
        recorder.apply_changes(&changes, &frame);
        assert_eq!(recorder.frames().len(), 1);
        assert_eq!(recorder.pixel_updates(), 1);
        assert_eq!(recorder.last_frame(), Some(&frame));
    }

    #[test]
    fn latest_frame_tracks_dirty_state() {
        let mut display = LatestFrame::default();
        assert!(!display.take_dirty());
        display.draw_frame(&Framebuffer::default());
        assert!(display.take_dirty());
        assert!(!display.take_dirty());
    }
}
