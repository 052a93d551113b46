use std::time::Duration;

use c8vm_common::{App, Color, Key};

use crate::config::MachineConfig;
use crate::device::{Keypad, LatestFrame, Speaker, TerminalBell};
use crate::emulator::Emulator;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::machine::Machine;
use crate::{SCREEN_HEIGHT, SCREEN_SCALE, SCREEN_WIDTH};

/// Cycles per 60 Hz frame when nothing else is asked for.
pub const DEFAULT_CYCLES_PER_FRAME: usize = 10;

/// Drives an [`Emulator`] from a windowed front-end, one `update` per frame.
/// `P` pauses and resumes, `Escape` quits.
///
/// `Fx0A` never blocks here: the machine is configured to give up right away
/// so the window keeps pumping events, and the wait is retried next frame.
pub struct EmulatorApp<S: Speaker = TerminalBell> {
    pub emulator: Emulator<LatestFrame, Keypad, S>,
    cycles_per_frame: usize,
    scale: u32,
    foreground: Color,
    background: Color,
    paused: bool,
    should_exit: bool,
}

impl EmulatorApp<TerminalBell> {
    pub fn new(config: MachineConfig) -> Self {
        Self::with_speaker(config, TerminalBell)
    }
}

impl Default for EmulatorApp<TerminalBell> {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

impl<S: Speaker> EmulatorApp<S> {
    pub fn with_speaker(mut config: MachineConfig, speaker: S) -> Self {
        config.key_wait_timeout = Some(Duration::ZERO);
        let machine = Machine::new(config);
        Self {
            emulator: Emulator::new(machine, LatestFrame::default(), Keypad::new(), speaker),
            cycles_per_frame: DEFAULT_CYCLES_PER_FRAME,
            scale: SCREEN_SCALE,
            foreground: Color::WHITE,
            background: Color::BLACK,
            paused: false,
            should_exit: false,
        }
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        self.emulator.load(rom)
    }

    pub fn set_cycles_per_frame(&mut self, cycles: usize) {
        self.cycles_per_frame = cycles.max(1);
    }

    pub fn set_scale(&mut self, scale: u32) {
        self.scale = scale.max(1);
    }

    pub fn set_palette(&mut self, foreground: Color, background: Color) {
        self.foreground = foreground;
        self.background = background;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn run_frame(&mut self) {
        if self.paused || self.emulator.machine().is_halted() {
            return;
        }
        if let Err(e) = self.emulator.run_cycles(self.cycles_per_frame) {
            log::error!("Emulation stopped: {}", e);
        }
    }

    fn render(&self, frame: &Framebuffer, screen: &mut [u8]) {
        for ((_, _, lit), pixel) in frame.pixels().zip(screen.chunks_exact_mut(3)) {
            let color = if lit { self.foreground } else { self.background };
            color.write_rgb24(pixel);
        }
    }
}

impl<S: Speaker> App for EmulatorApp<S> {
    fn init(&mut self) {
        log::info!("CHIP-8 init");
    }

    fn update(&mut self, screen: &mut [u8]) {
        self.run_frame();
        let frame = *self.emulator.display().frame();
        self.render(&frame, screen);
    }

    fn handle_key_event(&mut self, key: Key, is_down: bool) {
        match key {
            Key::Escape => {
                self.should_exit = true;
                return;
            }
            Key::P if is_down => {
                self.paused = !self.paused;
                log::info!("{}", if self.paused { "Paused" } else { "Resumed" });
                return;
            }
            _ => {}
        }
        if let Some(value) = key.hex_keypad() {
            self.emulator
                .keyboard_mut()
                .set_key(value as usize, is_down);
        }
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        log::info!("CHIP-8 exit");
    }

    fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    fn scale(&self) -> u32 {
        self.scale
    }

    fn title(&self) -> String {
        "c8vm CHIP-8".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LogSpeaker;

    const SCREEN_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 3;

    fn app(rom: &[u8]) -> EmulatorApp<LogSpeaker> {
        let config = MachineConfig::builder().rng_seed(5).build();
        let mut app = EmulatorApp::with_speaker(config, LogSpeaker::default());
        app.load_rom(rom).unwrap();
        app
    }

    #[test]
    fn renders_lit_pixels_in_foreground_color() {
        // LD V0, 0 / LD F, V0 / DRW V0, V0, 1 / JP 0x206
        let mut app = app(&[0x60, 0x00, 0xF0, 0x29, 0xD0, 0x01, 0x12, 0x06]);
        app.set_palette(Color::PHOSPHOR, Color::BLACK);
        let mut screen = vec![0xAA; SCREEN_BYTES];
        app.update(&mut screen);

        // top row of glyph 0 is 0xF0
        for x in 0..4 {
            assert_eq!(screen[x * 3..x * 3 + 3], [0x33, 0xFF, 0x66]);
        }
        assert_eq!(screen[4 * 3..4 * 3 + 3], [0, 0, 0]);
        assert_eq!(screen[SCREEN_WIDTH * 3..SCREEN_WIDTH * 3 + 3], [0, 0, 0]);
    }

    #[test]
    fn keys_reach_the_keypad() {
        let mut app = app(&[0x12, 0x00]);
        app.handle_key_event(Key::Num4, true);
        assert!(app.emulator.keyboard().is_pressed(0xC));
        app.handle_key_event(Key::Num4, false);
        assert!(!app.emulator.keyboard().is_pressed(0xC));
        app.handle_key_event(Key::Escape, true);
        assert!(app.should_exit());
    }

    #[test]
    fn key_wait_does_not_block_the_frame() {
        // LD V5, K / JP 0x202
        let mut app = app(&[0xF5, 0x0A, 0x12, 0x02]);
        let mut screen = vec![0; SCREEN_BYTES];
        app.update(&mut screen);
        assert_eq!(app.emulator.machine().pc(), 0x200);

        app.handle_key_event(Key::V, true);
        app.update(&mut screen);
        assert_eq!(app.emulator.machine().registers()[0x5], 0xF);
    }

    #[test]
    fn halted_machine_keeps_showing_last_frame() {
        let mut app = app(&[0x00, 0x00]);
        let mut screen = vec![0xAA; SCREEN_BYTES];
        app.update(&mut screen);
        assert!(app.emulator.machine().is_halted());
        app.update(&mut screen);
        assert!(screen.iter().all(|b| *b == 0));
    }

    #[test]
    fn p_toggles_pause_and_freezes_the_machine() {
        // ADD V0, 1 / JP 0x200
        let mut app = app(&[0x70, 0x01, 0x12, 0x00]);
        let mut screen = vec![0; SCREEN_BYTES];
        app.update(&mut screen);
        let counted = app.emulator.machine().registers()[0x0];
        assert!(counted > 0);

        app.handle_key_event(Key::P, true);
        app.handle_key_event(Key::P, false);
        assert!(app.is_paused());
        app.update(&mut screen);
        app.update(&mut screen);
        assert_eq!(app.emulator.machine().registers()[0x0], counted);
        assert!(!app.should_exit());

        app.handle_key_event(Key::P, true);
        assert!(!app.is_paused());
        app.update(&mut screen);
        assert!(app.emulator.machine().registers()[0x0] > counted);
    }
}
