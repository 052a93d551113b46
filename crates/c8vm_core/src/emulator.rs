use crate::device::{Display, Keyboard, Speaker};
use crate::error::Result;
use crate::machine::{Machine, StepOutcome};

/// A [`Machine`] wired to one display, one keyboard and one speaker.
///
/// The display sees a frame after every cycle that touched the screen. The
/// speaker is told each time the tone turns on or off.
pub struct Emulator<D, K, S> {
    machine: Machine,
    display: D,
    keyboard: K,
    speaker: S,
    tone_on: bool,
}

impl<D: Display, K: Keyboard, S: Speaker> Emulator<D, K, S> {
    pub fn new(machine: Machine, display: D, keyboard: K, speaker: S) -> Self {
        Self {
            machine,
            display,
            keyboard,
            speaker,
            tone_on: false,
        }
    }

    pub fn load(&mut self, rom: &[u8]) -> Result<()> {
        self.machine.load(rom)
    }

    /// One machine cycle, then forward its output to the devices.
    pub fn run_once(&mut self) -> Result<StepOutcome> {
        let outcome = self.machine.step(&mut self.keyboard)?;
        if self.machine.display_changed() {
            self.display
                .apply_changes(self.machine.frame_changes(), self.machine.framebuffer());
        }
        self.sync_tone();
        Ok(outcome)
    }

    /// Run up to `limit` cycles. Stops early, without error, when a key wait
    /// times out; returns the number of cycles that executed.
    pub fn run_cycles(&mut self, limit: usize) -> Result<usize> {
        for executed in 0..limit {
            if self.run_once()? == StepOutcome::AwaitingKey {
                return Ok(executed);
            }
        }
        Ok(limit)
    }

    /// Reset the machine and silence the speaker. The ROM has to be loaded
    /// again.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.sync_tone();
    }

    fn sync_tone(&mut self) {
        let beep = self.machine.beep();
        if beep == self.tone_on {
            return;
        }
        if beep {
            self.speaker.start_tone();
        } else {
            self.speaker.stop_tone();
        }
        self.tone_on = beep;
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut K {
        &mut self.keyboard
    }

    pub fn speaker(&self) -> &S {
        &self.speaker
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::device::{FrameRecorder, Keypad, LogSpeaker};
    use crate::{Chip8Error, MachineConfig};

    type TestEmulator = Emulator<FrameRecorder, Keypad, LogSpeaker>;

    fn emulator(rom: &[u8]) -> TestEmulator {
        let config = MachineConfig::builder()
            .rng_seed(3)
            .key_poll_interval(Duration::ZERO)
            .key_wait_timeout(Duration::ZERO)
            .build();
        let mut emulator = Emulator::new(
            Machine::new(config),
            FrameRecorder::new(),
            Keypad::new(),
            LogSpeaker::default(),
        );
        emulator.load(rom).unwrap();
        emulator
    }

    #[test]
    fn display_only_gets_frames_that_changed() {
        // LD V0, 0 / LD F, V0 / DRW V0, V0, 5 / LD V1, 1
        let mut emu = emulator(&[0x60, 0x00, 0xF0, 0x29, 0xD0, 0x05, 0x61, 0x01]);
        assert_eq!(emu.run_cycles(4).unwrap(), 4);
        assert_eq!(emu.display().frames().len(), 1);
        assert_eq!(emu.display().pixel_updates(), 14);
        assert_eq!(
            emu.display().last_frame(),
            Some(emu.machine().framebuffer())
        );
    }

    #[test]
    fn speaker_is_called_on_transitions_only() {
        // LD V0, 3 / LD ST, V0 / then three no-ops
        let mut emu = emulator(&[
            0x60, 0x03, 0xF0, 0x18, 0x61, 0x00, 0x61, 0x00, 0x61, 0x00,
        ]);
        emu.run_once().unwrap();
        assert_eq!(emu.speaker().starts, 0);
        emu.run_once().unwrap();
        assert_eq!(emu.speaker().starts, 1);
        emu.run_cycles(3).unwrap();
        assert_eq!(emu.speaker().starts, 1);
        assert_eq!(emu.speaker().stops, 1);
    }

    #[test]
    fn key_wait_timeout_stops_the_run() {
        // LD V0, 1 / LD V2, K / LD V3, 1
        let mut emu = emulator(&[0x60, 0x01, 0xF2, 0x0A, 0x63, 0x01]);
        assert_eq!(emu.run_cycles(10).unwrap(), 1);
        assert_eq!(emu.machine().pc(), 0x202);

        emu.keyboard_mut().set_key(0x9, true);
        assert_eq!(emu.run_once().unwrap(), StepOutcome::Executed);
        assert_eq!(emu.machine().registers()[0x2], 0x9);
    }

    #[test]
    fn errors_surface_and_halt() {
        let mut emu = emulator(&[0xFF, 0xFF]);
        assert!(matches!(
            emu.run_cycles(5),
            Err(Chip8Error::UnimplementedInstruction { opcode: 0xFFFF, .. })
        ));
        assert!(matches!(emu.run_once(), Err(Chip8Error::Halted { .. })));
        emu.reset();
        assert!(!emu.machine().is_halted());
    }
}
