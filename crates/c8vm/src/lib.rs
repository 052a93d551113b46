use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use c8vm_core::device::{FrameRecorder, Keypad, LogSpeaker, Mute, Speaker};
use c8vm_core::{Emulator, EmulatorApp, Framebuffer, IndexOverflow, Machine, MachineConfig, Quirks};
use c8vm_sdl2::c8vm_common::{App, Color};
use c8vm_sdl2::{SdlContext, SdlInitInfo};
use clap::Parser;

pub mod recorder;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOverflowArg {
    /// VF = 1 when I leaves the 12-bit address space
    Addressable,
    /// VF = 1 when I exceeds 0xFF
    Byte,
    /// VF is left alone
    Unaffected,
}

impl From<IndexOverflowArg> for IndexOverflow {
    fn from(arg: IndexOverflowArg) -> Self {
        match arg {
            IndexOverflowArg::Addressable => IndexOverflow::Addressable,
            IndexOverflowArg::Byte => IndexOverflow::Byte,
            IndexOverflowArg::Unaffected => IndexOverflow::Unaffected,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Run a CHIP-8 program", long_about = None)]
pub struct Options {
    /// Path to the ROM file to run
    pub rom: PathBuf,

    /// Run without a window and print the final screen
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// Cycles to run in headless mode
    #[arg(long, default_value_t = 1_000)]
    pub cycles: usize,

    /// Save every frame of the headless run as an animated GIF
    #[arg(long, value_name = "PATH", requires = "headless")]
    pub gif: Option<PathBuf>,

    /// Keep the speaker silent in windowed mode
    #[arg(long, default_value_t = false)]
    pub mute: bool,

    /// Cycles executed per 60 Hz frame in windowed mode
    #[arg(long, default_value_t = c8vm_core::app::DEFAULT_CYCLES_PER_FRAME)]
    pub cycles_per_frame: usize,

    #[arg(long, default_value_t = c8vm_core::SCREEN_SCALE)]
    pub scale: u32,

    /// Seed for the random number instruction
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Fx55/Fx65 advance I past the last register copied
    #[arg(long, default_value_t = false)]
    pub legacy_index_increment: bool,

    /// How Fx1E sets VF
    #[arg(long, value_enum, default_value_t = IndexOverflowArg::Addressable)]
    pub index_overflow: IndexOverflowArg,

    /// Allow programs to write below 0x200
    #[arg(long, default_value_t = false)]
    pub unprotected_memory: bool,

    /// Lit pixel color as #RRGGBB
    #[arg(long, default_value = "#FFFFFF")]
    pub foreground: Color,

    /// Dark pixel color as #RRGGBB
    #[arg(long, default_value = "#000000")]
    pub background: Color,
}

impl Options {
    pub fn machine_config(&self) -> MachineConfig {
        let quirks = Quirks::builder()
            .increment_index_on_transfer(self.legacy_index_increment)
            .index_overflow(self.index_overflow.into())
            .protect_reserved_memory(!self.unprotected_memory)
            .build();
        let mut config = MachineConfig::builder().quirks(quirks).build();
        config.rng_seed = self.seed;
        config
    }
}

pub fn run(options: &Options, rom: &[u8]) -> Result<()> {
    if options.headless {
        let run = run_headless(options.machine_config(), rom, options.cycles)?;
        if let Some(path) = &options.gif {
            let file = File::create(path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?;
            let frames = run.gif_frames();
            recorder::write_gif(
                BufWriter::new(file),
                frames,
                options.foreground,
                options.background,
            )?;
            log::info!("Wrote {} frames to '{}'", frames.len(), path.display());
        }
        print!("{}", run.screen);
        Ok(())
    } else {
        run_windowed(options, rom)
    }
}

pub fn run_windowed(options: &Options, rom: &[u8]) -> Result<()> {
    let config = options.machine_config();
    if options.mute {
        launch(EmulatorApp::with_speaker(config, Mute), options, rom)
    } else {
        launch(EmulatorApp::new(config), options, rom)
    }
}

fn launch<S: Speaker>(mut app: EmulatorApp<S>, options: &Options, rom: &[u8]) -> Result<()> {
    app.load_rom(rom).context("Failed to load ROM")?;
    app.set_cycles_per_frame(options.cycles_per_frame);
    app.set_scale(options.scale);
    app.set_palette(options.foreground, options.background);

    let init_info = SdlInitInfo::builder()
        .width(app.width())
        .height(app.height())
        .scale(app.scale())
        .title(app.title())
        .build();
    SdlContext::run(init_info, app)?;
    Ok(())
}

/// What a headless run leaves behind.
#[derive(Debug)]
pub struct HeadlessRun {
    /// Every frame the program drew, oldest first.
    pub frames: Vec<Framebuffer>,
    /// The screen when the run ended.
    pub screen: Framebuffer,
}

impl HeadlessRun {
    /// The recorded frames, or the final screen alone if nothing was drawn.
    pub fn gif_frames(&self) -> &[Framebuffer] {
        if self.frames.is_empty() {
            std::slice::from_ref(&self.screen)
        } else {
            &self.frames
        }
    }
}

/// Run `cycles` cycles with no keys pressed, recording every frame. Stops
/// early if the program waits for a key, since none will ever come.
pub fn run_headless(mut config: MachineConfig, rom: &[u8], cycles: usize) -> Result<HeadlessRun> {
    config.key_wait_timeout = Some(Duration::ZERO);
    config.key_poll_interval = Duration::ZERO;
    let mut emulator = Emulator::new(
        Machine::new(config),
        FrameRecorder::new(),
        Keypad::new(),
        LogSpeaker::default(),
    );
    emulator.load(rom).context("Failed to load ROM")?;

    let executed = emulator
        .run_cycles(cycles)
        .with_context(|| format!("Program stopped at {:#05X}", emulator.machine().pc()))?;
    if executed < cycles {
        log::info!(
            "Program is waiting for a key after {} of {} cycles",
            executed,
            cycles
        );
    }
    log::info!("Tone started {} times", emulator.speaker().starts);
    Ok(HeadlessRun {
        frames: emulator.display().frames().to_vec(),
        screen: *emulator.machine().framebuffer(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_quirks() {
        let options = Options::try_parse_from([
            "c8vm",
            "game.ch8",
            "--seed",
            "42",
            "--legacy-index-increment",
            "--index-overflow",
            "unaffected",
            "--unprotected-memory",
        ])
        .unwrap();
        let config = options.machine_config();
        assert_eq!(config.rng_seed, Some(42));
        assert!(config.quirks.increment_index_on_transfer);
        assert_eq!(config.quirks.index_overflow, IndexOverflow::Unaffected);
        assert!(!config.quirks.protect_reserved_memory);
    }

    #[test]
    fn defaults_match_machine_defaults() {
        let options = Options::try_parse_from(["c8vm", "game.ch8"]).unwrap();
        assert!(!options.headless);
        assert_eq!(options.foreground, Color::WHITE);
        assert_eq!(options.background, Color::BLACK);
        let config = options.machine_config();
        assert_eq!(config.quirks, Quirks::default());
        assert_eq!(config.rng_seed, None);
    }

    #[test]
    fn rejects_bad_colors() {
        assert!(Options::try_parse_from(["c8vm", "game.ch8", "--foreground", "green"]).is_err());
    }

    #[test]
    fn headless_run_returns_final_screen() {
        // LD V0, 0 / LD F, V0 / DRW V0, V0, 5 / JP 0x206
        let rom = [0x60, 0x00, 0xF0, 0x29, 0xD0, 0x05, 0x12, 0x06];
        let run = run_headless(MachineConfig::default(), &rom, 50).unwrap();
        assert_eq!(run.frames.len(), 1);
        let text = run.screen.to_string();
        assert!(text.lines().next().unwrap().starts_with("####."));
        assert!(text.lines().nth(1).unwrap().starts_with("#..#."));
    }

    #[test]
    fn headless_run_stops_at_key_wait() {
        // LD V0, K
        let run = run_headless(MachineConfig::default(), &[0xF0, 0x0A], 50).unwrap();
        assert!(run.screen.is_blank());
        assert!(run.frames.is_empty());
        assert_eq!(run.gif_frames(), [run.screen]);
    }

    #[test]
    fn headless_run_reports_bad_opcodes() {
        let err = run_headless(MachineConfig::default(), &[0xFF, 0xFF], 5).unwrap_err();
        assert!(err.to_string().contains("0x200"));
    }

    #[test]
    fn gif_holds_every_headless_frame() {
        // LD V0, 0 / LD F, V0 / DRW V0, V0, 5 three times / JP 0x20A
        let rom = [
            0x60, 0x00, 0xF0, 0x29, 0xD0, 0x05, 0xD0, 0x05, 0xD0, 0x05, 0x12, 0x0A,
        ];
        let run = run_headless(MachineConfig::default(), &rom, 50).unwrap();
        assert_eq!(run.frames.len(), 3);

        let mut bytes = Vec::new();
        recorder::write_gif(&mut bytes, run.gif_frames(), Color::WHITE, Color::BLACK).unwrap();
        let mut decoder = gif::DecodeOptions::new().read_info(&bytes[..]).unwrap();
        let mut decoded = 0;
        while decoder.read_next_frame().unwrap().is_some() {
            decoded += 1;
        }
        assert_eq!(decoded, run.frames.len());
    }

    #[test]
    fn gif_and_mute_flags() {
        let options =
            Options::try_parse_from(["c8vm", "game.ch8", "--headless", "--gif", "out.gif"]).unwrap();
        assert_eq!(options.gif, Some(PathBuf::from("out.gif")));
        assert!(!options.mute);
        assert!(Options::try_parse_from(["c8vm", "game.ch8", "--gif", "out.gif"]).is_err());
        assert!(Options::try_parse_from(["c8vm", "game.ch8", "--mute"]).unwrap().mute);
    }
}
