use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{MachineConfig, Quirks};
use crate::device::{KeyState, Keyboard};
use crate::error::{Chip8Error, Result};
use crate::framebuffer::{FrameChanges, Framebuffer, PixelChange};
use crate::instruction::Instruction;
use crate::opcode::Opcode;
use crate::{
    FONTSET, FONTSET_ADDRESS, FONTSET_SIZE, FONT_GLYPH_SIZE, MAX_ROM_SIZE, NUM_KEYS, NUM_REGS,
    RAM_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH, STACK_SIZE, START_ADDRESS,
};


const ADDRESS_MASK: u16 = 0x0FFF;

/// Result of a successful [`Machine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    /// `Fx0A` gave up after `key_wait_timeout` with no key pressed. Nothing
    /// changed; the next step retries the same instruction.
    AwaitingKey,
}

/// Where the program counter goes after an instruction.
enum Flow {
    Next,
    Skip,
    Jump(u16),
    Wait,
}

/// The complete CHIP-8 machine state.
///
/// Stack overflow (a 17th nested `CALL`) and underflow (`RET` with nothing on
/// the stack) are undefined on the original hardware. Here both halt the
/// machine with [`Chip8Error::StackOverflow`] / [`Chip8Error::StackUnderflow`].
#[derive(Debug, Clone)]
pub struct Machine {
    /// program counter
    pc: u16,
    ram: [u8; RAM_SIZE],
    framebuffer: Framebuffer,
    /// V Registers
    v_reg: [u8; NUM_REGS],
    /// I Register
    i_reg: u16,
    stack_pointer: usize,
    stack: [u16; STACK_SIZE],
    keys: KeyState,
    delay_timer: u8,
    sound_timer: u8,
    changes: FrameChanges,
    beep: bool,
    halted: bool,
    config: MachineConfig,
    rng: StdRng,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let mut machine = Self {
            pc: START_ADDRESS,
            ram: [0; RAM_SIZE],
            framebuffer: Framebuffer::default(),
            v_reg: [0; NUM_REGS],
            i_reg: 0,
            stack_pointer: 0,
            stack: [0; STACK_SIZE],
            keys: [false; NUM_KEYS],
            delay_timer: 0,
            sound_timer: 0,
            changes: FrameChanges::default(),
            beep: false,
            halted: false,
            rng: Self::seed_rng(&config),
            config,
        };
        machine.load_font();
        machine
    }

    fn seed_rng(config: &MachineConfig) -> StdRng {
        match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn load_font(&mut self) {
        let start = FONTSET_ADDRESS as usize;
        self.ram[start..start + FONTSET_SIZE].copy_from_slice(&FONTSET);
    }

    /// Back to the power-on state. The configuration is kept and a seeded
    /// random source restarts its sequence.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Copy `rom` into program memory at 0x200.
    ///
    /// Fails without touching memory if `rom` is longer than
    /// [`MAX_ROM_SIZE`].
    pub fn load(&mut self, rom: &[u8]) -> Result<()> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max: MAX_ROM_SIZE,
            });
        }
        let start = START_ADDRESS as usize;
        self.ram[start..start + rom.len()].copy_from_slice(rom);
        log::info!("Loaded {} bytes of ROM into memory", rom.len());
        Ok(())
    }

    /// Run one fetch-decode-execute cycle followed by one timer tick.
    ///
    /// `keyboard` is polled once up front and then continuously while `Fx0A`
    /// waits for a key. Any error halts the machine with the program counter
    /// left on the offending instruction.
    pub fn step<K: Keyboard + ?Sized>(&mut self, keyboard: &mut K) -> Result<StepOutcome> {
        if self.halted {
            return Err(Chip8Error::Halted { address: self.pc });
        }
        self.changes.reset();
        self.keys = keyboard.pressed_keys();

        let address = self.pc;
        let opcode = self.fetch_opcode();
        let Some(instruction) = Instruction::decode(opcode) else {
            return Err(self.halt(
                address,
                Chip8Error::UnimplementedInstruction { opcode, address },
            ));
        };
        log::trace!(
            "{:03X}: {:04X} {:<16} v{:02X?} i{:03X}",
            address,
            opcode,
            instruction.to_string(),
            self.v_reg,
            self.i_reg
        );

        match self.execute(instruction, address, keyboard) {
            Ok(Flow::Next) => {}
            Ok(Flow::Skip) => self.pc = self.pc.wrapping_add(2) & ADDRESS_MASK,
            Ok(Flow::Jump(target)) => self.pc = target & ADDRESS_MASK,
            Ok(Flow::Wait) => {
                self.pc = address;
                return Ok(StepOutcome::AwaitingKey);
            }
            Err(e) => return Err(self.halt(address, e)),
        }

        self.tick_timers();
        Ok(StepOutcome::Executed)
    }

    fn halt(&mut self, address: u16, error: Chip8Error) -> Chip8Error {
        self.pc = address;
        self.halted = true;
        log::error!("Machine halted: {}", error);
        error
    }

    fn fetch_opcode(&mut self) -> u16 {
        let high = self.read(self.pc);
        let low = self.read(self.pc.wrapping_add(1));
        self.pc = self.pc.wrapping_add(2) & ADDRESS_MASK;
        Opcode::from_bytes(high, low).0
    }

    fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
        self.beep = self.sound_timer > 0;
    }

    #[inline]
    fn read(&self, addr: u16) -> u8 {
        self.ram[(addr & ADDRESS_MASK) as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        let addr = addr & ADDRESS_MASK;
        if self.config.quirks.protect_reserved_memory && addr < START_ADDRESS {
            log::warn!(
                "Dropped write of {:#04X} to reserved address {:#05X}",
                value,
                addr
            );
            return;
        }
        self.ram[addr as usize] = value;
    }

    fn push(&mut self, val: u16, address: u16) -> Result<()> {
        if self.stack_pointer == STACK_SIZE {
            return Err(Chip8Error::StackOverflow { address });
        }
        self.stack[self.stack_pointer] = val;
        self.stack_pointer += 1;
        Ok(())
    }

    fn pop(&mut self, address: u16) -> Result<u16> {
        if self.stack_pointer == 0 {
            return Err(Chip8Error::StackUnderflow { address });
        }
        self.stack_pointer -= 1;
        Ok(self.stack[self.stack_pointer])
    }

    fn skip_if(condition: bool) -> Flow {
        if condition {
            Flow::Skip
        } else {
            Flow::Next
        }
    }

    fn execute<K: Keyboard + ?Sized>(
        &mut self,
        instruction: Instruction,
        address: u16,
        keyboard: &mut K,
    ) -> Result<Flow> {
        use Instruction::*;

        let flow = match instruction {
            ClearScreen => {
                self.framebuffer.clear();
                self.changes.mark_cleared();
                Flow::Next
            }
            Return => Flow::Jump(self.pop(address)?),
            Jump { addr } => Flow::Jump(addr),
            Call { addr } => {
                // pc already points at the next instruction
                self.push(self.pc, address)?;
                Flow::Jump(addr)
            }
            SkipIfEqualByte { x, byte } => Self::skip_if(self.v(x) == byte),
            SkipIfNotEqualByte { x, byte } => Self::skip_if(self.v(x) != byte),
            SkipIfEqualRegister { x, y } => Self::skip_if(self.v(x) == self.v(y)),
            LoadByte { x, byte } => {
                self.set_v(x, byte);
                Flow::Next
            }
            AddByte { x, byte } => {
                self.set_v(x, self.v(x).wrapping_add(byte));
                Flow::Next
            }
            Move { x, y } => {
                self.set_v(x, self.v(y));
                Flow::Next
            }
            Or { x, y } => {
                self.set_v(x, self.v(x) | self.v(y));
                Flow::Next
            }
            And { x, y } => {
                self.set_v(x, self.v(x) & self.v(y));
                Flow::Next
            }
            Xor { x, y } => {
                self.set_v(x, self.v(x) ^ self.v(y));
                Flow::Next
            }
            AddRegister { x, y } => {
                let (val, carry) = self.v(x).overflowing_add(self.v(y));
                self.set_v(x, val);
                self.v_reg[0xF] = carry as u8;
                Flow::Next
            }
            Sub { x, y } => {
                let (vx, vy) = (self.v(x), self.v(y));
                self.set_v(x, vx.wrapping_sub(vy));
                self.v_reg[0xF] = (vx > vy) as u8;
                Flow::Next
            }
            ShiftRight { x, .. } => {
                let vx = self.v(x);
                self.set_v(x, vx >> 1);
                self.v_reg[0xF] = vx & 0x1;
                Flow::Next
            }
            SubN { x, y } => {
                let (vx, vy) = (self.v(x), self.v(y));
                self.set_v(x, vy.wrapping_sub(vx));
                self.v_reg[0xF] = (vy > vx) as u8;
                Flow::Next
            }
            ShiftLeft { x, .. } => {
                let vx = self.v(x);
                self.set_v(x, vx << 1);
                self.v_reg[0xF] = (vx & 0x80) >> 7;
                Flow::Next
            }
            SkipIfNotEqualRegister { x, y } => Self::skip_if(self.v(x) != self.v(y)),
            LoadIndex { addr } => {
                self.i_reg = addr;
                Flow::Next
            }
            JumpOffset { addr } => Flow::Jump(addr + self.v(0) as u16),
            Random { x, byte } => {
                let rand: u8 = self.rng.gen();
                self.set_v(x, rand & byte);
                Flow::Next
            }
            Draw { x, y, height } => {
                self.draw_sprite(self.v(x) as usize, self.v(y) as usize, height as usize);
                Flow::Next
            }
            SkipIfKeyPressed { x } => Self::skip_if(self.is_key_pressed(self.v(x) as usize)),
            SkipIfKeyNotPressed { x } => Self::skip_if(!self.is_key_pressed(self.v(x) as usize)),
            LoadDelayTimer { x } => {
                self.set_v(x, self.delay_timer);
                Flow::Next
            }
            WaitForKey { x } => {
                if self.wait_for_key(x, keyboard) {
                    Flow::Next
                } else {
                    Flow::Wait
                }
            }
            SetDelayTimer { x } => {
                self.delay_timer = self.v(x);
                Flow::Next
            }
            SetSoundTimer { x } => {
                self.sound_timer = self.v(x);
                Flow::Next
            }
            AddIndex { x } => {
                let sum = self.i_reg as u32 + self.v(x) as u32;
                if let Some(flag) = self.config.quirks.index_overflow.flag(sum) {
                    self.v_reg[0xF] = flag;
                }
                self.i_reg = sum as u16;
                Flow::Next
            }
            LoadFontGlyph { x } => {
                let digit = (self.v(x) & 0xF) as u16;
                self.i_reg = FONTSET_ADDRESS + digit * FONT_GLYPH_SIZE as u16;
                Flow::Next
            }
            StoreBcd { x } => {
                let val = self.v(x);
                let i = self.i_reg;
                self.write(i, val / 100);
                self.write(i.wrapping_add(1), (val / 10) % 10);
                self.write(i.wrapping_add(2), val % 10);
                Flow::Next
            }
            StoreRegisters { x } => {
                let i = self.i_reg;
                for offset in 0..=x {
                    self.write(i.wrapping_add(offset as u16), self.v(offset));
                }
                self.advance_index_after_transfer(x);
                Flow::Next
            }
            LoadRegisters { x } => {
                let i = self.i_reg;
                for offset in 0..=x {
                    self.set_v(offset, self.read(i.wrapping_add(offset as u16)));
                }
                self.advance_index_after_transfer(x);
                Flow::Next
            }
        };
        Ok(flow)
    }

    #[inline]
    fn v(&self, reg: u8) -> u8 {
        self.v_reg[reg as usize]
    }

    #[inline]
    fn set_v(&mut self, reg: u8, value: u8) {
        self.v_reg[reg as usize] = value;
    }

    fn advance_index_after_transfer(&mut self, x: u8) {
        if self.config.quirks.increment_index_on_transfer {
            self.i_reg = self.i_reg.wrapping_add(x as u16 + 1);
        }
    }

    /// XOR `height` rows of 8 pixels from memory at `I` onto the screen.
    /// VF ends up 1 if any lit pixel was turned off.
    fn draw_sprite(&mut self, x_coord: usize, y_coord: usize, height: usize) {
        let mut collision = false;
        for row in 0..height {
            let pixels = self.read(self.i_reg.wrapping_add(row as u16));
            for col in 0..8 {
                if (pixels >> (7 - col)) & 0x1 == 0 {
                    continue;
                }
                // Sprites wrap around the screen
                let x = (x_coord + col) % SCREEN_WIDTH;
                let y = (y_coord + row) % SCREEN_HEIGHT;
                let lit = self.framebuffer.toggle(x, y);
                collision |= !lit;
                self.changes.pixels.push(PixelChange { x, y, lit });
            }
        }
        self.v_reg[0xF] = collision as u8;
        self.changes.changed = true;
    }

    /// Poll until some key is down, sleeping `key_poll_interval` between
    /// polls. Returns false if `key_wait_timeout` ran out first.
    ///
    /// A zero timeout never reads the clock or sleeps, so it also works on
    /// targets without `std::time` support.
    fn wait_for_key<K: Keyboard + ?Sized>(&mut self, x: u8, keyboard: &mut K) -> bool {
        let mut started = None;
        loop {
            if let Some(key) = self.keys.iter().position(|pressed| *pressed) {
                log::debug!("Key {:X} pressed while waiting", key);
                self.set_v(x, key as u8);
                return true;
            }
            match self.config.key_wait_timeout {
                Some(timeout) if timeout.is_zero() => return false,
                Some(timeout) => {
                    if started.get_or_insert_with(Instant::now).elapsed() >= timeout {
                        return false;
                    }
                }
                None => {}
            }
            std::thread::sleep(self.config.key_poll_interval);
            self.keys = keyboard.pressed_keys();
        }
    }

    fn is_key_pressed(&self, key: usize) -> bool {
        key < NUM_KEYS && self.keys[key]
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i_reg
    }

    pub fn registers(&self) -> &[u8; NUM_REGS] {
        &self.v_reg
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn stack_pointer(&self) -> usize {
        self.stack_pointer
    }

    /// Return addresses currently on the stack, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.stack_pointer]
    }

    pub fn memory(&self) -> &[u8; RAM_SIZE] {
        &self.ram
    }

    pub fn keys(&self) -> &KeyState {
        &self.keys
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Display changes made by the last step.
    pub fn frame_changes(&self) -> &FrameChanges {
        &self.changes
    }

    pub fn display_changed(&self) -> bool {
        self.changes.changed
    }

    /// Whether the tone should be sounding after the last step.
    pub fn beep(&self) -> bool {
        self.beep
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn quirks(&self) -> &Quirks {
        &self.config.quirks
    }
}
