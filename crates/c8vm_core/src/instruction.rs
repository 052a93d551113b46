use std::fmt;

use crate::opcode::Opcode;

/// A decoded CHIP-8 instruction.
///
/// Register operands are indices `0x0..=0xF`; `addr` is the 12-bit `nnn`
/// field and `byte` the 8-bit `kk` field of the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `00E0`
    ClearScreen,
    /// `00EE`
    Return,
    /// `1nnn`
    Jump { addr: u16 },
    /// `2nnn`
    Call { addr: u16 },
    /// `3xkk`
    SkipIfEqualByte { x: u8, byte: u8 },
    /// `4xkk`
    SkipIfNotEqualByte { x: u8, byte: u8 },
    /// `5xy_`
    SkipIfEqualRegister { x: u8, y: u8 },
    /// `6xkk`
    LoadByte { x: u8, byte: u8 },
    /// `7xkk`
    AddByte { x: u8, byte: u8 },
    /// `8xy0`
    Move { x: u8, y: u8 },
    /// `8xy1`
    Or { x: u8, y: u8 },
    /// `8xy2`
    And { x: u8, y: u8 },
    /// `8xy3`
    Xor { x: u8, y: u8 },
    /// `8xy4`
    AddRegister { x: u8, y: u8 },
    /// `8xy5`
    Sub { x: u8, y: u8 },
    /// `8xy6`
    ShiftRight { x: u8, y: u8 },
    /// `8xy7`
    SubN { x: u8, y: u8 },
    /// `8xyE`
    ShiftLeft { x: u8, y: u8 },
    /// `9xy_`
    SkipIfNotEqualRegister { x: u8, y: u8 },
    /// `Annn`
    LoadIndex { addr: u16 },
    /// `Bnnn`
    JumpOffset { addr: u16 },
    /// `Cxkk`
    Random { x: u8, byte: u8 },
    /// `Dxyn`
    Draw { x: u8, y: u8, height: u8 },
    /// `Ex9E`
    SkipIfKeyPressed { x: u8 },
    /// `ExA1`
    SkipIfKeyNotPressed { x: u8 },
    /// `Fx07`
    LoadDelayTimer { x: u8 },
    /// `Fx0A`
    WaitForKey { x: u8 },
    /// `Fx15`
    SetDelayTimer { x: u8 },
    /// `Fx18`
    SetSoundTimer { x: u8 },
    /// `Fx1E`
    AddIndex { x: u8 },
    /// `Fx29`
    LoadFontGlyph { x: u8 },
    /// `Fx33`
    StoreBcd { x: u8 },
    /// `Fx55`
    StoreRegisters { x: u8 },
    /// `Fx65`
    LoadRegisters { x: u8 },
}

impl Instruction {
    /// Decode a raw opcode, or `None` if it is outside the CHIP-8 table.
    pub fn decode(opcode: u16) -> Option<Instruction> {
        let op = Opcode(opcode);
        let (x, y, byte, addr) = (op.x(), op.y(), op.kk(), op.nnn());
        let instruction = match op.nibbles() {
            (0x0, 0x0, 0xE, 0x0) => Instruction::ClearScreen,
            (0x0, 0x0, 0xE, 0xE) => Instruction::Return,
            (0x1, ..) => Instruction::Jump { addr },
            (0x2, ..) => Instruction::Call { addr },
            (0x3, ..) => Instruction::SkipIfEqualByte { x, byte },
            (0x4, ..) => Instruction::SkipIfNotEqualByte { x, byte },
            (0x5, ..) => Instruction::SkipIfEqualRegister { x, y },
            (0x6, ..) => Instruction::LoadByte { x, byte },
            (0x7, ..) => Instruction::AddByte { x, byte },
            (0x8, .., 0x0) => Instruction::Move { x, y },
            (0x8, .., 0x1) => Instruction::Or { x, y },
            (0x8, .., 0x2) => Instruction::And { x, y },
            (0x8, .., 0x3) => Instruction::Xor { x, y },
            (0x8, .., 0x4) => Instruction::AddRegister { x, y },
            (0x8, .., 0x5) => Instruction::Sub { x, y },
            (0x8, .., 0x6) => Instruction::ShiftRight { x, y },
            (0x8, .., 0x7) => Instruction::SubN { x, y },
            (0x8, .., 0xE) => Instruction::ShiftLeft { x, y },
            (0x9, ..) => Instruction::SkipIfNotEqualRegister { x, y },
            (0xA, ..) => Instruction::LoadIndex { addr },
            (0xB, ..) => Instruction::JumpOffset { addr },
            (0xC, ..) => Instruction::Random { x, byte },
            (0xD, ..) => Instruction::Draw {
                x,
                y,
                height: op.n(),
            },
            (0xE, _, 0x9, 0xE) => Instruction::SkipIfKeyPressed { x },
            (0xE, _, 0xA, 0x1) => Instruction::SkipIfKeyNotPressed { x },
            (0xF, _, 0x0, 0x7) => Instruction::LoadDelayTimer { x },
            (0xF, _, 0x0, 0xA) => Instruction::WaitForKey { x },
            (0xF, _, 0x1, 0x5) => Instruction::SetDelayTimer { x },
            (0xF, _, 0x1, 0x8) => Instruction::SetSoundTimer { x },
            (0xF, _, 0x1, 0xE) => Instruction::AddIndex { x },
            (0xF, _, 0x2, 0x9) => Instruction::LoadFontGlyph { x },
            (0xF, _, 0x3, 0x3) => Instruction::StoreBcd { x },
            (0xF, _, 0x5, 0x5) => Instruction::StoreRegisters { x },
            (0xF, _, 0x6, 0x5) => Instruction::LoadRegisters { x },
            _ => return None,
        };
        Some(instruction)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::ClearScreen => write!(f, "CLS"),
            Instruction::Return => write!(f, "RET"),
            Instruction::Jump { addr } => write!(f, "JP {:#05X}", addr),
            Instruction::Call { addr } => write!(f, "CALL {:#05X}", addr),
            Instruction::SkipIfEqualByte { x, byte } => write!(f, "SE V{:X}, {:#04X}", x, byte),
            Instruction::SkipIfNotEqualByte { x, byte } => {
                write!(f, "SNE V{:X}, {:#04X}", x, byte)
            }
            Instruction::SkipIfEqualRegister { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            Instruction::LoadByte { x, byte } => write!(f, "LD V{:X}, {:#04X}", x, byte),
            Instruction::AddByte { x, byte } => write!(f, "ADD V{:X}, {:#04X}", x, byte),
            Instruction::Move { x, y } => write!(f, "LD V{:X}, V{:X}", x, y),
            Instruction::Or { x, y } => write!(f, "OR V{:X}, V{:X}", x, y),
            Instruction::And { x, y } => write!(f, "AND V{:X}, V{:X}", x, y),
            Instruction::Xor { x, y } => write!(f, "XOR V{:X}, V{:X}", x, y),
            Instruction::AddRegister { x, y } => write!(f, "ADD V{:X}, V{:X}", x, y),
            Instruction::Sub { x, y } => write!(f, "SUB V{:X}, V{:X}", x, y),
            Instruction::ShiftRight { x, y } => write!(f, "SHR V{:X}, V{:X}", x, y),
            Instruction::SubN { x, y } => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Instruction::ShiftLeft { x, y } => write!(f, "SHL V{:X}, V{:X}", x, y),
            Instruction::SkipIfNotEqualRegister { x, y } => {
                write!(f, "SNE V{:X}, V{:X}", x, y)
            }
            Instruction::LoadIndex { addr } => write!(f, "LD I, {:#05X}", addr),
            Instruction::JumpOffset { addr } => write!(f, "JP V0, {:#05X}", addr),
            Instruction::Random { x, byte } => write!(f, "RND V{:X}, {:#04X}", x, byte),
            Instruction::Draw { x, y, height } => {
                write!(f, "DRW V{:X}, V{:X}, {}", x, y, height)
            }
            Instruction::SkipIfKeyPressed { x } => write!(f, "SKP V{:X}", x),
            Instruction::SkipIfKeyNotPressed { x } => write!(f, "SKNP V{:X}", x),
            Instruction::LoadDelayTimer { x } => write!(f, "LD V{:X}, DT", x),
            Instruction::WaitForKey { x } => write!(f, "LD V{:X}, K", x),
            Instruction::SetDelayTimer { x } => write!(f, "LD DT, V{:X}", x),
            Instruction::SetSoundTimer { x } => write!(f, "LD ST, V{:X}", x),
            Instruction::AddIndex { x } => write!(f, "ADD I, V{:X}", x),
            Instruction::LoadFontGlyph { x } => write!(f, "LD F, V{:X}", x),
            Instruction::StoreBcd { x } => write!(f, "LD B, V{:X}", x),
            Instruction::StoreRegisters { x } => write!(f, "LD [I], V{:X}", x),
            Instruction::LoadRegisters { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}
