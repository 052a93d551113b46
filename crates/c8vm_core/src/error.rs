use thiserror::Error;

pub type Result<T> = std::result::Result<T, Chip8Error>;

/// Conditions that stop a [`Machine`](crate::Machine) from loading or running.
///
/// Every variant except `RomTooLarge` halts the machine: later calls to
/// `step()` report `Halted` until the machine is reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), at most {max} bytes fit in program memory")]
    RomTooLarge { size: usize, max: usize },

    #[error("unimplemented instruction {opcode:#06X} at {address:#05X}")]
    UnimplementedInstruction { opcode: u16, address: u16 },

    #[error("call stack overflow at {address:#05X}")]
    StackOverflow { address: u16 },

    #[error("return with an empty call stack at {address:#05X}")]
    StackUnderflow { address: u16 },

    #[error("machine is halted at {address:#05X}; reset it before stepping again")]
    Halted { address: u16 },
}
