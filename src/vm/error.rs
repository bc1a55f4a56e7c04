// VM Error types: program text errors, memory errors, decode errors, runtime faults

use thiserror::Error;

/// Program text errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("malformed program: token `{token}` at index {index} is not an integer")]
    MalformedProgram { index: usize, token: String },
}

/// Memory access errors
#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum MemoryError {
    #[error("negative address {address}")]
    NegativeAddress { address: i64 },
}

/// Instruction decode errors
#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum DecodeError {
    #[error("unknown opcode in word {word}")]
    UnknownOpcode { word: i64 },
    #[error("invalid addressing mode {mode}")]
    InvalidAddressingMode { mode: i64 },
}

/// Runtime faults. Every variant carries the program counter of the faulting
/// instruction; the composition layer attaches the instance id on top.
#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum VMFault {
    #[error("unknown opcode in word {word} at pc {pc}")]
    UnknownOpcode { pc: i64, word: i64 },
    #[error("invalid addressing mode {mode} at pc {pc}")]
    InvalidAddressingMode { pc: i64, mode: i64 },
    #[error("negative address {address} computed at pc {pc}")]
    NegativeAddress { pc: i64, address: i64 },
    #[error("input port closed while reading at pc {pc}")]
    InputDisconnected { pc: i64 },
    #[error("output port closed while writing at pc {pc}")]
    OutputDisconnected { pc: i64 },
}

impl VMFault {
    pub(crate) fn from_decode(err: DecodeError, pc: i64) -> Self {
        match err {
            DecodeError::UnknownOpcode { word } => VMFault::UnknownOpcode { pc, word },
            DecodeError::InvalidAddressingMode { mode } => {
                VMFault::InvalidAddressingMode { pc, mode }
            }
        }
    }

    pub(crate) fn from_memory(err: MemoryError, pc: i64) -> Self {
        match err {
            MemoryError::NegativeAddress { address } => VMFault::NegativeAddress { pc, address },
        }
    }
}
