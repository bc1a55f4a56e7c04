// VM State: program counter, relative base, and the owned memory image

use super::memory::Memory;
use super::parser::Program;

/// Execution state for one VM instance. Built fresh per run; drivers that
/// retry many inputs construct a new state per trial instead of resetting a
/// shared one. Mutated only by the executor that owns it, and handed back to
/// the driver on halt so halted memory can be inspected.
#[derive(Debug, Clone)]
pub struct VMState {
    pub pc: i64,
    pub relative_base: i64,
    pub memory: Memory,
}

impl VMState {
    pub fn new(program: &Program) -> Self {
        VMState {
            pc: 0,
            relative_base: 0,
            memory: Memory::load(program),
        }
    }
}
