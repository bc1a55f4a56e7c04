// Sparse VM memory: address-indexed store of i64, unwritten cells read as zero

use std::collections::HashMap;

use super::error::MemoryError;
use super::parser::Program;

/// Sparse, unbounded memory. Owned by exactly one VM instance; instances
/// running the same program text each get an independent copy.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    cells: HashMap<i64, i64>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: HashMap::new(),
        }
    }

    /// Seed addresses `0..n` from a program listing.
    pub fn load(program: &Program) -> Self {
        let cells = program
            .words()
            .iter()
            .enumerate()
            .map(|(address, &word)| (address as i64, word))
            .collect();
        Memory { cells }
    }

    /// Read the value at `address`; never-written addresses hold 0.
    pub fn read(&self, address: i64) -> Result<i64, MemoryError> {
        if address < 0 {
            return Err(MemoryError::NegativeAddress { address });
        }
        Ok(self.cells.get(&address).copied().unwrap_or(0))
    }

    pub fn write(&mut self, address: i64, value: i64) -> Result<(), MemoryError> {
        if address < 0 {
            return Err(MemoryError::NegativeAddress { address });
        }
        self.cells.insert(address, value);
        Ok(())
    }
}
