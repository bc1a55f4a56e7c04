// VM Executor: the fetch-decode-execute loop driving one instance over its ports

use crate::port::{PortReceiver, PortSender};

use super::error::VMFault;
use super::instruction::{Instruction, Mode, Opcode};
use super::parser::Program;
use super::state::VMState;

enum Step {
    Continue,
    Halt,
}

/// Executes one VM instance: owns the state, blocks on the input port for
/// opcode 3 and on the output port for opcode 4, and runs until halt or
/// fault. The output port closes when the executor is dropped, so a halted
/// (or faulted) instance signals end of stream downstream instead of
/// leaving the consumer waiting.
pub struct Executor {
    state: VMState,
    input: PortReceiver,
    output: PortSender,
}

impl Executor {
    pub fn new(program: &Program, input: PortReceiver, output: PortSender) -> Self {
        Executor {
            state: VMState::new(program),
            input,
            output,
        }
    }

    /// Runs to completion and returns the final state, so drivers can
    /// inspect halted memory.
    pub fn run(mut self) -> Result<VMState, VMFault> {
        crate::debug_vm!("starting at pc {}", self.state.pc);
        loop {
            match self.step()? {
                Step::Continue => {}
                Step::Halt => {
                    crate::debug_vm!("halted at pc {}", self.state.pc);
                    return Ok(self.state);
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step, VMFault> {
        let pc = self.state.pc;
        let word = self
            .state
            .memory
            .read(pc)
            .map_err(|err| VMFault::from_memory(err, pc))?;
        let instr = Instruction::decode(word).map_err(|err| VMFault::from_decode(err, pc))?;
        crate::debug_instructions!("pc {} word {} -> {:?}", pc, word, instr.opcode);

        match instr.opcode {
            Opcode::Add => {
                let value = self.read_param(&instr, 0)? + self.read_param(&instr, 1)?;
                self.store(&instr, 2, value)?;
            }
            Opcode::Mul => {
                let value = self.read_param(&instr, 0)? * self.read_param(&instr, 1)?;
                self.store(&instr, 2, value)?;
            }
            Opcode::Input => {
                let value = self
                    .input
                    .recv()
                    .map_err(|_| VMFault::InputDisconnected { pc })?;
                self.store(&instr, 0, value)?;
            }
            Opcode::Output => {
                let value = self.read_param(&instr, 0)?;
                self.output
                    .send(value)
                    .map_err(|_| VMFault::OutputDisconnected { pc })?;
            }
            Opcode::JumpIfTrue => {
                if self.read_param(&instr, 0)? != 0 {
                    self.state.pc = self.read_param(&instr, 1)?;
                    return Ok(Step::Continue);
                }
            }
            Opcode::JumpIfFalse => {
                if self.read_param(&instr, 0)? == 0 {
                    self.state.pc = self.read_param(&instr, 1)?;
                    return Ok(Step::Continue);
                }
            }
            Opcode::LessThan => {
                let value = (self.read_param(&instr, 0)? < self.read_param(&instr, 1)?) as i64;
                self.store(&instr, 2, value)?;
            }
            Opcode::Equals => {
                let value = (self.read_param(&instr, 0)? == self.read_param(&instr, 1)?) as i64;
                self.store(&instr, 2, value)?;
            }
            Opcode::AdjustBase => {
                self.state.relative_base += self.read_param(&instr, 0)?;
            }
            Opcode::Halt => return Ok(Step::Halt),
        }

        self.state.pc += 1 + instr.opcode.param_count() as i64;
        Ok(Step::Continue)
    }

    /// Raw operand word for parameter `index`.
    fn operand(&self, index: usize) -> Result<i64, VMFault> {
        let pc = self.state.pc;
        self.state
            .memory
            .read(pc + 1 + index as i64)
            .map_err(|err| VMFault::from_memory(err, pc))
    }

    /// Value of a read parameter under its addressing mode.
    fn read_param(&self, instr: &Instruction, index: usize) -> Result<i64, VMFault> {
        let pc = self.state.pc;
        let operand = self.operand(index)?;
        let value = match instr.modes[index] {
            Mode::Immediate => operand,
            Mode::Position => self
                .state
                .memory
                .read(operand)
                .map_err(|err| VMFault::from_memory(err, pc))?,
            Mode::Relative => self
                .state
                .memory
                .read(operand + self.state.relative_base)
                .map_err(|err| VMFault::from_memory(err, pc))?,
        };
        Ok(value)
    }

    /// Effective address of a write target: the operand itself (position) or
    /// the operand plus the relative base. Immediate write targets are
    /// rejected at decode time.
    fn write_address(&self, instr: &Instruction, index: usize) -> Result<i64, VMFault> {
        let operand = self.operand(index)?;
        match instr.modes[index] {
            Mode::Position => Ok(operand),
            Mode::Relative => Ok(operand + self.state.relative_base),
            Mode::Immediate => Err(VMFault::InvalidAddressingMode {
                pc: self.state.pc,
                mode: 1,
            }),
        }
    }

    fn store(&mut self, instr: &Instruction, index: usize, value: i64) -> Result<(), VMFault> {
        let pc = self.state.pc;
        let address = self.write_address(instr, index)?;
        self.state
            .memory
            .write(address, value)
            .map_err(|err| VMFault::from_memory(err, pc))
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use crate::port::port;

    use super::*;

    /// Run `words` with `inputs` pre-seeded, collecting the output stream and
    /// the final state. Output capacity is large enough that no consumer
    /// thread is needed.
    fn run_with_io(words: &[i64], inputs: &[i64]) -> (Vec<i64>, VMState) {
        let program = Program::from_words(words.to_vec());
        let (in_tx, in_rx) = port(inputs.len().max(1));
        for &value in inputs {
            in_tx.send(value).unwrap();
        }
        let (out_tx, out_rx) = port(256);
        let state = Executor::new(&program, in_rx, out_tx).run().unwrap();
        drop(in_tx);
        (out_rx.collect(), state)
    }

    fn run_silent(words: &[i64]) -> VMState {
        let (_, state) = run_with_io(words, &[]);
        state
    }

    #[test]
    fn test_add_halts_with_sum() {
        let state = run_silent(&[1, 0, 0, 0, 99]);
        assert_eq!(state.memory.read(0).unwrap(), 2);
    }

    #[test]
    fn test_worked_example_3500() {
        let state = run_silent(&[1, 9, 10, 3, 2, 3, 11, 0, 99, 30, 40, 50]);
        assert_eq!(state.memory.read(0).unwrap(), 3500);
    }

    #[test]
    fn test_mul_squares_last_cell() {
        let state = run_silent(&[2, 4, 4, 5, 99, 0]);
        assert_eq!(state.memory.read(5).unwrap(), 9801);
    }

    #[test]
    fn test_self_modifying_tail() {
        let state = run_silent(&[1, 1, 1, 4, 99, 5, 6, 0, 99]);
        assert_eq!(state.memory.read(0).unwrap(), 30);
    }

    #[test]
    fn test_echo() {
        let (outputs, _) = run_with_io(&[3, 0, 4, 0, 99], &[42]);
        assert_eq!(outputs, vec![42]);
    }

    #[test]
    fn test_immediate_operands() {
        let state = run_silent(&[1002, 4, 3, 4, 33]);
        assert_eq!(state.memory.read(4).unwrap(), 99);
    }

    #[test]
    fn test_negative_immediate() {
        let state = run_silent(&[1101, 100, -1, 4, 0]);
        assert_eq!(state.memory.read(4).unwrap(), 99);
    }

    #[test]
    fn test_equals_position_mode() {
        let program = [3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8];
        assert_eq!(run_with_io(&program, &[8]).0, vec![1]);
        assert_eq!(run_with_io(&program, &[7]).0, vec![0]);
    }

    #[test]
    fn test_less_than_immediate_mode() {
        let program = [3, 3, 1107, -1, 8, 3, 4, 3, 99];
        assert_eq!(run_with_io(&program, &[7]).0, vec![1]);
        assert_eq!(run_with_io(&program, &[9]).0, vec![0]);
    }

    #[test]
    fn test_jump_position_mode() {
        // Outputs 0 when given 0, 1 otherwise.
        let program = [3, 12, 6, 12, 15, 1, 13, 14, 13, 4, 13, 99, -1, 0, 1, 9];
        assert_eq!(run_with_io(&program, &[0]).0, vec![0]);
        assert_eq!(run_with_io(&program, &[5]).0, vec![1]);
    }

    #[test]
    fn test_compare_around_eight() {
        // Outputs 999, 1000, 1001 for input below, equal to, above 8.
        let program = [
            3, 21, 1008, 21, 8, 20, 1005, 20, 22, 107, 8, 21, 20, 1006, 20, 31, 1106, 0, 36, 98,
            0, 0, 1002, 21, 125, 20, 4, 20, 1105, 1, 46, 104, 999, 1105, 1, 46, 1101, 1000, 1, 20,
            4, 20, 1105, 1, 46, 98, 99,
        ];
        assert_eq!(run_with_io(&program, &[3]).0, vec![999]);
        assert_eq!(run_with_io(&program, &[8]).0, vec![1000]);
        assert_eq!(run_with_io(&program, &[13]).0, vec![1001]);
    }

    #[test]
    fn test_quine_via_relative_base() {
        let program = [
            109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99,
        ];
        let (outputs, _) = run_with_io(&program, &[]);
        assert_eq!(outputs, program.to_vec());
    }

    #[test]
    fn test_sixty_four_bit_multiply() {
        let (outputs, _) = run_with_io(&[1102, 34915192, 34915192, 7, 4, 7, 99, 0], &[]);
        assert_eq!(outputs, vec![34915192 * 34915192]);
        assert_eq!(outputs[0].to_string().len(), 16);
    }

    #[test]
    fn test_large_literal_round_trip() {
        let (outputs, _) = run_with_io(&[104, 1125899906842624, 99], &[]);
        assert_eq!(outputs, vec![1125899906842624]);
    }

    #[test]
    fn test_comparisons_store_only_zero_or_one() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let a: i64 = rng.gen_range(-1_000_000..1_000_000);
            let b: i64 = rng.gen_range(-1_000_000..1_000_000);
            for op in [1107, 1108] {
                let (outputs, _) = run_with_io(&[op, a, b, 7, 4, 7, 99, 0], &[]);
                assert!(outputs[0] == 0 || outputs[0] == 1, "got {}", outputs[0]);
            }
        }
    }

    #[test]
    fn test_unknown_opcode_faults() {
        let program = Program::from_words(vec![42]);
        let (_in_tx, in_rx) = port(1);
        let (out_tx, _out_rx) = port(1);
        let fault = Executor::new(&program, in_rx, out_tx).run().unwrap_err();
        assert_eq!(fault, VMFault::UnknownOpcode { pc: 0, word: 42 });
    }

    #[test]
    fn test_negative_effective_address_faults() {
        // Relative base of -5, then an output through it.
        let program = Program::from_words(vec![109, -5, 204, 0, 99]);
        let (_in_tx, in_rx) = port(1);
        let (out_tx, _out_rx) = port(1);
        let fault = Executor::new(&program, in_rx, out_tx).run().unwrap_err();
        assert_eq!(
            fault,
            VMFault::NegativeAddress {
                pc: 2,
                address: -5
            }
        );
    }

    #[test]
    fn test_invalid_mode_digit_faults() {
        let program = Program::from_words(vec![301, 0, 99]);
        let (_in_tx, in_rx) = port(1);
        let (out_tx, _out_rx) = port(1);
        let fault = Executor::new(&program, in_rx, out_tx).run().unwrap_err();
        assert_eq!(fault, VMFault::InvalidAddressingMode { pc: 0, mode: 3 });
    }

    #[test]
    fn test_read_from_abandoned_input_faults() {
        let program = Program::from_words(vec![3, 0, 99]);
        let (in_tx, in_rx) = port(1);
        drop(in_tx);
        let (out_tx, _out_rx) = port(1);
        let fault = Executor::new(&program, in_rx, out_tx).run().unwrap_err();
        assert_eq!(fault, VMFault::InputDisconnected { pc: 0 });
    }

    #[test]
    fn test_write_to_abandoned_output_faults() {
        let program = Program::from_words(vec![104, 1, 99]);
        let (_in_tx, in_rx) = port(1);
        let (out_tx, out_rx) = port(1);
        drop(out_rx);
        let fault = Executor::new(&program, in_rx, out_tx).run().unwrap_err();
        assert_eq!(fault, VMFault::OutputDisconnected { pc: 0 });
    }
}
