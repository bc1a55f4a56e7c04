//! A stored-program virtual machine over blocking integer ports, with a
//! composition layer that wires instances into driver-paired machines,
//! linear pipelines, and cyclic feedback rings.

pub mod config;
pub mod logging;
pub mod port;
pub mod topology;
pub mod vm;

pub use port::{PortError, PortReceiver, PortSender, port};
pub use topology::{Instance, Machine, TopologyError, pipeline, ring, spawn};
pub use vm::error::{ProgramError, VMFault};
pub use vm::executor::Executor;
pub use vm::memory::Memory;
pub use vm::parser::Program;
pub use vm::state::VMState;
