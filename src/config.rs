//! Configuration constants for port wiring and topology coordination.

// Port wiring
pub const MACHINE_PORT_CAPACITY: usize = 0; // Rendezvous: every VM output waits for the driver
pub const CHAIN_PORT_CAPACITY: usize = 2; // Configuration value plus one chained value in flight

// Topology coordination
pub const JOIN_TIMEOUT_MS: u64 = 5_000; // Instances not halting by then are reported as a hang
