// Topology wiring: driver-paired machines, linear pipelines, and cyclic
// feedback rings of VM instances

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel;
use thiserror::Error;

use crate::config;
use crate::port::{PortError, PortReceiver, PortSender, port};
use crate::vm::error::VMFault;
use crate::vm::executor::Executor;
use crate::vm::parser::Program;
use crate::vm::state::VMState;

/// Composition errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopologyError {
    #[error("instance {id} faulted: {fault}")]
    Instance { id: usize, fault: VMFault },
    #[error("instances still running after {timeout:?}; topology is deadlocked or hung")]
    Hang { timeout: Duration },
    #[error("no output produced before halt")]
    NoOutput,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Handle to one concurrently executing VM instance.
pub struct Instance {
    id: usize,
    handle: JoinHandle<Result<VMState, VMFault>>,
}

/// Start `program` as instance `id` on its own thread, reading from `input`
/// and writing to `output`. The thread is named `vm-<id>` so log lines carry
/// the instance tag.
pub fn spawn(id: usize, program: &Program, input: PortReceiver, output: PortSender) -> Instance {
    let executor = Executor::new(program, input, output);
    let handle = thread::Builder::new()
        .name(format!("vm-{id}"))
        .spawn(move || executor.run())
        .expect("failed to spawn vm thread");
    crate::debug_pipeline!("spawned instance {}", id);
    Instance { id, handle }
}

impl Instance {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Blocks until the instance halts, attaching the instance id to any
    /// fault.
    pub fn join(self) -> Result<VMState, TopologyError> {
        let id = self.id;
        self.handle
            .join()
            .expect("vm thread panicked")
            .map_err(|fault| TopologyError::Instance { id, fault })
    }
}

/// A single VM instance with the driver holding both ports. Covers the
/// driver/VM protocols: single-query, sensor/actuator ping-pong, and
/// write-then-drain.
pub struct Machine {
    input: PortSender,
    output: PortReceiver,
    instance: Instance,
}

impl Machine {
    /// Start with rendezvous ports: every driver send waits for the VM and
    /// every VM output waits for the driver.
    pub fn start(program: &Program) -> Machine {
        Machine::start_seeded(program, &[])
    }

    /// Start with the input port pre-seeded, for write-then-drain protocols
    /// where the driver never returns to the input side.
    pub fn start_seeded(program: &Program, inputs: &[i64]) -> Machine {
        let (in_tx, in_rx) = port(inputs.len());
        for &value in inputs {
            in_tx
                .send(value)
                .expect("seeding cannot block: the receiver is held locally");
        }
        let (out_tx, out_rx) = port(config::MACHINE_PORT_CAPACITY);
        let instance = spawn(0, program, in_rx, out_tx);
        Machine {
            input: in_tx,
            output: out_rx,
            instance,
        }
    }

    /// Write one value into the instance's input port.
    pub fn send(&self, value: i64) -> Result<(), PortError> {
        self.input.send(value)
    }

    /// Read the next output value; `Closed` once the instance has halted and
    /// the stream is drained.
    pub fn recv(&self) -> Result<i64, PortError> {
        self.output.recv()
    }

    /// Single-query protocol: write the query values, block for exactly one
    /// reply.
    pub fn query(&self, values: &[i64]) -> Result<i64, PortError> {
        for &value in values {
            self.input.send(value)?;
        }
        let reply = self.output.recv()?;
        crate::debug_port!("query {:?} -> {}", values, reply);
        Ok(reply)
    }

    /// Sensor/actuator ping-pong: write one status value, block for a reply
    /// pair.
    pub fn exchange(&self, status: i64) -> Result<(i64, i64), PortError> {
        self.input.send(status)?;
        let reply = (self.output.recv()?, self.output.recv()?);
        crate::debug_port!("exchange {} -> {:?}", status, reply);
        Ok(reply)
    }

    /// Full-drain protocol: read every remaining output until the instance
    /// halts and closes the port.
    pub fn drain(&mut self) -> Vec<i64> {
        self.output.by_ref().collect()
    }

    /// Blocks until the instance halts and returns its final state. Drops
    /// the driver ports first, so an instance still mid-protocol faults on a
    /// closed port instead of waiting on a driver that has moved on.
    pub fn join(self) -> Result<VMState, TopologyError> {
        let Machine {
            input,
            output,
            instance,
        } = self;
        drop(input);
        drop(output);
        instance.join()
    }
}

/// Linear pipeline: instance k's output port is instance k+1's input port.
/// Each instance's input is pre-seeded with its configuration value from
/// `settings`; the externally supplied `seed` enters the first port. The
/// result is the last value the final instance produces before halting.
pub fn pipeline(program: &Program, settings: &[i64], seed: i64) -> Result<i64, TopologyError> {
    run_chain(
        program,
        settings,
        Some(seed),
        false,
        Duration::from_millis(config::JOIN_TIMEOUT_MS),
    )
}

/// Cyclic feedback ring: as `pipeline`, but the last instance's output feeds
/// back into the first port. The cycle is pre-seeded with `seed` before any
/// instance starts (an unseeded ring deadlocks), and the circulated value is
/// read back out of the seeded port once every instance has halted.
pub fn ring(program: &Program, settings: &[i64], seed: i64) -> Result<i64, TopologyError> {
    run_chain(
        program,
        settings,
        Some(seed),
        true,
        Duration::from_millis(config::JOIN_TIMEOUT_MS),
    )
}

/// Shared chain runner. `seed: None` wires the topology without the initial
/// value; for a cycle that is the documented deadlock shape, surfaced as
/// `Hang` once `timeout` expires.
fn run_chain(
    program: &Program,
    settings: &[i64],
    seed: Option<i64>,
    cyclic: bool,
    timeout: Duration,
) -> Result<i64, TopologyError> {
    let count = settings.len();
    if count == 0 {
        return Err(TopologyError::NoOutput);
    }

    let port_count = if cyclic { count } else { count + 1 };
    let mut senders = Vec::with_capacity(port_count);
    let mut receivers = Vec::with_capacity(port_count);
    for _ in 0..port_count {
        let (tx, rx) = port(config::CHAIN_PORT_CAPACITY);
        senders.push(tx);
        receivers.push(Some(rx));
    }

    // Seed configuration values first, then the initial chained value, so
    // each instance reads its setting before anything circulating.
    for (id, &setting) in settings.iter().enumerate() {
        senders[id].send(setting)?;
    }
    if let Some(seed) = seed {
        senders[0].send(seed)?;
    }

    // The ring result is read from the seeded port after all instances halt;
    // keep a driver-side handle so the value survives instance 0 going away.
    let ring_result = if cyclic {
        let seeded = receivers[0]
            .as_ref()
            .expect("port 0 receiver is still present");
        Some(seeded.tee())
    } else {
        None
    };
    let final_output = if cyclic {
        None
    } else {
        receivers[count].take()
    };

    let mut outputs: Vec<Option<PortSender>> = senders.into_iter().map(Some).collect();
    let (done_tx, done_rx) = channel::unbounded();
    for id in 0..count {
        let input = receivers[id].take().expect("input port taken once");
        let out_index = if cyclic { (id + 1) % count } else { id + 1 };
        let output = outputs[out_index].take().expect("output port taken once");
        let executor = Executor::new(program, input, output);
        let done = done_tx.clone();
        thread::Builder::new()
            .name(format!("vm-{id}"))
            .spawn(move || {
                let _ = done.send((id, executor.run().map(|_| ())));
            })
            .expect("failed to spawn vm thread");
    }
    // Close the driver's leftover handles: in a pipeline, port 0's producer
    // side must drop so instance 0 sees end of stream after the seeds.
    drop(outputs);
    drop(done_tx);
    crate::debug_pipeline!(
        "wired {} instance(s) into a {}",
        count,
        if cyclic { "ring" } else { "pipeline" }
    );

    // For a pipeline, drain the final port before joining: the last writer
    // may be blocked mid-send on it.
    let drained: Vec<i64> = final_output.map(|rx| rx.collect()).unwrap_or_default();

    let mut faults: Vec<(usize, VMFault)> = Vec::new();
    for _ in 0..count {
        match done_rx.recv_timeout(timeout) {
            Ok((id, Ok(()))) => crate::debug_pipeline!("instance {} halted", id),
            Ok((id, Err(fault))) => faults.push((id, fault)),
            Err(_) => return Err(TopologyError::Hang { timeout }),
        }
    }
    if let Some(&(id, fault)) = faults.iter().min_by_key(|(id, _)| *id) {
        return Err(TopologyError::Instance { id, fault });
    }

    if cyclic {
        let result = ring_result
            .expect("ring keeps a result handle")
            .recv()
            .map_err(|_| TopologyError::NoOutput)?;
        Ok(result)
    } else {
        drained.last().copied().ok_or(TopologyError::NoOutput)
    }
}
