use std::fmt;

use crate::{
    block::storage::Storage,
    cpu::Fault,
    kernel::{Kernel, console::Console, disk::DiskOperation, error::Trap, syscall::SystemCall},
    mem,
    proc::{Pid, ProcessState},
};

/// Interrupt request codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    Timer = 0,
    Keyboard = 1,
    SystemCall = 2,
    ProcessExecution = 3,
    MemoryFault = 4,
    Step = 5,
    StepMode = 6,
    ProcessFault = 7,
    ProcessLoadFault = 8,
    DiskOperation = 9,
    DiskOperationFault = 10,
}

impl TryFrom<u8> for Irq {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Timer,
            1 => Self::Keyboard,
            2 => Self::SystemCall,
            3 => Self::ProcessExecution,
            4 => Self::MemoryFault,
            5 => Self::Step,
            6 => Self::StepMode,
            7 => Self::ProcessFault,
            8 => Self::ProcessLoadFault,
            9 => Self::DiskOperation,
            10 => Self::DiskOperationFault,
            _ => return Err(code),
        })
    }
}

/// A pending interrupt and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    Timer,
    /// A key press, already translated to a character.
    Keyboard(char),
    SystemCall { pid: Pid, call: SystemCall },
    /// A process is ready to be queued for execution.
    ProcessExecution(Pid),
    MemoryFault { pid: Pid, error: mem::Error },
    /// Performs a single instruction cycle.
    Step,
    /// Toggles step mode.
    StepMode,
    ProcessFault { pid: Pid, fault: Fault },
    ProcessLoadFault(String),
    DiskOperation(DiskOperation),
    DiskOperationFault { message: String, pid: Option<Pid> },
    /// A request with an unknown code, or one that cannot be raised without a payload.
    Invalid { irq: u8 },
}

impl Interrupt {
    /// Builds the interrupt for a raw request code.
    /// Only requests that carry no payload can be raised this way.
    pub fn from_code(code: u8) -> Self {
        match Irq::try_from(code) {
            Ok(Irq::Timer) => Self::Timer,
            Ok(Irq::Step) => Self::Step,
            Ok(Irq::StepMode) => Self::StepMode,
            _ => Self::Invalid { irq: code },
        }
    }

    /// Returns the request code, or `None` for invalid requests.
    pub fn irq(&self) -> Option<Irq> {
        Some(match self {
            Self::Timer => Irq::Timer,
            Self::Keyboard(_) => Irq::Keyboard,
            Self::SystemCall { .. } => Irq::SystemCall,
            Self::ProcessExecution(_) => Irq::ProcessExecution,
            Self::MemoryFault { .. } => Irq::MemoryFault,
            Self::Step => Irq::Step,
            Self::StepMode => Irq::StepMode,
            Self::ProcessFault { .. } => Irq::ProcessFault,
            Self::ProcessLoadFault(_) => Irq::ProcessLoadFault,
            Self::DiskOperation(_) => Irq::DiskOperation,
            Self::DiskOperationFault { .. } => Irq::DiskOperationFault,
            Self::Invalid { .. } => return None,
        })
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.irq() {
            Some(irq) => write!(f, "{irq:?} ({})", irq as u8),
            None => write!(f, "{self:?}"),
        }
    }
}

impl<S: Storage, C: Console> Kernel<S, C> {
    /// Routes an interrupt to its service routine.
    pub(super) fn dispatch(&mut self, interrupt: Interrupt) -> Result<(), Trap> {
        log::debug!("Handling IRQ {interrupt}");

        match interrupt {
            Interrupt::Timer => {}
            Interrupt::Keyboard(key) => {
                self.input.push_back(key);
                self.console.handle_input(&mut self.input);
            }
            Interrupt::SystemCall { pid, call } => self.system_call_isr(pid, call),
            Interrupt::ProcessExecution(pid) => self.process_execution_isr(pid),
            Interrupt::MemoryFault { pid, error } => {
                self.fault(pid, &format!("Memory fault in process {pid}: {error}"));
            }
            Interrupt::Step => {
                if self.cpu.is_executing() {
                    self.cycle();
                }
            }
            Interrupt::StepMode => {
                self.step_mode = !self.step_mode;
                log::debug!("Step mode {}", if self.step_mode { "on" } else { "off" });
            }
            Interrupt::ProcessFault { pid, fault } => {
                self.fault(pid, &format!("Process {pid} faulted: {fault}"));
            }
            Interrupt::ProcessLoadFault(message) => self.load_fault(&message),
            Interrupt::DiskOperation(operation) => {
                self.disk_operation(operation);
            }
            Interrupt::DiskOperationFault { message, pid } => match pid {
                Some(pid) => self.fault(pid, &message),
                None => {
                    log::warn!("{message}");
                    self.console.handle_response(&message);
                }
            },
            Interrupt::Invalid { irq } => return Err(self.trap(irq)),
        }
        Ok(())
    }

    fn process_execution_isr(&mut self, pid: Pid) {
        match self.processes.get(pid) {
            Some(pcb) if pcb.state == ProcessState::Ready => {
                self.scheduler.enqueue(pid);
                log::debug!("Process {pid} queued");
            }
            _ => log::debug!("Process {pid} is no longer ready"),
        }
    }

    /// Reports a recoverable fault and terminates the offending process.
    fn fault(&mut self, pid: Pid, message: &str) {
        log::warn!("{message}");
        self.console.handle_response(message);
        self.terminate(pid);
    }

    /// Reports a program that could not be loaded.
    pub(super) fn load_fault(&mut self, message: &str) {
        log::warn!("{message}");
        self.console.handle_response(message);
    }

    /// Halts the machine.
    fn trap(&mut self, irq: u8) -> Trap {
        let trap = Trap { irq };
        log::error!("{trap}");
        self.cpu.stop();
        self.console.handle_response(&format!("Error: {trap}"));
        self.halted = Some(trap.clone());
        trap
    }
}
