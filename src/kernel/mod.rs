use std::collections::VecDeque;

use crate::{
    block::{
        Block, Tsb,
        storage::{Storage, grid::GridStorage},
    },
    config::Config,
    cpu::{Cpu, Fault},
    fs::{Filesystem, Response},
    mem::MemoryManager,
    proc::{
        Pid, ProcessTable,
        scheduler::{Outgoing, Scheduler},
    },
};

pub mod console;
pub mod disk;
pub mod error;
pub mod interrupt;
pub mod process;
pub mod syscall;


use console::Console;
use disk::DiskOperation;
use error::{Result, Trap};
use interrupt::Interrupt;

/// The whole machine: hardware, kernel state and the console it talks to.
pub struct Kernel<S: Storage, C: Console> {
    cpu: Cpu,
    memory: MemoryManager,
    processes: ProcessTable,
    scheduler: Scheduler,
    fs: Filesystem<S>,
    console: C,
    interrupts: VecDeque<Interrupt>,
    input: VecDeque<char>,
    step_mode: bool,
    halted: Option<Trap>,
    clock: u64,
}

impl<C: Console> Kernel<GridStorage, C> {
    /// Boots a machine with a freshly formatted in-memory disk.
    pub fn boot(config: &Config, console: C) -> Result<Self> {
        Self::new(config, GridStorage::new(config.geometry), console)
    }
}

impl<S: Storage, C: Console> Kernel<S, C> {
    /// Boots a machine on `storage`, formatting it.
    pub fn new(config: &Config, storage: S, console: C) -> Result<Self> {
        let fs = Filesystem::create(storage)?;
        log::info!(
            "Booted with {} words of memory in {} partitions, scheduling {}",
            config.memory_size,
            config.partition_count,
            config.policy
        );
        Ok(Self {
            cpu: Cpu::default(),
            memory: MemoryManager::new(config.memory_size, config.partition_count),
            processes: ProcessTable::default(),
            scheduler: Scheduler::new(config.policy, config.quantum),
            fs,
            console,
            interrupts: VecDeque::new(),
            input: VecDeque::new(),
            step_mode: false,
            halted: None,
            clock: 0,
        })
    }

    /// Advances the machine by one clock pulse.
    ///
    /// Services one pending interrupt if there is any, else runs one instruction cycle if a
    /// process is executing, else idles. The scheduler then acts on whatever changed.
    pub fn tick(&mut self) -> core::result::Result<(), Trap> {
        if let Some(trap) = &self.halted {
            return Err(trap.clone());
        }
        self.clock += 1;

        if let Some(interrupt) = self.interrupts.pop_front() {
            self.dispatch(interrupt)?;
        } else if self.cpu.is_executing() && !self.step_mode {
            self.cycle();
        } else {
            log::trace!("Idle");
        }

        self.schedule();
        Ok(())
    }

    /// Ticks until nothing is left to do or `max_ticks` have passed.
    /// Returns whether the machine went idle.
    pub fn run(&mut self, max_ticks: u64) -> core::result::Result<bool, Trap> {
        for _ in 0..max_ticks {
            if self.is_idle() {
                return Ok(true);
            }
            self.tick()?;
        }
        Ok(self.is_idle())
    }

    /// Checks whether no interrupt is pending and no process is running or waiting to run.
    pub fn is_idle(&self) -> bool {
        self.interrupts.is_empty() && self.scheduler.is_idle() && !self.cpu.is_executing()
    }

    /// Runs one instruction cycle of the current process.
    fn cycle(&mut self) {
        let Some(pid) = self.cpu.current() else {
            return;
        };
        let Some(pcb) = self.processes.get_mut(pid) else {
            self.cpu.stop();
            return;
        };

        let res = self.cpu.cycle(&mut self.memory, pcb);
        self.scheduler.tick();
        match res {
            Ok(Some(call)) => self
                .interrupts
                .push_back(Interrupt::SystemCall { pid, call }),
            Ok(None) => {}
            Err(fault) => {
                self.cpu.stop();
                let interrupt = match fault {
                    Fault::Memory(error) => Interrupt::MemoryFault { pid, error },
                    fault => Interrupt::ProcessFault { pid, fault },
                };
                self.interrupts.push_back(interrupt);
            }
        }
    }

    /// Applies the scheduling decision of this tick.
    fn schedule(&mut self) {
        let Some(switch) = self.scheduler.schedule(&mut self.processes) else {
            return;
        };

        let preempted = match switch.outgoing {
            Some(Outgoing::Terminated(pid)) => {
                if self.cpu.current() == Some(pid) {
                    self.cpu.stop();
                }
                self.reap(pid);
                None
            }
            Some(Outgoing::Preempted(pid)) => {
                self.cpu.stop();
                Some(pid)
            }
            None => None,
        };

        if let Some(pid) = switch.incoming {
            self.switch_to(pid, preempted);
        }
    }

    /// Starts `pid` on the CPU, bringing it into memory first if needed.
    fn switch_to(&mut self, pid: Pid, preempted: Option<Pid>) {
        let resident = self.processes.get(pid).is_some_and(|pcb| pcb.in_memory());
        if !resident {
            let victim = self.victim(pid, preempted);
            if let Err(err) = self.swap(victim, pid) {
                self.interrupts.push_back(Interrupt::DiskOperationFault {
                    message: format!("Failed to swap in process {pid}: {err}"),
                    pid: Some(pid),
                });
                return;
            }
        }

        if let Some(pcb) = self.processes.get(pid) {
            log::info!("Dispatching process {pid}");
            self.cpu.start(pcb);
        }
    }

    /// Picks the resident process to swap out so that `incoming` can be swapped in.
    fn victim(&self, incoming: Pid, preempted: Option<Pid>) -> Option<Pid> {
        if self.memory.available() > 0 {
            return None;
        }

        let resident = |pid: &Pid| {
            *pid != incoming
                && self
                    .processes
                    .get(*pid)
                    .is_some_and(|pcb| pcb.in_memory() && pcb.state.is_live())
        };

        preempted
            .filter(resident)
            .or_else(|| {
                let ready: Vec<Pid> = self.scheduler.ready().collect();
                ready.into_iter().rev().find(resident)
            })
            .or_else(|| self.processes.iter().map(|pcb| pcb.pid).find(resident))
    }

    /// Queues an interrupt.
    pub fn interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push_back(interrupt);
    }

    /// Queues an interrupt by its raw request code.
    pub fn request(&mut self, code: u8) {
        self.interrupt(Interrupt::from_code(code));
    }

    pub fn create_file(&mut self, name: &str) -> Option<Response> {
        self.disk_operation(DiskOperation::Create(name.to_owned()))
    }

    pub fn read_file(&mut self, name: &str) -> Option<Response> {
        self.disk_operation(DiskOperation::Read(name.to_owned()))
    }

    pub fn write_file(&mut self, name: &str, data: &str) -> Option<Response> {
        self.disk_operation(DiskOperation::Write(name.to_owned(), data.as_bytes().to_vec()))
    }

    pub fn delete_file(&mut self, name: &str) -> Option<Response> {
        self.disk_operation(DiskOperation::Delete(name.to_owned()))
    }

    pub fn list_files(&mut self) -> Option<Response> {
        self.disk_operation(DiskOperation::List)
    }

    pub fn format(&mut self) -> Option<Response> {
        self.disk_operation(DiskOperation::Format)
    }

    /// Reads the raw block at `tsb`. A location off the disk raises a disk operation fault.
    pub fn read_block(&mut self, tsb: Tsb) -> Option<Block> {
        match self.fs.read_block(tsb) {
            Ok(block) => Some(block),
            Err(err) => {
                self.interrupts.push_back(Interrupt::DiskOperationFault {
                    message: format!("Disk operation failed: {err}"),
                    pid: None,
                });
                None
            }
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn process_table(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn fs(&self) -> &Filesystem<S> {
        &self.fs
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn step_mode(&self) -> bool {
        self.step_mode
    }

    /// Returns the trap that halted the machine, if any.
    pub fn halted(&self) -> Option<&Trap> {
        self.halted.as_ref()
    }

    /// Returns the number of ticks so far.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Returns the number of interrupts waiting to be serviced.
    pub fn pending_interrupts(&self) -> usize {
        self.interrupts.len()
    }
}
