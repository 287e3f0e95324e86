use std::fmt;

use crate::{
    cpu::inst::Opcode,
    kernel::syscall::SystemCall,
    mem::{self, MemoryManager, Word},
    proc::{Pcb, Pid, Registers},
};

pub mod inst;

/// A recoverable error raised by the process being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    InvalidInstruction(u8),
    InvalidSystemCall(u8),
    Memory(mem::Error),
}

impl From<mem::Error> for Fault {
    fn from(err: mem::Error) -> Self {
        Self::Memory(err)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInstruction(byte) => write!(f, "Invalid instruction: {byte:02X}"),
            Self::InvalidSystemCall(x) => write!(f, "Invalid system call: {x}"),
            Self::Memory(err) => err.fmt(f),
        }
    }
}

pub type Result<T> = core::result::Result<T, Fault>;

/// The instruction execution unit.
#[derive(Debug, Clone, Default)]
pub struct Cpu {
    registers: Registers,
    current: Option<Pid>,
    executing: bool,
}

impl Cpu {
    /// Loads the registers of `pcb` and starts executing it.
    pub fn start(&mut self, pcb: &Pcb) {
        self.registers = pcb.registers;
        self.current = Some(pcb.pid);
        self.executing = true;
    }

    /// Stops execution and clears the registers. Returns the process that was running.
    pub fn stop(&mut self) -> Option<Pid> {
        self.registers = Registers::default();
        self.executing = false;
        self.current.take()
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Performs one fetch, decode and execute cycle of `pcb`.
    /// On success the registers are written back to `pcb` and any system call requested
    /// by the instruction is returned.
    pub fn cycle(&mut self, memory: &mut MemoryManager, pcb: &mut Pcb) -> Result<Option<SystemCall>> {
        debug_assert_eq!(self.current, Some(pcb.pid), "cycle of a process not started");

        let byte = self.fetch(memory, pcb)?;
        self.registers.ir = byte;
        let opcode = Opcode::try_from(byte).map_err(Fault::InvalidInstruction)?;

        let mut args = [0; 2];
        for arg in args.iter_mut().take(opcode.arg_count()) {
            *arg = self.fetch(memory, pcb)?;
        }
        log::trace!("Process {}: {opcode} {:02X?}", pcb.pid, &args[..opcode.arg_count()]);

        let syscall = self.execute(memory, pcb, opcode, args)?;
        pcb.registers = self.registers;
        Ok(syscall)
    }

    /// Reads the byte at the program counter, wrapping to the start of the partition.
    fn fetch(&mut self, memory: &MemoryManager, pcb: &Pcb) -> Result<Word> {
        let len = pcb.bounds.ok_or(mem::Error::NotResident)?.len();
        if self.registers.pc >= len {
            self.registers.pc = 0;
        }
        let byte = memory.read(self.registers.pc, Some(pcb))?;
        self.registers.pc += 1;
        Ok(byte)
    }

    fn execute(
        &mut self,
        memory: &mut MemoryManager,
        pcb: &Pcb,
        opcode: Opcode,
        args: [Word; 2],
    ) -> Result<Option<SystemCall>> {
        let regs = &mut self.registers;
        let addr = usize::from(args[0]) | usize::from(args[1]) << 8;

        match opcode {
            Opcode::LoadAccImmediate => regs.acc = args[0],
            Opcode::LoadAccDirect => regs.acc = memory.read(addr, Some(pcb))?,
            Opcode::StoreAcc => memory.write(regs.acc, addr, Some(pcb))?,
            Opcode::AddWithCarry => {
                regs.acc = regs.acc.wrapping_add(memory.read(addr, Some(pcb))?);
            }
            Opcode::LoadXImmediate => regs.x = args[0],
            Opcode::LoadXDirect => regs.x = memory.read(addr, Some(pcb))?,
            Opcode::LoadYImmediate => regs.y = args[0],
            Opcode::LoadYDirect => regs.y = memory.read(addr, Some(pcb))?,
            Opcode::NoOp => {}
            Opcode::Break => return Ok(Some(SystemCall::Terminate)),
            Opcode::CompareX => regs.z = memory.read(addr, Some(pcb))? == regs.x,
            Opcode::BranchNotEqual => {
                if !regs.z {
                    let len = pcb.bounds.ok_or(mem::Error::NotResident)?.len();
                    regs.pc = (regs.pc + usize::from(args[0])) % len;
                }
            }
            Opcode::Increment => {
                let word = memory.read(addr, Some(pcb))?;
                memory.write(word.wrapping_add(1), addr, Some(pcb))?;
            }
            Opcode::SystemCall => {
                let syscall =
                    SystemCall::decode(regs.x, regs.y).ok_or(Fault::InvalidSystemCall(regs.x))?;
                return Ok(Some(syscall));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(image: &[Word]) -> (Cpu, MemoryManager, Pcb) {
        let mut memory = MemoryManager::new(768, 3);
        let mut pcb = Pcb::new(Pid::new(0), Pcb::DEFAULT_PRIORITY);
        memory.allocate(&mut pcb).unwrap();
        memory.load(&pcb, image).unwrap();
        let mut cpu = Cpu::default();
        cpu.start(&pcb);
        (cpu, memory, pcb)
    }

    fn run(cpu: &mut Cpu, memory: &mut MemoryManager, pcb: &mut Pcb, cycles: usize) {
        for _ in 0..cycles {
            assert_eq!(cpu.cycle(memory, pcb), Ok(None));
        }
    }

    #[test]
    fn load_and_store() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0xA9, 0x07, 0x8D, 0x10, 0x00, 0xAD, 0x10, 0x00]);
        run(&mut cpu, &mut memory, &mut pcb, 2);
        assert_eq!(memory.read(0x10, Some(&pcb)), Ok(0x07));

        run(&mut cpu, &mut memory, &mut pcb, 1);
        assert_eq!(cpu.registers().acc, 0x07);
        assert_eq!(pcb.registers, *cpu.registers());
        assert_eq!(pcb.registers.pc, 8);
    }

    #[test]
    fn little_endian_address() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0xAD, 0x01, 0x01]);
        assert_eq!(
            cpu.cycle(&mut memory, &mut pcb),
            Err(Fault::Memory(mem::Error::OutOfBounds(0x0101)))
        );

        let (mut cpu, mut memory, mut pcb) = loaded(&[0xAD, 0xFF, 0x00]);
        memory.write(0x5A, 0xFF, Some(&pcb)).unwrap();
        run(&mut cpu, &mut memory, &mut pcb, 1);
        assert_eq!(cpu.registers().acc, 0x5A);
    }

    #[test]
    fn add_wraps() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0xA9, 0xFF, 0x6D, 0x10, 0x00]);
        memory.write(0x02, 0x10, Some(&pcb)).unwrap();
        run(&mut cpu, &mut memory, &mut pcb, 2);
        assert_eq!(cpu.registers().acc, 0x01);
    }

    #[test]
    fn increment_wraps() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0xEE, 0x10, 0x00]);
        memory.write(0xFF, 0x10, Some(&pcb)).unwrap();
        run(&mut cpu, &mut memory, &mut pcb, 1);
        assert_eq!(memory.read(0x10, Some(&pcb)), Ok(0x00));
    }

    #[test]
    fn compare_and_branch() {
        // Loop until the counter at 0x20 reaches 3
        let program = [
            0xA2, 0x03, // LDX 3
            0xEE, 0x20, 0x00, // INC [0x20]
            0xEC, 0x20, 0x00, // CPX [0x20]
            0xD0, 0xF8, // BNE -8
            0x00,
        ];
        let (mut cpu, mut memory, mut pcb) = loaded(&program);

        let mut cycles = 0;
        while cpu.cycle(&mut memory, &mut pcb).unwrap().is_none() {
            cycles += 1;
        }
        assert_eq!(memory.read(0x20, Some(&pcb)), Ok(3));
        assert!(cpu.registers().z);
        assert_eq!(cycles, 1 + 3 * 3);
    }

    #[test]
    fn branch_wraps_in_partition() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0xD0, 0xFE]);
        run(&mut cpu, &mut memory, &mut pcb, 1);
        assert_eq!(pcb.registers.pc, 0);
    }

    #[test]
    fn pc_wraps_at_limit() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0xEA]);
        pcb.registers.pc = 256;
        cpu.start(&pcb);
        run(&mut cpu, &mut memory, &mut pcb, 1);
        assert_eq!(pcb.registers.pc, 1);
    }

    #[test]
    fn break_terminates() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0x00]);
        assert_eq!(
            cpu.cycle(&mut memory, &mut pcb),
            Ok(Some(SystemCall::Terminate))
        );
    }

    #[test]
    fn system_calls() {
        let (mut cpu, mut memory, mut pcb) =
            loaded(&[0xA2, 0x01, 0xA0, 0x2A, 0xFF, 0xA2, 0x02, 0xFF, 0xA2, 0x03, 0xFF]);
        run(&mut cpu, &mut memory, &mut pcb, 2);
        assert_eq!(
            cpu.cycle(&mut memory, &mut pcb),
            Ok(Some(SystemCall::PrintNumber(0x2A)))
        );
        run(&mut cpu, &mut memory, &mut pcb, 1);
        assert_eq!(
            cpu.cycle(&mut memory, &mut pcb),
            Ok(Some(SystemCall::PrintString(0x2A)))
        );
        run(&mut cpu, &mut memory, &mut pcb, 1);
        assert_eq!(
            cpu.cycle(&mut memory, &mut pcb),
            Err(Fault::InvalidSystemCall(3))
        );
    }

    #[test]
    fn invalid_instruction() {
        let (mut cpu, mut memory, mut pcb) = loaded(&[0xFA]);
        assert_eq!(
            cpu.cycle(&mut memory, &mut pcb),
            Err(Fault::InvalidInstruction(0xFA))
        );
        assert_eq!(cpu.stop(), Some(pcb.pid));
        assert!(!cpu.is_executing());
        assert_eq!(*cpu.registers(), Registers::default());
    }
}
