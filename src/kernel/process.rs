use crate::{
    block::storage::Storage,
    kernel::{
        Kernel,
        console::{Console, Notification},
        error::{Error, Result},
        interrupt::Interrupt,
    },
    mem::Word,
    proc::{Pcb, Pid, ProcessState},
};

/// Parses whitespace separated hex text into a program image.
/// Digits are case-insensitive and a token may hold several bytes.
pub fn parse_program(text: &str) -> Result<Vec<Word>> {
    let mut image = Vec::new();
    for token in text.split_whitespace() {
        if !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidProgram(format!("Invalid character: {token}")));
        }
        if token.len() % 2 != 0 {
            return Err(Error::InvalidProgram(format!("Incomplete byte: {token}")));
        }
        // Every digit is ASCII, so byte offsets are char boundaries
        for offset in (0..token.len()).step_by(2) {
            let byte = Word::from_str_radix(&token[offset..offset + 2], 16)
                .map_err(|_| Error::InvalidProgram(format!("Invalid character: {token}")))?;
            image.push(byte);
        }
    }

    if image.is_empty() {
        return Err(Error::InvalidProgram("No program was specified".to_owned()));
    }
    Ok(image)
}

impl<S: Storage, C: Console> Kernel<S, C> {
    /// Loads a program into a fresh partition, or onto the disk when memory is full.
    pub fn load(&mut self, program: &str, priority: i32) -> Result<Pid> {
        match self.try_load(program, priority) {
            Ok(pid) => Ok(pid),
            Err(err) => {
                self.load_fault(&err.to_string());
                Err(err)
            }
        }
    }

    fn try_load(&mut self, program: &str, priority: i32) -> Result<Pid> {
        let image = parse_program(program)?;
        if image.len() > self.memory.partition_size() {
            return Err(crate::mem::Error::ImageTooLarge(image.len()).into());
        }

        let pid = self.processes.create(priority);
        let pcb = self
            .processes
            .get_mut(pid)
            .ok_or(Error::ProcessNotFound(pid))?;

        if self.memory.allocate(pcb).is_some() {
            self.memory.load(pcb, &image)?;
            log::info!("Process {pid} loaded into memory");
        } else if let Err(err) = self.load_image(pid, &image) {
            self.processes.remove(pid);
            return Err(err);
        }
        Ok(pid)
    }

    /// Marks a loaded process ready and asks for it to be queued.
    pub fn execute(&mut self, pid: Pid) -> Result<()> {
        let pcb = self
            .processes
            .get_mut(pid)
            .ok_or(Error::ProcessNotFound(pid))?;
        if pcb.state != ProcessState::New {
            return Err(Error::ProcessNotNew(pid));
        }
        pcb.state = ProcessState::Ready;
        self.interrupts.push_back(Interrupt::ProcessExecution(pid));
        Ok(())
    }

    /// Executes every loaded process that has not been executed yet, in load order.
    pub fn execute_all(&mut self) -> Vec<Pid> {
        let pids: Vec<Pid> = self
            .processes
            .iter()
            .filter(|pcb| pcb.state == ProcessState::New)
            .map(|pcb| pcb.pid)
            .collect();
        for &pid in &pids {
            let _ = self.execute(pid);
        }
        pids
    }

    /// Terminates a live process.
    pub fn kill(&mut self, pid: Pid) -> Result<()> {
        if !self.processes.contains(pid) {
            return Err(Error::ProcessNotFound(pid));
        }
        self.terminate(pid);
        Ok(())
    }

    /// Stops a process and releases its memory or swap file right away.
    pub fn unload(&mut self, pid: Pid) -> Result<()> {
        let pcb = self
            .processes
            .get_mut(pid)
            .ok_or(Error::ProcessNotFound(pid))?;
        pcb.state = ProcessState::Terminated;

        if self.cpu.current() == Some(pid) {
            self.cpu.stop();
        }
        self.scheduler.remove(pid);
        self.reap(pid);
        Ok(())
    }

    /// Iterates every process known to the kernel.
    pub fn processes(&self) -> impl Iterator<Item = &Pcb> {
        self.processes.iter()
    }

    /// Marks `pid` terminated. The running process is reaped by the scheduler on this tick,
    /// any other process right away.
    pub(super) fn terminate(&mut self, pid: Pid) {
        let Some(pcb) = self.processes.get_mut(pid) else {
            return;
        };
        pcb.state = ProcessState::Terminated;
        log::info!("Process {pid} terminated");

        if self.scheduler.current() == Some(pid) {
            if self.cpu.current() == Some(pid) {
                self.cpu.stop();
            }
        } else {
            self.scheduler.remove(pid);
            self.reap(pid);
        }
    }

    /// Removes a terminated process and releases its resources.
    pub(super) fn reap(&mut self, pid: Pid) {
        let Some(mut pcb) = self.processes.remove(pid) else {
            return;
        };

        let res = if pcb.in_memory() {
            self.memory.deallocate(&mut pcb).map_err(Error::from)
        } else {
            self.unload_image(pid)
        };
        if let Err(err) = res {
            self.interrupts.push_back(Interrupt::DiskOperationFault {
                message: format!("Failed to release process {pid}: {err}"),
                pid: None,
            });
        }

        log::debug!("Process {pid} reaped");
        self.console.notify(Notification::ProcessTerminated(pid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(
            parse_program("A9 02 a2 01\n ff 00").unwrap(),
            vec![0xA9, 0x02, 0xA2, 0x01, 0xFF, 0x00]
        );
        assert_eq!(parse_program("a902ff").unwrap(), vec![0xA9, 0x02, 0xFF]);
    }

    #[test]
    fn parse_rejects() {
        assert_eq!(
            parse_program("   "),
            Err(Error::InvalidProgram("No program was specified".to_owned()))
        );
        assert_eq!(
            parse_program("a9 0g"),
            Err(Error::InvalidProgram("Invalid character: 0g".to_owned()))
        );
        assert_eq!(
            parse_program("a9 0"),
            Err(Error::InvalidProgram("Incomplete byte: 0".to_owned()))
        );
    }
}
