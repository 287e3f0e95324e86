use std::borrow::Cow;

use crate::{
    block::storage::Storage,
    kernel::{
        Kernel,
        console::Console,
        error::{Error, Result},
        interrupt::Interrupt,
    },
    mem::{self, Word},
    proc::Pid,
};

/// A request from a process to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCall {
    /// Ends the calling process.
    Terminate,
    /// Prints the Y register as a decimal number.
    PrintNumber(Word),
    /// Prints the zero-terminated string starting at the Y register.
    PrintString(Word),
}

impl SystemCall {
    /// Decodes the system call selected by the X register, with the Y register as argument.
    pub fn decode(x: Word, y: Word) -> Option<Self> {
        match x {
            1 => Some(Self::PrintNumber(y)),
            2 => Some(Self::PrintString(y)),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::Terminate => 0,
            Self::PrintNumber(_) => 1,
            Self::PrintString(_) => 2,
        }
    }
}

impl<S: Storage, C: Console> Kernel<S, C> {
    pub(super) fn system_call_isr(&mut self, pid: Pid, call: SystemCall) {
        log::debug!("System call {} from process {pid}", call.id());

        if !self.processes.contains(pid) {
            log::debug!("Process {pid} is gone, ignoring its system call");
            return;
        }

        let text = match call {
            SystemCall::Terminate => {
                self.terminate(pid);
                return;
            }
            SystemCall::PrintNumber(y) => y.to_string(),
            SystemCall::PrintString(y) => match self.read_string(pid, y) {
                Ok(text) => text,
                Err(Error::Memory(error)) => {
                    self.interrupts
                        .push_back(Interrupt::MemoryFault { pid, error });
                    return;
                }
                Err(err) => {
                    self.interrupts.push_back(Interrupt::DiskOperationFault {
                        message: err.to_string(),
                        pid: Some(pid),
                    });
                    return;
                }
            },
        };

        if let Some(pcb) = self.processes.get_mut(pid) {
            pcb.output.push_str(&text);
        }
        self.console.put_text(&text);
    }

    /// Reads the zero-terminated string at `location` in the image of `pid`,
    /// which may have been swapped out since the call was made.
    fn read_string(&self, pid: Pid, location: Word) -> Result<String> {
        let pcb = self.processes.get(pid).ok_or(Error::ProcessNotFound(pid))?;
        let image: Cow<[Word]> = if pcb.in_memory() {
            Cow::Borrowed(self.memory.image(pcb)?)
        } else {
            Cow::Owned(self.fs.read_file(&pcb.swap_file())?)
        };

        let mut text = String::new();
        for offset in usize::from(location).. {
            if offset >= self.memory.partition_size() {
                return Err(mem::Error::OutOfBounds(offset).into());
            }
            // Swapped images are stored without their trailing zeros
            let byte = image.get(offset).copied().unwrap_or(0);
            if byte == 0 {
                break;
            }
            text.push(char::from(byte));
        }
        Ok(text)
    }
}
