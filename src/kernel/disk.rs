use crate::{
    block::{storage::Storage, trim_fill},
    fs::{self, Response, dir::DirEntryName},
    kernel::{
        Kernel,
        console::{Console, Notification},
        error::{Error, Result},
        interrupt::Interrupt,
    },
    mem::Word,
    proc::{Pid, swap_file},
};

/// A request to the disk driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskOperation {
    Create(String),
    Read(String),
    Write(String, Vec<u8>),
    Delete(String),
    List,
    Format,
    /// Stores the image of a process that did not fit into memory.
    LoadProcess { pid: Pid, image: Vec<Word> },
    /// Drops the stored image of a process.
    UnloadProcess(Pid),
    /// Moves `outgoing` from memory to disk, then `incoming` from disk to memory.
    Swap { outgoing: Option<Pid>, incoming: Pid },
}

fn is_swap(name: &str) -> bool {
    DirEntryName::try_from(name).is_ok_and(|name| name.is_swap())
}

impl<S: Storage, C: Console> Kernel<S, C> {
    /// Performs a disk operation and reports the outcome on the console.
    /// Returns the response code, or `None` when the operation faulted.
    pub(super) fn disk_operation(&mut self, operation: DiskOperation) -> Option<Response> {
        match operation {
            DiskOperation::Create(name) => {
                if is_swap(&name) {
                    return self.refuse("File cannot be created", &name);
                }
                let res = self.fs.create_file(&name);
                self.respond(res, &name, "File created")
            }
            DiskOperation::Read(name) => match self.fs.read_file(&name) {
                Ok(data) => {
                    self.console
                        .handle_response(&String::from_utf8_lossy(&data));
                    Some(Response::Success)
                }
                Err(err) => self.respond(Err(err), &name, ""),
            },
            DiskOperation::Write(name, data) => {
                if is_swap(&name) {
                    return self.refuse("File cannot be modified", &name);
                }
                let res = self.fs.write_file(&name, &data);
                self.respond(res, &name, "File updated")
            }
            DiskOperation::Delete(name) => {
                if is_swap(&name) {
                    return self.refuse("File cannot be deleted", &name);
                }
                let res = self.fs.delete_file(&name);
                self.respond(res, &name, "File deleted")
            }
            DiskOperation::List => {
                let names: Vec<String> = self.fs.files().map(|name| name.to_string()).collect();
                if names.is_empty() {
                    self.console.handle_response("No files exist");
                }
                for name in names {
                    self.console.handle_response(&name);
                }
                Some(Response::Success)
            }
            DiskOperation::Format => self.format_disk(),
            DiskOperation::LoadProcess { pid, image } => {
                let res = self.load_image(pid, &image);
                self.kernel_response(res, Some(pid))
            }
            DiskOperation::UnloadProcess(pid) => {
                let res = self.unload_image(pid);
                self.kernel_response(res, None)
            }
            DiskOperation::Swap { outgoing, incoming } => {
                let res = self.swap(outgoing, incoming);
                // A refused swap faults neither process
                let pid = match &res {
                    Err(Error::ProcessRunning(_)) => None,
                    _ => Some(incoming),
                };
                self.kernel_response(res, pid)
            }
        }
    }

    fn format_disk(&mut self) -> Option<Response> {
        if self.processes.iter().any(|pcb| !pcb.in_memory()) {
            self.console
                .handle_response("Disk cannot be formatted while processes are stored on it");
            return Some(Response::InvalidData);
        }
        let res = self.fs.format();
        self.respond(res, "", "Disk formatted")
    }

    fn refuse(&mut self, message: &str, name: &str) -> Option<Response> {
        self.console.handle_response(&format!("{message}: {name}"));
        Some(Response::InvalidData)
    }

    /// Reports the outcome of a user-facing file operation.
    fn respond(&mut self, res: fs::Result<()>, name: &str, success: &str) -> Option<Response> {
        let response = Response::of(&res);
        match res {
            Ok(()) => {
                let message = if name.is_empty() {
                    success.to_owned()
                } else {
                    format!("{success}: {name}")
                };
                self.console.handle_response(&message);
                self.console.notify(Notification::DirectoryUpdated);
            }
            Err(err) if response.is_some() => {
                self.console.handle_response(&format!("{err}: {name}"));
            }
            Err(err) => {
                self.interrupts.push_back(Interrupt::DiskOperationFault {
                    message: format!("Disk operation failed: {err}"),
                    pid: None,
                });
            }
        }
        response
    }

    /// Reports the outcome of a kernel-initiated disk operation. Failures fault `pid`.
    fn kernel_response(&mut self, res: Result<()>, pid: Option<Pid>) -> Option<Response> {
        match res {
            Ok(()) => {
                self.console.notify(Notification::DirectoryUpdated);
                Some(Response::Success)
            }
            Err(err) => {
                let response = match &err {
                    Error::Storage(err) => err.response(),
                    _ => None,
                };
                self.interrupts.push_back(Interrupt::DiskOperationFault {
                    message: format!("Disk operation failed: {err}"),
                    pid,
                });
                response
            }
        }
    }

    /// Writes the image of `pid` into its swap file.
    pub(super) fn load_image(&mut self, pid: Pid, image: &[Word]) -> Result<()> {
        let name = swap_file(pid);
        self.fs.tx(|tx| {
            tx.create_file(&name)?;
            tx.write_file(&name, trim_fill(image))
        })?;
        log::info!("Process {pid} stored on disk");
        Ok(())
    }

    /// Deletes the swap file of `pid`.
    pub(super) fn unload_image(&mut self, pid: Pid) -> Result<()> {
        self.fs.delete_file(&swap_file(pid))?;
        Ok(())
    }

    /// Exchanges the residency of two processes as one unit of work.
    /// The disk steps run in a single transaction and memory is only touched once it commits.
    pub(super) fn swap(&mut self, outgoing: Option<Pid>, incoming: Pid) -> Result<()> {
        if !self.processes.contains(incoming) {
            return Err(Error::ProcessNotFound(incoming));
        }

        let outgoing = match outgoing {
            Some(pid) if self.cpu.current() == Some(pid) => {
                return Err(Error::ProcessRunning(pid));
            }
            Some(pid) => {
                let pcb = self.processes.get(pid).ok_or(Error::ProcessNotFound(pid))?;
                Some((pid, self.memory.image(pcb)?.to_vec()))
            }
            None if self.memory.available() == 0 => return Err(Error::InsufficientMemory),
            None => None,
        };

        let image = self.fs.tx(|tx| {
            let name = swap_file(incoming);
            let image = tx.read_file(&name)?;
            tx.delete_file(&name)?;

            if let Some((pid, image)) = &outgoing {
                let name = swap_file(*pid);
                tx.create_file(&name)?;
                tx.write_file(&name, trim_fill(image))?;
            }
            Ok(image)
        })?;

        if let Some((pid, _)) = outgoing {
            if let Some(pcb) = self.processes.get_mut(pid) {
                self.memory.deallocate(pcb)?;
            }
            log::info!("Process {pid} swapped out");
        }

        let pcb = self
            .processes
            .get_mut(incoming)
            .ok_or(Error::ProcessNotFound(incoming))?;
        self.memory
            .allocate(pcb)
            .ok_or(Error::InsufficientMemory)?;
        self.memory.load(pcb, &image)?;
        log::info!("Process {incoming} swapped in");
        Ok(())
    }
}
