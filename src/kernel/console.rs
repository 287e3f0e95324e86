use std::collections::VecDeque;

use crate::proc::Pid;

/// Events the display side may want to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    ProcessTerminated(Pid),
    DirectoryUpdated,
}

/// The text console the machine prints to.
pub trait Console {
    /// Prints `text` at the cursor.
    fn put_text(&mut self, text: &str);

    /// Moves the cursor to the start of the next line.
    fn advance_line(&mut self);

    /// Prints a complete response line.
    fn handle_response(&mut self, response: &str) {
        self.put_text(response);
        self.advance_line();
    }

    /// Consumes buffered keyboard input.
    fn handle_input(&mut self, input: &mut VecDeque<char>);

    fn notify(&mut self, _notification: Notification) {}
}

/// A [Console] that records everything in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    pub output: String,
    pub input: String,
    pub notifications: Vec<Notification>,
}

impl BufferConsole {
    /// Returns the printed lines.
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }
}

impl Console for BufferConsole {
    fn put_text(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn advance_line(&mut self) {
        self.output.push('\n');
    }

    fn handle_input(&mut self, input: &mut VecDeque<char>) {
        self.input.extend(input.drain(..));
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}
