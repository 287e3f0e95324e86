pub mod block;
pub mod config;
pub mod cpu;
pub mod fs;
pub mod kernel;
pub mod mem;
pub mod proc;
