use std::{
    collections::VecDeque,
    io::{self, Write},
    num::NonZeroU64,
};

use svegos::{
    config::Config,
    kernel::{Kernel, console::Console},
    proc::{Pcb, scheduler::Policy},
};

const DEFAULT_MAX_TICKS: u64 = 100_000;

fn usage() -> ! {
    eprintln!("svegos [--schedule rr|fcfs|priority] [--quantum N] [--max-ticks N] PROGRAM[@PRIORITY]...");
    std::process::exit(1);
}

/// Prints the machine console to stdout.
#[derive(Default)]
struct StdoutConsole {
    line_open: bool,
}

impl Console for StdoutConsole {
    fn put_text(&mut self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
        self.line_open |= !text.is_empty();
    }

    fn advance_line(&mut self) {
        println!();
        self.line_open = false;
    }

    fn handle_input(&mut self, input: &mut VecDeque<char>) {
        let text: String = input.drain(..).collect();
        self.put_text(&text);
    }
}

/// Splits `path@priority` into its parts.
fn parse_program_arg(arg: &str) -> Option<(&str, i32)> {
    match arg.rsplit_once('@') {
        Some((path, priority)) => Some((path, priority.parse().ok()?)),
        None => Some((arg, Pcb::DEFAULT_PRIORITY)),
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => {
            eprintln!("svegos: {flag} needs a value");
            usage();
        }
    }
}

fn main() {
    env_logger::init();

    let mut config = Config::default();
    let mut max_ticks = DEFAULT_MAX_TICKS;
    let mut programs = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schedule" => match value(&mut args, &arg).parse::<Policy>() {
                Ok(policy) => config.policy = policy,
                Err(e) => {
                    eprintln!("svegos: {e}");
                    usage();
                }
            },
            "--quantum" => match value(&mut args, &arg).parse::<NonZeroU64>() {
                Ok(quantum) => config.quantum = quantum,
                Err(_) => {
                    eprintln!("svegos: quantum must be a positive number");
                    usage();
                }
            },
            "--max-ticks" => match value(&mut args, &arg).parse() {
                Ok(ticks) => max_ticks = ticks,
                Err(_) => {
                    eprintln!("svegos: max ticks must be a number");
                    usage();
                }
            },
            flag if flag.starts_with("--") => {
                eprintln!("svegos: unknown option {flag}");
                usage();
            }
            program => programs.push(program.to_owned()),
        }
    }

    if programs.is_empty() {
        eprintln!("svegos: no program specified");
        usage();
    }

    let mut kernel = match Kernel::boot(&config, StdoutConsole::default()) {
        Ok(kernel) => kernel,
        Err(e) => {
            eprintln!("svegos: failed to boot: {e}");
            std::process::exit(1);
        }
    };

    for arg in &programs {
        let Some((path, priority)) = parse_program_arg(arg) else {
            eprintln!("svegos: invalid priority in {arg}");
            usage();
        };

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("svegos: failed to read program {path}: {e}");
                std::process::exit(1);
            }
        };

        if let Err(e) = kernel.load(&text, priority) {
            eprintln!("svegos: failed to load program {path}: {e}");
            std::process::exit(1);
        }
    }

    kernel.execute_all();
    let res = kernel.run(max_ticks);

    if kernel.console().line_open {
        kernel.console_mut().advance_line();
    }

    match res {
        Ok(true) => log::info!("Machine idle after {} ticks", kernel.clock()),
        Ok(false) => {
            eprintln!("svegos: still running after {max_ticks} ticks");
            std::process::exit(1);
        }
        Err(trap) => {
            eprintln!("svegos: halted: {trap}");
            std::process::exit(1);
        }
    }
}
