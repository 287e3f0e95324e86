use std::{collections::VecDeque, fmt, num::NonZeroU64, str::FromStr};

use crate::proc::{Pid, ProcessState, ProcessTable};

/// The number of cycles a process runs under round robin before it is preempted.
pub const DEFAULT_QUANTUM: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    RoundRobin,
    FirstComeFirstServe,
    Priority,
}

impl Policy {
    /// Returns the quantum a freshly selected policy starts with.
    fn default_quantum(&self) -> u64 {
        match self {
            Self::RoundRobin => DEFAULT_QUANTUM,
            Self::FirstComeFirstServe | Self::Priority => u64::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePolicyError(String);

impl fmt::Display for ParsePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid scheduling algorithm: {}", self.0)
    }
}

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rr" => Ok(Self::RoundRobin),
            "fcfs" => Ok(Self::FirstComeFirstServe),
            "priority" => Ok(Self::Priority),
            _ => Err(ParsePolicyError(s.to_owned())),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RoundRobin => "rr",
            Self::FirstComeFirstServe => "fcfs",
            Self::Priority => "priority",
        })
    }
}

/// Why the previous process left the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    /// Its quantum ran out. It is waiting at the tail of the ready queue.
    Preempted(Pid),
    /// It terminated and must be reaped.
    Terminated(Pid),
}

/// A context switch decided by [Scheduler::schedule].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub outgoing: Option<Outgoing>,
    pub incoming: Option<Pid>,
}

/// Keeps the ready queue and decides which process runs next.
#[derive(Debug, Clone)]
pub struct Scheduler {
    ready: VecDeque<Pid>,
    current: Option<Pid>,
    policy: Policy,
    quantum: u64,
    elapsed: u64,
}

impl Scheduler {
    /// Constructs a scheduler. `quantum` only applies to round robin.
    pub fn new(policy: Policy, quantum: NonZeroU64) -> Self {
        let quantum = match policy {
            Policy::RoundRobin => quantum.get(),
            _ => policy.default_quantum(),
        };
        Self {
            ready: VecDeque::new(),
            current: None,
            policy,
            quantum,
            elapsed: 0,
        }
    }

    /// Places `pid` at the tail of the ready queue.
    pub fn enqueue(&mut self, pid: Pid) {
        self.ready.push_back(pid);
    }

    /// Removes `pid` from the ready queue. Returns whether it was queued.
    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.ready.iter().position(|&queued| queued == pid) {
            Some(idx) => {
                self.ready.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Counts one instruction cycle against the quantum of the current process.
    pub fn tick(&mut self) {
        self.elapsed = self.elapsed.saturating_add(1);
    }

    /// Decides whether the current process should leave the CPU and which process replaces it.
    /// Returns `None` when nothing changes.
    pub fn schedule(&mut self, table: &mut ProcessTable) -> Option<Switch> {
        let Some(pid) = self.current else {
            let incoming = self.dispatch(table)?;
            return Some(Switch {
                outgoing: None,
                incoming: Some(incoming),
            });
        };

        let terminated = table
            .get(pid)
            .is_none_or(|pcb| pcb.state == ProcessState::Terminated);
        if terminated {
            self.current = None;
            self.elapsed = 0;
            let incoming = self.dispatch(table);
            log::debug!("Process {pid} terminated, dispatching {incoming:?}");
            return Some(Switch {
                outgoing: Some(Outgoing::Terminated(pid)),
                incoming,
            });
        }

        if self.elapsed < self.quantum {
            return None;
        }

        self.elapsed = 0;
        if self.ready.is_empty() {
            // Nobody to hand over to, let it run another quantum
            return None;
        }

        if let Some(pcb) = table.get_mut(pid) {
            pcb.state = ProcessState::Waiting;
        }
        self.ready.push_back(pid);
        self.current = None;

        let incoming = self.dispatch(table);
        log::debug!("Process {pid} preempted, dispatching {incoming:?}");
        Some(Switch {
            outgoing: Some(Outgoing::Preempted(pid)),
            incoming,
        })
    }

    /// Takes the next live process off the ready queue and makes it current.
    fn dispatch(&mut self, table: &mut ProcessTable) -> Option<Pid> {
        loop {
            let pid = self.next_process(table)?;
            let Some(pcb) = table.get_mut(pid) else {
                continue;
            };
            if !pcb.state.is_live() {
                continue;
            }

            pcb.state = ProcessState::Running;
            self.current = Some(pid);
            self.elapsed = 0;
            return Some(pid);
        }
    }

    /// Removes and returns the process that should run next, leaving the others in order.
    pub fn next_process(&mut self, table: &ProcessTable) -> Option<Pid> {
        match self.policy {
            Policy::RoundRobin | Policy::FirstComeFirstServe => self.ready.pop_front(),
            Policy::Priority => {
                let (idx, _) = self
                    .ready
                    .iter()
                    .enumerate()
                    .min_by_key(|&(_, pid)| table.get(*pid).map_or(i32::MAX, |pcb| pcb.priority))?;
                self.ready.remove(idx)
            }
        }
    }

    /// Switches the policy, resetting the quantum to the policy default.
    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
        self.quantum = policy.default_quantum();
        log::info!("Scheduling algorithm set to {policy}");
    }

    /// Sets the quantum. Only round robin preempts on a quantum, so other policies ignore it.
    /// Returns whether the quantum was applied.
    pub fn set_quantum(&mut self, quantum: NonZeroU64) -> bool {
        if self.policy != Policy::RoundRobin {
            log::warn!("Quantum has no effect under {}", self.policy);
            return false;
        }
        self.quantum = quantum.get();
        true
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// Returns the number of cycles the current process has run since it was dispatched.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Iterates the ready queue from head to tail.
    pub fn ready(&self) -> impl Iterator<Item = Pid> {
        self.ready.iter().copied()
    }

    /// Checks whether no process is running or waiting to run.
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.ready.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        let quantum = NonZeroU64::new(DEFAULT_QUANTUM).expect("default quantum is non-zero");
        Self::new(Policy::default(), quantum)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn with_priorities(priorities: &[i32]) -> (Scheduler, ProcessTable, Vec<Pid>) {
        let mut scheduler = Scheduler::default();
        let mut table = ProcessTable::default();
        let pids: Vec<_> = priorities
            .iter()
            .map(|&priority| {
                let pid = table.create(priority);
                scheduler.enqueue(pid);
                pid
            })
            .collect();
        (scheduler, table, pids)
    }

    #[test]
    fn priority_selection() {
        let (mut scheduler, table, pids) = with_priorities(&[5, 1, 3]);
        scheduler.set_policy(Policy::Priority);

        assert_eq!(scheduler.next_process(&table), Some(pids[1]));
        assert_eq!(scheduler.ready().collect::<Vec<_>>(), vec![pids[0], pids[2]]);
    }

    #[test]
    fn priority_tie_first_seen() {
        let (mut scheduler, table, pids) = with_priorities(&[4, 2, 2]);
        scheduler.set_policy(Policy::Priority);
        assert_eq!(scheduler.next_process(&table), Some(pids[1]));
    }

    #[test]
    fn round_robin_preempts_in_order() {
        let (mut scheduler, mut table, pids) = with_priorities(&[0, 0, 0]);
        let mut order = Vec::new();

        for _ in 0..6 * 6 {
            if let Some(switch) = scheduler.schedule(&mut table) {
                order.extend(switch.incoming);
            }
            scheduler.tick();
        }

        let expected: Vec<_> = pids.iter().cycle().take(order.len()).copied().collect();
        assert_eq!(order, expected);
        assert_eq!(order.len(), 6);
    }

    #[test]
    fn preemption_every_quantum() {
        let (mut scheduler, mut table, pids) = with_priorities(&[0, 0]);
        assert_eq!(
            scheduler.schedule(&mut table),
            Some(Switch {
                outgoing: None,
                incoming: Some(pids[0])
            })
        );

        for _ in 0..DEFAULT_QUANTUM - 1 {
            scheduler.tick();
            assert_eq!(scheduler.schedule(&mut table), None);
        }
        scheduler.tick();

        assert_eq!(
            scheduler.schedule(&mut table),
            Some(Switch {
                outgoing: Some(Outgoing::Preempted(pids[0])),
                incoming: Some(pids[1])
            })
        );
        assert_eq!(table.get(pids[0]).unwrap().state, ProcessState::Waiting);
        assert_eq!(table.get(pids[1]).unwrap().state, ProcessState::Running);
    }

    #[test]
    fn lone_process_keeps_running() {
        let (mut scheduler, mut table, pids) = with_priorities(&[0]);
        scheduler.schedule(&mut table);
        for _ in 0..DEFAULT_QUANTUM * 3 {
            scheduler.tick();
            assert_eq!(scheduler.schedule(&mut table), None);
        }
        assert_eq!(scheduler.current(), Some(pids[0]));
    }

    #[test]
    fn fcfs_never_preempts() {
        let (mut scheduler, mut table, pids) = with_priorities(&[0, 0]);
        scheduler.set_policy(Policy::FirstComeFirstServe);
        scheduler.schedule(&mut table);
        for _ in 0..1000 {
            scheduler.tick();
            assert_eq!(scheduler.schedule(&mut table), None);
        }
        assert_eq!(scheduler.current(), Some(pids[0]));
    }

    #[test]
    fn terminated_is_reaped() {
        let (mut scheduler, mut table, pids) = with_priorities(&[0, 0]);
        scheduler.schedule(&mut table);
        table.get_mut(pids[0]).unwrap().state = ProcessState::Terminated;

        assert_eq!(
            scheduler.schedule(&mut table),
            Some(Switch {
                outgoing: Some(Outgoing::Terminated(pids[0])),
                incoming: Some(pids[1])
            })
        );
        assert_eq!(scheduler.elapsed(), 0);
    }

    #[test]
    fn policy_resets_quantum() {
        let mut scheduler = Scheduler::default();
        assert!(scheduler.set_quantum(NonZeroU64::new(2).unwrap()));
        assert_eq!(scheduler.quantum(), 2);

        scheduler.set_policy(Policy::Priority);
        assert_eq!(scheduler.quantum(), u64::MAX);
        assert!(!scheduler.set_quantum(NonZeroU64::new(2).unwrap()));

        scheduler.set_policy(Policy::RoundRobin);
        assert_eq!(scheduler.quantum(), DEFAULT_QUANTUM);
    }

    #[test]
    fn parse_policy() {
        assert_eq!("RR".parse(), Ok(Policy::RoundRobin));
        assert_eq!("fcfs".parse(), Ok(Policy::FirstComeFirstServe));
        assert_eq!("priority".parse(), Ok(Policy::Priority));
        assert!("sjf".parse::<Policy>().is_err());
    }

    proptest! {
        #[test]
        fn priority_picks_stable_minimum(priorities in prop::collection::vec(-5i32..5, 1..10)) {
            let (mut scheduler, table, pids) = with_priorities(&priorities);
            scheduler.set_policy(Policy::Priority);

            let min = *priorities.iter().min().unwrap();
            let idx = priorities.iter().position(|&p| p == min).unwrap();
            prop_assert_eq!(scheduler.next_process(&table), Some(pids[idx]));

            let mut rest = pids.clone();
            rest.remove(idx);
            prop_assert_eq!(scheduler.ready().collect::<Vec<_>>(), rest);
        }
    }
}
