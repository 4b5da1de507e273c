// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::trace;

use super::command::Command;

/// A command waiting in the [`CommandQueue`].
#[derive(Debug)]
pub struct QueuedCommand {
    /// Arrival number, unique for the lifetime of the queue.
    pub ticket: u64,
    pub priority: i32,
    pub command: Command,
}

/// Priority-ordered queue of pending commands.
///
/// Semantics:
/// - Higher priority is dequeued first.
/// - Equal priorities keep arrival order (a new command is inserted in front
///   of the first entry with a strictly lower priority).
/// - Every pushed command gets a ticket so callers can wait for "their"
///   command while others run ahead of it.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<QueuedCommand>,
    next_ticket: u64,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue a command and return its ticket.
    pub fn push(&mut self, command: Command) -> u64 {
        let priority = command.priority();
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let position = self
            .entries
            .iter()
            .position(|entry| entry.priority < priority)
            .unwrap_or(self.entries.len());

        trace!(
            ticket,
            priority,
            position,
            command = command.name(),
            "command queued"
        );

        self.entries.insert(
            position,
            QueuedCommand {
                ticket,
                priority,
                command,
            },
        );
        ticket
    }

    pub fn pop(&mut self) -> Option<QueuedCommand> {
        self.entries.pop_front()
    }

    /// Pop the head only if its priority is at least `priority`.
    pub fn pop_at_least(&mut self, priority: i32) -> Option<QueuedCommand> {
        match self.entries.front() {
            Some(entry) if entry.priority >= priority => self.entries.pop_front(),
            _ => None,
        }
    }

    /// Remove a specific command by ticket.
    pub fn remove(&mut self, ticket: u64) -> Option<QueuedCommand> {
        let index = self.entries.iter().position(|e| e.ticket == ticket)?;
        self.entries.remove(index)
    }

    /// Drop everything; returns how many commands were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }

    /// Set the current entries aside, leaving the queue empty.
    pub(crate) fn take(&mut self) -> VecDeque<QueuedCommand> {
        std::mem::take(&mut self.entries)
    }

    /// Put entries set aside by [`CommandQueue::take`] back.
    ///
    /// Anything queued in between is discarded; returns how many were dropped.
    pub(crate) fn restore(&mut self, entries: VecDeque<QueuedCommand>) -> usize {
        let leftovers = std::mem::replace(&mut self.entries, entries);
        leftovers.len()
    }

    /// Priorities in dequeue order.
    pub fn priorities(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.priority).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(priority: i32) -> Command {
        Command::callback(priority, |_| Ok(()))
    }

    #[test]
    fn higher_priority_first_and_ties_keep_arrival_order() {
        let mut queue = CommandQueue::new();
        let a = queue.push(noop(10));
        let b = queue.push(noop(1000));
        let c = queue.push(noop(1000));
        let d = queue.push(noop(-5));

        assert_eq!(queue.priorities(), vec![1000, 1000, 10, -5]);
        let order: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|e| e.ticket).collect();
        assert_eq!(order, vec![b, c, a, d]);
    }

    #[test]
    fn pop_at_least_stops_at_lower_priorities() {
        let mut queue = CommandQueue::new();
        queue.push(noop(1050));
        queue.push(noop(1000));
        queue.push(noop(10));

        assert!(queue.pop_at_least(1000).is_some());
        assert!(queue.pop_at_least(1000).is_some());
        assert!(queue.pop_at_least(1000).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn take_and_restore_isolate_the_outer_queue() {
        let mut queue = CommandQueue::new();
        queue.push(noop(1));
        queue.push(noop(2));

        let outer = queue.take();
        assert!(queue.is_empty());
        queue.push(noop(3));

        assert_eq!(queue.restore(outer), 1);
        assert_eq!(queue.priorities(), vec![2, 1]);
    }

    #[test]
    fn remove_and_clear() {
        let mut queue = CommandQueue::new();
        let first = queue.push(noop(5));
        queue.push(noop(5));

        assert_eq!(queue.remove(first).map(|e| e.ticket), Some(first));
        assert!(queue.remove(first).is_none());
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
    }
}
