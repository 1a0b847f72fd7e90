//! Deadline-ordered deferred tasks.
//!
//! `Scheduler` keeps a min-heap of `(deadline, sequence)` entries, with each
//! task keyed by the stream that scheduled it so a terminated stream can
//! withdraw its pending work. Cancelled entries are dropped from the heap
//! lazily. Time is expressed in epoch milliseconds supplied by a [`Clock`].

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    hash::Hash,
    time::{SystemTime, UNIX_EPOCH},
};

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send {
    fn now_millis(&self) -> u64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    deadline: u64,
    sequence: u64,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: `BinaryHeap` is a max-heap and the earliest deadline must
        // surface first, ties broken by scheduling order.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// Pending tasks ordered by deadline.
///
/// # Examples
///
/// ```
/// use http_push::Scheduler;
///
/// let mut scheduler = Scheduler::new();
/// scheduler.schedule(2_000, "stream-a", "late");
/// scheduler.schedule(1_000, "stream-b", "early");
/// assert_eq!(scheduler.next_deadline(), Some(1_000));
/// assert_eq!(scheduler.pop_expired(1_500), vec!["early"]);
/// assert_eq!(scheduler.cancel(&"stream-a"), vec!["late"]);
/// assert!(scheduler.is_empty());
/// ```
#[derive(Debug)]
pub struct Scheduler<K, T> {
    heap: BinaryHeap<HeapEntry>,
    tasks: HashMap<u64, (K, T)>,
    next_sequence: u64,
}

impl<K, T> Default for Scheduler<K, T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            tasks: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl<K: Eq + Hash, T> Scheduler<K, T> {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Run `task` at or after `deadline` on behalf of `owner`.
    pub fn schedule(&mut self, deadline: u64, owner: K, task: T) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(HeapEntry { deadline, sequence });
        self.tasks.insert(sequence, (owner, task));
    }

    /// Withdraw every pending task of `owner`, returning them in scheduling order.
    pub fn cancel(&mut self, owner: &K) -> Vec<T> {
        let mut sequences: Vec<u64> = self
            .tasks
            .iter()
            .filter(|(_, (key, _))| key == owner)
            .map(|(sequence, _)| *sequence)
            .collect();
        sequences.sort_unstable();
        sequences
            .into_iter()
            .filter_map(|sequence| self.tasks.remove(&sequence))
            .map(|(_, task)| task)
            .collect()
    }

    /// Remove and return every task whose deadline is `<= now`, earliest first.
    pub fn pop_expired(&mut self, now: u64) -> Vec<T> {
        let mut expired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let sequence = entry.sequence;
            self.heap.pop();
            if let Some((_, task)) = self.tasks.remove(&sequence) {
                expired.push(task);
            }
        }
        expired
    }

    /// Earliest deadline among live tasks.
    pub fn next_deadline(&mut self) -> Option<u64> {
        while let Some(entry) = self.heap.peek() {
            if self.tasks.contains_key(&entry.sequence) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Returns `true` if `owner` has a pending task.
    #[must_use]
    pub fn has_pending(&self, owner: &K) -> bool { self.tasks.values().any(|(key, _)| key == owner) }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize { self.tasks.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.tasks.is_empty() }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn expired_tasks_come_out_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(300, 1, "c");
        scheduler.schedule(100, 2, "a");
        scheduler.schedule(200, 3, "b");
        assert_eq!(scheduler.pop_expired(250), ["a", "b"]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pop_expired(300), ["c"]);
    }

    #[test]
    fn equal_deadlines_keep_scheduling_order() {
        let mut scheduler = Scheduler::new();
        for (owner, task) in ["first", "second", "third"].into_iter().enumerate() {
            scheduler.schedule(50, owner, task);
        }
        assert_eq!(scheduler.pop_expired(50), ["first", "second", "third"]);
    }

    #[rstest]
    #[case::before(999, 0)]
    #[case::at(1_000, 1)]
    #[case::after(1_001, 1)]
    fn fires_at_or_after_deadline(#[case] now: u64, #[case] fired: usize) {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(1_000, (), ());
        assert_eq!(scheduler.pop_expired(now).len(), fired);
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(10, "a", 1);
        scheduler.schedule(20, "b", 2);
        scheduler.schedule(30, "a", 3);
        assert!(scheduler.has_pending(&"a"));
        assert_eq!(scheduler.cancel(&"a"), [1, 3]);
        assert!(!scheduler.has_pending(&"a"));
        assert_eq!(scheduler.next_deadline(), Some(20));
        assert_eq!(scheduler.pop_expired(u64::MAX), [2]);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn cancelling_unknown_owner_is_a_no_op() {
        let mut scheduler: Scheduler<&str, u8> = Scheduler::new();
        scheduler.schedule(5, "a", 1);
        assert!(scheduler.cancel(&"missing").is_empty());
        assert_eq!(scheduler.len(), 1);
    }
}
