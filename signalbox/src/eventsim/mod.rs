//! Time-ordered event queue, the simulation clock built on it, and
//! notification delivery.

pub mod clock;
pub mod notify;

use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
pub struct QueuedEvent<E> {
    pub time: OrderedFloat<f64>,
    pub id: usize,
    pub event: E,
}

impl<E> PartialEq for QueuedEvent<E> {
    fn eq(&self, other: &QueuedEvent<E>) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl<E> Eq for QueuedEvent<E> {}

impl<E> Ord for QueuedEvent<E> {
    fn cmp(&self, other: &QueuedEvent<E>) -> Ordering {
        // Note that the order is flipped on purpose -- to turn
        // the (maximum) BinaryHeap into a minimum heap.
        other.time.cmp(&self.time).
            then_with(|| other.id.cmp(&self.id))
    }
}

impl<E> PartialOrd for QueuedEvent<E> {
    fn partial_cmp(&self, other: &QueuedEvent<E>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Events scheduled on a time line that only moves when the owner advances
/// it. Events at the same time come out in the order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<E> {
    time: OrderedFloat<f64>,
    queue: BinaryHeap<QueuedEvent<E>>,
    id_counter: usize,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Scheduler {
            time: OrderedFloat(0.0),
            queue: BinaryHeap::new(),
            id_counter: 0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time.0
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedules `event` at `dt` after the current time. Negative delays are
    /// treated as zero, infinite ones never happen.
    pub fn schedule(&mut self, event: E, dt: f64) {
        if dt.is_infinite() { return; }
        let qe = QueuedEvent {
            time: OrderedFloat(self.time.0 + dt.max(0.0)),
            id: self.id_counter,
            event,
        };
        self.id_counter += 1;
        self.queue.push(qe);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Pops the next event if it is due at or before `target`, moving the
    /// current time to the event's time.
    pub fn pop_until(&mut self, target: f64) -> Option<(f64, E)> {
        match self.queue.peek() {
            Some(ev) if ev.time.0 <= target => {}
            _ => return None,
        }
        self.queue.pop().map(|ev| {
            self.time = ev.time;
            (ev.time.0, ev.event)
        })
    }

    pub fn advance_to(&mut self, target: f64) {
        if target > self.time.0 {
            self.time = OrderedFloat(target);
        }
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Scheduler::new()
    }
}

#[test]
fn test_ordering() {
    let mut p = BinaryHeap::new();
    p.push(QueuedEvent { time: OrderedFloat(123.0), id: 0, event: () });
    p.push(QueuedEvent { time: OrderedFloat(0.0), id: 1, event: () });
    p.push(QueuedEvent { time: OrderedFloat(122.0), id: 2, event: () });
    assert_eq!(p.pop().unwrap().time.0, 0.0);
    assert_eq!(p.pop().unwrap().time.0, 122.0);
    assert_eq!(p.pop().unwrap().time.0, 123.0);
}

#[test]
fn test_pop_until() {
    let mut s = Scheduler::new();
    s.schedule("b", 10.0);
    s.schedule("a", 5.0);
    s.schedule("c", 10.0);
    assert_eq!(s.pop_until(4.0), None);
    assert_eq!(s.pop_until(10.0), Some((5.0, "a")));
    assert_eq!(s.time(), 5.0);
    assert_eq!(s.pop_until(10.0), Some((10.0, "b")));
    assert_eq!(s.pop_until(10.0), Some((10.0, "c")));
    assert_eq!(s.pop_until(10.0), None);
    s.advance_to(12.0);
    s.schedule("d", 1.0);
    assert_eq!(s.pop_until(20.0), Some((13.0, "d")));
}
