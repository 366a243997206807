use super::clock::SimTime;
use crate::railway::infrastructure::ElementId;
use crate::railway::route::RouteId;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// The route could not be set because an active route shares track with it.
    ConflictingRoute(RouteId),
    NoRouteBetweenSignals(ElementId, ElementId),
    TimeChanged(SimTime),
    /// Simulated seconds elapsed during the last tick.
    TimeElapsed(f64),
    TrainStatusChanged(usize),
    SelectionChanged,
    RouteActivated(RouteId),
    RouteDeactivated(RouteId),
}

pub type Listener = Box<dyn FnMut(&Notification)>;
pub type ListenerId = usize;

/// Fans notifications out to the registered listeners, in registration order.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(ListenerId, Listener)>,
    id_counter: ListenerId,
}

impl Notifier {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        let id = self.id_counter;
        self.id_counter += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let len = self.listeners.len();
        self.listeners.retain(|(x, _)| *x != id);
        self.listeners.len() != len
    }

    pub fn emit(&mut self, n: Notification) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&n);
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Notifier {{ listeners: {} }}", self.listeners.len())
    }
}

/// Subscribes a listener that keeps every notification it receives.
#[cfg(test)]
pub fn recorder(notifier: &mut Notifier) -> std::rc::Rc<std::cell::RefCell<Vec<Notification>>> {
    use std::cell::RefCell;
    use std::rc::Rc;
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    notifier.subscribe(Box::new(move |n| l.borrow_mut().push(n.clone())));
    log
}

#[test]
fn test_subscribe_unsubscribe() {
    let mut n = Notifier::new();
    let a = recorder(&mut n);
    let b = recorder(&mut n);
    n.emit(Notification::SelectionChanged);
    assert!(n.unsubscribe(1));
    assert!(!n.unsubscribe(1));
    n.emit(Notification::TimeElapsed(2.5));
    assert_eq!(*a.borrow(), vec![Notification::SelectionChanged, Notification::TimeElapsed(2.5)]);
    assert_eq!(*b.borrow(), vec![Notification::SelectionChanged]);
}
