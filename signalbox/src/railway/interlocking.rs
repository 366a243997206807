use super::infrastructure::*;
use super::route::*;
use crate::eventsim::notify::{Notification, Notifier};
use crate::output::logger::{MessageKind, MessageLogger};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Fail, PartialEq)]
pub enum InterlockingError {
    #[fail(display = "track item {} is not a signal", _0)]
    NotASignal(ElementId),
    #[fail(display = "unknown route {}", _0)]
    UnknownRoute(RouteId),
}

/// Session state of a signal. None of this is saved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignalState {
    pub selected: bool,
    /// The active route starting at this signal.
    pub next_active_route: Option<RouteId>,
    /// The active route ending at this signal.
    pub previous_active_route: Option<RouteId>,
}

/// Owns the routes and the signal states, and sets and releases routes on
/// request, never letting two active routes share a track item unless the
/// caller forces it.
#[derive(Debug, Default)]
pub struct Interlocking {
    routes: BTreeMap<RouteId, Route>,
    signals: BTreeMap<ElementId, SignalState>,
    /// First signal of a pending two-signal selection.
    armed: Option<ElementId>,
}

impl Interlocking {
    pub fn new(inf: &Infrastructure, routes: impl IntoIterator<Item = Route>) -> Interlocking {
        Interlocking {
            routes: routes.into_iter().map(|r| (r.id, r)).collect(),
            signals: inf.iter()
                .filter(|e| e.kind.is_signal())
                .map(|e| (e.id, SignalState::default()))
                .collect(),
            armed: None,
        }
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    pub fn signal(&self, id: ElementId) -> Option<&SignalState> {
        self.signals.get(&id)
    }

    pub fn armed(&self) -> Option<ElementId> {
        self.armed
    }

    pub fn active_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().filter(|r| r.is_active())
    }

    /// The first route (by id) from `begin` to `end`.
    pub fn find_route(&self, begin: ElementId, end: ElementId) -> Option<RouteId> {
        self.routes.values().find(|r| r.links(begin, end)).map(|r| r.id)
    }

    /// A route can be set when no other active route uses any of its items.
    pub fn is_activable(&self, id: RouteId) -> bool {
        match self.routes.get(&id) {
            Some(route) => !self.routes.values()
                .any(|other| other.id != id && other.is_active() && route.shares_items_with(other)),
            None => false,
        }
    }

    pub fn activate_route(&mut self, id: RouteId, persistent: bool, notifier: &mut Notifier)
                          -> Result<(), InterlockingError> {
        let route = self.routes.get_mut(&id).ok_or(InterlockingError::UnknownRoute(id))?;
        route.set_state(if persistent { RouteState::Persistent } else { RouteState::Activated });
        let (begin, end) = (route.begin_signal, route.end_signal);
        if let Some(s) = self.signals.get_mut(&begin) {
            s.next_active_route = Some(id);
        }
        if let Some(s) = self.signals.get_mut(&end) {
            s.previous_active_route = Some(id);
        }
        debug!("Route {} activated (persistent: {})", id, persistent);
        notifier.emit(Notification::RouteActivated(id));
        Ok(())
    }

    pub fn deactivate(&mut self, id: RouteId, notifier: &mut Notifier) -> Result<(), InterlockingError> {
        let route = self.routes.get_mut(&id).ok_or(InterlockingError::UnknownRoute(id))?;
        route.set_state(RouteState::Deactivated);
        let (begin, end) = (route.begin_signal, route.end_signal);
        // A forced route may share its entry or exit signal with another
        // active route, which then takes over the signal's reference.
        let heading = self.active_routes().find(|r| r.begin_signal == begin).map(|r| r.id);
        let ending = self.active_routes().find(|r| r.end_signal == end).map(|r| r.id);
        if let Some(s) = self.signals.get_mut(&begin) {
            if s.next_active_route == Some(id) {
                s.next_active_route = heading;
            }
        }
        if let Some(s) = self.signals.get_mut(&end) {
            if s.previous_active_route == Some(id) {
                s.previous_active_route = ending;
            }
        }
        debug!("Route {} deactivated", id);
        notifier.emit(Notification::RouteDeactivated(id));
        Ok(())
    }

    /// Sets every route saved as active, without conflict checks.
    pub fn set_to_initial_state(&mut self, notifier: &mut Notifier) -> Result<(), InterlockingError> {
        let initial = self.routes.values()
            .filter(|r| r.initial_state.is_active())
            .map(|r| (r.id, r.initial_state == RouteState::Persistent))
            .collect::<Vec<_>>();
        for (id, persistent) in initial {
            self.activate_route(id, persistent, notifier)?;
        }
        Ok(())
    }

    fn set_selected(&mut self, signal: ElementId, selected: bool, notifier: &mut Notifier) {
        if let Some(s) = self.signals.get_mut(&signal) {
            if s.selected != selected {
                s.selected = selected;
                notifier.emit(Notification::SelectionChanged);
            }
        }
    }

    /// A signal was picked. The first pick arms it; the second one sets the
    /// route between the two signals if there is one and nothing conflicts
    /// (or `force` is given).
    pub fn select_signal(&mut self,
                         signal: ElementId,
                         persistent: bool,
                         force: bool,
                         notifier: &mut Notifier,
                         log: &mut MessageLogger)
                         -> Result<(), InterlockingError> {
        if !self.signals.contains_key(&signal) {
            return Err(InterlockingError::NotASignal(signal));
        }
        self.set_selected(signal, true, notifier);

        let armed = match self.armed {
            Some(a) if a != signal => a,
            _ => {
                self.armed = Some(signal);
                return Ok(());
            }
        };

        match self.find_route(armed, signal) {
            Some(id) if force || self.is_activable(id) => {
                self.activate_route(id, persistent, notifier)?;
                self.set_selected(armed, false, notifier);
                self.set_selected(signal, false, notifier);
                self.armed = None;
            }
            Some(id) => {
                notifier.emit(Notification::ConflictingRoute(id));
                self.set_selected(signal, false, notifier);
                self.set_selected(armed, false, notifier);
                self.armed = None;
                log.add_message("Conflicting route", MessageKind::PlayerWarning);
            }
            None => {
                notifier.emit(Notification::NoRouteBetweenSignals(armed, signal));
                self.set_selected(armed, false, notifier);
                self.armed = Some(signal);
                log.add_message("No route between signals", MessageKind::PlayerWarning);
            }
        }
        Ok(())
    }

    /// Releases the route starting at `signal`, dropping any pending
    /// selection first.
    pub fn deactivate_route(&mut self, signal: ElementId, notifier: &mut Notifier)
                            -> Result<(), InterlockingError> {
        if !self.signals.contains_key(&signal) {
            return Err(InterlockingError::NotASignal(signal));
        }
        if let Some(armed) = self.armed.take() {
            self.set_selected(armed, false, notifier);
        }
        if let Some(id) = self.signals[&signal].next_active_route {
            self.deactivate(id, notifier)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventsim::notify::recorder;
    use crate::railway::fixtures::junction;
    use crate::eventsim::notify::Notification::*;

    /// Route 1: 2 -> 6 over the normal branch, route 2: 2 -> 9 over the
    /// reverse branch, route 3: 6 -> 9 over an item no other route uses.
    fn interlocking() -> Interlocking {
        let inf = junction();
        let mut r1 = Route::new(1, 2, 6);
        let mut r2 = Route::new(2, 2, 9);
        r2.directions.insert(4, PointsDirection::Reverse);
        let mut r3 = Route::new(3, 6, 9);
        r3.items.push(20);
        r1.initialize(&inf).unwrap();
        r2.initialize(&inf).unwrap();
        Interlocking::new(&inf, vec![r1, r2, r3])
    }

    fn state(il: &Interlocking, id: RouteId) -> RouteState {
        il.route(id).unwrap().state()
    }

    #[test]
    fn two_clicks_set_a_route() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let events = recorder(&mut n);
        let mut log = MessageLogger::default();

        il.select_signal(2, false, false, &mut n, &mut log).unwrap();
        assert_eq!(il.armed(), Some(2));
        assert!(il.signal(2).unwrap().selected);

        il.select_signal(6, false, false, &mut n, &mut log).unwrap();
        assert_eq!(il.armed(), None);
        assert_eq!(state(&il, 1), RouteState::Activated);
        assert!(!il.signal(2).unwrap().selected);
        assert!(!il.signal(6).unwrap().selected);
        assert_eq!(il.signal(2).unwrap().next_active_route, Some(1));
        assert_eq!(il.signal(6).unwrap().previous_active_route, Some(1));
        assert_eq!(*events.borrow(), vec![
            SelectionChanged, SelectionChanged, RouteActivated(1), SelectionChanged, SelectionChanged]);
        assert!(log.messages.is_empty());
    }

    #[test]
    fn reselecting_the_armed_signal_is_a_noop() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let events = recorder(&mut n);
        let mut log = MessageLogger::default();

        il.select_signal(2, false, false, &mut n, &mut log).unwrap();
        il.select_signal(2, false, false, &mut n, &mut log).unwrap();
        assert_eq!(il.armed(), Some(2));
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn conflicting_route_is_refused() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let mut log = MessageLogger::default();

        il.select_signal(2, false, false, &mut n, &mut log).unwrap();
        il.select_signal(9, false, false, &mut n, &mut log).unwrap();
        assert_eq!(state(&il, 2), RouteState::Activated);
        assert!(!il.is_activable(1));

        let events = recorder(&mut n);
        il.select_signal(2, false, false, &mut n, &mut log).unwrap();
        il.select_signal(6, true, false, &mut n, &mut log).unwrap();

        assert!(events.borrow().contains(&ConflictingRoute(1)));
        assert_eq!(state(&il, 1), RouteState::Deactivated);
        assert_eq!(state(&il, 2), RouteState::Activated);
        assert_eq!(il.armed(), None);
        assert!(!il.signal(2).unwrap().selected);
        assert!(!il.signal(6).unwrap().selected);
        assert_eq!(log.last().unwrap().msg_text, "Conflicting route");
        assert_eq!(log.last().unwrap().msg_type, MessageKind::PlayerWarning);
    }

    #[test]
    fn forced_route_ignores_conflicts() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let mut log = MessageLogger::default();

        il.activate_route(2, false, &mut n).unwrap();
        il.select_signal(2, true, true, &mut n, &mut log).unwrap();
        il.select_signal(6, true, true, &mut n, &mut log).unwrap();
        assert_eq!(state(&il, 1), RouteState::Persistent);
        assert_eq!(state(&il, 2), RouteState::Activated);
    }

    #[test]
    fn no_route_rearms_on_second_signal() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let events = recorder(&mut n);
        let mut log = MessageLogger::default();

        il.select_signal(6, false, false, &mut n, &mut log).unwrap();
        il.select_signal(2, false, false, &mut n, &mut log).unwrap();

        assert_eq!(il.armed(), Some(2));
        assert!(il.signal(2).unwrap().selected);
        assert!(!il.signal(6).unwrap().selected);
        assert!(events.borrow().contains(&NoRouteBetweenSignals(6, 2)));
        assert!(il.routes().all(|r| !r.is_active()));
        assert_eq!(log.last().unwrap().msg_text, "No route between signals");

        // The re-armed signal can complete a route.
        il.select_signal(9, false, false, &mut n, &mut log).unwrap();
        assert_eq!(state(&il, 2), RouteState::Activated);
    }

    #[test]
    fn find_route_is_directional() {
        let il = interlocking();
        assert_eq!(il.find_route(2, 6), Some(1));
        assert_eq!(il.find_route(6, 2), None);
        assert_eq!(il.find_route(6, 9), Some(3));
        assert_eq!(il.find_route(9, 6), None);
    }

    #[test]
    fn disjoint_routes_do_not_conflict() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        il.activate_route(1, false, &mut n).unwrap();
        assert!(il.is_activable(3));
        assert!(!il.is_activable(2));
        // An active route does not conflict with itself.
        assert!(il.is_activable(1));
        assert!(!il.is_activable(42));
    }

    #[test]
    fn deactivation_from_entry_signal() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let mut log = MessageLogger::default();
        il.activate_route(1, true, &mut n).unwrap();

        // Releasing from the exit signal does nothing to the route.
        il.deactivate_route(6, &mut n).unwrap();
        assert_eq!(state(&il, 1), RouteState::Persistent);

        il.select_signal(9, false, false, &mut n, &mut log).unwrap();
        let events = recorder(&mut n);
        il.deactivate_route(2, &mut n).unwrap();
        assert_eq!(state(&il, 1), RouteState::Deactivated);
        assert_eq!(il.armed(), None);
        assert!(!il.signal(9).unwrap().selected);
        assert_eq!(il.signal(2).unwrap().next_active_route, None);
        assert_eq!(il.signal(6).unwrap().previous_active_route, None);
        assert_eq!(*events.borrow(), vec![SelectionChanged, RouteDeactivated(1)]);
        assert!(il.is_activable(2));
    }

    #[test]
    fn release_both_routes_from_shared_entry() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let mut log = MessageLogger::default();

        il.select_signal(2, false, false, &mut n, &mut log).unwrap();
        il.select_signal(6, false, false, &mut n, &mut log).unwrap();
        il.select_signal(2, false, false, &mut n, &mut log).unwrap();
        il.select_signal(9, false, true, &mut n, &mut log).unwrap();
        assert_eq!(il.active_routes().count(), 2);

        il.deactivate_route(2, &mut n).unwrap();
        assert_eq!(state(&il, 2), RouteState::Deactivated);
        assert_eq!(il.signal(2).unwrap().next_active_route, Some(1));

        il.deactivate_route(2, &mut n).unwrap();
        assert_eq!(il.active_routes().count(), 0);
        assert_eq!(il.signal(2).unwrap().next_active_route, None);
        assert_eq!(il.signal(6).unwrap().previous_active_route, None);
        assert!(il.is_activable(2));
    }

    #[test]
    fn initial_state_is_restored() {
        let inf = junction();
        let mut r1 = Route::new(1, 2, 6);
        r1.items.push(3);
        r1.initial_state = RouteState::Persistent;
        let mut r2 = Route::new(2, 2, 9);
        r2.items.push(3);
        r2.initial_state = RouteState::Activated;
        let mut il = Interlocking::new(&inf, vec![r1, r2]);
        let mut n = Notifier::new();
        il.set_to_initial_state(&mut n).unwrap();
        assert_eq!(state(&il, 1), RouteState::Persistent);
        assert_eq!(state(&il, 2), RouteState::Activated);
    }

    #[test]
    fn only_signals_can_be_selected() {
        let mut il = interlocking();
        let mut n = Notifier::new();
        let mut log = MessageLogger::default();
        assert_eq!(il.select_signal(3, false, false, &mut n, &mut log),
                   Err(InterlockingError::NotASignal(3)));
        assert_eq!(il.deactivate_route(99, &mut n), Err(InterlockingError::NotASignal(99)));
        assert_eq!(il.activate_route(99, false, &mut n), Err(InterlockingError::UnknownRoute(99)));
    }
}
