use super::infrastructure::*;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;

pub type RouteId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RouteState {
    Deactivated,
    Activated,
    /// Stays set after a train has passed.
    Persistent,
}

impl RouteState {
    pub fn from_code(x: u8) -> Option<RouteState> {
        match x {
            0 => Some(RouteState::Deactivated),
            1 => Some(RouteState::Activated),
            2 => Some(RouteState::Persistent),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            RouteState::Deactivated => 0,
            RouteState::Activated => 1,
            RouteState::Persistent => 2,
        }
    }

    pub fn is_active(self) -> bool {
        self != RouteState::Deactivated
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointsDirection {
    Normal,
    Reverse,
}

impl PointsDirection {
    pub fn from_code(x: u8) -> Option<PointsDirection> {
        match x {
            0 => Some(PointsDirection::Normal),
            1 => Some(PointsDirection::Reverse),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PointsDirection::Normal => 0,
            PointsDirection::Reverse => 1,
        }
    }
}

#[derive(Debug, Fail, PartialEq)]
pub enum RouteError {
    #[fail(display = "route {}: item {} is not a signal", _0, _1)]
    NotASignal(RouteId, ElementId),
    #[fail(display = "route {}: unknown track item {}", _0, _1)]
    UnknownItem(RouteId, ElementId),
    #[fail(display = "route {}: track ends after item {}", _0, _1)]
    Dead(RouteId, ElementId),
    #[fail(display = "route {}: item {} is not connected to item {}", _0, _1, _2)]
    Disconnected(RouteId, ElementId, ElementId),
    #[fail(display = "route {}: does not reach its end signal", _0)]
    Unterminated(RouteId),
}

/// A path between two signals that can be set for trains.
///
/// `items` are the track elements strictly between the two signals, in
/// order. Only the interlocking changes the route state during play.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub begin_signal: ElementId,
    pub end_signal: ElementId,
    pub items: SmallVec<[ElementId; 8]>,
    pub directions: BTreeMap<ElementId, PointsDirection>,
    pub initial_state: RouteState,
    pub extra: Map<String, Value>,
    state: RouteState,
}

impl Route {
    pub fn new(id: RouteId, begin_signal: ElementId, end_signal: ElementId) -> Route {
        Route {
            id,
            begin_signal,
            end_signal,
            items: SmallVec::new(),
            directions: BTreeMap::new(),
            initial_state: RouteState::Deactivated,
            extra: Map::new(),
            state: RouteState::Deactivated,
        }
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    pub(super) fn set_state(&mut self, state: RouteState) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// True if this route goes from `begin` to `end`, in that direction.
    pub fn links(&self, begin: ElementId, end: ElementId) -> bool {
        self.begin_signal == begin && self.end_signal == end
    }

    pub fn shares_items_with(&self, other: &Route) -> bool {
        self.items.iter().any(|i| other.items.contains(i))
    }

    /// Checks the route against the linked infrastructure, and derives the
    /// item list from the track graph if none was given.
    pub fn initialize(&mut self, inf: &Infrastructure) -> Result<(), RouteError> {
        for &s in &[self.begin_signal, self.end_signal] {
            match inf.get(s) {
                None => return Err(RouteError::UnknownItem(self.id, s)),
                Some(e) if !e.kind.is_signal() => return Err(RouteError::NotASignal(self.id, s)),
                _ => {}
            }
        }
        if self.items.is_empty() {
            self.items = self.trace(inf)?;
        }
        if let Some(&i) = self.items.iter().find(|i| !inf.contains(**i)) {
            return Err(RouteError::UnknownItem(self.id, i));
        }
        Ok(())
    }

    /// Follows the track from the begin signal in its forward direction,
    /// taking the reverse branch of points set to reverse.
    fn trace(&self, inf: &Infrastructure) -> Result<SmallVec<[ElementId; 8]>, RouteError> {
        let mut items = SmallVec::new();
        let mut prev = self.begin_signal;
        let mut cur = inf.get(prev)
            .and_then(|e| e.links.next)
            .ok_or(RouteError::Dead(self.id, prev))?;

        for _ in 0..inf.len() {
            if cur == self.end_signal {
                return Ok(items);
            }
            let e = inf.get(cur).ok_or(RouteError::UnknownItem(self.id, cur))?;
            let next = if e.links.previous == Some(prev) {
                match (e.kind.reverse_point(), self.directions.get(&cur)) {
                    (Some(_), Some(PointsDirection::Reverse)) => e.links.reverse,
                    _ => e.links.next,
                }
            } else if e.links.next == Some(prev) || e.links.reverse == Some(prev) {
                e.links.previous
            } else {
                return Err(RouteError::Disconnected(self.id, prev, cur));
            };
            items.push(cur);
            prev = cur;
            cur = next.ok_or(RouteError::Dead(self.id, prev))?;
        }
        Err(RouteError::Unterminated(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::railway::fixtures::junction;

    #[test]
    fn trace_normal_and_reverse() {
        let inf = junction();

        let mut normal = Route::new(1, 2, 6);
        normal.initialize(&inf).unwrap();
        assert_eq!(normal.items.as_slice(), &[3, 4, 5]);

        let mut reverse = Route::new(2, 2, 9);
        reverse.directions.insert(4, PointsDirection::Reverse);
        reverse.initialize(&inf).unwrap();
        assert_eq!(reverse.items.as_slice(), &[3, 4, 7]);
        assert!(normal.shares_items_with(&reverse));
    }

    #[test]
    fn given_items_are_kept() {
        let inf = junction();
        let mut r = Route::new(1, 2, 6);
        r.items.push(5);
        r.initialize(&inf).unwrap();
        assert_eq!(r.items.as_slice(), &[5]);
    }

    #[test]
    fn bad_routes() {
        let inf = junction();
        assert_eq!(Route::new(1, 3, 6).initialize(&inf), Err(RouteError::NotASignal(1, 3)));
        assert_eq!(Route::new(1, 2, 99).initialize(&inf), Err(RouteError::UnknownItem(1, 99)));
        // Normal branch never meets signal 9.
        assert_eq!(Route::new(1, 2, 9).initialize(&inf), Err(RouteError::Dead(1, 8)));
    }

    #[test]
    fn direction_matters() {
        let r = Route::new(1, 2, 6);
        assert!(r.links(2, 6));
        assert!(!r.links(6, 2));
    }
}
