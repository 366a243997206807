use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub type ElementId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    Line,
    InvisibleLink,
    Points { reverse: Point },
    End,
    Platform,
    Place,
    Text,
    Signal,
}

impl ElementKind {
    /// Markers are drawn on the scenery but take no part in the track graph.
    pub fn is_marker(&self) -> bool {
        match *self {
            ElementKind::Platform | ElementKind::Place | ElementKind::Text => true,
            _ => false,
        }
    }

    pub fn is_signal(&self) -> bool {
        *self == ElementKind::Signal
    }

    pub fn reverse_point(&self) -> Option<Point> {
        match *self {
            ElementKind::Points { reverse } => Some(reverse),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Links {
    pub previous: Option<ElementId>,
    pub next: Option<ElementId>,
    pub reverse: Option<ElementId>,
}

#[derive(Clone, Debug)]
pub struct TrackElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub name: String,
    pub origin: Point,
    pub end: Point,
    pub place_code: Option<String>,
    pub track_code: Option<String>,
    pub max_speed: Option<f64>,
    pub real_length: Option<f64>,
    pub links: Links,
    /// Persisted fields this core does not interpret (graphics, timers, ...).
    pub extra: Map<String, Value>,
}

impl TrackElement {
    pub fn new(id: ElementId, kind: ElementKind, origin: Point, end: Point) -> TrackElement {
        TrackElement {
            id,
            kind,
            name: String::new(),
            origin,
            end,
            place_code: None,
            track_code: None,
            max_speed: None,
            real_length: None,
            links: Links::default(),
            extra: Map::new(),
        }
    }
}

/// Id-addressed arena of all track elements, plus the derived place index.
#[derive(Debug, Default)]
pub struct Infrastructure {
    elements: BTreeMap<ElementId, TrackElement>,
    places: BTreeMap<String, ElementId>,
}

impl Infrastructure {
    pub fn new(elements: impl IntoIterator<Item = TrackElement>) -> Infrastructure {
        let mut inf = Infrastructure {
            elements: elements.into_iter().map(|e| (e.id, e)).collect(),
            places: BTreeMap::new(),
        };
        inf.update_places();
        inf
    }

    pub fn update_places(&mut self) {
        self.places = self.elements
            .values()
            .filter(|e| e.kind == ElementKind::Place)
            .filter_map(|e| e.place_code.as_ref().map(|c| (c.clone(), e.id)))
            .collect();
    }

    pub fn get(&self, id: ElementId) -> Option<&TrackElement> {
        self.elements.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ElementId) -> Option<&mut TrackElement> {
        self.elements.get_mut(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<ElementId> {
        self.elements.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackElement> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_signal(&self, id: ElementId) -> bool {
        self.get(id).map(|e| e.kind.is_signal()).unwrap_or(false)
    }

    pub fn place(&self, place_code: &str) -> Option<&TrackElement> {
        if place_code.is_empty() {
            return None;
        }
        self.places.get(place_code).and_then(|id| self.get(*id))
    }

    pub fn places(&self) -> impl Iterator<Item = (&str, ElementId)> {
        self.places.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The line element carrying both the given place code and track code.
    pub fn line_item(&self, place_code: &str, track_code: &str) -> Option<&TrackElement> {
        self.elements.values().find(|e| {
            e.kind == ElementKind::Line &&
                e.place_code.as_ref().map(|s| s.as_str()) == Some(place_code) &&
                e.track_code.as_ref().map(|s| s.as_str()) == Some(track_code)
        })
    }
}
