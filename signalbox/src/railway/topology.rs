//! Track graph construction from element coordinates, and link checking.

use super::infrastructure::*;
use crate::output::logger::{MessageKind, MessageLogger};
use log::debug;
use std::fmt;

/// Two endpoints closer than this are considered connected.
pub const LINK_THRESHOLD: f64 = 1.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum End {
    Previous,
    Next,
    Reverse,
}

fn slot(links: &mut Links, end: End) -> &mut Option<ElementId> {
    match end {
        End::Previous => &mut links.previous,
        End::Next => &mut links.next,
        End::Reverse => &mut links.reverse,
    }
}

/// Which ends of `a` and `b` touch, in the fixed precedence order. Only the
/// first touching pair of endpoints counts.
fn touching(a: &TrackElement, b: &TrackElement) -> Option<(End, End)> {
    let near = |p: &Point, q: &Point| p.distance(q) <= LINK_THRESHOLD;

    if near(&a.origin, &b.origin) {
        return Some((End::Previous, End::Previous));
    }
    if near(&a.origin, &b.end) {
        return Some((End::Previous, End::Next));
    }
    if near(&a.end, &b.origin) {
        return Some((End::Next, End::Previous));
    }
    if near(&a.end, &b.end) {
        return Some((End::Next, End::Next));
    }
    if let Some(reverse) = a.kind.reverse_point() {
        if near(&reverse, &b.origin) {
            return Some((End::Reverse, End::Previous));
        }
        if near(&reverse, &b.end) {
            return Some((End::Reverse, End::Next));
        }
    } else if let Some(reverse) = b.kind.reverse_point() {
        if near(&a.origin, &reverse) {
            return Some((End::Previous, End::Reverse));
        }
        if near(&a.end, &reverse) {
            return Some((End::Next, End::Reverse));
        }
    }
    None
}

fn set_link(inf: &mut Infrastructure, id: ElementId, end: End, other: ElementId) {
    if let Some(e) = inf.get_mut(id) {
        let s = slot(&mut e.links, end);
        match *s {
            None => *s = Some(other),
            Some(existing) if existing != other => {
                debug!("Track item {} keeps {:?} link to {}, ignoring {}", id, end, existing, other);
            }
            _ => {}
        }
    }
}

/// Links every pair of track elements whose endpoints touch.
///
/// Pairs are visited in ascending id order. A link slot that is already
/// filled, either by an earlier pair or by a link read from the saved
/// simulation, is left as it is. Returns the number of pairs that were
/// found to touch.
///
/// Markers (places, platforms, texts) are never linked, even when they sit
/// on a track endpoint, so they cannot take a slot meant for a track
/// element.
pub fn create_links(inf: &mut Infrastructure) -> usize {
    let ids: Vec<ElementId> = inf.iter()
        .filter(|e| !e.kind.is_marker())
        .map(|e| e.id)
        .collect();

    let mut found = Vec::new();
    for (n, &i) in ids.iter().enumerate() {
        for &j in &ids[n + 1..] {
            if let (Some(a), Some(b)) = (inf.get(i), inf.get(j)) {
                if let Some((end_i, end_j)) = touching(a, b) {
                    found.push((i, end_i, j, end_j));
                }
            }
        }
    }

    for &(i, end_i, j, end_j) in &found {
        set_link(inf, i, end_i, j);
        set_link(inf, j, end_j, i);
    }
    found.len()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Previous,
    Next,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Unlinked {
    pub id: ElementId,
    pub side: Side,
    pub at: Point,
}

impl fmt::Display for Unlinked {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TrackItem {} is unlinked at {}", self.id, self.at)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkReport {
    pub unlinked: Vec<Unlinked>,
}

impl LinkReport {
    pub fn is_ok(&self) -> bool {
        self.unlinked.is_empty()
    }
}

impl fmt::Display for LinkReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for u in &self.unlinked {
            if first { first = false; } else { write!(f, "; ")?; }
            write!(f, "{}", u)?;
        }
        Ok(())
    }
}

/// All missing links: every non-marker element needs a previous link, and
/// all of those except end items also need a next link.
pub fn unlinked_items(inf: &Infrastructure) -> LinkReport {
    let mut unlinked = Vec::new();
    for e in inf.iter().filter(|e| !e.kind.is_marker()) {
        if e.links.next.is_none() && e.kind != ElementKind::End {
            unlinked.push(Unlinked { id: e.id, side: Side::Next, at: e.end });
        }
        if e.links.previous.is_none() {
            unlinked.push(Unlinked { id: e.id, side: Side::Previous, at: e.origin });
        }
    }
    LinkReport { unlinked }
}

/// Checks the links, writing every violation to the message log.
pub fn check_links(inf: &Infrastructure, log: &mut MessageLogger) -> bool {
    log.add_message("Checking TrackItem links", MessageKind::Software);
    let report = unlinked_items(inf);
    for u in &report.unlinked {
        log.add_message(u.to_string(), MessageKind::Software);
    }
    report.is_ok()
}
