//! The simulation document: a JSON tree where every object record carries a
//! `__type__` discriminator.
//!
//! Decoding goes through an explicit table from discriminator to constructor.
//! A tag outside the table anywhere in the document rejects the whole file,
//! and a record of the wrong kind in a typed slot (a `Route` among the track
//! items, say) is rejected as well.

use super::options::Options;
use crate::eventsim::clock::TimeError;
use crate::output::logger::{Message, MessageLogger};
use crate::railway::infrastructure::*;
use crate::railway::route::*;
use crate::railway::trains::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const TYPE_KEY: &str = "__type__";

#[derive(Debug, Fail, PartialEq)]
pub enum FormatError {
    #[fail(display = "unknown __type__ '{}' in JSON file", _0)]
    UnknownType(String),
    #[fail(display = "loaded file is not a simulation")]
    NotASimulation,
    #[fail(display = "expected a {} record, found '{}'", slot, found)]
    WrongKind { slot: &'static str, found: String },
    #[fail(display = "malformed {} record: {}", _0, _1)]
    Malformed(String, String),
    #[fail(display = "track item {} is linked to unknown item {}", _0, _1)]
    DanglingLink(ElementId, ElementId),
    #[fail(display = "more than one track item with id {}", _0)]
    DuplicateTrackItem(ElementId),
    #[fail(display = "more than one route numbered {}", _0)]
    DuplicateRoute(RouteId),
    #[fail(display = "{}", _0)]
    Time(#[cause] TimeError),
    #[fail(display = "{}", _0)]
    Route(#[cause] RouteError),
    #[fail(display = "{}", _0)]
    Train(#[cause] TrainError),
}

fn malformed<E: ToString>(tag: &str, e: E) -> FormatError {
    FormatError::Malformed(tag.to_string(), e.to_string())
}

/// Everything a simulation file holds.
#[derive(Clone, Debug, Default)]
pub struct SimulationRecord {
    pub options: Options,
    pub track_items: Vec<TrackElement>,
    pub routes: Vec<Route>,
    pub train_types: BTreeMap<String, TrainType>,
    pub services: BTreeMap<String, Service>,
    pub trains: Vec<Train>,
    pub message_logger: MessageLogger,
}

#[derive(Debug)]
pub enum Record {
    Simulation(Box<SimulationRecord>),
    TrackItem(TrackElement),
    Route(Route),
    Position(Position),
    TrainType(TrainType),
    Service(Service),
    ServiceLine(ServiceLine),
    Train(Train),
    MessageLogger(MessageLogger),
    Message(Message),
}

impl Record {
    pub fn tag(&self) -> &'static str {
        match *self {
            Record::Simulation(_) => "Simulation",
            Record::TrackItem(ref e) => element_tag(&e.kind),
            Record::Route(_) => "Route",
            Record::Position(_) => "Position",
            Record::TrainType(_) => "TrainType",
            Record::Service(_) => "Service",
            Record::ServiceLine(_) => "ServiceLine",
            Record::Train(_) => "Train",
            Record::MessageLogger(_) => "MessageLogger",
            Record::Message(_) => "Message",
        }
    }
}

pub fn element_tag(kind: &ElementKind) -> &'static str {
    match *kind {
        ElementKind::Line => "LineItem",
        ElementKind::InvisibleLink => "InvisibleLinkItem",
        ElementKind::Points { .. } => "PointsItem",
        ElementKind::End => "EndItem",
        ElementKind::Platform => "PlatformItem",
        ElementKind::Place => "Place",
        ElementKind::Text => "TextItem",
        ElementKind::Signal => "SignalItem",
    }
}

type Constructor = fn(Map<String, Value>) -> Result<Record, FormatError>;

const RECORD_TYPES: &[(&str, Constructor)] = &[
    ("Simulation", simulation),
    ("SignalItem", signal_item),
    ("EndItem", end_item),
    ("InvisibleLinkItem", invisible_link_item),
    ("LineItem", line_item),
    ("Place", place),
    ("PlatformItem", platform_item),
    ("PointsItem", points_item),
    ("TextItem", text_item),
    ("Route", route),
    ("Position", position),
    ("TrainType", train_type),
    ("Service", service),
    ("ServiceLine", service_line),
    ("Train", train),
    ("MessageLogger", message_logger),
    ("Message", message),
];

fn constructor(tag: &str) -> Option<Constructor> {
    RECORD_TYPES.iter().find(|(t, _)| *t == tag).map(|(_, c)| *c)
}

/// Rejects the document if any object anywhere carries an unknown tag.
fn check_types(value: &Value) -> Result<(), FormatError> {
    match *value {
        Value::Object(ref map) => {
            if let Some(tag) = map.get(TYPE_KEY) {
                match tag.as_str() {
                    Some(t) if constructor(t).is_some() => {}
                    Some(t) => return Err(FormatError::UnknownType(t.to_string())),
                    None => return Err(FormatError::UnknownType(tag.to_string())),
                }
            }
            map.values().try_for_each(check_types)
        }
        Value::Array(ref items) => items.iter().try_for_each(check_types),
        _ => Ok(()),
    }
}

fn record(value: Value) -> Result<Record, FormatError> {
    let mut map = match value {
        Value::Object(map) => map,
        other => return Err(malformed("record", format!("expected an object, found {}", other))),
    };
    let tag = match map.remove(TYPE_KEY) {
        Some(Value::String(tag)) => tag,
        Some(other) => return Err(FormatError::UnknownType(other.to_string())),
        None => return Err(malformed("record", "missing __type__")),
    };
    let make = constructor(&tag).ok_or_else(|| FormatError::UnknownType(tag.clone()))?;
    make(map)
}

/// Decodes a record that must be of one particular kind.
fn nested<T>(value: Value, slot: &'static str, pick: fn(Record) -> Result<T, Record>)
             -> Result<T, FormatError> {
    pick(record(value)?).map_err(|r| FormatError::WrongKind { slot, found: r.tag().to_string() })
}

fn from_map<T: DeserializeOwned>(tag: &str, map: Map<String, Value>) -> Result<T, FormatError> {
    serde_json::from_value(Value::Object(map)).map_err(|e| malformed(tag, e))
}

fn take_list(tag: &str, map: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>, FormatError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(malformed(tag, format!("'{}' is not a list", key))),
    }
}

fn take_object(tag: &str, map: &mut Map<String, Value>, key: &str)
               -> Result<Map<String, Value>, FormatError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(items)) => Ok(items),
        Some(_) => Err(malformed(tag, format!("'{}' is not an object", key))),
    }
}

pub fn decode(value: Value) -> Result<SimulationRecord, FormatError> {
    check_types(&value)?;
    let is_tagged = value.get(TYPE_KEY).is_some();
    if !is_tagged {
        return Err(FormatError::NotASimulation);
    }
    match record(value)? {
        Record::Simulation(sim) => Ok(*sim),
        _ => Err(FormatError::NotASimulation),
    }
}

fn simulation(mut map: Map<String, Value>) -> Result<Record, FormatError> {
    const TAG: &str = "Simulation";
    let options = match map.remove("options") {
        None | Some(Value::Null) => Options::default(),
        Some(Value::Object(o)) => Options::from_map(o).map_err(|e| malformed("options", e))?,
        Some(_) => return Err(malformed(TAG, "'options' is not an object")),
    };

    let track_items = take_object(TAG, &mut map, "trackItems")?
        .into_iter()
        .map(|(_, v)| nested(v, "track item", |r| match r {
            Record::TrackItem(e) => Ok(e),
            r => Err(r),
        }))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(id) = first_duplicate(track_items.iter().map(|e| e.id)) {
        return Err(FormatError::DuplicateTrackItem(id));
    }
    check_persisted_links(&track_items)?;

    let routes = take_object(TAG, &mut map, "routes")?
        .into_iter()
        .map(|(_, v)| nested(v, "route", |r| match r {
            Record::Route(x) => Ok(x),
            r => Err(r),
        }))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(id) = first_duplicate(routes.iter().map(|r| r.id)) {
        return Err(FormatError::DuplicateRoute(id));
    }

    let train_types = take_object(TAG, &mut map, "trainTypes")?
        .into_iter()
        .map(|(k, v)| Ok((k, nested(v, "train type", |r| match r {
            Record::TrainType(x) => Ok(x),
            r => Err(r),
        })?)))
        .collect::<Result<BTreeMap<_, _>, FormatError>>()?;

    let services = take_object(TAG, &mut map, "services")?
        .into_iter()
        .map(|(k, v)| Ok((k, nested(v, "service", |r| match r {
            Record::Service(x) => Ok(x),
            r => Err(r),
        })?)))
        .collect::<Result<BTreeMap<_, _>, FormatError>>()?;

    let trains = take_list(TAG, &mut map, "trains")?
        .into_iter()
        .map(|v| nested(v, "train", |r| match r {
            Record::Train(x) => Ok(x),
            r => Err(r),
        }))
        .collect::<Result<Vec<_>, _>>()?;

    let message_logger = match map.remove("messageLogger") {
        None | Some(Value::Null) => MessageLogger::default(),
        Some(v) => nested(v, "message logger", |r| match r {
            Record::MessageLogger(x) => Ok(x),
            r => Err(r),
        })?,
    };

    Ok(Record::Simulation(Box::new(SimulationRecord {
        options,
        track_items,
        routes,
        train_types,
        services,
        trains,
        message_logger,
    })))
}

fn first_duplicate(ids: impl Iterator<Item = usize>) -> Option<usize> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Some(id);
        }
    }
    None
}

fn check_persisted_links(items: &[TrackElement]) -> Result<(), FormatError> {
    let ids = items.iter().map(|e| e.id).collect::<BTreeSet<_>>();
    for e in items {
        let links = [e.links.previous, e.links.next, e.links.reverse];
        if let Some(&missing) = links.iter().flatten().find(|id| !ids.contains(*id)) {
            return Err(FormatError::DanglingLink(e.id, missing));
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackItemRecord {
    ti_id: ElementId,
    #[serde(default)]
    name: String,
    x: f64,
    y: f64,
    #[serde(default)]
    xf: Option<f64>,
    #[serde(default)]
    yf: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    yr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    place_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    track_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    real_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_ti_id: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_ti_id: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reverse_ti_id: Option<ElementId>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TrackItemRecord {
    fn into_element(self, kind: ElementKind) -> TrackElement {
        let origin = Point::new(self.x, self.y);
        let end = match (self.xf, self.yf) {
            (Some(x), Some(y)) => Point::new(x, y),
            _ => origin,
        };
        let mut extra = self.extra;
        if kind.reverse_point().is_none() {
            for (key, v) in vec![("xr", self.xr), ("yr", self.yr)] {
                if let Some(v) = v {
                    extra.insert(key.to_string(), Value::from(v));
                }
            }
        }
        let mut e = TrackElement::new(self.ti_id, kind, origin, end);
        e.name = self.name;
        e.place_code = self.place_code;
        e.track_code = self.track_code;
        e.max_speed = self.max_speed;
        e.real_length = self.real_length;
        e.links = Links {
            previous: self.previous_ti_id,
            next: self.next_ti_id,
            reverse: self.reverse_ti_id,
        };
        e.extra = extra;
        e
    }

    fn from_element(e: &TrackElement) -> TrackItemRecord {
        let reverse = e.kind.reverse_point();
        TrackItemRecord {
            ti_id: e.id,
            name: e.name.clone(),
            x: e.origin.x,
            y: e.origin.y,
            xf: Some(e.end.x),
            yf: Some(e.end.y),
            xr: reverse.map(|p| p.x),
            yr: reverse.map(|p| p.y),
            place_code: e.place_code.clone(),
            track_code: e.track_code.clone(),
            max_speed: e.max_speed,
            real_length: e.real_length,
            previous_ti_id: e.links.previous,
            next_ti_id: e.links.next,
            reverse_ti_id: e.links.reverse,
            extra: e.extra.clone(),
        }
    }
}

fn track_item(tag: &str, map: Map<String, Value>, kind: ElementKind) -> Result<Record, FormatError> {
    let r: TrackItemRecord = from_map(tag, map)?;
    Ok(Record::TrackItem(r.into_element(kind)))
}

fn signal_item(map: Map<String, Value>) -> Result<Record, FormatError> {
    track_item("SignalItem", map, ElementKind::Signal)
}

fn end_item(map: Map<String, Value>) -> Result<Record, FormatError> {
    track_item("EndItem", map, ElementKind::End)
}

fn invisible_link_item(map: Map<String, Value>) -> Result<Record, FormatError> {
    track_item("InvisibleLinkItem", map, ElementKind::InvisibleLink)
}

fn line_item(map: Map<String, Value>) -> Result<Record, FormatError> {
    track_item("LineItem", map, ElementKind::Line)
}

fn place(map: Map<String, Value>) -> Result<Record, FormatError> {
    track_item("Place", map, ElementKind::Place)
}

fn platform_item(map: Map<String, Value>) -> Result<Record, FormatError> {
    track_item("PlatformItem", map, ElementKind::Platform)
}

fn text_item(map: Map<String, Value>) -> Result<Record, FormatError> {
    track_item("TextItem", map, ElementKind::Text)
}

fn points_item(map: Map<String, Value>) -> Result<Record, FormatError> {
    let r: TrackItemRecord = from_map("PointsItem", map)?;
    let reverse = match (r.xr, r.yr) {
        (Some(x), Some(y)) => Point::new(x, y),
        _ => return Err(malformed("PointsItem", format!("item {} has no reverse end (xr, yr)", r.ti_id))),
    };
    Ok(Record::TrackItem(r.into_element(ElementKind::Points { reverse })))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteRecord {
    route_num: RouteId,
    begin_signal: ElementId,
    end_signal: ElementId,
    #[serde(default)]
    items: Vec<ElementId>,
    /// Keyed by the points' id as a string, as JSON object keys are.
    #[serde(default)]
    directions: BTreeMap<String, u8>,
    #[serde(default)]
    initial_state: u8,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn route(map: Map<String, Value>) -> Result<Record, FormatError> {
    let RouteRecord { route_num, begin_signal, end_signal, items, directions, initial_state, extra } =
        from_map("Route", map)?;
    let mut route = Route::new(route_num, begin_signal, end_signal);
    route.items = items.into_iter().collect();
    for (key, code) in directions {
        let id = key.parse::<ElementId>()
            .map_err(|_| malformed("Route", format!("route {}: bad points id '{}'", route_num, key)))?;
        let dir = PointsDirection::from_code(code)
            .ok_or_else(|| malformed("Route", format!("route {}: bad direction {}", route_num, code)))?;
        route.directions.insert(id, dir);
    }
    route.initial_state = RouteState::from_code(initial_state)
        .ok_or_else(|| malformed("Route", format!("route {}: bad state {}", route_num, initial_state)))?;
    route.extra = extra;
    Ok(Record::Route(route))
}

fn position(map: Map<String, Value>) -> Result<Record, FormatError> {
    Ok(Record::Position(from_map("Position", map)?))
}

fn train_type(map: Map<String, Value>) -> Result<Record, FormatError> {
    Ok(Record::TrainType(from_map("TrainType", map)?))
}

fn service_line(map: Map<String, Value>) -> Result<Record, FormatError> {
    Ok(Record::ServiceLine(from_map("ServiceLine", map)?))
}

fn service(mut map: Map<String, Value>) -> Result<Record, FormatError> {
    let lines = take_list("Service", &mut map, "lines")?
        .into_iter()
        .map(|v| nested(v, "service line", |r| match r {
            Record::ServiceLine(x) => Ok(x),
            r => Err(r),
        }))
        .collect::<Result<Vec<_>, _>>()?;
    let mut service: Service = from_map("Service", map)?;
    service.lines = lines;
    Ok(Record::Service(service))
}

fn train(mut map: Map<String, Value>) -> Result<Record, FormatError> {
    let head = match map.remove("trainHead") {
        None | Some(Value::Null) => None,
        Some(v) => Some(nested(v, "position", |r| match r {
            Record::Position(x) => Ok(x),
            r => Err(r),
        })?),
    };
    let mut train: Train = from_map("Train", map)?;
    train.train_head = head;
    Ok(Record::Train(train))
}

fn message(map: Map<String, Value>) -> Result<Record, FormatError> {
    Ok(Record::Message(from_map("Message", map)?))
}

fn message_logger(mut map: Map<String, Value>) -> Result<Record, FormatError> {
    let messages = take_list("MessageLogger", &mut map, "messages")?
        .into_iter()
        .map(|v| nested(v, "message", |r| match r {
            Record::Message(x) => Ok(x),
            r => Err(r),
        }))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Record::MessageLogger(MessageLogger::new(messages)))
}

fn tagged<T: Serialize>(tag: &str, x: &T) -> Result<Map<String, Value>, serde_json::Error> {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), Value::from(tag));
    if let Value::Object(fields) = serde_json::to_value(x)? {
        map.extend(fields);
    }
    Ok(map)
}

fn encode_route(r: &Route) -> Result<Map<String, Value>, serde_json::Error> {
    tagged("Route", &RouteRecord {
        route_num: r.id,
        begin_signal: r.begin_signal,
        end_signal: r.end_signal,
        items: r.items.to_vec(),
        directions: r.directions.iter().map(|(id, d)| (id.to_string(), d.code())).collect(),
        initial_state: r.initial_state.code(),
        extra: r.extra.clone(),
    })
}

fn encode_service(s: &Service) -> Result<Map<String, Value>, serde_json::Error> {
    let mut map = tagged("Service", s)?;
    let lines = s.lines.iter()
        .map(|l| tagged("ServiceLine", l).map(Value::Object))
        .collect::<Result<Vec<_>, _>>()?;
    map.insert("lines".to_string(), Value::Array(lines));
    Ok(map)
}

fn encode_train(t: &Train) -> Result<Map<String, Value>, serde_json::Error> {
    let mut map = tagged("Train", t)?;
    let head = match t.train_head {
        Some(ref p) => Value::Object(tagged("Position", p)?),
        None => Value::Null,
    };
    map.insert("trainHead".to_string(), head);
    Ok(map)
}

fn encode_message_logger(log: &MessageLogger) -> Result<Map<String, Value>, serde_json::Error> {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), Value::from("MessageLogger"));
    let messages = log.messages.iter()
        .map(|m| tagged("Message", m).map(Value::Object))
        .collect::<Result<Vec<_>, _>>()?;
    map.insert("messages".to_string(), Value::Array(messages));
    Ok(map)
}

pub fn encode(sim: &SimulationRecord) -> Result<Value, serde_json::Error> {
    let mut track_items = Map::new();
    for e in &sim.track_items {
        let item = tagged(element_tag(&e.kind), &TrackItemRecord::from_element(e))?;
        track_items.insert(e.id.to_string(), Value::Object(item));
    }
    let mut routes = Map::new();
    for r in &sim.routes {
        routes.insert(r.id.to_string(), Value::Object(encode_route(r)?));
    }
    let mut train_types = Map::new();
    for (code, t) in &sim.train_types {
        train_types.insert(code.clone(), Value::Object(tagged("TrainType", t)?));
    }
    let mut services = Map::new();
    for (code, s) in &sim.services {
        services.insert(code.clone(), Value::Object(encode_service(s)?));
    }
    let trains = sim.trains.iter()
        .map(|t| encode_train(t).map(Value::Object))
        .collect::<Result<Vec<_>, _>>()?;

    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), Value::from("Simulation"));
    map.insert("options".to_string(), Value::Object(sim.options.to_map()));
    map.insert("trackItems".to_string(), Value::Object(track_items));
    map.insert("routes".to_string(), Value::Object(routes));
    map.insert("trainTypes".to_string(), Value::Object(train_types));
    map.insert("services".to_string(), Value::Object(services));
    map.insert("trains".to_string(), Value::Array(trains));
    map.insert("messageLogger".to_string(), Value::Object(encode_message_logger(&sim.message_logger)?));
    Ok(Value::Object(map))
}
