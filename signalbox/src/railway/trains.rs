//! Train types, services and trains.
//!
//! The core only keeps these so that they survive loading and saving, and
//! checks that they refer to things that exist. Moving the trains is the job
//! of the train logic built on top of the simulation.

use super::infrastructure::{ElementId, Infrastructure};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "trackItem")]
    pub track_item: ElementId,
    #[serde(rename = "previousTI")]
    pub previous_item: Option<ElementId>,
    #[serde(rename = "positionOnTI", default)]
    pub position_on_item: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainType {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLine {
    pub place_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_code: Option<String>,
    #[serde(default)]
    pub scheduled_arrival_time: String,
    #[serde(default)]
    pub scheduled_departure_time: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub service_code: String,
    #[serde(default)]
    pub description: String,
    /// Encoded as tagged records by the document codec.
    #[serde(skip)]
    pub lines: Vec<ServiceLine>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Train {
    #[serde(default)]
    pub service_code: String,
    #[serde(default)]
    pub train_type_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appear_time: Option<String>,
    /// Encoded as a tagged record by the document codec.
    #[serde(skip)]
    pub train_head: Option<Position>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Fail, PartialEq)]
pub enum TrainError {
    #[fail(display = "unknown service \"{}\"", _0)]
    UnknownService(String),
    #[fail(display = "unknown train type \"{}\"", _0)]
    UnknownTrainType(String),
    #[fail(display = "unknown place \"{}\"", _0)]
    UnknownPlace(String),
    #[fail(display = "train position on unknown track item {}", _0)]
    UnknownTrackItem(ElementId),
}

pub fn check_references(inf: &Infrastructure,
                        train_types: &BTreeMap<String, TrainType>,
                        services: &BTreeMap<String, Service>,
                        trains: &[Train])
                        -> Result<(), TrainError> {
    for line in services.values().flat_map(|s| s.lines.iter()) {
        if inf.place(&line.place_code).is_none() {
            return Err(TrainError::UnknownPlace(line.place_code.clone()));
        }
    }
    for train in trains {
        if !train.service_code.is_empty() && !services.contains_key(&train.service_code) {
            return Err(TrainError::UnknownService(train.service_code.clone()));
        }
        if !train.train_type_code.is_empty() && !train_types.contains_key(&train.train_type_code) {
            return Err(TrainError::UnknownTrainType(train.train_type_code.clone()));
        }
        if let Some(ref head) = train.train_head {
            for &id in [Some(head.track_item), head.previous_item].iter().flatten() {
                if !inf.contains(id) {
                    return Err(TrainError::UnknownTrackItem(id));
                }
            }
        }
    }
    Ok(())
}

/// Orders trains by the scheduled departure of their service's first stop,
/// falling back to the service code.
pub fn sort_trains(trains: &mut Vec<Train>, services: &BTreeMap<String, Service>) {
    fn key(train: &Train, services: &BTreeMap<String, Service>) -> String {
        services.get(&train.service_code)
            .and_then(|s| s.lines.first())
            .map(|l| l.scheduled_departure_time.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| train.service_code.clone())
    }
    trains.sort_by_cached_key(|t| key(t, services));
}
