use rand::Rng;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FILE_FORMAT: &str = "0.7";

/// A random duration in seconds, given as `(low, high, weight)` segments.
/// A segment is chosen with probability `weight` percent, and the value is
/// drawn uniformly between its bounds.
#[derive(Clone, Debug, PartialEq)]
pub enum DurationProba {
    Null,
    Fixed(f64),
    Segments(Vec<(f64, f64, f64)>),
}

impl DurationProba {
    pub fn is_null(&self) -> bool {
        *self == DurationProba::Null
    }

    /// Reads the old string notation, e.g. `"[(45,75,70),(75,90,30)]"`.
    /// Anything unreadable gives a null distribution.
    pub fn parse_legacy(s: &str) -> DurationProba {
        if let Ok(x) = s.trim().parse::<f64>() {
            return DurationProba::Fixed(x);
        }
        match parse_segments(s) {
            Some(v) => DurationProba::Segments(v),
            None => DurationProba::Null,
        }
    }

    pub fn yield_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        let segments = match *self {
            DurationProba::Null => return None,
            DurationProba::Fixed(x) => return Some(x),
            DurationProba::Segments(ref s) => s,
        };
        let r0 = 100.0 * rng.gen::<f64>();
        let mut low_bound = 0.0;
        for &(low, high, weight) in segments {
            if low_bound < r0 && r0 < low_bound + weight {
                return Some(low + rng.gen::<f64>() * (high - low));
            }
            low_bound += weight;
        }
        // Out of range: the upper bound of the last segment.
        segments.last().map(|s| s.1)
    }
}

fn parse_segments(s: &str) -> Option<Vec<(f64, f64, f64)>> {
    let whole = Regex::new(r"^\s*\[(\s*\([^()]*\)\s*,?)*\s*\]\s*$").ok()?;
    let segment = Regex::new(r"\(\s*(-?[\d.]+)\s*,\s*(-?[\d.]+)\s*,\s*(-?[\d.]+)\s*\)").ok()?;
    if !whole.is_match(s) {
        return None;
    }
    segment.captures_iter(s)
        .map(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)))
        .collect()
}

impl Serialize for DurationProba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            DurationProba::Null => serializer.serialize_none(),
            DurationProba::Fixed(x) => serializer.serialize_f64(x),
            DurationProba::Segments(ref s) => s.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DurationProba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<DurationProba, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(DurationProba::Null),
            Value::String(s) => Ok(DurationProba::parse_legacy(&s)),
            Value::Number(n) => n.as_f64()
                .map(DurationProba::Fixed)
                .ok_or_else(|| de::Error::custom("invalid duration")),
            v @ Value::Array(_) => serde_json::from_value(v)
                .map(DurationProba::Segments)
                .map_err(de::Error::custom),
            _ => Err(de::Error::custom("expected a list of (low, high, weight) triples")),
        }
    }
}

/// Flags are stored as 0/1.
mod int_bool {
    use super::*;

    pub fn serialize<S: Serializer>(x: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(if *x { 1 } else { 0 })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().map(|x| x != 0.0).unwrap_or(false)),
            _ => Err(de::Error::custom("expected 0 or 1")),
        }
    }
}

/// Simulation options. Missing keys take the built-in defaults; unknown keys
/// are kept as they are.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub title: String,
    pub description: String,
    pub version: String,
    pub time_factor: u32,
    pub current_time: String,
    pub warning_speed: f64,
    pub current_score: i64,
    pub default_max_speed: f64,
    pub default_minimum_stop_time: DurationProba,
    pub default_delay_at_entry: DurationProba,
    #[serde(with = "int_bool")]
    pub track_circuit_based: bool,
    pub default_signal_visibility: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            title: String::new(),
            description: String::new(),
            version: FILE_FORMAT.to_string(),
            time_factor: 5,
            current_time: "06:00:00".to_string(),
            warning_speed: 8.3,
            current_score: 0,
            default_max_speed: 44.44,
            default_minimum_stop_time: DurationProba::Segments(vec![(45.0, 75.0, 70.0), (75.0, 90.0, 30.0)]),
            default_delay_at_entry: DurationProba::Segments(vec![(-60.0, 0.0, 50.0), (0.0, 60.0, 50.0)]),
            track_circuit_based: false,
            default_signal_visibility: 100.0,
            extra: Map::new(),
        }
    }
}

impl Options {
    pub fn from_map(map: Map<String, Value>) -> Result<Options, serde_json::Error> {
        serde_json::from_value(Value::Object(map))
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.to_map().remove(key)
    }

    /// Sets one option by key. On a value of the wrong type the options are
    /// left unchanged.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), serde_json::Error> {
        let mut map = self.to_map();
        map.insert(key.to_string(), value);
        *self = Options::from_map(map)?;
        Ok(())
    }
}
