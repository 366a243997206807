//! The simulation context: one value owning the track, the interlocking, the
//! clock and the persisted data, with the operations the outside world
//! drives it through.

use crate::eventsim::clock::{Clock, SimTime};
use crate::eventsim::notify::{Listener, ListenerId, Notification, Notifier};
use crate::input::archive::{self, ArchiveError};
use crate::input::document::{self, FormatError, SimulationRecord};
use crate::input::options::Options;
use crate::output::logger::{MessageKind, MessageLogger};
use crate::railway::infrastructure::{ElementId, Infrastructure};
use crate::railway::interlocking::{Interlocking, InterlockingError};
use crate::railway::route::Route;
use crate::railway::topology::{self, LinkReport};
use crate::railway::trains::{self, Service, Train, TrainType};
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{Seek, Write};
use std::path::Path;

#[derive(Debug, Fail)]
pub enum LoadError {
    #[fail(display = "{}", _0)]
    Format(#[cause] FormatError),
    #[fail(display = "invalid simulation, not all items are linked: {}", _0)]
    Linkage(LinkReport),
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] std::io::Error),
    #[fail(display = "invalid archive: {}", _0)]
    Archive(#[cause] zip::result::ZipError),
    #[fail(display = "invalid JSON: {}", _0)]
    Json(#[cause] serde_json::Error),
}

impl From<FormatError> for LoadError {
    fn from(e: FormatError) -> Self {
        LoadError::Format(e)
    }
}

impl From<ArchiveError> for LoadError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::Io(e) => LoadError::Io(e),
            ArchiveError::Zip(e) => LoadError::Archive(e),
            ArchiveError::Json(e) => LoadError::Json(e),
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

#[derive(Debug, Fail)]
pub enum SaveError {
    #[fail(display = "the simulation must be paused before saving")]
    NotPaused,
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] std::io::Error),
    #[fail(display = "archive error: {}", _0)]
    Archive(#[cause] zip::result::ZipError),
    #[fail(display = "JSON error: {}", _0)]
    Json(#[cause] serde_json::Error),
}

impl From<ArchiveError> for SaveError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::Io(e) => SaveError::Io(e),
            ArchiveError::Zip(e) => SaveError::Archive(e),
            ArchiveError::Json(e) => SaveError::Json(e),
        }
    }
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Json(e)
    }
}

#[derive(Debug)]
pub struct Simulation {
    options: Options,
    infrastructure: Infrastructure,
    interlocking: Interlocking,
    train_types: BTreeMap<String, TrainType>,
    services: BTreeMap<String, Service>,
    trains: Vec<Train>,
    message_logger: MessageLogger,
    clock: Clock,
    notifier: Notifier,
    score: i64,
}

impl Simulation {
    /// Loads a simulation file, zipped or plain JSON.
    pub fn load(data: &[u8]) -> Result<Simulation, LoadError> {
        let doc = archive::read_document(data)?;
        Simulation::from_document(doc)
    }

    pub fn load_file(path: &Path) -> Result<Simulation, LoadError> {
        info!("Loading simulation from {}", path.display());
        let data = std::fs::read(path)?;
        Simulation::load(&data)
    }

    pub fn from_document(doc: Value) -> Result<Simulation, LoadError> {
        Simulation::from_record(document::decode(doc)?)
    }

    /// Builds the track graph, checks it, and sets up the routes and the
    /// clock. The clock is left running.
    pub fn from_record(record: SimulationRecord) -> Result<Simulation, LoadError> {
        let SimulationRecord {
            mut options,
            track_items,
            mut routes,
            train_types,
            services,
            mut trains,
            mut message_logger,
        } = record;
        message_logger.add_message("Simulation initializing", MessageKind::Software);

        let mut infrastructure = Infrastructure::new(track_items);
        debug!("Creating TrackItem links");
        let pairs = topology::create_links(&mut infrastructure);
        debug!("{} touching pairs among {} track items", pairs, infrastructure.len());
        if !topology::check_links(&infrastructure, &mut message_logger) {
            message_logger.add_message("Invalid simulation: Not all items are linked.",
                                       MessageKind::Software);
            return Err(LoadError::Linkage(topology::unlinked_items(&infrastructure)));
        }

        for route in &mut routes {
            route.initialize(&infrastructure).map_err(FormatError::Route)?;
        }
        let mut notifier = Notifier::new();
        let mut interlocking = Interlocking::new(&infrastructure, routes);
        interlocking.set_to_initial_state(&mut notifier)
            .map_err(|e| FormatError::Malformed("Route".to_string(), e.to_string()))?;

        trains::check_references(&infrastructure, &train_types, &services, &trains)
            .map_err(FormatError::Train)?;
        trains::sort_trains(&mut trains, &services);

        let start_time = options.current_time.parse::<SimTime>().map_err(FormatError::Time)?;
        let mut clock = Clock::new(start_time, options.time_factor);
        clock.pause(false);
        options.time_factor = clock.time_factor();
        let score = options.current_score;

        message_logger.add_message("Simulation loaded", MessageKind::Software);
        Ok(Simulation {
            options,
            infrastructure,
            interlocking,
            train_types,
            services,
            trains,
            message_logger,
            clock,
            notifier,
            score,
        })
    }

    /// The current state as a document record. Live values are merged into
    /// the options, and every route is written with its current state as its
    /// initial state.
    pub fn to_record(&self) -> SimulationRecord {
        let mut options = self.options.clone();
        options.current_time = self.clock.current_time().to_string();
        options.current_score = self.score;
        options.time_factor = self.clock.time_factor();

        let routes = self.interlocking.routes()
            .map(|r| {
                let mut r = r.clone();
                r.initial_state = r.state();
                r
            })
            .collect();

        SimulationRecord {
            options,
            track_items: self.infrastructure.iter().cloned().collect(),
            routes,
            train_types: self.train_types.clone(),
            services: self.services.clone(),
            trains: self.trains.clone(),
            message_logger: self.message_logger.clone(),
        }
    }

    /// Writes the simulation as a zip archive. The clock must be paused.
    pub fn save<W: Write + Seek>(&self, out: W) -> Result<W, SaveError> {
        if self.clock.is_running() {
            return Err(SaveError::NotPaused);
        }
        let doc = document::encode(&self.to_record())?;
        Ok(archive::write_document(out, &doc)?)
    }

    /// Pauses the simulation and saves it to `path`.
    pub fn save_game(&mut self, path: &Path) -> Result<(), SaveError> {
        self.pause(true);
        self.message_logger.add_message("Saving simulation", MessageKind::Software);
        let file = std::fs::File::create(path)?;
        self.save(std::io::BufWriter::new(file))?
            .flush()?;
        self.message_logger.add_message("Simulation saved", MessageKind::Software);
        Ok(())
    }

    pub fn select_signal(&mut self, signal: ElementId, persistent: bool, force: bool)
                         -> Result<(), InterlockingError> {
        self.interlocking.select_signal(signal, persistent, force,
                                        &mut self.notifier, &mut self.message_logger)
    }

    pub fn deactivate_route(&mut self, signal: ElementId) -> Result<(), InterlockingError> {
        self.interlocking.deactivate_route(signal, &mut self.notifier)
    }

    pub fn pause(&mut self, paused: bool) {
        debug!("Simulation {}", if paused { "paused" } else { "resumed" });
        self.clock.pause(paused);
    }

    /// Sets the time factor, clamped, and records it in the options.
    pub fn set_time_factor(&mut self, time_factor: u32) -> u32 {
        let time_factor = self.clock.set_time_factor(time_factor);
        self.options.time_factor = time_factor;
        time_factor
    }

    pub fn tick(&mut self) -> bool {
        self.clock.tick(&mut self.notifier)
    }

    /// Lets `real_ms` milliseconds of real time pass. Returns the number of
    /// ticks fired.
    pub fn advance(&mut self, real_ms: f64) -> usize {
        self.clock.advance_by(real_ms, &mut self.notifier)
    }

    pub fn notify_train_status(&mut self, train: usize) {
        self.notifier.emit(Notification::TrainStatusChanged(train));
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<Value> {
        self.options.get(key)
    }

    pub fn set_option(&mut self, key: &str, value: Value) -> Result<(), serde_json::Error> {
        self.options.set(key, value)
    }

    pub fn infrastructure(&self) -> &Infrastructure {
        &self.infrastructure
    }

    pub fn interlocking(&self) -> &Interlocking {
        &self.interlocking
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.interlocking.routes()
    }

    pub fn selected_signal(&self) -> Option<ElementId> {
        self.interlocking.armed()
    }

    pub fn start_time(&self) -> SimTime {
        self.clock.start_time()
    }

    pub fn current_time(&self) -> SimTime {
        self.clock.current_time()
    }

    pub fn time_factor(&self) -> u32 {
        self.clock.time_factor()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn train_types(&self) -> &BTreeMap<String, TrainType> {
        &self.train_types
    }

    pub fn services(&self) -> &BTreeMap<String, Service> {
        &self.services
    }

    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    pub fn message_logger(&self) -> &MessageLogger {
        &self.message_logger
    }

    pub fn score(&self) -> i64 {
        self.score
    }
}
