use super::notify::{Notification, Notifier};
use super::Scheduler;
use std::fmt;
use std::str::FromStr;

/// Real time between two ticks, in milliseconds.
pub const TICK_INTERVAL: u64 = 500;
pub const MAX_TIME_FACTOR: u32 = 10;

const DAY: i64 = 86_400_000;

/// Time of day in the simulation, in milliseconds since midnight.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u32);

impl SimTime {
    pub fn from_hms(h: u32, m: u32, s: u32) -> Option<SimTime> {
        if h < 24 && m < 60 && s < 60 {
            Some(SimTime(((h * 60 + m) * 60 + s) * 1000))
        } else {
            None
        }
    }

    pub fn msecs(self) -> u32 {
        self.0
    }

    /// Adds (or subtracts) milliseconds, wrapping around midnight.
    pub fn add_msecs(self, ms: i64) -> SimTime {
        SimTime((i64::from(self.0) + ms).rem_euclid(DAY) as u32)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = self.0 / 1000;
        write!(f, "{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
    }
}

#[derive(Debug, Fail, PartialEq)]
#[fail(display = "invalid time \"{}\", expected hh:mm:ss", _0)]
pub struct TimeError(pub String);

impl FromStr for SimTime {
    type Err = TimeError;
    fn from_str(s: &str) -> Result<SimTime, TimeError> {
        let err = || TimeError(s.to_string());
        let parts = s.trim().split(':')
            .map(|p| if p.len() == 2 { p.parse::<u32>().ok() } else { None })
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(err)?;
        match parts.as_slice() {
            &[h, m, sec] => SimTime::from_hms(h, m, sec).ok_or_else(err),
            _ => Err(err()),
        }
    }
}

#[derive(Debug)]
enum Timer {
    Tick,
}

/// The simulation clock.
///
/// While running with a non-zero time factor, one tick is due every
/// `TICK_INTERVAL` of real time. Each tick moves simulated time forward by
/// `TICK_INTERVAL * time_factor`. Real time is whatever the owner feeds to
/// `advance_by`, so the clock can be driven by a periodic timer or by a test.
#[derive(Debug)]
pub struct Clock {
    start_time: SimTime,
    current_time: SimTime,
    time_factor: u32,
    running: bool,
    interval: u64,
    timers: Scheduler<Timer>,
}

impl Clock {
    /// A stopped clock.
    pub fn new(start_time: SimTime, time_factor: u32) -> Clock {
        Clock {
            start_time,
            current_time: start_time,
            time_factor: time_factor.min(MAX_TIME_FACTOR),
            running: false,
            interval: TICK_INTERVAL,
            timers: Scheduler::new(),
        }
    }

    pub fn start_time(&self) -> SimTime {
        self.start_time
    }

    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    pub fn time_factor(&self) -> u32 {
        self.time_factor
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_ticking(&self) -> bool {
        self.running && self.time_factor > 0
    }

    pub fn pause(&mut self, paused: bool) {
        self.running = !paused;
        self.rearm();
    }

    /// Sets the time factor, clamped to `MAX_TIME_FACTOR`. A positive
    /// factor starts the clock, zero stops it. Returns the factor in use.
    pub fn set_time_factor(&mut self, time_factor: u32) -> u32 {
        self.time_factor = time_factor.min(MAX_TIME_FACTOR);
        self.running = self.time_factor != 0;
        self.rearm();
        self.time_factor
    }

    /// Advances simulated time by one tick, if the clock is ticking.
    pub fn tick(&mut self, notifier: &mut Notifier) -> bool {
        if !self.is_ticking() {
            return false;
        }
        let dt = self.interval * u64::from(self.time_factor);
        self.current_time = self.current_time.add_msecs(dt as i64);
        notifier.emit(Notification::TimeChanged(self.current_time));
        notifier.emit(Notification::TimeElapsed(dt as f64 / 1000.0));
        true
    }

    /// Lets `dt` milliseconds of real time pass, firing every tick that
    /// falls due. Returns the number of ticks fired. A negative or
    /// non-finite `dt` does nothing.
    pub fn advance_by(&mut self, dt: f64, notifier: &mut Notifier) -> usize {
        if !dt.is_finite() || dt < 0.0 {
            return 0;
        }
        let target = self.timers.time() + dt;
        let mut fired = 0;
        while let Some((_, Timer::Tick)) = self.timers.pop_until(target) {
            if self.tick(notifier) {
                fired += 1;
                self.timers.schedule(Timer::Tick, self.interval as f64);
            }
        }
        self.timers.advance_to(target);
        fired
    }

    /// Restarts the tick timer from now, or drops it when not ticking.
    fn rearm(&mut self) {
        self.timers.clear();
        if self.is_ticking() {
            self.timers.schedule(Timer::Tick, self.interval as f64);
        }
    }
}
