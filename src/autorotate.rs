// autorotate.rs — 自动旋转：速度解析与 Idle / Pending / Running 状态机

use crate::error::{Result, ViewerError};
use crate::geometry::normalize_longitude;
use crate::timer::{TimerHandle, TimerQueue};
use std::f64::consts::{PI, TAU};
use std::time::Duration;

pub const FRAMES_PER_SECOND: f64 = 60.0;

/// Fraction of the remaining latitude removed on every tick.
const LATITUDE_DECAY: f64 = 1.0 / 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AngleUnit {
    Revolutions,
    Degrees,
    Radians,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Second,
    Minute,
}

fn angle_unit(s: &str) -> Option<AngleUnit> {
    match s {
        "revolutions" | "revolution" | "revs" | "rev" | "r" | "turns" | "turn" => Some(AngleUnit::Revolutions),
        "degrees" | "degree" | "degs" | "deg" | "d" => Some(AngleUnit::Degrees),
        "radians" | "radian" | "rads" | "rad" => Some(AngleUnit::Radians),
        _ => None,
    }
}

fn time_unit(s: &str) -> Option<TimeUnit> {
    match s {
        "second" | "seconds" | "sec" | "s" => Some(TimeUnit::Second),
        "minute" | "minutes" | "min" | "m" => Some(TimeUnit::Minute),
        _ => None,
    }
}

fn parse_unit(unit: &str) -> Option<(AngleUnit, TimeUnit)> {
    match unit {
        "rpm" => return Some((AngleUnit::Revolutions, TimeUnit::Minute)),
        "rps" => return Some((AngleUnit::Revolutions, TimeUnit::Second)),
        "dpm" => return Some((AngleUnit::Degrees, TimeUnit::Minute)),
        "dps" => return Some((AngleUnit::Degrees, TimeUnit::Second)),
        _ => {}
    }

    let (angle, time) = match unit.split_once(" per ") {
        Some(parts) => parts,
        None => unit.split_once('/')?,
    };
    Some((angle_unit(angle.trim())?, time_unit(time.trim())?))
}

/// Parses strings like `"2rpm"`, `"-10 dps"` or `"1 radians per minute"`
/// into radians per second.
pub fn parse_speed(speed: &str) -> Result<f64> {
    let trimmed = speed.trim();
    let split = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| ViewerError::InvalidSpeed(speed.to_string()))?;
    if !value.is_finite() {
        return Err(ViewerError::InvalidSpeed(speed.to_string()));
    }

    let unit = unit
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let (angle, time) = parse_unit(&unit).ok_or_else(|| ViewerError::InvalidSpeedUnit(unit.clone()))?;

    let per_second = match time {
        TimeUnit::Second => value,
        TimeUnit::Minute => value / 60.0,
    };
    Ok(match angle {
        AngleUnit::Revolutions => per_second * TAU,
        AngleUnit::Degrees => per_second * PI / 180.0,
        AngleUnit::Radians => per_second,
    })
}

/// One autorotation tick: move the longitude back by `offset` (kept inside
/// one turn) and ease the latitude back towards the equator.
pub fn step(theta: f64, phi: f64, offset: f64) -> (f64, f64) {
    (normalize_longitude(theta - offset), phi - phi * LATITUDE_DECAY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutorotateState {
    Idle,
    Pending(TimerHandle),
    Running(TimerHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Begin,
    Tick,
}

/// What the owner has to do after a timer fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutorotateStep {
    Started,
    Tick { offset: f64 },
}

/// Drives the autorotation timers. Orientation itself lives elsewhere: the
/// owner applies each [`AutorotateStep::Tick`] through its rotate operation.
#[derive(Debug)]
pub struct Autorotation {
    state: AutorotateState,
    timers: TimerQueue<Task>,
    delay: Option<Duration>,
    speed: f64,
}

impl Autorotation {
    /// `delay` of `None` disables the automatic start after load.
    pub fn new(delay: Option<Duration>, speed: f64) -> Self {
        Self {
            state: AutorotateState::Idle,
            timers: TimerQueue::new(),
            delay,
            speed,
        }
    }

    pub fn tick_interval() -> Duration {
        Duration::from_secs_f64(1.0 / FRAMES_PER_SECOND)
    }

    pub fn state(&self) -> AutorotateState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, AutorotateState::Running(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, AutorotateState::Pending(_))
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Longitude added on every tick.
    pub fn offset(&self) -> f64 {
        self.speed / FRAMES_PER_SECOND
    }

    /// Idle → Pending. Does nothing when the delay is disabled or the
    /// controller is already pending or running.
    pub fn schedule(&mut self, now: Duration) -> bool {
        let Some(delay) = self.delay else {
            return false;
        };
        if self.state != AutorotateState::Idle {
            return false;
        }
        let h = self.timers.schedule(now + delay, Task::Begin);
        self.state = AutorotateState::Pending(h);
        true
    }

    /// Enters Running right away. Returns true if the state changed.
    pub fn start(&mut self, now: Duration) -> bool {
        if self.is_running() {
            return false;
        }
        self.timers.clear();
        let h = self.timers.schedule(now + Self::tick_interval(), Task::Tick);
        self.state = AutorotateState::Running(h);
        true
    }

    /// Cancels both timers. Returns true if the controller left Pending or
    /// Running; stopping an idle controller is a no-op.
    pub fn stop(&mut self) -> bool {
        self.timers.clear();
        let was_active = self.state != AutorotateState::Idle;
        self.state = AutorotateState::Idle;
        was_active
    }

    /// Fires the next due timer, if any. Timers whose handle no longer
    /// matches the current state are dropped.
    pub fn poll(&mut self, now: Duration) -> Option<AutorotateStep> {
        while let Some((handle, task)) = self.timers.pop_due(now) {
            match (self.state, task) {
                (AutorotateState::Pending(h), Task::Begin) if h == handle => {
                    let next = self.timers.schedule(now + Self::tick_interval(), Task::Tick);
                    self.state = AutorotateState::Running(next);
                    return Some(AutorotateStep::Started);
                }
                (AutorotateState::Running(h), Task::Tick) if h == handle => {
                    let next = self.timers.schedule(now + Self::tick_interval(), Task::Tick);
                    self.state = AutorotateState::Running(next);
                    return Some(AutorotateStep::Tick { offset: self.offset() });
                }
                _ => log::debug!("dropping stale autorotate timer {:?}", handle),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parses_documented_speeds() {
        assert!(approx(parse_speed("2rpm").unwrap(), 4.0 * PI / 60.0));
        assert!((parse_speed("2rpm").unwrap() - 0.2094).abs() < 1e-4);
        assert!(approx(parse_speed("180 degrees per second").unwrap(), PI));
        assert!(approx(parse_speed("1 radians per minute").unwrap(), 1.0 / 60.0));
    }

    #[test]
    fn parses_abbreviations_and_signs() {
        assert!(approx(parse_speed("-1 rps").unwrap(), -TAU));
        assert!(approx(parse_speed("60dpm").unwrap(), PI / 180.0));
        assert!(approx(parse_speed("90 deg/s").unwrap(), PI / 2.0));
        assert!(approx(parse_speed("0.5 Revolutions  Per  Minute").unwrap(), TAU / 120.0));
        assert!(approx(parse_speed("3 rad/min").unwrap(), 0.05));
    }

    #[test]
    fn unknown_unit_is_an_error() {
        assert!(matches!(parse_speed("2 furlongs"), Err(ViewerError::InvalidSpeedUnit(u)) if u == "furlongs"));
        assert!(matches!(parse_speed("2"), Err(ViewerError::InvalidSpeedUnit(_))));
        assert!(matches!(parse_speed("fast"), Err(ViewerError::InvalidSpeed(_))));
        assert!(matches!(parse_speed("1.2.3rpm"), Err(ViewerError::InvalidSpeed(_))));
    }

    #[test]
    fn latitude_decays_without_overshoot() {
        for start in [0.3, -0.3, std::f64::consts::FRAC_PI_2] {
            let (mut theta, mut phi) = (0.0, start);
            for _ in 0..5000 {
                let (t, p) = step(theta, phi, 0.01);
                assert!(p.abs() < phi.abs());
                assert_eq!(p.signum(), start.signum());
                theta = t;
                phi = p;
            }
            assert!(phi.abs() < 1e-9);
            assert!((0.0..TAU).contains(&theta));
        }
    }

    #[test]
    fn positive_offset_moves_longitude_back() {
        let (t, _) = step(1.0, 0.0, 0.01);
        assert!(approx(t, 0.99));
        let (t, _) = step(1.0, 0.0, -0.01);
        assert!(approx(t, 1.01));
    }

    #[test]
    fn longitude_stays_within_one_turn() {
        let (t, _) = step(0.001, 0.0, 0.01);
        assert!(approx(t, TAU - 0.009));
        let (t, _) = step(TAU - 0.001, 0.0, -0.01);
        assert!(approx(t, 0.009));
    }

    #[test]
    fn pending_becomes_running_after_delay() {
        let mut a = Autorotation::new(Some(ms(2000)), 1.0);
        assert!(a.schedule(ms(0)));
        assert!(a.is_pending());
        assert!(!a.schedule(ms(10)));
        assert_eq!(a.poll(ms(1999)), None);
        assert_eq!(a.poll(ms(2000)), Some(AutorotateStep::Started));
        assert!(a.is_running());
        assert_eq!(a.poll(ms(2000)), None);
        assert_eq!(a.poll(ms(2017)), Some(AutorotateStep::Tick { offset: 1.0 / 60.0 }));
    }

    #[test]
    fn disabled_delay_never_schedules() {
        let mut a = Autorotation::new(None, 1.0);
        assert!(!a.schedule(ms(0)));
        assert_eq!(a.state(), AutorotateState::Idle);
        assert!(a.start(ms(0)));
        assert!(a.is_running());
    }

    #[test]
    fn stop_cancels_everything_and_is_idempotent() {
        let mut a = Autorotation::new(Some(ms(100)), 1.0);
        a.schedule(ms(0));
        assert!(a.stop());
        assert!(!a.stop());
        assert_eq!(a.poll(ms(10_000)), None);

        a.start(ms(0));
        assert!(a.stop());
        assert_eq!(a.poll(ms(10_000)), None);
        assert_eq!(a.state(), AutorotateState::Idle);
    }

    #[test]
    fn restart_ignores_ticks_from_previous_run() {
        let mut a = Autorotation::new(None, 6.0);
        a.start(ms(0));
        a.stop();
        a.start(ms(5));
        // only the tick scheduled by the second start may fire
        assert_eq!(a.poll(ms(17)), None);
        assert!(matches!(a.poll(ms(22)), Some(AutorotateStep::Tick { .. })));
    }
}
