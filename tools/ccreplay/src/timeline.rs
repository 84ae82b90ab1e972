use crate::config::PlaybackConfig;
use crate::types::Turn;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Paused,
    Playing,
    Finished,
}

impl TransportState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Paused => "paused",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayToggle {
    Started,
    Stopped,
    /// Nothing left to play.
    Refused,
}

/// Speed multiplier clamped to `[min, max]`, moved in fixed steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedControl {
    value: f64,
    min: f64,
    max: f64,
    step: f64,
}

impl SpeedControl {
    pub fn new(initial: f64, min: f64, max: f64, step: f64) -> Self {
        let mut control = Self {
            value: min,
            min,
            max,
            step,
        };
        control.value = control.snap(initial);
        control
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns false when already at the upper bound.
    pub fn increase(&mut self) -> bool {
        self.set((self.value + self.step).min(self.max))
    }

    /// Returns false when already at the lower bound.
    pub fn decrease(&mut self) -> bool {
        self.set((self.value - self.step).max(self.min))
    }

    fn set(&mut self, next: f64) -> bool {
        let next = self.snap(next);
        if (next - self.value).abs() < f64::EPSILON {
            return false;
        }
        self.value = next;
        true
    }

    /// Nearest point of the grid `min + k * step`. Both bounds are always
    /// reachable, even when `max` is off the grid.
    fn snap(&self, value: f64) -> f64 {
        if value >= self.max {
            return self.max;
        }
        if value <= self.min {
            return self.min;
        }
        let steps = ((value - self.min) / self.step).round();
        (self.min + steps * self.step).clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoplayTimer {
    deadline: Option<SystemTime>,
}

impl AutoplayTimer {
    pub fn arm(&mut self, now: SystemTime, interval: Duration) {
        self.deadline = Some(now + interval);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn due(&self, now: SystemTime) -> bool {
        self.deadline.map(|deadline| now >= deadline).unwrap_or(false)
    }

    pub fn remaining(&self, now: SystemTime) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.duration_since(now).unwrap_or(Duration::ZERO))
    }
}

/// Turn sequence, cursor and transport state for one session.
///
/// The timeline never renders. Callers render the turn at [`Timeline::cursor`]
/// and only then call [`Timeline::commit_advance`], so a failed render leaves
/// the cursor where it was.
#[derive(Debug, Clone)]
pub struct Timeline {
    turns: Vec<Turn>,
    cursor: usize,
    state: TransportState,
    speed: SpeedControl,
    base_interval: Duration,
    timer: AutoplayTimer,
}

impl Timeline {
    pub fn new(turns: Vec<Turn>, playback: &PlaybackConfig) -> Self {
        Self {
            turns,
            cursor: 0,
            state: TransportState::Idle,
            speed: SpeedControl::new(
                playback.initial_speed,
                playback.min_speed,
                playback.max_speed,
                playback.speed_step,
            ),
            base_interval: playback.base_interval(),
            timer: AutoplayTimer::default(),
        }
    }

    pub fn turn(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn speed(&self) -> f64 {
        self.speed.value()
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_finished(&self) -> bool {
        self.state == TransportState::Finished
    }

    /// Tick period at the current speed.
    pub fn interval(&self) -> Duration {
        let nanos = self.base_interval.as_nanos() as f64 / self.speed.value();
        Duration::from_nanos(nanos.round() as u64)
    }

    pub fn start(&mut self) {
        if self.state == TransportState::Idle {
            self.state = if self.turns.is_empty() {
                TransportState::Finished
            } else {
                TransportState::Paused
            };
        }
    }

    pub fn toggle_autoplay(&mut self, now: SystemTime) -> AutoplayToggle {
        match self.state {
            TransportState::Finished => AutoplayToggle::Refused,
            TransportState::Playing => {
                self.state = TransportState::Paused;
                self.timer.disarm();
                AutoplayToggle::Stopped
            }
            TransportState::Idle | TransportState::Paused => {
                self.state = TransportState::Playing;
                self.timer.arm(now, self.interval());
                AutoplayToggle::Started
            }
        }
    }

    pub fn tick_due(&self, now: SystemTime) -> bool {
        self.is_playing() && self.timer.due(now)
    }

    /// Schedules the next tick one full period after `now`.
    pub fn rearm(&mut self, now: SystemTime) {
        if self.is_playing() {
            self.timer.arm(now, self.interval());
        }
    }

    /// How long the event loop may block waiting for input.
    pub fn wait_timeout(&self, now: SystemTime, idle_poll: Duration) -> Duration {
        match (self.is_playing(), self.timer.remaining(now)) {
            (true, Some(remaining)) => remaining,
            _ => idle_poll,
        }
    }

    /// Moves past the turn that was just rendered at the cursor.
    pub fn commit_advance(&mut self) {
        if self.cursor < self.turns.len() {
            self.cursor += 1;
        }
        if self.cursor >= self.turns.len() {
            self.mark_finished();
        }
    }

    pub fn mark_finished(&mut self) {
        self.state = TransportState::Finished;
        self.timer.disarm();
    }

    /// Leaves `finished` without moving the cursor, e.g. after a turn was
    /// hidden and can be shown again.
    pub fn reopen(&mut self) {
        if self.state == TransportState::Finished {
            self.state = TransportState::Paused;
        }
    }

    /// Moves the cursor back so the turn at `index` is the next to render.
    pub fn rewind_to(&mut self, index: usize) {
        if index < self.cursor {
            self.cursor = index;
            self.reopen();
        }
    }

    pub fn speed_up(&mut self, now: SystemTime) -> bool {
        let changed = self.speed.increase();
        if changed {
            self.rearm(now);
        }
        changed
    }

    pub fn speed_down(&mut self, now: SystemTime) -> bool {
        let changed = self.speed.decrease();
        if changed {
            self.rearm(now);
        }
        changed
    }

    pub fn restart(&mut self) {
        self.cursor = 0;
        self.timer.disarm();
        self.state = if self.turns.is_empty() {
            TransportState::Finished
        } else {
            TransportState::Paused
        };
    }
}
