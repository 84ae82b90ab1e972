use crate::errors::ReplayError;
use crate::runtime::Clock;
use crate::screen::Screen;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative skip request shared between the reveal engine and whoever
/// handles input while a reveal is in flight.
#[derive(Debug, Clone, Default)]
pub struct SkipToken(Arc<AtomicBool>);

impl SkipToken {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Waits between revealed characters and words. This is the only place a
/// render hands control back to the event loop.
pub trait Pacer {
    fn pause(&mut self, delay: Duration, skip: &SkipToken) -> Result<(), ReplayError>;
}

/// Plain sleeping pacer for batch output.
pub struct SleepPacer {
    clock: Arc<dyn Clock>,
}

impl SleepPacer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Pacer for SleepPacer {
    fn pause(&mut self, delay: Duration, _skip: &SkipToken) -> Result<(), ReplayError> {
        self.clock.sleep(delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealTiming {
    pub char_delay: Duration,
    pub word_delay: Duration,
}

pub struct RevealEngine {
    enabled: bool,
    timing: RevealTiming,
    speed: f64,
    skip: SkipToken,
    streaming: bool,
}

impl RevealEngine {
    pub fn new(enabled: bool, timing: RevealTiming) -> Self {
        Self {
            enabled,
            timing,
            speed: 1.0,
            skip: SkipToken::default(),
            streaming: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn skip_token(&self) -> SkipToken {
        self.skip.clone()
    }

    /// Ends a skip. A skip stays in force across reveals until this is
    /// called, so one request flushes every remaining block of a turn.
    pub fn reset_skip(&self) {
        self.skip.clear();
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }

    /// Writes `text` progressively. Returns once everything is on screen,
    /// either paced out or flushed after a skip request. A pending skip
    /// writes `text` at once.
    pub fn reveal(
        &mut self,
        text: &str,
        screen: &mut Screen,
        pacer: &mut dyn Pacer,
    ) -> Result<(), ReplayError> {
        if !self.enabled {
            return screen.write(text);
        }
        self.streaming = true;
        let result = self.stream(text, screen, pacer);
        self.streaming = false;
        result
    }

    fn stream(
        &self,
        text: &str,
        screen: &mut Screen,
        pacer: &mut dyn Pacer,
    ) -> Result<(), ReplayError> {
        let char_delay = self.scaled(self.timing.char_delay);
        let word_delay = self.scaled(self.timing.word_delay);
        // Byte offset of everything already written; a skip flushes the rest.
        let mut pos = 0usize;

        for (line_idx, line) in text.split('\n').enumerate() {
            if line_idx > 0 {
                screen.write("\n")?;
                pos += 1;
            }
            if self.skip.is_requested() {
                return screen.write(&text[pos..]);
            }

            let words = line.split(' ').collect::<Vec<_>>();
            for (word_idx, word) in words.iter().enumerate() {
                if word_idx > 0 {
                    screen.write(" ")?;
                    pos += 1;
                }
                for ch in word.chars() {
                    if self.skip.is_requested() {
                        return screen.write(&text[pos..]);
                    }
                    let mut buf = [0u8; 4];
                    screen.write(ch.encode_utf8(&mut buf))?;
                    pos += ch.len_utf8();
                    if !char_delay.is_zero() {
                        pacer.pause(char_delay, &self.skip)?;
                    }
                }
                if word_idx + 1 < words.len()
                    && !word_delay.is_zero()
                    && !self.skip.is_requested()
                {
                    pacer.pause(word_delay, &self.skip)?;
                }
            }
        }
        Ok(())
    }

    fn scaled(&self, delay: Duration) -> Duration {
        Duration::from_nanos((delay.as_nanos() as f64 / self.speed).round() as u64)
    }
}
