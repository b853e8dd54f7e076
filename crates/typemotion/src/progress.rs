//! Simulated progress for the generation stages.
//!
//! The service gives no progress events, so while a stage is in flight two
//! periodic tasks run next to it: one rotates the phase label, the other
//! creeps the percentage toward the stage cap with a decaying increment. The
//! real completion of the stage then jumps straight to its checkpoint.
//!
//! Teardown is the owner's job: the tick callback returns `false` once the
//! stage it was started for is over, and [`ProgressTicker::stop`] aborts both
//! tasks. The callback runs under the session lock, so a tick can never land
//! after the transition that ended its stage.

use crate::config::ProgressConfig;
use crate::presets::{IMAGE_INITIAL_LABEL, IMAGE_PHASE_LABELS, VIDEO_INITIAL_LABEL, VIDEO_PHASE_LABELS};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A generation stage with simulated progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Keyframe generation
    Image,
    /// Video generation
    Video,
}

impl Stage {
    /// Percentage the simulation never exceeds during this stage
    #[must_use]
    pub fn cap(self, config: &ProgressConfig) -> f64 {
        match self {
            Self::Image => config.image_cap,
            Self::Video => config.video_cap,
        }
    }

    /// Labels rotated during this stage
    #[must_use]
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Image => &IMAGE_PHASE_LABELS,
            Self::Video => &VIDEO_PHASE_LABELS,
        }
    }

    /// Label published on entry
    #[must_use]
    pub const fn initial_label(self) -> &'static str {
        match self {
            Self::Image => IMAGE_INITIAL_LABEL,
            Self::Video => VIDEO_INITIAL_LABEL,
        }
    }
}

/// One step of the decaying creep toward `cap`.
///
/// `jitter_unit` is a uniform sample in `[0, 1)`, scaled by `config.jitter`.
/// The result never exceeds `cap` and never drops below `current`.
#[must_use]
pub fn advance(current: f64, cap: f64, config: &ProgressConfig, jitter_unit: f64) -> f64 {
    if current >= cap {
        return current;
    }
    let decayed = (cap - current) / config.decay_divisor;
    let increment = decayed.max(config.min_increment) + jitter_unit * config.jitter;
    (current + increment).min(cap)
}

/// Which periodic process fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Rotate the phase label
    Label,
    /// Advance the percentage
    Progress,
}

/// Handle on the two periodic tasks of one stage
#[derive(Debug)]
pub struct ProgressTicker {
    tasks: Vec<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Spawn the label and progress tasks.
    ///
    /// Both fire for the first time one period after start, like
    /// `setInterval`. A callback returning `false` ends its task.
    pub fn start<F>(config: &ProgressConfig, on_tick: F) -> Self
    where
        F: Fn(Tick) -> bool + Send + Sync + 'static,
    {
        let on_tick = Arc::new(on_tick);
        let tasks = [
            (Tick::Label, config.label_interval()),
            (Tick::Progress, config.tick_interval()),
        ]
        .into_iter()
        .map(|(tick, period)| {
            let on_tick = Arc::clone(&on_tick);
            tokio::spawn(async move {
                let mut interval = interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if !on_tick(tick) {
                        break;
                    }
                }
            })
        })
        .collect();

        Self { tasks }
    }

    /// Abort both tasks
    pub fn stop(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.abort_all();
    }
}
