use std::{
    fmt::Display,
    sync::{mpsc::Sender, Arc, Mutex},
};

/// A stage of installing or launching a version.
///
/// # Order
/// 1) Resolving (manifest, version JSON, loader profile)
/// 2) Client jar + logging config
/// 3) Libraries
/// 4) Assets
/// 5) Natives
///
/// Java installation reports on its own [`ProgressSender`]
/// with [`Phase::Java`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    ClientJar,
    Libraries,
    Assets,
    Natives,
    Java,
    Done,
}

impl Phase {
    /// The slice of the overall `0.0..=1.0` bar this phase occupies.
    #[must_use]
    pub const fn band(self) -> (f32, f32) {
        match self {
            Phase::Resolving => (0.0, 0.05),
            Phase::ClientJar => (0.05, 0.1),
            Phase::Libraries => (0.1, 0.4),
            Phase::Assets => (0.4, 0.95),
            Phase::Natives => (0.95, 1.0),
            Phase::Java => (0.0, 1.0),
            Phase::Done => (1.0, 1.0),
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Phase::Resolving => "Resolving",
                Phase::ClientJar => "Client",
                Phase::Libraries => "Libraries",
                Phase::Assets => "Assets",
                Phase::Natives => "Natives",
                Phase::Java => "Java",
                Phase::Done => "Done",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub done: usize,
    pub total: usize,
    /// Overall progress, `0.0..=1.0`. Never decreases
    /// between events of the same [`ProgressSender`].
    pub fraction: f32,
    pub message: Option<String>,
}

impl Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} / {}", self.phase, self.done, self.total)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Sends [`ProgressEvent`]s to whoever holds the receiving end
/// (a progress bar, a log, or nobody).
///
/// Clones share the high-water mark, so concurrent
/// workers can't make the bar go backwards.
#[derive(Clone, Default)]
pub struct ProgressSender {
    sender: Option<Sender<ProgressEvent>>,
    high_water: Arc<Mutex<f32>>,
}

impl ProgressSender {
    #[must_use]
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
            high_water: Arc::default(),
        }
    }

    /// A sender that discards everything.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn report(&self, phase: Phase, done: usize, total: usize, message: Option<String>) {
        let Some(sender) = &self.sender else {
            return;
        };

        let (start, end) = phase.band();
        #[allow(clippy::cast_precision_loss)]
        let local = if total == 0 {
            1.0
        } else {
            (done.min(total) as f32) / (total as f32)
        };
        let mut fraction = start + (end - start) * local;

        if let Ok(mut high_water) = self.high_water.lock() {
            if fraction < *high_water {
                fraction = *high_water;
            } else {
                *high_water = fraction;
            }
        }

        // The receiver going away just means nobody is watching.
        _ = sender.send(ProgressEvent {
            phase,
            done,
            total,
            fraction,
            message,
        });
    }

    pub fn finished(&self) {
        self.report(Phase::Done, 1, 1, None);
    }
}
