//! Pipeline state management

/// Pipeline state machine
///
/// Represents the current state of the playback pipeline. State transitions
/// are validated to ensure consistent behavior between the controller and
/// the delay stage.
///
/// `#[repr(u8)]` so the value can be shared across the producer and consumer
/// tasks through an `AtomicU8` without locks.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Pipeline is stopped; the delay buffer is empty and pushes are rejected
    Stopped = 0,

    /// Pipeline is accepting frames and releasing delayed output
    Playing = 1,

    /// Dataflow is halted; buffered frames are retained, incoming discarded
    Paused = 2,
}

impl PipelineState {
    /// Convert from a raw u8 value. Returns Stopped for invalid values.
    #[inline]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Playing,
            2 => PipelineState::Paused,
            _ => PipelineState::Stopped,
        }
    }

    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            // stop() is always accepted
            (_, Stopped) => true,

            // play() starts or resumes
            (Stopped, Playing) => true,
            (Paused, Playing) => true,

            // pause() only makes sense while playing
            (Playing, Paused) => true,

            // Self-transitions
            (a, b) if *a == b => true,

            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            PipelineState::Stopped => "Stopped",
            PipelineState::Playing => "Playing",
            PipelineState::Paused => "Paused",
        }
    }

    /// Check if the pipeline is currently active (playing or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, PipelineState::Playing | PipelineState::Paused)
    }

    /// Check if the pipeline is playing
    pub fn is_playing(&self) -> bool {
        matches!(self, PipelineState::Playing)
    }

    /// Check if the pipeline is paused
    pub fn is_paused(&self) -> bool {
        matches!(self, PipelineState::Paused)
    }

    /// Check if the pipeline is stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, PipelineState::Stopped)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
