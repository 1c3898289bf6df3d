use thiserror::Error;

use crate::expression::domain::expression_selector::NEUTRAL_GLYPH;
use crate::overlay::domain::overlay_positioner::AnchorPoint;

/// Lifecycle of an annotation session.
///
/// Ticks may only commit in `Running`; everything else rejects writes,
/// which is what makes post-stop results harmless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Acquiring,
    Ready,
    Running,
    Stopped,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("cannot {attempted} from {from:?}")]
pub struct PhaseError {
    pub attempted: &'static str,
    pub from: SessionPhase,
}

/// What one completed inference tick observed.
#[derive(Clone, Debug, PartialEq)]
pub enum TickObservation {
    /// Primary face present: show `glyph` at `anchor` (display space).
    Face {
        glyph: &'static str,
        anchor: AnchorPoint,
    },
    /// No face this tick.
    NoFace,
}

/// Render instruction produced by a committed tick.
///
/// `anchor: None` keeps the glyph wherever it already is — the anchor
/// is intentionally not reset when a face disappears.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderCommand {
    pub glyph: &'static str,
    pub anchor: Option<AnchorPoint>,
}

/// Controller-owned session state: the one glyph on screen, its anchor,
/// the lifecycle phase, and the sequence guard for overlapping ticks.
///
/// Mutated only through the transition methods and [`commit`]; the
/// render step just carries out the returned [`RenderCommand`].
///
/// [`commit`]: AnnotationSession::commit
pub struct AnnotationSession {
    phase: SessionPhase,
    glyph: &'static str,
    anchor: Option<AnchorPoint>,
    last_committed_seq: Option<u64>,
}

impl AnnotationSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            glyph: NEUTRAL_GLYPH,
            anchor: None,
            last_committed_seq: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn glyph(&self) -> &'static str {
        self.glyph
    }

    pub fn anchor(&self) -> Option<AnchorPoint> {
        self.anchor
    }

    pub fn begin_acquire(&mut self) -> Result<(), PhaseError> {
        self.transition("begin acquisition", SessionPhase::Uninitialized, SessionPhase::Acquiring)
    }

    pub fn mark_ready(&mut self) -> Result<(), PhaseError> {
        self.transition("mark ready", SessionPhase::Acquiring, SessionPhase::Ready)
    }

    /// Enter `Running`. Returns the initial render command: the neutral
    /// glyph is on screen from the first instant, before any tick has
    /// committed.
    pub fn begin_running(&mut self) -> Result<RenderCommand, PhaseError> {
        self.transition("begin running", SessionPhase::Ready, SessionPhase::Running)?;
        Ok(RenderCommand {
            glyph: self.glyph,
            anchor: None,
        })
    }

    /// Stop the session. Idempotent; permitted from any phase so
    /// teardown never fails.
    pub fn stop(&mut self) {
        self.phase = SessionPhase::Stopped;
    }

    /// Apply one tick's observation.
    ///
    /// Returns `None` — and changes nothing — when the session is not
    /// running (late result after stop) or when `seq` is not newer than
    /// the last committed tick (out-of-order result). Otherwise updates
    /// the glyph/anchor state and returns the matching render command.
    pub fn commit(&mut self, seq: u64, observation: TickObservation) -> Option<RenderCommand> {
        if self.phase != SessionPhase::Running {
            return None;
        }
        if let Some(last) = self.last_committed_seq {
            if seq <= last {
                return None;
            }
        }
        self.last_committed_seq = Some(seq);

        match observation {
            TickObservation::Face { glyph, anchor } => {
                self.glyph = glyph;
                self.anchor = Some(anchor);
                Some(RenderCommand {
                    glyph,
                    anchor: Some(anchor),
                })
            }
            TickObservation::NoFace => {
                self.glyph = NEUTRAL_GLYPH;
                Some(RenderCommand {
                    glyph: NEUTRAL_GLYPH,
                    anchor: None,
                })
            }
        }
    }

    fn transition(
        &mut self,
        attempted: &'static str,
        from: SessionPhase,
        to: SessionPhase,
    ) -> Result<(), PhaseError> {
        if self.phase != from {
            return Err(PhaseError {
                attempted,
                from: self.phase,
            });
        }
        self.phase = to;
        Ok(())
    }
}

impl Default for AnnotationSession {
    fn default() -> Self {
        Self::new()
    }
}
