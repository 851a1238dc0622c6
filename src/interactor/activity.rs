use std::sync::atomic::{AtomicU8, Ordering};

use crate::stream::{Observable, Subject, SubjectId};

/// Position of an interactor in its activation cycle.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Not active
    Inactive = 0,
    /// Active, did_become_active has run or is running
    Active = 1,
    /// will_resign_active is running, scope not yet disposed
    Resigning = 2,
}

impl Phase {
    /// Convert from u8 to Phase
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::Active,
            2 => Phase::Resigning,
            _ => Phase::Inactive,
        }
    }
}

/// Binary active/inactive state with a replaying change stream.
///
/// The stream replays the current value to every new observer and then
/// emits only transitions. It completes when the owning interactor is
/// destroyed.
///
/// Transitions are driven by [`Interactor`](crate::Interactor); this type only
/// exposes the read side.
pub struct ActivityState {
    phase: AtomicU8,
    changes: Subject<bool>,
}

impl ActivityState {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Inactive as u8),
            changes: Subject::behavior(false),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether the owner is active. Stays `true` while it is resigning.
    pub fn is_active(&self) -> bool {
        self.phase() != Phase::Inactive
    }

    /// The change stream.
    pub fn changes(&self) -> Observable<bool> {
        self.changes.observable()
    }

    /// Identity of the change stream.
    pub fn stream_id(&self) -> SubjectId {
        self.changes.id()
    }

    /// Whether the change stream has completed.
    pub fn is_completed(&self) -> bool {
        self.changes.is_completed()
    }

    /// Inactive → Active. Returns false if already active or resigning.
    pub(crate) fn try_begin_activation(&self) -> bool {
        self.transition(Phase::Inactive, Phase::Active)
    }

    /// Active → Resigning. Returns false if inactive or already resigning.
    pub(crate) fn try_begin_resign(&self) -> bool {
        self.transition(Phase::Active, Phase::Resigning)
    }

    pub(crate) fn finish_resign(&self) {
        self.phase.store(Phase::Inactive as u8, Ordering::Release);
    }

    fn transition(&self, from: Phase, to: Phase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Publish the current value unless it is already the latest one.
    ///
    /// A transition nested inside a hook publishes first; the outer
    /// transition then finds its value already superseded and publishes
    /// nothing.
    pub(crate) fn publish(&self) {
        let active = self.is_active();
        if !self.changes.push_if_changed(active) {
            cov_mark::hit!(activity_publish_superseded);
        }
    }

    pub(crate) fn complete(&self) {
        self.changes.complete();
    }
}

impl std::fmt::Debug for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityState")
            .field("phase", &self.phase())
            .field("completed", &self.is_completed())
            .finish()
    }
}
