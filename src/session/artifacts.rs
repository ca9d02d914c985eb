//! Artifact lifecycle: the pending, active and environment slots.
//!
//! Every slot holds an owned handle, so the number of outstanding retains for a handle is the
//! number of slots holding it. All writes go through the methods here; an environment is
//! always released before, or together with, a change of the active image it came from.

use crate::runtime::handle::{Environment, Image};

/// How [`ArtifactSlots::promote`] transfers the pending image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromoteMode {
    /// Duplicate into active (one retain); pending keeps its reference.
    Share,
    /// Move out of pending; no net retain or release.
    Move,
}

#[derive(Debug, Default)]
pub struct ArtifactSlots {
    pending: Option<Image>,
    active: Option<Image>,
    environment: Option<Environment>,
}

/// Image slot write: the previous value is released only if the handle changes. An incoming
/// duplicate of the held handle gives its reference back instead.
fn assign_image(slot: &mut Option<Image>, new: Option<Image>) -> bool {
    if let (Some(old), Some(incoming)) = (slot.as_ref(), new.as_ref())
        && old.same_handle(incoming)
    {
        return false;
    }
    let changed = slot.is_some() || new.is_some();
    *slot = new;
    changed
}

impl ArtifactSlots {
    pub fn pending(&self) -> Option<&Image> {
        self.pending.as_ref()
    }

    pub fn active(&self) -> Option<&Image> {
        self.active.as_ref()
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn has_environment(&self) -> bool {
        self.environment.is_some()
    }

    /// A pending image exists that is not already the active one.
    pub fn can_load(&self) -> bool {
        match (&self.pending, &self.active) {
            (Some(p), Some(a)) => !p.same_handle(a),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Store a freshly compiled image. It arrives owning its single reference, so nothing is
    /// retained; the previous pending image (if different) is released.
    pub fn store_compiled(&mut self, image: Image) {
        tracing::debug!(image = ?image, "pending image stored");
        assign_image(&mut self.pending, Some(image));
    }

    pub fn clear_pending(&mut self) {
        assign_image(&mut self.pending, None);
    }

    /// Pending → active. Returns `false` when there is nothing to promote or the pending
    /// image is already active. A changed active image releases the environment.
    pub fn promote(&mut self, mode: PromoteMode) -> bool {
        let incoming = match mode {
            PromoteMode::Share => self.pending.clone(),
            PromoteMode::Move => self.pending.take(),
        };
        let Some(incoming) = incoming else {
            return false;
        };
        tracing::debug!(image = ?incoming, ?mode, "promote");
        self.set_active(Some(incoming))
    }

    pub fn clear_active(&mut self) -> bool {
        self.set_active(None)
    }

    fn set_active(&mut self, image: Option<Image>) -> bool {
        // The environment belongs to the outgoing image; release it first.
        let same = match (&self.active, &image) {
            (Some(old), Some(new)) => old.same_handle(new),
            (None, None) => true,
            _ => false,
        };
        if !same {
            self.clear_environment();
        }
        assign_image(&mut self.active, image)
    }

    /// Install a freshly started environment, releasing any previous one.
    pub fn set_environment(&mut self, environment: Environment) {
        tracing::debug!(environment = ?environment, "environment installed");
        self.environment = Some(environment);
    }

    pub fn clear_environment(&mut self) -> bool {
        let had = self.environment.take();
        if let Some(env) = &had {
            tracing::debug!(environment = ?env, "environment released");
        }
        had.is_some()
    }

    /// Release everything, each slot exactly once.
    pub fn teardown(&mut self) {
        self.clear_environment();
        self.active = None;
        self.pending = None;
    }
}

impl Drop for ArtifactSlots {
    fn drop(&mut self) {
        self.teardown();
    }
}
