//! Change observation with batching.
//!
//! State cells that should trigger a redraw are wrapped in [`Watched`]. Writes that change a
//! value mark a [`Signal`] on the [`Observers`] registry; marks made inside a batch are
//! coalesced and delivered once when the outermost batch closes.

/// Observable state cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    Visibility,
    ScriptDirty,
    ClockState,
    ClockTime,
    PlaybackSpeed,
    Resolution,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::Visibility,
        Signal::ScriptDirty,
        Signal::ClockState,
        Signal::ClockTime,
        Signal::PlaybackSpeed,
        Signal::Resolution,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Set of signals, used both as a subscription mask and as the payload of a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChangeSet(u8);

impl ChangeSet {
    pub const EMPTY: Self = Self(0);

    pub fn all() -> Self {
        Signal::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, signal: Signal) {
        self.0 |= signal.bit();
    }

    pub fn contains(self, signal: Signal) -> bool {
        self.0 & signal.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Signal> {
        Signal::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl From<Signal> for ChangeSet {
    fn from(signal: Signal) -> Self {
        let mut set = Self::EMPTY;
        set.insert(signal);
        set
    }
}

impl FromIterator<Signal> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for s in iter {
            set.insert(s);
        }
        set
    }
}

/// A value whose writes report whether they changed anything.
#[derive(Clone, Debug, Default)]
pub struct Watched<T> {
    value: T,
}

impl<T: PartialEq> Watched<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Store `value`; returns `true` if it differs from the previous one.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

impl<T: Copy + PartialEq> Watched<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

pub type Subscriber = Box<dyn FnMut(ChangeSet)>;

/// Opaque token returned by [`Observers::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct Observers {
    depth: u32,
    pending: ChangeSet,
    subscribers: Vec<(SubscriptionId, ChangeSet, Subscriber)>,
    next_id: u64,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("depth", &self.depth)
            .field("pending", &self.pending)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Observers {
    pub fn subscribe(&mut self, mask: ChangeSet, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, mask, subscriber));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn mark(&mut self, signal: Signal) {
        self.pending.insert(signal);
    }

    pub fn begin_batch(&mut self) {
        self.depth += 1;
    }

    /// Close a batch. When the outermost batch closes, returns the accumulated change set
    /// (possibly empty) and clears it; nested closes return `None`.
    pub fn end_batch(&mut self) -> Option<ChangeSet> {
        debug_assert!(self.depth > 0, "end_batch without begin_batch");
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    pub fn in_batch(&self) -> bool {
        self.depth > 0
    }

    /// Deliver `changes` to every subscriber whose mask intersects it.
    pub fn notify(&mut self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        for (_, mask, sub) in &mut self.subscribers {
            if mask.intersects(changes) {
                sub(changes);
            }
        }
    }
}
