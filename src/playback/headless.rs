use std::cell::Cell;
use std::rc::Rc;

use crate::playback::scheduler::FrameHost;

/// Frame host with no display: a request just raises a shared flag that a driver loop
/// consumes with [`HeadlessHost::take`].
#[derive(Clone, Debug, Default)]
pub struct HeadlessHost {
    requested: Rc<Cell<bool>>,
    total: Rc<Cell<u64>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume an outstanding request.
    pub fn take(&self) -> bool {
        self.requested.replace(false)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.get()
    }

    /// Requests received over the host's lifetime.
    pub fn total_requests(&self) -> u64 {
        self.total.get()
    }
}

impl FrameHost for HeadlessHost {
    fn request_frame(&mut self) {
        self.requested.set(true);
        self.total.set(self.total.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::scheduler::FrameScheduler;

    #[test]
    fn clones_share_request_flag() {
        let host = HeadlessHost::new();
        let mut sched = FrameScheduler::new(Box::new(host.clone()));
        sched.schedule();
        sched.schedule();
        assert!(host.take());
        assert!(!host.take());
        assert_eq!(host.total_requests(), 1);
    }
}
