use std::marker::PhantomData;
use std::rc::Rc;

use crate::runtime::{RawHandle, ResourceKind, Runtime};

/// Type-level tag for the kind of resource an [`Owned`] handle refers to.
pub trait HandleKind {
    const KIND: ResourceKind;
}

#[derive(Debug)]
pub enum ImageKind {}

#[derive(Debug)]
pub enum EnvironmentKind {}

impl HandleKind for ImageKind {
    const KIND: ResourceKind = ResourceKind::Image;
}

impl HandleKind for EnvironmentKind {
    const KIND: ResourceKind = ResourceKind::Environment;
}

/// One counted reference to a runtime resource.
///
/// Each live `Owned` accounts for exactly one retain on the runtime side: `clone` retains,
/// `drop` releases. Moving an `Owned` transfers the reference without touching the count.
pub struct Owned<K: HandleKind> {
    raw: RawHandle,
    runtime: Rc<dyn Runtime>,
    _kind: PhantomData<K>,
}

pub type Image = Owned<ImageKind>;
pub type Environment = Owned<EnvironmentKind>;

impl<K: HandleKind> Owned<K> {
    /// Take ownership of a reference the caller already holds (a fresh `compile`/`start`
    /// result). Does not retain.
    pub fn adopt(runtime: Rc<dyn Runtime>, raw: RawHandle) -> Self {
        tracing::trace!(kind = K::KIND.as_str(), handle = %raw, "adopt");
        Self {
            raw,
            runtime,
            _kind: PhantomData,
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn kind(&self) -> ResourceKind {
        K::KIND
    }

    /// Handle identity, ignoring which reference this is.
    pub fn same_handle(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: HandleKind> Clone for Owned<K> {
    fn clone(&self) -> Self {
        self.runtime.retain(K::KIND, self.raw);
        Self {
            raw: self.raw,
            runtime: Rc::clone(&self.runtime),
            _kind: PhantomData,
        }
    }
}

impl<K: HandleKind> Drop for Owned<K> {
    fn drop(&mut self) {
        self.runtime.release(K::KIND, self.raw);
    }
}

impl<K: HandleKind> PartialEq for Owned<K> {
    fn eq(&self, other: &Self) -> bool {
        self.same_handle(other)
    }
}

impl<K: HandleKind> Eq for Owned<K> {}

impl<K: HandleKind> std::fmt::Debug for Owned<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", K::KIND.as_str(), self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::{ToodleError, ToodleResult};
    use crate::runtime::{Started, StepOutput};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Log(RefCell<Vec<(&'static str, ResourceKind, u64)>>);

    impl Runtime for Log {
        fn compile(&self, _source: &str) -> ToodleResult<RawHandle> {
            Err(ToodleError::compile("unused"))
        }
        fn start(&self, _image: RawHandle) -> ToodleResult<Started> {
            Err(ToodleError::step("unused"))
        }
        fn step(&self, _env: RawHandle) -> ToodleResult<StepOutput> {
            Err(ToodleError::step("unused"))
        }
        fn retain(&self, kind: ResourceKind, handle: RawHandle) {
            self.0.borrow_mut().push(("retain", kind, handle.0));
        }
        fn release(&self, kind: ResourceKind, handle: RawHandle) {
            self.0.borrow_mut().push(("release", kind, handle.0));
        }
    }

    #[test]
    fn adopt_clone_drop_balance() {
        let log = Rc::new(Log::default());
        let rt: Rc<dyn Runtime> = log.clone();
        let a = Image::adopt(rt.clone(), RawHandle(7));
        assert!(log.0.borrow().is_empty());
        let b = a.clone();
        assert!(a.same_handle(&b));
        drop(a);
        drop(b);
        assert_eq!(
            *log.0.borrow(),
            vec![
                ("retain", ResourceKind::Image, 7),
                ("release", ResourceKind::Image, 7),
                ("release", ResourceKind::Image, 7),
            ]
        );
    }

    #[test]
    fn move_does_not_touch_count() {
        let log = Rc::new(Log::default());
        let rt: Rc<dyn Runtime> = log.clone();
        let env = Environment::adopt(rt, RawHandle(1));
        let mut slot = None;
        slot.replace(env);
        assert!(log.0.borrow().is_empty());
        assert_eq!(slot.as_ref().map(|e| e.kind()), Some(ResourceKind::Environment));
        slot.take();
        assert_eq!(log.0.borrow().len(), 1);
    }
}
