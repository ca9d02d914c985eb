use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use toodle::{
    Environment, HandleTable, HeadlessDisplay, Image, Player, PlayerConfig, RawHandle,
    RecordingSurface, ResourceKind, Runtime, ScriptRuntime, Started, StepOutput, ToodleError,
    ToodleResult,
};

/// Delegates to [`ScriptRuntime`] and keeps a per-handle balance: +1 for every reference
/// handed out or retained, -1 for every release.
#[derive(Default)]
struct Audited {
    inner: ScriptRuntime,
    balance: RefCell<BTreeMap<(u8, u64), i64>>,
}

impl Audited {
    fn key(kind: ResourceKind, h: RawHandle) -> (u8, u64) {
        let k = match kind {
            ResourceKind::Image => 0,
            ResourceKind::Environment => 1,
        };
        (k, h.0)
    }

    fn bump(&self, kind: ResourceKind, h: RawHandle, by: i64) {
        *self.balance.borrow_mut().entry(Self::key(kind, h)).or_default() += by;
    }

    fn outstanding(&self) -> i64 {
        self.balance.borrow().values().sum()
    }

    fn never_negative(&self) -> bool {
        self.balance.borrow().values().all(|v| *v >= 0)
    }

    /// Handles with a non-zero balance.
    fn held(&self) -> BTreeMap<(u8, u64), i64> {
        self.balance
            .borrow()
            .iter()
            .filter(|(_, v)| **v != 0)
            .map(|(k, v)| (*k, *v))
            .collect()
    }
}

/// Every reference still out must be one the player's slots hold: one per slot an image
/// occupies, one for the running environment.
fn assert_balance_matches_slots(rt: &Audited, p: &Player<RecordingSurface>, at: &str) {
    let mut expected = BTreeMap::new();
    let slots = p.slots();
    for image in [slots.pending(), slots.active()].into_iter().flatten() {
        *expected
            .entry(Audited::key(ResourceKind::Image, image.raw()))
            .or_insert(0) += 1;
    }
    if let Some(env) = slots.environment() {
        expected.insert(Audited::key(ResourceKind::Environment, env.raw()), 1);
    }
    assert_eq!(rt.held(), expected, "after {at}");
}

impl Runtime for Audited {
    fn compile(&self, source: &str) -> ToodleResult<RawHandle> {
        let h = self.inner.compile(source)?;
        self.bump(ResourceKind::Image, h, 1);
        Ok(h)
    }

    fn start(&self, image: RawHandle) -> ToodleResult<Started> {
        let started = self.inner.start(image)?;
        self.bump(ResourceKind::Environment, started.environment, 1);
        Ok(started)
    }

    fn step(&self, environment: RawHandle) -> ToodleResult<StepOutput> {
        self.inner.step(environment)
    }

    fn retain(&self, kind: ResourceKind, handle: RawHandle) {
        self.bump(kind, handle, 1);
        self.inner.retain(kind, handle);
    }

    fn release(&self, kind: ResourceKind, handle: RawHandle) {
        self.bump(kind, handle, -1);
        self.inner.release(kind, handle);
    }
}

#[test]
fn table_counts_and_frees_on_last_release() {
    let mut table = HandleTable::new(ResourceKind::Image);
    let h = table.insert("prog");
    assert_eq!(table.ref_count(h), 1);
    table.retain(h).unwrap();
    assert_eq!(table.ref_count(h), 2);
    assert_eq!(table.release(h).unwrap(), None);
    assert_eq!(table.release(h).unwrap(), Some("prog"));
    assert_eq!(table.ref_count(h), 0);
    assert_eq!(table.live(), 0);
    assert_eq!(table.issued(), 1);
}

#[test]
fn table_rejects_dead_handles() {
    let mut table = HandleTable::new(ResourceKind::Environment);
    let h = table.insert(());
    table.release(h).unwrap();
    for err in [
        table.retain(h).unwrap_err(),
        table.release(h).map(|_| ()).unwrap_err(),
        table.get(h).map(|_| ()).unwrap_err(),
    ] {
        assert!(matches!(err, ToodleError::ResourceMisuse(_)));
        assert!(err.message().contains("dead environment handle #1"));
    }
    assert!(table.get(RawHandle(99)).is_err());
}

#[test]
fn owned_clone_and_drop_balance() {
    let rt = Rc::new(ScriptRuntime::new());
    let dynrt: Rc<dyn Runtime> = rt.clone();
    let image = Image::adopt(dynrt.clone(), dynrt.compile("forward(1)").unwrap());
    let raw = image.raw();
    let copy = image.clone();
    assert_eq!(copy, image);
    assert_eq!(rt.ref_count(ResourceKind::Image, raw), 2);
    drop(image);
    assert_eq!(rt.ref_count(ResourceKind::Image, raw), 1);

    let started = dynrt.start(copy.raw()).unwrap();
    let env = Environment::adopt(dynrt.clone(), started.environment);
    assert_eq!(env.kind(), ResourceKind::Environment);
    assert_eq!(format!("{env:?}"), format!("environment({})", started.environment));
    drop(copy);
    // The environment does not pin its image.
    assert_eq!(rt.live_images(), 0);
    assert!(dynrt.step(env.raw()).is_ok());
    drop(env);
    assert_eq!(rt.live_environments(), 0);
}

#[test]
fn player_session_balances_every_handle() {
    let rt = Rc::new(Audited::default());
    let mut display = HeadlessDisplay::new(60.0).unwrap();
    let config = PlayerConfig::default();
    let surface = RecordingSurface::new(config.viewport.resolution().unwrap());
    let mut p = Player::with_surface(rt.clone(), display.host(), surface, &config).unwrap();

    p.set_source("forward(1)");
    display.run_frames(&mut p, 3);
    assert_balance_matches_slots(&rt, &p, "first compile");
    p.set_source("forward(");
    display.run_frames(&mut p, 2);
    assert_balance_matches_slots(&rt, &p, "compile error");
    p.set_source("assert(step < 1)\nturn(1)");
    display.run_frames(&mut p, 2);
    assert!(p.slots().pending().is_some());
    assert_balance_matches_slots(&rt, &p, "pending recompile");
    assert!(p.load());
    assert_balance_matches_slots(&rt, &p, "load");
    display.run_frames(&mut p, 4);
    assert!(p.stats().step_errors > 0);
    assert_balance_matches_slots(&rt, &p, "step error");
    p.restart();
    display.run_frames(&mut p, 2);
    assert_balance_matches_slots(&rt, &p, "restart");
    p.stop();
    display.run_frames(&mut p, 2);
    assert_balance_matches_slots(&rt, &p, "stop");
    p.switch_script("forward(3)");
    assert_balance_matches_slots(&rt, &p, "switch");
    display.run_frames(&mut p, 3);
    assert_balance_matches_slots(&rt, &p, "switched script running");
    assert!(rt.never_negative());
    assert!(rt.outstanding() > 0);

    p.teardown();
    assert!(rt.held().is_empty());
    assert_eq!(rt.outstanding(), 0);
    assert!(rt.never_negative());
    assert_eq!(rt.inner.live_images(), 0);
    assert_eq!(rt.inner.live_environments(), 0);
}
