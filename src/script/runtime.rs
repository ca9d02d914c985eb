use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::foundation::core::{Color, Line, Point, Vec2};
use crate::foundation::error::{ToodleError, ToodleResult};
use crate::runtime::ledger::{HandleTable, report_misuse};
use crate::runtime::{GeometryBatch, RawHandle, ResourceKind, Runtime, Started, StepOutput};
use crate::script::bytecode::{CommandId, StateField};
use crate::script::compile::{ScriptProgram, compile_script};
use crate::script::error::ScriptError;
use crate::script::vm::{CommandHost, Value, VmError, run_chunk};

/// Upper bound on segments a single step may emit.
pub const MAX_SEGMENTS_PER_STEP: usize = 10_000;

/// Upper bound on `print` lines a single setup or step may emit.
const MAX_PRINTS_PER_STEP: usize = 256;

/// Pen and position. Heading is in degrees, counter-clockwise from +x; y points up.
#[derive(Debug, Clone)]
struct Turtle {
    pos: Point,
    heading: f64,
    color: Color,
    width: f64,
    pen_down: bool,
    step: u64,
    lines: Vec<Line>,
    background: Option<Color>,
    printed: Vec<String>,
}

impl Default for Turtle {
    fn default() -> Self {
        Self {
            pos: Point::ORIGIN,
            heading: 0.0,
            color: Color::WHITE,
            width: 1.0,
            pen_down: true,
            step: 0,
            lines: Vec::new(),
            background: None,
            printed: Vec::new(),
        }
    }
}

impl Turtle {
    fn move_to(&mut self, to: Point) -> Result<(), VmError> {
        if !(to.x.is_finite() && to.y.is_finite()) {
            return Err(VmError::new("turtle position is not finite"));
        }
        if self.pen_down {
            if self.lines.len() >= MAX_SEGMENTS_PER_STEP {
                return Err(VmError::new(format!(
                    "more than {MAX_SEGMENTS_PER_STEP} segments in one step"
                )));
            }
            self.lines.push(Line {
                start: self.pos,
                end: to,
                color: self.color,
                width: self.width,
            });
        }
        self.pos = to;
        Ok(())
    }

    fn set_heading(&mut self, deg: f64) -> Result<(), VmError> {
        if !deg.is_finite() {
            return Err(VmError::new("turtle heading is not finite"));
        }
        self.heading = deg.rem_euclid(360.0);
        Ok(())
    }
}

fn color_arg(args: &[Value]) -> Result<Color, VmError> {
    let r = args[0].as_f64()?;
    let g = args[1].as_f64()?;
    let b = args[2].as_f64()?;
    let a = match args.get(3) {
        Some(v) => v.as_f64()?,
        None => 1.0,
    };
    let c = Color::rgba(r, g, b, a);
    if !c.is_finite() {
        return Err(VmError::new("color channels must be finite"));
    }
    Ok(c)
}

impl CommandHost for Turtle {
    fn load_state(&self, field: StateField) -> f64 {
        match field {
            StateField::Step => self.step as f64,
            StateField::X => self.pos.x,
            StateField::Y => self.pos.y,
            StateField::Dir => self.heading,
        }
    }

    fn command(&mut self, id: CommandId, args: &[Value]) -> Result<(), VmError> {
        match id {
            CommandId::Forward => {
                let d = args[0].as_f64()?;
                let rad = self.heading.to_radians();
                let to = self.pos + Vec2::new(d * rad.cos(), d * rad.sin());
                self.move_to(to)?;
            }
            CommandId::Turn => {
                let deg = args[0].as_f64()?;
                self.set_heading(self.heading + deg)?;
            }
            CommandId::Goto => {
                let to = Point::new(args[0].as_f64()?, args[1].as_f64()?);
                self.move_to(to)?;
            }
            CommandId::Heading => self.set_heading(args[0].as_f64()?)?,
            CommandId::Color => self.color = color_arg(args)?,
            CommandId::Width => {
                let w = args[0].as_f64()?;
                if !w.is_finite() || w < 0.0 {
                    return Err(VmError::new(format!("width must be finite and >= 0, got {w}")));
                }
                self.width = w;
            }
            CommandId::PenUp => self.pen_down = false,
            CommandId::PenDown => self.pen_down = true,
            CommandId::Background => self.background = Some(color_arg(args)?),
            CommandId::Assert => {
                if !args[0].as_bool()? {
                    return Err(VmError::new("assertion failed"));
                }
            }
            CommandId::Print => {
                if self.printed.len() >= MAX_PRINTS_PER_STEP {
                    return Err(VmError::new(format!(
                        "more than {MAX_PRINTS_PER_STEP} prints in one step"
                    )));
                }
                let text = args
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.printed.push(text);
            }
        }
        Ok(())
    }
}

/// One running instantiation of a program.
#[derive(Debug)]
struct TurtleEnv {
    program: Rc<ScriptProgram>,
    vars: Vec<Value>,
    stack: Vec<Value>,
    turtle: Turtle,
}

impl TurtleEnv {
    fn new(program: Rc<ScriptProgram>) -> Self {
        let vars = vec![Value::Unset; program.var_count()];
        Self {
            program,
            vars,
            stack: Vec::with_capacity(16),
            turtle: Turtle::default(),
        }
    }

    fn describe(&self, err: VmError) -> ToodleError {
        let src = &self.program.source;
        let msg = match err.offset {
            Some(offset) => ScriptError::new(offset, err.message).render(src),
            None => err.message,
        };
        ToodleError::step(msg)
    }

    /// Run `setup`; returns the background it requested (black if none) and what it printed.
    /// Lines drawn during setup are held back and emitted with the first step.
    fn run_setup(&mut self) -> ToodleResult<(Color, Vec<String>)> {
        let program = Rc::clone(&self.program);
        run_chunk(&program.setup, &mut self.vars, &mut self.stack, &mut self.turtle)
            .map_err(|e| self.describe(e))?;
        let background = self.turtle.background.take().unwrap_or(Color::BLACK);
        Ok((background, std::mem::take(&mut self.turtle.printed)))
    }

    fn step(&mut self) -> ToodleResult<StepOutput> {
        let program = Rc::clone(&self.program);
        let res = run_chunk(&program.step, &mut self.vars, &mut self.stack, &mut self.turtle);
        let lines = std::mem::take(&mut self.turtle.lines);
        let background = self.turtle.background.take();
        let output = std::mem::take(&mut self.turtle.printed);
        res.map_err(|e| self.describe(e))?;
        self.turtle.step += 1;
        Ok(StepOutput {
            lines: GeometryBatch::new(lines),
            background,
            output,
        })
    }
}

/// In-process [`Runtime`] for toodle scripts.
///
/// Images are compiled programs and environments are turtles; both live in handle tables
/// with runtime-side reference counts.
#[derive(Debug)]
pub struct ScriptRuntime {
    images: RefCell<HandleTable<Rc<ScriptProgram>>>,
    environments: RefCell<HandleTable<TurtleEnv>>,
    compiles: Cell<u64>,
    steps: Cell<u64>,
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRuntime {
    pub fn new() -> Self {
        Self {
            images: RefCell::new(HandleTable::new(ResourceKind::Image)),
            environments: RefCell::new(HandleTable::new(ResourceKind::Environment)),
            compiles: Cell::new(0),
            steps: Cell::new(0),
        }
    }

    pub fn ref_count(&self, kind: ResourceKind, handle: RawHandle) -> u32 {
        match kind {
            ResourceKind::Image => self.images.borrow().ref_count(handle),
            ResourceKind::Environment => self.environments.borrow().ref_count(handle),
        }
    }

    pub fn live_images(&self) -> usize {
        self.images.borrow().live()
    }

    pub fn live_environments(&self) -> usize {
        self.environments.borrow().live()
    }

    pub fn images_issued(&self) -> u64 {
        self.images.borrow().issued()
    }

    pub fn environments_issued(&self) -> u64 {
        self.environments.borrow().issued()
    }

    /// Compile calls so far, successful or not.
    pub fn compile_count(&self) -> u64 {
        self.compiles.get()
    }

    pub fn step_count(&self) -> u64 {
        self.steps.get()
    }
}

impl Runtime for ScriptRuntime {
    #[tracing::instrument(skip_all, fields(len = source.len()))]
    fn compile(&self, source: &str) -> ToodleResult<RawHandle> {
        self.compiles.set(self.compiles.get() + 1);
        let program =
            compile_script(source).map_err(|e| ToodleError::compile(e.render(source)))?;
        tracing::debug!(ops = program.op_count(), vars = program.var_count(), "compiled");
        Ok(self.images.borrow_mut().insert(Rc::new(program)))
    }

    fn start(&self, image: RawHandle) -> ToodleResult<Started> {
        let program = Rc::clone(self.images.borrow().get(image)?);
        let mut env = TurtleEnv::new(program);
        let (background, output) = env.run_setup()?;
        let environment = self.environments.borrow_mut().insert(env);
        tracing::debug!(%image, %environment, "environment started");
        Ok(Started {
            environment,
            background,
            output,
        })
    }

    fn step(&self, environment: RawHandle) -> ToodleResult<StepOutput> {
        self.steps.set(self.steps.get() + 1);
        let mut envs = self.environments.borrow_mut();
        envs.get_mut(environment)?.step()
    }

    fn retain(&self, kind: ResourceKind, handle: RawHandle) {
        let res = match kind {
            ResourceKind::Image => self.images.borrow_mut().retain(handle),
            ResourceKind::Environment => self.environments.borrow_mut().retain(handle),
        };
        if let Err(err) = res {
            report_misuse(&err);
        }
    }

    fn release(&self, kind: ResourceKind, handle: RawHandle) {
        let res = match kind {
            ResourceKind::Image => self.images.borrow_mut().release(handle).map(|freed| {
                if freed.is_some() {
                    tracing::trace!(%handle, "image freed");
                }
            }),
            ResourceKind::Environment => {
                self.environments.borrow_mut().release(handle).map(|freed| {
                    if freed.is_some() {
                        tracing::trace!(%handle, "environment freed");
                    }
                })
            }
        };
        if let Err(err) = res {
            report_misuse(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_script(rt: &ScriptRuntime, src: &str) -> (RawHandle, Started) {
        let image = rt.compile(src).unwrap();
        let started = rt.start(image).unwrap();
        (image, started)
    }

    #[test]
    fn compile_errors_have_locations() {
        let rt = ScriptRuntime::new();
        let err = rt.compile("forward(1)\nturn(q)").unwrap_err();
        assert!(matches!(err, ToodleError::Compile(_)));
        assert_eq!(err.message(), "2:6: unknown name 'q'");
        assert_eq!(rt.live_images(), 0);
        assert_eq!(rt.compile_count(), 1);
    }

    #[test]
    fn setup_background_defaults_to_black() {
        let rt = ScriptRuntime::new();
        let (_, started) = start_script(&rt, "forward(1)");
        assert_eq!(started.background, Color::BLACK);
        let (_, started) = start_script(&rt, "setup { background(1, 0, 0) }");
        assert_eq!(started.background, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn step_draws_turtle_segments() {
        let rt = ScriptRuntime::new();
        let (_, s) = start_script(&rt, "forward(10)\nturn(90)\nforward(5)");
        let out = rt.step(s.environment).unwrap();
        let lines = out.lines.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start, Point::ORIGIN);
        assert_eq!(lines[0].end, Point::new(10.0, 0.0));
        assert!((lines[1].end.x - 10.0).abs() < 1e-9);
        assert!((lines[1].end.y - 5.0).abs() < 1e-9);
        assert_eq!(out.background, None);

        // The turtle keeps its position between steps.
        let out = rt.step(s.environment).unwrap();
        assert!((out.lines.lines()[0].start.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn setup_lines_arrive_with_first_step() {
        let rt = ScriptRuntime::new();
        let (_, s) = start_script(&rt, "setup { goto(0, 10) }\npen_up()\nforward(1)");
        assert_eq!(rt.step(s.environment).unwrap().lines.len(), 1);
        assert_eq!(rt.step(s.environment).unwrap().lines.len(), 0);
    }

    #[test]
    fn step_counter_and_assert() {
        let rt = ScriptRuntime::new();
        let (_, s) = start_script(&rt, "assert(step < 2)");
        rt.step(s.environment).unwrap();
        rt.step(s.environment).unwrap();
        let err = rt.step(s.environment).unwrap_err();
        assert!(matches!(err, ToodleError::Step(_)));
        assert_eq!(err.message(), "1:1: assertion failed");
    }

    #[test]
    fn print_collects_text_per_call() {
        let rt = ScriptRuntime::new();
        let (_, s) = start_script(&rt, "setup { print(42) }\nprint(step, step < 1, 0.5)");
        assert_eq!(s.output, vec!["42".to_string()]);
        assert_eq!(rt.step(s.environment).unwrap().output, vec!["0 true 0.5"]);
        let out = rt.step(s.environment).unwrap();
        assert_eq!(out.output, vec!["1 false 0.5"]);
        assert!(out.lines.is_empty());

        let chatty = "print(1)\n".repeat(MAX_PRINTS_PER_STEP + 1);
        let (_, s) = start_script(&rt, &chatty);
        let err = rt.step(s.environment).unwrap_err();
        assert!(err.message().contains("prints"));
    }

    #[test]
    fn deeply_nested_source_is_a_compile_error() {
        let rt = ScriptRuntime::new();
        let src = format!("forward({}1{})", "(".repeat(50_000), ")".repeat(50_000));
        let err = rt.compile(&src).unwrap_err();
        assert!(matches!(err, ToodleError::Compile(_)));
        assert!(err.message().contains("nested too deeply"));
        assert_eq!(rt.live_images(), 0);
    }

    #[test]
    fn state_persists_across_steps() {
        let rt = ScriptRuntime::new();
        let (_, s) = start_script(&rt, "setup { let n = 0 }\nn = n + 1\nforward(n)");
        rt.step(s.environment).unwrap();
        let out = rt.step(s.environment).unwrap();
        assert_eq!(out.lines.lines()[0].end.x - out.lines.lines()[0].start.x, 2.0);
    }

    #[test]
    fn runaway_and_non_finite_steps_fail() {
        let rt = ScriptRuntime::new();
        let (_, s) = start_script(&rt, "forward(1 / 0)");
        assert!(rt.step(s.environment).is_err());

        let many = "forward(1)\n".repeat(MAX_SEGMENTS_PER_STEP + 1);
        let (_, s) = start_script(&rt, &many);
        let err = rt.step(s.environment).unwrap_err();
        assert!(err.message().contains("segments"));
    }

    #[test]
    fn refcounts_follow_retain_and_release() {
        let rt = ScriptRuntime::new();
        let (image, s) = start_script(&rt, "forward(1)");
        assert_eq!(rt.ref_count(ResourceKind::Image, image), 1);
        rt.retain(ResourceKind::Image, image);
        assert_eq!(rt.ref_count(ResourceKind::Image, image), 2);
        rt.release(ResourceKind::Image, image);
        rt.release(ResourceKind::Image, image);
        assert_eq!(rt.live_images(), 0);

        // The environment holds its own reference to the program.
        rt.step(s.environment).unwrap();
        rt.release(ResourceKind::Environment, s.environment);
        assert_eq!(rt.live_environments(), 0);
        assert!(rt.step(s.environment).is_err());
    }

    #[test]
    fn start_of_dead_image_is_misuse() {
        let rt = ScriptRuntime::new();
        let image = rt.compile("forward(1)").unwrap();
        rt.release(ResourceKind::Image, image);
        assert!(matches!(
            rt.start(image).unwrap_err(),
            ToodleError::ResourceMisuse(_)
        ));
    }
}
