use crate::script::bytecode::{BuiltinId, Chunk, CommandId, ConstVal, Op, StateField};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) enum Value {
    #[default]
    Unset,
    F64(f64),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub(crate) struct VmError {
    pub(crate) message: String,
    /// Source offset of the failing statement, when known.
    pub(crate) offset: Option<usize>,
}

impl VmError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            offset: None,
        }
    }

    fn at(mut self, offset: Option<usize>) -> Self {
        if self.offset.is_none() {
            self.offset = offset;
        }
        self
    }
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vm error: {}", self.message)
    }
}

impl std::error::Error for VmError {}

/// Side of the VM that owns turtle state and receives commands.
pub(crate) trait CommandHost {
    fn load_state(&self, field: StateField) -> f64;

    fn command(&mut self, id: CommandId, args: &[Value]) -> Result<(), VmError>;
}

/// Run a chunk against `vars` and `host`. The stack is reused across calls.
pub(crate) fn run_chunk(
    chunk: &Chunk,
    vars: &mut [Value],
    stack: &mut Vec<Value>,
    host: &mut impl CommandHost,
) -> Result<(), VmError> {
    stack.clear();
    for (pc, &op) in chunk.ops.iter().enumerate() {
        exec_op(chunk, op, vars, stack, host)
            .map_err(|e| e.at(chunk.offsets.get(pc).copied()))?;
    }
    if !stack.is_empty() {
        return Err(VmError::new(format!(
            "stack has {} values at end of block",
            stack.len()
        )));
    }
    Ok(())
}

fn exec_op(
    chunk: &Chunk,
    op: Op,
    vars: &mut [Value],
    stack: &mut Vec<Value>,
    host: &mut impl CommandHost,
) -> Result<(), VmError> {
    match op {
        Op::PushConst(idx) => {
            let c = chunk
                .consts
                .get(idx.0 as usize)
                .ok_or_else(|| VmError::new("const idx out of range"))?;
            stack.push(match *c {
                ConstVal::F64(v) => Value::F64(v),
                ConstVal::Bool(v) => Value::Bool(v),
            });
        }
        Op::LoadVar(slot) => {
            let v = vars
                .get(slot.0 as usize)
                .copied()
                .ok_or_else(|| VmError::new("variable slot out of range"))?;
            if v == Value::Unset {
                return Err(VmError::new("variable read before assignment"));
            }
            stack.push(v);
        }
        Op::StoreVar(slot) => {
            let v = stack.pop().ok_or_else(|| VmError::new("stack underflow"))?;
            let dst = vars
                .get_mut(slot.0 as usize)
                .ok_or_else(|| VmError::new("variable slot out of range"))?;
            *dst = v;
        }
        Op::LoadState(field) => stack.push(Value::F64(host.load_state(field))),

        Op::Neg => {
            let v = pop_f64(stack)?;
            stack.push(Value::F64(-v));
        }
        Op::Not => {
            let v = pop_bool(stack)?;
            stack.push(Value::Bool(!v));
        }
        Op::Add => bin_f64(stack, |a, b| a + b)?,
        Op::Sub => bin_f64(stack, |a, b| a - b)?,
        Op::Mul => bin_f64(stack, |a, b| a * b)?,
        Op::Div => bin_f64(stack, |a, b| a / b)?,
        Op::Mod => bin_f64(stack, |a, b| a % b)?,

        Op::Eq => bin_eq(stack, true)?,
        Op::Ne => bin_eq(stack, false)?,
        Op::Lt => bin_cmp(stack, |a, b| a < b)?,
        Op::Le => bin_cmp(stack, |a, b| a <= b)?,
        Op::Gt => bin_cmp(stack, |a, b| a > b)?,
        Op::Ge => bin_cmp(stack, |a, b| a >= b)?,

        Op::And => {
            let b = pop_bool(stack)?;
            let a = pop_bool(stack)?;
            stack.push(Value::Bool(a && b));
        }
        Op::Or => {
            let b = pop_bool(stack)?;
            let a = pop_bool(stack)?;
            stack.push(Value::Bool(a || b));
        }

        Op::CallBuiltin { id, argc } => call_builtin(stack, id, argc)?,
        Op::Command { id, argc } => {
            let argc = argc as usize;
            if stack.len() < argc {
                return Err(VmError::new("stack underflow in command"));
            }
            let args = stack.split_off(stack.len() - argc);
            host.command(id, &args)?;
        }
    }
    Ok(())
}

impl Value {
    pub(crate) fn as_bool(self) -> Result<bool, VmError> {
        match self {
            Self::Bool(v) => Ok(v),
            other => Err(VmError::new(format!("expected bool, got {other:?}"))),
        }
    }

    pub(crate) fn as_f64(self) -> Result<f64, VmError> {
        match self {
            Self::F64(v) => Ok(v),
            other => Err(VmError::new(format!("expected number, got {other:?}"))),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

fn pop_f64(stack: &mut Vec<Value>) -> Result<f64, VmError> {
    match stack.pop() {
        Some(v) => v.as_f64(),
        None => Err(VmError::new("stack underflow")),
    }
}

fn pop_bool(stack: &mut Vec<Value>) -> Result<bool, VmError> {
    match stack.pop() {
        Some(v) => v.as_bool(),
        None => Err(VmError::new("stack underflow")),
    }
}

fn bin_f64(stack: &mut Vec<Value>, f: impl FnOnce(f64, f64) -> f64) -> Result<(), VmError> {
    let b = pop_f64(stack)?;
    let a = pop_f64(stack)?;
    stack.push(Value::F64(f(a, b)));
    Ok(())
}

fn bin_cmp(stack: &mut Vec<Value>, f: impl FnOnce(f64, f64) -> bool) -> Result<(), VmError> {
    let b = pop_f64(stack)?;
    let a = pop_f64(stack)?;
    stack.push(Value::Bool(f(a, b)));
    Ok(())
}

fn bin_eq(stack: &mut Vec<Value>, is_eq: bool) -> Result<(), VmError> {
    let b = stack.pop().ok_or_else(|| VmError::new("stack underflow"))?;
    let a = stack.pop().ok_or_else(|| VmError::new("stack underflow"))?;
    let res = match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (a, b) => a.as_f64()? == b.as_f64()?,
    };
    stack.push(Value::Bool(if is_eq { res } else { !res }));
    Ok(())
}

fn call_builtin(stack: &mut Vec<Value>, id: BuiltinId, argc: u8) -> Result<(), VmError> {
    let argc = argc as usize;
    if stack.len() < argc {
        return Err(VmError::new("stack underflow in builtin call"));
    }
    let unary = |stack: &mut Vec<Value>, f: fn(f64) -> f64| -> Result<(), VmError> {
        let x = pop_f64(stack)?;
        stack.push(Value::F64(f(x)));
        Ok(())
    };

    match id {
        BuiltinId::Abs => unary(stack, f64::abs)?,
        BuiltinId::Sin => unary(stack, f64::sin)?,
        BuiltinId::Cos => unary(stack, f64::cos)?,
        BuiltinId::Sqrt => unary(stack, f64::sqrt)?,
        BuiltinId::Floor => unary(stack, f64::floor)?,
        BuiltinId::Min => bin_f64(stack, f64::min)?,
        BuiltinId::Max => bin_f64(stack, f64::max)?,
        BuiltinId::Clamp => {
            let hi = pop_f64(stack)?;
            let lo = pop_f64(stack)?;
            let x = pop_f64(stack)?;
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(VmError::new(format!("clamp bounds inverted ({lo} > {hi})")));
            }
            stack.push(Value::F64(x.clamp(lo, hi)));
        }
        BuiltinId::Lerp => {
            let t = pop_f64(stack)?;
            let b = pop_f64(stack)?;
            let a = pop_f64(stack)?;
            stack.push(Value::F64(a + (b - a) * t));
        }
    }

    Ok(())
}
