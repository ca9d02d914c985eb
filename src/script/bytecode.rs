#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConstIdx(pub(crate) u32);

/// Index of a script variable in the environment's slot vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VarSlot(pub(crate) u32);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConstVal {
    F64(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltinId {
    Min,
    Max,
    Clamp,
    Abs,
    Sin,
    Cos,
    Sqrt,
    Floor,
    Lerp,
}

impl BuiltinId {
    pub(crate) fn lookup(name: &str) -> Option<(Self, u8)> {
        Some(match name {
            "min" => (Self::Min, 2),
            "max" => (Self::Max, 2),
            "clamp" => (Self::Clamp, 3),
            "abs" => (Self::Abs, 1),
            "sin" => (Self::Sin, 1),
            "cos" => (Self::Cos, 1),
            "sqrt" => (Self::Sqrt, 1),
            "floor" => (Self::Floor, 1),
            "lerp" => (Self::Lerp, 3),
            _ => return None,
        })
    }
}

/// Turtle state readable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateField {
    Step,
    X,
    Y,
    Dir,
}

impl StateField {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        match name {
            "step" => Some(Self::Step),
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            "dir" => Some(Self::Dir),
            _ => None,
        }
    }
}

/// Statement-level commands. Each pops its arguments and has a side effect on the turtle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandId {
    Forward,
    Turn,
    Goto,
    Heading,
    Color,
    Width,
    PenUp,
    PenDown,
    Background,
    Assert,
    Print,
}

impl CommandId {
    /// Command id plus accepted argument counts (inclusive range).
    pub(crate) fn lookup(name: &str) -> Option<(Self, u8, u8)> {
        Some(match name {
            "forward" => (Self::Forward, 1, 1),
            "turn" => (Self::Turn, 1, 1),
            "goto" => (Self::Goto, 2, 2),
            "heading" => (Self::Heading, 1, 1),
            "color" => (Self::Color, 3, 4),
            "width" => (Self::Width, 1, 1),
            "pen_up" => (Self::PenUp, 0, 0),
            "pen_down" => (Self::PenDown, 0, 0),
            "background" => (Self::Background, 3, 4),
            "assert" => (Self::Assert, 1, 1),
            "print" => (Self::Print, 1, 16),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    PushConst(ConstIdx),
    LoadVar(VarSlot),
    StoreVar(VarSlot),
    LoadState(StateField),

    Neg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,

    CallBuiltin { id: BuiltinId, argc: u8 },
    Command { id: CommandId, argc: u8 },
}

/// Straight-line code for one block. The value stack is empty between statements.
#[derive(Debug, Clone, Default)]
pub(crate) struct Chunk {
    pub(crate) ops: Vec<Op>,
    pub(crate) consts: Vec<ConstVal>,
    /// Source offset of the statement each op belongs to, for runtime error locations.
    pub(crate) offsets: Vec<usize>,
}

impl Chunk {
    pub(crate) fn push_const(&mut self, c: ConstVal) -> ConstIdx {
        let idx = ConstIdx(self.consts.len() as u32);
        self.consts.push(c);
        idx
    }

    pub(crate) fn emit(&mut self, op: Op, offset: usize) {
        self.ops.push(op);
        self.offsets.push(offset);
    }
}
