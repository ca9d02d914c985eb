#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Lit(Lit),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
        offset: usize,
    },
    Name {
        name: String,
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Lit {
    F64(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
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
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    /// `let name = expr`
    Let {
        name: String,
        value: Expr,
        offset: usize,
    },
    /// `name = expr` on an existing variable.
    Assign {
        name: String,
        value: Expr,
        offset: usize,
    },
    /// `name(args...)` in statement position.
    Command {
        name: String,
        args: Vec<Expr>,
        offset: usize,
    },
}

/// Parsed script: statements of the `setup` block and of the per-step body.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ScriptAst {
    pub(crate) setup: Vec<Stmt>,
    pub(crate) step: Vec<Stmt>,
}
