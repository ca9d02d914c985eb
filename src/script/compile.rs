use std::collections::HashMap;

use crate::script::ast::{BinaryOp, Expr, Lit, ScriptAst, Stmt, UnaryOp};
use crate::script::bytecode::{
    BuiltinId, Chunk, CommandId, ConstVal, Op, StateField, VarSlot,
};
use crate::script::error::ScriptError;
use crate::script::parser::parse_script;

/// Compiled script: the image a running environment is instantiated from.
#[derive(Debug, Clone)]
pub struct ScriptProgram {
    pub(crate) setup: Chunk,
    pub(crate) step: Chunk,
    pub(crate) var_names: Vec<String>,
    pub(crate) source: String,
}

impl ScriptProgram {
    pub fn var_count(&self) -> usize {
        self.var_names.len()
    }

    pub fn op_count(&self) -> usize {
        self.setup.ops.len() + self.step.ops.len()
    }
}

pub(crate) fn compile_script(src: &str) -> Result<ScriptProgram, ScriptError> {
    let ast = parse_script(src)?;
    lower(&ast, src)
}

fn lower(ast: &ScriptAst, src: &str) -> Result<ScriptProgram, ScriptError> {
    let mut cx = Lowerer::default();
    let mut setup = Chunk::default();
    for stmt in &ast.setup {
        cx.lower_stmt(&mut setup, stmt)?;
    }
    let mut step = Chunk::default();
    for stmt in &ast.step {
        cx.lower_stmt(&mut step, stmt)?;
    }
    Ok(ScriptProgram {
        setup,
        step,
        var_names: cx.names,
        source: src.to_owned(),
    })
}

#[derive(Default)]
struct Lowerer {
    vars: HashMap<String, VarSlot>,
    names: Vec<String>,
}

fn is_reserved(name: &str) -> bool {
    StateField::lookup(name).is_some()
        || BuiltinId::lookup(name).is_some()
        || CommandId::lookup(name).is_some()
        || constant(name).is_some()
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "tau" => Some(std::f64::consts::TAU),
        _ => None,
    }
}

impl Lowerer {
    fn declare(&mut self, name: &str) -> VarSlot {
        if let Some(slot) = self.vars.get(name) {
            return *slot;
        }
        let slot = VarSlot(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.vars.insert(name.to_owned(), slot);
        slot
    }

    fn lower_stmt(&mut self, chunk: &mut Chunk, stmt: &Stmt) -> Result<(), ScriptError> {
        match stmt {
            Stmt::Let {
                name,
                value,
                offset,
            } => {
                if is_reserved(name) {
                    return Err(ScriptError::new(
                        *offset,
                        format!("cannot redefine built-in name '{name}'"),
                    ));
                }
                // Value first: `let a = a + 1` reads the previous `a`, if any.
                self.lower_expr(chunk, value, *offset)?;
                let slot = self.declare(name);
                chunk.emit(Op::StoreVar(slot), *offset);
            }
            Stmt::Assign {
                name,
                value,
                offset,
            } => {
                let Some(slot) = self.vars.get(name).copied() else {
                    let msg = if is_reserved(name) {
                        format!("cannot assign to built-in name '{name}'")
                    } else {
                        format!("assignment to undeclared variable '{name}'")
                    };
                    return Err(ScriptError::new(*offset, msg));
                };
                self.lower_expr(chunk, value, *offset)?;
                chunk.emit(Op::StoreVar(slot), *offset);
            }
            Stmt::Command { name, args, offset } => {
                let Some((id, min, max)) = CommandId::lookup(name) else {
                    let msg = if BuiltinId::lookup(name).is_some() {
                        format!("'{name}' is a function; its value must be used")
                    } else {
                        format!("unknown command '{name}'")
                    };
                    return Err(ScriptError::new(*offset, msg));
                };
                let argc = check_arity(name, args.len(), min, max, *offset)?;
                for a in args {
                    self.lower_expr(chunk, a, *offset)?;
                }
                chunk.emit(Op::Command { id, argc }, *offset);
            }
        }
        Ok(())
    }

    fn lower_expr(&self, chunk: &mut Chunk, expr: &Expr, at: usize) -> Result<(), ScriptError> {
        match expr {
            Expr::Lit(Lit::F64(v)) => {
                let idx = chunk.push_const(ConstVal::F64(*v));
                chunk.emit(Op::PushConst(idx), at);
            }
            Expr::Lit(Lit::Bool(v)) => {
                let idx = chunk.push_const(ConstVal::Bool(*v));
                chunk.emit(Op::PushConst(idx), at);
            }
            Expr::Name { name, offset } => {
                if let Some(slot) = self.vars.get(name) {
                    chunk.emit(Op::LoadVar(*slot), at);
                } else if let Some(field) = StateField::lookup(name) {
                    chunk.emit(Op::LoadState(field), at);
                } else if let Some(v) = constant(name) {
                    let idx = chunk.push_const(ConstVal::F64(v));
                    chunk.emit(Op::PushConst(idx), at);
                } else {
                    return Err(ScriptError::new(
                        *offset,
                        format!("unknown name '{name}'"),
                    ));
                }
            }
            Expr::Unary { op, expr } => {
                self.lower_expr(chunk, expr, at)?;
                chunk.emit(
                    match op {
                        UnaryOp::Neg => Op::Neg,
                        UnaryOp::Not => Op::Not,
                    },
                    at,
                );
            }
            Expr::Binary { op, left, right } => {
                self.lower_expr(chunk, left, at)?;
                self.lower_expr(chunk, right, at)?;
                chunk.emit(binary_op(*op), at);
            }
            Expr::Call { func, args, offset } => {
                let Some((id, arity)) = BuiltinId::lookup(func) else {
                    let msg = if CommandId::lookup(func).is_some() {
                        format!("'{func}' is a command and has no value")
                    } else {
                        format!("unknown function '{func}'")
                    };
                    return Err(ScriptError::new(*offset, msg));
                };
                let argc = check_arity(func, args.len(), arity, arity, *offset)?;
                for a in args {
                    self.lower_expr(chunk, a, at)?;
                }
                chunk.emit(Op::CallBuiltin { id, argc }, at);
            }
        }
        Ok(())
    }
}

fn binary_op(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Mod => Op::Mod,
        BinaryOp::Eq => Op::Eq,
        BinaryOp::Ne => Op::Ne,
        BinaryOp::Lt => Op::Lt,
        BinaryOp::Le => Op::Le,
        BinaryOp::Gt => Op::Gt,
        BinaryOp::Ge => Op::Ge,
        BinaryOp::And => Op::And,
        BinaryOp::Or => Op::Or,
    }
}

fn check_arity(name: &str, got: usize, min: u8, max: u8, offset: usize) -> Result<u8, ScriptError> {
    let ok = u8::try_from(got)
        .ok()
        .filter(|n| (min..=max).contains(n));
    ok.ok_or_else(|| {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        ScriptError::new(
            offset,
            format!("'{name}' expects {expected} argument(s), got {got}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_get_stable_slots() {
        let p = compile_script("setup { let a = 1 }\nlet b = a\nlet a = b + 1\nforward(a)")
            .unwrap();
        assert_eq!(p.var_names, vec!["a".to_owned(), "b".to_owned()]);
        assert!(!p.setup.ops.is_empty());
    }

    #[test]
    fn resolves_state_fields_and_constants() {
        let p = compile_script("turn(step * tau / 8)").unwrap();
        assert!(p.step.ops.contains(&Op::LoadState(StateField::Step)));
        assert_eq!(p.var_count(), 0);
    }

    #[test]
    fn rejects_bad_names_and_arity() {
        for src in [
            "forward(q)",
            "fly(1)",
            "forward(1, 2)",
            "color(1, 1)",
            "min(1)",
            "forward(turn(1))",
            "sin(1)",
            "let step = 1",
            "x = 3",
            "n = 3",
            "setup { forward(n) }\nlet n = 1",
        ] {
            assert!(compile_script(src).is_err(), "accepted: {src}");
        }
    }

    #[test]
    fn optional_alpha_is_accepted() {
        compile_script("color(1, 0, 0, 0.5)\nbackground(0, 0, 0)").unwrap();
    }
}
