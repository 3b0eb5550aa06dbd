//! Compiled expression evaluation.
//!
//! Expressions evaluate against a scope chain; the only effectful form is
//! assignment, which the host context interprets (the DOM engine cascades
//! invalidation, the HTML renderer just writes the slot).

use weft::artifact::RExpr;
use weft::ast::{BinaryOp, Lit, UnaryOp};

use crate::scope::{ScopeId, Scopes};
use crate::value::Value;

/// Host seam for evaluation: scope access plus assignment semantics.
pub trait EvalCtx {
    fn scopes(&self) -> &Scopes;
    fn assign(&mut self, scope: ScopeId, accessor: &str, value: Value);
}

pub fn eval(cx: &mut dyn EvalCtx, scope: ScopeId, expr: &RExpr) -> Value {
    match expr {
        RExpr::Lit(lit) => lit_value(lit),
        RExpr::Read { hops, accessor } => {
            let target = cx.scopes().ancestor(scope, *hops);
            cx.scopes().get(target).read(accessor)
        }
        RExpr::Member { object, prop } => eval(cx, scope, object).get(prop),
        RExpr::Concat(parts) => {
            let mut out = String::new();
            for part in parts {
                out.push_str(&eval(cx, scope, part).display());
            }
            Value::Str(out)
        }
        RExpr::Unary { op, operand } => {
            let value = eval(cx, scope, operand);
            match op {
                UnaryOp::Not => Value::Bool(!value.truthy()),
                UnaryOp::Neg => match value {
                    Value::Int(i) => Value::Int(-i),
                    _ => Value::Null,
                },
            }
        }
        RExpr::Binary { op, lhs, rhs } => {
            let left = eval(cx, scope, lhs);
            // Logical operators short-circuit on the left value.
            match op {
                BinaryOp::And => {
                    return if left.truthy() {
                        eval(cx, scope, rhs)
                    } else {
                        left
                    };
                }
                BinaryOp::Or => {
                    return if left.truthy() {
                        left
                    } else {
                        eval(cx, scope, rhs)
                    };
                }
                _ => {}
            }
            let right = eval(cx, scope, rhs);
            binary(*op, left, right)
        }
        RExpr::Assign {
            hops,
            accessor,
            value,
        } => {
            let computed = eval(cx, scope, value);
            let target = cx.scopes().ancestor(scope, *hops);
            cx.assign(target, accessor, computed.clone());
            computed
        }
        RExpr::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), eval(cx, scope, field)))
                .collect(),
        ),
        RExpr::Merge(parts) => {
            let mut merged = Value::Object(Default::default());
            for part in parts {
                let value = eval(cx, scope, part);
                merged.merge(&value);
            }
            merged
        }
        RExpr::AttrSeq(items) => {
            let mut values: Vec<Value> = items.iter().map(|e| eval(cx, scope, e)).collect();
            match values.len() {
                0 => Value::Null,
                1 => values.remove(0),
                _ => {
                    let first = values.remove(0);
                    Value::Seq {
                        first: Box::new(first),
                        rest: values,
                    }
                }
            }
        }
        RExpr::Cond(arms) => {
            for (test, value) in arms {
                let live = match test {
                    None => true,
                    Some(test) => eval(cx, scope, test).truthy(),
                };
                if live {
                    return eval(cx, scope, value);
                }
            }
            Value::Unset
        }
        RExpr::Renderer { section } => {
            let owner = cx.scopes().get(scope);
            Value::Renderer {
                template: owner.template.clone(),
                section: *section,
                scope,
            }
        }
    }
}

pub fn lit_value(lit: &Lit) -> Value {
    match lit {
        Lit::Str(s) => Value::Str(s.clone()),
        Lit::Int(i) => Value::Int(*i),
        Lit::Bool(b) => Value::Bool(*b),
        Lit::Null => Value::Null,
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    use BinaryOp::*;
    match (op, &left, &right) {
        (Add, Value::Int(a), Value::Int(b)) => Value::Int(a + b),
        (Add, ..) => Value::Str(left.display() + &right.display()),
        (Sub, Value::Int(a), Value::Int(b)) => Value::Int(a - b),
        (Mul, Value::Int(a), Value::Int(b)) => Value::Int(a * b),
        (Div, Value::Int(a), Value::Int(b)) if *b != 0 => Value::Int(a / b),
        (Sub | Mul | Div, ..) => Value::Null,
        (Eq, ..) => Value::Bool(left == right),
        (NotEq, ..) => Value::Bool(left != right),
        (Lt, Value::Int(a), Value::Int(b)) => Value::Bool(a < b),
        (LtEq, Value::Int(a), Value::Int(b)) => Value::Bool(a <= b),
        (Gt, Value::Int(a), Value::Int(b)) => Value::Bool(a > b),
        (GtEq, Value::Int(a), Value::Int(b)) => Value::Bool(a >= b),
        (Lt, Value::Str(a), Value::Str(b)) => Value::Bool(a < b),
        (Gt, Value::Str(a), Value::Str(b)) => Value::Bool(a > b),
        (Lt | LtEq | Gt | GtEq, ..) => Value::Bool(false),
        (And | Or, ..) => unreachable!("logical ops short-circuit above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        scopes: Scopes,
    }

    impl EvalCtx for Plain {
        fn scopes(&self) -> &Scopes {
            &self.scopes
        }

        fn assign(&mut self, scope: ScopeId, accessor: &str, value: Value) {
            self.scopes.get_mut(scope).write(accessor, value);
        }
    }

    fn ctx() -> (Plain, ScopeId) {
        let mut scopes = Scopes::new();
        let root = scopes.create("app", 0, None);
        (Plain { scopes }, root)
    }

    #[test]
    fn reads_climb_the_scope_chain() {
        let (mut cx, root) = ctx();
        let child = cx.scopes.create("app", 1, Some(root));
        cx.scopes.get_mut(root).write("0", Value::Int(7));

        let expr = RExpr::Read {
            hops: 1,
            accessor: "0".into(),
        };
        assert_eq!(eval(&mut cx, child, &expr), Value::Int(7));
    }

    #[test]
    fn assignment_writes_and_yields() {
        let (mut cx, root) = ctx();
        let expr = RExpr::Assign {
            hops: 0,
            accessor: "0".into(),
            value: Box::new(RExpr::Lit(Lit::Int(3))),
        };
        assert_eq!(eval(&mut cx, root, &expr), Value::Int(3));
        assert_eq!(cx.scopes.get(root).read("0"), Value::Int(3));
    }

    #[test]
    fn cond_without_live_arm_is_unset() {
        let (mut cx, root) = ctx();
        let expr = RExpr::Cond(vec![(
            Some(RExpr::Lit(Lit::Bool(false))),
            RExpr::Lit(Lit::Int(1)),
        )]);
        assert_eq!(eval(&mut cx, root, &expr), Value::Unset);
    }

    #[test]
    fn concat_renders_nulls_empty() {
        let (mut cx, root) = ctx();
        let expr = RExpr::Concat(vec![
            RExpr::Lit(Lit::Str("a".into())),
            RExpr::Lit(Lit::Null),
            RExpr::Lit(Lit::Int(2)),
        ]);
        assert_eq!(eval(&mut cx, root, &expr), Value::str("a2"));
    }
}
