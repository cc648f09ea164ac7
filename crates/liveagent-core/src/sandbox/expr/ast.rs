//! Expression tree for the safe expression grammar.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Chained comparison: `a < b <= c` holds `a` plus `[(<, b), (<=, c)]`.
    Compare {
        left: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    Bool {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `import a.b` / `from a import b`. Never evaluable.
    Import {
        module: String,
    },
}

impl Expr {
    /// Every node of the tree, parents before children.
    pub fn nodes(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut children = node.children();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Name(_) | Expr::Import { .. } => Vec::new(),
            Expr::List(items) | Expr::Tuple(items) => items.iter().collect(),
            Expr::Dict(pairs) => pairs.iter().flat_map(|(k, v)| [k, v]).collect(),
            Expr::Attribute { value, .. } => vec![value.as_ref()],
            Expr::Subscript { value, index } => vec![value.as_ref(), index.as_ref()],
            Expr::Call { func, args } => {
                let mut v = vec![func.as_ref()];
                v.extend(args.iter());
                v
            }
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Binary { left, right, .. } | Expr::Bool { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Expr::Compare { left, rest } => {
                let mut v = vec![left.as_ref()];
                v.extend(rest.iter().map(|(_, e)| e));
                v
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nodes_visits_call_arguments() {
        let expr = Expr::Binary {
            op: BinOp::Add,
            left: Box::new(Expr::Call {
                func: Box::new(Expr::Name("len".into())),
                args: vec![Expr::Name("items".into())],
            }),
            right: Box::new(Expr::Literal(json!(1))),
        };
        let nodes = expr.nodes();
        assert_eq!(nodes.len(), 5);
        assert!(matches!(nodes[0], Expr::Binary { .. }));
        assert!(matches!(nodes[1], Expr::Call { .. }));
        assert_eq!(nodes[2], &Expr::Name("len".into()));
    }
}
