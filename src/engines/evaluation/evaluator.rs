use crate::engines::generation::ast::{Node, NodeKind, Operator};
use crate::functions::indicators;
use crate::types::{MarketContext, Value};

/// Evaluate a node against one market context.
///
/// Never fails: division by zero yields a signed infinity, missing history
/// degrades to the current bar, and mixed bool/number operands are coerced
/// (see [`Value::as_bool`] and [`Value::as_f64`]).
pub fn evaluate(node: &Node, ctx: &MarketContext) -> Value {
    let children = node.children();
    match node.kind() {
        NodeKind::Operator(op) => evaluate_operator(*op, children, ctx),
        NodeKind::Comparator(cmp) => {
            let a = evaluate(&children[0], ctx).as_f64();
            let b = evaluate(&children[1], ctx).as_f64();
            Value::Bool(cmp.apply(a, b))
        }
        NodeKind::Indicator { name, params } => Value::Number(indicators::compute(name, params, ctx)),
        NodeKind::Constant(v) => Value::Number(*v),
        NodeKind::Variable(var) => Value::Number(var.value(ctx.current())),
    }
}

fn evaluate_operator(op: Operator, children: &[Node], ctx: &MarketContext) -> Value {
    match op {
        Operator::And => Value::Bool(
            evaluate(&children[0], ctx).as_bool() && evaluate(&children[1], ctx).as_bool(),
        ),
        Operator::Or => Value::Bool(
            evaluate(&children[0], ctx).as_bool() || evaluate(&children[1], ctx).as_bool(),
        ),
        Operator::Not => Value::Bool(!evaluate(&children[0], ctx).as_bool()),
        Operator::Add | Operator::Sub | Operator::Mul | Operator::Div => {
            let a = evaluate(&children[0], ctx).as_f64();
            let b = evaluate(&children[1], ctx).as_f64();
            Value::Number(arithmetic(op, a, b))
        }
    }
}

fn arithmetic(op: Operator, a: f64, b: f64) -> f64 {
    match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mul => a * b,
        Operator::Div => protected_div(a, b),
        Operator::And | Operator::Or | Operator::Not => f64::NAN,
    }
}

/// `a / b` with `x / 0 = +inf` for `x >= 0` and `-inf` for `x < 0`.
pub fn protected_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        if a.is_nan() {
            f64::NAN
        } else if a < 0.0 {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    } else {
        a / b
    }
}

/// Evaluate a gene bar by bar over `bars`, returning the boolean signal for
/// each bar. The context keeps at most `capacity` prior bars.
pub fn signal_series(node: &Node, bars: &[crate::types::Bar], capacity: usize) -> Vec<bool> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };

    let mut ctx = MarketContext::with_capacity(*first, capacity);
    let mut out = Vec::with_capacity(bars.len());
    out.push(evaluate(node, &ctx).as_bool());
    for bar in &bars[1..] {
        ctx.push(*bar);
        out.push(evaluate(node, &ctx).as_bool());
    }
    out
}
