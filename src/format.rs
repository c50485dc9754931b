// Human-readable rendering: infix `format` and indented `format_tree`.
// Debug output only -- not meant to round-trip losslessly beyond the weak
// parse/format property in the test suite.

use crate::node::NodeKind;

pub fn format(node: &NodeKind) -> String {
    match node {
        NodeKind::Empty => "<empty>".to_string(),
        NodeKind::Number(v) => format!("{}", v),
        NodeKind::Reference(p) => p.name.clone().unwrap_or_else(|| "{V}".to_string()),
        NodeKind::ArrayReference(p) => p.name.clone().unwrap_or_else(|| "{A}".to_string()),
        NodeKind::Symbol(name) => name.clone(),
        NodeKind::Local(slot) => slot.name.clone(),
        NodeKind::UnaryOp(op, a) => format!("{}{}", op.spelling(), format(a)),
        NodeKind::BinaryOp(op, a, b) => format!("({} {} {})", format(a), op.spelling(), format(b)),
        NodeKind::Multinary(op, args) => {
            let rendered: Vec<String> = args.iter().map(|a| format(a)).collect();
            format!("({})", rendered.join(&format!(" {} ", op.spelling())))
        }
        NodeKind::UnaryFn(tag, a) => format!("{}({})", tag.spelling(), format(a)),
        NodeKind::BinaryFn(tag, a, b) => format!("{}({}, {})", tag.spelling(), format(a), format(b)),
        NodeKind::Conditional(c, t, e) => {
            format!("if({}, {}, {})", format(c), format(t), format(e))
        }
        NodeKind::IntegerPower(a, n) => format!("({})^{}", format(a), n),
    }
}

pub fn format_tree(node: &NodeKind, indent: &str) -> String {
    let mut out = String::new();
    let head = match node {
        NodeKind::Empty => "<empty>".to_string(),
        NodeKind::Number(v) => format!("{}", v),
        NodeKind::Reference(p) => p.name.clone().unwrap_or_else(|| "{V}".to_string()),
        NodeKind::ArrayReference(p) => p.name.clone().unwrap_or_else(|| "{A}".to_string()),
        NodeKind::Symbol(name) => format!("symbol {}", name),
        NodeKind::Local(slot) => format!("local {}", slot.name),
        NodeKind::UnaryOp(op, _) => format!("unary {}", op.spelling()),
        NodeKind::BinaryOp(op, _, _) => format!("binary {}", op.spelling()),
        NodeKind::Multinary(op, args) => format!("multinary {} ({} args)", op.spelling(), args.len()),
        NodeKind::UnaryFn(tag, _) => format!("fn {}", tag.spelling()),
        NodeKind::BinaryFn(tag, _, _) => format!("fn {}", tag.spelling()),
        NodeKind::Conditional(_, _, _) => "if".to_string(),
        NodeKind::IntegerPower(_, n) => format!("integer_power^{}", n),
    };
    out.push_str(indent);
    out.push_str(&head);
    out.push('\n');
    let child_indent = format!("{}  ", indent);
    for child in node.children() {
        out.push_str(&format_tree(&child, &child_indent));
    }
    out
}
