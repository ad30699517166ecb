// src/export/dot.rs

use std::fmt::Write;

use crate::export::ExportGraph;

/// Render as Graphviz DOT source.
pub fn to_dot(graph: &ExportGraph) -> String {
    let mut out = String::new();
    out.push_str("// The Task Graph\ndigraph {\n");

    for node in &graph.nodes {
        let mut attrs = Vec::new();
        if let Some(label) = &node.label {
            attrs.push(format!("label={}", quote(label)));
        }
        if let Some(shape) = &node.shape {
            attrs.push(format!("shape={shape}"));
        }
        let _ = writeln!(out, "\t{}{}", quote(&node.id), attr_list(&attrs));
    }

    for edge in &graph.edges {
        let mut attrs = vec![format!("label={}", quote(&edge.label))];
        if let Some(style) = &edge.style {
            attrs.push(format!("style={style}"));
        }
        let _ = writeln!(
            out,
            "\t{} -> {}{}",
            quote(&edge.from),
            quote(&edge.to),
            attr_list(&attrs)
        );
    }

    out.push_str("}\n");
    out
}

fn attr_list(attrs: &[String]) -> String {
    if attrs.is_empty() {
        String::new()
    } else {
        format!(" [{}]", attrs.join(" "))
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
