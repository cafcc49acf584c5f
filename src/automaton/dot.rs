//! Graphviz rendering of a single automaton

use super::{Cfa, LocationKind, TransitionKind};
use crate::error::Result;
use std::fmt::Write;

/// Render `cfa` as a `digraph`
pub fn write_dot(cfa: &Cfa, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "digraph \"{}\" {{", escape(cfa.name()))?;
    writeln!(out, "  node [shape=circle];")?;

    for loc in cfa.locations() {
        let mut attrs = vec![format!("label=\"{}\"", loc.id())];
        if loc.kind() == LocationKind::Error {
            attrs.push("color=red".to_string());
            if let Some(code) = cfa.error_code_expr(loc.id()) {
                attrs[0] = format!("label=\"{}\\n{}\"", loc.id(), escape(&code.to_string()));
            }
        }
        if loc.id() == cfa.entry() || loc.id() == cfa.exit() {
            attrs.push("shape=doublecircle".to_string());
        }
        writeln!(out, "  {} [{}];", loc.id(), attrs.join(", "))?;
    }

    for edge in cfa.transitions() {
        let (Some(source), Some(target)) = (edge.source(), edge.target()) else {
            continue;
        };

        let mut label = format!("[{}]", edge.guard());
        match edge.kind() {
            TransitionKind::Assign { assignments } => {
                for assignment in assignments {
                    write!(label, "\\n{}", assignment)?;
                }
            }
            TransitionKind::Call {
                callee,
                input_args,
                output_args,
            } => {
                write!(label, "\\ncall {}(", callee)?;
                let args: Vec<String> = input_args.iter().map(|a| a.value().to_string()).collect();
                write!(label, "{})", args.join(", "))?;
                for output in output_args {
                    write!(label, "\\n{}", output)?;
                }
            }
        }

        writeln!(
            out,
            "  {} -> {} [label=\"{}\"];",
            source,
            target,
            escape(&label)
        )?;
    }

    writeln!(out, "}}")?;
    Ok(())
}

/// Render `cfa` into a fresh string
pub fn to_dot(cfa: &Cfa) -> Result<String> {
    let mut out = String::new();
    write_dot(cfa, &mut out)?;
    Ok(out)
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}
