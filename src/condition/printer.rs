// SPDX-License-Identifier: MIT

//! Tree rendering of parsed expressions, for diagnostics

use super::ast::Node;
use std::fmt::{self, Write};

const LAST_BRANCH: &str = " \\_ ";
const BRANCH: &str = "|__ ";

/// Render `root` as an indented tree, one node per line.
///
/// The last child of a node is drawn with ` \_ `, earlier children with `|__ `.
pub fn stringify(root: &Node) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_tree(&mut out, root);
    out
}

/// Write the tree rendering of `root` into `w`
pub fn write_tree<W: Write>(w: &mut W, root: &Node) -> fmt::Result {
    write_node(w, root, String::new())
}

fn write_node<W: Write>(w: &mut W, node: &Node, mut prefix: String) -> fmt::Result {
    writeln!(w, "{}{}", prefix, label(node))?;

    // the branch marker of this node becomes a continuation line for its children
    if prefix.len() >= BRANCH.len() {
        let pos = prefix.len() - BRANCH.len();
        let continued = prefix.as_bytes()[pos] == b'|';
        prefix.truncate(pos);
        prefix.push_str(if continued { "|   " } else { "    " });
    }

    let children = node.children();
    for (i, child) in children.iter().enumerate() {
        let marker = if i + 1 == children.len() {
            LAST_BRANCH
        } else {
            BRANCH
        };
        write_node(w, child, format!("{}{}", prefix, marker))?;
    }
    Ok(())
}

fn label(node: &Node) -> String {
    match node {
        Node::Literal(literal) => literal.to_string(),
        Node::Array(_) => "ARRAY".to_string(),
        Node::Function(function) => format!("FUNCTION<{}>", function.name),
    }
}
