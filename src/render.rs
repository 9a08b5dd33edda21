// promptmap/src/render.rs
//! Box-drawing text layout for a finished tree.
//!
//! Output format (example):
//! ```text
//! Root
//!  └─ ProjectA
//!      └─ My.Namespace
//!          ├─ Property string Name { get; } [public]
//!          ├─ Method void Foo() [public]
//! ```
//! Lines always take the mid-branch connector; only children distinguish
//! the last entry. Children are emitted in name order.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::tree::{Line, TreeNode};

const MID: &str = " ├─ ";
const LAST: &str = " └─ ";
const BAR: &str = " │  ";
const BLANK: &str = "    ";

/// How lines within one node are ordered.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineOrder {
    /// As they arrived (default).
    #[default]
    Arrival,
    /// Stable sort by sort key, falling back to the line text.
    Stable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub line_order: LineOrder,
}

/// Render with default options.
pub fn render(root: &TreeNode) -> String {
    render_with(root, RenderOptions::default())
}

pub fn render_with(root: &TreeNode, opts: RenderOptions) -> String {
    let mut out = String::new();
    if !root.name().is_empty() {
        out.push_str(root.name());
        out.push('\n');
    }
    render_body(root, "", opts, &mut out);
    out
}

fn render_body(node: &TreeNode, prefix: &str, opts: RenderOptions, out: &mut String) {
    for line in ordered_lines(node, opts.line_order) {
        // writing into a String cannot fail
        let _ = writeln!(out, "{prefix}{MID}{}", line.text);
    }

    let children = node.sorted_children();
    let count = children.len();
    for (idx, child) in children.iter().enumerate() {
        let last = idx + 1 == count;
        let _ = writeln!(out, "{prefix}{}{}", if last { LAST } else { MID }, child.name());
        let next = format!("{prefix}{}", if last { BLANK } else { BAR });
        render_body(child, &next, opts, out);
    }
}

fn ordered_lines(node: &TreeNode, order: LineOrder) -> Vec<Line> {
    let mut lines = node.lines();
    if order == LineOrder::Stable {
        lines.sort_by(|a, b| {
            let ka = a.sort_key.as_deref().unwrap_or(&a.text);
            let kb = b.sort_key.as_deref().unwrap_or(&b.text);
            ka.cmp(kb).then_with(|| a.text.cmp(&b.text))
        });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregate::Aggregator, record::Record};

    fn tree(root_name: &str, records: Vec<Record>) -> std::sync::Arc<TreeNode> {
        let agg = Aggregator::new(root_name);
        for r in records {
            agg.submit(r).unwrap();
        }
        agg.finish()
    }

    #[test]
    fn simple_tree_matches_expected_layout() {
        let root = tree(
            "Root",
            vec![
                Record::member(["ProjectA", "My.Namespace"], "Property string Name { get; } [public]"),
                Record::member(["ProjectA", "My.Namespace"], "Method void Foo() [public]"),
            ],
        );
        let expected = "\
Root
 └─ ProjectA
     └─ My.Namespace
         ├─ Property string Name { get; } [public]
         ├─ Method void Foo() [public]
";
        assert_eq!(render(&root), expected);
    }

    #[test]
    fn non_last_children_get_a_bar() {
        let root = tree(
            "",
            vec![
                Record::member(["Proj", "A.B", "Y"], "Property int N { get; } [public]"),
                Record::member(["Proj", "A.B", "X"], "Method void M() [public]"),
                Record::container(["Proj", "C"]),
            ],
        );
        let expected = concat!(
            " └─ Proj\n",
            "     ├─ A.B\n",
            "     │   ├─ X\n",
            "     │   │   ├─ Method void M() [public]\n",
            "     │   └─ Y\n",
            "     │       ├─ Property int N { get; } [public]\n",
            "     └─ C\n",
        );
        assert_eq!(render(&root), expected);
    }

    #[test]
    fn nested_blocks_contain_their_lines() {
        let root = tree("", vec![Record::member(["P", "NS", "T"], "Method void Foo() [public]")]);
        let text = render(&root);
        let p = text.find("P\n").unwrap();
        let ns = text.find("NS\n").unwrap();
        let t = text.find("T\n").unwrap();
        let m = text.find("Method void Foo() [public]").unwrap();
        assert!(p < ns && ns < t && t < m);
        // deeper nesting -> longer prefix
        let indent = |needle: &str| {
            text.lines().find(|l| l.ends_with(needle)).map(|l| l.len() - needle.len()).unwrap()
        };
        assert!(indent(" └─ P") < indent(" └─ NS"));
        assert!(indent(" └─ NS") < indent(" └─ T"));
    }

    #[test]
    fn empty_trees() {
        assert_eq!(render(&TreeNode::new("")), "");
        assert_eq!(render(&TreeNode::new("Solution")), "Solution\n");
    }

    #[test]
    fn stable_order_sorts_by_key_then_text() {
        let root = tree(
            "",
            vec![
                Record::member(["T"], "Method void b() [public]").with_sort_key("b"),
                Record::member(["T"], "Method void a() [public]").with_sort_key("a"),
                Record::member(["T"], "Field i32 c [public]"),
            ],
        );
        let arrival = render(&root);
        let stable = render_with(&root, RenderOptions { line_order: LineOrder::Stable });
        assert!(arrival.find("b()").unwrap() < arrival.find("a()").unwrap());
        assert!(stable.find("a()").unwrap() < stable.find("b()").unwrap());
        // "Field i32 c [public]" has no key, sorts by its text before "a"/"b"
        assert!(stable.find("Field").unwrap() < stable.find("a()").unwrap());
    }
}
