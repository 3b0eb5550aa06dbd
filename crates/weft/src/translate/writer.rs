//! Per-section output accumulation.
//!
//! Each section under translation owns a [`SectionWriter`]: a skeleton
//! tree under construction, the walk visits recorded against it, and the
//! linear HTML program. The translator keeps a strict stack of writers;
//! entering a nested section pushes one, finishing it pops and seals the
//! section artifact.

use crate::artifact::{HtmlOp, SectionArtifact, SkelNode, skeleton_to_html};
use crate::walks::{self, Visit, VisitKind};

pub struct SectionWriter {
    pub section: u32,
    /// Open skeleton levels; `frames[0]` holds the section's root children.
    frames: Vec<Vec<SkelNode>>,
    /// Element names for open levels, outermost first.
    open: Vec<(String, Vec<(String, String)>, bool)>,
    visits: Vec<(Visit, String)>,
    pub html: Vec<HtmlOp>,
}

impl SectionWriter {
    pub fn new(section: u32) -> Self {
        Self {
            section,
            frames: vec![Vec::new()],
            open: Vec::new(),
            visits: Vec::new(),
            html: Vec::new(),
        }
    }

    /// Path of the next node appended at the current depth.
    fn next_path(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.len() as u32).collect()
    }

    /// Record a walk visit for the node about to be appended.
    pub fn visit(&mut self, kind: VisitKind, accessor: String) {
        self.visits.push((
            Visit {
                path: self.next_path(),
                kind,
            },
            accessor,
        ));
    }

    pub fn append(&mut self, node: SkelNode) {
        self.frames
            .last_mut()
            .unwrap_or_else(|| unreachable!("writer always has a root frame"))
            .push(node);
    }

    pub fn open_element(&mut self, name: String, attrs: Vec<(String, String)>, void: bool) {
        self.open.push((name, attrs, void));
        self.frames.push(Vec::new());
    }

    pub fn close_element(&mut self) {
        let children = self.frames.pop().unwrap_or_default();
        let (name, attrs, void) = self
            .open
            .pop()
            .unwrap_or_else(|| unreachable!("close without open"));
        self.append(SkelNode::Element {
            name,
            attrs,
            children,
            void,
        });
    }

    /// Append static HTML text, merging with a preceding static run.
    pub fn push_static(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(HtmlOp::Static(prev)) = self.html.last_mut() {
            prev.push_str(text);
        } else {
            self.html.push(HtmlOp::Static(text.to_string()));
        }
    }

    pub fn push_op(&mut self, op: HtmlOp) {
        self.html.push(op);
    }

    /// Seal the writer into its section artifact slot.
    pub fn finish(mut self, out: &mut SectionArtifact) {
        debug_assert!(self.open.is_empty(), "unclosed element at section end");
        let skeleton = self.frames.pop().unwrap_or_default();
        let visit_list: Vec<Visit> = self.visits.iter().map(|(v, _)| v.clone()).collect();
        out.walks = walks::encode(&visit_list);
        out.walk_refs = self.visits.into_iter().map(|(_, a)| a).collect();
        let mut html_text = String::new();
        skeleton_to_html(&skeleton, &mut html_text);
        out.skeleton_html = html_text;
        out.skeleton = skeleton;
        out.html = self.html;
    }
}

/// Minimal text escaping for dynamic content rendered into HTML bodies.
pub fn escape_text(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

/// Escaping for double-quoted attribute values.
pub fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_elements_build_a_tree() {
        let mut writer = SectionWriter::new(0);
        writer.open_element("div".into(), vec![], false);
        writer.visit(VisitKind::Get, "#input/0".into());
        writer.append(SkelNode::Element {
            name: "input".into(),
            attrs: vec![("type".into(), "checkbox".into())],
            children: vec![],
            void: true,
        });
        writer.close_element();

        let mut out = SectionArtifact::default();
        writer.finish(&mut out);
        assert_eq!(out.skeleton_html, "<div><input type=\"checkbox\"></div>");
        assert_eq!(out.walk_refs, vec!["#input/0"]);
        assert_eq!(out.walks, "b ");
    }

    #[test]
    fn static_runs_merge() {
        let mut writer = SectionWriter::new(0);
        writer.push_static("<div>");
        writer.push_static("hi");
        assert_eq!(writer.html.len(), 1);
    }

    #[test]
    fn escapes_reserved_text() {
        let mut out = String::new();
        escape_text("a < b & c", &mut out);
        assert_eq!(out, "a &lt; b &amp; c");
    }
}
