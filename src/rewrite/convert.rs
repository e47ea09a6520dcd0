//! Linearization of an [`AstRewrite`] into text edits.
//!
//! The walk emits edits for the top-most changed nodes only. The text of a
//! replaced node's copied or moved parts is rendered from the original buffer
//! with the edits recorded inside those parts applied first, so nested edits are
//! folded into their parent's text instead of being emitted twice.

use std::collections::{BTreeMap, HashSet};

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::config::RefactorConfig;
use crate::transform::text::{dedent, indent_tail, indentation_at, starts_line};
use crate::transform::{TextEdit, TextEditSet, TextRange};

use super::{Action, AstRewrite, ListEntry, ListRewrite, Part, RewriteError, SyntheticId};

pub(crate) struct Converter<'a> {
    rewrite: &'a AstRewrite,
    ast: &'a Ast,
    source: &'a str,
    config: &'a RefactorConfig,
    placed: HashSet<SyntheticId>,
    visited: HashSet<NodeId>,
    /// Nodes whose replacement is being rendered.
    active: Vec<NodeId>,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(
        rewrite: &'a AstRewrite,
        ast: &'a Ast,
        source: &'a str,
        config: &'a RefactorConfig,
    ) -> Self {
        Self {
            rewrite,
            ast,
            source,
            config,
            placed: HashSet::new(),
            visited: HashSet::new(),
            active: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> Result<TextEditSet, RewriteError> {
        let mut edits = Vec::new();
        self.collect_children(self.ast.root(), &mut edits)?;

        let mut moved: Vec<_> = self.rewrite.moved.iter().collect();
        moved.sort();
        for (node, target) in moved {
            if !self.placed.contains(target) {
                return Err(RewriteError::UnplacedNode(*node));
            }
        }

        let mut pending: Vec<_> = self.rewrite.events.keys().copied().collect();
        pending.sort();
        for node in pending {
            if self.visited.contains(&node) || self.rewrite.moved.contains_key(&node) {
                continue;
            }
            let dropped = self
                .ast
                .ancestors(node)
                .any(|a| self.rewrite.is_removed(self.ast, a) || self.rewrite.moved.contains_key(&a));
            if !dropped {
                return Err(RewriteError::HiddenEdit(node));
            }
        }

        Ok(TextEditSet::from_edits(edits)?)
    }

    fn group(&self, node: NodeId) -> Option<String> {
        self.rewrite.events.get(&node).and_then(|e| e.group.clone())
    }

    fn collect_node(&mut self, node: NodeId, out: &mut Vec<TextEdit>) -> Result<(), RewriteError> {
        match self.rewrite.events.get(&node).map(|e| e.action) {
            Some(Action::Replace(replacement)) => {
                let text = self.render_replacement(node, replacement)?;
                out.push(TextEdit::replace(self.ast.range(node), text).with_group(self.group(node)));
                Ok(())
            }
            Some(Action::Remove) => {
                self.visited.insert(node);
                let (range, text) = self.removal(node);
                out.push(TextEdit::replace(range, text).with_group(self.group(node)));
                Ok(())
            }
            None => self.collect_children(node, out),
        }
    }

    fn collect_children(&mut self, node: NodeId, out: &mut Vec<TextEdit>) -> Result<(), RewriteError> {
        let mut handled: Vec<Slot> = Vec::new();
        for child in self.ast.children(node).to_vec() {
            let slot = self.ast.slot(child);
            if self.modified_list(node, slot).is_some() {
                if !handled.contains(&slot) {
                    handled.push(slot);
                    self.collect_list(node, slot, out)?;
                }
                continue;
            }
            self.collect_node(child, out)?;
        }

        // Lists that were empty in the original tree.
        let empty: Vec<Slot> = self
            .rewrite
            .lists
            .iter()
            .filter(|((parent, slot), list)| *parent == node && list.is_modified() && !handled.contains(slot))
            .map(|((_, slot), _)| *slot)
            .collect();
        for slot in empty {
            self.collect_list(node, slot, out)?;
        }
        Ok(())
    }

    fn modified_list(&self, parent: NodeId, slot: Slot) -> Option<&'a ListRewrite> {
        self.rewrite
            .lists
            .get(&(parent, slot))
            .filter(|list| list.is_modified())
    }

    fn collect_list(&mut self, parent: NodeId, slot: Slot, out: &mut Vec<TextEdit>) -> Result<(), RewriteError> {
        let Some(list) = self.modified_list(parent, slot) else {
            return Ok(());
        };
        if is_comma_separated(self.ast, parent, slot) {
            self.collect_comma_list(parent, slot, list, out)
        } else {
            self.collect_line_list(parent, slot, list, out)
        }
    }

    /// Comma lists are regenerated as a whole from their rendered entries.
    fn collect_comma_list(
        &mut self,
        parent: NodeId,
        slot: Slot,
        list: &ListRewrite,
        out: &mut Vec<TextEdit>,
    ) -> Result<(), RewriteError> {
        let indent = indentation_at(self.source, self.ast.range(parent).start).to_string();
        let mut entries = Vec::new();
        let mut group = None;
        for item in &list.items {
            if group.is_none() {
                group = item.group.clone();
            }
            if item.removed {
                continue;
            }
            let text = match item.entry {
                ListEntry::Original(node) => self.render_in_place(node)?,
                ListEntry::Inserted(id) => indent_tail(&self.render_synthetic(id)?, &indent),
            };
            entries.push(text);
        }
        let text = entries.join(", ");

        let originals = list.originals();
        match (originals.first(), originals.last()) {
            (Some(first), Some(last)) => {
                let range = TextRange::new(self.ast.range(*first).start, self.ast.range(*last).end);
                out.push(TextEdit::replace(range, text).with_group(group));
            }
            _ => {
                let (offset, prefix, suffix) = self.empty_list_anchor(parent, slot);
                out.push(TextEdit::insert(offset, format!("{prefix}{text}{suffix}")).with_group(group));
            }
        }
        Ok(())
    }

    /// Statement and member lists get one edit per removed run and per
    /// insertion point, leaving the untouched entries and the text between them
    /// alone.
    fn collect_line_list(
        &mut self,
        parent: NodeId,
        slot: Slot,
        list: &ListRewrite,
        out: &mut Vec<TextEdit>,
    ) -> Result<(), RewriteError> {
        let indent = self.entry_indent(parent, slot, list);
        let kept: Vec<NodeId> = list
            .items
            .iter()
            .filter_map(|item| match item.entry {
                ListEntry::Original(node) if !item.removed => Some(node),
                _ => None,
            })
            .collect();

        if kept.is_empty() {
            return self.replace_list_content(parent, slot, list, &indent, out);
        }

        // Insertions, keyed by the offset they attach to.
        let mut inserts: BTreeMap<usize, (String, Option<String>)> = BTreeMap::new();
        let mut last_kept: Option<NodeId> = None;
        let mut before_first: Vec<(SyntheticId, Option<String>)> = Vec::new();
        for item in &list.items {
            match item.entry {
                ListEntry::Original(node) if !item.removed => last_kept = Some(node),
                ListEntry::Original(_) => {}
                ListEntry::Inserted(id) => match last_kept {
                    Some(anchor) => {
                        let text = self.render_entry(id, &indent)?;
                        let separator = self.separator(id);
                        let entry = inserts
                            .entry(self.entry_end(anchor))
                            .or_insert_with(|| (String::new(), item.group.clone()));
                        entry.0.push_str(&format!("{separator}{indent}{text}"));
                    }
                    None => before_first.push((id, item.group.clone())),
                },
            }
        }
        if !before_first.is_empty() {
            let anchor = self.ast.range(kept[0]).start;
            let mut text = String::new();
            let group = before_first[0].1.clone();
            for (id, _) in before_first {
                let rendered = self.render_entry(id, &indent)?;
                let separator = self.separator(id);
                text.push_str(&format!("{rendered}{separator}{indent}"));
            }
            inserts.insert(anchor, (text, group));
        }

        // Removed runs.
        let originals: Vec<(NodeId, bool, Option<String>)> = list
            .items
            .iter()
            .filter_map(|item| match item.entry {
                ListEntry::Original(node) => Some((node, item.removed, item.group.clone())),
                ListEntry::Inserted(_) => None,
            })
            .collect();
        let mut index = 0;
        while index < originals.len() {
            if !originals[index].1 {
                let node = originals[index].0;
                self.collect_node(node, out)?;
                index += 1;
                continue;
            }
            let start = index;
            while index < originals.len() && originals[index].1 {
                index += 1;
            }
            let first = originals[start].0;
            let last = originals[index - 1].0;
            let group = originals[start].2.clone();
            let prev_kept = start.checked_sub(1).map(|i| originals[i].0);
            let next_kept = originals.get(index).map(|o| o.0);
            let range = match (prev_kept, next_kept) {
                (Some(prev), _) => TextRange::new(self.entry_end(prev), self.entry_end(last)),
                (None, Some(next)) => {
                    TextRange::new(self.ast.range(first).start, self.ast.range(next).start)
                }
                (None, None) => TextRange::new(
                    self.whitespace_start(self.ast.range(first).start),
                    self.entry_end(last),
                ),
            };
            out.push(TextEdit::delete(range).with_group(group));
        }

        for (offset, (text, group)) in inserts {
            out.push(TextEdit::insert(offset, text).with_group(group));
        }
        Ok(())
    }

    /// Every original entry is gone: the list's content is written anew.
    fn replace_list_content(
        &mut self,
        parent: NodeId,
        slot: Slot,
        list: &ListRewrite,
        indent: &str,
        out: &mut Vec<TextEdit>,
    ) -> Result<(), RewriteError> {
        let mut text = String::new();
        let mut group = None;
        for item in &list.items {
            if group.is_none() {
                group = item.group.clone();
            }
            if let ListEntry::Inserted(id) = item.entry
                && !item.removed
            {
                let rendered = self.render_entry(id, indent)?;
                if !text.is_empty() {
                    text.push_str(self.separator(id));
                }
                text.push_str(indent);
                text.push_str(&rendered);
            }
        }

        let originals = list.originals();
        let parent_range = self.ast.range(parent);
        let (range, text) = match (originals.first(), originals.last()) {
            (Some(first), Some(last)) if text.is_empty() => (
                TextRange::new(self.whitespace_start(self.ast.range(*first).start), self.entry_end(*last)),
                String::new(),
            ),
            (Some(first), Some(last)) => (
                TextRange::new(self.ast.range(*first).start, self.entry_end(*last)),
                text.trim_start().to_string(),
            ),
            _ if parent == self.ast.root() => {
                let text = text.trim_start();
                let text = if text.is_empty() {
                    String::new()
                } else {
                    format!("{text}{}", self.config.line_delimiter)
                };
                (TextRange::empty(parent_range.end), text)
            }
            _ => {
                let open = self.open_brace(parent, slot);
                let close = self.source[..parent_range.end].rfind('}').unwrap_or(parent_range.end);
                let outer = indentation_at(self.source, parent_range.start);
                let text = if text.is_empty() {
                    String::new()
                } else {
                    let delimiter = &self.config.line_delimiter;
                    format!("{delimiter}{text}{delimiter}{outer}")
                };
                (TextRange::new(open.min(close), close), text)
            }
        };
        out.push(TextEdit::replace(range, text).with_group(group));
        Ok(())
    }

    fn render_entry(&mut self, id: SyntheticId, indent: &str) -> Result<String, RewriteError> {
        Ok(indent_tail(&self.render_synthetic(id)?, indent))
    }

    fn separator(&self, id: SyntheticId) -> &'static str {
        match self.rewrite.synthetic_kind(id) {
            NodeKind::MethodDecl | NodeKind::ClassDecl | NodeKind::FunctionDecl => "\n\n",
            _ => "\n",
        }
    }

    fn entry_indent(&self, parent: NodeId, slot: Slot, list: &ListRewrite) -> String {
        if let Some(first) = list.originals().first() {
            let start = self.ast.range(*first).start;
            if starts_line(self.source, start) {
                return indentation_at(self.source, start).to_string();
            }
        }
        if parent == self.ast.root() {
            return String::new();
        }
        let anchor = match slot {
            Slot::Cases => self.ast.range(parent).start,
            _ => self
                .ast
                .enclosing_statement(parent)
                .or_else(|| self.ast.enclosing(parent, |k| k == NodeKind::MethodDecl || k.is_class_like()))
                .map(|s| self.ast.range(s).start)
                .unwrap_or(self.ast.range(parent).start),
        };
        let base = if self.ast.kind(parent) == NodeKind::Block {
            let owner = self.ast.parent(parent).unwrap_or(parent);
            indentation_at(self.source, self.ast.range(owner).start)
        } else {
            indentation_at(self.source, anchor)
        };
        format!("{base}{}", self.config.indent)
    }

    /// End of a list entry, including a class member's trailing `;`.
    fn entry_end(&self, node: NodeId) -> usize {
        let end = self.ast.range(node).end;
        if self.ast.kind(node) == NodeKind::FieldDecl && self.source[end..].starts_with(';') {
            end + 1
        } else {
            end
        }
    }

    fn whitespace_start(&self, offset: usize) -> usize {
        let before = &self.source[..offset];
        before.trim_end().len()
    }

    fn open_brace(&self, parent: NodeId, slot: Slot) -> usize {
        let range = self.ast.range(parent);
        let from = match slot {
            Slot::Members => self
                .ast
                .children(parent)
                .iter()
                .filter(|c| matches!(self.ast.slot(**c), Slot::Name | Slot::Heritage))
                .map(|c| self.ast.range(*c).end)
                .max()
                .unwrap_or(range.start),
            Slot::Cases => self
                .ast
                .child(parent, Slot::Condition)
                .map(|c| self.ast.range(c).end)
                .unwrap_or(range.start),
            _ => range.start,
        };
        self.source[from..range.end]
            .find('{')
            .map(|i| from + i + 1)
            .unwrap_or(range.end)
    }

    fn empty_list_anchor(&self, parent: NodeId, slot: Slot) -> (usize, &'static str, &'static str) {
        let range = self.ast.range(parent);
        let (from, open) = match slot {
            Slot::Params => (
                self.ast
                    .child(parent, Slot::Name)
                    .map(|n| self.ast.range(n).end)
                    .unwrap_or(range.start),
                '(',
            ),
            Slot::Arguments => (
                self.ast
                    .child(parent, Slot::Callee)
                    .map(|n| self.ast.range(n).end)
                    .unwrap_or(range.start),
                '(',
            ),
            Slot::Elements => (range.start, '['),
            _ => (range.start, '{'),
        };
        match self.source[from..range.end].find(open) {
            Some(i) => (from + i + 1, "", ""),
            None if slot == Slot::Arguments => (range.end, "(", ")"),
            None => (range.end, "", ""),
        }
    }

    /// The range and text that make a non-list node disappear.
    fn removal(&self, node: NodeId) -> (TextRange, &'static str) {
        let range = self.ast.range(node);
        let previous = |slot: Slot| {
            self.ast
                .parent(node)
                .and_then(|p| self.ast.child(p, slot))
                .map(|s| self.ast.range(s).end)
        };
        match self.ast.slot(node) {
            Slot::Else => (TextRange::new(previous(Slot::Then).unwrap_or(range.start), range.end), ""),
            Slot::Value => (TextRange::new(previous(Slot::Name).unwrap_or(range.start), range.end), ""),
            Slot::Init if self.ast.kind(node).is_statement() => (range, ";"),
            Slot::Expression | Slot::Label => (TextRange::new(self.whitespace_start(range.start), range.end), ""),
            _ if self.ast.kind(node).is_statement() => (range, "{}"),
            _ => (range, ""),
        }
    }

    /// Text of an original node at its own place: its replacement, or its
    /// source with inner edits applied.
    pub(super) fn render_in_place(&mut self, node: NodeId) -> Result<String, RewriteError> {
        if let Some(Action::Replace(replacement)) = self.rewrite.events.get(&node).map(|e| e.action) {
            return self.render_replacement(node, replacement);
        }
        self.render_original(node)
    }

    fn render_replacement(&mut self, node: NodeId, replacement: SyntheticId) -> Result<String, RewriteError> {
        self.visited.insert(node);
        self.active.push(node);
        let rendered = self.render_synthetic(replacement);
        self.active.pop();
        let indent = indentation_at(self.source, self.ast.range(node).start);
        Ok(indent_tail(&rendered?, indent))
    }

    /// Source text of `node` with every edit recorded inside it applied.
    fn render_original(&mut self, node: NodeId) -> Result<String, RewriteError> {
        let range = self.ast.range(node);
        let mut inner = Vec::new();
        self.collect_children(node, &mut inner)?;
        let set = TextEditSet::from_edits(inner)?;
        let mut out = String::with_capacity(range.len());
        let mut cursor = range.start;
        for edit in set.edits() {
            let start = edit.range.start.clamp(cursor, range.end);
            out.push_str(&self.source[cursor..start]);
            out.push_str(&edit.new_text);
            cursor = edit.range.end.clamp(cursor, range.end);
        }
        out.push_str(&self.source[cursor..range.end]);
        Ok(out)
    }

    fn render_synthetic(&mut self, id: SyntheticId) -> Result<String, RewriteError> {
        self.placed.insert(id);
        let parts = self.rewrite.synthetics[id.0 as usize].parts.clone();
        let mut out = String::new();
        for part in parts {
            let text = match part {
                Part::Text(text) => {
                    out.push_str(&text);
                    continue;
                }
                // A copy inside the node's own replacement is its original text.
                Part::Copy(node) if !self.active.contains(&node) => {
                    let own = indentation_at(self.source, self.ast.range(node).start).to_string();
                    dedent(&self.render_in_place(node)?, &own)
                }
                Part::Copy(node) | Part::Move(node) => {
                    let own = indentation_at(self.source, self.ast.range(node).start).to_string();
                    dedent(&self.render_original(node)?, &own)
                }
                Part::Node(nested) => self.render_synthetic(nested)?,
            };
            let column = current_line_indent(&out);
            out.push_str(&indent_tail(&text, &column));
        }
        Ok(out)
    }
}

/// Leading whitespace of the last line of `text`.
fn current_line_indent(text: &str) -> String {
    let line = text.rsplit('\n').next().unwrap_or("");
    line.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
}

fn is_comma_separated(ast: &Ast, parent: NodeId, slot: Slot) -> bool {
    slot.is_comma_list() || (slot == Slot::Members && ast.kind(parent) == NodeKind::Object)
}

#[cfg(test)]
mod tests {
    use crate::ast::{CompilationUnit, NodeKind, Slot};
    use crate::config::RefactorConfig;
    use crate::rewrite::{AstRewrite, Part};
    use pretty_assertions::assert_eq;

    fn run(unit: &CompilationUnit, rewrite: &AstRewrite) -> String {
        rewrite
            .rewrite_source(&unit.ast, &unit.source, &RefactorConfig::default())
            .unwrap()
    }

    #[test]
    fn test_insert_statement_before_anchor() {
        let src = "function f() {\n    g();\n}\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let call = unit.find(NodeKind::ExprStmt, "g();").unwrap();
        let mut rewrite = AstRewrite::new();
        let decl = rewrite.create_string_placeholder("let x = 1;", NodeKind::VarDecl);
        rewrite.insert_before(&unit.ast, call, decl, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "function f() {\n    let x = 1;\n    g();\n}\n");
    }

    #[test]
    fn test_insert_multiline_member_is_reindented() {
        let src = "class A {\n    m() {\n        return 1;\n    }\n}\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let method = unit.find(NodeKind::MethodDecl, "m() {\n        return 1;\n    }").unwrap();
        let mut rewrite = AstRewrite::new();
        let added = rewrite.create_string_placeholder("n() {\n    return 2;\n}", NodeKind::MethodDecl);
        rewrite.insert_after(&unit.ast, method, added, None).unwrap();
        assert_eq!(
            run(&unit, &rewrite),
            "class A {\n    m() {\n        return 1;\n    }\n\n    n() {\n        return 2;\n    }\n}\n"
        );
    }

    #[test]
    fn test_remove_middle_statement() {
        let src = "a();\nb();\nc();\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let b = unit.find(NodeKind::ExprStmt, "b();").unwrap();
        let mut rewrite = AstRewrite::new();
        rewrite.remove(&unit.ast, b, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "a();\nc();\n");
    }

    #[test]
    fn test_comma_list_insert_and_remove() {
        let unit = CompilationUnit::parse("t.js", "f(a, b);\ng();\n").unwrap();
        let a = unit.find(NodeKind::Name, "a").unwrap();
        let g_call = unit.find(NodeKind::Call, "g()").unwrap();
        let f_call = unit.find(NodeKind::Call, "f(a, b)").unwrap();
        let mut rewrite = AstRewrite::new();
        rewrite.remove(&unit.ast, a, None).unwrap();
        let c = rewrite.create_string_placeholder("c", NodeKind::Name);
        rewrite.list(&unit.ast, f_call, Slot::Arguments).insert_last(c, None);
        let one = rewrite.create_string_placeholder("1", NodeKind::Literal);
        rewrite.list(&unit.ast, g_call, Slot::Arguments).insert_last(one, None);
        assert_eq!(run(&unit, &rewrite), "f(b, c);\ng(1);\n");
    }

    #[test]
    fn test_moved_block_is_reindented_inside_new_body() {
        let src = "function f() {\n    if (x) {\n        g();\n    }\n}\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let stmt = unit.find(NodeKind::If, "if (x) {\n        g();\n    }").unwrap();
        let func = unit.find(NodeKind::FunctionDecl, src.trim_end()).unwrap();
        let mut rewrite = AstRewrite::new();
        let moved = rewrite.create_move_target(&unit.ast, stmt).unwrap();
        let call = rewrite.create_string_placeholder("h(x);", NodeKind::ExprStmt);
        rewrite.replace(&unit.ast, stmt, call, None).unwrap();
        let method = rewrite.compose(
            vec!["function h(x) {\n    ".into(), Part::Node(moved), "\n}".into()],
            NodeKind::FunctionDecl,
        );
        rewrite.insert_after(&unit.ast, func, method, None).unwrap();
        assert_eq!(
            run(&unit, &rewrite),
            "function f() {\n    h(x);\n}\n\nfunction h(x) {\n    if (x) {\n        g();\n    }\n}\n"
        );
    }

    #[test]
    fn test_literal_text_is_not_reindented() {
        let src = "function f() {\n    b();\n}\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let stmt = unit.find(NodeKind::ExprStmt, "b();").unwrap();
        let mut rewrite = AstRewrite::new();
        let one = rewrite.create_string_placeholder("1", NodeKind::Literal);
        let call = rewrite.compose(
            vec!["log(\n    ".into(), Part::Node(one), ",\n    2);".into()],
            NodeKind::ExprStmt,
        );
        rewrite.replace(&unit.ast, stmt, call, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "function f() {\n    log(\n        1,\n        2);\n}\n");
    }

    #[test]
    fn test_copy_of_replaced_node_shows_replacement() {
        let unit = CompilationUnit::parse("t.js", "f(a);\n").unwrap();
        let stmt = unit.find(NodeKind::ExprStmt, "f(a);").unwrap();
        let a = unit.find(NodeKind::Name, "a").unwrap();
        let mut rewrite = AstRewrite::new();
        let b = rewrite.create_string_placeholder("b", NodeKind::Name);
        rewrite.replace(&unit.ast, a, b, None).unwrap();
        let copy = rewrite.create_copy_target(&unit.ast, a);
        let log = rewrite.compose(vec!["log(".into(), copy.into(), ");".into()], NodeKind::ExprStmt);
        rewrite.insert_after(&unit.ast, stmt, log, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "f(b);\nlog(b);\n");
    }

    #[test]
    fn test_remove_optional_else() {
        let unit = CompilationUnit::parse("t.js", "if (a) { b(); } else { c(); }").unwrap();
        let stmt = unit.find(NodeKind::If, unit.source.as_str()).unwrap();
        let otherwise = unit.ast.child(stmt, Slot::Else).unwrap();
        let mut rewrite = AstRewrite::new();
        rewrite.remove(&unit.ast, otherwise, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "if (a) { b(); }");
    }

    #[test]
    fn test_fill_empty_block() {
        let unit = CompilationUnit::parse("t.js", "function f() {}").unwrap();
        let func = unit.find(NodeKind::FunctionDecl, "function f() {}").unwrap();
        let body = unit.ast.child(func, Slot::Body).unwrap();
        let mut rewrite = AstRewrite::new();
        let stmt = rewrite.create_string_placeholder("g();", NodeKind::ExprStmt);
        rewrite.list(&unit.ast, body, Slot::Statements).insert_last(stmt, None);
        assert_eq!(run(&unit, &rewrite), "function f() {\n    g();\n}");
    }
}
