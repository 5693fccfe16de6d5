use super::dom::{char_len, splice_chars, Boundary, Document, DomRange, EventKind, NodeId};
use crate::error::ReplaceError;
use crate::storage::Snippet;

pub const INSERT_TEXT: &str = "insertText";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPath {
    /// The host's editing command did the work and notified on its own.
    Command,
    ManualSplice,
    Rewrite,
    ValueSplice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replacement {
    pub caret: usize,
    pub path: EditPath,
}

/// Text inserted for a chosen snippet: its content, else a markdown link
/// when a source URL is known, else its title.
pub fn insertion_text(snippet: &Snippet) -> String {
    if !snippet.content.is_empty() {
        return snippet.content.clone();
    }
    match snippet.source_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            let label = if snippet.title.is_empty() { "link" } else { &snippet.title };
            format!("[{label}]({url})")
        }
        None => snippet.title.clone(),
    }
}

/// Fires the notifications reactive host frameworks listen for.
pub fn dispatch_synthetic_input(doc: &mut Document, element: NodeId, text: &str, value_based: bool) {
    doc.dispatch_event(
        element,
        EventKind::Input {
            data: text.to_string(),
            input_type: INSERT_TEXT.to_string(),
        },
        true,
    );
    if value_based {
        doc.dispatch_event(element, EventKind::Change, true);
    }
}

fn check_bounds(start: usize, end: usize, len: usize) -> Result<(), ReplaceError> {
    if start > end || end > len {
        return Err(ReplaceError::OutOfBounds { start, end, len });
    }
    Ok(())
}

pub fn value_caret(doc: &Document, element: NodeId) -> Option<usize> {
    doc.selection_range(element).map(|(start, _)| start)
}

pub fn set_value_caret(doc: &mut Document, element: NodeId, offset: usize) -> usize {
    let len = doc.value(element).map(char_len).unwrap_or(0);
    let offset = offset.min(len);
    doc.set_selection_range(element, offset, offset);
    doc.focus(element);
    offset
}

pub fn replace_value(
    doc: &mut Document,
    element: NodeId,
    start: usize,
    end: usize,
    text: &str,
) -> Result<Replacement, ReplaceError> {
    if !doc.is_connected(element) {
        return Err(ReplaceError::Detached);
    }
    let current = doc.value(element).unwrap_or_default().to_string();
    check_bounds(start, end, char_len(&current))?;

    doc.set_value(element, &splice_chars(&current, start, end, text));
    let caret = set_value_caret(doc, element, start + char_len(text));
    dispatch_synthetic_input(doc, element, text, true);

    Ok(Replacement {
        caret,
        path: EditPath::ValueSplice,
    })
}

/// Caret as a character offset into the element's text, `None` when the
/// selection is elsewhere.
pub fn rich_caret(doc: &Document, element: NodeId) -> Option<usize> {
    let range = doc.selection()?;
    if !doc.contains(element, range.start.node) {
        return None;
    }
    doc.offset_within(element, range.start)
}

pub fn set_rich_caret(doc: &mut Document, element: NodeId, position: usize) -> usize {
    let target = position.min(char_len(&doc.text_content(element)));

    let mut count = 0;
    let mut found = None;
    for node in doc.text_nodes(element) {
        let next = count + char_len(doc.text_data(node).unwrap_or_default());
        if target >= count && target <= next {
            found = Some(Boundary {
                node,
                offset: target - count,
            });
            break;
        }
        count = next;
    }

    let at = found.unwrap_or(Boundary {
        node: element,
        offset: doc.children(element).len(),
    });
    doc.set_selection(DomRange::collapsed(at));
    doc.focus(element);
    target
}

/// Replaces `[start, end)` of a content-editable element.
pub fn replace_rich(
    doc: &mut Document,
    element: NodeId,
    start: usize,
    end: usize,
    text: &str,
) -> Result<Replacement, ReplaceError> {
    if !doc.is_connected(element) {
        return Err(ReplaceError::Detached);
    }
    let current = doc.text_content(element);
    check_bounds(start, end, char_len(&current))?;
    let caret = start + char_len(text);

    let resolved = doc
        .boundary_at(element, start)
        .zip(doc.boundary_at(element, end))
        .filter(|(s, _)| doc.parent(s.node).is_some());

    let path = match resolved {
        Some((from, to)) => {
            doc.set_selection(DomRange { start: from, end: to });
            if doc.exec_insert_text(text) {
                EditPath::Command
            } else {
                log::debug!("Insert command rejected, splicing by hand");
                doc.delete_text(element, start, end);
                let node = doc
                    .insert_text_node(from, text)
                    .ok_or(ReplaceError::Unresolved(start))?;
                doc.set_selection(DomRange::collapsed(Boundary {
                    node,
                    offset: char_len(text),
                }));
                dispatch_synthetic_input(doc, element, text, false);
                EditPath::ManualSplice
            }
        }
        None => {
            log::debug!("Range for [{}, {}) unresolved, rewriting text", start, end);
            doc.set_text_content(element, &splice_chars(&current, start, end, text));
            dispatch_synthetic_input(doc, element, text, false);
            EditPath::Rewrite
        }
    };

    let caret = set_rich_caret(doc, element, caret);
    Ok(Replacement { caret, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dom::EditCommandSupport;

    fn field(value: &str, caret: usize) -> (Document, NodeId) {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.append_child(doc.root(), input);
        doc.set_value(input, value);
        doc.set_selection_range(input, caret, caret);
        (doc, input)
    }

    fn rich(parts: &[&str]) -> (Document, NodeId) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "contenteditable", "true");
        doc.append_child(doc.root(), div);
        for part in parts {
            let span = doc.create_element("span");
            let text = doc.create_text(part);
            doc.append_child(span, text);
            doc.append_child(div, span);
        }
        (doc, div)
    }

    quickcheck::quickcheck! {
        fn value_splice_round_trip(text: String, insert: String, a: usize, b: usize) -> bool {
            let len = char_len(&text);
            let (start, end) = if len == 0 { (0, 0) } else { let (x, y) = (a % (len + 1), b % (len + 1)); (x.min(y), x.max(y)) };
            let (mut doc, input) = field(&text, end);
            let result = replace_value(&mut doc, input, start, end, &insert).unwrap();

            let expected = format!(
                "{}{}{}",
                text.chars().take(start).collect::<String>(),
                insert,
                text.chars().skip(end).collect::<String>()
            );
            doc.value(input) == Some(expected.as_str())
                && result.caret == start + char_len(&insert)
                && value_caret(&doc, input) == Some(result.caret)
        }
    }

    #[test]
    fn insertion_text_fallbacks() {
        let mut snippet = Snippet {
            title: "Docs".into(),
            content: "body".into(),
            source_url: Some("https://docs.rs".into()),
            ..Default::default()
        };
        assert_eq!(insertion_text(&snippet), "body");

        snippet.content.clear();
        assert_eq!(insertion_text(&snippet), "[Docs](https://docs.rs)");

        snippet.title.clear();
        assert_eq!(insertion_text(&snippet), "[link](https://docs.rs)");

        snippet.source_url = None;
        snippet.title = "Only title".into();
        assert_eq!(insertion_text(&snippet), "Only title");
    }

    #[test]
    fn value_replacement_notifies_input_and_change() {
        let (mut doc, input) = field("//rep", 5);
        let result = replace_value(&mut doc, input, 0, 5, "Report Q1").unwrap();

        assert_eq!(doc.value(input), Some("Report Q1"));
        assert_eq!(result.caret, 9);
        let kinds: Vec<_> = doc.events().iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Input {
                    data: "Report Q1".into(),
                    input_type: INSERT_TEXT.into()
                },
                EventKind::Change
            ]
        );
    }

    #[test]
    fn rich_command_path_keeps_markup() {
        let (mut doc, div) = rich(&["hi //", "re", "p!"]);
        let result = replace_rich(&mut doc, div, 3, 8, "Report").unwrap();

        assert_eq!(result.path, EditPath::Command);
        assert_eq!(doc.text_content(div), "hi Report!");
        assert_eq!(rich_caret(&doc, div), Some(9));
        assert_eq!(doc.events().len(), 1);
        assert!(!doc.events()[0].synthetic);
    }

    #[test]
    fn rich_manual_path_synthesizes_one_input() {
        let (mut doc, div) = rich(&["hi //", "re", "p!"]);
        doc.edit_command = EditCommandSupport::Unsupported;
        let result = replace_rich(&mut doc, div, 3, 8, "Report").unwrap();

        assert_eq!(result.path, EditPath::ManualSplice);
        assert_eq!(doc.text_content(div), "hi Report!");
        assert_eq!(result.caret, 9);
        assert_eq!(rich_caret(&doc, div), Some(9));
        assert_eq!(doc.events().len(), 1);
        assert!(doc.events()[0].synthetic);
        assert!(matches!(doc.events()[0].kind, EventKind::Input { .. }));
    }

    #[test]
    fn rich_rewrite_when_no_text_nodes() {
        let (mut doc, div) = rich(&[]);
        let result = replace_rich(&mut doc, div, 0, 0, "fresh").unwrap();
        assert_eq!(result.path, EditPath::Rewrite);
        assert_eq!(doc.text_content(div), "fresh");
        assert_eq!(result.caret, 5);
    }

    #[test]
    fn out_of_bounds_leaves_content_untouched() {
        let (mut doc, div) = rich(&["abc"]);
        let err = replace_rich(&mut doc, div, 2, 9, "x").unwrap_err();
        assert_eq!(err, ReplaceError::OutOfBounds { start: 2, end: 9, len: 3 });
        assert_eq!(doc.text_content(div), "abc");
        assert!(doc.events().is_empty());
    }

    #[test]
    fn detached_elements_are_refused() {
        let (mut doc, input) = field("//x", 3);
        doc.remove(input);
        assert_eq!(replace_value(&mut doc, input, 0, 3, "y"), Err(ReplaceError::Detached));
        assert_eq!(doc.value(input), Some("//x"));
    }

    #[test]
    fn caret_outside_element_is_unknown() {
        let (mut doc, div) = rich(&["abc"]);
        let other = doc.create_element("p");
        let text = doc.create_text("elsewhere");
        doc.append_child(other, text);
        doc.append_child(doc.root(), other);
        doc.set_selection(DomRange::collapsed(Boundary { node: text, offset: 2 }));
        assert_eq!(rich_caret(&doc, div), None);

        assert_eq!(set_rich_caret(&mut doc, div, 99), 3);
        assert_eq!(rich_caret(&doc, div), Some(3));
    }
}
