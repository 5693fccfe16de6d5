use super::dom::{char_len, Document, NodeId};
use super::editor::{self, Replacement};
use crate::error::ReplaceError;

const SUPPORTED_INPUT_TYPES: &[&str] = &["text", "search", "url", "email", "tel", "password"];

pub trait EditableSurface {
    fn element(&self) -> NodeId;

    fn is_connected(&self, doc: &Document) -> bool {
        doc.is_connected(self.element())
    }

    fn text(&self, doc: &Document) -> String;

    fn caret(&self, doc: &Document) -> Option<usize>;

    fn set_caret(&self, doc: &mut Document, offset: usize) -> usize;

    fn replace_range(
        &self,
        doc: &mut Document,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<Replacement, ReplaceError>;

    fn insert_at_caret(&self, doc: &mut Document, text: &str) -> Result<Replacement, ReplaceError>;

    /// Content-editable surfaces need their caret restored after host
    /// re-renders.
    fn is_rich(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainField {
    pub element: NodeId,
}

impl EditableSurface for PlainField {
    fn element(&self) -> NodeId {
        self.element
    }

    fn text(&self, doc: &Document) -> String {
        doc.value(self.element).unwrap_or_default().to_string()
    }

    fn caret(&self, doc: &Document) -> Option<usize> {
        editor::value_caret(doc, self.element)
    }

    fn set_caret(&self, doc: &mut Document, offset: usize) -> usize {
        editor::set_value_caret(doc, self.element, offset)
    }

    fn replace_range(
        &self,
        doc: &mut Document,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<Replacement, ReplaceError> {
        editor::replace_value(doc, self.element, start, end, text)
    }

    fn insert_at_caret(&self, doc: &mut Document, text: &str) -> Result<Replacement, ReplaceError> {
        let len = char_len(&self.text(doc));
        let (start, end) = doc.selection_range(self.element).unwrap_or((len, len));
        self.replace_range(doc, start, end, text)
    }

    fn is_rich(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentEditable {
    pub element: NodeId,
}

impl EditableSurface for ContentEditable {
    fn element(&self) -> NodeId {
        self.element
    }

    fn text(&self, doc: &Document) -> String {
        doc.text_content(self.element)
    }

    fn caret(&self, doc: &Document) -> Option<usize> {
        editor::rich_caret(doc, self.element)
    }

    fn set_caret(&self, doc: &mut Document, offset: usize) -> usize {
        editor::set_rich_caret(doc, self.element, offset)
    }

    fn replace_range(
        &self,
        doc: &mut Document,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<Replacement, ReplaceError> {
        editor::replace_rich(doc, self.element, start, end, text)
    }

    fn insert_at_caret(&self, doc: &mut Document, text: &str) -> Result<Replacement, ReplaceError> {
        let len = char_len(&self.text(doc));
        let (start, end) = doc
            .selection()
            .filter(|range| doc.contains(self.element, range.start.node) && doc.contains(self.element, range.end.node))
            .and_then(|range| {
                let a = doc.offset_within(self.element, range.start)?;
                let b = doc.offset_within(self.element, range.end)?;
                Some((a.min(b), a.max(b)))
            })
            .unwrap_or((len, len));
        self.replace_range(doc, start, end, text)
    }

    fn is_rich(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostedEditor {
    Field(PlainField),
    Rich(ContentEditable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowHostedEditor {
    pub host: NodeId,
    inner: HostedEditor,
}

impl ShadowHostedEditor {
    fn inner(&self) -> &dyn EditableSurface {
        match &self.inner {
            HostedEditor::Field(field) => field,
            HostedEditor::Rich(rich) => rich,
        }
    }
}

impl EditableSurface for ShadowHostedEditor {
    fn element(&self) -> NodeId {
        self.inner().element()
    }

    fn is_connected(&self, doc: &Document) -> bool {
        doc.is_connected(self.host) && doc.is_connected(self.element())
    }

    fn text(&self, doc: &Document) -> String {
        self.inner().text(doc)
    }

    fn caret(&self, doc: &Document) -> Option<usize> {
        self.inner().caret(doc)
    }

    fn set_caret(&self, doc: &mut Document, offset: usize) -> usize {
        self.inner().set_caret(doc, offset)
    }

    fn replace_range(
        &self,
        doc: &mut Document,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<Replacement, ReplaceError> {
        self.inner().replace_range(doc, start, end, text)
    }

    fn insert_at_caret(&self, doc: &mut Document, text: &str) -> Result<Replacement, ReplaceError> {
        self.inner().insert_at_caret(doc, text)
    }

    fn is_rich(&self) -> bool {
        self.inner().is_rich()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    PlainField(PlainField),
    ContentEditable(ContentEditable),
    ShadowHostedEditor(ShadowHostedEditor),
}

impl Surface {
    fn as_surface(&self) -> &dyn EditableSurface {
        match self {
            Surface::PlainField(s) => s,
            Surface::ContentEditable(s) => s,
            Surface::ShadowHostedEditor(s) => s,
        }
    }
}

impl EditableSurface for Surface {
    fn element(&self) -> NodeId {
        self.as_surface().element()
    }

    fn is_connected(&self, doc: &Document) -> bool {
        self.as_surface().is_connected(doc)
    }

    fn text(&self, doc: &Document) -> String {
        self.as_surface().text(doc)
    }

    fn caret(&self, doc: &Document) -> Option<usize> {
        self.as_surface().caret(doc)
    }

    fn set_caret(&self, doc: &mut Document, offset: usize) -> usize {
        self.as_surface().set_caret(doc, offset)
    }

    fn replace_range(
        &self,
        doc: &mut Document,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<Replacement, ReplaceError> {
        self.as_surface().replace_range(doc, start, end, text)
    }

    fn insert_at_caret(&self, doc: &mut Document, text: &str) -> Result<Replacement, ReplaceError> {
        self.as_surface().insert_at_caret(doc, text)
    }

    fn is_rich(&self) -> bool {
        self.as_surface().is_rich()
    }
}

pub fn is_supported_field(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("textarea") => true,
        Some("input") => match doc.attribute(node, "type") {
            None => true,
            Some(kind) => SUPPORTED_INPUT_TYPES.contains(&kind.to_ascii_lowercase().as_str()),
        },
        _ => false,
    }
}

fn has_editable_attribute(doc: &Document, node: NodeId) -> bool {
    doc.attribute(node, "contenteditable").is_some_and(|v| v != "false")
}

fn classify_plain(doc: &Document, element: NodeId) -> Option<HostedEditor> {
    if let Some(field) = doc.closest(element, is_supported_field) {
        return Some(HostedEditor::Field(PlainField { element: field }));
    }

    let candidate = if doc.is_content_editable(element) {
        element
    } else {
        doc.closest(element, has_editable_attribute)?
    };
    let root = doc.editing_host(candidate).unwrap_or(candidate);
    Some(HostedEditor::Rich(ContentEditable { element: root }))
}

/// Resolves an event target (text node, form control, or any node inside a
/// content-editable region) to the surface that should be edited.
pub fn classify(doc: &Document, target: NodeId, shadow_hosts: &[String]) -> Option<Surface> {
    let element = if doc.is_element(target) {
        target
    } else {
        doc.parent_element(target)?
    };
    let inner = classify_plain(doc, element)?;

    let host = doc
        .containing_shadow_root(element)
        .and_then(|root| doc.shadow_host(root))
        .filter(|host| {
            doc.tag(*host)
                .is_some_and(|tag| shadow_hosts.iter().any(|known| known.eq_ignore_ascii_case(tag)))
        });

    Some(match (host, inner) {
        (Some(host), inner) => Surface::ShadowHostedEditor(ShadowHostedEditor { host, inner }),
        (None, HostedEditor::Field(field)) => Surface::PlainField(field),
        (None, HostedEditor::Rich(rich)) => Surface::ContentEditable(rich),
    })
}

pub fn locate_hosted_editor(doc: &Document, host: NodeId, shadow_hosts: &[String]) -> Option<Surface> {
    let tag = doc.tag(host)?;
    if !shadow_hosts.iter().any(|known| known.eq_ignore_ascii_case(tag)) {
        return None;
    }
    let root = doc.shadow_root(host)?;
    let editor = doc
        .descendants(root)
        .into_iter()
        .find(|n| doc.tag(*n) == Some("textarea") || has_editable_attribute(doc, *n))?;
    classify(doc, editor, shadow_hosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        vec!["deepl-input-controller".to_string()]
    }

    #[test]
    fn text_node_resolves_to_outermost_editable_root() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        doc.set_attribute(outer, "contenteditable", "true");
        let p = doc.create_element("p");
        let text = doc.create_text("hello");
        doc.append_child(doc.root(), outer);
        doc.append_child(outer, p);
        doc.append_child(p, text);

        assert_eq!(
            classify(&doc, text, &hosts()),
            Some(Surface::ContentEditable(ContentEditable { element: outer }))
        );
    }

    #[test]
    fn input_types_are_filtered() {
        let mut doc = Document::new();
        let search = doc.create_element("input");
        doc.set_attribute(search, "type", "Search");
        let checkbox = doc.create_element("input");
        doc.set_attribute(checkbox, "type", "checkbox");
        let bare = doc.create_element("input");
        doc.append_child(doc.root(), search);
        doc.append_child(doc.root(), checkbox);
        doc.append_child(doc.root(), bare);

        assert!(matches!(classify(&doc, search, &hosts()), Some(Surface::PlainField(_))));
        assert!(classify(&doc, checkbox, &hosts()).is_none());
        assert!(matches!(classify(&doc, bare, &hosts()), Some(Surface::PlainField(_))));
    }

    #[test]
    fn disabled_region_inside_editor_uses_nearest_marked_ancestor() {
        let mut doc = Document::new();
        let editor = doc.create_element("div");
        doc.set_attribute(editor, "contenteditable", "plaintext-only");
        let frozen = doc.create_element("span");
        doc.set_attribute(frozen, "contenteditable", "false");
        doc.append_child(doc.root(), editor);
        doc.append_child(editor, frozen);

        assert_eq!(
            classify(&doc, frozen, &hosts()),
            Some(Surface::ContentEditable(ContentEditable { element: editor }))
        );
    }

    #[test]
    fn plain_elements_are_not_surfaces() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.append_child(doc.root(), p);
        assert!(classify(&doc, p, &hosts()).is_none());
    }

    #[test]
    fn shadow_hosted_editor_is_found_and_classified() {
        let mut doc = Document::new();
        let host = doc.create_element("DEEPL-INPUT-CONTROLLER");
        doc.append_child(doc.root(), host);
        let shadow = doc.attach_shadow(host);
        let wrapper = doc.create_element("div");
        let area = doc.create_element("textarea");
        doc.append_child(shadow, wrapper);
        doc.append_child(wrapper, area);
        doc.set_value(area, "//abc");

        let surface = locate_hosted_editor(&doc, host, &hosts()).unwrap();
        assert!(matches!(surface, Surface::ShadowHostedEditor(ref s) if s.host == host));
        assert_eq!(surface.element(), area);
        assert_eq!(surface.text(&doc), "//abc");
        assert!(!surface.is_rich());

        doc.remove(host);
        assert!(!surface.is_connected(&doc));
    }

    #[test]
    fn unknown_shadow_hosts_classify_as_plain() {
        let mut doc = Document::new();
        let host = doc.create_element("my-editor");
        doc.append_child(doc.root(), host);
        let shadow = doc.attach_shadow(host);
        let rich = doc.create_element("div");
        doc.set_attribute(rich, "contenteditable", "true");
        doc.append_child(shadow, rich);

        assert!(locate_hosted_editor(&doc, host, &hosts()).is_none());
        assert_eq!(
            classify(&doc, rich, &hosts()),
            Some(Surface::ContentEditable(ContentEditable { element: rich }))
        );
    }

    #[test]
    fn insert_at_caret_replaces_selection() {
        let mut doc = Document::new();
        let area = doc.create_element("textarea");
        doc.append_child(doc.root(), area);
        doc.set_value(area, "hello world");
        doc.set_selection_range(area, 6, 11);

        let surface = classify(&doc, area, &hosts()).unwrap();
        let result = surface.insert_at_caret(&mut doc, "there").unwrap();
        assert_eq!(doc.value(area), Some("hello there"));
        assert_eq!(result.caret, 11);
    }
}
