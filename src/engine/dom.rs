//! Nodes live in an arena and are addressed by [`NodeId`]. Removing a node
//! only detaches it, so stale ids stay valid but report
//! [`Document::is_connected`] as false. All text offsets are counted in
//! characters.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn left(&self) -> f32 {
        self.x
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditCommandSupport {
    #[default]
    Native,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Input { data: String, input_type: String },
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub target: NodeId,
    pub kind: EventKind,
    pub synthetic: bool,
}

#[derive(Debug, Clone, Default)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    value: String,
    selection: (usize, usize),
    shadow_root: Option<NodeId>,
    rect: Rect,
}

#[derive(Debug, Clone)]
enum NodeData {
    Root,
    Element(ElementData),
    Text(String),
    ShadowRoot { host: NodeId },
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    /// Characters for text nodes, child index otherwise.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl DomRange {
    pub fn collapsed(at: Boundary) -> Self {
        Self { start: at, end: at }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    focused: Option<NodeId>,
    selection: Option<DomRange>,
    pub viewport: Viewport,
    pub edit_command: EditCommandSupport,
    events: Vec<DispatchedEvent>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            focused: None,
            selection: None,
            viewport: Viewport::default(),
            edit_command: EditCommandSupport::default(),
            events: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }))
    }

    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.push(NodeData::Text(data.to_string()))
    }

    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.shadow_root(host) {
            return existing;
        }
        let shadow = self.push(NodeData::ShadowRoot { host });
        if let Some(e) = self.element_mut(host) {
            e.shadow_root = Some(shadow);
        }
        shadow
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.element(host).and_then(|e| e.shadow_root)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.node(parent).children.len();
        self.insert_child(parent, index, child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.remove(child);
        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
    }

    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.node_mut(node).parent.take() {
            self.node_mut(parent).children.retain(|c| *c != node);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|p| self.is_element(*p))
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.node(node).data, NodeData::Element(_))
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.node(node).data, NodeData::Text(_))
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(e) = self.element_mut(node) {
            match e.attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => e.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// True when `node` can be reached from the document root, crossing
    /// shadow roots through their hosts.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match (self.node(current).parent, &self.node(current).data) {
                (Some(parent), _) => current = parent,
                (None, NodeData::ShadowRoot { host }) => current = *host,
                (None, _) => return false,
            }
        }
    }

    /// Inclusive ancestor check inside one tree (shadow roots not crossed).
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    pub fn containing_shadow_root(&self, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        match self.node(current).data {
            NodeData::ShadowRoot { .. } => Some(current),
            _ => None,
        }
    }

    pub fn shadow_host(&self, shadow_root: NodeId) -> Option<NodeId> {
        match self.node(shadow_root).data {
            NodeData::ShadowRoot { host } => Some(host),
            _ => None,
        }
    }

    pub fn is_content_editable(&self, node: NodeId) -> bool {
        let mut current = if self.is_element(node) {
            Some(node)
        } else {
            self.parent_element(node)
        };
        while let Some(n) = current {
            match self.attribute(n, "contenteditable") {
                Some("false") => return false,
                Some("" | "true" | "plaintext-only") => return true,
                _ => current = self.parent_element(n),
            }
        }
        false
    }

    /// Outermost content-editable element enclosing `node`.
    pub fn editing_host(&self, node: NodeId) -> Option<NodeId> {
        let mut host = if self.is_element(node) {
            node
        } else {
            self.parent_element(node)?
        };
        if !self.is_content_editable(host) {
            return None;
        }
        while let Some(parent) = self.parent_element(host) {
            if !self.is_content_editable(parent) {
                break;
            }
            host = parent;
        }
        Some(host)
    }

    pub fn closest(&self, node: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        let mut current = if self.is_element(node) {
            Some(node)
        } else {
            self.parent_element(node)
        };
        while let Some(n) = current {
            if pred(self, n) {
                return Some(n);
            }
            current = self.parent_element(n);
        }
        None
    }

    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    pub fn text_nodes(&self, node: NodeId) -> Vec<NodeId> {
        if self.is_text(node) {
            return vec![node];
        }
        self.descendants(node)
            .into_iter()
            .filter(|n| self.is_text(*n))
            .collect()
    }

    pub fn text_data(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).data {
            NodeData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn set_text_data(&mut self, node: NodeId, data: String) {
        if let NodeData::Text(s) = &mut self.node_mut(node).data {
            *s = data;
        }
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.text_nodes(node)
            .into_iter()
            .filter_map(|n| self.text_data(n))
            .collect()
    }

    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> NodeId {
        for child in self.children(node).to_vec() {
            self.remove(child);
        }
        let text_node = self.create_text(text);
        self.append_child(node, text_node);
        text_node
    }

    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.value.as_str())
    }

    /// Programmatic value change: fires no events, clamps the selection.
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(e) = self.element_mut(node) {
            e.value = value.to_string();
            let len = char_len(&e.value);
            e.selection = (e.selection.0.min(len), e.selection.1.min(len));
        }
    }

    pub fn selection_range(&self, node: NodeId) -> Option<(usize, usize)> {
        self.element(node).map(|e| e.selection)
    }

    pub fn set_selection_range(&mut self, node: NodeId, start: usize, end: usize) {
        if let Some(e) = self.element_mut(node) {
            let len = char_len(&e.value);
            let start = start.min(len);
            e.selection = (start, end.clamp(start, len));
        }
    }

    pub fn rect(&self, node: NodeId) -> Rect {
        self.element(node).map(|e| e.rect).unwrap_or_default()
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(e) = self.element_mut(node) {
            e.rect = rect;
        }
    }

    pub fn focus(&mut self, node: NodeId) {
        self.focused = Some(node);
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn selection(&self) -> Option<DomRange> {
        self.selection
    }

    pub fn set_selection(&mut self, range: DomRange) {
        self.selection = Some(range);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn offset_within(&self, root: NodeId, boundary: Boundary) -> Option<usize> {
        if !self.contains(root, boundary.node) {
            return None;
        }
        let mut acc = 0;
        self.walk_to(root, boundary, &mut acc).then_some(acc)
    }

    fn walk_to(&self, node: NodeId, target: Boundary, acc: &mut usize) -> bool {
        if node == target.node {
            match self.text_data(node) {
                Some(text) => *acc += target.offset.min(char_len(text)),
                None => {
                    for child in self.children(node).iter().take(target.offset) {
                        *acc += char_len(&self.text_content(*child));
                    }
                }
            }
            return true;
        }
        if let Some(text) = self.text_data(node) {
            *acc += char_len(text);
            return false;
        }
        self.children(node)
            .iter()
            .any(|child| self.walk_to(*child, target, acc))
    }

    /// Resolves a flattened character offset to a text position, landing at
    /// the end of the last text node when `offset` runs past the text.
    pub fn boundary_at(&self, root: NodeId, offset: usize) -> Option<Boundary> {
        let mut acc = 0;
        let mut last = None;
        for node in self.text_nodes(root) {
            let len = char_len(self.text_data(node).unwrap_or_default());
            if acc + len >= offset {
                return Some(Boundary {
                    node,
                    offset: offset - acc,
                });
            }
            acc += len;
            last = Some(Boundary { node, offset: len });
        }
        last
    }

    pub fn delete_text(&mut self, root: NodeId, start: usize, end: usize) {
        let mut acc = 0;
        for node in self.text_nodes(root) {
            let data = self.text_data(node).unwrap_or_default().to_string();
            let len = char_len(&data);
            let lo = start.max(acc);
            let hi = end.min(acc + len);
            if lo < hi {
                self.set_text_data(node, splice_chars(&data, lo - acc, hi - acc, ""));
            }
            acc += len;
        }
    }

    pub fn insert_text_node(&mut self, at: Boundary, text: &str) -> Option<NodeId> {
        let new_node = self.create_text(text);
        match self.text_data(at.node).map(str::to_string) {
            Some(data) => {
                let parent = self.parent(at.node)?;
                let split = at.offset.min(char_len(&data));
                let index = self.children(parent).iter().position(|c| *c == at.node)?;
                let tail = char_slice(&data, split, char_len(&data));
                self.set_text_data(at.node, char_slice(&data, 0, split));
                self.insert_child(parent, index + 1, new_node);
                if !tail.is_empty() {
                    let tail_node = self.create_text(&tail);
                    self.insert_child(parent, index + 2, tail_node);
                }
            }
            None => self.insert_child(at.node, at.offset, new_node),
        }
        Some(new_node)
    }

    /// The host's "insert text" command: replaces the selection inside the
    /// focused editing host and fires a native input notification.
    pub fn exec_insert_text(&mut self, text: &str) -> bool {
        if self.edit_command == EditCommandSupport::Unsupported {
            return false;
        }
        let Some(range) = self.selection else {
            return false;
        };
        let Some(host) = self.editing_host(range.start.node) else {
            return false;
        };
        let (Some(a), Some(b)) = (
            self.offset_within(host, range.start),
            self.offset_within(host, range.end),
        ) else {
            return false;
        };
        let (start, end) = (a.min(b), a.max(b));

        self.delete_text(host, start, end);
        let caret = match self.boundary_at(host, start) {
            Some(at) if self.is_text(at.node) => {
                let data = self.text_data(at.node).unwrap_or_default().to_string();
                self.set_text_data(at.node, splice_chars(&data, at.offset, at.offset, text));
                Boundary {
                    node: at.node,
                    offset: at.offset + char_len(text),
                }
            }
            _ => {
                let node = self.create_text(text);
                self.append_child(host, node);
                Boundary {
                    node,
                    offset: char_len(text),
                }
            }
        };
        self.selection = Some(DomRange::collapsed(caret));
        self.dispatch_event(
            host,
            EventKind::Input {
                data: text.to_string(),
                input_type: "insertText".to_string(),
            },
            false,
        );
        true
    }

    pub fn dispatch_event(&mut self, target: NodeId, kind: EventKind, synthetic: bool) {
        self.events.push(DispatchedEvent {
            target,
            kind,
            synthetic,
        });
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DispatchedEvent> {
        std::mem::take(&mut self.events)
    }
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn char_slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// `s[..start] + insert + s[end..]`, indices in characters.
pub fn splice_chars(s: &str, start: usize, end: usize, insert: &str) -> String {
    let mut out: String = s.chars().take(start).collect();
    out.push_str(insert);
    out.extend(s.chars().skip(end));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `<div contenteditable><b>ab</b>cd<i>ef</i></div>`
    fn rich() -> (Document, NodeId, [NodeId; 3]) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "contenteditable", "true");
        let b = doc.create_element("b");
        let ab = doc.create_text("ab");
        let cd = doc.create_text("cd");
        let i = doc.create_element("i");
        let ef = doc.create_text("ef");
        doc.append_child(doc.root(), div);
        doc.append_child(div, b);
        doc.append_child(b, ab);
        doc.append_child(div, cd);
        doc.append_child(div, i);
        doc.append_child(i, ef);
        (doc, div, [ab, cd, ef])
    }

    #[test]
    fn flattened_offsets() {
        let (doc, div, [ab, cd, ef]) = rich();
        assert_eq!(doc.text_content(div), "abcdef");
        assert_eq!(doc.offset_within(div, Boundary { node: cd, offset: 1 }), Some(3));
        assert_eq!(doc.offset_within(div, Boundary { node: div, offset: 2 }), Some(4));
        assert_eq!(doc.boundary_at(div, 2), Some(Boundary { node: ab, offset: 2 }));
        assert_eq!(doc.boundary_at(div, 5), Some(Boundary { node: ef, offset: 1 }));
        assert_eq!(doc.boundary_at(div, 99), Some(Boundary { node: ef, offset: 2 }));
    }

    #[test]
    fn delete_across_nodes() {
        let (mut doc, div, _) = rich();
        doc.delete_text(div, 1, 5);
        assert_eq!(doc.text_content(div), "af");
    }

    #[test]
    fn insert_splits_text_node() {
        let (mut doc, div, [_, cd, _]) = rich();
        let node = doc.insert_text_node(Boundary { node: cd, offset: 1 }, "XY").unwrap();
        assert_eq!(doc.text_content(div), "abcXYdef");
        assert_eq!(doc.offset_within(div, Boundary { node, offset: 2 }), Some(5));
    }

    #[test]
    fn editability_inherits_and_stops() {
        let (mut doc, div, [ab, ..]) = rich();
        let wrapper = doc.create_element("section");
        doc.set_attribute(wrapper, "contenteditable", "");
        doc.append_child(doc.root(), wrapper);
        doc.append_child(wrapper, div);
        assert!(doc.is_content_editable(ab));
        assert_eq!(doc.editing_host(ab), Some(wrapper));

        let off = doc.create_element("span");
        doc.set_attribute(off, "contenteditable", "false");
        doc.append_child(div, off);
        assert!(!doc.is_content_editable(off));
    }

    #[test]
    fn shadow_nodes_connect_through_host() {
        let mut doc = Document::new();
        let host = doc.create_element("deepl-input-controller");
        let shadow = doc.attach_shadow(host);
        let area = doc.create_element("textarea");
        doc.append_child(shadow, area);
        assert!(!doc.is_connected(area));

        doc.append_child(doc.root(), host);
        assert!(doc.is_connected(area));
        assert_eq!(doc.containing_shadow_root(area), Some(shadow));

        doc.remove(host);
        assert!(!doc.is_connected(area));
    }

    #[test]
    fn insert_text_command_replaces_selection() {
        let (mut doc, div, [ab, _, ef]) = rich();
        doc.set_selection(DomRange {
            start: Boundary { node: ab, offset: 1 },
            end: Boundary { node: ef, offset: 1 },
        });
        assert!(doc.exec_insert_text("Z"));
        assert_eq!(doc.text_content(div), "aZf");
        let caret = doc.selection().unwrap().start;
        assert_eq!(doc.offset_within(div, caret), Some(2));
        assert_eq!(doc.events().len(), 1);
        assert!(!doc.events()[0].synthetic);

        doc.edit_command = EditCommandSupport::Unsupported;
        assert!(!doc.exec_insert_text("Q"));
    }

    #[test]
    fn splice_counts_characters() {
        assert_eq!(splice_chars("héllo", 1, 3, "EY"), "hEYlo");
        assert_eq!(char_slice("日本語テキスト", 2, 4), "語テ");
    }
}
