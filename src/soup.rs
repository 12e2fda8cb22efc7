//! Minimal tag/attribute/class queries over an html5ever [`RcDom`].
use {
    html5ever::{parse_document, tendril::TendrilSink},
    markup5ever_rcdom::{Handle, NodeData, RcDom},
};

/// Parse an HTML document from a string.
pub fn parse_html_str(text: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(text)
}

#[derive(Clone, Debug)]
enum Rule {
    Tag(String),
    Attr(String, String),
    Class(String),
}

impl Rule {
    fn matches(&self, node: &Handle) -> bool {
        match self {
            Rule::Tag(name) => node.name().as_deref() == Some(name.as_str()),
            Rule::Attr(name, value) => node.get(name).as_deref() == Some(value.as_str()),
            Rule::Class(class) => {
                node.get("class").map(|classes| classes.split_ascii_whitespace().any(|c| c == class)).unwrap_or(false)
            }
        }
    }
}

/// A query over the descendants of a node; every rule must match.
#[derive(Clone, Debug)]
#[must_use = "QueryBuilder does nothing until you call find() or find_all()"]
pub struct QueryBuilder {
    root: Handle,
    rules: Vec<Rule>,
}

impl QueryBuilder {
    fn new(root: Handle) -> Self {
        Self {
            root,
            rules: vec![],
        }
    }

    /// Require the element to have the given tag name.
    pub fn tag(mut self, name: &str) -> Self {
        self.rules.push(Rule::Tag(name.to_ascii_lowercase()));
        self
    }

    /// Require the element to have the given attribute value.
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.rules.push(Rule::Attr(name.to_string(), value.to_string()));
        self
    }

    /// Require the element's `class` attribute to contain the given class.
    pub fn class(mut self, class: &str) -> Self {
        self.rules.push(Rule::Class(class.to_string()));
        self
    }

    /// Return the first matching element in document order.
    pub fn find(self) -> Option<Handle> {
        let mut found = None;
        walk(&self.root, &mut |node| {
            if self.matches(node) {
                found = Some(node.clone());
                false
            } else {
                true
            }
        });
        found
    }

    /// Return every matching element in document order.
    pub fn find_all(self) -> Vec<Handle> {
        let mut found = vec![];
        walk(&self.root, &mut |node| {
            if self.matches(node) {
                found.push(node.clone());
            }
            true
        });
        found
    }

    fn matches(&self, node: &Handle) -> bool {
        matches!(node.data, NodeData::Element { .. }) && self.rules.iter().all(|rule| rule.matches(node))
    }
}

/// Visit the descendants of `root` (not `root` itself) depth-first. Stops when `visit` returns false.
fn walk<F: FnMut(&Handle) -> bool>(root: &Handle, visit: &mut F) -> bool {
    for child in root.children.borrow().iter() {
        if !visit(child) || !walk(child, visit) {
            return false;
        }
    }
    true
}

/// Start queries from a node or document.
pub trait QueryBuilderExt {
    /// The node queries start from.
    fn query_root(&self) -> Handle;

    /// Query descendants with the given tag name.
    fn tag(&self, name: &str) -> QueryBuilder {
        QueryBuilder::new(self.query_root()).tag(name)
    }

    /// Query descendants with the given attribute value.
    fn attr(&self, name: &str, value: &str) -> QueryBuilder {
        QueryBuilder::new(self.query_root()).attr(name, value)
    }

    /// Query descendants with the given class.
    fn class(&self, class: &str) -> QueryBuilder {
        QueryBuilder::new(self.query_root()).class(class)
    }
}

impl QueryBuilderExt for Handle {
    fn query_root(&self) -> Handle {
        self.clone()
    }
}

impl QueryBuilderExt for RcDom {
    fn query_root(&self) -> Handle {
        self.document.clone()
    }
}

/// Accessors for element nodes.
pub trait NodeExt {
    /// The lower-case tag name, if this is an element.
    fn name(&self) -> Option<String>;

    /// The value of an attribute, if this is an element that has it.
    fn get(&self, attr: &str) -> Option<String>;

    /// The concatenated text of this node and all of its descendants.
    fn text(&self) -> String;

    /// [`NodeExt::text`] with runs of whitespace (including non-breaking spaces) collapsed to one space and
    /// the ends trimmed.
    fn clean_text(&self) -> String {
        collapse_whitespace(&self.text())
    }
}

impl NodeExt for Handle {
    fn name(&self) -> Option<String> {
        match &self.data {
            NodeData::Element {
                name,
                ..
            } => Some(name.local.to_string()),
            _ => None,
        }
    }

    fn get(&self, attr: &str) -> Option<String> {
        match &self.data {
            NodeData::Element {
                attrs,
                ..
            } => attrs.borrow().iter().find(|a| &*a.name.local == attr).map(|a| a.value.to_string()),
            _ => None,
        }
    }

    fn text(&self) -> String {
        let mut text = String::new();
        append_text(self, &mut text);
        text
    }
}

fn append_text(node: &Handle, text: &mut String) {
    if let NodeData::Text {
        contents,
    } = &node.data
    {
        text.push_str(&contents.borrow());
    }

    for child in node.children.borrow().iter() {
        append_text(child, text);
    }
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
