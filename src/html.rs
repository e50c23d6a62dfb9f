//! Structured HTML extraction with a regex safety net.
//!
//! Primary strategy: parse the page with html5ever into a minimal owned
//! node tree and walk it for tokens, forms and links. Fallback strategy:
//! plain regex over the raw markup. A parse failure never escapes this
//! module; callers get `None` and fall through to the regex layer.

use std::collections::HashMap;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use once_cell::sync::Lazy;
use regex::Regex;

/// A parsed HTML node. Only what the extraction passes need.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element {
        tag: String,
        attrs: HashMap<String, String>,
        children: Vec<DomNode>,
    },
    Text(String),
}

impl DomNode {
    /// Tag name for element nodes.
    pub fn tag(&self) -> Option<&str> {
        match self {
            DomNode::Element { tag, .. } => Some(tag.as_str()),
            DomNode::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            DomNode::Element { attrs, .. } => attrs.get(name).map(|s| s.as_str()),
            DomNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[DomNode] {
        match self {
            DomNode::Element { children, .. } => children,
            DomNode::Text(_) => &[],
        }
    }

    /// Visible text of this node and its descendants, whitespace-collapsed.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            DomNode::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    out.push_str(trimmed);
                }
            }
            DomNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Depth-first visit of every element node.
    pub fn visit_elements<'a>(&'a self, f: &mut dyn FnMut(&'a DomNode)) {
        if matches!(self, DomNode::Element { .. }) {
            f(self);
        }
        for child in self.children() {
            child.visit_elements(f);
        }
    }
}

/// Parse an HTML string into a node tree. `None` on parse failure —
/// callers degrade to the regex layer instead of erroring.
pub fn try_parse(html: &str) -> Option<DomNode> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let dom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .ok()?;

    Some(convert_node(&dom.document))
}

fn convert_node(handle: &Handle) -> DomNode {
    match &handle.data {
        NodeData::Document => {
            let mut children = Vec::new();
            for child in handle.children.borrow().iter() {
                children.push(convert_node(child));
            }
            DomNode::Element {
                tag: "#document".to_string(),
                attrs: HashMap::new(),
                children,
            }
        }
        NodeData::Element { name, attrs: node_attrs, .. } => {
            let tag = name.local.to_string();
            let mut attrs = HashMap::new();
            for attr in node_attrs.borrow().iter() {
                attrs.insert(attr.name.local.to_string(), attr.value.to_string());
            }

            // Script/style text is never useful for extraction
            let mut children = Vec::new();
            if tag != "script" && tag != "style" {
                for child in handle.children.borrow().iter() {
                    let child_node = convert_node(child);
                    if let DomNode::Text(ref text) = child_node {
                        if text.trim().is_empty() {
                            continue;
                        }
                    }
                    children.push(child_node);
                }
            }
            DomNode::Element { tag, attrs, children }
        }
        NodeData::Text { contents } => DomNode::Text(contents.borrow().to_string()),
        _ => DomNode::Text(String::new()),
    }
}

/// A form found on a page: resolved-later action, method, named input
/// values in document order, and the form's visible text.
#[derive(Debug, Clone)]
pub struct FormRef {
    pub action: Option<String>,
    pub method: Option<String>,
    pub fields: Vec<(String, String)>,
    pub text: String,
}

impl FormRef {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }
}

/// A link or button that can trigger a GET navigation.
#[derive(Debug, Clone)]
pub struct LinkRef {
    pub href: String,
    pub text: String,
}

/// Collect every `<form>` on the page.
pub fn extract_forms(root: &DomNode) -> Vec<FormRef> {
    let mut forms = Vec::new();
    root.visit_elements(&mut |node| {
        if node.tag() == Some("form") {
            let mut fields = Vec::new();
            node.visit_elements(&mut |inner| {
                if inner.tag() == Some("input") {
                    if let Some(name) = inner.attr("name") {
                        if !name.is_empty() {
                            let value = inner.attr("value").unwrap_or("").to_string();
                            fields.push((name.to_string(), value));
                        }
                    }
                }
            });
            forms.push(FormRef {
                action: node.attr("action").map(|s| s.to_string()),
                method: node.attr("method").map(|s| s.to_string()),
                fields,
                text: node.text_content(),
            });
        }
    });
    forms
}

/// Collect every `<a>`/`<button>` with an href, in document order.
pub fn extract_links(root: &DomNode) -> Vec<LinkRef> {
    let mut links = Vec::new();
    root.visit_elements(&mut |node| {
        if matches!(node.tag(), Some("a") | Some("button")) {
            if let Some(href) = node.attr("href") {
                if !href.is_empty() {
                    links.push(LinkRef {
                        href: href.to_string(),
                        text: node.text_content(),
                    });
                }
            }
        }
    });
    links
}

static TOKEN_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)name\s*=\s*["']token["']\s+value\s*=\s*["']([^"']+)["']"#)
        .expect("token input pattern")
});

/// Pull the WHMCS CSRF token (`<input name="token" value=...>`) out of a
/// page. Structured parse first, regex fallback second, `None` if neither
/// finds a non-empty value.
pub fn extract_token(html: &str) -> Option<String> {
    if html.is_empty() {
        return None;
    }
    if let Some(root) = try_parse(html) {
        if let Some(token) = token_from_dom(&root) {
            return Some(token);
        }
    }
    token_via_regex(html)
}

fn token_from_dom(root: &DomNode) -> Option<String> {
    let mut token = None;
    root.visit_elements(&mut |node| {
        if token.is_none() && node.tag() == Some("input") && node.attr("name") == Some("token") {
            if let Some(value) = node.attr("value") {
                if !value.is_empty() {
                    token = Some(value.to_string());
                }
            }
        }
    });
    token
}

/// Regex-only token extraction; the path taken when the structured parse
/// is unavailable or finds nothing.
pub fn token_via_regex(html: &str) -> Option<String> {
    TOKEN_INPUT
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
