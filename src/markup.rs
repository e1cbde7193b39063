//! Minimal markup builder.
//!
//! Text nodes and attribute values are escaped when the tree is written, so
//! callers never have to remember to escape a field. The escape table is the
//! one the site has always used (`& < > " '`).

const VOID_TAGS: [&str; 4] = ["input", "hr", "br", "img"];

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for chr in s.chars() {
        match chr {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: &'static str,
    attrs: Vec<(&'static str, Option<String>)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, Some(value.into())));
        self
    }

    /// Boolean attribute such as `hidden` or `checked`, only written when set.
    pub fn flag(mut self, name: &'static str, set: bool) -> Self {
        if set {
            self.attrs.push((name, None));
        }
        self
    }

    pub fn class(self, value: impl Into<String>) -> Self {
        self.attr("class", value)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn child(mut self, element: Element) -> Self {
        self.children.push(Node::Element(element));
        self
    }

    pub fn children(mut self, elements: impl IntoIterator<Item = Element>) -> Self {
        self.children
            .extend(elements.into_iter().map(Node::Element));
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            if let Some(v) = value {
                out.push_str("=\"");
                out.push_str(&escape(v));
                out.push('"');
            }
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag) {
            return;
        }
        for node in &self.children {
            match node {
                Node::Element(e) => e.write(out),
                Node::Text(t) => out.push_str(&escape(t)),
            }
        }
        out.push_str("</");
        out.push_str(self.tag);
        out.push('>');
    }
}

/// Wraps rendered container bodies into a standalone page.
pub fn page(title: &str, sections: Vec<Element>) -> String {
    let html = Element::new("html")
        .attr("lang", "en")
        .child(
            Element::new("head")
                .child(Element::new("meta").attr("charset", "utf-8"))
                .child(Element::new("title").text(title)),
        )
        .child(Element::new("body").children(sections));
    format!("<!DOCTYPE html>\n{}\n", html.render())
}
