use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{ArdError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// Namespace-qualified (`xsi:schemaLocation` and the like).
    pub prefixed: bool,
}

/// Minimal element tree; names are local (namespace prefixes dropped).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Element>,
    pub text: String,
    /// 1-based line of the start tag.
    pub line: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant (depth-first, self excluded) with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for c in &self.children {
            if c.name == name {
                return Some(c);
            }
            if let Some(d) = c.find(name) {
                return Some(d);
            }
        }
        None
    }

    pub fn text_trimmed(&self) -> &str {
        self.text.trim()
    }
}

fn local(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| ArdError::Xml(format!("invalid UTF-8 in name: {e}")))
}

fn open_element(e: &BytesStart<'_>, line: usize) -> Result<Element> {
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a?;
        let raw = a.key.as_ref();
        if raw == b"xmlns" || raw.starts_with(b"xmlns:") {
            continue;
        }
        attrs.push(Attribute {
            name: local(a.key.local_name().as_ref())?,
            value: a.unescape_value()?.into_owned(),
            prefixed: a.key.prefix().is_some(),
        });
    }
    Ok(Element {
        name: local(e.local_name().as_ref())?,
        attrs,
        children: Vec::new(),
        text: String::new(),
        line,
    })
}

/// Tracks line numbers from the reader's byte offset.
struct LineCounter<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl LineCounter<'_> {
    fn at(&mut self, pos: usize) -> usize {
        let end = pos.min(self.src.len());
        if end > self.pos {
            self.line += self.src[self.pos..end].iter().filter(|b| **b == b'\n').count();
            self.pos = end;
        }
        self.line
    }
}

/// Parse an XML document into its root element.
pub fn parse(xml: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut lines = LineCounter {
        src: xml,
        pos: 0,
        line: 1,
    };

    loop {
        let start = reader.buffer_position();
        let ev = reader.read_event_into(&mut buf).map_err(|e| {
            ArdError::Xml(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        let line = lines.at(start);
        match ev {
            Event::Start(e) => stack.push(open_element(&e, line)?),
            Event::Empty(e) => {
                let el = open_element(&e, line)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| ArdError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(t) => {
                let s = t.unescape()?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&s),
                    None if s.trim().is_empty() => {}
                    None => return Err(ArdError::Xml("text outside root element".to_string())),
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ArdError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| ArdError::Xml("document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => {
            return Err(ArdError::Xml(format!(
                "second root element <{}> at line {}",
                el.name, el.line
            )));
        }
    }
    Ok(())
}
