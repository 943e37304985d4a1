use std::borrow::Cow;
use std::collections::HashMap;

use super::dom::Element;
use super::model::{
    AttributeDecl, ComplexType, Content, ElementDecl, Group, GroupKind, Particle, Schema,
    SimpleType, TypeRef,
};

/// One schema violation, located by element path and source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub line: usize,
    pub message: String,
}

enum Resolved<'a> {
    Simple(&'a TypeRef),
    Complex(&'a ComplexType),
    Any,
}

type Assigned<'a> = Vec<(usize, &'a ElementDecl)>;

const MAX_BASE_DEPTH: usize = 32;

fn emptiable(p: &Particle) -> bool {
    match p {
        Particle::Element(d) => d.min == 0,
        Particle::Any { min, .. } => *min == 0,
        Particle::Group(g) => {
            g.min == 0
                || match g.kind {
                    GroupKind::Sequence | GroupKind::All => g.items.iter().all(emptiable),
                    GroupKind::Choice => g.items.iter().any(emptiable),
                }
        }
    }
}

fn starts_with(p: &Particle, name: &str) -> bool {
    match p {
        Particle::Element(d) => d.name == name,
        Particle::Any { .. } => true,
        Particle::Group(g) => match g.kind {
            GroupKind::Sequence => {
                for it in &g.items {
                    if starts_with(it, name) {
                        return true;
                    }
                    if !emptiable(it) {
                        return false;
                    }
                }
                false
            }
            GroupKind::Choice | GroupKind::All => g.items.iter().any(|i| starts_with(i, name)),
        },
    }
}

fn missing(name: &str, found: Option<&&Element>) -> String {
    match found {
        Some(k) => format!("missing element <{name}>, found <{}>", k.name),
        None => format!("missing element <{name}>"),
    }
}

/// Paths of each child, indexed when a name repeats among siblings.
fn child_paths(el: &Element, path: &str) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for c in &el.children {
        *totals.entry(c.name.as_str()).or_default() += 1;
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    el.children
        .iter()
        .map(|c| {
            let n = seen.entry(c.name.as_str()).or_default();
            *n += 1;
            if totals[c.name.as_str()] > 1 {
                format!("{path}/{}[{n}]", c.name)
            } else {
                format!("{path}/{}", c.name)
            }
        })
        .collect()
}

impl Schema {
    /// Validate a document; an empty result means it conforms.
    pub fn validate(&self, root: &Element) -> Vec<Violation> {
        let mut out = Vec::new();
        let path = format!("/{}", root.name);
        match self.elements.get(&root.name) {
            Some(d) => self.validate_element(root, &d.ty, &path, &mut out),
            None => out.push(Violation {
                path,
                line: root.line,
                message: format!("no declaration for root element <{}>", root.name),
            }),
        }
        out
    }

    fn resolve<'a>(&'a self, ty: &'a TypeRef) -> Resolved<'a> {
        match ty {
            TypeRef::Named(n) => match self.complex.get(n) {
                Some(ct) => Resolved::Complex(ct),
                None => Resolved::Simple(ty),
            },
            TypeRef::Complex(ct) => Resolved::Complex(ct),
            TypeRef::ElementRef(n) => match self.elements.get(n) {
                Some(d) => self.resolve(&d.ty),
                None => Resolved::Any,
            },
            TypeRef::Any => Resolved::Any,
            TypeRef::Builtin(_) | TypeRef::Simple(_) => Resolved::Simple(ty),
        }
    }

    fn preserves_whitespace(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Builtin(b) => b.preserves_whitespace(),
            TypeRef::Named(n) => self
                .simple
                .get(n)
                .is_none_or(|st| self.preserves_whitespace(&st.base)),
            TypeRef::Simple(st) => self.preserves_whitespace(&st.base),
            _ => true,
        }
    }

    pub(crate) fn check_simple(&self, ty: &TypeRef, raw: &str) -> Result<(), String> {
        match ty {
            TypeRef::Builtin(b) => b.check(raw),
            TypeRef::Named(n) => match self.simple.get(n) {
                Some(st) => self.check_simple_type(st, raw),
                None => Err(format!("{n} is not a simple type")),
            },
            TypeRef::Simple(st) => self.check_simple_type(st, raw),
            TypeRef::Any => Ok(()),
            TypeRef::Complex(_) | TypeRef::ElementRef(_) => {
                Err("expected a simple type".to_string())
            }
        }
    }

    fn check_simple_type(&self, st: &SimpleType, raw: &str) -> Result<(), String> {
        self.check_simple(&st.base, raw)?;
        let v = if self.preserves_whitespace(&st.base) {
            raw
        } else {
            raw.trim()
        };
        let f = &st.facets;
        if !f.enumeration.is_empty() && !f.enumeration.iter().any(|e| e == v) {
            return Err(format!(
                "{v:?} is not one of [{}]",
                f.enumeration.join(", ")
            ));
        }
        if !f.patterns.is_empty() && !f.patterns.iter().any(|p| p.is_match(v)) {
            return Err(format!("{v:?} does not match the required pattern"));
        }
        let bounded = f.min_inclusive.is_some()
            || f.max_inclusive.is_some()
            || f.min_exclusive.is_some()
            || f.max_exclusive.is_some();
        if bounded {
            let x: f64 = v
                .parse()
                .map_err(|_| format!("{v:?} is not numeric"))?;
            if f.min_inclusive.is_some_and(|m| x < m)
                || f.max_inclusive.is_some_and(|m| x > m)
                || f.min_exclusive.is_some_and(|m| x <= m)
                || f.max_exclusive.is_some_and(|m| x >= m)
            {
                return Err(format!("{v} is out of range"));
            }
        }
        let len = v.chars().count();
        if f.length.is_some_and(|l| len != l)
            || f.min_length.is_some_and(|l| len < l)
            || f.max_length.is_some_and(|l| len > l)
        {
            return Err(format!("{v:?} has invalid length {len}"));
        }
        Ok(())
    }

    fn validate_element(&self, el: &Element, ty: &TypeRef, path: &str, out: &mut Vec<Violation>) {
        match self.resolve(ty) {
            Resolved::Any => {}
            Resolved::Simple(t) => {
                let paths = child_paths(el, path);
                for (c, p) in el.children.iter().zip(paths) {
                    out.push(Violation {
                        path: p,
                        line: c.line,
                        message: format!("element <{}> not allowed in simple content", c.name),
                    });
                }
                for a in el.attrs.iter().filter(|a| !a.prefixed) {
                    out.push(Violation {
                        path: path.to_string(),
                        line: el.line,
                        message: format!("unexpected attribute {}", a.name),
                    });
                }
                if let Err(m) = self.check_simple(t, &el.text) {
                    out.push(Violation {
                        path: path.to_string(),
                        line: el.line,
                        message: m,
                    });
                }
            }
            Resolved::Complex(ct) => self.validate_complex(el, ct, path, out),
        }
    }

    /// Attributes of `ct` including those inherited through `complexContent` extension.
    fn attributes_of<'a>(&'a self, ct: &'a ComplexType) -> (Vec<&'a AttributeDecl>, bool) {
        let mut attrs: Vec<&AttributeDecl> = Vec::new();
        let mut any = false;
        let mut cur = Some(ct);
        let mut depth = 0;
        while let Some(c) = cur {
            attrs.extend(c.attributes.iter());
            any |= c.any_attribute;
            depth += 1;
            cur = match &c.base {
                Some(b) if depth < MAX_BASE_DEPTH => self.complex.get(b),
                _ => None,
            };
        }
        (attrs, any)
    }

    /// Content model of `ct`, with a base type's particles ahead of its own.
    fn content_of<'a>(&'a self, ct: &'a ComplexType, depth: usize) -> Cow<'a, Content> {
        let Some(base) = ct.base.as_ref().and_then(|b| self.complex.get(b)) else {
            return Cow::Borrowed(&ct.content);
        };
        if depth >= MAX_BASE_DEPTH {
            return Cow::Borrowed(&ct.content);
        }
        let inherited = self.content_of(base, depth + 1);
        match &ct.content {
            Content::Empty => inherited,
            Content::Elements(own) => match inherited.as_ref() {
                Content::Elements(b) => {
                    let plain = |g: &Group| {
                        g.kind == GroupKind::Sequence && g.min == 1 && g.max == Some(1)
                    };
                    let items = if plain(b) && plain(own) {
                        b.items.iter().chain(&own.items).cloned().collect()
                    } else {
                        vec![Particle::Group(b.clone()), Particle::Group(own.clone())]
                    };
                    Cow::Owned(Content::Elements(Group {
                        kind: GroupKind::Sequence,
                        items,
                        min: 1,
                        max: Some(1),
                    }))
                }
                _ => Cow::Borrowed(&ct.content),
            },
            Content::Simple(_) => Cow::Borrowed(&ct.content),
        }
    }

    fn validate_complex(&self, el: &Element, ct: &ComplexType, path: &str, out: &mut Vec<Violation>) {
        let here = |message: String| Violation {
            path: path.to_string(),
            line: el.line,
            message,
        };

        let (decls, any_attr) = self.attributes_of(ct);
        for d in &decls {
            match el.attr(&d.name) {
                None if d.required => out.push(here(format!("missing required attribute {}", d.name))),
                None => {}
                Some(v) => {
                    if let Err(m) = self.check_simple(&d.ty, v) {
                        out.push(here(format!("attribute {}: {m}", d.name)));
                    } else if let Some(f) = d.fixed.as_deref().filter(|f| *f != v) {
                        out.push(here(format!("attribute {} must be {f:?}", d.name)));
                    }
                }
            }
        }
        if !any_attr {
            for a in el.attrs.iter().filter(|a| !a.prefixed) {
                if !decls.iter().any(|d| d.name == a.name) {
                    out.push(here(format!("unexpected attribute {}", a.name)));
                }
            }
        }

        let paths = child_paths(el, path);
        let has_text = !el.text.trim().is_empty();
        let content = self.content_of(ct, 0);
        match content.as_ref() {
            Content::Empty | Content::Simple(_) => {
                for (c, p) in el.children.iter().zip(&paths) {
                    out.push(Violation {
                        path: p.clone(),
                        line: c.line,
                        message: format!("unexpected element <{}>", c.name),
                    });
                }
                match content.as_ref() {
                    Content::Simple(t) => {
                        if let Err(m) = self.check_simple(t, &el.text) {
                            out.push(here(m));
                        }
                    }
                    _ if has_text && !ct.mixed => out.push(here("text not allowed".to_string())),
                    _ => {}
                }
            }
            Content::Elements(g) => {
                if has_text && !ct.mixed {
                    out.push(here("text not allowed in element-only content".to_string()));
                }
                let kids: Vec<&Element> = el.children.iter().collect();
                let assigned = self.match_content(el, g, &kids, &paths, path, out);
                for (i, d) in assigned {
                    self.validate_element(kids[i], &d.ty, &paths[i], out);
                }
            }
        }
    }

    /// Assign children to declarations. The outermost sequence recovers from
    /// stray or missing elements so each problem is reported on its own.
    fn match_content<'a>(
        &self,
        el: &Element,
        g: &'a Group,
        kids: &[&Element],
        paths: &[String],
        path: &str,
        out: &mut Vec<Violation>,
    ) -> Assigned<'a> {
        let mut pos = 0usize;
        let mut assigned: Assigned<'a> = Vec::new();
        let unexpected = |i: usize| Violation {
            path: paths[i].clone(),
            line: kids[i].line,
            message: format!("unexpected element <{}>", kids[i].name),
        };

        if g.kind == GroupKind::Sequence && g.min == 1 && g.max == Some(1) {
            for (idx, item) in g.items.iter().enumerate() {
                loop {
                    let (p0, a0) = (pos, assigned.len());
                    match self.match_particle(item, kids, &mut pos, &mut assigned) {
                        Ok(()) => break,
                        Err(m) => {
                            pos = p0;
                            assigned.truncate(a0);
                            let stray = kids.get(pos).is_some_and(|k| {
                                !g.items[idx..].iter().any(|it| starts_with(it, &k.name))
                            });
                            if stray {
                                out.push(unexpected(pos));
                                pos += 1;
                                continue;
                            }
                            out.push(Violation {
                                path: path.to_string(),
                                line: el.line,
                                message: m,
                            });
                            break;
                        }
                    }
                }
            }
        } else if let Err(m) = self.match_group(g, kids, &mut pos, &mut assigned) {
            out.push(Violation {
                path: path.to_string(),
                line: el.line,
                message: m,
            });
        }

        for i in pos..kids.len() {
            out.push(unexpected(i));
        }
        assigned
    }

    fn match_particle<'a>(
        &self,
        p: &'a Particle,
        kids: &[&Element],
        pos: &mut usize,
        assigned: &mut Assigned<'a>,
    ) -> Result<(), String> {
        match p {
            Particle::Element(d) => {
                let mut n = 0u32;
                while d.max.is_none_or(|m| n < m)
                    && kids.get(*pos).is_some_and(|k| k.name == d.name)
                {
                    assigned.push((*pos, d));
                    *pos += 1;
                    n += 1;
                }
                if n < d.min {
                    return Err(missing(&d.name, kids.get(*pos)));
                }
                Ok(())
            }
            Particle::Any { min, max } => {
                let mut n = 0u32;
                while max.is_none_or(|m| n < m) && *pos < kids.len() {
                    *pos += 1;
                    n += 1;
                }
                if n < *min {
                    return Err(format!("expected {} more element(s)", min - n));
                }
                Ok(())
            }
            Particle::Group(g) => self.match_group(g, kids, pos, assigned),
        }
    }

    fn match_group<'a>(
        &self,
        g: &'a Group,
        kids: &[&Element],
        pos: &mut usize,
        assigned: &mut Assigned<'a>,
    ) -> Result<(), String> {
        let mut n = 0u32;
        loop {
            if g.max.is_some_and(|m| n >= m) {
                break;
            }
            let (p0, a0) = (*pos, assigned.len());
            match self.match_group_once(g, kids, pos, assigned) {
                Ok(()) if *pos > p0 => n += 1,
                Ok(()) => break,
                Err(e) => {
                    *pos = p0;
                    assigned.truncate(a0);
                    if n < g.min {
                        return Err(e);
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    fn match_group_once<'a>(
        &self,
        g: &'a Group,
        kids: &[&Element],
        pos: &mut usize,
        assigned: &mut Assigned<'a>,
    ) -> Result<(), String> {
        match g.kind {
            GroupKind::Sequence => {
                for item in &g.items {
                    self.match_particle(item, kids, pos, assigned)?;
                }
                Ok(())
            }
            GroupKind::Choice => {
                if let Some(k) = kids.get(*pos) {
                    if let Some(item) = g.items.iter().find(|i| starts_with(i, &k.name)) {
                        return self.match_particle(item, kids, pos, assigned);
                    }
                }
                if g.items.iter().any(emptiable) {
                    return Ok(());
                }
                let names: Vec<String> = g
                    .items
                    .iter()
                    .filter_map(|i| match i {
                        Particle::Element(d) => Some(format!("<{}>", d.name)),
                        _ => None,
                    })
                    .collect();
                Err(match kids.get(*pos) {
                    Some(k) => format!("expected one of {}, found <{}>", names.join(", "), k.name),
                    None => format!("expected one of {}", names.join(", ")),
                })
            }
            GroupKind::All => {
                let mut used = vec![false; g.items.len()];
                while let Some(k) = kids.get(*pos) {
                    let hit = g.items.iter().enumerate().find_map(|(i, it)| match it {
                        Particle::Element(d) if !used[i] && d.name == k.name => Some((i, d)),
                        _ => None,
                    });
                    let Some((i, d)) = hit else { break };
                    used[i] = true;
                    assigned.push((*pos, d));
                    *pos += 1;
                }
                for (i, it) in g.items.iter().enumerate() {
                    if let Particle::Element(d) = it {
                        if !used[i] && d.min > 0 {
                            return Err(missing(&d.name, kids.get(*pos)));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
