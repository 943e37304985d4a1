use std::collections::{HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use tracing::debug;

use super::builtin::Builtin;
use super::dom::{self, Element};
use crate::error::{ArdError, Result};

/// `maxOccurs`; `None` is unbounded.
pub type MaxOccurs = Option<u32>;

#[derive(Clone, Debug)]
pub enum TypeRef {
    Builtin(Builtin),
    Named(String),
    Complex(Box<ComplexType>),
    Simple(Box<SimpleType>),
    /// `<element ref="..."/>`; the type comes from the global declaration.
    ElementRef(String),
    /// No type given (`anyType`).
    Any,
}

#[derive(Clone, Debug)]
pub struct ElementDecl {
    pub name: String,
    pub ty: TypeRef,
    pub min: u32,
    pub max: MaxOccurs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Sequence,
    Choice,
    All,
}

#[derive(Clone, Debug)]
pub struct Group {
    pub kind: GroupKind,
    pub items: Vec<Particle>,
    pub min: u32,
    pub max: MaxOccurs,
}

#[derive(Clone, Debug)]
pub enum Particle {
    Element(ElementDecl),
    Group(Group),
    Any { min: u32, max: MaxOccurs },
}

#[derive(Clone, Debug)]
pub struct AttributeDecl {
    pub name: String,
    pub ty: TypeRef,
    pub required: bool,
    pub fixed: Option<String>,
}

#[derive(Clone, Debug)]
pub enum Content {
    Empty,
    Elements(Group),
    /// Text only (`simpleContent`), typed by the given simple type.
    Simple(TypeRef),
}

#[derive(Clone, Debug)]
pub struct ComplexType {
    pub content: Content,
    /// Named complex type this one extends (`complexContent/extension`).
    pub base: Option<String>,
    pub attributes: Vec<AttributeDecl>,
    pub any_attribute: bool,
    pub mixed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Facets {
    pub enumeration: Vec<String>,
    pub patterns: Vec<Regex>,
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub min_exclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct SimpleType {
    pub base: TypeRef,
    pub facets: Facets,
}

/// Parsed XML Schema (supported subset).
#[derive(Clone, Debug, Default)]
pub struct Schema {
    pub(crate) elements: HashMap<String, ElementDecl>,
    pub(crate) complex: HashMap<String, ComplexType>,
    pub(crate) simple: HashMap<String, SimpleType>,
    pub(crate) attributes: HashMap<String, AttributeDecl>,
}

fn unsupported(what: &str, el: &Element) -> ArdError {
    ArdError::Schema(format!(
        "unsupported construct <{}> ({what}) at line {}",
        el.name, el.line
    ))
}

fn bad(msg: String, el: &Element) -> ArdError {
    ArdError::Schema(format!("{msg} at line {}", el.line))
}

fn local_name(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, l)| l)
}

fn occurs(el: &Element) -> Result<(u32, MaxOccurs)> {
    let min = match el.attr("minOccurs") {
        None => 1,
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| bad(format!("bad minOccurs {s:?}"), el))?,
    };
    let max = match el.attr("maxOccurs").map(str::trim) {
        None => Some(1),
        Some("unbounded") => None,
        Some(s) => Some(
            s.parse()
                .map_err(|_| bad(format!("bad maxOccurs {s:?}"), el))?,
        ),
    };
    if let Some(m) = max {
        if m < min {
            return Err(bad(format!("maxOccurs {m} < minOccurs {min}"), el));
        }
    }
    Ok((min, max))
}

fn is_annotation(el: &Element) -> bool {
    el.name == "annotation"
}

impl Schema {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(xsd: &[u8]) -> Result<Self> {
        let root = dom::parse(xsd)?;
        Self::from_element(&root)
    }

    pub fn from_element(root: &Element) -> Result<Self> {
        if root.name != "schema" {
            return Err(bad(format!("expected <schema>, found <{}>", root.name), root));
        }
        let mut s = Schema::default();
        // global attributes first so attribute refs resolve regardless of order
        for c in root.children_named("attribute") {
            let a = s.attribute_decl(c)?;
            s.attributes.insert(a.name.clone(), a);
        }
        for c in &root.children {
            match c.name.as_str() {
                "annotation" | "attribute" => {}
                "element" => {
                    let d = s.element_decl(c, true)?;
                    s.elements.insert(d.name.clone(), d);
                }
                "complexType" => {
                    let name = required_attr(c, "name")?;
                    let ct = s.complex_type(c)?;
                    s.complex.insert(name.to_string(), ct);
                }
                "simpleType" => {
                    let name = required_attr(c, "name")?;
                    let st = s.simple_type(c)?;
                    s.simple.insert(name.to_string(), st);
                }
                _ => return Err(unsupported("top level", c)),
            }
        }
        if s.elements.is_empty() {
            return Err(bad("schema declares no global element".to_string(), root));
        }
        s.check_references()?;
        s.check_cycles()?;
        debug!(
            elements = s.elements.len(),
            complex_types = s.complex.len(),
            simple_types = s.simple.len(),
            "schema loaded"
        );
        Ok(s)
    }

    pub fn global_element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    fn type_ref(&self, qname: &str) -> TypeRef {
        let local = local_name(qname);
        let prefixed = qname.contains(':');
        if !prefixed && (self.complex.contains_key(local) || self.simple.contains_key(local)) {
            return TypeRef::Named(local.to_string());
        }
        match Builtin::from_name(local) {
            Some(b) => TypeRef::Builtin(b),
            None if local == "anyType" => TypeRef::Any,
            None => TypeRef::Named(local.to_string()),
        }
    }

    fn element_decl(&self, el: &Element, global: bool) -> Result<ElementDecl> {
        let (min, max) = if global { (1, Some(1)) } else { occurs(el)? };
        if let Some(r) = el.attr("ref") {
            let name = local_name(r).to_string();
            return Ok(ElementDecl {
                ty: TypeRef::ElementRef(name.clone()),
                name,
                min,
                max,
            });
        }
        let name = required_attr(el, "name")?.to_string();
        let mut ty = el.attr("type").map(|t| self.type_ref(t));
        for c in el.children.iter().filter(|c| !is_annotation(c)) {
            if ty.is_some() {
                return Err(bad(format!("element {name} has both a type and an inline type"), c));
            }
            ty = Some(match c.name.as_str() {
                "complexType" => TypeRef::Complex(Box::new(self.complex_type(c)?)),
                "simpleType" => TypeRef::Simple(Box::new(self.simple_type(c)?)),
                _ => return Err(unsupported("inside element", c)),
            });
        }
        Ok(ElementDecl {
            name,
            ty: ty.unwrap_or(TypeRef::Any),
            min,
            max,
        })
    }

    fn attribute_decl(&self, el: &Element) -> Result<AttributeDecl> {
        let required = el.attr("use") == Some("required");
        if let Some(r) = el.attr("ref") {
            let name = local_name(r);
            let mut a = self
                .attributes
                .get(name)
                .cloned()
                .ok_or_else(|| bad(format!("unknown attribute ref {name}"), el))?;
            a.required = required;
            return Ok(a);
        }
        let name = required_attr(el, "name")?.to_string();
        let mut ty = el.attr("type").map(|t| self.type_ref(t));
        if let Some(st) = el.child("simpleType") {
            ty = Some(TypeRef::Simple(Box::new(self.simple_type(st)?)));
        }
        Ok(AttributeDecl {
            name,
            ty: ty.unwrap_or(TypeRef::Builtin(Builtin::AnySimple)),
            required,
            fixed: el.attr("fixed").map(str::to_string),
        })
    }

    fn group(&self, el: &Element) -> Result<Group> {
        let kind = match el.name.as_str() {
            "sequence" => GroupKind::Sequence,
            "choice" => GroupKind::Choice,
            "all" => GroupKind::All,
            _ => return Err(unsupported("expected sequence, choice or all", el)),
        };
        let (min, max) = occurs(el)?;
        let mut items = Vec::new();
        for c in el.children.iter().filter(|c| !is_annotation(c)) {
            items.push(match c.name.as_str() {
                "element" => Particle::Element(self.element_decl(c, false)?),
                "sequence" | "choice" | "all" if kind != GroupKind::All => {
                    Particle::Group(self.group(c)?)
                }
                "any" => {
                    let (min, max) = occurs(c)?;
                    Particle::Any { min, max }
                }
                _ => return Err(unsupported("inside model group", c)),
            });
        }
        Ok(Group {
            kind,
            items,
            min,
            max,
        })
    }

    fn complex_type(&self, el: &Element) -> Result<ComplexType> {
        let mut ct = ComplexType {
            content: Content::Empty,
            base: None,
            attributes: Vec::new(),
            any_attribute: false,
            mixed: el.attr("mixed") == Some("true"),
        };
        for c in el.children.iter().filter(|c| !is_annotation(c)) {
            match c.name.as_str() {
                "sequence" | "choice" | "all" => ct.content = Content::Elements(self.group(c)?),
                "attribute" => ct.attributes.push(self.attribute_decl(c)?),
                "anyAttribute" => ct.any_attribute = true,
                "simpleContent" => {
                    let ext = c
                        .children
                        .iter()
                        .find(|x| x.name == "extension" || x.name == "restriction")
                        .ok_or_else(|| bad("simpleContent without extension".to_string(), c))?;
                    let base = required_attr(ext, "base")?;
                    ct.content = Content::Simple(self.type_ref(base));
                    self.collect_attributes(ext, &mut ct)?;
                }
                "complexContent" => {
                    let ext = c
                        .child("extension")
                        .ok_or_else(|| unsupported("complexContent without extension", c))?;
                    ct.base = Some(local_name(required_attr(ext, "base")?).to_string());
                    if ext.attr("mixed") == Some("true") || c.attr("mixed") == Some("true") {
                        ct.mixed = true;
                    }
                    for x in ext.children.iter().filter(|x| !is_annotation(x)) {
                        if matches!(x.name.as_str(), "sequence" | "choice" | "all") {
                            ct.content = Content::Elements(self.group(x)?);
                        }
                    }
                    self.collect_attributes(ext, &mut ct)?;
                }
                _ => return Err(unsupported("inside complexType", c)),
            }
        }
        Ok(ct)
    }

    fn collect_attributes(&self, el: &Element, ct: &mut ComplexType) -> Result<()> {
        for a in &el.children {
            match a.name.as_str() {
                "attribute" => ct.attributes.push(self.attribute_decl(a)?),
                "anyAttribute" => ct.any_attribute = true,
                _ => {}
            }
        }
        Ok(())
    }

    fn simple_type(&self, el: &Element) -> Result<SimpleType> {
        let r = el
            .children
            .iter()
            .find(|c| !is_annotation(c))
            .ok_or_else(|| bad("empty simpleType".to_string(), el))?;
        if r.name != "restriction" {
            return Err(unsupported("only restriction simple types", r));
        }
        let base = match (r.attr("base"), r.child("simpleType")) {
            (Some(b), _) => self.type_ref(b),
            (None, Some(inner)) => TypeRef::Simple(Box::new(self.simple_type(inner)?)),
            (None, None) => return Err(bad("restriction without base".to_string(), r)),
        };
        let mut facets = Facets::default();
        for f in r.children.iter().filter(|c| !is_annotation(c) && c.name != "simpleType") {
            let value = required_attr(f, "value")?;
            let num = || -> Result<f64> {
                value
                    .trim()
                    .parse()
                    .map_err(|_| bad(format!("non-numeric {} {value:?}", f.name), f))
            };
            let len = || -> Result<usize> {
                value
                    .trim()
                    .parse()
                    .map_err(|_| bad(format!("bad {} {value:?}", f.name), f))
            };
            match f.name.as_str() {
                "enumeration" => facets.enumeration.push(value.to_string()),
                "pattern" => {
                    let re = Regex::new(&format!("^(?:{value})$"))
                        .map_err(|e| bad(format!("bad pattern {value:?}: {e}"), f))?;
                    facets.patterns.push(re);
                }
                "minInclusive" => facets.min_inclusive = Some(num()?),
                "maxInclusive" => facets.max_inclusive = Some(num()?),
                "minExclusive" => facets.min_exclusive = Some(num()?),
                "maxExclusive" => facets.max_exclusive = Some(num()?),
                "length" => facets.length = Some(len()?),
                "minLength" => facets.min_length = Some(len()?),
                "maxLength" => facets.max_length = Some(len()?),
                "whiteSpace" | "totalDigits" | "fractionDigits" => {}
                _ => return Err(unsupported("facet", f)),
            }
        }
        Ok(SimpleType { base, facets })
    }

    fn check_references(&self) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();
        let mut stack: Vec<&TypeRef> = Vec::new();
        for d in self.elements.values() {
            stack.push(&d.ty);
        }
        for a in self.attributes.values() {
            stack.push(&a.ty);
        }
        let mut cts: Vec<&ComplexType> = self.complex.values().collect();
        let mut sts: Vec<&SimpleType> = self.simple.values().collect();
        loop {
            if let Some(t) = stack.pop() {
                match t {
                    TypeRef::Named(n)
                        if !self.complex.contains_key(n) && !self.simple.contains_key(n) =>
                    {
                        missing.push(format!("type {n}"))
                    }
                    TypeRef::ElementRef(n) if !self.elements.contains_key(n) => {
                        missing.push(format!("element {n}"))
                    }
                    TypeRef::Complex(ct) => cts.push(ct),
                    TypeRef::Simple(st) => sts.push(st),
                    _ => {}
                }
            } else if let Some(ct) = cts.pop() {
                if let Some(b) = &ct.base {
                    if !self.complex.contains_key(b) {
                        missing.push(format!("base type {b}"));
                    }
                }
                for a in &ct.attributes {
                    stack.push(&a.ty);
                }
                match &ct.content {
                    Content::Elements(g) => push_group(g, &mut stack),
                    Content::Simple(t) => stack.push(t),
                    Content::Empty => {}
                }
            } else if let Some(st) = sts.pop() {
                stack.push(&st.base);
            } else {
                break;
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            missing.dedup();
            Err(ArdError::Schema(format!("unresolved {}", missing.join(", "))))
        }
    }

    /// Rejects named types that derive, directly or not, from themselves.
    fn check_cycles(&self) -> Result<()> {
        let mut names: Vec<&String> = self.complex.keys().chain(self.simple.keys()).collect();
        names.sort();
        for start in names {
            let mut seen = HashSet::new();
            let mut cur = Some(start.as_str());
            while let Some(n) = cur {
                if !seen.insert(n) {
                    return Err(ArdError::Schema(format!(
                        "circular type definition involving {start}"
                    )));
                }
                cur = self.base_of(n);
            }
        }
        Ok(())
    }

    /// Name of the named type `name` derives from, looking through anonymous restrictions.
    fn base_of(&self, name: &str) -> Option<&str> {
        if let Some(ct) = self.complex.get(name) {
            return ct.base.as_deref();
        }
        let mut ty = &self.simple.get(name)?.base;
        loop {
            match ty {
                TypeRef::Named(n) => return Some(n),
                TypeRef::Simple(st) => ty = &st.base,
                _ => return None,
            }
        }
    }
}

fn push_group<'a>(g: &'a Group, stack: &mut Vec<&'a TypeRef>) {
    for p in &g.items {
        match p {
            Particle::Element(d) => stack.push(&d.ty),
            Particle::Group(inner) => push_group(inner, stack),
            Particle::Any { .. } => {}
        }
    }
}

fn required_attr<'a>(el: &'a Element, name: &str) -> Result<&'a str> {
    el.attr(name)
        .ok_or_else(|| bad(format!("<{}> missing {name}", el.name), el))
}
