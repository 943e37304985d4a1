//! XML metadata parsing and validation against a subset of XML Schema.
//!
//! [`dom::parse`] builds a small element tree with line numbers;
//! [`Schema`] loads an XSD and [`Schema::validate`] returns one
//! [`Violation`] per offending element or attribute.

pub mod builtin;
pub mod dom;
pub mod model;
pub mod validate;

pub use dom::Element;
pub use model::Schema;
pub use validate::Violation;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArdError;

    const XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="code">
    <xs:restriction base="xs:string">
      <xs:enumeration value="CU"/>
      <xs:enumeration value="AK"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="base">
    <xs:sequence>
      <xs:element name="id" type="xs:int"/>
    </xs:sequence>
    <xs:attribute name="version" type="xs:string" use="required"/>
  </xs:complexType>
  <xs:element name="doc">
    <xs:complexType>
      <xs:complexContent>
        <xs:extension base="base">
          <xs:sequence>
            <xs:element name="region" type="code"/>
            <xs:element name="item" minOccurs="0" maxOccurs="unbounded">
              <xs:complexType>
                <xs:simpleContent>
                  <xs:extension base="xs:double">
                    <xs:attribute name="unit" type="xs:string"/>
                  </xs:extension>
                </xs:simpleContent>
              </xs:complexType>
            </xs:element>
            <xs:choice>
              <xs:element name="a" type="xs:string"/>
              <xs:element name="b" type="xs:string"/>
            </xs:choice>
            <xs:element name="count">
              <xs:simpleType>
                <xs:restriction base="xs:int">
                  <xs:minInclusive value="1"/>
                  <xs:maxInclusive value="10"/>
                </xs:restriction>
              </xs:simpleType>
            </xs:element>
          </xs:sequence>
        </xs:extension>
      </xs:complexContent>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn check(doc: &str) -> Vec<Violation> {
        let schema = Schema::from_bytes(XSD.as_bytes()).unwrap();
        schema.validate(&dom::parse(doc.as_bytes()).unwrap())
    }

    #[test]
    fn valid_document_has_no_violations() {
        let v = check(
            r#"<doc version="1"><id>7</id><region>CU</region>
               <item unit="m">1.5</item><item>2</item><b>x</b><count>3</count></doc>"#,
        );
        assert!(v.is_empty(), "{v:?}");
    }

    #[test]
    fn reports_each_offending_element() {
        let v = check(
            "<doc>\n<id>7</id>\n<regoin>CU</regoin>\n<item>abc</item>\n<a>x</a>\n<b>y</b>\n<count>11</count>\n</doc>",
        );
        let got: Vec<(&str, usize)> = v.iter().map(|x| (x.path.as_str(), x.line)).collect();
        assert_eq!(
            got,
            vec![
                ("/doc", 1),
                ("/doc/regoin", 3),
                ("/doc", 1),
                ("/doc/b", 6),
                ("/doc/item", 4),
                ("/doc/count", 7),
            ]
        );
        assert_eq!(v[0].message, "missing required attribute version");
        assert_eq!(v[1].message, "unexpected element <regoin>");
        assert_eq!(v[2].message, "missing element <region>, found <item>");
        assert!(v[4].message.contains("not a valid double"));
        assert_eq!(v[5].message, "11 is out of range");
    }

    #[test]
    fn repeated_siblings_are_indexed() {
        let v = check(
            r#"<doc version="1"><id>1</id><region>HI</region>
               <item>x</item><item>y</item><a/><count>1</count></doc>"#,
        );
        let paths: Vec<&str> = v.iter().map(|x| x.path.as_str()).collect();
        assert_eq!(paths, vec!["/doc/region", "/doc/item[1]", "/doc/item[2]"]);
        assert!(v[0].message.contains("is not one of [CU, AK]"));
    }

    #[test]
    fn unknown_root_and_trailing_elements() {
        let v = check("<other/>");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].message, "no declaration for root element <other>");

        let v = check(
            r#"<doc version="1" extra="1"><id>1</id><region>AK</region><a/><count>2</count><zz/></doc>"#,
        );
        let msgs: Vec<&str> = v.iter().map(|x| x.message.as_str()).collect();
        assert_eq!(msgs, vec!["unexpected attribute extra", "unexpected element <zz>"]);
    }

    #[test]
    fn schema_load_errors() {
        let unsupported = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:group name="g"/><xs:element name="a"/></xs:schema>"#;
        match Schema::from_bytes(unsupported.as_bytes()) {
            Err(ArdError::Schema(m)) => assert!(m.contains("<group>"), "{m}"),
            other => panic!("unexpected {other:?}"),
        }

        let unresolved = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="a" type="nosuch"/></xs:schema>"#;
        match Schema::from_bytes(unresolved.as_bytes()) {
            Err(ArdError::Schema(m)) => assert_eq!(m, "unresolved type nosuch"),
            other => panic!("unexpected {other:?}"),
        }

        let cyclic_simple = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:simpleType name="a"><xs:restriction base="b"/></xs:simpleType>
            <xs:simpleType name="b"><xs:restriction base="a"/></xs:simpleType>
            <xs:element name="doc" type="a"/></xs:schema>"#;
        match Schema::from_bytes(cyclic_simple.as_bytes()) {
            Err(ArdError::Schema(m)) => assert_eq!(m, "circular type definition involving a"),
            other => panic!("unexpected {other:?}"),
        }

        let cyclic_complex = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:complexType name="t"><xs:complexContent>
              <xs:extension base="t"><xs:sequence/></xs:extension>
            </xs:complexContent></xs:complexType>
            <xs:element name="doc" type="t"/></xs:schema>"#;
        match Schema::from_bytes(cyclic_complex.as_bytes()) {
            Err(ArdError::Schema(m)) => assert!(m.starts_with("circular type definition"), "{m}"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(Schema::from_bytes(b"<root/>").is_err());
    }

    #[test]
    fn loads_ard_metadata_schema() {
        let xsd = include_bytes!("../../tests/data/ard_metadata.xsd");
        let schema = Schema::from_bytes(xsd).unwrap();
        assert!(schema.global_element("ard_metadata").is_some());
    }
}
