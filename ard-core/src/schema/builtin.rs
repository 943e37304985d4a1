use std::sync::LazyLock;

use regex::Regex;
use time::{Date, Month};

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap());
static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d{4,})-(\d{2})-(\d{2})(Z|[+-]\d{2}:\d{2})?$").unwrap()
});
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

/// Built-in XML Schema datatypes understood by the validator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    AnySimple,
    String,
    NormalizedString,
    Token,
    AnyUri,
    Boolean,
    Decimal,
    Double,
    Float,
    Integer,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    PositiveInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    Date,
    DateTime,
    Time,
}

impl Builtin {
    pub fn from_name(local: &str) -> Option<Self> {
        Some(match local {
            "anySimpleType" => Builtin::AnySimple,
            "string" => Builtin::String,
            "normalizedString" => Builtin::NormalizedString,
            "token" | "NMTOKEN" | "Name" | "NCName" | "language" | "ID" | "IDREF" => Builtin::Token,
            "anyURI" => Builtin::AnyUri,
            "boolean" => Builtin::Boolean,
            "decimal" => Builtin::Decimal,
            "double" => Builtin::Double,
            "float" => Builtin::Float,
            "integer" => Builtin::Integer,
            "long" => Builtin::Long,
            "int" => Builtin::Int,
            "short" => Builtin::Short,
            "byte" => Builtin::Byte,
            "nonNegativeInteger" => Builtin::NonNegativeInteger,
            "positiveInteger" => Builtin::PositiveInteger,
            "unsignedLong" => Builtin::UnsignedLong,
            "unsignedInt" => Builtin::UnsignedInt,
            "unsignedShort" => Builtin::UnsignedShort,
            "unsignedByte" => Builtin::UnsignedByte,
            "date" => Builtin::Date,
            "dateTime" => Builtin::DateTime,
            "time" => Builtin::Time,
            _ => return None,
        })
    }

    /// Strings keep their whitespace; every other type is collapsed before checking.
    pub fn preserves_whitespace(self) -> bool {
        matches!(
            self,
            Builtin::AnySimple | Builtin::String | Builtin::NormalizedString
        )
    }

    /// Check the lexical form of `raw`.
    pub fn check(self, raw: &str) -> Result<(), String> {
        let v = if self.preserves_whitespace() { raw } else { raw.trim() };
        let ok = match self {
            Builtin::AnySimple | Builtin::String | Builtin::NormalizedString | Builtin::Token => {
                true
            }
            Builtin::AnyUri => !v.contains(char::is_whitespace),
            Builtin::Boolean => matches!(v, "true" | "false" | "1" | "0"),
            Builtin::Decimal => DECIMAL_RE.is_match(v),
            Builtin::Double | Builtin::Float => {
                matches!(v, "INF" | "-INF" | "NaN")
                    || (!v.is_empty()
                        && !v.eq_ignore_ascii_case("inf")
                        && !v.eq_ignore_ascii_case("nan")
                        && !v.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
                        && v.parse::<f64>().is_ok())
            }
            Builtin::Integer => INTEGER_RE.is_match(v),
            Builtin::Long => INTEGER_RE.is_match(v) && v.parse::<i64>().is_ok(),
            Builtin::Int => INTEGER_RE.is_match(v) && v.parse::<i32>().is_ok(),
            Builtin::Short => INTEGER_RE.is_match(v) && v.parse::<i16>().is_ok(),
            Builtin::Byte => INTEGER_RE.is_match(v) && v.parse::<i8>().is_ok(),
            Builtin::NonNegativeInteger => {
                INTEGER_RE.is_match(v) && (!v.starts_with('-') || v[1..].bytes().all(|b| b == b'0'))
            }
            Builtin::PositiveInteger => {
                INTEGER_RE.is_match(v)
                    && !v.starts_with('-')
                    && v.trim_start_matches('+').bytes().any(|b| b != b'0')
            }
            Builtin::UnsignedLong => unsigned(v).is_some_and(|s| s.parse::<u64>().is_ok()),
            Builtin::UnsignedInt => unsigned(v).is_some_and(|s| s.parse::<u32>().is_ok()),
            Builtin::UnsignedShort => unsigned(v).is_some_and(|s| s.parse::<u16>().is_ok()),
            Builtin::UnsignedByte => unsigned(v).is_some_and(|s| s.parse::<u8>().is_ok()),
            Builtin::Date => is_date(v),
            Builtin::DateTime => match v.split_once('T') {
                Some((d, t)) => {
                    let (t, tz) = split_tz(t);
                    is_date(d) && TIME_RE.is_match(t) && tz_ok(tz)
                }
                None => false,
            },
            Builtin::Time => TIME_RE.is_match(v),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{v:?} is not a valid {}", self.name()))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::AnySimple => "anySimpleType",
            Builtin::String => "string",
            Builtin::NormalizedString => "normalizedString",
            Builtin::Token => "token",
            Builtin::AnyUri => "anyURI",
            Builtin::Boolean => "boolean",
            Builtin::Decimal => "decimal",
            Builtin::Double => "double",
            Builtin::Float => "float",
            Builtin::Integer => "integer",
            Builtin::Long => "long",
            Builtin::Int => "int",
            Builtin::Short => "short",
            Builtin::Byte => "byte",
            Builtin::NonNegativeInteger => "nonNegativeInteger",
            Builtin::PositiveInteger => "positiveInteger",
            Builtin::UnsignedLong => "unsignedLong",
            Builtin::UnsignedInt => "unsignedInt",
            Builtin::UnsignedShort => "unsignedShort",
            Builtin::UnsignedByte => "unsignedByte",
            Builtin::Date => "date",
            Builtin::DateTime => "dateTime",
            Builtin::Time => "time",
        }
    }
}

fn unsigned(v: &str) -> Option<&str> {
    if !INTEGER_RE.is_match(v) || v.starts_with('-') {
        return None;
    }
    Some(v.trim_start_matches('+'))
}

fn is_date(v: &str) -> bool {
    let Some(c) = DATE_RE.captures(v) else {
        return false;
    };
    let (Ok(y), Ok(m), Ok(d)) = (c[1].parse::<i32>(), c[2].parse::<u8>(), c[3].parse::<u8>())
    else {
        return false;
    };
    Month::try_from(m)
        .ok()
        .and_then(|m| Date::from_calendar_date(y, m, d).ok())
        .is_some()
}

/// Split a trailing `Z` / `+hh:mm` / `-hh:mm` zone off a time.
fn split_tz(t: &str) -> (&str, &str) {
    if let Some(s) = t.strip_suffix('Z') {
        return (s, "Z");
    }
    if t.len() > 6 && t.is_char_boundary(t.len() - 6) {
        let (head, tail) = t.split_at(t.len() - 6);
        if tail.starts_with(['+', '-']) && tail.as_bytes()[3] == b':' {
            return (head, tail);
        }
    }
    (t, "")
}

fn tz_ok(tz: &str) -> bool {
    tz.is_empty()
        || tz == "Z"
        || (tz.len() == 6
            && tz.as_bytes()[1..3].iter().all(u8::is_ascii_digit)
            && tz.as_bytes()[4..].iter().all(u8::is_ascii_digit))
}
