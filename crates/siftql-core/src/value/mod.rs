//! Module: value
//! Responsibility: runtime operands and their comparison semantics.
//! Does not own: field resolution, pattern compilation, or function dispatch.
//! Boundary: the predicate interpreter delegates every equality, ordering,
//! truthiness and text-conversion decision here.
//!
//! Semantics follow the loose scripting rules end users expect from a search
//! box: `1 == "1"` holds, `null == undefined` holds, and distinct containers
//! are never equal to each other.


use serde_json::{Map, Number, Value as JsonValue};
use std::{borrow::Cow, cmp::Ordering};

///
/// TextMode
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum TextMode {
    Cs, // case-sensitive
    #[default]
    Ci, // case-insensitive
}

///
/// Operand
///
/// One evaluated expression value. Record data is borrowed; computed values
/// are owned. `Undefined` is distinct from JSON `null`.
///

#[derive(Clone, Debug)]
pub enum Operand<'r> {
    Undefined,
    Borrowed(&'r JsonValue),
    Owned(JsonValue),
    List(Vec<Operand<'r>>),
}

impl<'r> Operand<'r> {
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::Owned(JsonValue::Bool(value))
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Owned(JsonValue::String(value.into()))
    }

    #[must_use]
    pub fn number(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Owned(JsonValue::Null), |n| {
            Self::Owned(JsonValue::Number(n))
        })
    }

    /// Borrow the underlying JSON value, if this operand is not undefined
    /// and not a computed list.
    #[must_use]
    pub const fn json(&self) -> Option<&JsonValue> {
        match self {
            Self::Borrowed(value) => Some(value),
            Self::Owned(value) => Some(value),
            Self::Undefined | Self::List(_) => None,
        }
    }

    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(
            self,
            Self::Undefined | Self::Borrowed(JsonValue::Null) | Self::Owned(JsonValue::Null)
        )
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(
            self,
            Self::List(_) | Self::Borrowed(JsonValue::Array(_)) | Self::Owned(JsonValue::Array(_))
        )
    }

    /// Borrow the record map when this operand is a borrowed JSON object.
    #[must_use]
    pub const fn as_record(&self) -> Option<&'r Map<String, JsonValue>> {
        match self {
            Self::Borrowed(JsonValue::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Convert into plain JSON; undefined becomes `null`.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        match self {
            Self::Undefined => JsonValue::Null,
            Self::Borrowed(value) => value.clone(),
            Self::Owned(value) => value,
            Self::List(items) => JsonValue::Array(items.into_iter().map(Self::into_json).collect()),
        }
    }

    /// Elements of an array-like operand; `None` for anything else.
    #[must_use]
    pub fn elements(&self) -> Option<Vec<Self>> {
        match self {
            Self::Borrowed(JsonValue::Array(items)) => {
                Some(items.iter().map(Operand::Borrowed).collect())
            }
            Self::Owned(JsonValue::Array(items)) => {
                Some(items.iter().cloned().map(Operand::Owned).collect())
            }
            Self::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// One optional-chaining step. Missing or non-container values yield
    /// `Undefined` instead of failing.
    #[must_use]
    pub fn member(self, segment: &str) -> Self {
        match self {
            Self::Undefined => Self::Undefined,
            Self::Borrowed(value) => borrowed_member(value, segment),
            Self::Owned(value) => match borrowed_member(&value, segment) {
                Operand::Borrowed(child) => Self::Owned(child.clone()),
                Operand::Owned(child) => Self::Owned(child),
                _ => Self::Undefined,
            },
            Self::List(items) => list_member(items, segment),
        }
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined => false,
            Self::List(_) => true,
            Self::Borrowed(value) => json_truthy(value),
            Self::Owned(value) => json_truthy(value),
        }
    }

    /// Text form used by pattern tests and string coercion.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Borrowed(value) => json_to_text(value),
            Self::Owned(value) => json_to_text(value),
            Self::List(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_text()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn to_primitive(&self) -> Primitive<'_> {
        match self {
            Self::Undefined => Primitive::Undefined,
            Self::List(_) => Primitive::Text(Cow::Owned(self.to_text())),
            Self::Borrowed(value) => json_primitive(value),
            Self::Owned(value) => json_primitive(value),
        }
    }

    // Containers compare by identity only.
    fn same_container(&self, other: &Self) -> bool {
        match (self.json(), other.json()) {
            (Some(left), Some(right)) => {
                is_container(left) && is_container(right) && std::ptr::eq(left, right)
            }
            _ => false,
        }
    }

    const fn is_container(&self) -> bool {
        match self {
            Self::List(_) => true,
            Self::Borrowed(value) => is_container(value),
            Self::Owned(value) => is_container(value),
            Self::Undefined => false,
        }
    }
}

///
/// Primitive
///
/// Scalar form of an operand used by the coercion rules.
///

#[derive(Debug)]
enum Primitive<'a> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Cow<'a, str>),
}

impl Primitive<'_> {
    fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Text(text) => text_to_number(text),
        }
    }
}

///
/// EQUALITY
///

/// Loose (`==`) equality.
#[must_use]
pub fn loose_eq(left: &Operand<'_>, right: &Operand<'_>) -> bool {
    if left.is_nullish() || right.is_nullish() {
        return left.is_nullish() && right.is_nullish();
    }
    if left.is_container() && right.is_container() {
        return left.same_container(right);
    }

    loose_eq_primitive(&left.to_primitive(), &right.to_primitive())
}

fn loose_eq_primitive(left: &Primitive<'_>, right: &Primitive<'_>) -> bool {
    match (left, right) {
        (Primitive::Number(a), Primitive::Number(b)) => a == b,
        (Primitive::Text(a), Primitive::Text(b)) => a == b,
        (Primitive::Bool(a), Primitive::Bool(b)) => a == b,
        (Primitive::Bool(b), other) | (other, Primitive::Bool(b)) => {
            loose_eq_primitive(&Primitive::Number(f64::from(u8::from(*b))), other)
        }
        (Primitive::Number(n), Primitive::Text(text))
        | (Primitive::Text(text), Primitive::Number(n)) => *n == text_to_number(text),
        _ => false,
    }
}

/// Strict (`===`) equality.
#[must_use]
pub fn strict_eq(left: &Operand<'_>, right: &Operand<'_>) -> bool {
    same_value(left, right, false)
}

/// Membership equality: strict, except that `NaN` matches `NaN`.
#[must_use]
pub fn same_value_zero(left: &Operand<'_>, right: &Operand<'_>) -> bool {
    same_value(left, right, true)
}

fn same_value(left: &Operand<'_>, right: &Operand<'_>, nan_equal: bool) -> bool {
    if left.is_undefined() || right.is_undefined() {
        return left.is_undefined() && right.is_undefined();
    }
    if left.is_container() || right.is_container() {
        return left.same_container(right);
    }

    match (left.to_primitive(), right.to_primitive()) {
        (Primitive::Null, Primitive::Null) => true,
        (Primitive::Bool(a), Primitive::Bool(b)) => a == b,
        (Primitive::Text(a), Primitive::Text(b)) => a == b,
        (Primitive::Number(a), Primitive::Number(b)) => a == b || (nan_equal && a.is_nan() && b.is_nan()),
        _ => false,
    }
}

///
/// ORDERING
///

/// Relational ordering; `None` when the operands are incomparable (`NaN`).
#[must_use]
pub fn compare_order(left: &Operand<'_>, right: &Operand<'_>) -> Option<Ordering> {
    let (left, right) = (left.to_primitive(), right.to_primitive());

    if let (Primitive::Text(a), Primitive::Text(b)) = (&left, &right) {
        return Some(a.encode_utf16().cmp(b.encode_utf16()));
    }

    left.to_number().partial_cmp(&right.to_number())
}

///
/// TEXT / NUMBER CONVERSION
///

/// Parse a numeric literal the way a scripting runtime does; `None` when the
/// text is not a number. Empty text is not a literal.
#[must_use]
pub fn parse_number_literal(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let radix = |digits: &str, radix: u32| {
        u64::from_str_radix(digits, radix)
            .ok()
            .map(|n| n as f64)
    };
    let lower = text.get(..2).map(str::to_ascii_lowercase);
    match lower.as_deref() {
        Some("0x") => return radix(&text[2..], 16),
        Some("0o") => return radix(&text[2..], 8),
        Some("0b") => return radix(&text[2..], 2),
        _ => {}
    }

    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned == "Infinity" {
        return Some(if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    if !is_decimal_literal(unsigned) {
        return None;
    }

    text.parse::<f64>().ok()
}

// digits with optional fraction and exponent, or a leading-dot fraction
fn is_decimal_literal(text: &str) -> bool {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(at) => (&text[..at], Some(&text[at + 1..])),
        None => (text, None),
    };

    let mut parts = mantissa.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    let mantissa_ok = match fraction {
        Some(fraction) => {
            all_digits(whole) && all_digits(fraction) && !(whole.is_empty() && fraction.is_empty())
        }
        None => !whole.is_empty() && all_digits(whole),
    };
    let exponent_ok = exponent.is_none_or(|exp| {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        !digits.is_empty() && all_digits(digits)
    });

    mantissa_ok && exponent_ok
}

/// String-to-number coercion: blank text is zero, garbage is `NaN`.
#[must_use]
pub fn text_to_number(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    parse_number_literal(text).unwrap_or(f64::NAN)
}

/// Render a number the way it prints in query sources.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        return format!("{value:.0}");
    }

    value.to_string()
}

fn json_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

fn json_to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                if item.is_null() {
                    String::new()
                } else {
                    json_to_text(item)
                }
            })
            .collect::<Vec<_>>()
            .join(","),
        JsonValue::Object(_) => "[object Object]".to_string(),
    }
}

fn json_primitive(value: &JsonValue) -> Primitive<'_> {
    match value {
        JsonValue::Null => Primitive::Null,
        JsonValue::Bool(b) => Primitive::Bool(*b),
        JsonValue::Number(n) => Primitive::Number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Primitive::Text(Cow::Borrowed(s)),
        JsonValue::Array(_) | JsonValue::Object(_) => Primitive::Text(Cow::Owned(json_to_text(value))),
    }
}

const fn is_container(value: &JsonValue) -> bool {
    matches!(value, JsonValue::Array(_) | JsonValue::Object(_))
}

fn borrowed_member<'r>(value: &'r JsonValue, segment: &str) -> Operand<'r> {
    match value {
        JsonValue::Object(map) => map.get(segment).map_or(Operand::Undefined, Operand::Borrowed),
        JsonValue::Array(items) => {
            if segment == "length" {
                return Operand::number(items.len() as f64);
            }
            segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .map_or(Operand::Undefined, Operand::Borrowed)
        }
        JsonValue::String(text) => {
            if segment == "length" {
                return Operand::number(text.encode_utf16().count() as f64);
            }
            segment
                .parse::<usize>()
                .ok()
                .and_then(|index| text.chars().nth(index))
                .map_or(Operand::Undefined, |c| Operand::text(c.to_string()))
        }
        _ => Operand::Undefined,
    }
}

fn list_member<'r>(mut items: Vec<Operand<'r>>, segment: &str) -> Operand<'r> {
    if segment == "length" {
        return Operand::number(items.len() as f64);
    }

    match segment.parse::<usize>() {
        Ok(index) if index < items.len() => items.swap_remove(index),
        _ => Operand::Undefined,
    }
}
