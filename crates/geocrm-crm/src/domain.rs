//! Typed search filters, serialized to the CRM's prefix-notation domain.
//!
//! `Domain::Or(vec![a, b, c])` becomes `["|", "|", a, b, c]`: an n-ary
//! combinator emits n-1 operator markers followed by its operands.

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    In,
    ILike,
    Gt,
}

impl Operator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::In => "in",
            Operator::ILike => "ilike",
            Operator::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Leaf {
        field: String,
        op: Operator,
        value: Value,
    },
    And(Vec<Domain>),
    Or(Vec<Domain>),
}

impl Domain {
    #[must_use]
    pub fn leaf(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Domain::Leaf {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Eq, value)
    }

    #[must_use]
    pub fn is_in<S: AsRef<str>>(field: impl Into<String>, values: &[S]) -> Self {
        let values: Vec<Value> = values.iter().map(|v| json!(v.as_ref())).collect();
        Self::leaf(field, Operator::In, Value::Array(values))
    }

    #[must_use]
    pub fn ilike(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::ILike, value)
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Gt, value)
    }

    /// The domain as the JSON term list sent over the wire. An empty `And`
    /// serializes to `[]`, which the CRM reads as "match everything".
    #[must_use]
    pub fn to_terms(&self) -> Value {
        let mut terms = Vec::new();
        self.push_terms(&mut terms);
        Value::Array(terms)
    }

    fn push_terms(&self, out: &mut Vec<Value>) {
        match self {
            Domain::Leaf { field, op, value } => {
                out.push(json!([field, op.as_str(), value]));
            }
            Domain::And(children) => Self::push_nary("&", children, out),
            Domain::Or(children) => Self::push_nary("|", children, out),
        }
    }

    fn push_nary(marker: &str, children: &[Domain], out: &mut Vec<Value>) {
        for _ in 1..children.len() {
            out.push(Value::String(marker.to_string()));
        }
        for child in children {
            child.push_terms(out);
        }
    }
}
