use itertools::{EitherOrBoth, Itertools};
use std::cmp::Ordering;

use crate::value::Value;

/// Evaluates the deep ordering of `lhs` and `rhs`, establishing a total
/// order over values. Arrays and objects compare lexicographically, with
/// objects pairing entries in their insertion order (key first, then
/// value). Ints and floats compare numerically with one another; across
/// types the rank is Null < Bool < number < String < Array < Object.
pub fn compare<'l, 'r>(lhs: &Value<'l>, rhs: &Value<'r>) -> Ordering {
    match (lhs, rhs) {
        (Value::Null(_), Value::Null(_)) => Ordering::Equal,
        (Value::Bool(lhs, _), Value::Bool(rhs, _)) => lhs.cmp(rhs),
        (Value::Int(lhs, _), Value::Int(rhs, _)) => lhs.cmp(rhs),
        (Value::Float(lhs, _), Value::Float(rhs, _)) => lhs.total_cmp(rhs),
        (Value::Int(lhs, _), Value::Float(rhs, _)) => (*lhs as f64).total_cmp(rhs),
        (Value::Float(lhs, _), Value::Int(rhs, _)) => lhs.total_cmp(&(*rhs as f64)),
        (Value::String(lhs), Value::String(rhs)) => lhs.compare(rhs),
        (Value::Array(lhs), Value::Array(rhs)) => lhs
            .iter()
            .zip_longest(rhs.iter())
            .map(|eob| match eob {
                EitherOrBoth::Both(lhs, rhs) => compare(lhs, rhs),
                EitherOrBoth::Right(_) => Ordering::Less,
                EitherOrBoth::Left(_) => Ordering::Greater,
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
        (Value::Object(lhs), Value::Object(rhs)) => lhs
            .iter()
            .zip_longest(rhs.iter())
            .map(|eob| match eob {
                EitherOrBoth::Both(lhs, rhs) => match lhs.key().compare(rhs.key()) {
                    Ordering::Equal => compare(lhs.value(), rhs.value()),
                    ord => ord,
                },
                EitherOrBoth::Right(_) => Ordering::Less,
                EitherOrBoth::Left(_) => Ordering::Greater,
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal),

        // Types are not equal; order by rank.
        (Value::Null(_), _) => Ordering::Less,
        (_, Value::Null(_)) => Ordering::Greater,
        (Value::Bool(..), _) => Ordering::Less,
        (_, Value::Bool(..)) => Ordering::Greater,
        (Value::Int(..) | Value::Float(..), _) => Ordering::Less,
        (_, Value::Int(..) | Value::Float(..)) => Ordering::Greater,
        (Value::String(_), _) => Ordering::Less,
        (_, Value::String(_)) => Ordering::Greater,
        (Value::Array(_), _) => Ordering::Less,
        (_, Value::Array(_)) => Ordering::Greater,
    }
}

impl<'l, 'r> PartialEq<Value<'r>> for Value<'l> {
    fn eq(&self, other: &Value<'r>) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl<'l, 'r> PartialOrd<Value<'r>> for Value<'l> {
    fn partial_cmp(&self, other: &Value<'r>) -> Option<Ordering> {
        Some(compare(self, other))
    }
}
