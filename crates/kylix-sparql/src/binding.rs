use std::collections::HashMap;

/// A row of bound values. Always carries the canonical `"s"`, `"p"`,
/// `"o"` keys from whichever pattern most recently contributed to it,
/// plus `"timestamp"`/`"validator"` metadata and any user-named
/// variables bound along the way (spec.md §4.7 step 1).
pub type Binding = HashMap<String, String>;

use crate::ast::{FilterExpr, FilterOp, FilterValue};

fn both_numeric(a: &str, b: &str) -> Option<(f64, f64)> {
    let x: f64 = a.parse().ok()?;
    let y: f64 = b.parse().ok()?;
    Some((x, y))
}

/// Evaluate a filter predicate against a binding (spec.md §4.7 step 6).
/// A missing variable makes the filter false.
pub fn apply_filter(binding: &Binding, filter: &FilterExpr) -> bool {
    let Some(actual) = binding.get(&filter.variable) else {
        return false;
    };
    let expected = filter.value.as_comparable_string();
    match filter.op {
        FilterOp::Eq => match both_numeric(actual, &expected) {
            Some((a, b)) => a == b,
            None => *actual == expected,
        },
        FilterOp::Ne => match both_numeric(actual, &expected) {
            Some((a, b)) => a != b,
            None => *actual != expected,
        },
        FilterOp::Gt => match both_numeric(actual, &expected) {
            Some((a, b)) => a > b,
            None => actual.as_str() > expected.as_str(),
        },
        FilterOp::Lt => match both_numeric(actual, &expected) {
            Some((a, b)) => a < b,
            None => actual.as_str() < expected.as_str(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(pairs: &[(&str, &str)]) -> Binding {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn eq_compares_numeric_strings_numerically() {
        let b = binding(&[("n", "007")]);
        let f = FilterExpr {
            op: FilterOp::Eq,
            variable: "n".into(),
            value: FilterValue::Int(7),
        };
        assert!(apply_filter(&b, &f));
    }

    #[test]
    fn missing_variable_is_false() {
        let b = binding(&[]);
        let f = FilterExpr {
            op: FilterOp::Eq,
            variable: "n".into(),
            value: FilterValue::Int(7),
        };
        assert!(!apply_filter(&b, &f));
    }

    #[test]
    fn gt_falls_back_to_lexicographic_for_non_numeric() {
        let b = binding(&[("s", "banana")]);
        let f = FilterExpr {
            op: FilterOp::Gt,
            variable: "s".into(),
            value: FilterValue::Str("apple".into()),
        };
        assert!(apply_filter(&b, &f));
    }
}
