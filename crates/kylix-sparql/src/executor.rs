use std::collections::HashMap;

use kylix_core::KylixError;
use kylix_dag::{DagStore, Pattern as StorePattern};

use crate::ast::{AggregateFn, FilterExpr, Plan, SortDirection, Term, TriplePattern};
use crate::binding::{apply_filter, Binding};
use crate::mapper::project;

fn term_pattern_value(term: &Term) -> Option<String> {
    match term {
        Term::Concrete(v) => Some(v.clone()),
        Term::Variable(_) => None,
    }
}

/// The always-present, row-describing fields of a binding. Prefixed so they
/// never collide with a user's own `?s`/`?p`/`?o` pattern variables, which
/// are extremely common in practice (spec.md §4.6 examples use exactly
/// those names).
pub(crate) const CANONICAL_SUBJECT: &str = "__subject";
pub(crate) const CANONICAL_PREDICATE: &str = "__predicate";
pub(crate) const CANONICAL_OBJECT: &str = "__object";
const CANONICAL_TIMESTAMP: &str = "__timestamp";
const CANONICAL_VALIDATOR: &str = "__validator";

fn probe(store: &mut dyn DagStore, pattern: &TriplePattern) -> Result<Vec<Binding>, KylixError> {
    let store_pattern = StorePattern::new(
        term_pattern_value(&pattern.subject),
        term_pattern_value(&pattern.predicate),
        term_pattern_value(&pattern.object),
    );
    let rows = store.query(&store_pattern)?;
    let mut out = Vec::with_capacity(rows.len());
    for (_id, node, _edges) in rows {
        let mut binding = Binding::new();
        binding.insert(CANONICAL_SUBJECT.to_string(), node.subject.clone());
        binding.insert(CANONICAL_PREDICATE.to_string(), node.predicate.clone());
        binding.insert(CANONICAL_OBJECT.to_string(), node.object.clone());
        binding.insert(CANONICAL_TIMESTAMP.to_string(), node.timestamp.to_rfc3339());
        binding.insert(CANONICAL_VALIDATOR.to_string(), node.validator.clone());
        if let Term::Variable(v) = &pattern.subject {
            binding.insert(v.clone(), node.subject.clone());
        }
        if let Term::Variable(v) = &pattern.predicate {
            binding.insert(v.clone(), node.predicate.clone());
        }
        if let Term::Variable(v) = &pattern.object {
            binding.insert(v.clone(), node.object.clone());
        }
        out.push(binding);
    }
    Ok(out)
}

/// Two bindings are compatible iff they agree on every variable both
/// define (spec.md §4.7 step 2). The canonical per-row bookkeeping keys
/// are excluded since each pattern is expected to overwrite them with its
/// own resolved triple rather than join on them.
fn compatible(a: &Binding, b: &Binding) -> bool {
    const RESERVED: [&str; 5] = [
        CANONICAL_SUBJECT,
        CANONICAL_PREDICATE,
        CANONICAL_OBJECT,
        CANONICAL_TIMESTAMP,
        CANONICAL_VALIDATOR,
    ];
    a.iter()
        .filter(|(k, _)| !RESERVED.contains(&k.as_str()))
        .all(|(k, v)| b.get(k).map_or(true, |bv| bv == v))
}

fn merge(a: &Binding, b: &Binding) -> Binding {
    let mut out = a.clone();
    for (k, v) in b {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Runs the seed + natural-join pipeline (spec.md §4.7 steps 1-2) over a
/// list of patterns, independent of any outer context. Used both for the
/// top-level pattern list and for each UNION branch.
fn evaluate_patterns(
    store: &mut dyn DagStore,
    patterns: &[TriplePattern],
) -> Result<Vec<Binding>, KylixError> {
    let mut patterns_iter = patterns.iter();
    let Some(first) = patterns_iter.next() else {
        return Ok(Vec::new());
    };
    let mut bindings = probe(store, first)?;
    for pattern in patterns_iter {
        let candidates = probe(store, pattern)?;
        let mut joined = Vec::new();
        for existing in &bindings {
            for candidate in &candidates {
                if compatible(existing, candidate) {
                    joined.push(merge(existing, candidate));
                }
            }
        }
        bindings = joined;
    }
    Ok(bindings)
}

/// Left-outer-join each current binding against the optional pattern's
/// candidates (spec.md §4.7 step 4).
fn apply_optional(
    store: &mut dyn DagStore,
    bindings: Vec<Binding>,
    optional: &TriplePattern,
) -> Result<Vec<Binding>, KylixError> {
    let candidates = probe(store, optional)?;
    let mut out = Vec::new();
    for existing in bindings {
        let matches: Vec<Binding> = candidates
            .iter()
            .filter(|c| compatible(&existing, c))
            .map(|c| merge(&existing, c))
            .collect();
        if matches.is_empty() {
            out.push(existing);
        } else {
            out.extend(matches);
        }
    }
    Ok(out)
}

fn numeric(s: &str) -> Option<f64> {
    s.parse().ok()
}

fn run_aggregate(func: AggregateFn, variable: Option<&str>, group: &[Binding]) -> String {
    match func {
        AggregateFn::Count => match variable {
            None => group.len().to_string(),
            Some(v) => group.iter().filter(|b| b.contains_key(v)).count().to_string(),
        },
        AggregateFn::Sum => {
            let sum: f64 = variable
                .map(|v| group.iter().filter_map(|b| b.get(v)).filter_map(|s| numeric(s)).sum())
                .unwrap_or(0.0);
            sum.to_string()
        }
        AggregateFn::Avg => {
            let values: Vec<f64> = variable
                .map(|v| group.iter().filter_map(|b| b.get(v)).filter_map(|s| numeric(s)).collect())
                .unwrap_or_default();
            if values.is_empty() {
                "0".to_string()
            } else {
                (values.iter().sum::<f64>() / values.len() as f64).to_string()
            }
        }
        AggregateFn::Min | AggregateFn::Max => {
            let raw: Vec<&str> = variable
                .map(|v| group.iter().filter_map(|b| b.get(v).map(|s| s.as_str())).collect())
                .unwrap_or_default();
            let numeric_values: Vec<f64> = raw.iter().filter_map(|s| numeric(s)).collect();
            if numeric_values.len() == raw.len() && !numeric_values.is_empty() {
                let pick = if func == AggregateFn::Min {
                    numeric_values.iter().cloned().fold(f64::INFINITY, f64::min)
                } else {
                    numeric_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
                };
                pick.to_string()
            } else if let Some(pick) = if func == AggregateFn::Min {
                raw.iter().min()
            } else {
                raw.iter().max()
            } {
                pick.to_string()
            } else {
                String::new()
            }
        }
        AggregateFn::GroupConcat => variable
            .map(|v| {
                group
                    .iter()
                    .filter_map(|b| b.get(v))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default(),
    }
}

fn group_bindings(bindings: &[Binding], group_by: &[String]) -> Vec<(Vec<Option<String>>, Vec<Binding>)> {
    let mut order: Vec<Vec<Option<String>>> = Vec::new();
    let mut groups: HashMap<Vec<Option<String>>, Vec<Binding>> = HashMap::new();
    for b in bindings {
        let key: Vec<Option<String>> = group_by.iter().map(|v| b.get(v).cloned()).collect();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(b.clone());
    }
    order
        .into_iter()
        .map(|key| {
            let members = groups.remove(&key).unwrap_or_default();
            (key, members)
        })
        .collect()
}

fn aggregate(bindings: Vec<Binding>, plan: &Plan) -> Vec<Binding> {
    let grouped = group_bindings(&bindings, &plan.group_by);
    grouped
        .into_iter()
        .map(|(key, members)| {
            let mut out = Binding::new();
            for (var, value) in plan.group_by.iter().zip(key.into_iter()) {
                if let Some(v) = value {
                    out.insert(var.clone(), v);
                }
            }
            for spec in &plan.aggregates {
                let value = run_aggregate(spec.func, spec.variable.as_deref(), &members);
                out.insert(spec.alias.clone(), value);
            }
            out
        })
        .collect()
}

fn order(bindings: &mut [Binding], plan: &Plan) {
    if plan.order_by.is_empty() {
        return;
    }
    bindings.sort_by(|a, b| {
        for key in &plan.order_by {
            let av = a.get(&key.variable);
            let bv = b.get(&key.variable);
            let ord = match (av, bv) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(x), Some(y)) => match (numeric(x), numeric(y)) {
                    (Some(xn), Some(yn)) => xn.partial_cmp(&yn).unwrap_or(std::cmp::Ordering::Equal),
                    _ => x.cmp(y),
                },
            };
            let ord = if key.direction == SortDirection::Desc {
                ord.reverse()
            } else {
                ord
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Executes a parsed plan against the DAG store (spec.md §4.7). Each row
/// of the result is the projected map C8 produces for one binding.
pub fn execute(
    store: &mut dyn DagStore,
    plan: &Plan,
) -> Result<Vec<HashMap<String, Option<String>>>, KylixError> {
    let mut bindings = evaluate_patterns(store, &plan.patterns)?;

    for branch in &plan.unions {
        let branch_bindings = evaluate_patterns(store, branch)?;
        bindings.extend(branch_bindings);
    }

    for optional in &plan.optionals {
        bindings = apply_optional(store, bindings, optional)?;
    }

    let pre_aggregate_filters: &[FilterExpr] = &plan.filters;
    bindings.retain(|b| pre_aggregate_filters.iter().all(|f| apply_filter(b, f)));

    let mut bindings = if plan.has_aggregates {
        let aggregated = aggregate(bindings, plan);
        let mut aggregated = aggregated;
        aggregated.retain(|b| plan.having.iter().all(|f| apply_filter(b, f)));
        aggregated
    } else {
        bindings
    };

    order(&mut bindings, plan);

    let offset = plan.offset.unwrap_or(0);
    let bindings: Vec<Binding> = bindings.into_iter().skip(offset).collect();
    let bindings = match plan.limit {
        Some(limit) => bindings.into_iter().take(limit).collect(),
        None => bindings,
    };

    Ok(bindings.iter().map(|b| project(b, plan)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kylix_core::TransactionId;
    use kylix_dag::{Edge, MemoryDagStore, TransactionNode};

    fn node(s: &str, p: &str, o: &str) -> TransactionNode {
        TransactionNode {
            subject: s.into(),
            predicate: p.into(),
            object: o.into(),
            validator: "v1".into(),
            timestamp: chrono::Utc::now(),
            signature: vec![],
            hash: format!("{s}{p}{o}"),
        }
    }

    fn seeded_store() -> MemoryDagStore {
        let mut store = MemoryDagStore::new();
        store
            .add_node(TransactionId::new(0), node("entity:e1", "wasGeneratedBy", "activity:a1"))
            .unwrap();
        store
            .add_node(TransactionId::new(1), node("entity:e1", "wasAttributedTo", "agent:alice"))
            .unwrap();
        store
            .add_node(TransactionId::new(2), node("entity:e2", "wasGeneratedBy", "activity:a1"))
            .unwrap();
        store
            .add_edge(Edge::confirms(TransactionId::new(0), TransactionId::new(1)))
            .unwrap();
        store
    }

    #[test]
    fn simple_select_returns_matching_rows() {
        let mut store = seeded_store();
        let plan = crate::parser::parse("SELECT ?s WHERE { ?s wasGeneratedBy activity:a1 }").unwrap();
        let rows = execute(&mut store, &plan).unwrap();
        let mut subjects: Vec<String> = rows
            .iter()
            .filter_map(|r| r.get("s").cloned().flatten())
            .collect();
        subjects.sort();
        assert_eq!(subjects, vec!["entity:e1".to_string(), "entity:e2".to_string()]);
    }

    #[test]
    fn join_across_two_patterns_on_shared_variable() {
        let mut store = seeded_store();
        let plan = crate::parser::parse(
            "SELECT ?s ?agent WHERE { ?s wasGeneratedBy activity:a1 . ?s wasAttributedTo ?agent }",
        )
        .unwrap();
        let rows = execute(&mut store, &plan).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("s").cloned().flatten(), Some("entity:e1".to_string()));
        assert_eq!(
            rows[0].get("agent").cloned().flatten(),
            Some("agent:alice".to_string())
        );
    }

    #[test]
    fn provo_role_projection_resolves_entity_and_activity() {
        let mut store = seeded_store();
        let plan = crate::parser::parse("SELECT ?entity ?activity WHERE { ?s wasGeneratedBy ?o }").unwrap();
        let rows = execute(&mut store, &plan).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .any(|r| r.get("entity").cloned().flatten() == Some("entity:e1".to_string())));
        assert!(rows
            .iter()
            .all(|r| r.get("activity").cloned().flatten() == Some("activity:a1".to_string())));
    }

    #[test]
    fn optional_keeps_outer_row_when_no_match() {
        let mut store = seeded_store();
        let plan = crate::parser::parse(
            "SELECT ?s ?agent WHERE { ?s wasGeneratedBy activity:a1 . OPTIONAL { ?s wasAttributedTo ?agent } }",
        )
        .unwrap();
        let rows = execute(&mut store, &plan).unwrap();
        assert_eq!(rows.len(), 2);
        let e2_row = rows
            .iter()
            .find(|r| r.get("s").cloned().flatten() == Some("entity:e2".to_string()))
            .unwrap();
        assert_eq!(e2_row.get("agent").cloned().flatten(), None);
    }

    #[test]
    fn limit_and_offset_restrict_the_result_window() {
        let mut store = seeded_store();
        let plan = crate::parser::parse("SELECT ?s WHERE { ?s wasGeneratedBy activity:a1 } ORDER BY ?s LIMIT 1 OFFSET 1").unwrap();
        let rows = execute(&mut store, &plan).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("s").cloned().flatten(), Some("entity:e2".to_string()));
    }

    #[test]
    fn count_aggregate_groups_by_predicate() {
        let mut store = seeded_store();
        let plan = crate::parser::parse(
            "SELECT ?p (COUNT(?s) AS ?total) WHERE { ?s ?p ?o } GROUP BY ?p",
        )
        .unwrap();
        let rows = execute(&mut store, &plan).unwrap();
        let generated = rows
            .iter()
            .find(|r| r.get("p").cloned().flatten() == Some("wasGeneratedBy".to_string()))
            .unwrap();
        assert_eq!(generated.get("total").cloned().flatten(), Some("2".to_string()));
    }
}
