use kylix_core::KylixError;

use crate::ast::{
    AggregateFn, AggregateSpec, FilterExpr, FilterOp, FilterValue, OrderKey, Plan, SortDirection,
    Term, TriplePattern,
};

fn parse_err(msg: impl Into<String>) -> KylixError {
    KylixError::ParseError(msg.into())
}

/// Case-insensitive search for `kw` as a whole word in `s`, returning the
/// byte offset of its first character.
fn find_keyword(s: &str, kw: &str) -> Option<usize> {
    let lower = s.to_lowercase();
    let kw_lower = kw.to_lowercase();
    let mut start = 0;
    while let Some(pos) = lower[start..].find(&kw_lower) {
        let abs = start + pos;
        let before_ok = abs == 0 || !lower.as_bytes()[abs - 1].is_ascii_alphanumeric();
        let after = abs + kw_lower.len();
        let after_ok = after >= lower.len() || !lower.as_bytes()[after].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(abs);
        }
        start = abs + 1;
    }
    None
}

/// Split `s` on `delim`, but only where paren/brace/bracket depth is zero
/// and we are not inside a double-quoted string. Used both for the `.`
/// separated triple patterns in a `WHERE` block and for whitespace
/// splitting inside a single pattern.
fn split_top_level(s: &str, delim: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '{' | '(' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            '}' | ')' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            c if c == delim && depth == 0 && !in_quotes => {
                out.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

fn parse_term(token: &str) -> Term {
    let token = token.trim();
    if let Some(rest) = token.strip_prefix('?') {
        Term::Variable(rest.to_string())
    } else if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
        Term::Concrete(token[1..token.len() - 1].to_string())
    } else {
        Term::Concrete(token.to_string())
    }
}

fn parse_triple_pattern(segment: &str) -> Result<TriplePattern, KylixError> {
    let tokens: Vec<String> = split_top_level(segment.trim(), ' ')
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() != 3 {
        return Err(parse_err(format!(
            "expected a triple pattern `s p o`, got `{segment}`"
        )));
    }
    Ok(TriplePattern {
        subject: parse_term(&tokens[0]),
        predicate: parse_term(&tokens[1]),
        object: parse_term(&tokens[2]),
    })
}

fn parse_filter_value(token: &str) -> FilterValue {
    let token = token.trim();
    if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
        FilterValue::Str(token[1..token.len() - 1].to_string())
    } else if let Ok(n) = token.parse::<i64>() {
        FilterValue::Int(n)
    } else if token.eq_ignore_ascii_case("true") {
        FilterValue::Bool(true)
    } else if token.eq_ignore_ascii_case("false") {
        FilterValue::Bool(false)
    } else {
        FilterValue::Str(token.to_string())
    }
}

/// Parses `?var OP value` (the content inside `FILTER(...)` or `HAVING(...)`).
fn parse_filter_expr(body: &str) -> Result<FilterExpr, KylixError> {
    let body = body.trim();
    let (op, op_str) = if body.contains("!=") {
        (FilterOp::Ne, "!=")
    } else if body.contains(">") {
        (FilterOp::Gt, ">")
    } else if body.contains("<") {
        (FilterOp::Lt, "<")
    } else if body.contains('=') {
        (FilterOp::Eq, "=")
    } else {
        return Err(parse_err(format!("unrecognized filter expression `{body}`")));
    };
    let mut parts = body.splitn(2, op_str);
    let lhs = parts
        .next()
        .ok_or_else(|| parse_err("filter missing left-hand side"))?
        .trim();
    let rhs = parts
        .next()
        .ok_or_else(|| parse_err("filter missing right-hand side"))?
        .trim();
    let variable = lhs
        .strip_prefix('?')
        .ok_or_else(|| parse_err(format!("filter left-hand side must be a variable: `{lhs}`")))?
        .to_string();
    Ok(FilterExpr {
        op,
        variable,
        value: parse_filter_value(rhs),
    })
}

fn extract_braced(s: &str, start: usize) -> Result<(String, usize), KylixError> {
    let bytes = s.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return Err(parse_err("expected `{`"));
    }
    let mut depth = 0i32;
    for (i, c) in s[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + i;
                    return Ok((s[start + 1..end].to_string(), end));
                }
            }
            _ => {}
        }
    }
    Err(parse_err("unbalanced `{` in query"))
}

fn extract_parens(s: &str) -> Result<String, KylixError> {
    let open = s.find('(').ok_or_else(|| parse_err("expected `(`"))?;
    let mut depth = 0i32;
    for (i, c) in s[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(s[open + 1..open + i].to_string());
                }
            }
            _ => {}
        }
    }
    Err(parse_err("unbalanced `(` in query"))
}

/// Strips a single fully-enclosing pair of parens, if present. An aggregate
/// expression in the select list (e.g. `(COUNT(?s) AS ?total)`) arrives from
/// [`split_top_level`] as one token because the outer `(` keeps its interior
/// spaces from splitting — this unwraps that outer grouping so the inner
/// `COUNT(?s) AS ?total` can be inspected directly.
fn strip_outer_parens(tok: &str) -> &str {
    if tok.starts_with('(') && tok.ends_with(')') {
        &tok[1..tok.len() - 1]
    } else {
        tok
    }
}

fn parse_select_list(clause: &str) -> (bool, Vec<String>, Vec<AggregateSpec>) {
    let clause = clause.trim();
    if clause == "*" {
        return (true, Vec::new(), Vec::new());
    }
    let tokens = split_top_level(clause, ' ');
    let mut variables = Vec::new();
    let mut aggregates = Vec::new();
    for raw in tokens {
        let tok = raw.trim();
        if tok.is_empty() {
            continue;
        }
        let unwrapped = strip_outer_parens(tok);
        if let Some(func) = aggregate_fn(unwrapped) {
            let inner = extract_parens(unwrapped).unwrap_or_default();
            let variable = inner
                .trim()
                .strip_prefix('?')
                .map(|s| s.to_string())
                .filter(|s| !s.is_empty());
            let mut alias = func_name(func).to_string();
            if let Some(as_pos) = find_keyword(unwrapped, "AS") {
                if let Some(name) = unwrapped[as_pos + 2..].trim().strip_prefix('?') {
                    alias = name.trim().to_string();
                }
            }
            aggregates.push(AggregateSpec { func, variable, alias });
        } else if let Some(var) = tok.strip_prefix('?') {
            variables.push(var.to_string());
        }
    }
    (false, variables, aggregates)
}

fn aggregate_fn(tok: &str) -> Option<AggregateFn> {
    let head = tok.split('(').next().unwrap_or("").to_uppercase();
    match head.as_str() {
        "COUNT" => Some(AggregateFn::Count),
        "SUM" => Some(AggregateFn::Sum),
        "AVG" => Some(AggregateFn::Avg),
        "MIN" => Some(AggregateFn::Min),
        "MAX" => Some(AggregateFn::Max),
        "GROUP_CONCAT" => Some(AggregateFn::GroupConcat),
        _ => None,
    }
}

fn func_name(func: AggregateFn) -> &'static str {
    match func {
        AggregateFn::Count => "count",
        AggregateFn::Sum => "sum",
        AggregateFn::Avg => "avg",
        AggregateFn::Min => "min",
        AggregateFn::Max => "max",
        AggregateFn::GroupConcat => "group_concat",
    }
}

fn parse_where_body(body: &str, plan: &mut Plan) -> Result<(), KylixError> {
    for segment in split_top_level(body, '.') {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }
        let upper_head: String = trimmed.chars().take(12).collect::<String>().to_uppercase();
        if upper_head.starts_with("OPTIONAL") {
            let brace_at = trimmed.find('{').ok_or_else(|| parse_err("OPTIONAL missing `{`"))?;
            let (inner, _) = extract_braced(trimmed, brace_at)?;
            for p in split_top_level(&inner, '.') {
                if !p.trim().is_empty() {
                    plan.optionals.push(parse_triple_pattern(&p)?);
                }
            }
        } else if upper_head.starts_with("FILTER") {
            let inner = extract_parens(trimmed)?;
            plan.filters.push(parse_filter_expr(&inner)?);
        } else if trimmed.starts_with('{') {
            let (left, after_left) = extract_braced(trimmed, 0)?;
            let rest = trimmed[after_left + 1..].trim();
            let rest_upper = rest.to_uppercase();
            if !rest_upper.starts_with("UNION") {
                return Err(parse_err(format!("unexpected block in WHERE: `{trimmed}`")));
            }
            let union_rest = rest[5..].trim();
            let right_brace_at = union_rest
                .find('{')
                .ok_or_else(|| parse_err("UNION missing right-hand `{`"))?;
            let (right, _) = extract_braced(union_rest, right_brace_at)?;
            let left_patterns: Vec<TriplePattern> = split_top_level(&left, '.')
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| parse_triple_pattern(&p))
                .collect::<Result<_, _>>()?;
            let right_patterns: Vec<TriplePattern> = split_top_level(&right, '.')
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| parse_triple_pattern(&p))
                .collect::<Result<_, _>>()?;
            plan.unions.push(left_patterns);
            plan.unions.push(right_patterns);
        } else {
            plan.patterns.push(parse_triple_pattern(trimmed)?);
        }
    }
    Ok(())
}

fn parse_trailer(cursor: &str, plan: &mut Plan) -> Result<(), KylixError> {
    if let Some(pos) = find_keyword(cursor, "GROUP BY") {
        let after = &cursor[pos + "GROUP BY".len()..];
        let stop = next_clause_start(after);
        let list = &after[..stop];
        plan.group_by = split_top_level(list, ' ')
            .into_iter()
            .filter_map(|t| t.trim().strip_prefix('?').map(|s| s.to_string()))
            .collect();
        plan.has_aggregates = true;
    }
    if !plan.aggregates.is_empty() {
        plan.has_aggregates = true;
    }

    if let Some(pos) = find_keyword(cursor, "HAVING") {
        let after = &cursor[pos + "HAVING".len()..];
        let inner = extract_parens(after)?;
        plan.having.push(parse_filter_expr(&inner)?);
    }

    if let Some(pos) = find_keyword(cursor, "ORDER BY") {
        let after = &cursor[pos + "ORDER BY".len()..];
        let stop = next_clause_start(after);
        let list = &after[..stop];
        for tok in split_top_level(list, ' ') {
            let tok = tok.trim();
            if tok.is_empty() {
                continue;
            }
            if let Some(inner) = tok.strip_prefix("ASC(").and_then(|t| t.strip_suffix(')')) {
                plan.order_by.push(OrderKey {
                    variable: inner.trim_start_matches('?').to_string(),
                    direction: SortDirection::Asc,
                });
            } else if let Some(inner) = tok.strip_prefix("DESC(").and_then(|t| t.strip_suffix(')')) {
                plan.order_by.push(OrderKey {
                    variable: inner.trim_start_matches('?').to_string(),
                    direction: SortDirection::Desc,
                });
            } else if let Some(var) = tok.strip_prefix('?') {
                plan.order_by.push(OrderKey {
                    variable: var.to_string(),
                    direction: SortDirection::Asc,
                });
            }
        }
    }

    if let Some(pos) = find_keyword(cursor, "LIMIT") {
        let after = cursor[pos + "LIMIT".len()..].trim_start();
        let num: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        plan.limit = num.parse().ok();
    }

    if let Some(pos) = find_keyword(cursor, "OFFSET") {
        let after = cursor[pos + "OFFSET".len()..].trim_start();
        let num: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        plan.offset = num.parse().ok();
    }

    Ok(())
}

/// Find where the next recognized trailing clause keyword begins, so a
/// clause's variable list doesn't swallow the following clause.
fn next_clause_start(s: &str) -> usize {
    ["HAVING", "ORDER BY", "LIMIT", "OFFSET", "GROUP BY"]
        .iter()
        .filter_map(|kw| find_keyword(s, kw))
        .min()
        .unwrap_or(s.len())
}

/// Parse the accepted SPARQL subset (spec.md §4.6) into a [`Plan`].
pub fn parse(query: &str) -> Result<Plan, KylixError> {
    let select_at = find_keyword(query, "SELECT")
        .ok_or_else(|| parse_err("missing SELECT clause"))?;
    let where_at =
        find_keyword(query, "WHERE").ok_or_else(|| parse_err("missing WHERE clause"))?;
    if where_at <= select_at {
        return Err(parse_err("WHERE must follow SELECT"));
    }

    let select_clause = &query[select_at + "SELECT".len()..where_at];
    let (select_star, variables, aggregates) = parse_select_list(select_clause);

    let brace_at = query[where_at..]
        .find('{')
        .ok_or_else(|| parse_err("WHERE missing `{`"))?
        + where_at;
    let (where_body, brace_end) = extract_braced(query, brace_at)?;

    let mut plan = Plan {
        variables,
        select_star,
        aggregates,
        ..Plan::default()
    };
    parse_where_body(&where_body, &mut plan)?;

    let rest = &query[brace_end + 1..];
    parse_trailer(rest, &mut plan)?;

    // Only the plan's required patterns seed positional fallbacks. A variable
    // that appears solely inside an OPTIONAL must fall through to `null`
    // when that branch doesn't match for a given row, rather than resolving
    // to whatever an unrelated required pattern happens to leave in the
    // same triple position.
    for p in plan.patterns.iter() {
        for (term, pos) in [
            (&p.subject, "s"),
            (&p.predicate, "p"),
            (&p.object, "o"),
        ] {
            if let Term::Variable(v) = term {
                plan.variable_positions.entry(v.clone()).or_insert(pos.to_string());
            }
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_select() {
        let plan = parse(r#"SELECT ?s ?o WHERE { ?s "wasGeneratedBy" ?o }"#).unwrap();
        assert_eq!(plan.patterns.len(), 1);
        assert_eq!(plan.variables, vec!["s", "o"]);
        assert!(!plan.select_star);
    }

    #[test]
    fn parses_select_star() {
        let plan = parse(r#"SELECT * WHERE { ?s ?p ?o }"#).unwrap();
        assert!(plan.select_star);
    }

    #[test]
    fn parses_two_joined_patterns() {
        let plan = parse(
            r#"SELECT ?s WHERE { ?s "wasGeneratedBy" ?a . ?a "wasAssociatedWith" "agent:bob" }"#,
        )
        .unwrap();
        assert_eq!(plan.patterns.len(), 2);
    }

    #[test]
    fn parses_optional_block() {
        let plan = parse(
            r#"SELECT ?s WHERE { ?s "used" ?e . OPTIONAL { ?e "wasAttributedTo" ?a } }"#,
        )
        .unwrap();
        assert_eq!(plan.patterns.len(), 1);
        assert_eq!(plan.optionals.len(), 1);
    }

    #[test]
    fn parses_union_block() {
        let plan = parse(
            r#"SELECT ?s WHERE { { ?s "p1" ?o } UNION { ?s "p2" ?o } }"#,
        )
        .unwrap();
        assert_eq!(plan.unions.len(), 2);
    }

    #[test]
    fn parses_filter() {
        let plan = parse(
            r#"SELECT ?s WHERE { ?s "p" ?o . FILTER(?o != "x") }"#,
        )
        .unwrap();
        assert_eq!(plan.filters.len(), 1);
        assert_eq!(plan.filters[0].op, FilterOp::Ne);
    }

    #[test]
    fn parses_aggregate_with_alias() {
        let plan = parse(
            r#"SELECT (COUNT(?s) AS ?total) WHERE { ?s "p" ?o } GROUP BY ?o"#,
        )
        .unwrap();
        assert_eq!(plan.aggregates.len(), 1);
        assert_eq!(plan.aggregates[0].alias, "total");
        assert!(plan.has_aggregates);
        assert_eq!(plan.group_by, vec!["o"]);
    }

    #[test]
    fn parses_order_limit_offset() {
        let plan = parse(
            r#"SELECT ?s WHERE { ?s "p" ?o } ORDER BY DESC(?s) LIMIT 10 OFFSET 5"#,
        )
        .unwrap();
        assert_eq!(plan.order_by.len(), 1);
        assert_eq!(plan.order_by[0].direction, SortDirection::Desc);
        assert_eq!(plan.limit, Some(10));
        assert_eq!(plan.offset, Some(5));
    }

    #[test]
    fn rejects_query_without_where() {
        assert!(parse("SELECT ?s").is_err());
    }
}
