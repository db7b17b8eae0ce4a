use std::cmp::Ordering;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    /// Array field contains the value.
    Contains(String, Value),
    In(String, Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Lookup description shared by every store backend. Rendered to a PostgREST
/// query string for Supabase, evaluated directly by the in-memory store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    order: Option<(String, SortOrder)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn neq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(field.to_string(), value.into()));
        self
    }

    pub fn lt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lt(field.to_string(), value.into()));
        self
    }

    pub fn lte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(field.to_string(), value.into()));
        self
    }

    pub fn gt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gt(field.to_string(), value.into()));
        self
    }

    pub fn gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(field.to_string(), value.into()));
        self
    }

    pub fn contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Contains(field.to_string(), value.into()));
        self
    }

    pub fn is_in(mut self, field: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(field.to_string(), values));
        self
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.order = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.filters.iter().all(|filter| filter_matches(filter, document))
    }

    /// Filters, sorts and truncates a set of documents.
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut selected: Vec<Value> = documents
            .into_iter()
            .filter(|doc| self.matches(doc))
            .cloned()
            .collect();

        if let Some((field, order)) = &self.order {
            selected.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        selected
    }

    /// Filter part of the PostgREST query string (no ordering or limit).
    pub fn to_postgrest_filters(&self) -> String {
        self.filters
            .iter()
            .map(render_filter)
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn to_postgrest(&self) -> String {
        let mut parts = Vec::new();
        let filters = self.to_postgrest_filters();
        if !filters.is_empty() {
            parts.push(filters);
        }
        if let Some((field, order)) = &self.order {
            let direction = match order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            parts.push(format!("order={}.{}", field, direction));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }
        parts.join("&")
    }
}

fn filter_matches(filter: &Filter, document: &Value) -> bool {
    let field_value = |field: &str| document.get(field).unwrap_or(&Value::Null);

    match filter {
        Filter::Eq(field, value) => field_value(field) == value,
        Filter::Neq(field, value) => field_value(field) != value,
        Filter::Lt(field, value) => ordered(field_value(field), value, |o| o == Ordering::Less),
        Filter::Lte(field, value) => ordered(field_value(field), value, |o| o != Ordering::Greater),
        Filter::Gt(field, value) => ordered(field_value(field), value, |o| o == Ordering::Greater),
        Filter::Gte(field, value) => ordered(field_value(field), value, |o| o != Ordering::Less),
        Filter::Contains(field, value) => field_value(field)
            .as_array()
            .map(|items| items.contains(value))
            .unwrap_or(false),
        Filter::In(field, values) => values.contains(field_value(field)),
    }
}

fn ordered(actual: &Value, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if actual.is_null() {
        return false;
    }
    accept(compare_values(actual, expected))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values; nulls sort first.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(0.0)
                .partial_cmp(&y.as_f64().unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => urlencoding::encode(s).into_owned(),
        Value::Null => "null".to_string(),
        other => urlencoding::encode(&other.to_string()).into_owned(),
    }
}

fn render_quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", urlencoding::encode(s)),
        other => render_scalar(other),
    }
}

fn render_filter(filter: &Filter) -> String {
    match filter {
        Filter::Eq(field, Value::Null) => format!("{}=is.null", field),
        Filter::Neq(field, Value::Null) => format!("{}=not.is.null", field),
        Filter::Eq(field, value) => format!("{}=eq.{}", field, render_scalar(value)),
        Filter::Neq(field, value) => format!("{}=neq.{}", field, render_scalar(value)),
        Filter::Lt(field, value) => format!("{}=lt.{}", field, render_scalar(value)),
        Filter::Lte(field, value) => format!("{}=lte.{}", field, render_scalar(value)),
        Filter::Gt(field, value) => format!("{}=gt.{}", field, render_scalar(value)),
        Filter::Gte(field, value) => format!("{}=gte.{}", field, render_scalar(value)),
        Filter::Contains(field, value) => format!("{}=cs.{{{}}}", field, render_quoted(value)),
        Filter::In(field, values) => format!(
            "{}=in.({})",
            field,
            values.iter().map(render_quoted).collect::<Vec<_>>().join(",")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_postgrest_query_string() {
        let query = Query::new()
            .eq("roomId", "r1")
            .lt("createdAt", 1700000000000_i64)
            .order_by("createdAt", SortOrder::Desc)
            .limit(21);

        assert_eq!(
            query.to_postgrest(),
            "roomId=eq.r1&createdAt=lt.1700000000000&order=createdAt.desc&limit=21"
        );
    }

    #[test]
    fn renders_array_containment_and_membership() {
        let query = Query::new()
            .contains("userIds", "u1")
            .is_in("id", vec![json!("a"), json!("b")]);

        assert_eq!(query.to_postgrest_filters(), "userIds=cs.{\"u1\"}&id=in.(\"a\",\"b\")");
    }

    #[test]
    fn evaluates_filters_sorts_and_limits_in_memory() {
        let docs = vec![
            json!({"id": "1", "roomId": "r", "createdAt": 10}),
            json!({"id": "2", "roomId": "r", "createdAt": 30}),
            json!({"id": "3", "roomId": "other", "createdAt": 20}),
            json!({"id": "4", "roomId": "r", "createdAt": 20}),
        ];

        let result = Query::new()
            .eq("roomId", "r")
            .lt("createdAt", 30)
            .order_by("createdAt", SortOrder::Desc)
            .limit(5)
            .apply(docs.iter());

        let ids: Vec<_> = result.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["4", "1"]);
    }

    #[test]
    fn missing_fields_never_satisfy_range_filters() {
        let doc = json!({"id": "1"});
        assert!(!Query::new().lt("createdAt", 5).matches(&doc));
        assert!(Query::new().eq("editedAt", Value::Null).matches(&doc));
    }
}
