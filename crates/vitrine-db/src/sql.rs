//! Translation of [`Filter`] trees into SurrealQL `WHERE` clauses.
//!
//! Field names are validated and written verbatim; every value travels as
//! a member of a single bound object `$w` (`$w.p0`, `$w.p1`, ...), so the
//! query text never contains caller data.

use serde_json::{Map, Value};
use vitrine_core::error::VitrineResult;
use vitrine_core::query::{FindArgs, Filter, ID_FIELD, validate_field};

/// Name of the bound parameter object holding filter values.
pub(crate) const PARAMS: &str = "w";

/// Stored column carrying the public record id. SurrealDB's own `id` is
/// the record link and never leaves this crate.
pub(crate) const UID_COLUMN: &str = "uid";

/// Default ordering for multi-row reads.
pub(crate) const DEFAULT_ORDER: &str = "created_at ASC";

/// A compiled `WHERE` clause and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    pub clause: String,
    pub params: Map<String, Value>,
}

impl Condition {
    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

/// Maps a public field name to its stored column.
pub(crate) fn column(field: &str) -> VitrineResult<String> {
    validate_field(field)?;
    if field == ID_FIELD {
        Ok(UID_COLUMN.to_string())
    } else {
        Ok(field.to_string())
    }
}

pub(crate) fn compile(filter: &Filter) -> VitrineResult<Condition> {
    filter.validate()?;
    let mut params = Map::new();
    let clause = compile_node(filter, &mut params)?;
    Ok(Condition { clause, params })
}

fn bind(params: &mut Map<String, Value>, value: Value) -> String {
    let name = format!("p{}", params.len());
    let placeholder = format!("${PARAMS}.{name}");
    params.insert(name, value);
    placeholder
}

fn compare(
    op: &str,
    field: &str,
    value: &Value,
    params: &mut Map<String, Value>,
) -> VitrineResult<String> {
    let col = column(field)?;
    let p = bind(params, value.clone());
    Ok(format!("{col} {op} {p}"))
}

fn compile_node(filter: &Filter, params: &mut Map<String, Value>) -> VitrineResult<String> {
    Ok(match filter {
        Filter::All => "true".into(),
        Filter::Eq(field, Value::Null) | Filter::IsNull(field) => {
            let col = column(field)?;
            format!("({col} = NONE OR {col} = NULL)")
        }
        Filter::Ne(field, Value::Null) => {
            let col = column(field)?;
            format!("({col} != NONE AND {col} != NULL)")
        }
        Filter::Eq(field, value) => compare("=", field, value, params)?,
        Filter::Ne(field, value) => compare("!=", field, value, params)?,
        Filter::Gt(field, value) => compare(">", field, value, params)?,
        Filter::Gte(field, value) => compare(">=", field, value, params)?,
        Filter::Lt(field, value) => compare("<", field, value, params)?,
        Filter::Lte(field, value) => compare("<=", field, value, params)?,
        Filter::In(_, values) if values.is_empty() => "false".into(),
        Filter::In(field, values) => {
            let col = column(field)?;
            let p = bind(params, Value::Array(values.clone()));
            format!("{col} IN {p}")
        }
        Filter::Contains(field, needle) => {
            let col = column(field)?;
            let p = bind(params, Value::String(needle.clone()));
            format!("{col} CONTAINS {p}")
        }
        Filter::And(parts) => join(parts, " AND ", "true", params)?,
        Filter::Or(parts) => join(parts, " OR ", "false", params)?,
        Filter::Not(inner) => format!("!({})", compile_node(inner, params)?),
    })
}

fn join(
    parts: &[Filter],
    sep: &str,
    empty: &str,
    params: &mut Map<String, Value>,
) -> VitrineResult<String> {
    if parts.is_empty() {
        return Ok(empty.into());
    }
    let compiled = parts
        .iter()
        .map(|p| compile_node(p, params))
        .collect::<VitrineResult<Vec<_>>>()?;
    Ok(format!("({})", compiled.join(sep)))
}

/// `ORDER BY ... LIMIT ... START ...` tail for a multi-row read.
pub(crate) fn paging(args: &FindArgs) -> VitrineResult<String> {
    let order = if args.order_by.is_empty() {
        DEFAULT_ORDER.to_string()
    } else {
        args.order_by
            .iter()
            .map(|o| {
                let col = column(&o.field)?;
                Ok(format!("{col} {}", if o.descending { "DESC" } else { "ASC" }))
            })
            .collect::<VitrineResult<Vec<_>>>()?
            .join(", ")
    };
    let mut tail = format!(" ORDER BY {order}");
    if let Some(limit) = args.limit {
        tail.push_str(&format!(" LIMIT {limit}"));
    }
    if args.offset > 0 {
        tail.push_str(&format!(" START {}", args.offset));
    }
    Ok(tail)
}
