//! Generic data-access contract.
//!
//! Business entities are stored as JSON records in tables shared by every
//! tenant. [`DataClient`] is the operation surface over those tables; the
//! database crate provides the store implementation plus the tenant-scoping
//! and unscoped-access wrappers, all of which implement the same trait.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{VitrineError, VitrineResult};

/// A stored row: a JSON object keyed by field name.
pub type Record = serde_json::Map<String, Value>;

/// Primary key field of every record (UUID string).
pub const ID_FIELD: &str = "id";
/// Tenant foreign key carried by every tenant-scoped record.
pub const TENANT_FIELD: &str = "tenant_id";

const MAX_FIELD_LEN: usize = 64;

/// Converts a `json!({...})` literal into a [`Record`]. Non-objects yield
/// an empty record.
pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// The string value of `field`, if present and a string.
pub fn field_str<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

/// Entity kinds reachable through a [`DataClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Category,
    Brand,
    Product,
    ProductImage,
    TenantBranding,
    AuditLog,
    FeatureOverride,
}

impl Entity {
    pub const ALL: [Entity; 7] = [
        Entity::Category,
        Entity::Brand,
        Entity::Product,
        Entity::ProductImage,
        Entity::TenantBranding,
        Entity::AuditLog,
        Entity::FeatureOverride,
    ];

    /// Storage table name.
    pub fn table(&self) -> &'static str {
        match self {
            Entity::Category => "category",
            Entity::Brand => "brand",
            Entity::Product => "product",
            Entity::ProductImage => "product_image",
            Entity::TenantBranding => "tenant_branding",
            Entity::AuditLog => "audit_log",
            Entity::FeatureOverride => "feature_override",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Operation classes, used in guard diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindMany,
    FindFirst,
    FindUnique,
    Count,
    Aggregate,
    GroupCount,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
    Upsert,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FindMany => "find_many",
            Operation::FindFirst => "find_first",
            Operation::FindUnique => "find_unique",
            Operation::Count => "count",
            Operation::Aggregate => "aggregate",
            Operation::GroupCount => "group_count",
            Operation::Create => "create",
            Operation::CreateMany => "create_many",
            Operation::Update => "update",
            Operation::UpdateMany => "update_many",
            Operation::Delete => "delete",
            Operation::DeleteMany => "delete_many",
            Operation::Upsert => "upsert",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row predicate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every row.
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    /// String containment.
    Contains(String, String),
    /// Field absent or null.
    IsNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Filter::In(field.into(), values.into_iter().collect())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::Contains(field.into(), needle.into())
    }

    /// Logical AND, flattening nested conjunctions and dropping `All`.
    pub fn and(self, other: Filter) -> Filter {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Filter::All => {}
                Filter::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    /// Checks every referenced field name.
    pub fn validate(&self) -> VitrineResult<()> {
        match self {
            Filter::All => Ok(()),
            Filter::Eq(f, _)
            | Filter::Ne(f, _)
            | Filter::Gt(f, _)
            | Filter::Gte(f, _)
            | Filter::Lt(f, _)
            | Filter::Lte(f, _)
            | Filter::In(f, _)
            | Filter::Contains(f, _)
            | Filter::IsNull(f) => validate_field(f),
            Filter::And(parts) | Filter::Or(parts) => parts.iter().try_for_each(Filter::validate),
            Filter::Not(inner) => inner.validate(),
        }
    }
}

/// Field names reach the store verbatim, so they are restricted to plain
/// identifiers.
pub fn validate_field(name: &str) -> VitrineResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start
        || name.len() > MAX_FIELD_LEN
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(VitrineError::validation(
            name,
            "field names must be identifiers of at most 64 characters",
        ));
    }
    Ok(())
}

/// Exact-match lookup key: the primary id or a unique field combination.
#[derive(Debug, Clone, PartialEq)]
pub enum UniqueKey {
    Id(String),
    Fields(Vec<(String, Value)>),
}

impl UniqueKey {
    pub fn id(id: impl ToString) -> Self {
        UniqueKey::Id(id.to_string())
    }

    pub fn field(field: impl Into<String>, value: impl Into<Value>) -> Self {
        UniqueKey::Fields(vec![(field.into(), value.into())])
    }

    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        UniqueKey::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn to_filter(&self) -> Filter {
        match self {
            UniqueKey::Id(id) => Filter::eq(ID_FIELD, id.clone()),
            UniqueKey::Fields(pairs) => pairs
                .iter()
                .fold(Filter::All, |acc, (k, v)| acc.and(Filter::Eq(k.clone(), v.clone()))),
        }
    }

    /// A key must name at least one field, and only identifier fields.
    pub fn validate(&self) -> VitrineResult<()> {
        match self {
            UniqueKey::Id(_) => Ok(()),
            UniqueKey::Fields(pairs) if pairs.is_empty() => Err(VitrineError::validation(
                "key",
                "a unique key needs at least one field",
            )),
            UniqueKey::Fields(pairs) => pairs.iter().try_for_each(|(f, _)| validate_field(f)),
        }
    }

    /// Human-readable form for not-found diagnostics.
    pub fn describe(&self) -> String {
        match self {
            UniqueKey::Id(id) => id.clone(),
            UniqueKey::Fields(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Arguments for multi-row reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub filter: Filter,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl FindArgs {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// Numeric aggregate over one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Row count for one distinct value of the grouped field.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    pub key: Value,
    pub count: u64,
}

/// Operation surface over the shared entity tables.
///
/// Unique-key mutations (`update`, `delete`) fail with `NotFound` when no
/// row matches. `upsert` creates from `create` or merges `update` into the
/// existing row.
pub trait DataClient: Send + Sync {
    fn find_many(
        &self,
        entity: Entity,
        args: FindArgs,
    ) -> impl Future<Output = VitrineResult<Vec<Record>>> + Send;

    fn find_first(
        &self,
        entity: Entity,
        args: FindArgs,
    ) -> impl Future<Output = VitrineResult<Option<Record>>> + Send;

    fn find_unique(
        &self,
        entity: Entity,
        key: UniqueKey,
    ) -> impl Future<Output = VitrineResult<Option<Record>>> + Send;

    fn count(&self, entity: Entity, filter: Filter)
    -> impl Future<Output = VitrineResult<u64>> + Send;

    fn aggregate(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> impl Future<Output = VitrineResult<Aggregate>> + Send;

    fn group_count(
        &self,
        entity: Entity,
        filter: Filter,
        field: String,
    ) -> impl Future<Output = VitrineResult<Vec<GroupCount>>> + Send;

    fn create(
        &self,
        entity: Entity,
        data: Record,
    ) -> impl Future<Output = VitrineResult<Record>> + Send;

    fn create_many(
        &self,
        entity: Entity,
        data: Vec<Record>,
    ) -> impl Future<Output = VitrineResult<u64>> + Send;

    fn update(
        &self,
        entity: Entity,
        key: UniqueKey,
        data: Record,
    ) -> impl Future<Output = VitrineResult<Record>> + Send;

    fn update_many(
        &self,
        entity: Entity,
        filter: Filter,
        data: Record,
    ) -> impl Future<Output = VitrineResult<u64>> + Send;

    fn delete(
        &self,
        entity: Entity,
        key: UniqueKey,
    ) -> impl Future<Output = VitrineResult<Record>> + Send;

    fn delete_many(
        &self,
        entity: Entity,
        filter: Filter,
    ) -> impl Future<Output = VitrineResult<u64>> + Send;

    fn upsert(
        &self,
        entity: Entity,
        key: UniqueKey,
        create: Record,
        update: Record,
    ) -> impl Future<Output = VitrineResult<Record>> + Send;
}

/// Hands out a tenant-scoped [`DataClient`] in a single call.
pub trait TenantScopes: Send + Sync {
    type Scoped: DataClient;

    fn for_tenant(&self, tenant_id: Uuid) -> Self::Scoped;
}
