//! Filters, sorting, and finder options.
//!
//! Filters are written as BSON documents in the Mongo query dialect. Backends that
//! pass filters straight to a Mongo-compatible driver never look inside them; backends
//! that evaluate filters themselves parse them into an [`Expr`] tree with
//! [`Expr::from_filter`] and walk it with a [`QueryVisitor`].
//!
//! # Supported filter operators
//!
//! - Comparison: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`
//! - Membership: `$in`, `$nin`
//! - Existence and patterns: `$exists`, `$regex` (with `$options`)
//! - Logical: `$and`, `$or`, `$nor`, `$not`
//!
//! Field names may use dotted paths to reach into nested documents.
//!
//! # Sorting
//!
//! ```ignore
//! use docmodel::query::{FindOptions, SortSpec};
//!
//! // population ascending, then name descending
//! let options = FindOptions::new().sort(SortSpec::parse(["population", "-name"]));
//! ```

use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Parses a key such as `name` (ascending) or `-name` (descending).
    pub fn parse(key: &str) -> Self {
        match key.strip_prefix('-') {
            Some(field) => Sort { field: field.to_string(), direction: SortDirection::Desc },
            None => Sort { field: key.to_string(), direction: SortDirection::Asc },
        }
    }
}

/// An ordered list of sort keys. Earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec(Vec<Sort>);

impl SortSpec {
    /// Builds a sort from keys such as `["population", "-name"]`.
    pub fn parse<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SortSpec(keys.into_iter().map(|key| Sort::parse(key.as_ref())).collect())
    }

    /// Builds a sort from a BSON value.
    ///
    /// Accepts a single key string, an array of keys (non-string entries are ignored),
    /// or a Mongo sort document such as `{"population": 1, "name": -1}`.
    pub fn from_bson(value: &Bson) -> Self {
        match value {
            Bson::String(key) => SortSpec(vec![Sort::parse(key)]),
            Bson::Array(keys) => SortSpec::parse(keys.iter().filter_map(Bson::as_str)),
            Bson::Document(keys) => SortSpec(
                keys.iter()
                    .map(|(field, direction)| Sort {
                        field: field.clone(),
                        direction: match direction {
                            Bson::Int32(d) if *d < 0 => SortDirection::Desc,
                            Bson::Int64(d) if *d < 0 => SortDirection::Desc,
                            Bson::Double(d) if *d < 0.0 => SortDirection::Desc,
                            _ => SortDirection::Asc,
                        },
                    })
                    .collect(),
            ),
            _ => SortSpec::default(),
        }
    }

    pub fn keys(&self) -> &[Sort] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts to a Mongo sort document.
    pub fn to_document(&self) -> Document {
        self.0
            .iter()
            .map(|sort| {
                let direction = match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                (sort.field.clone(), Bson::Int32(direction))
            })
            .collect()
    }
}

impl From<&str> for SortSpec {
    fn from(key: &str) -> Self {
        SortSpec(vec![Sort::parse(key)])
    }
}

impl<const N: usize> From<[&str; N]> for SortSpec {
    fn from(keys: [&str; N]) -> Self {
        SortSpec::parse(keys)
    }
}

impl From<Vec<Sort>> for SortSpec {
    fn from(keys: Vec<Sort>) -> Self {
        SortSpec(keys)
    }
}

/// Sorting and pagination passed to a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Sort specification for results.
    pub sort: Option<SortSpec>,
    /// Number of records to skip.
    pub skip: Option<u64>,
    /// Maximum number of records to return.
    pub limit: Option<u64>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder for fluent construction.
    pub fn builder() -> QueryOptionsBuilder {
        QueryOptionsBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptionsBuilder {
    options: QueryOptions,
}

impl QueryOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort specification.
    pub fn sort(mut self, sort: impl Into<SortSpec>) -> Self {
        self.options.sort = Some(sort.into());
        self
    }

    /// Sets the number of records to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Sets the maximum number of records to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn build(self) -> QueryOptions {
        self.options
    }
}

/// Which reference fields a finder resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Populate {
    /// Resolve every reference field.
    #[default]
    All,
    /// Leave references as raw ids.
    None,
    /// Resolve only the named fields.
    Fields(Vec<String>),
}

impl Populate {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Populate::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Populate::None)
    }

    /// Returns `true` if `field` should be resolved.
    pub fn allows(&self, field: &str) -> bool {
        match self {
            Populate::All => true,
            Populate::None => false,
            Populate::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }
}

impl From<bool> for Populate {
    fn from(enabled: bool) -> Self {
        if enabled { Populate::All } else { Populate::None }
    }
}

/// Options for multi-record finders.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub populate: Populate,
    /// Keep only these fields (the id is always kept).
    pub select: Option<Vec<String>>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: impl Into<SortSpec>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn populate(mut self, populate: impl Into<Populate>) -> Self {
        self.populate = populate.into();
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// The part of these options a backend cares about.
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

/// Options for single-record finders.
#[derive(Debug, Clone, Default)]
pub struct FindOneOptions {
    pub populate: Populate,
    pub select: Option<Vec<String>>,
}

impl FindOneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn populate(mut self, populate: impl Into<Populate>) -> Self {
        self.populate = populate.into();
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Options for find-one-and-update.
#[derive(Debug, Clone, Default)]
pub struct FindOneAndUpdateOptions {
    /// Insert a new record when nothing matches.
    pub upsert: bool,
    pub populate: Populate,
    pub select: Option<Vec<String>>,
}

impl FindOneAndUpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn populate(mut self, populate: impl Into<Populate>) -> Self {
        self.populate = populate.into();
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Options for find-one-and-delete.
#[derive(Debug, Clone, Default)]
pub struct FindOneAndDeleteOptions {
    /// Decides which record is deleted when several match.
    pub sort: Option<SortSpec>,
}

impl FindOneAndDeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: impl Into<SortSpec>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to. Also matches arrays containing the value.
    Eq,
    /// Not equal to. Matches missing fields.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field value (or any element of it) is one of the values.
    AnyOf,
    /// Field value (and every element of it) is none of the values.
    NoneOf,
    /// String matches a regular expression. Flags are inlined into the pattern.
    Regex,
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match). Empty matches everything.
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name or dotted path to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Expr::Field { field: field.into(), op, value: value.into() }
    }

    /// Combines this expression with another using logical AND.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Parses a Mongo-style filter document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for unsupported operators or
    /// malformed operands.
    pub fn from_filter(filter: &Document) -> DocumentStoreResult<Expr> {
        let mut exprs = Vec::with_capacity(filter.len());

        for (key, value) in filter {
            exprs.push(match key.as_str() {
                "$and" => Expr::And(Self::sub_filters(key, value)?),
                "$or" => Expr::Or(Self::sub_filters(key, value)?),
                "$nor" => Expr::Or(Self::sub_filters(key, value)?).not(),
                op if op.starts_with('$') => return Err(unsupported(op)),
                field => Self::from_condition(field, value)?,
            });
        }

        Ok(collapse(exprs))
    }

    fn sub_filters(op: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
        match value {
            Bson::Array(items) => items
                .iter()
                .map(|item| match item {
                    Bson::Document(filter) => Expr::from_filter(filter),
                    _ => Err(malformed(op, "an array of filter documents")),
                })
                .collect(),
            _ => Err(malformed(op, "an array of filter documents")),
        }
    }

    fn from_condition(field: &str, condition: &Bson) -> DocumentStoreResult<Expr> {
        let operators = match condition {
            Bson::Document(operators)
                if !operators.is_empty() && operators.keys().all(|key| key.starts_with('$')) =>
            {
                operators
            }
            _ => return Ok(Expr::field(field, FieldOp::Eq, condition.clone())),
        };

        let mut exprs = Vec::with_capacity(operators.len());

        for (op, operand) in operators {
            exprs.push(match op.as_str() {
                "$eq" => Expr::field(field, FieldOp::Eq, operand.clone()),
                "$ne" => Expr::field(field, FieldOp::Ne, operand.clone()),
                "$gt" => Expr::field(field, FieldOp::Gt, operand.clone()),
                "$gte" => Expr::field(field, FieldOp::Gte, operand.clone()),
                "$lt" => Expr::field(field, FieldOp::Lt, operand.clone()),
                "$lte" => Expr::field(field, FieldOp::Lte, operand.clone()),
                "$in" | "$nin" => {
                    if !matches!(operand, Bson::Array(_)) {
                        return Err(malformed(op, "an array"));
                    }
                    let op = if op == "$in" { FieldOp::AnyOf } else { FieldOp::NoneOf };
                    Expr::field(field, op, operand.clone())
                }
                "$exists" => Expr::Exists(field.to_string(), truthy(operand)),
                "$regex" => {
                    let pattern = operand.as_str().ok_or_else(|| malformed(op, "a string"))?;
                    let flags = operators
                        .get_str("$options")
                        .unwrap_or("")
                        .chars()
                        .filter(|flag| matches!(flag, 'i' | 'm' | 's' | 'x'))
                        .collect::<String>();
                    let pattern = if flags.is_empty() {
                        pattern.to_string()
                    } else {
                        format!("(?{flags}){pattern}")
                    };
                    Expr::field(field, FieldOp::Regex, pattern)
                }
                "$options" => continue,
                "$not" => Self::from_condition(field, operand)?.not(),
                other => return Err(unsupported(other)),
            });
        }

        Ok(collapse(exprs))
    }
}

fn collapse(mut exprs: Vec<Expr>) -> Expr {
    if exprs.len() == 1 {
        exprs.remove(0)
    } else {
        Expr::And(exprs)
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn unsupported(op: &str) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(format!("unsupported filter operator {op}"))
}

fn malformed(op: &str, expected: &str) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(format!("{op} expects {expected}"))
}

/// Builds the filter selecting records by id.
pub fn id_filter(id: &Bson) -> Document {
    doc! { "_id": id.clone() }
}

/// Builds the filter selecting any of the given ids.
pub fn ids_filter(ids: Vec<Bson>) -> Document {
    doc! { "_id": { "$in": ids } }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
