// src/query/engine.rs
use std::fmt;

use futures::future::join_all;

use crate::core::{DataReference, DataSnapshot};
use crate::error::{ArborError, Result};
use crate::query::types::{FilterOperand, IntoOperator, QueryDescriptor, QueryFilter, SortKey};
use crate::storage::{GetOptions, QueryOptions};
use crate::transport;

/// What a query execution returns.
#[derive(Debug, Clone)]
pub enum QueryResults {
    Snapshots(Vec<DataSnapshot>),
    References(Vec<DataReference>),
}

impl QueryResults {
    pub fn len(&self) -> usize {
        match self {
            QueryResults::Snapshots(s) => s.len(),
            QueryResults::References(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn references(self) -> Vec<DataReference> {
        match self {
            QueryResults::Snapshots(s) => s.into_iter().map(|s| s.reference().clone()).collect(),
            QueryResults::References(r) => r,
        }
    }
}

/// Query over the children of a reference.
///
/// Criteria are checked as they are added; an invalid criterion is reported
/// immediately and never reaches the backend.
///
/// ```no_run
/// # async fn run(db: arbordb::Database) -> arbordb::Result<()> {
/// let recent = db
///     .query("posts")
///     .filter("stars", ">=", 10)?
///     .order("posted", false)?
///     .take(20)?
///     .get()
///     .await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Query {
    reference: DataReference,
    descriptor: QueryDescriptor,
}

impl Query {
    pub(crate) fn new(reference: DataReference) -> Self {
        let descriptor = QueryDescriptor {
            path: reference.path().to_string(),
            ..QueryDescriptor::default()
        };
        Self {
            reference,
            descriptor,
        }
    }

    pub fn reference(&self) -> &DataReference {
        &self.reference
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Adds a filter on child key `key`. `op` is a [`QueryOperator`] or its
    /// string form (`"<"`, `"between"`, `"!in"`, ...).
    ///
    /// [`QueryOperator`]: crate::query::QueryOperator
    pub fn filter(
        mut self,
        key: &str,
        op: impl IntoOperator,
        compare: impl Into<FilterOperand>,
    ) -> Result<Self> {
        let filter = QueryFilter::new(key, op.into_operator()?, compare.into())?;
        self.descriptor.filters.push(filter);
        Ok(self)
    }

    /// Adds a sort key. The first call sets the primary order.
    pub fn order(mut self, key: &str, ascending: bool) -> Result<Self> {
        let key = crate::path::normalize(key);
        if key.is_empty() {
            return Err(ArborError::validation("sort key must not be empty"));
        }
        self.descriptor.order.push(SortKey {
            key: key.to_string(),
            ascending,
        });
        Ok(self)
    }

    /// Limits the number of results; 0 means unbounded.
    pub fn take(mut self, n: usize) -> Result<Self> {
        let max = self.reference.database().config().query.max_take;
        if max > 0 && (n == 0 || n > max) {
            return Err(ArborError::validation(format!(
                "take must be between 1 and {}, got {}",
                max, n
            )));
        }
        self.descriptor.take = n;
        Ok(self)
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.descriptor.skip = n;
        self
    }

    /// Runs the query. Without explicit options, results are snapshots or
    /// references as configured under `query.default_snapshots`.
    pub async fn execute(&self, options: Option<QueryOptions>) -> Result<QueryResults> {
        let db = self.reference.database();
        let options = options.unwrap_or_else(|| QueryOptions {
            snapshots: db.config().query.default_snapshots,
            value: GetOptions::default(),
        });
        let matches = db
            .backend()
            .query(self.reference.path(), &self.descriptor, &options)
            .await?;
        log::debug!(
            "[Query] '{}' matched {} children",
            self.reference.path(),
            matches.len()
        );

        if !options.snapshots {
            return Ok(QueryResults::References(
                matches.into_iter().map(|m| db.reference(&m.path)).collect(),
            ));
        }

        let mut snapshots = Vec::with_capacity(matches.len());
        for m in matches {
            let value = match m.value {
                Some(envelope) => db.types().deserialize(&m.path, transport::deserialize(envelope)?)?,
                None => Default::default(),
            };
            snapshots.push(DataSnapshot::new(db.reference(&m.path), value));
        }
        Ok(QueryResults::Snapshots(snapshots))
    }

    /// Matching children with their values.
    pub async fn get(&self) -> Result<Vec<DataSnapshot>> {
        self.get_with(GetOptions::default()).await
    }

    /// Matching children, with values shaped by `options`.
    pub async fn get_with(&self, options: GetOptions) -> Result<Vec<DataSnapshot>> {
        let options = QueryOptions {
            snapshots: true,
            value: options,
        };
        match self.execute(Some(options)).await? {
            QueryResults::Snapshots(snapshots) => Ok(snapshots),
            QueryResults::References(_) => Err(ArborError::backend(
                "backend returned references for a snapshot query",
            )),
        }
    }

    /// Matching children as references only.
    pub async fn references(&self) -> Result<Vec<DataReference>> {
        let options = QueryOptions {
            snapshots: false,
            ..QueryOptions::default()
        };
        Ok(self.execute(Some(options)).await?.references())
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.references().await?.len())
    }

    pub async fn exists(&self) -> Result<bool> {
        let first = Query {
            reference: self.reference.clone(),
            descriptor: QueryDescriptor {
                take: 1,
                ..self.descriptor.clone()
            },
        };
        Ok(!first.references().await?.is_empty())
    }

    /// Removes every matching child. Removals run concurrently; the first
    /// failure is returned after all of them have finished.
    pub async fn remove(&self) -> Result<usize> {
        let targets = self.references().await?;
        let results = join_all(targets.iter().map(|r| r.remove())).await;
        let removed = results.iter().filter(|r| r.is_ok()).count();
        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            log::error!(
                "[Query] Removed {} of {} children under '{}': {}",
                removed,
                targets.len(),
                self.reference.path(),
                err
            );
            return Err(err);
        }
        Ok(removed)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
