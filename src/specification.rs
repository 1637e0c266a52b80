//! Reusable query descriptions.
//!
//! A [`Specification`] bundles an optional filter predicate with an ordered
//! list of eager-load directives. It is built once through
//! [`SpecificationBuilder`] and is read-only afterwards, so the same value
//! can be resolved against a store any number of times with identical
//! results.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{Result, StoreError};

/// Shared filter predicate over an entity type.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A typed handle naming a navigation (a related entity or collection) of
/// `T`.
///
/// Relations are declared once, next to the entity they belong to, and used
/// wherever an eager load is requested. The phantom parameter ties the
/// handle to its entity type, so a relation of one entity cannot be
/// attached to a specification for another.
///
/// ```
/// use storekit::specification::Relation;
/// # #[derive(Debug, Clone)] struct Customer;
/// const ORDERS: Relation<Customer> = Relation::new("orders");
/// ```
pub struct Relation<T> {
    name: &'static str,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Relation<T> {
    /// Declare a relation by its store-level name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _entity: PhantomData,
        }
    }

    /// The store-level name of the relation.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Relation<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Relation<T> {}

impl<T> fmt::Debug for Relation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Relation").field(&self.name).finish()
    }
}

/// One eager-load directive, in either of the two forms a store
/// understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Include {
    /// A typed navigation accessor, by relation name.
    Navigation(&'static str),
    /// A dotted path into nested navigations, e.g. `"orders.lines"`.
    Path(String),
}

impl Include {
    /// The resolved path of the directive, whichever form it was given in.
    pub fn path(&self) -> &str {
        match self {
            Include::Navigation(name) => name,
            Include::Path(path) => path,
        }
    }
}

/// An immutable, reusable query description for entities of type `T`.
pub struct Specification<T> {
    criteria: Option<Predicate<T>>,
    includes: Vec<Include>,
}

impl<T: Entity> Specification<T> {
    /// Start building a specification with a required filter predicate.
    pub fn matching<P>(predicate: P) -> SpecificationBuilder<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        SpecificationBuilder {
            criteria: Some(Arc::new(predicate)),
            includes: Vec::new(),
        }
    }

    /// Start building a specification that matches every entity.
    ///
    /// Match-all is an explicit request, never the accidental result of a
    /// missing argument.
    pub fn unfiltered() -> SpecificationBuilder<T> {
        SpecificationBuilder {
            criteria: None,
            includes: Vec::new(),
        }
    }

    /// The filter predicate, if one was given.
    pub fn criteria(&self) -> Option<&Predicate<T>> {
        self.criteria.as_ref()
    }

    /// The eager-load directives, in declaration order.
    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    /// Lower this specification to the plan a store resolves.
    ///
    /// Directives are de-duplicated by resolved path, first occurrence
    /// wins, so requesting the same include twice cannot duplicate
    /// store-level joins.
    pub fn plan(&self) -> QueryPlan<'_, T> {
        let mut includes: Vec<&str> = Vec::with_capacity(self.includes.len());
        for include in &self.includes {
            let path = include.path();
            if !includes.contains(&path) {
                includes.push(path);
            }
        }
        QueryPlan {
            includes,
            criteria: self.criteria.as_deref(),
        }
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            includes: self.includes.clone(),
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("criteria", &self.criteria.as_ref().map(|_| "<predicate>"))
            .field("includes", &self.includes)
            .finish()
    }
}

/// Builder for [`Specification`]. Consumed by [`build`](Self::build);
/// includes can only be appended here, never on the finished value.
pub struct SpecificationBuilder<T> {
    criteria: Option<Predicate<T>>,
    includes: Vec<Include>,
}

impl<T: Entity> SpecificationBuilder<T> {
    /// Append a typed navigation include.
    pub fn include(mut self, relation: Relation<T>) -> Self {
        self.includes.push(Include::Navigation(relation.name()));
        self
    }

    /// Append a dotted-path include.
    pub fn include_path(mut self, path: impl Into<String>) -> Self {
        self.includes.push(Include::Path(path.into()));
        self
    }

    /// Finish the specification.
    ///
    /// Fails with [`StoreError::InvalidArgument`] if any dotted path is
    /// empty or contains an empty segment. Validation happens here, before
    /// the specification ever reaches a store.
    pub fn build(self) -> Result<Specification<T>> {
        for include in &self.includes {
            validate_path(include.path())?;
        }
        Ok(Specification {
            criteria: self.criteria,
            includes: self.includes,
        })
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(StoreError::InvalidArgument(
            "include path must not be empty".into(),
        ));
    }
    if path.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(StoreError::InvalidArgument(format!(
            "include path `{path}` contains an empty segment"
        )));
    }
    Ok(())
}

/// The resolution input a store interprets: de-duplicated include paths in
/// declaration order, then the filter, then materialization.
pub struct QueryPlan<'a, T> {
    /// Resolved include paths, first occurrence order.
    pub includes: Vec<&'a str>,
    /// Filter applied after the includes; `None` matches everything.
    pub criteria: Option<&'a (dyn Fn(&T) -> bool + Send + Sync)>,
}

impl<'a, T> QueryPlan<'a, T> {
    /// A plan with no includes and no filter: the full entity set.
    pub fn unrestricted() -> Self {
        Self {
            includes: Vec::new(),
            criteria: None,
        }
    }

    /// A plan filtering the full entity set with one predicate.
    pub fn filtered(criteria: &'a (dyn Fn(&T) -> bool + Send + Sync)) -> Self {
        Self {
            includes: Vec::new(),
            criteria: Some(criteria),
        }
    }

    /// Whether `entity` passes this plan's filter.
    pub fn matches(&self, entity: &T) -> bool {
        self.criteria.map_or(true, |criteria| criteria(entity))
    }
}

impl<'a, T> fmt::Debug for QueryPlan<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPlan")
            .field("includes", &self.includes)
            .field("criteria", &self.criteria.map(|_| "<predicate>"))
            .finish()
    }
}
