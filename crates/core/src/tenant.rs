//! Tenant wrapper: soft isolation by mandatory metadata tagging.
//!
//! A [`Tenant`] is a thin scope over one collection of an engine. It
//! force-tags every inserted document with `_tenant_id`, force-conjoins a
//! tenant-equality predicate into every query filter, and verifies
//! ownership before forwarding deletes. No path through the wrapper can
//! read, mutate, or remove a document belonging to another tenant — even
//! when the caller crafts filters mentioning `_tenant_id` or supplies
//! foreign document ids.

use crate::document::{MetadataValue, TENANT_ID_KEY};
use crate::engine::{DocumentSpec, Engine, QueryOptions};
use crate::error::EngineError;
use crate::filter::{Condition, Filter};

/// A tenant-scoped view over one collection.
///
/// Holds a non-owning reference to the engine; construct via
/// [`Engine::tenant`]. Exposes only `insert`, `query`, and `delete`.
#[derive(Debug)]
pub struct Tenant<'a> {
    engine: &'a Engine,
    collection: String,
    tenant_id: String,
}

impl<'a> Tenant<'a> {
    pub(crate) fn new(engine: &'a Engine, collection: &str, tenant_id: &str) -> Self {
        Self {
            engine,
            collection: collection.to_string(),
            tenant_id: tenant_id.to_string(),
        }
    }

    /// The tenant this wrapper is scoped to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Insert documents, force-tagging each with this wrapper's tenant id.
    ///
    /// A caller-supplied `_tenant_id` is overwritten — the wrapper wins.
    pub fn insert(&self, specs: Vec<DocumentSpec>) -> Result<Vec<String>, EngineError> {
        let tagged = specs
            .into_iter()
            .map(|mut spec| {
                let metadata = spec.metadata.get_or_insert_with(Default::default);
                metadata.insert(
                    TENANT_ID_KEY.to_string(),
                    MetadataValue::Str(self.tenant_id.clone()),
                );
                spec
            })
            .collect();
        self.engine.insert(&self.collection, tagged)
    }

    /// Query, scoped to this tenant's documents.
    ///
    /// The tenant-equality predicate replaces any caller condition on
    /// `_tenant_id`, so a crafted filter cannot widen the scope.
    pub fn query(
        &self,
        vector: &[f64],
        opts: &QueryOptions,
    ) -> Result<crate::collection::QueryResponse, EngineError> {
        let mut opts = opts.clone();
        let mut filter = opts.filter.take().unwrap_or_else(Filter::new);
        filter.set_field(
            TENANT_ID_KEY,
            Condition::Eq(MetadataValue::Str(self.tenant_id.clone())),
        );
        opts.filter = Some(filter);
        self.engine.query(&self.collection, vector, &opts)
    }

    /// Delete documents owned by this tenant.
    ///
    /// Ids belonging to other tenants, or absent entirely, are silently
    /// skipped; the returned count reflects only documents actually removed.
    /// Never raises on foreign ids.
    pub fn delete(&self, ids: &[String]) -> Result<usize, EngineError> {
        let collection = self.engine.collection(&self.collection)?;
        let owned: Vec<String> = ids
            .iter()
            .filter(|id| {
                collection
                    .get_document(id)
                    .is_some_and(|doc| doc.tenant_id() == Some(self.tenant_id.as_str()))
            })
            .cloned()
            .collect();

        if owned.is_empty() {
            return Ok(0);
        }
        self.engine.delete(&self.collection, &owned)
    }
}
