//! Repository contracts and their process-wide instances.

use crate::dispatcher::{Argument, Dispatcher, MethodSpec};
use sqlrepo_core::{ConfigErrorKind, Entity, Error, Result, Value};
use sqlrepo_schema::{create_table_sql, table_spec_of};
use sqlrepo_session::TransactionContext;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// Operations every repository supports.
pub trait Repository<E, ID> {
    /// Every stored entity.
    fn find_all(&self, cx: &TransactionContext) -> Result<Vec<E>>;

    /// The entity whose id equals `id`.
    fn find_by_id(&self, cx: &TransactionContext, id: ID) -> Result<Option<E>>;

    /// Insert or replace `entity`, returning it with any generated key set.
    fn save(&self, cx: &TransactionContext, entity: E) -> Result<E>;
}

/// A repository contract implemented by a dispatcher.
///
/// `#[repository]` implements this for the `<Trait>Impl` type it generates.
pub trait RepositoryContract: Sized + Send + Sync + 'static {
    type Entity: Entity;
    type Id: Into<Value>;

    /// Contract name used in diagnostics.
    const NAME: &'static str;

    /// Methods declared by the contract beyond the base operations.
    fn methods() -> Vec<MethodSpec>;

    fn from_dispatcher(dispatcher: Dispatcher<Self::Entity>) -> Self;

    fn dispatcher(&self) -> &Dispatcher<Self::Entity>;
}

impl<R: RepositoryContract> Repository<R::Entity, R::Id> for R {
    fn find_all(&self, cx: &TransactionContext) -> Result<Vec<R::Entity>> {
        self.dispatcher()
            .invoke(cx, "find_all", Vec::new())?
            .into_list()
    }

    fn find_by_id(&self, cx: &TransactionContext, id: R::Id) -> Result<Option<R::Entity>> {
        self.dispatcher()
            .invoke(cx, "find_by_id", vec![Argument::Value(id.into())])?
            .into_optional()
    }

    fn save(&self, cx: &TransactionContext, entity: R::Entity) -> Result<R::Entity> {
        self.dispatcher()
            .invoke(cx, "save", vec![Argument::Entity(entity)])?
            .into_entity()
    }
}

static REPOSITORIES: LazyLock<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// The shared implementation of contract `R`, building it on first use.
///
/// Building fails with a configuration error when the contract or its entity
/// is misconfigured; failures are not cached.
pub fn build_repository<R: RepositoryContract>() -> Result<Arc<R>> {
    let key = TypeId::of::<R>();
    {
        let cache = REPOSITORIES.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(repo) = cache.get(&key).and_then(|r| Arc::clone(r).downcast::<R>().ok()) {
            return Ok(repo);
        }
    }

    let built: Arc<dyn Any + Send + Sync> =
        Arc::new(R::from_dispatcher(Dispatcher::build(R::NAME, &R::methods())?));
    let mut cache = REPOSITORIES.write().unwrap_or_else(PoisonError::into_inner);
    let shared = Arc::clone(cache.entry(key).or_insert(built));
    shared.downcast::<R>().map_err(|_| {
        Error::config(
            ConfigErrorKind::InvalidContract,
            format!("cached repository for {} has an unexpected type", R::NAME),
        )
    })
}

/// Create the table for `E` on the connection bound to `cx`.
///
/// The statement runs inside the caller's transaction and is committed with
/// it.
pub fn create_table<E: Entity>(cx: &TransactionContext) -> Result<()> {
    let table = table_spec_of::<E>()?;
    cx.with_connection(|connection| {
        let sql = create_table_sql(&table, connection.dialect());
        tracing::debug!(entity = E::TYPE_NAME, sql = %sql, "Creating table");
        connection.execute(&sql, &[]).map(|_| ())
    })
}
