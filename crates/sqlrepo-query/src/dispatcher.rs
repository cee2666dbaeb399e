//! Routing of repository method calls to SQL.
//!
//! A [`Dispatcher`] is built once per repository contract. Building derives
//! the entity's table spec, captures its property descriptors, pre-renders
//! the statement templates for every dialect and resolves each declared
//! method to a [`Strategy`]. Calls then only look the strategy up, bind
//! arguments and run SQL on the connection bound to the caller's context.

use crate::intent::{Intent, parse_intent, property_candidates};
use crate::mapper::{entity_to_parameters, propagate_generated_key, query_entities};
use crate::sql::{SqlTemplates, select_where_sql};
use sqlrepo_core::{
    ConfigErrorKind, Connection, Dialect, Entity, Error, PropertyDescriptor, QueryError,
    QueryErrorKind, Result, StateErrorKind, Value,
};
use sqlrepo_schema::{TableSpec, table_spec_of};
use sqlrepo_session::TransactionContext;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A method declared by a repository contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: &'static str,
    /// Literal SQL from `#[query("...")]`.
    pub query: Option<&'static str>,
}

impl MethodSpec {
    pub const fn new(name: &'static str) -> Self {
        Self { name, query: None }
    }

    pub const fn with_query(name: &'static str, sql: &'static str) -> Self {
        Self {
            name,
            query: Some(sql),
        }
    }
}

/// One argument passed to a repository method.
#[derive(Debug, Clone)]
pub enum Argument<E> {
    Value(Value),
    Entity(E),
}

impl<E> Argument<E> {
    fn into_value(self, method: &str) -> Result<Value> {
        match self {
            Argument::Value(v) => Ok(v),
            Argument::Entity(_) => Err(Error::config(
                ConfigErrorKind::InvalidContract,
                format!("{method}: an entity cannot be bound as a SQL parameter"),
            )),
        }
    }
}

/// Result of a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched<E> {
    Many(Vec<E>),
    One(Option<E>),
    Saved(E),
}

impl<E> Dispatched<E> {
    /// Every returned entity.
    pub fn into_list(self) -> Result<Vec<E>> {
        Ok(match self {
            Dispatched::Many(v) => v,
            Dispatched::One(o) => o.into_iter().collect(),
            Dispatched::Saved(e) => vec![e],
        })
    }

    /// The first returned entity, if any.
    pub fn into_optional(self) -> Result<Option<E>> {
        Ok(match self {
            Dispatched::Many(v) => v.into_iter().next(),
            Dispatched::One(o) => o,
            Dispatched::Saved(e) => Some(e),
        })
    }

    /// The first returned entity; a query that found nothing is an error.
    pub fn into_entity(self) -> Result<E> {
        self.into_optional()?.ok_or_else(|| {
            Error::from(QueryError {
                kind: QueryErrorKind::NotFound,
                sql: None,
                message: "no matching row".to_string(),
                source: None,
            })
        })
    }
}

/// How a method is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Literal SQL, arguments bound positionally, list result.
    Query(&'static str),
    FindAll,
    FindById,
    Save,
    /// Lookup by one property's column, first match.
    FindBy { sql: String },
}

/// Strategy table and captured metadata for one entity type.
pub struct Dispatcher<E> {
    contract: &'static str,
    table: Arc<TableSpec>,
    properties: Vec<PropertyDescriptor<E>>,
    constructor: fn() -> E,
    standard: SqlTemplates,
    sqlite: SqlTemplates,
    strategies: HashMap<String, Strategy>,
}

impl<E: Entity> Dispatcher<E> {
    /// Build the dispatcher for a contract declaring `methods`.
    ///
    /// Fails with a configuration error when the entity's schema cannot be
    /// derived, when a method is declared twice, or when a `find_by_` method
    /// names a property the entity lacks.
    #[tracing::instrument(level = "debug", skip(methods), fields(entity = E::TYPE_NAME))]
    pub fn build(contract: &'static str, methods: &[MethodSpec]) -> Result<Self> {
        let table = table_spec_of::<E>()?;
        let properties = E::properties();

        let mut strategies = HashMap::from([
            ("find_all".to_string(), Strategy::FindAll),
            ("find_by_id".to_string(), Strategy::FindById),
            ("save".to_string(), Strategy::Save),
        ]);

        let mut declared: Vec<&str> = Vec::with_capacity(methods.len());
        for method in methods {
            if declared.contains(&method.name) {
                return Err(Error::config(
                    ConfigErrorKind::InvalidContract,
                    format!("{contract}: method {} is declared more than once", method.name),
                ));
            }
            declared.push(method.name);

            let strategy = match method.query {
                Some(sql) => Some(Strategy::Query(sql)),
                None => resolve(&table, method.name)?,
            };
            match strategy {
                Some(strategy) => {
                    tracing::trace!(method = method.name, ?strategy, "Registered strategy");
                    strategies.insert(method.name.to_string(), strategy);
                }
                None => {
                    tracing::debug!(method = method.name, "No convention matches; calls will fail");
                }
            }
        }

        tracing::debug!(
            contract,
            table = table.table_name(),
            strategies = strategies.len(),
            "Built repository dispatcher"
        );

        Ok(Self {
            contract,
            standard: SqlTemplates::render(&table, Dialect::Standard),
            sqlite: SqlTemplates::render(&table, Dialect::Sqlite),
            table,
            properties,
            constructor: E::default,
            strategies,
        })
    }
}

impl<E> Dispatcher<E> {
    pub fn contract(&self) -> &'static str {
        self.contract
    }

    pub fn table(&self) -> &TableSpec {
        &self.table
    }

    pub fn templates(&self, dialect: Dialect) -> &SqlTemplates {
        match dialect {
            Dialect::Standard => &self.standard,
            Dialect::Sqlite => &self.sqlite,
        }
    }

    /// The registered strategy for `method`, if any.
    pub fn strategy(&self, method: &str) -> Option<&Strategy> {
        self.strategies.get(method)
    }

    /// Invoke `method` with `args` on the connection bound to `cx`.
    ///
    /// Without an active transaction the call fails with the "no connection
    /// available" state error before anything else happens. Data-access
    /// failures come back wrapped as repository errors naming `method`.
    pub fn invoke(
        &self,
        cx: &TransactionContext,
        method: &str,
        args: Vec<Argument<E>>,
    ) -> Result<Dispatched<E>> {
        cx.with_connection(|connection| {
            tracing::debug!(contract = self.contract, method, "Dispatching repository call");
            let strategy = match self.strategies.get(method) {
                Some(strategy) => strategy.clone(),
                None => resolve(&self.table, method)?.ok_or_else(|| {
                    Error::state(
                        StateErrorKind::UnsupportedOperation,
                        format!("{}::{} is not supported", self.contract, method),
                    )
                })?,
            };
            self.execute(connection, method, &strategy, args)
                .map_err(|e| Error::repository(method, e))
        })
    }

    fn execute(
        &self,
        connection: &dyn Connection,
        method: &str,
        strategy: &Strategy,
        args: Vec<Argument<E>>,
    ) -> Result<Dispatched<E>> {
        let templates = self.templates(connection.dialect());
        match strategy {
            Strategy::Query(sql) => {
                let params = args
                    .into_iter()
                    .map(|a| a.into_value(method))
                    .collect::<Result<Vec<_>>>()?;
                self.query(connection, sql, &params).map(Dispatched::Many)
            }
            Strategy::FindAll => self
                .query(connection, &templates.find_all, &[])
                .map(Dispatched::Many),
            Strategy::FindById => {
                let sql = templates.find_by_id.as_deref().ok_or_else(|| {
                    Error::config(
                        ConfigErrorKind::MissingIdentifier,
                        format!("{} has no id property", self.table.table_name()),
                    )
                })?;
                let id = single_value(method, args)?;
                self.first(connection, sql, id)
            }
            Strategy::FindBy { sql } => {
                let value = single_value(method, args)?;
                self.first(connection, sql, value)
            }
            Strategy::Save => {
                let mut entity = single_entity(method, args)?;
                let params = entity_to_parameters(&entity, &self.table, &self.properties);
                tracing::trace!(sql = %templates.save, "Executing save");
                match self.table.id_column() {
                    Some(id) => {
                        let key = connection.insert(&templates.save, &params, &id.column_name)?;
                        propagate_generated_key(&mut entity, &self.table, &self.properties, key)?;
                    }
                    None => {
                        connection.execute(&templates.save, &params)?;
                    }
                }
                Ok(Dispatched::Saved(entity))
            }
        }
    }

    fn query(&self, connection: &dyn Connection, sql: &str, params: &[Value]) -> Result<Vec<E>> {
        query_entities(
            connection,
            sql,
            params,
            &self.table,
            &self.properties,
            self.constructor,
        )
    }

    fn first(&self, connection: &dyn Connection, sql: &str, value: Value) -> Result<Dispatched<E>> {
        let mut rows = self.query(connection, sql, &[value])?;
        let first = if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        };
        Ok(Dispatched::One(first))
    }
}

impl<E> fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("contract", &self.contract)
            .field("table", &self.table.table_name())
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

/// Resolve a method name by convention.
///
/// `Ok(None)` means no convention applies; an `Err` means a `find_by_` suffix
/// names no property of the entity.
fn resolve(table: &TableSpec, method: &str) -> Result<Option<Strategy>> {
    Ok(match parse_intent(method) {
        Intent::FindAll => Some(Strategy::FindAll),
        Intent::FindById => Some(Strategy::FindById),
        Intent::Save => Some(Strategy::Save),
        Intent::FindBy(suffix) => {
            let column = property_candidates(&suffix)
                .iter()
                .find_map(|name| table.column_for_property(name))
                .ok_or_else(|| {
                    Error::config(
                        ConfigErrorKind::UnknownProperty,
                        format!("{} has no property named {suffix}", table.table_name()),
                    )
                })?;
            Some(Strategy::FindBy {
                sql: select_where_sql(table, &column.column_name),
            })
        }
        Intent::Unsupported => None,
    })
}

fn single_value<E>(method: &str, args: Vec<Argument<E>>) -> Result<Value> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(arg), None) => arg.into_value(method),
        _ => Err(Error::config(
            ConfigErrorKind::InvalidContract,
            format!("{method} takes exactly one argument"),
        )),
    }
}

fn single_entity<E>(method: &str, args: Vec<Argument<E>>) -> Result<E> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(Argument::Entity(entity)), None) => Ok(entity),
        _ => Err(Error::config(
            ConfigErrorKind::InvalidContract,
            format!("{method} takes exactly one entity argument"),
        )),
    }
}
