//! Entity introspection.
//!
//! An [`Entity`] describes itself as an ordered list of
//! [`PropertyDescriptor`]s: a name, a declared Rust type, a getter, an optional
//! setter and the annotations attached to the property. `#[derive(Entity)]`
//! generates this list from a struct's fields in declaration order.

use crate::error::{Error, Result};
use crate::row::{FromValue, with_column};
use crate::value::Value;
use std::any::TypeId;
use std::fmt;

/// Marker attached to an entity type or a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// Explicit table name
    Table(&'static str),
    /// Explicit column name
    Column(&'static str),
    /// Property is the primary key
    Id,
    /// Database generates the property's value
    GeneratedValue,
}

/// Annotation lookup over a static slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Annotations(&'static [Annotation]);

impl Annotations {
    pub const EMPTY: Annotations = Annotations(&[]);

    pub const fn new(annotations: &'static [Annotation]) -> Self {
        Self(annotations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Annotation> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn table(&self) -> Option<&'static str> {
        self.0.iter().find_map(|a| match a {
            Annotation::Table(name) => Some(*name),
            _ => None,
        })
    }

    pub fn column(&self) -> Option<&'static str> {
        self.0.iter().find_map(|a| match a {
            Annotation::Column(name) => Some(*name),
            _ => None,
        })
    }

    pub fn is_id(&self) -> bool {
        self.0.contains(&Annotation::Id)
    }

    pub fn is_generated(&self) -> bool {
        self.0.contains(&Annotation::GeneratedValue)
    }
}

/// The declared Rust type of a property.
#[derive(Clone, Copy)]
pub struct PropertyType {
    id: TypeId,
    name: &'static str,
}

impl PropertyType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for PropertyType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PropertyType {}

impl fmt::Debug for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Reads a property as a dynamic value.
pub type Getter<E> = fn(&E) -> Value;

/// Writes a dynamic value into a property, converting it to the declared type.
pub type Setter<E> = fn(&mut E, &Value) -> Result<()>;

/// One introspected property of an entity.
pub struct PropertyDescriptor<E> {
    name: &'static str,
    value_type: PropertyType,
    getter: Getter<E>,
    setter: Option<Setter<E>>,
    annotations: Annotations,
}

impl<E> PropertyDescriptor<E> {
    /// A read-only property.
    pub fn new(name: &'static str, value_type: PropertyType, getter: Getter<E>) -> Self {
        Self {
            name,
            value_type,
            getter,
            setter: None,
            annotations: Annotations::EMPTY,
        }
    }

    pub fn with_setter(mut self, setter: Setter<E>) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn with_annotations(mut self, annotations: &'static [Annotation]) -> Self {
        self.annotations = Annotations::new(annotations);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_type(&self) -> PropertyType {
        self.value_type
    }

    pub fn annotations(&self) -> Annotations {
        self.annotations
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the property from `entity`.
    pub fn get(&self, entity: &E) -> Value {
        (self.getter)(entity)
    }

    /// Write `value` into the property of `entity`.
    ///
    /// Fails with a configuration error when the property is read-only and
    /// with a type error when the value does not convert.
    pub fn set(&self, entity: &mut E, value: &Value) -> Result<()> {
        match self.setter {
            Some(setter) => setter(entity, value),
            None => Err(Error::config(
                crate::ConfigErrorKind::UnknownProperty,
                format!("property '{}' has no setter", self.name),
            )),
        }
    }
}

impl<E> Clone for PropertyDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            value_type: self.value_type,
            getter: self.getter,
            setter: self.setter,
            annotations: self.annotations,
        }
    }
}

impl<E> fmt::Debug for PropertyDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("writable", &self.setter.is_some())
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// Convert `value` for assignment to the property `property`.
///
/// Generated setters call this so conversion failures name the property.
pub fn convert_property<T: FromValue>(property: &str, value: &Value) -> Result<T> {
    T::from_value(value).map_err(|e| with_column(e, property))
}

/// A type that can be persisted as one table row.
///
/// The `Default` bound is the no-argument constructor used when mapping rows
/// back into entities.
pub trait Entity: Default + Send + Sync + 'static {
    /// Simple type name; the default table name is its upper-cased form.
    const TYPE_NAME: &'static str;

    /// Annotations attached to the type itself.
    fn type_annotations() -> Annotations {
        Annotations::EMPTY
    }

    /// Properties in declaration order.
    fn properties() -> Vec<PropertyDescriptor<Self>>;
}
