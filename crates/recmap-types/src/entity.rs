use std::any::Any;
use std::fmt;

use crate::class::ClassId;
use crate::error::{ValueError, ValueResult};
use crate::value::Value;

/// Field access surface of a mappable class.
///
/// This replaces runtime reflection: the mapper reads declared fields by
/// name through [`Entity::get_field`] and writes them back through
/// [`Entity::set_field`]. Implementations are normally generated with the
/// [`entity!`](crate::entity!) macro.
pub trait Entity: Any + Send + Sync + fmt::Debug {
    /// Identity of the concrete runtime class.
    fn class_id(&self) -> ClassId;

    /// Current value of a field, or `None` if the class has no such field.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Overwrite a field from a value.
    fn set_field(&mut self, name: &str, value: Value) -> ValueResult<()>;

    fn clone_entity(&self) -> Box<dyn Entity>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl Clone for Box<dyn Entity> {
    fn clone(&self) -> Self {
        self.clone_entity()
    }
}

impl dyn Entity {
    /// Borrow as a concrete type.
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Returns `true` if the runtime class is `T`.
    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Move a boxed entity into its concrete type.
pub fn downcast<T: Entity>(entity: Box<dyn Entity>) -> ValueResult<T> {
    let found = entity.class_id();
    entity
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| ValueError::ClassMismatch {
            expected: ClassId::of::<T>().to_string(),
            found: found.to_string(),
        })
}
