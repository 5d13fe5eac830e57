//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. A movement
/// direction or a decimal quantity is a value object; a stock movement with
/// an id is an entity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
