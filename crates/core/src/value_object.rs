//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// A recipe line or an ingredient usage record has no identity of its own: two
/// of them with the same attribute values are interchangeable. Value objects
/// are immutable once built; "changing" one means building a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
