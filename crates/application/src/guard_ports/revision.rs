/// A stored value together with the revision it was read at.
///
/// Revision `0` means nothing is stored yet. Writers pass the revision they
/// read; stores reject the write with `AppError::Conflict` when it moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revisioned<T> {
    /// Stored value, or the default for an absent row.
    pub value: T,
    /// Revision the value was read at.
    pub revision: i64,
}

impl<T> Revisioned<T> {
    /// Wraps a value read at `revision`.
    #[must_use]
    pub fn new(value: T, revision: i64) -> Self {
        Self { value, revision }
    }

    /// Returns whether the value has never been written.
    #[must_use]
    pub fn is_unsaved(&self) -> bool {
        self.revision == 0
    }
}

impl<T: Default> Revisioned<T> {
    /// Value for a subject with no stored row.
    #[must_use]
    pub fn absent() -> Self {
        Self::new(T::default(), 0)
    }
}
