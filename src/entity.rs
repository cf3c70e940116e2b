/// Identity and version counter assigned by the repository at first save.
///
/// `identity` never changes once assigned; `version` starts at 0 and advances
/// by exactly 1 on every successful update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Metadata {
    pub identity: i64,
    pub version: i64,
}

impl Metadata {
    pub(crate) fn new(identity: i64, version: i64) -> Self {
        Self { identity, version }
    }

    pub(crate) fn bumped(self) -> Self {
        Self {
            identity: self.identity,
            version: self.version + 1,
        }
    }
}

/// A typed record together with its optional persistence metadata.
///
/// An entity is *transient* until the first successful save. Persistence
/// operations consume the entity and return a new value carrying the updated
/// metadata; callers thread the returned value forward instead of sharing a
/// mutable metadata cell.
#[derive(Clone, Debug)]
pub struct Entity<T> {
    record: T,
    metadata: Option<Metadata>,
}

impl<T> Entity<T> {
    /// Wrap a record that has never been saved.
    pub fn new(record: T) -> Self {
        Self {
            record,
            metadata: None,
        }
    }

    pub(crate) fn persisted(record: T, metadata: Metadata) -> Self {
        Self {
            record,
            metadata: Some(metadata),
        }
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut T {
        &mut self.record
    }

    pub fn into_record(self) -> T {
        self.record
    }

    pub fn metadata(&self) -> Option<Metadata> {
        self.metadata
    }

    pub fn is_transient(&self) -> bool {
        self.metadata.is_none()
    }

    /// Transform the record while keeping the metadata, if any.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Entity<U> {
        Entity {
            record: f(self.record),
            metadata: self.metadata,
        }
    }

    /// Explicitly take over another entity's metadata. Metadata is never
    /// copied between entity values implicitly.
    pub fn adopt_metadata_from<U>(&mut self, other: &Entity<U>) {
        self.metadata = other.metadata;
    }

    pub(crate) fn into_parts(self) -> (T, Option<Metadata>) {
        (self.record, self.metadata)
    }
}

/// Two entities are equal iff both are persisted and carry the same metadata.
/// Transient entities never compare equal, regardless of their records.
impl<T> PartialEq for Entity<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.metadata, other.metadata) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<T> From<T> for Entity<T> {
    fn from(record: T) -> Self {
        Entity::new(record)
    }
}
