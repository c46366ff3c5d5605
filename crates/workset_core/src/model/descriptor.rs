//! Static entity type descriptions.

use std::fmt;

use crate::relation::RelationLink;

/// Static description of an entity type: its store kind name and its
/// declared relationships.
///
/// Each entity type builds one descriptor in a `LazyLock` static and hands
/// out `&'static` references through
/// [`Persistable::descriptor`](crate::model::Persistable::descriptor):
///
/// ```ignore
/// static DESCRIPTOR: LazyLock<EntityDescriptor> = LazyLock::new(|| {
///     EntityDescriptor::new("Widget")
///         .with_relation(RelationLink::many_to_one(
///             "rack",
///             "widgets",
///             true,
///             SingleAccess::of::<Widget, Rack>(|w| &w.rack, |w, v| w.rack = v),
///             SetAccess::of::<Rack, Widget>(|r| &mut r.widgets, |r| &r.widgets),
///         ))
/// });
/// ```
pub struct EntityDescriptor {
    type_name: &'static str,
    relations: Vec<RelationLink>,
    transients: Vec<&'static str>,
}

impl EntityDescriptor {
    /// Creates a descriptor with no relationships.
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            relations: Vec::new(),
            transients: Vec::new(),
        }
    }

    /// Declares a relationship rooted at this entity type.
    #[must_use]
    pub fn with_relation(mut self, link: RelationLink) -> Self {
        self.relations.push(link);
        self
    }

    /// Declares a property the interceptor applies without tracking.
    #[must_use]
    pub fn with_transient(mut self, property: &'static str) -> Self {
        self.transients.push(property);
        self
    }

    /// Entity type name, as keyed in the store.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Looks up the relationship rooted at the given property.
    #[must_use]
    pub fn relation(&self, property: &str) -> Option<&RelationLink> {
        self.relations.iter().find(|l| l.property() == property)
    }

    /// All declared relationships.
    #[must_use]
    pub fn relations(&self) -> &[RelationLink] {
        &self.relations
    }

    /// Returns `true` if the property is declared transient.
    #[must_use]
    pub fn is_transient(&self, property: &str) -> bool {
        self.transients.contains(&property)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field(
                "relations",
                &self
                    .relations
                    .iter()
                    .map(RelationLink::property)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
