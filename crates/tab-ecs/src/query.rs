//! Archetype-driven queries.
//!
//! Queries are built at runtime by method chaining and matched against
//! the committed archetypes:
//!
//! ```ignore
//! let query = world.query()
//!     .with::<Position>()
//!     .with::<Velocity>()
//!     .without::<Dead>()
//!     .build();
//!
//! for row in query.iter(&world) {
//!     let pos: &Position = row.get().unwrap();
//!     println!("{} at ({}, {})", row.entity(), pos.x, pos.y);
//! }
//! ```

use hashbrown::HashSet;

use crate::{
    World,
    archetype::EntityArchetype,
    board::{BufferComponentBoard, SingleComponentBoard},
    component::{BufferComponent, Component, ComponentType},
    entity::GameEntity,
};

/// How a component takes part in a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermAccess {
    /// Entity must have the component.
    With,
    /// Entity must NOT have the component.
    Without,
}

/// A single term in a query.
#[derive(Clone, Copy, Debug)]
pub struct QueryTerm {
    /// Component type for this term.
    pub component_type: ComponentType,
    /// How the component takes part.
    pub access: TermAccess,
}

/// Builder for constructing queries at runtime.
pub struct QueryBuilder<'w> {
    world: &'w World,
    terms: Vec<QueryTerm>,
    /// Set when a required type was never interned, so nothing can match.
    unsatisfiable: bool,
}

impl<'w> QueryBuilder<'w> {
    /// Create a new query builder.
    pub fn new(world: &'w World) -> Self {
        Self {
            world,
            terms: Vec::new(),
            unsatisfiable: false,
        }
    }

    /// Require a component of type `T` (any family).
    #[must_use]
    pub fn with<T: 'static>(mut self) -> Self {
        match ComponentType::lookup::<T>() {
            Some(ty) => self.terms.push(QueryTerm {
                component_type: ty,
                access: TermAccess::With,
            }),
            None => self.unsatisfiable = true,
        }
        self
    }

    /// Exclude entities holding a component of type `T`.
    #[must_use]
    pub fn without<T: 'static>(self) -> Self {
        match ComponentType::lookup::<T>() {
            Some(ty) => self.without_type(ty),
            None => self,
        }
    }

    /// Require a component type by id.
    #[must_use]
    pub fn with_type(mut self, component_type: ComponentType) -> Self {
        self.terms.push(QueryTerm {
            component_type,
            access: TermAccess::With,
        });
        self
    }

    /// Exclude a component type by id.
    #[must_use]
    pub fn without_type(mut self, component_type: ComponentType) -> Self {
        self.terms.push(QueryTerm {
            component_type,
            access: TermAccess::Without,
        });
        self
    }

    /// Build the query, resolving the matching archetypes.
    #[must_use]
    pub fn build(self) -> Query {
        if self.unsatisfiable {
            return Query {
                terms: self.terms,
                matching_archetypes: Vec::new(),
            };
        }

        let required: HashSet<ComponentType> = self
            .terms
            .iter()
            .filter(|term| term.access == TermAccess::With)
            .map(|term| term.component_type)
            .collect();

        let matching_archetypes = self
            .world
            .archetypes()
            .iter_matching(&required)
            .filter(|arch| {
                self.terms
                    .iter()
                    .filter(|term| term.access == TermAccess::Without)
                    .all(|term| !arch.contains(term.component_type))
            })
            .map(|arch| arch.id())
            .collect();

        Query {
            terms: self.terms,
            matching_archetypes,
        }
    }
}

/// An executable query over entities.
///
/// The matching archetypes are fixed when the query is built; archetypes
/// created afterwards are not picked up.
pub struct Query {
    terms: Vec<QueryTerm>,
    matching_archetypes: Vec<EntityArchetype>,
}

impl Query {
    /// Get the number of matching archetypes.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.matching_archetypes.len()
    }

    /// Get the query terms.
    #[must_use]
    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    /// Iterate over all matching entities.
    pub fn iter<'w>(&self, world: &'w World) -> impl Iterator<Item = QueryRow<'w>> + 'w {
        let archetypes = world.archetypes();
        let entities = world.entities();
        self.matching_archetypes
            .clone()
            .into_iter()
            .flat_map(move |id| archetypes.entities(id).iter())
            .filter_map(move |&handle| {
                Some(QueryRow {
                    world,
                    entity: entities.entity(handle)?,
                })
            })
    }

    /// Count the matching entities.
    #[must_use]
    pub fn count(&self, world: &World) -> usize {
        self.matching_archetypes
            .iter()
            .map(|&id| world.archetypes().entities(id).len())
            .sum()
    }
}

impl core::fmt::Debug for Query {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Query")
            .field("term_count", &self.terms.len())
            .field("matching_archetypes", &self.matching_archetypes.len())
            .finish()
    }
}

/// A single entity from a query result.
#[derive(Clone, Copy)]
pub struct QueryRow<'w> {
    world: &'w World,
    entity: GameEntity,
}

impl<'w> QueryRow<'w> {
    /// Get the entity for this row.
    #[must_use]
    pub fn entity(&self) -> GameEntity {
        self.entity
    }

    /// Get a fixed-size component, if present.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<&'w T> {
        let ty = ComponentType::lookup::<T>()?;
        let row = self.world.entities().metadata(ty, self.entity.handle()).id();
        self.world
            .registry()
            .typed::<SingleComponentBoard<T>>(ty)
            .ok()?
            .get(row)
    }

    /// Get a buffer component, if present.
    #[must_use]
    pub fn buffer<T: BufferComponent>(&self) -> Option<&'w [T]> {
        let ty = ComponentType::lookup::<T>()?;
        let row = self.world.entities().metadata(ty, self.entity.handle()).id();
        self.world
            .registry()
            .typed::<BufferComponentBoard<T>>(ty)
            .ok()?
            .list(row)
    }

    /// Check if the entity has a component of type `T`.
    #[must_use]
    pub fn has<T: 'static>(&self) -> bool {
        self.world.has::<T>(self.entity)
    }
}

impl core::fmt::Debug for QueryRow<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryRow")
            .field("entity", &self.entity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;
    use crate::component::TagComponent;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Velocity {
        x: f32,
        y: f32,
    }
    impl Component for Velocity {}

    struct Dead;
    impl TagComponent for Dead {}

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct NeverRegistered(u8);
    impl Component for NeverRegistered {}

    fn world() -> World {
        let mut world = World::new();
        world.register::<Position>();
        world.register::<Velocity>();
        world.register_tag::<Dead>();
        world
    }

    #[test]
    fn test_simple_query() {
        let mut world = world();

        for i in 0..3 {
            let e = world.create_entity();
            world.set(e, Position { x: i as f32, y: 0.0 }).unwrap();
            if i < 2 {
                world.set(e, Velocity { x: 1.0, y: 1.0 }).unwrap();
            }
        }

        let query = world.query().with::<Position>().with::<Velocity>().build();
        assert_eq!(query.iter(&world).count(), 2);
        assert_eq!(query.count(&world), 2);

        let all = world.query().with::<Position>().build();
        assert_eq!(all.iter(&world).count(), 3);
    }

    #[test]
    fn test_query_get_components() {
        let mut world = world();
        let e = world.create_entity();
        world.set(e, Position { x: 1.0, y: 2.0 }).unwrap();
        world.set(e, Velocity { x: 0.1, y: 0.2 }).unwrap();

        let query = world.query().with::<Position>().build();
        let rows: Vec<_> = query.iter(&world).collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity(), e);
        assert_eq!(rows[0].get::<Position>(), Some(&Position { x: 1.0, y: 2.0 }));
        assert!(rows[0].has::<Velocity>());
        assert!(!rows[0].has::<Dead>());
    }

    #[test]
    fn test_without() {
        let mut world = world();
        let alive = world.create_entity();
        let dead = world.create_entity();
        world.set(alive, Position { x: 0.0, y: 0.0 }).unwrap();
        world.set(dead, Position { x: 0.0, y: 0.0 }).unwrap();
        world.add_tag::<Dead>(dead).unwrap();

        let query = world.query().with::<Position>().without::<Dead>().build();
        let found: Vec<_> = query.iter(&world).map(|row| row.entity()).collect();

        assert_eq!(found, vec![alive]);
    }

    #[test]
    fn test_unknown_type_matches_nothing() {
        let mut world = world();
        let e = world.create_entity();
        world.set(e, Position { x: 0.0, y: 0.0 }).unwrap();

        let query = world.query().with::<NeverRegistered>().build();
        assert_eq!(query.archetype_count(), 0);
        assert_eq!(query.iter(&world).count(), 0);
    }

    #[test]
    fn test_query_sees_removals_after_commit() {
        let mut world = world();
        let e = world.create_entity();
        world.set(e, Velocity { x: 0.0, y: 0.0 }).unwrap();
        world.remove(e, ComponentType::of::<Velocity>()).unwrap();

        let query = world.query().with::<Velocity>().build();
        assert_eq!(query.iter(&world).count(), 0);
    }
}
