//! Per-side entity arena.
//!
//! Every distinct key path `(level_1, ..., level_n)` of a pyramid becomes one
//! entity at level `n`. Entities keep a link to their parent and each entity
//! owns a key-sorted list of its children, so the cascade can restrict a level's
//! pools to the descendants of a matched parent without rescanning the table.

use crate::error::{PyramidError, Result};
use crate::pyramid::Pyramid;
use crate::schema::LevelSchema;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub usize);

#[derive(Debug, Clone)]
pub struct Entity {
    /// Comparison key; empty when the source cell was null.
    pub key: String,
    pub parent: Option<EntityId>,
    /// First input row carrying this entity.
    pub first_row: usize,
    /// Rendered attribute values of this level, used to detect conflicting rows.
    attribute_values: Vec<String>,
}

impl Entity {
    /// Entities without a usable key never take part in scoring.
    pub fn is_matchable(&self) -> bool {
        !self.key.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Hierarchy {
    entities: Vec<Entity>,
    roots: Vec<EntityId>,
    children: Vec<Vec<EntityId>>,
    row_paths: Vec<Vec<EntityId>>,
}

impl Hierarchy {
    pub fn build(pyramid: &Pyramid, schema: &LevelSchema) -> Result<Self> {
        let side = pyramid.side();
        let rows = pyramid.height();

        let mut entities: Vec<Entity> = Vec::new();
        let mut children: Vec<Vec<EntityId>> = Vec::new();
        let mut roots: Vec<EntityId> = Vec::new();
        let mut row_paths: Vec<Vec<EntityId>> = vec![Vec::with_capacity(schema.levels.len()); rows];
        let mut index: HashMap<(Option<EntityId>, String), EntityId> = HashMap::new();

        for (depth, level) in schema.levels.iter().enumerate() {
            let keys = pyramid.key_values(&level.key_column)?;
            let attributes = level.attributes(side);
            let attribute_values = attributes
                .iter()
                .map(|column| pyramid.rendered_values(column))
                .collect::<Result<Vec<_>>>()?;

            for (row, key) in keys.into_iter().enumerate() {
                let key = key.unwrap_or_default();
                let parent = if depth == 0 {
                    None
                } else {
                    Some(row_paths[row][depth - 1])
                };
                let values: Vec<String> = attribute_values
                    .iter()
                    .map(|column| column[row].clone())
                    .collect();

                let existing = index.get(&(parent, key.clone())).copied();
                let id = match existing {
                    Some(id) => {
                        let entity = &entities[id.0];
                        if entity.is_matchable() {
                            if let Some(pos) = entity
                                .attribute_values
                                .iter()
                                .zip(&values)
                                .position(|(seen, value)| seen != value)
                            {
                                return Err(PyramidError::AmbiguousEntity {
                                    side: side.to_string(),
                                    column: level.key_column.clone(),
                                    key: key.clone(),
                                    attribute: attributes[pos].clone(),
                                });
                            }
                        }
                        id
                    }
                    None => {
                        let id = EntityId(entities.len());
                        entities.push(Entity {
                            key: key.clone(),
                            parent,
                            first_row: row,
                            attribute_values: values,
                        });
                        children.push(Vec::new());
                        match parent {
                            Some(parent) => children[parent.0].push(id),
                            None => roots.push(id),
                        }
                        index.insert((parent, key), id);
                        id
                    }
                };
                row_paths[row].push(id);
            }
        }

        roots.sort_by(|a, b| entities[a.0].key.cmp(&entities[b.0].key));
        for group in children.iter_mut() {
            group.sort_by(|a, b| entities[a.0].key.cmp(&entities[b.0].key));
        }

        Ok(Self {
            entities,
            roots,
            children,
            row_paths,
        })
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Level-1 entities, sorted by key.
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Direct descendants of `id`, sorted by key.
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        &self.children[id.0]
    }

    pub fn row_count(&self) -> usize {
        self.row_paths.len()
    }

    /// The entity of `row` at every common level, shallowest first.
    pub fn row_path(&self, row: usize) -> &[EntityId] {
        &self.row_paths[row]
    }
}
