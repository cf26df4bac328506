// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canvas model: a fixed-size stack of layers.
//!
//! Layers live in an id-keyed arena; `order` lists the same ids bottom to top.
//! Every public mutation keeps the two in bijection.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::canvas::layer::LayerModel;
use crate::error::{ExecutionError, RasterError, ValidationError};
use crate::proxy::CanvasProxyFactory;
use crate::types::geometry::Size;
use crate::types::id::LayerId;

#[derive(Debug)]
pub struct CanvasModel {
    size: Size,
    layers: FxHashMap<LayerId, LayerModel>,
    order: Vec<LayerId>,
}

impl CanvasModel {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            layers: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Model with `count` blank layers, ids `0..count`.
    pub fn with_layers(size: Size, count: u32, factory: &dyn CanvasProxyFactory) -> Self {
        let mut model = Self::new(size);
        for i in 0..count {
            model.create_layer(LayerId(i), factory);
        }
        model
    }

    // --- Read APIs ---

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerModel> {
        self.layers.get(&id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut LayerModel> {
        self.layers.get_mut(&id)
    }

    pub fn order(&self) -> &[LayerId] {
        &self.order
    }

    /// Layers bottom to top.
    pub fn layers_in_order(&self) -> impl Iterator<Item = &LayerModel> + '_ {
        self.order.iter().filter_map(|id| self.layers.get(id))
    }

    pub fn position_of(&self, id: LayerId) -> Option<usize> {
        self.order.iter().position(|x| *x == id)
    }

    /// Highest layer id present, if any.
    pub fn max_layer_id(&self) -> Option<LayerId> {
        self.order.iter().copied().max()
    }

    pub fn check_invariants(&self) -> bool {
        if self.order.len() != self.layers.len() {
            return false;
        }
        let mut seen = FxHashSet::default();
        self.order
            .iter()
            .all(|id| seen.insert(*id) && self.layers.get(id).is_some_and(|l| l.id == *id))
    }

    // --- Write Logic ---

    /// Creates a blank layer on top. Returns false if the id already exists.
    pub fn create_layer(&mut self, id: LayerId, factory: &dyn CanvasProxyFactory) -> bool {
        if self.contains(id) {
            return false;
        }
        self.insert_layer(LayerModel::blank(id, self.size, factory));
        true
    }

    /// Pushes an existing layer on top, replacing nothing.
    pub(crate) fn insert_layer(&mut self, layer: LayerModel) {
        let id = layer.id;
        if self.layers.insert(id, layer).is_none() {
            self.order.push(id);
        }
        debug_assert!(self.check_invariants());
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<LayerModel, ExecutionError> {
        let layer = self.layers.remove(&id).ok_or(ExecutionError::LayerNotFound(id))?;
        self.order.retain(|x| *x != id);
        debug_assert!(self.check_invariants());
        Ok(layer)
    }

    /// Checks that `order` is a permutation of the current layer ids.
    pub fn validate_order(&self, order: &[LayerId]) -> Result<(), ValidationError> {
        let mismatch = ValidationError::OrderMismatch {
            expected: self.layers.len(),
            found: order.len(),
        };
        if order.len() != self.layers.len() {
            return Err(mismatch);
        }
        let mut seen = FxHashSet::default();
        for id in order {
            if !self.layers.contains_key(id) || !seen.insert(*id) {
                return Err(mismatch);
            }
        }
        Ok(())
    }

    pub fn set_layer_order(&mut self, order: &[LayerId]) -> Result<(), ValidationError> {
        self.validate_order(order)?;
        self.order = order.to_vec();
        debug_assert!(self.check_invariants());
        Ok(())
    }

    /// Deep copy; every raster is duplicated through `factory`.
    pub fn clone_with(&self, factory: &dyn CanvasProxyFactory) -> Result<CanvasModel, RasterError> {
        let mut layers = FxHashMap::default();
        for layer in self.layers_in_order() {
            layers.insert(layer.id, layer.clone_with(factory)?);
        }
        Ok(CanvasModel {
            size: self.size,
            layers,
            order: self.order.clone(),
        })
    }
}
