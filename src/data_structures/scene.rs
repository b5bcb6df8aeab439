//! Everything the renderer draws in a frame.
//!
//! The scene owns its renderables, quad batches and lights and hands out stable
//! ids for them. Flows mutate it during update; the renderer only borrows it.

use std::collections::BTreeMap;

use crate::data_structures::{
    light::{AmbientSettings, DirectionalLight, PointLight, SpotLight},
    quad_batch::QuadBatch,
    renderable::Renderable,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderableId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuadBatchId(u32);

/// Id of any light, regardless of its kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(u32);

#[derive(Debug, Default)]
pub struct Scene {
    next_id: u32,
    renderables: BTreeMap<RenderableId, Renderable>,
    quad_batches: BTreeMap<QuadBatchId, QuadBatch>,
    directional_lights: BTreeMap<LightId, DirectionalLight>,
    point_lights: BTreeMap<LightId, PointLight>,
    spot_lights: BTreeMap<LightId, SpotLight>,
    ambient: AmbientSettings,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_renderable(&mut self, renderable: Renderable) -> RenderableId {
        let id = RenderableId(self.next_id());
        self.renderables.insert(id, renderable);
        id
    }

    pub fn remove_renderable(&mut self, id: RenderableId) -> Option<Renderable> {
        self.renderables.remove(&id)
    }

    pub fn renderable(&self, id: RenderableId) -> Option<&Renderable> {
        self.renderables.get(&id)
    }

    pub fn renderable_mut(&mut self, id: RenderableId) -> Option<&mut Renderable> {
        self.renderables.get_mut(&id)
    }

    pub fn renderables(&self) -> impl Iterator<Item = (RenderableId, &Renderable)> {
        self.renderables.iter().map(|(id, r)| (*id, r))
    }

    /// Renderables grouped by material; insertion order within a material.
    pub fn sorted_renderables(&self) -> Vec<&Renderable> {
        let mut sorted: Vec<&Renderable> = self.renderables.values().collect();
        sorted.sort_by_key(|r| r.material);
        sorted
    }

    pub fn add_quad_batch(&mut self, batch: QuadBatch) -> QuadBatchId {
        let id = QuadBatchId(self.next_id());
        self.quad_batches.insert(id, batch);
        id
    }

    pub fn remove_quad_batch(&mut self, id: QuadBatchId) -> Option<QuadBatch> {
        self.quad_batches.remove(&id)
    }

    pub fn quad_batch_mut(&mut self, id: QuadBatchId) -> Option<&mut QuadBatch> {
        self.quad_batches.get_mut(&id)
    }

    /// Quad batches grouped by material.
    pub fn sorted_quad_batches(&self) -> Vec<&QuadBatch> {
        let mut sorted: Vec<&QuadBatch> = self.quad_batches.values().collect();
        sorted.sort_by_key(|b| b.material());
        sorted
    }

    pub fn add_directional_light(&mut self, light: DirectionalLight) -> LightId {
        let id = LightId(self.next_id());
        self.directional_lights.insert(id, light);
        id
    }

    pub fn add_point_light(&mut self, light: PointLight) -> LightId {
        let id = LightId(self.next_id());
        self.point_lights.insert(id, light);
        id
    }

    pub fn add_spot_light(&mut self, light: SpotLight) -> LightId {
        let id = LightId(self.next_id());
        self.spot_lights.insert(id, light);
        id
    }

    /// Remove a light of any kind. Returns whether something was removed.
    pub fn remove_light(&mut self, id: LightId) -> bool {
        self.directional_lights.remove(&id).is_some()
            || self.point_lights.remove(&id).is_some()
            || self.spot_lights.remove(&id).is_some()
    }

    pub fn directional_light_mut(&mut self, id: LightId) -> Option<&mut DirectionalLight> {
        self.directional_lights.get_mut(&id)
    }

    pub fn point_light_mut(&mut self, id: LightId) -> Option<&mut PointLight> {
        self.point_lights.get_mut(&id)
    }

    pub fn spot_light_mut(&mut self, id: LightId) -> Option<&mut SpotLight> {
        self.spot_lights.get_mut(&id)
    }

    pub fn directional_lights(&self) -> impl ExactSizeIterator<Item = &DirectionalLight> {
        self.directional_lights.values()
    }

    pub fn point_lights(&self) -> impl ExactSizeIterator<Item = &PointLight> {
        self.point_lights.values()
    }

    pub fn spot_lights(&self) -> impl ExactSizeIterator<Item = &SpotLight> {
        self.spot_lights.values()
    }

    pub fn ambient(&self) -> &AmbientSettings {
        &self.ambient
    }

    pub fn set_ambient(&mut self, ambient: AmbientSettings) {
        self.ambient = ambient;
    }

    pub fn clear(&mut self) {
        self.renderables.clear();
        self.quad_batches.clear();
        self.directional_lights.clear();
        self.point_lights.clear();
        self.spot_lights.clear();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::resources::AssetHandle;

    fn renderable(material: u32) -> Renderable {
        Renderable::new(AssetHandle::from_raw(0), AssetHandle::from_raw(material))
    }

    #[test]
    fn renderables_come_back_grouped_by_material() {
        let mut scene = Scene::new();
        for m in [3, 1, 3, 2, 1] {
            scene.add_renderable(renderable(m));
        }
        let materials: Vec<u32> = scene
            .sorted_renderables()
            .iter()
            .map(|r| r.material.id())
            .collect();
        assert_eq!(materials, vec![1, 1, 2, 3, 3]);
    }

    #[test]
    fn removal_is_by_id_and_ids_are_not_reused() {
        let mut scene = Scene::new();
        let a = scene.add_renderable(renderable(1));
        let b = scene.add_renderable(renderable(2));
        assert_eq!(scene.remove_renderable(a).map(|r| r.material.id()), Some(1));
        assert!(scene.remove_renderable(a).is_none());
        let c = scene.add_renderable(renderable(3));
        assert_ne!(c, a);
        assert!(scene.renderable(b).is_some());
        assert_eq!(scene.renderables().count(), 2);
    }

    #[test]
    fn lights_share_one_id_space() {
        let mut scene = Scene::new();
        let sun = scene.add_directional_light(DirectionalLight::default());
        let lamp = scene.add_point_light(PointLight::new(
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(1.0, 0.5, 0.2),
        ));
        assert_ne!(sun, lamp);
        assert_eq!(scene.point_lights().len(), 1);
        assert!(scene.point_light_mut(sun).is_none());
        assert!(scene.remove_light(lamp));
        assert!(!scene.remove_light(lamp));
        assert_eq!(scene.point_lights().len(), 0);
        assert_eq!(scene.directional_lights().len(), 1);
    }
}
