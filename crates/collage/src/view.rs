//! The animated cover view: owns the layer tree built from a `GridLayout`
//! and keeps it in step with the host's lifecycle (show, resize, teardown).
//!
//! Layers are always installed at their resting geometry. Entrance and
//! scroll effects are attached through the `AnimationScheduler`, so losing an
//! animation never moves a cover away from where it belongs.
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::animation::{Animation, Transform};
use crate::geometry::{Rect, Viewport};
use crate::layout::{layout, GridLayout, GridParams};
use crate::random::RandomSource;
use crate::scheduler::{AnimationScheduler, LayerId};
use crate::source::{CoverRef, ImageSet, ImageSource};

pub const FLY_IN_KEY: &str = "flyIn";
pub const SCROLL_KEY: &str = "scroll";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerKind {
    Root,
    Row { index: usize },
    Tile { row: usize, slot: usize, image: CoverRef },
    Vignette,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    id: LayerId,
    kind: LayerKind,
    pub frame: Rect,
    pub transform: Transform,
    pub opacity: f64,
    pub z: f64,
    children: Vec<Layer>,
}

impl Layer {
    fn new(id: LayerId, kind: LayerKind, frame: Rect) -> Self {
        Self {
            id,
            kind,
            frame,
            transform: Transform::IDENTITY,
            opacity: 1.0,
            z: 0.0,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn children(&self) -> &[Layer] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Layer> {
        &mut self.children
    }

    /// Visits this layer and every descendant, parents first.
    pub fn walk(&self, visit: &mut impl FnMut(&Layer)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

pub struct GridView<S: AnimationScheduler> {
    images: ImageSet,
    params: GridParams,
    rng: Box<dyn RandomSource>,
    bounds: Viewport,
    built: bool,
    root: Layer,
    layout: Option<GridLayout>,
    next_id: u64,
    /// Every layer handed to the scheduler, attached to `root` or not.
    scheduled: BTreeSet<LayerId>,
    scheduler: S,
}

impl<S: AnimationScheduler> GridView<S> {
    /// Loads the image set once; it is never reloaded for the life of the view.
    pub fn new(
        bounds: Viewport,
        source: &dyn ImageSource,
        params: GridParams,
        rng: Box<dyn RandomSource>,
        scheduler: S,
    ) -> Self {
        let images = source.load();
        debug!(
            width = bounds.width,
            height = bounds.height,
            images = images.len(),
            "created cover grid view"
        );
        Self {
            images,
            params,
            rng,
            bounds,
            built: false,
            root: Layer::new(LayerId(0), LayerKind::Root, bounds.bounds()),
            layout: None,
            next_id: 1,
            scheduled: BTreeSet::new(),
            scheduler,
        }
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn bounds(&self) -> Viewport {
        self.bounds
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn root(&self) -> &Layer {
        &self.root
    }

    /// Direct access to the tree, for hosts that mirror it into native layers.
    pub fn root_mut(&mut self) -> &mut Layer {
        &mut self.root
    }

    pub fn layout(&self) -> Option<&GridLayout> {
        self.layout.as_ref()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn row_layer_count(&self) -> usize {
        self.root
            .children
            .iter()
            .filter(|layer| matches!(layer.kind, LayerKind::Row { .. }))
            .count()
    }

    /// Called when the view becomes visible.
    pub fn start_animation(&mut self) {
        debug!(
            width = self.bounds.width,
            height = self.bounds.height,
            built = self.built,
            images = self.images.len(),
            "start animation"
        );
        if self.built && self.row_layer_count() == 0 {
            info!("grid marked built but no rows are attached; rebuilding");
            self.built = false;
        }
        if !self.built && !self.images.is_empty() && self.bounds.width > 0.0 {
            self.built = self.build_grid();
        }
    }

    pub fn on_resize(&mut self, viewport: Viewport) {
        debug!(
            width = viewport.width,
            height = viewport.height,
            "viewport resized"
        );
        self.bounds = viewport;
        self.root.frame = viewport.bounds();
        self.built = false;
        self.clear_layers();
        if !self.images.is_empty() && viewport.width > 0.0 {
            self.built = self.build_grid();
        }
    }

    /// Replaces the layer tree with a fresh grid for the current bounds.
    ///
    /// Returns `false` without touching the tree when there are no images or
    /// the bounds have no area.
    pub fn build_grid(&mut self) -> bool {
        let Some(grid) = layout(self.bounds, &self.images, &self.params, self.rng.as_mut())
        else {
            return false;
        };
        self.clear_layers();

        for row in &grid.rows {
            let mut row_layer = Layer::new(
                self.allocate_id(),
                LayerKind::Row {
                    index: row.row_index,
                },
                row.frame(grid.viewport),
            );
            for (slot, tile) in row.tiles.iter().enumerate() {
                let mut tile_layer = Layer::new(
                    self.allocate_id(),
                    LayerKind::Tile {
                        row: row.row_index,
                        slot,
                        image: tile.image,
                    },
                    tile.frame(),
                );
                tile_layer.transform = tile.resting;
                tile_layer.opacity = tile.resting_opacity;
                self.schedule(
                    tile_layer.id,
                    FLY_IN_KEY,
                    &Animation::Group(tile.entrance.clone()),
                );
                row_layer.children.push(tile_layer);
            }
            self.schedule(row_layer.id, SCROLL_KEY, &Animation::Basic(row.scroll.clone()));
            self.root.children.push(row_layer);
        }

        let mut vignette = Layer::new(
            self.allocate_id(),
            LayerKind::Vignette,
            grid.vignette.frame,
        );
        vignette.z = grid.vignette.z;
        self.root.children.push(vignette);

        info!(
            rows = grid.rows.len(),
            tiles = grid.tile_count(),
            cover_size = grid.metrics.cover_size,
            "built cover grid"
        );
        self.layout = Some(grid);
        true
    }

    /// Cancels every animation in the tree, looping scrolls included.
    pub fn teardown(&mut self) {
        self.cancel_scheduled();
        self.root.children.clear();
        self.layout = None;
        self.built = false;
    }

    fn clear_layers(&mut self) {
        self.cancel_scheduled();
        self.root.children.clear();
        self.layout = None;
    }

    fn schedule(&mut self, layer: LayerId, key: &str, animation: &Animation) {
        self.scheduler.add(layer, key, animation);
        self.scheduled.insert(layer);
    }

    /// Layers the host detached from the tree are cancelled too.
    fn cancel_scheduled(&mut self) {
        for layer in std::mem::take(&mut self.scheduled) {
            self.scheduler.remove_all(layer);
        }
    }

    fn allocate_id(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl<S: AnimationScheduler> Drop for GridView<S> {
    fn drop(&mut self) {
        self.cancel_scheduled();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedRandom, SeededRandom};
    use crate::scheduler::ScheduleLog;
    use crate::source::CoverImage;

    fn images(count: usize) -> ImageSet {
        ImageSet::new(
            (0..count)
                .map(|i| CoverImage::solid(format!("{i}.jpg"), 1, 1, [0, 0, i as u8, 255]))
                .collect(),
        )
    }

    fn view(
        bounds: Viewport,
        count: usize,
        log: &mut ScheduleLog,
    ) -> GridView<&mut ScheduleLog> {
        GridView::new(
            bounds,
            &images(count),
            GridParams::default(),
            Box::new(SeededRandom::new(11)),
            log,
        )
    }

    fn tile_count(root: &Layer) -> usize {
        let mut count = 0;
        root.walk(&mut |layer| {
            if matches!(layer.kind(), LayerKind::Tile { .. }) {
                count += 1;
            }
        });
        count
    }

    #[test]
    fn builds_reference_grid() {
        let mut log = ScheduleLog::new();
        let mut grid = view(Viewport::new(1024.0, 800.0), 40, &mut log);
        grid.start_animation();
        assert!(grid.is_built());
        assert_eq!(grid.row_layer_count(), 8);
        assert_eq!(tile_count(grid.root()), 288);
        let vignettes = grid
            .root()
            .children()
            .iter()
            .filter(|layer| layer.kind() == LayerKind::Vignette)
            .count();
        assert_eq!(vignettes, 1);
        let last = grid.root().children().last().unwrap();
        assert_eq!(last.kind(), LayerKind::Vignette);
        assert_eq!(last.z, 100.0);
        assert_eq!(grid.scheduler().active_count(), 288 + 8);
    }

    #[test]
    fn declines_without_images_or_area() {
        let mut log = ScheduleLog::new();
        {
            let mut empty = view(Viewport::new(1024.0, 800.0), 0, &mut log);
            assert!(!empty.build_grid());
            empty.start_animation();
            assert!(!empty.is_built());
            assert_eq!(empty.root().descendant_count(), 0);
        }
        {
            let mut flat = view(Viewport::new(0.0, 800.0), 5, &mut log);
            assert!(!flat.build_grid());
            flat.start_animation();
            assert!(!flat.is_built());
            assert_eq!(flat.root().descendant_count(), 0);
        }
        assert_eq!(log.total_added(), 0);
    }

    #[test]
    fn zero_sized_view_builds_after_resize() {
        let mut log = ScheduleLog::new();
        let mut grid = view(Viewport::new(0.0, 0.0), 5, &mut log);
        grid.start_animation();
        assert!(!grid.is_built());
        grid.on_resize(Viewport::new(500.0, 400.0));
        assert!(grid.is_built());
        assert_eq!(grid.layout().unwrap().metrics.tiles_per_row, 3);
    }

    #[test]
    fn resize_replaces_every_layer() {
        let mut log = ScheduleLog::new();
        let mut grid = view(Viewport::new(1024.0, 800.0), 40, &mut log);
        grid.start_animation();
        let mut old_ids = Vec::new();
        grid.root().walk(&mut |layer| old_ids.push(layer.id()));

        grid.on_resize(Viewport::new(700.0, 400.0));
        assert!(grid.is_built());
        let metrics = grid.layout().unwrap().metrics;
        assert_eq!(metrics.tiles_per_row, 5);
        assert_eq!(grid.row_layer_count(), metrics.row_count);

        let mut fresh = 0;
        grid.root().walk(&mut |layer| {
            if layer.kind() != LayerKind::Root {
                assert!(!old_ids.contains(&layer.id()));
                fresh += 1;
            }
        });
        assert_eq!(fresh, grid.root().descendant_count());
        drop(grid);
        assert_eq!(log.total_cancelled(), log.total_added());
    }

    #[test]
    fn resize_cancels_old_animations_before_installing_new_ones() {
        let mut log = ScheduleLog::new();
        let mut grid = view(Viewport::new(1024.0, 800.0), 40, &mut log);
        grid.start_animation();
        grid.on_resize(Viewport::new(500.0, 300.0));
        let metrics = grid.layout().unwrap().metrics;
        let expected = metrics.row_count * (metrics.tiles_in_row() + 1);
        assert_eq!(grid.scheduler().active_count(), expected);
        assert_eq!(grid.scheduler().total_cancelled(), 288 + 8);
    }

    #[test]
    fn start_animation_keeps_existing_grid() {
        let mut log = ScheduleLog::new();
        let mut grid = view(Viewport::new(1024.0, 800.0), 40, &mut log);
        grid.start_animation();
        let first = grid.root().children()[0].id();
        grid.start_animation();
        assert_eq!(grid.root().children()[0].id(), first);
        assert_eq!(grid.scheduler().total_added(), 288 + 8);
    }

    #[test]
    fn rebuilds_when_rows_vanish() {
        let mut log = ScheduleLog::new();
        let mut grid = view(Viewport::new(1024.0, 800.0), 40, &mut log);
        grid.start_animation();
        // Host dropped its layers behind our back; only the vignette survives.
        grid.root_mut()
            .children_mut()
            .retain(|layer| layer.kind() == LayerKind::Vignette);
        assert!(grid.is_built());
        grid.start_animation();
        assert!(grid.is_built());
        assert_eq!(grid.row_layer_count(), 8);
        assert_eq!(grid.scheduler().active_count(), 288 + 8);
        assert_eq!(grid.scheduler().total_cancelled(), 288 + 8);
    }

    #[test]
    fn detached_rows_are_cancelled_on_teardown_and_drop() {
        let mut log = ScheduleLog::new();
        {
            let mut grid = view(Viewport::new(1024.0, 800.0), 40, &mut log);
            grid.start_animation();
            grid.root_mut().children_mut().truncate(3);
            grid.teardown();
            assert_eq!(grid.scheduler().active_count(), 0);
        }
        {
            let mut grid = view(Viewport::new(1024.0, 800.0), 40, &mut log);
            grid.start_animation();
            grid.root_mut().children_mut().clear();
        }
        assert_eq!(log.active_count(), 0);
        assert_eq!(log.total_cancelled(), log.total_added());
    }

    #[test]
    fn infinite_bounds_never_build() {
        let mut log = ScheduleLog::new();
        let mut grid = view(Viewport::new(1024.0, f64::INFINITY), 5, &mut log);
        grid.start_animation();
        assert!(!grid.is_built());
        grid.on_resize(Viewport::new(f64::INFINITY, 800.0));
        assert!(!grid.is_built());
        assert_eq!(grid.root().descendant_count(), 0);
        drop(grid);
        assert_eq!(log.total_added(), 0);
    }

    #[test]
    fn teardown_cancels_everything() {
        let mut log = ScheduleLog::new();
        {
            let mut grid = view(Viewport::new(1280.0, 720.0), 9, &mut log);
            grid.start_animation();
            assert!(grid.scheduler().active_count() > 0);
            grid.teardown();
            assert!(!grid.is_built());
            assert_eq!(grid.scheduler().active_count(), 0);
        }
        {
            let mut grid = view(Viewport::new(1280.0, 720.0), 9, &mut log);
            grid.start_animation();
        }
        assert_eq!(log.active_count(), 0);
    }

    #[test]
    fn resting_geometry_survives_animation_loss() {
        let mut log = ScheduleLog::new();
        let mut grid = GridView::new(
            Viewport::new(1024.0, 800.0),
            &images(40),
            GridParams::default(),
            Box::new(ScriptedRandom::constant(0.3)),
            &mut log,
        );
        grid.start_animation();
        let tile_ids: Vec<LayerId> = grid.root().children()[0]
            .children()
            .iter()
            .map(Layer::id)
            .collect();
        let mut snapshot = Vec::new();
        grid.root().walk(&mut |layer| {
            snapshot.push((layer.id(), layer.frame, layer.transform, layer.opacity))
        });
        drop(grid);
        for id in &tile_ids {
            assert!(log.get(*id, FLY_IN_KEY).is_none());
        }
        for (_, frame, transform, opacity) in snapshot.iter().skip(1) {
            assert!(transform.is_identity());
            assert_eq!(*opacity, 1.0);
            assert!(frame.width > 0.0);
        }
        let first_tile = snapshot[2];
        assert_eq!(first_tile.1, Rect::new(0.0, 0.0, 128.0, 128.0));
    }
}
