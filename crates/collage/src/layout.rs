//! Cover-grid layout: tiles the viewport with rows of square covers, assigns a
//! shuffled image to every slot, and describes the fly-in entrance and the
//! endless horizontal scroll for the host's compositor.
//!
//! Types:
//!
//! - `GridParams` carries the tunables (gap, timings, orientation) resolved
//!   from `saverconfig`.
//! - `GridMetrics` holds the derived geometry for one viewport: tiles per row,
//!   cover edge, row count, and the width of one repeating set.
//! - `RowDescriptor`, `TileDescriptor`, and `VignetteDescriptor` are the
//!   immutable output of a pass, collected in `GridLayout`.
//!
//! Functions:
//!
//! - `layout` is the pure entry point. It returns `None` for an empty image
//!   set or a viewport without area, and never a partial grid.
//! - `tiles_per_row` and `set_index` expose the breakpoint table and the
//!   repetition formula on their own.
use std::time::Duration;

use saverconfig::{GridSection, Orientation};
use serde::Serialize;
use tracing::debug;

use crate::animation::{
    AnimationGroup, AnimationValue, BasicAnimation, FillMode, KeyPath, Repeat, TimingCurve,
    Transform,
};
use crate::geometry::{Point, Rect, Viewport};
use crate::random::RandomSource;
use crate::source::{CoverRef, ImageSet};

/// Offset between the starting images of consecutive rows.
pub const ROW_STRIDE: i64 = 7;
/// Copies of the image set laid end to end in every row.
pub const SET_REPEATS: usize = 4;
pub const VIGNETTE_Z: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GridParams {
    pub gap: f64,
    pub scroll_period: Duration,
    pub fly_in: Duration,
    pub fade_in: Duration,
    pub max_fly_delay: Duration,
    pub fly_scale: f64,
    pub fly_spread: f64,
    pub orientation: Orientation,
}

impl GridParams {
    pub fn from_config(section: &GridSection) -> Self {
        Self {
            gap: section.gap,
            scroll_period: section.scroll_period,
            fly_in: section.fly_in,
            fade_in: section.fade_in,
            max_fly_delay: section.max_fly_delay,
            fly_scale: section.fly_scale,
            fly_spread: section.fly_spread,
            orientation: section.orientation,
        }
    }
}

impl Default for GridParams {
    fn default() -> Self {
        Self::from_config(&GridSection::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Scrolls toward negative x.
    Left,
    Right,
}

impl Direction {
    fn for_row(row_index: usize) -> Self {
        if row_index % 2 == 1 {
            Direction::Right
        } else {
            Direction::Left
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridMetrics {
    pub tiles_per_row: usize,
    pub cover_size: f64,
    pub row_count: usize,
    /// Covers in one repeating set (`tiles_per_row + 1`).
    pub set_count: usize,
    /// Width of one un-repeated set, gaps included. Also the scroll distance.
    pub set_width: f64,
    /// Horizontal brick offset applied to right-scrolling rows.
    pub stagger: f64,
    pub gap: f64,
}

impl GridMetrics {
    pub fn compute(viewport: Viewport, gap: f64) -> Option<Self> {
        if !viewport.is_drawable() {
            return None;
        }
        let tiles_per_row = tiles_per_row(viewport.width);
        let cover_size = (viewport.width / tiles_per_row as f64).ceil();
        let pitch = cover_size + gap;
        let row_count = (viewport.height / pitch).ceil() as usize + 1;
        let set_count = tiles_per_row + 1;
        Some(Self {
            tiles_per_row,
            cover_size,
            row_count,
            set_count,
            set_width: pitch * set_count as f64,
            stagger: (cover_size / 2.0).floor(),
            gap,
        })
    }

    /// Distance between the origins of neighbouring tiles or rows.
    pub fn pitch(&self) -> f64 {
        self.cover_size + self.gap
    }

    pub fn tiles_in_row(&self) -> usize {
        self.set_count * SET_REPEATS
    }
}

pub fn tiles_per_row(viewport_width: f64) -> usize {
    if viewport_width >= 1024.0 {
        8
    } else if viewport_width >= 640.0 {
        5
    } else {
        3
    }
}

/// Position in the shuffled image order for `slot` of row `row`.
///
/// Always in `[0, count)`; `count` must be at least 1.
pub fn set_index(row: i64, slot: i64, count: usize) -> usize {
    let n = count as i64;
    (((row * ROW_STRIDE + slot) % n + n) % n) as usize
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileDescriptor {
    pub image: CoverRef,
    /// Row-local x of the tile's left edge.
    pub x: f64,
    pub size: f64,
    /// Displacement the tile flies in from; zero for tiles far off-screen.
    pub fly_offset: Point,
    /// Seconds before the entrance begins.
    pub fly_delay: f64,
    pub resting: Transform,
    pub resting_opacity: f64,
    pub entrance: AnimationGroup,
}

impl TileDescriptor {
    pub fn frame(&self) -> Rect {
        Rect::new(self.x, 0.0, self.size, self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDescriptor {
    pub row_index: usize,
    pub y: f64,
    pub height: f64,
    pub direction: Direction,
    pub tiles: Vec<TileDescriptor>,
    pub scroll_distance: f64,
    /// Horizontal offset of the row when a scroll cycle starts.
    pub start_offset: f64,
    pub scroll: BasicAnimation,
}

impl RowDescriptor {
    /// The row's model frame; scrolling only ever moves its presentation.
    pub fn frame(&self, viewport: Viewport) -> Rect {
        Rect::new(0.0, self.y, viewport.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradientStop {
    pub location: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VignetteDescriptor {
    pub frame: Rect,
    pub stops: Vec<GradientStop>,
    /// Unit-space centre of the radial gradient.
    pub start: Point,
    /// Unit-space point where the gradient reaches its last stop.
    pub end: Point,
    pub z: f64,
}

impl VignetteDescriptor {
    fn covering(viewport: Viewport) -> Self {
        let stops = [(0.0, 0.0), (0.4, 0.0), (0.7, 0.15), (1.0, 0.35)]
            .into_iter()
            .map(|(location, alpha)| GradientStop { location, alpha })
            .collect();
        Self {
            frame: viewport.bounds(),
            stops,
            start: Point::new(0.5, 0.5),
            end: Point::new(1.0, 1.0),
            z: VIGNETTE_Z,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLayout {
    pub viewport: Viewport,
    pub metrics: GridMetrics,
    pub rows: Vec<RowDescriptor>,
    pub vignette: VignetteDescriptor,
}

impl GridLayout {
    pub fn tile_count(&self) -> usize {
        self.rows.iter().map(|row| row.tiles.len()).sum()
    }
}

pub fn layout<R>(
    viewport: Viewport,
    images: &ImageSet,
    params: &GridParams,
    rng: &mut R,
) -> Option<GridLayout>
where
    R: RandomSource + ?Sized,
{
    if images.is_empty() {
        debug!("no cover images available; declining to lay out grid");
        return None;
    }
    let Some(metrics) = GridMetrics::compute(viewport, params.gap) else {
        debug!(
            width = viewport.width,
            height = viewport.height,
            "viewport has no area; declining to lay out grid"
        );
        return None;
    };

    let count = images.len();
    let mut order: Vec<usize> = (0..count).collect();
    rng.shuffle(&mut order);

    let center = viewport.center();
    let pitch = metrics.pitch();
    let range_limit = metrics.set_width;
    let base_x = viewport.width / 2.0;

    let mut rows = Vec::with_capacity(metrics.row_count);
    for row_index in 0..metrics.row_count {
        let direction = Direction::for_row(row_index);
        let row_offset = match direction {
            Direction::Left => 0.0,
            Direction::Right => metrics.set_width + metrics.stagger,
        };

        let set: Vec<CoverRef> = (0..metrics.set_count)
            .map(|slot| CoverRef(order[set_index(row_index as i64, slot as i64, count)]))
            .collect();

        // Fly-in vectors use top-down coordinates; the orientation flips dy.
        let cover_y = row_index as f64 * pitch + metrics.cover_size / 2.0;
        let tiles = (0..metrics.tiles_in_row())
            .map(|slot| {
                let x = slot as f64 * pitch;
                let cover_x = x + metrics.cover_size / 2.0 - row_offset;
                let fly_offset = if cover_x >= -range_limit
                    && cover_x <= viewport.width + range_limit
                {
                    let dy = (cover_y - center.y) * params.fly_spread;
                    Point::new(
                        (cover_x - center.x) * params.fly_spread,
                        match params.orientation {
                            Orientation::BottomUp => -dy,
                            Orientation::TopDown => dy,
                        },
                    )
                } else {
                    Point::ZERO
                };
                let fly_delay = rng.unit() * params.max_fly_delay.as_secs_f64();
                TileDescriptor {
                    image: set[slot % set.len()],
                    x,
                    size: metrics.cover_size,
                    fly_offset,
                    fly_delay,
                    resting: Transform::IDENTITY,
                    resting_opacity: 1.0,
                    entrance: entrance_group(fly_offset, fly_delay, params),
                }
            })
            .collect();

        let y = match params.orientation {
            Orientation::BottomUp => viewport.height - (row_index + 1) as f64 * pitch,
            Orientation::TopDown => row_index as f64 * pitch,
        };

        rows.push(RowDescriptor {
            row_index,
            y,
            height: metrics.cover_size,
            direction,
            tiles,
            scroll_distance: metrics.set_width,
            start_offset: -row_offset,
            scroll: scroll_animation(direction, base_x, &metrics, params),
        });
    }

    debug!(
        tiles_per_row = metrics.tiles_per_row,
        cover_size = metrics.cover_size,
        rows = metrics.row_count,
        images = count,
        "computed cover grid layout"
    );

    Some(GridLayout {
        viewport,
        metrics,
        rows,
        vignette: VignetteDescriptor::covering(viewport),
    })
}

fn entrance_group(fly_offset: Point, delay: f64, params: &GridParams) -> AnimationGroup {
    let fly_in = params.fly_in.as_secs_f64();
    AnimationGroup {
        animations: vec![
            BasicAnimation {
                key_path: KeyPath::Transform,
                from: AnimationValue::Transform(Transform::new(fly_offset, params.fly_scale)),
                to: AnimationValue::Transform(Transform::IDENTITY),
                duration: fly_in,
                curve: TimingCurve::FLY_IN,
                repeat: Repeat::Once,
            },
            BasicAnimation {
                key_path: KeyPath::Opacity,
                from: AnimationValue::Scalar(0.0),
                to: AnimationValue::Scalar(1.0),
                duration: params.fade_in.as_secs_f64(),
                curve: TimingCurve::EaseOut,
                repeat: Repeat::Once,
            },
        ],
        delay,
        duration: fly_in,
        fill: FillMode::Backwards,
        removed_on_completion: true,
    }
}

fn scroll_animation(
    direction: Direction,
    base_x: f64,
    metrics: &GridMetrics,
    params: &GridParams,
) -> BasicAnimation {
    let distance = metrics.set_width;
    let (from, to) = match direction {
        Direction::Left => (base_x, base_x - distance),
        Direction::Right => (
            base_x - distance - metrics.stagger,
            base_x - metrics.stagger,
        ),
    };
    BasicAnimation {
        key_path: KeyPath::PositionX,
        from: AnimationValue::Scalar(from),
        to: AnimationValue::Scalar(to),
        duration: params.scroll_period.as_secs_f64(),
        curve: TimingCurve::Linear,
        repeat: Repeat::Forever,
    }
}
