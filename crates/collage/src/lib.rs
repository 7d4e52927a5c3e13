mod animation;
mod geometry;
mod layout;
mod random;
mod scheduler;
mod source;
mod view;

pub use animation::{
    Animation, AnimationGroup, AnimationValue, BasicAnimation, FillMode, KeyPath, Repeat,
    TimingCurve, Transform,
};
pub use geometry::{Point, Rect, Viewport};
pub use layout::{
    layout, set_index, tiles_per_row, Direction, GradientStop, GridLayout, GridMetrics,
    GridParams, RowDescriptor, TileDescriptor, VignetteDescriptor, ROW_STRIDE, SET_REPEATS,
    VIGNETTE_Z,
};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use scheduler::{AnimationScheduler, LayerId, ScheduleLog};
pub use source::{CoverImage, CoverRef, DirectorySource, ImageSet, ImageSource};
pub use view::{GridView, Layer, LayerKind, FLY_IN_KEY, SCROLL_KEY};
