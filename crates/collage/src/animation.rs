//! Declarative animation descriptors handed to the host's scheduler.
//!
//! Nothing here drives frames. A descriptor states where a property starts,
//! where it ends, how long it takes, how it eases, and whether it loops. The
//! `sample` helpers evaluate a descriptor at a point in time so hosts without
//! a native animation engine (and tests) can reproduce what a compositor
//! would show.
use serde::Serialize;

use crate::geometry::Point;

/// Layer transform: translate first, then scale about the layer centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub translate: Point,
    pub scale: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translate: Point::ZERO,
        scale: 1.0,
    };

    pub fn new(translate: Point, scale: f64) -> Self {
        Self { translate, scale }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyPath {
    #[serde(rename = "transform")]
    Transform,
    #[serde(rename = "opacity")]
    Opacity,
    #[serde(rename = "position.x")]
    PositionX,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnimationValue {
    Scalar(f64),
    Transform(Transform),
}

impl AnimationValue {
    fn lerp(self, to: AnimationValue, t: f64) -> AnimationValue {
        match (self, to) {
            (AnimationValue::Scalar(a), AnimationValue::Scalar(b)) => {
                AnimationValue::Scalar(a + (b - a) * t)
            }
            (AnimationValue::Transform(a), AnimationValue::Transform(b)) => {
                AnimationValue::Transform(Transform {
                    translate: Point::new(
                        a.translate.x + (b.translate.x - a.translate.x) * t,
                        a.translate.y + (b.translate.y - a.translate.y) * t,
                    ),
                    scale: a.scale + (b.scale - a.scale) * t,
                })
            }
            // Mismatched kinds cannot blend; hold the start value until the end.
            (from, to) => {
                if t >= 1.0 {
                    to
                } else {
                    from
                }
            }
        }
    }
}

/// Timing curve, expressed the way compositors take it: as cubic-bezier
/// control points between (0, 0) and (1, 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingCurve {
    Linear,
    EaseOut,
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl TimingCurve {
    /// The strong ease-out used for the cover fly-in.
    pub const FLY_IN: TimingCurve = TimingCurve::CubicBezier {
        x1: 0.22,
        y1: 1.0,
        x2: 0.36,
        y2: 1.0,
    };

    pub fn control_points(self) -> [f64; 4] {
        match self {
            TimingCurve::Linear => [0.0, 0.0, 1.0, 1.0],
            TimingCurve::EaseOut => [0.0, 0.0, 0.58, 1.0],
            TimingCurve::CubicBezier { x1, y1, x2, y2 } => [x1, y1, x2, y2],
        }
    }

    pub fn sample(self, t: f64) -> f64 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            TimingCurve::Linear => clamped,
            _ => {
                let [x1, y1, x2, y2] = self.control_points();
                let u = solve_bezier_parameter(clamped, x1, x2);
                bezier_component(u, y1, y2)
            }
        }
    }
}

fn bezier_component(u: f64, p1: f64, p2: f64) -> f64 {
    let inv = 1.0 - u;
    3.0 * inv * inv * u * p1 + 3.0 * inv * u * u * p2 + u * u * u
}

fn bezier_slope(u: f64, p1: f64, p2: f64) -> f64 {
    let inv = 1.0 - u;
    3.0 * inv * inv * p1 + 6.0 * inv * u * (p2 - p1) + 3.0 * u * u * (1.0 - p2)
}

/// Finds `u` with `x(u) == x`; Newton first, bisection when the slope flattens.
fn solve_bezier_parameter(x: f64, x1: f64, x2: f64) -> f64 {
    let mut u = x;
    for _ in 0..8 {
        let error = bezier_component(u, x1, x2) - x;
        if error.abs() < 1e-7 {
            return u;
        }
        let slope = bezier_slope(u, x1, x2);
        if slope.abs() < 1e-6 {
            break;
        }
        u = (u - error / slope).clamp(0.0, 1.0);
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    u = x;
    for _ in 0..64 {
        let value = bezier_component(u, x1, x2);
        if (value - x).abs() < 1e-7 {
            break;
        }
        if value < x {
            lo = u;
        } else {
            hi = u;
        }
        u = (lo + hi) / 2.0;
    }
    u
}

/// How a delayed animation behaves before its begin time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillMode {
    /// Not in effect until it begins.
    Removed,
    /// Shows the `from` values while waiting to begin.
    Backwards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Repeat {
    Once,
    Forever,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicAnimation {
    pub key_path: KeyPath,
    pub from: AnimationValue,
    pub to: AnimationValue,
    pub duration: f64,
    pub curve: TimingCurve,
    pub repeat: Repeat,
}

impl BasicAnimation {
    /// Value at `elapsed` seconds after the animation began.
    ///
    /// Returns `None` once a non-repeating animation has finished; the layer's
    /// own value applies from then on.
    pub fn sample(&self, elapsed: f64) -> Option<AnimationValue> {
        if self.duration <= 0.0 {
            return None;
        }
        let elapsed = elapsed.max(0.0);
        let progress = match self.repeat {
            Repeat::Forever => (elapsed % self.duration) / self.duration,
            Repeat::Once if elapsed >= self.duration => return None,
            Repeat::Once => elapsed / self.duration,
        };
        Some(self.from.lerp(self.to, self.curve.sample(progress)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationGroup {
    pub animations: Vec<BasicAnimation>,
    /// Seconds between installation and the group's begin time.
    pub delay: f64,
    pub duration: f64,
    pub fill: FillMode,
    pub removed_on_completion: bool,
}

impl AnimationGroup {
    /// Values in effect `elapsed` seconds after installation.
    ///
    /// Children that already finished inside a still-running group are omitted
    /// so the model value shows through for that property.
    pub fn sample(&self, elapsed: f64) -> Option<Vec<(KeyPath, AnimationValue)>> {
        if elapsed < self.delay {
            return match self.fill {
                FillMode::Backwards => Some(
                    self.animations
                        .iter()
                        .map(|anim| (anim.key_path, anim.from))
                        .collect(),
                ),
                FillMode::Removed => None,
            };
        }
        let local = elapsed - self.delay;
        if local >= self.duration {
            return None;
        }
        Some(
            self.animations
                .iter()
                .filter_map(|anim| anim.sample(local).map(|value| (anim.key_path, value)))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Animation {
    Basic(BasicAnimation),
    Group(AnimationGroup),
}

impl Animation {
    pub fn is_repeating(&self) -> bool {
        match self {
            Animation::Basic(anim) => anim.repeat == Repeat::Forever,
            Animation::Group(_) => false,
        }
    }
}
