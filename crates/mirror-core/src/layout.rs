//! Mirror geometry: mode selection, fit scale, safe-area scale and rotation.

use mirror_platform::display::DisplayMode;
use mirror_platform::geometry::{Point, Rect, Size};
use mirror_platform::orientation::DeviceOrientation;
use mirror_platform::surface::{MirrorLayout, MirrorTransform, Rotation};

/// Surface scale that keeps content inside the TV-safe area
pub const SAFE_AREA_SCALE: f64 = 0.8;

/// Surface scale that zooms content past the overscanned edges
pub const OVERSCAN_SCALE: f64 = 1.25;

/// Pick the widest advertised mode. Ties keep the first mode enumerated.
pub fn select_mode(modes: &[DisplayMode]) -> Option<DisplayMode> {
    let mut best: Option<DisplayMode> = None;
    for mode in modes {
        match best {
            Some(current) if mode.width <= current.width => {}
            _ => best = Some(*mode),
        }
    }
    best
}

/// Fit `source` uniformly into `target` and center the result.
/// Returns `None` when either size is empty.
pub fn compute_layout(source: Size, target: Size) -> Option<MirrorLayout> {
    if source.is_empty() || target.is_empty() {
        return None;
    }

    let horiz = target.width / source.width;
    let vert = target.height / source.height;
    let scale = horiz.min(vert);

    let scaled = Size::new(source.width * scale, source.height * scale);
    let center = Point::new(target.width / 2.0, target.height / 2.0);

    Some(MirrorLayout {
        source,
        target,
        scale,
        mirror_rect: Rect::centered_on(center, scaled),
    })
}

pub fn surface_scale(safe_mode: bool) -> f64 {
    if safe_mode {
        SAFE_AREA_SCALE
    } else {
        OVERSCAN_SCALE
    }
}

/// Content rotation matching a device orientation
pub fn rotation_for(orientation: DeviceOrientation) -> Rotation {
    match orientation {
        DeviceOrientation::LandscapeLeft => Rotation::Clockwise90,
        DeviceOrientation::LandscapeRight => Rotation::CounterClockwise90,
        _ => Rotation::Identity,
    }
}

pub fn initial_transform(safe_mode: bool, orientation: DeviceOrientation) -> MirrorTransform {
    MirrorTransform {
        rotation: rotation_for(orientation),
        surface_scale: surface_scale(safe_mode),
    }
}
