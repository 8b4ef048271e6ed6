use std::f64::consts::FRAC_PI_2;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::display::{DisplayHandle, DisplayMode};
use crate::geometry::{Affine, Rect, Size};
use crate::screen::PixelBuffer;

/// Quarter-turn rotation applied to mirrored content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Identity,
    /// +90°, clockwise in a y-up frame.
    /// On a y-down raster the top edge lands on the left.
    Clockwise90,
    /// -90°, counter-clockwise in a y-up frame.
    /// On a y-down raster the top edge lands on the right.
    CounterClockwise90,
}

impl Rotation {
    /// Angle in degrees, clockwise positive
    pub fn degrees(&self) -> i32 {
        match self {
            Self::Identity => 0,
            Self::Clockwise90 => 90,
            Self::CounterClockwise90 => -90,
        }
    }

    /// Angle handed to `Affine::rotation`, normalized into (-π, π].
    /// `Clockwise90` is -π/2, the same turn as 3π/2.
    pub fn radians(&self) -> f64 {
        match self {
            Self::Identity => 0.0,
            Self::Clockwise90 => -FRAC_PI_2,
            Self::CounterClockwise90 => FRAC_PI_2,
        }
    }

    /// Rotation applied to mirrored content in surface pixel coordinates
    pub fn raster_affine(&self) -> Affine {
        Affine::rotation(self.radians())
    }
}

/// Where mirrored content lands on the target surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorLayout {
    /// Main display bounds being mirrored
    pub source: Size,
    /// Target surface size, equal to the active display mode
    pub target: Size,
    /// Uniform scale from source to mirror rectangle
    pub scale: f64,
    /// Scaled source bounds centered on the target surface
    pub mirror_rect: Rect,
}

/// Transform state of an active mirror
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorTransform {
    /// Rotation of the mirrored content inside the mirror rectangle
    pub rotation: Rotation,
    /// Scale of the whole output surface about its center
    pub surface_scale: f64,
}

/// An output surface bound to one external display
pub trait PresentationSurface: Send {
    /// Replace the displayed image. Must be called from the UI-affine context.
    fn present(&mut self, frame: &PixelBuffer, transform: &MirrorTransform) -> Result<()>;

    /// Scale the whole surface about its center
    fn set_surface_scale(&mut self, scale: f64, animated: bool);

    /// Rotate the mirrored content about the mirror rectangle center
    fn set_content_rotation(&mut self, rotation: Rotation, animated: bool);
}

pub trait SurfaceProvider: Send + Sync {
    /// Create a surface covering `mode` on `display`. Dropping it releases the surface.
    fn create_surface(
        &self,
        display: DisplayHandle,
        mode: DisplayMode,
        layout: &MirrorLayout,
    ) -> Result<Box<dyn PresentationSurface>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn close(p: Point, x: f64, y: f64) -> bool {
        (p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9
    }

    #[test]
    fn test_clockwise_matches_three_half_turn() {
        let turn = Affine::rotation(std::f64::consts::PI * 1.5);
        let ours = Rotation::Clockwise90.raster_affine();
        let p = Point::new(1.0, 0.0);
        assert!(close(ours.apply(p), turn.apply(p).x, turn.apply(p).y));
        // +x maps to up in a y-down raster
        assert!(close(ours.apply(p), 0.0, -1.0));
    }

    #[test]
    fn test_counter_clockwise_matches_negative_three_half_turn() {
        let turn = Affine::rotation(std::f64::consts::PI * -1.5);
        let ours = Rotation::CounterClockwise90.raster_affine();
        let p = Point::new(1.0, 0.0);
        assert!(close(ours.apply(p), turn.apply(p).x, turn.apply(p).y));
        assert!(close(ours.apply(p), 0.0, 1.0));
    }

    #[test]
    fn test_identity_is_identity() {
        let p = Point::new(3.0, -2.0);
        assert!(close(Rotation::Identity.raster_affine().apply(p), 3.0, -2.0));
    }
}
