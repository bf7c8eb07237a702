//! Distance/angle positioning and its stereo encoding

use glam::Vec2;

/// Largest distance the mixer understands. Farther sounds are clamped to it.
pub const MAX_DISTANCE: u8 = 255;

/// Fraction of the volume removed at [`MAX_DISTANCE`]. Far sounds stay audible.
const MAX_ATTENUATION: f32 = 0.9;

/// Clamps a caller supplied distance into the mixer range.
///
/// Values above 255 become 255. Negative values and NaN become 0.
pub fn clamp_distance(distance: f32) -> u8 {
    if distance.is_nan() || distance <= 0.0 {
        0
    } else if distance >= MAX_DISTANCE as f32 {
        MAX_DISTANCE
    } else {
        distance as u8
    }
}

/// A position as the mixer receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Compass bearing in degrees: 0 ahead, 90 right, 180 behind, 270 left.
    /// Passed through as given, wrapping modulo 360.
    pub angle: i16,
    pub distance: u8,
}

impl Position {
    pub fn new(distance: f32, angle: i16) -> Self {
        Self {
            angle,
            distance: clamp_distance(distance),
        }
    }

    /// The bearing normalized into `0..360`.
    pub fn bearing(&self) -> u16 {
        self.angle.rem_euclid(360) as u16
    }
}

/// Per-side gains applied to one mixer channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoGains {
    pub left: f32,
    pub right: f32,
}

impl StereoGains {
    pub const UNITY: Self = Self {
        left: 1.0,
        right: 1.0,
    };

    pub fn from_position(position: Position) -> Self {
        let direction = Vec2::from_angle((position.bearing() as f32).to_radians());
        // y is the right-hand component of the bearing
        let pan = direction.y;
        let attenuation =
            1.0 - MAX_ATTENUATION * (position.distance as f32 / MAX_DISTANCE as f32);

        Self {
            left: (1.0 - pan).clamp(0.0, 1.0) * attenuation,
            right: (1.0 + pan).clamp(0.0, 1.0) * attenuation,
        }
    }

    /// Applies the gains to one interleaved frame.
    pub fn apply(&self, frame: &mut [f32]) {
        match frame {
            [left, right, ..] => {
                *left *= self.left;
                *right *= self.right;
            }
            [mono] => *mono *= (self.left + self.right) * 0.5,
            [] => {}
        }
    }
}

impl Default for StereoGains {
    fn default() -> Self {
        Self::UNITY
    }
}
