//! Depth-to-color mapping for the debug display.
//!
//! View only: reads the current gesture state, never feeds back into it.

use crate::types::{ColorFrame, DepthFrame, GestureState, Rgb};
use crate::Result;

/// Player id meaning "no body at this pixel".
pub const PLAYER_NONE: u8 = 0;
/// Player id the sensor reserves for out-of-range pixels.
pub const PLAYER_OUT_OF_RANGE: u8 = 7;

const PLAYER_MASK: u16 = 0x0007;
const DEPTH_SHIFT: u16 = 3;
const DEPTH_FULL_SCALE: u32 = 0x0FFF;
/// Depth bits 1..4 as they sit in the raw sample.
const BAND_MASK: u16 = 0x00F0;

#[derive(Debug, Clone, PartialEq)]
pub struct ColorizerConfig {
    /// Intensity is clamped into [floor, ceiling] before scaling brightness.
    pub intensity_floor: f32,
    pub intensity_ceiling: f32,
    /// Also dim the per-player palette by the clamped intensity.
    pub dim_palette: bool,
}

impl Default for ColorizerConfig {
    fn default() -> Self {
        Self {
            intensity_floor: 0.2,
            intensity_ceiling: 1.0,
            dim_palette: false,
        }
    }
}

/// What the colorizer needs to know about the engine this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorizeContext {
    /// Skeleton slot in control, if any.
    pub controlling_slot: Option<usize>,
    pub state: GestureState,
}

/// Split a raw sample into (13-bit depth, 3-bit player id).
pub fn split_sample(sample: u16) -> (u16, u8) {
    (sample >> DEPTH_SHIFT, (sample & PLAYER_MASK) as u8)
}

/// Closer is brighter. Depths past full scale wrap like the sensor viewer did.
pub fn base_luminance(depth: u16) -> u8 {
    255 - ((256 * depth as u32) / DEPTH_FULL_SCALE) as u8
}

/// Fixed color per player id, scaled by `lum`.
pub fn palette(player: u8, lum: u8) -> Rgb {
    match player {
        0 => Rgb::gray(lum / 2),
        1 => Rgb::new(lum, 0, 0),
        2 => Rgb::new(0, lum, 0),
        3 => Rgb::new(lum / 4, lum, lum),
        4 => Rgb::new(lum, lum, lum / 4),
        5 => Rgb::new(lum, lum / 4, lum),
        6 => Rgb::new(lum / 2, lum / 2, lum),
        _ => Rgb::gray(255 - lum / 2),
    }
}

fn scale(value: u8, factor: f32) -> u8 {
    (value as f32 * factor) as u8
}

/// Color one raw depth sample.
pub fn colorize_sample(sample: u16, ctx: &ColorizeContext, config: &ColorizerConfig) -> Rgb {
    let (depth, player) = split_sample(sample);
    let lum = base_luminance(depth);

    let controlling = player != PLAYER_NONE
        && ctx.controlling_slot.map(|slot| slot + 1) == Some(player as usize);

    if controlling && ctx.state.main_effect_on {
        let band = (((sample & BAND_MASK) >> 4) * 16) as u8;
        let state = &ctx.state;
        return if state.yellow_on {
            Rgb::new(band, band, 0)
        } else if state.red_on {
            Rgb::new(band, 0, 0)
        } else if state.green_on {
            Rgb::new(0, band, 0)
        } else {
            Rgb::gray(band)
        };
    }

    let lum = if config.dim_palette {
        let factor = ctx
            .state
            .intensity
            .clamp(config.intensity_floor, config.intensity_ceiling);
        scale(lum, factor)
    } else {
        lum
    };
    palette(player, lum)
}

/// Color `samples` into `out`, pixel for pixel. Extra output pixels are left untouched.
pub fn colorize_into(
    samples: &[u16],
    ctx: &ColorizeContext,
    config: &ColorizerConfig,
    out: &mut [Rgb],
) {
    for (pixel, &sample) in out.iter_mut().zip(samples) {
        *pixel = colorize_sample(sample, ctx, config);
    }
}

/// Color a whole depth frame. Rejects buffers of the wrong size.
pub fn colorize_frame(
    frame: &DepthFrame,
    ctx: &ColorizeContext,
    config: &ColorizerConfig,
) -> Result<ColorFrame> {
    frame.validate()?;
    let mut pixels = vec![Rgb::default(); frame.samples.len()];
    colorize_into(&frame.samples, ctx, config, &mut pixels);
    Ok(ColorFrame {
        timestamp_ms: frame.timestamp_ms,
        pixels,
    })
}
