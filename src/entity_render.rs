//! Entity layer
//!
//! Rebuilt every frame from the entity index. Each entity becomes one or two
//! draw ops carrying its pulse, rotation and glow.

use std::f64::consts::PI;

use crate::display::{DisplayOptions, RenderParams};
use crate::entities::EntityIndex;
use crate::surface::Rgb;

const WHITE: Rgb = (255, 255, 255);

/// Parse a CSS hex color (`#rgb` or `#rrggbb`). Anything else is white.
pub fn parse_hex_color(color: &str) -> Rgb {
    parse_hex(color).unwrap_or(WHITE)
}

fn parse_hex(color: &str) -> Option<Rgb> {
    let hex = color.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => {
            let mut channels = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            Some((channels.next()??, channels.next()??, channels.next()??))
        }
        6 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some((channel(0)?, channel(2)?, channel(4)?))
        }
        _ => None,
    }
}

/// Opacity and scale of the entity pulse
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pulse {
    pub opacity: f64,
    pub scale: f64,
}

impl Pulse {
    /// No pulse applied
    pub const REST: Pulse = Pulse { opacity: 1.0, scale: 1.0 };

    pub fn at_phase(phase: f64) -> Pulse {
        let s = (2.0 * PI * phase).sin() * 0.5 + 0.5;
        Pulse {
            opacity: 0.95 + 0.05 * (1.0 - s),
            scale: 1.0 + 0.015 * s,
        }
    }
}

/// Pulse phase that only advances once enough time has passed
#[derive(Clone, Debug)]
pub struct PulseClock {
    period_ms: f64,
    min_step_ms: f64,
    phase: f64,
    last_update_ms: f64,
}

impl PulseClock {
    pub fn new(params: &RenderParams) -> Self {
        Self {
            period_ms: params.pulse_period_ms,
            min_step_ms: params.pulse_min_step_ms,
            phase: 0.0,
            last_update_ms: 0.0,
        }
    }

    pub fn advance(&mut self, timestamp_ms: f64) -> f64 {
        if timestamp_ms - self.last_update_ms > self.min_step_ms {
            self.phase = (timestamp_ms / self.period_ms).rem_euclid(1.0);
            self.last_update_ms = timestamp_ms;
        }
        self.phase
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub color: Rgb,
    pub alpha: f64,
    pub blur: f64,
}

/// One glyph draw on the entity layer
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDrawOp {
    pub x: usize,
    pub y: usize,
    pub ch: char,
    pub color: Rgb,
    /// Radians about the tile center
    pub rotation: Option<f64>,
    pub scale: f64,
    pub opacity: f64,
    pub shadow: Option<Shadow>,
}

pub struct EntityRenderer {
    clock: PulseClock,
    ops: Vec<EntityDrawOp>,
}

impl EntityRenderer {
    pub fn new(params: &RenderParams) -> Self {
        Self {
            clock: PulseClock::new(params),
            ops: Vec::new(),
        }
    }

    pub fn render_entities(&mut self, timestamp_ms: f64, index: &EntityIndex, options: &DisplayOptions) {
        self.ops.clear();
        if !options.show_entities {
            return;
        }

        let pulse = if options.entity_animation {
            Pulse::at_phase(self.clock.advance(timestamp_ms))
        } else {
            Pulse::REST
        };

        for ((x, y), entity) in index.iter() {
            let op = EntityDrawOp {
                x,
                y,
                ch: entity.glyph(),
                color: parse_hex_color(&entity.color),
                rotation: entity.rotation.map(f64::to_radians),
                scale: pulse.scale,
                opacity: pulse.opacity,
                shadow: None,
            };

            if options.entity_glow {
                self.ops.push(EntityDrawOp {
                    shadow: Some(Shadow { color: WHITE, alpha: 0.4, blur: 2.0 }),
                    ..op.clone()
                });
                let color = op.color;
                self.ops.push(EntityDrawOp {
                    shadow: Some(Shadow { color, alpha: 1.0, blur: 1.0 }),
                    ..op
                });
            } else {
                self.ops.push(op);
            }
        }
    }

    pub fn ops(&self) -> &[EntityDrawOp] {
        &self.ops
    }

    /// Topmost op at a tile
    pub fn op_at(&self, x: usize, y: usize) -> Option<&EntityDrawOp> {
        self.ops.iter().rev().find(|op| op.x == x && op.y == y)
    }
}
