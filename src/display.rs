/// User-toggleable rendering options, read by both renderers every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayOptions {
    pub terrain_chars: bool,
    pub terrain_bg: bool,
    pub entity_glow: bool,
    pub entity_animation: bool,
    pub show_entities: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            terrain_chars: true,
            terrain_bg: true,
            entity_glow: true,
            entity_animation: true,
            show_entities: true,
        }
    }
}

/// Timing and placement constants of the renderers
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// Full cycle of the two-frame terrain animation
    pub terrain_period_ms: f64,
    /// Full cycle of the entity pulse
    pub pulse_period_ms: f64,
    /// Pulse phase is only refreshed after this much time has passed
    pub pulse_min_step_ms: f64,
    /// Tooltip distance from the pointer, in pixels
    pub tooltip_offset: i64,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            terrain_period_ms: 1500.0,
            pulse_period_ms: 2000.0,
            pulse_min_step_ms: 16.0,
            tooltip_offset: 15,
        }
    }
}

/// One of the five display switches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayToggle {
    TerrainChars,
    TerrainBg,
    EntityGlow,
    EntityAnimation,
    ShowEntities,
}

impl DisplayToggle {
    pub const ALL: [DisplayToggle; 5] = [
        DisplayToggle::TerrainChars,
        DisplayToggle::TerrainBg,
        DisplayToggle::EntityGlow,
        DisplayToggle::EntityAnimation,
        DisplayToggle::ShowEntities,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DisplayToggle::TerrainChars => "Terrain glyphs",
            DisplayToggle::TerrainBg => "Terrain background",
            DisplayToggle::EntityGlow => "Entity glow",
            DisplayToggle::EntityAnimation => "Animation",
            DisplayToggle::ShowEntities => "Entities",
        }
    }

    /// Keyboard shortcut in the explorer
    pub fn key(&self) -> char {
        match self {
            DisplayToggle::TerrainChars => '1',
            DisplayToggle::TerrainBg => '2',
            DisplayToggle::EntityGlow => '3',
            DisplayToggle::EntityAnimation => '4',
            DisplayToggle::ShowEntities => '5',
        }
    }

    pub fn from_key(key: char) -> Option<DisplayToggle> {
        DisplayToggle::ALL.into_iter().find(|t| t.key() == key)
    }

    /// Whether flipping this option changes a static layer that must be redrawn at once
    pub fn affects_static_layers(&self) -> bool {
        matches!(
            self,
            DisplayToggle::TerrainChars | DisplayToggle::TerrainBg | DisplayToggle::ShowEntities
        )
    }
}

impl DisplayOptions {
    pub fn get(&self, toggle: DisplayToggle) -> bool {
        match toggle {
            DisplayToggle::TerrainChars => self.terrain_chars,
            DisplayToggle::TerrainBg => self.terrain_bg,
            DisplayToggle::EntityGlow => self.entity_glow,
            DisplayToggle::EntityAnimation => self.entity_animation,
            DisplayToggle::ShowEntities => self.show_entities,
        }
    }

    fn field_mut(&mut self, toggle: DisplayToggle) -> &mut bool {
        match toggle {
            DisplayToggle::TerrainChars => &mut self.terrain_chars,
            DisplayToggle::TerrainBg => &mut self.terrain_bg,
            DisplayToggle::EntityGlow => &mut self.entity_glow,
            DisplayToggle::EntityAnimation => &mut self.entity_animation,
            DisplayToggle::ShowEntities => &mut self.show_entities,
        }
    }

    /// Flip exactly one option and return its new value.
    pub fn flip(&mut self, toggle: DisplayToggle) -> bool {
        let field = self.field_mut(toggle);
        *field = !*field;
        *field
    }
}
