//! Terminal glyph world explorer using ratatui
//!
//! One tile per terminal cell. Each frame composites the background layer,
//! the terrain glyph layer and the entity layer into the ratatui buffer.
//! Entity updates arrive over a channel and are applied between frames.

use std::error::Error;
use std::f64::consts::FRAC_PI_4;
use std::io::{self, stdout, Stdout};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, MouseEvent, MouseEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::animation::{AnimationLoop, FrameClock};
use crate::biomes::Biome;
use crate::config::AppConfig;
use crate::display::{DisplayOptions, DisplayToggle, RenderParams};
use crate::entities::{EntitySync, SyncApplied, SyncOutcome};
use crate::export::{export_ascii, export_png};
use crate::interaction::InteractionController;
use crate::seeds::WorldSeeds;
use crate::surface::{CellMetrics, Rgb};
use crate::world::{generate_world, WorldData};

/// Input poll budget per frame (~60 fps)
const FRAME_BUDGET: Duration = Duration::from_millis(16);
const MESSAGE_TTL: Duration = Duration::from_secs(3);
const PANEL_WIDTH: u16 = 30;

// =============================================================================
// GLYPH PRESENTATION
// =============================================================================

const MIRRORED: [(char, char); 5] = [('~', '∽'), ('(', ')'), ('/', '\\'), ('<', '>'), ('[', ']')];
const ARROWS: [char; 8] = ['↑', '↗', '→', '↘', '↓', '↙', '←', '↖'];
const LINES: [char; 4] = ['|', '/', '-', '\\'];
const POINTERS: [char; 4] = ['^', '>', 'v', '<'];

/// Horizontally flipped form of a glyph, if it has one
pub fn mirror_glyph(ch: char) -> char {
    MIRRORED
        .iter()
        .find_map(|&(a, b)| {
            if ch == a {
                Some(b)
            } else if ch == b {
                Some(a)
            } else {
                None
            }
        })
        .unwrap_or(ch)
}

/// Glyph rotated clockwise by `radians`, quantized to 45 degree steps.
/// Glyphs without a rotated form are returned unchanged.
pub fn rotated_glyph(ch: char, radians: Option<f64>) -> char {
    let Some(radians) = radians.filter(|r| r.is_finite()) else {
        return ch;
    };
    // Reduce to one turn before converting so huge angles cannot overflow
    let steps = (radians / FRAC_PI_4).round().rem_euclid(8.0) as i64;

    if let Some(i) = ARROWS.iter().position(|&c| c == ch) {
        return ARROWS[(i as i64 + steps).rem_euclid(8) as usize];
    }
    if let Some(i) = LINES.iter().position(|&c| c == ch) {
        return LINES[(i as i64 + steps).rem_euclid(4) as usize];
    }
    if steps % 2 == 0 {
        if let Some(i) = POINTERS.iter().position(|&c| c == ch) {
            return POINTERS[(i as i64 + steps / 2).rem_euclid(4) as usize];
        }
    }
    ch
}

/// Scale a color toward black
pub fn dim_color(color: Rgb, opacity: f64) -> Rgb {
    let f = opacity.clamp(0.0, 1.0);
    let scale = |c: u8| (c as f64 * f).round() as u8;
    (scale(color.0), scale(color.1), scale(color.2))
}

/// Mix `tint` into `base` by `amount` in [0,1]
pub fn blend_color(base: Rgb, tint: Rgb, amount: f64) -> Rgb {
    let t = amount.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    (mix(base.0, tint.0), mix(base.1, tint.1), mix(base.2, tint.2))
}

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

// =============================================================================
// EXPLORER STATE
// =============================================================================

/// Top-left tile of the visible map
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Viewport {
    x: usize,
    y: usize,
}

struct Explorer {
    world: WorldData,
    config: AppConfig,
    options: DisplayOptions,
    animation: AnimationLoop,
    sync: EntitySync,
    interaction: InteractionController,
    clock: FrameClock,
    viewport: Viewport,
    /// Map area from the last draw, for mouse translation and scrolling
    map_area: Rect,
    /// Last pointer position in screen cells
    pointer: Option<(u16, u16)>,
    show_help: bool,
    show_panel: bool,
    message: Option<(String, Instant)>,
}

impl Explorer {
    fn new(world: WorldData, config: AppConfig) -> Self {
        let options = DisplayOptions::default();
        let animation = AnimationLoop::new(&world, &options, &config.render);
        // Tooltips sit one cell off the pointer on a terminal
        let terminal_params = RenderParams { tooltip_offset: 1, ..config.render };
        let interaction = InteractionController::new(CellMetrics::TERMINAL, &terminal_params);
        let sync = EntitySync::new(world.width, world.height);

        Explorer {
            world,
            config,
            options,
            animation,
            sync,
            interaction,
            clock: FrameClock::new(),
            viewport: Viewport::default(),
            map_area: Rect::default(),
            pointer: None,
            show_help: false,
            show_panel: true,
            message: None,
        }
    }

    fn set_message(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), Instant::now()));
    }

    fn current_message(&self) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|(_, at)| at.elapsed() < MESSAGE_TTL)
            .map(|(text, _)| text.as_str())
    }

    /// Apply every sync result that arrived since the last frame.
    fn drain_sync(&mut self, rx: &Receiver<SyncOutcome>) {
        let mut updated = false;
        while let Ok(outcome) = rx.try_recv() {
            if let SyncApplied::Updated(_) = self.sync.apply(outcome) {
                updated = true;
            }
        }
        if updated {
            // The entity under a resting pointer may have moved
            self.refresh_hover();
        }
    }

    fn frame(&mut self) {
        let now = self.clock.now_ms();
        self.animation.frame(now, self.sync.index(), &self.options);
    }

    fn toggle(&mut self, toggle: DisplayToggle) {
        if InteractionController::toggle(&mut self.options, toggle) {
            let now = self.clock.now_ms();
            self.animation.redraw_static(now, self.sync.index(), &self.options);
        }
        let state = if self.options.get(toggle) { "ON" } else { "OFF" };
        self.set_message(format!("{}: {}", toggle.label(), state));
    }

    /// Regenerate the world with a new random seed
    fn regenerate(&mut self) {
        let seeds = WorldSeeds::default();
        info!("Regenerating world with seed {}", seeds.master);
        let world = generate_world(&self.config.world, seeds);
        // A loaded height map may have had other dimensions
        if (world.width, world.height) != (self.world.width, self.world.height) {
            self.sync = EntitySync::new(world.width, world.height);
            self.viewport = Viewport::default();
        }
        self.world = world;
        self.animation = AnimationLoop::new(&self.world, &self.options, &self.config.render);
        self.refresh_hover();
        self.set_message(format!("New world generated! Seed: {}", self.world.seed()));
    }

    fn scroll(&mut self, dx: i64, dy: i64) {
        let max_x = self.world.width.saturating_sub(self.map_area.width as usize);
        let max_y = self.world.height.saturating_sub(self.map_area.height as usize);
        self.viewport.x = (self.viewport.x as i64 + dx).clamp(0, max_x as i64) as usize;
        self.viewport.y = (self.viewport.y as i64 + dy).clamp(0, max_y as i64) as usize;
        self.refresh_hover();
    }

    /// Screen cell to world pixel, if it lies over the map area
    fn screen_to_world(&self, column: u16, row: u16) -> Option<(i64, i64)> {
        let area = self.map_area;
        if column < area.x || row < area.y || column >= area.x + area.width || row >= area.y + area.height {
            return None;
        }
        Some((
            (column - area.x) as i64 + self.viewport.x as i64,
            (row - area.y) as i64 + self.viewport.y as i64,
        ))
    }

    fn pointer_moved(&mut self, column: u16, row: u16) {
        self.pointer = Some((column, row));
        self.refresh_hover();
    }

    fn refresh_hover(&mut self) {
        match self.pointer.and_then(|(c, r)| self.screen_to_world(c, r)) {
            Some((px, py)) => {
                self.interaction
                    .hit_test(px, py, self.sync.index(), self.world.width, self.world.height);
            }
            None => self.interaction.on_pointer_leave(),
        }
    }

    fn export_png(&mut self) {
        let filename = format!("glyphworld_{}.png", self.world.seed());
        let result = export_png(
            &self.world,
            &self.animation.terrain,
            self.sync.index(),
            self.config.export_metrics,
            &filename,
        );
        match result {
            Ok(_) => self.set_message(format!("Exported: {}", filename)),
            Err(e) => {
                warn!("PNG export to {} failed: {}", filename, e);
                self.set_message(format!("Export failed: {}", e));
            }
        }
    }

    fn export_ascii(&mut self) {
        let filename = format!("glyphworld_{}.txt", self.world.seed());
        match export_ascii(&self.world, Some(self.sync.index()), &filename) {
            Ok(_) => self.set_message(format!("Exported: {}", filename)),
            Err(e) => {
                warn!("ASCII export to {} failed: {}", filename, e);
                self.set_message(format!("Export failed: {}", e));
            }
        }
    }

    // =========================================================================
    // DRAWING
    // =========================================================================

    /// Composite the three layers for every visible tile.
    fn render_map(&self, area: Rect, buf: &mut Buffer) {
        let terrain = &self.animation.terrain;
        let entities = &self.animation.entities;

        for dy in 0..area.height {
            for dx in 0..area.width {
                let x = self.viewport.x + dx as usize;
                let y = self.viewport.y + dy as usize;
                if x >= self.world.width || y >= self.world.height {
                    continue;
                }

                let bg = terrain.background().get(x, y).copied();
                let mut ch = ' ';
                let mut style = Style::default().bg(bg.map_or(Color::Reset, rgb));

                if let Some(glyph) = terrain.terrain().get(x, y) {
                    ch = if glyph.mirrored { mirror_glyph(glyph.ch) } else { glyph.ch };
                    style = style.fg(rgb(glyph.fg));
                    if glyph.italic {
                        style = style.add_modifier(Modifier::ITALIC);
                    }
                }

                if let Some(op) = entities.op_at(x, y) {
                    ch = rotated_glyph(op.ch, op.rotation);
                    style = style.fg(rgb(dim_color(op.color, op.opacity)));
                    if let Some(shadow) = op.shadow {
                        let base = bg.unwrap_or((0, 0, 0));
                        style = style
                            .add_modifier(Modifier::BOLD)
                            .bg(rgb(blend_color(base, shadow.color, 0.3 * shadow.alpha)));
                    }
                }

                if let Some(cell) = buf.cell_mut((area.x + dx, area.y + dy)) {
                    cell.set_char(ch).set_style(style);
                }
            }
        }
    }

    fn render_tooltip(&self, area: Rect, buf: &mut Buffer) {
        let Some(tooltip) = self.interaction.tooltip() else {
            return;
        };

        let width = (tooltip.text.chars().count() as u16 + 2).min(area.width);
        let height = 3.min(area.height);
        let sx = tooltip.x - self.viewport.x as i64 + area.x as i64;
        let sy = tooltip.y - self.viewport.y as i64 + area.y as i64;
        // Keep the box on screen
        let x = sx.clamp(area.x as i64, (area.x + area.width - width) as i64) as u16;
        let y = sy.clamp(area.y as i64, (area.y + area.height - height) as i64) as u16;
        let rect = Rect::new(x, y, width, height);

        Clear.render(rect, buf);
        Paragraph::new(tooltip.text.as_str())
            .style(Style::default().bg(Color::Black).fg(Color::White))
            .block(Block::default().borders(Borders::ALL))
            .render(rect, buf);
    }

    /// Render the world information panel on the right side
    fn render_panel(&self, area: Rect, buf: &mut Buffer) {
        let stats = &self.world.stats;
        let mut lines: Vec<Line> = vec![
            Line::from(format!("Seed: {}", self.world.seed())),
            Line::from(format!("Size: {}x{}", self.world.width, self.world.height)),
            Line::from(""),
            Line::from(Span::styled("Biomes", Style::default().add_modifier(Modifier::BOLD))),
        ];
        for biome in Biome::ALL {
            lines.push(Line::from(vec![
                Span::styled("■ ", Style::default().fg(rgb(biome.fg_color()))),
                Span::raw(format!("{:<9}{:>6.1}%", biome.name(), stats.percent(biome))),
            ]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Display", Style::default().add_modifier(Modifier::BOLD))));
        for toggle in DisplayToggle::ALL {
            let mark = if self.options.get(toggle) { "x" } else { " " };
            lines.push(Line::from(format!("{} [{}] {}", toggle.key(), mark, toggle.label())));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Hover", Style::default().add_modifier(Modifier::BOLD))));
        match self.interaction.hovered_tile() {
            Some((x, y)) => {
                let tile = self.world.tile(x, y);
                lines.push(Line::from(format!("({}, {})", x, y)));
                lines.push(Line::from(format!("{} '{}'", tile.biome.name(), tile.glyph)));
                lines.push(Line::from(format!("Height {:.3}", tile.height)));
                if let Some(entity) = self.sync.index().get(x, y) {
                    let label = entity.name.as_deref().or(entity.kind.as_deref()).unwrap_or("Entity");
                    lines.push(Line::from(format!("{} '{}'", label, entity.glyph())));
                    if let Some(life) = entity.life {
                        lines.push(Line::from(format!("Life {:.0}", life)));
                    }
                    if let Some(state) = &entity.state {
                        lines.push(Line::from(format!("State {}", state)));
                    }
                }
            }
            None => lines.push(Line::from("-")),
        }

        Paragraph::new(lines)
            .block(Block::default().title(" World ").borders(Borders::ALL))
            .render(area, buf);
    }

    fn status_line(&self) -> String {
        let mut parts = vec![
            format!(" ({},{})", self.viewport.x, self.viewport.y),
            format!("Entities: {}", self.sync.index().len()),
        ];

        if self.config.sync.is_none() {
            parts.push("Offline".to_string());
        } else {
            if let Some(s) = self.sync.seconds_until_update(Instant::now()) {
                parts.push(format!("Next update: {:.0}s", s.ceil()));
            }
            let mut last = match self.sync.last_sync() {
                Some(t) => format!("Synced {}", t.format("%H:%M:%S")),
                None => "Waiting for server".to_string(),
            };
            if self.sync.consecutive_failures() > 0 {
                last.push_str(&format!(" ({} failed)", self.sync.consecutive_failures()));
            }
            parts.push(last);
        }

        if let Some(msg) = self.current_message() {
            parts.push(msg.to_string());
        }
        parts.push("1-5:Toggle  ?:Help  Q:Quit".to_string());
        parts.join(" | ")
    }

    /// Render help overlay
    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let help_text = vec![
            "=== Glyph World Explorer ===",
            "",
            "Navigation:",
            "  Arrow keys / WASD / HJKL - Scroll",
            "  PgUp/PgDn - Fast vertical scroll",
            "  Home/End - Fast horizontal scroll",
            "  Mouse - Hover entities for details",
            "",
            "Display:",
            "  1 - Terrain glyphs",
            "  2 - Terrain background",
            "  3 - Entity glow",
            "  4 - Animation",
            "  5 - Entities",
            "",
            "Other:",
            "  Tab - Toggle info panel",
            "  R - Regenerate world (new seed)",
            "  E - Export PNG",
            "  X - Export ASCII",
            "  ? - Toggle this help",
            "  Q / Esc - Quit",
            "",
            "Press any key to close",
        ];

        let width = 44.min(area.width);
        let height = (help_text.len() as u16 + 2).min(area.height);
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;

        let help_area = Rect::new(x, y, width, height);

        Clear.render(help_area, buf);

        let block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::DarkGray));

        let inner = block.inner(help_area);
        block.render(help_area, buf);

        for (i, line) in help_text.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            buf.set_string(inner.x, inner.y + i as u16, line, Style::default().fg(Color::White));
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let size = f.area();

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(size);
        let content_area = main_chunks[0];
        let status_area = main_chunks[1];

        let map_area = if self.show_panel {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(1), Constraint::Length(PANEL_WIDTH)])
                .split(content_area);
            self.render_panel(content_chunks[1], f.buffer_mut());
            content_chunks[0]
        } else {
            content_area
        };
        self.map_area = map_area;

        self.render_map(map_area, f.buffer_mut());
        self.render_tooltip(map_area, f.buffer_mut());

        let status_para = Paragraph::new(self.status_line())
            .style(Style::default().bg(Color::DarkGray).fg(Color::White));
        f.render_widget(status_para, status_area);

        if self.show_help {
            self.render_help(map_area, f.buffer_mut());
        }
    }

    /// Handle one input event. Returns false to quit.
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) => {
                if self.show_help {
                    self.show_help = false;
                    return true;
                }

                let page_x = (self.map_area.width as i64).max(1);
                let page_y = (self.map_area.height as i64).max(1);

                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return false,
                    KeyCode::Char('?') => self.show_help = true,

                    KeyCode::Char(c @ '1'..='5') => {
                        if let Some(toggle) = DisplayToggle::from_key(c) {
                            self.toggle(toggle);
                        }
                    }

                    KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('k') => self.scroll(0, -1),
                    KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('j') => self.scroll(0, 1),
                    KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('h') => self.scroll(-1, 0),
                    KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('l') => self.scroll(1, 0),

                    KeyCode::PageUp => self.scroll(0, -page_y),
                    KeyCode::PageDown => self.scroll(0, page_y),
                    KeyCode::Home => self.scroll(-page_x, 0),
                    KeyCode::End => self.scroll(page_x, 0),

                    KeyCode::Char('e') | KeyCode::Char('E') => self.export_png(),
                    KeyCode::Char('x') | KeyCode::Char('X') => self.export_ascii(),
                    KeyCode::Char('r') | KeyCode::Char('R') => self.regenerate(),

                    KeyCode::Tab => {
                        self.show_panel = !self.show_panel;
                        self.set_message(if self.show_panel { "Panel: ON" } else { "Panel: OFF" });
                    }

                    _ => {}
                }
            }
            Event::Mouse(MouseEvent { kind, column, row, .. }) => match kind {
                MouseEventKind::Moved | MouseEventKind::Drag(_) => self.pointer_moved(column, row),
                MouseEventKind::ScrollDown => self.scroll(0, 3),
                MouseEventKind::ScrollUp => self.scroll(0, -3),
                _ => {}
            },
            Event::FocusLost => {
                self.pointer = None;
                self.interaction.on_pointer_leave();
            }
            _ => {}
        }
        true
    }
}

// =============================================================================
// TERMINAL LOOP
// =============================================================================

fn explorer_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    explorer: &mut Explorer,
    sync_rx: Option<&Receiver<SyncOutcome>>,
) -> Result<(), Box<dyn Error>> {
    loop {
        if let Some(rx) = sync_rx {
            explorer.drain_sync(rx);
        }
        explorer.frame();

        terminal.draw(|f| explorer.draw(f))?;

        if event::poll(FRAME_BUDGET)? && !explorer.handle_event(event::read()?) {
            return Ok(());
        }
    }
}

/// Run the explorer. Entity updates are read from `sync_rx` when given.
pub fn run_explorer(
    world: WorldData,
    config: AppConfig,
    sync_rx: Option<Receiver<SyncOutcome>>,
) -> Result<(), Box<dyn Error>> {
    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut explorer = Explorer::new(world, config);
    let result = explorer_loop(&mut terminal, &mut explorer, sync_rx.as_ref());

    // Cleanup runs on error too
    restore_terminal(&mut terminal)?;
    info!("Explorer closed after {} frames", explorer.animation.frames_rendered());

    result
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()
}
