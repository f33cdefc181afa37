use crate::game::format_clock;
use macroquad::prelude::*;
use shared::{
    Platform, Player, PlayerState, Star, UserId, MAP_HEIGHT, MAP_WIDTH, PLATFORM_HEIGHT,
    PLAYER_HEIGHT, PLAYER_WIDTH, STAR_HEIGHT, STAR_WIDTH,
};

/// Per-frame information shown around the world.
#[derive(Debug, Clone)]
pub struct UiConfig {
    pub client_id: Option<UserId>,
    pub room_id: Option<u32>,
    pub connected: bool,
    /// Round clock in milliseconds, if a round was ever started.
    pub round_clock: Option<u64>,
    pub round_finished: bool,
    pub last_error: Option<String>,
    pub fake_ping_ms: u64,
}

/// Maps world coordinates onto the window, keeping the map's aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Viewport {
    pub fn fit(width: f32, height: f32) -> Self {
        let scale = (width / MAP_WIDTH).min(height / MAP_HEIGHT);
        Self {
            scale,
            offset_x: (width - MAP_WIDTH * scale) / 2.0,
            offset_y: (height - MAP_HEIGHT * scale) / 2.0,
        }
    }

    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (self.offset_x + x * self.scale, self.offset_y + y * self.scale)
    }
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&mut self, state: &PlayerState, config: UiConfig) {
        self.width = screen_width();
        self.height = screen_height();
        let viewport = Viewport::fit(self.width, self.height);

        clear_background(Color::from_rgba(26, 26, 26, 255));
        self.draw_map_border(&viewport);

        for platform in &state.platforms {
            self.draw_platform(&viewport, platform);
        }
        self.draw_star(&viewport, &state.star);

        for player in &state.players {
            let is_local_player = Some(player.id) == config.client_id;
            let color = if is_local_player {
                GREEN
            } else {
                Color::from_rgba(255, 68, 68, 255)
            };
            self.draw_player(&viewport, player, color);
        }

        self.draw_ui(config, state.players.len());
    }

    fn draw_map_border(&mut self, viewport: &Viewport) {
        let (x, y) = viewport.to_screen(0.0, 0.0);
        draw_rectangle(
            x,
            y,
            MAP_WIDTH * viewport.scale,
            MAP_HEIGHT * viewport.scale,
            Color::from_rgba(40, 44, 52, 255),
        );
    }

    fn draw_platform(&mut self, viewport: &Viewport, platform: &Platform) {
        let (x, y) = viewport.to_screen(platform.x, platform.y);
        let w = platform.width * viewport.scale;
        let h = PLATFORM_HEIGHT * viewport.scale;

        draw_rectangle(x, y, w, h, Color::from_rgba(68, 68, 68, 255));
        draw_rectangle_lines(x, y, w, h, 1.0, Color::from_rgba(120, 120, 120, 255));
    }

    fn draw_star(&mut self, viewport: &Viewport, star: &Star) {
        let (x, y) = viewport.to_screen(star.x + STAR_WIDTH / 2.0, star.y + STAR_HEIGHT / 2.0);
        let radius = STAR_WIDTH / 2.0 * viewport.scale;

        draw_poly(x, y, 5, radius, -90.0, GOLD);
        draw_poly_lines(x, y, 5, radius, -90.0, 1.0, YELLOW);
    }

    fn draw_player(&mut self, viewport: &Viewport, player: &Player, color: Color) {
        let (x, y) = viewport.to_screen(player.x, player.y);
        let w = PLAYER_WIDTH * viewport.scale;
        let h = PLAYER_HEIGHT * viewport.scale;

        draw_rectangle(x, y, w, h, color);
        draw_rectangle_lines(x, y, w, h, 2.0, WHITE);

        let label = player.id.to_string();
        draw_text(&label, x + 2.0, y - 4.0, 14.0, WHITE);
    }

    fn draw_ui(&mut self, config: UiConfig, player_count: usize) {
        let connection_color = if config.connected { GREEN } else { RED };
        draw_rectangle(10.0, 10.0, 8.0, 8.0, connection_color);

        let status = match (config.room_id, config.client_id) {
            (Some(room), Some(id)) => format!("Room {} / player {}", room, id),
            _ => "Connecting...".to_string(),
        };
        draw_text(&status, 24.0, 18.0, 16.0, WHITE);

        let players_text = format!("{} players", player_count);
        draw_text(&players_text, 24.0, 36.0, 14.0, WHITE);

        if config.fake_ping_ms > 0 {
            let ping_text = format!("+{}ms fake ping", config.fake_ping_ms);
            draw_text(&ping_text, 24.0, 52.0, 14.0, YELLOW);
        }

        let clock_text = match config.round_clock {
            Some(ms) if config.round_finished => {
                format!("Finished in {} - Enter to play again", format_clock(ms))
            }
            Some(ms) => format_clock(ms),
            None => "Press Enter to start".to_string(),
        };
        let clock_width = measure_text(&clock_text, None, 24, 1.0).width;
        draw_text(
            &clock_text,
            (self.width - clock_width) / 2.0,
            28.0,
            24.0,
            WHITE,
        );

        if let Some(error) = &config.last_error {
            draw_text(error, 10.0, self.height - 12.0, 16.0, RED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_viewport_fits_width() {
        let viewport = Viewport::fit(500.0, 800.0);

        assert_approx_eq!(viewport.scale, 0.5);
        assert_approx_eq!(viewport.offset_x, 0.0);
        assert_approx_eq!(viewport.offset_y, 200.0);
    }

    #[test]
    fn test_viewport_maps_corners() {
        let viewport = Viewport::fit(MAP_WIDTH, MAP_HEIGHT);

        assert_eq!(viewport.to_screen(0.0, 0.0), (0.0, 0.0));
        assert_eq!(viewport.to_screen(MAP_WIDTH, MAP_HEIGHT), (MAP_WIDTH, MAP_HEIGHT));
    }
}
