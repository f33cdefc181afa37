//! Procedural platform layout for a new round.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Platform, BORDER_MARGIN, PLATFORM_HEIGHT, PLAYER_HEIGHT};

pub const PLATFORM_WIDTHS: [f32; 3] = [64.0, 160.0, 320.0];

/// Map area covered by one platform on average.
const AREA_PER_PLATFORM: f32 = 100_000.0;

/// Number of platforms generated for a map of the given size.
pub fn platform_count(map_width: f32, map_height: f32) -> usize {
    (map_width * map_height / AREA_PER_PLATFORM).round() as usize
}

/// Generates platforms scattered across the map, kept clear of the top border and of the
/// bottom row where players spawn.
///
/// The layout depends only on the map size and the generator's state, so the same seed always
/// yields the same round.
pub fn generate_platforms<R: Rng + ?Sized>(
    map_width: f32,
    map_height: f32,
    rng: &mut R,
) -> Vec<Platform> {
    let count = platform_count(map_width, map_height);
    let max_x = map_width.max(0.0) as u32;
    let min_y = BORDER_MARGIN as u32;
    let max_y = (map_height - BORDER_MARGIN)
        .min(map_height - PLAYER_HEIGHT - PLATFORM_HEIGHT)
        .max(BORDER_MARGIN) as u32;

    (0..count)
        .map(|_| {
            let x = rng.gen_range(0..=max_x) as f32;
            let y = rng.gen_range(min_y..=max_y) as f32;
            let width = *PLATFORM_WIDTHS.choose(rng).unwrap_or(&PLATFORM_WIDTHS[0]);
            Platform { x, y, width }
        })
        .collect()
}
