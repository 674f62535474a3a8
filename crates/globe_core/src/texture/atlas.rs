//! Hand-authored world outlines in normalised equirectangular texture space
//! (u to the east, v downwards from the north edge).
//!
//! Every map generator reads these same tables so the diffuse, night, normal and
//! specular layers stay registered with each other.

use super::canvas::Rgba;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Continent {
    pub name: &'static str,
    pub color: Rgba,
    /// Closed ring: the last point repeats the first.
    pub outline: &'static [(f32, f32)],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub u: f32,
    pub v: f32,
    /// Innermost halo diameter, in pixels at 2048 wide.
    pub radius_px: f32,
}

const NORTH_AMERICA: &[(f32, f32)] = &[
    (0.15, 0.30), (0.18, 0.25), (0.22, 0.22), (0.25, 0.25), (0.28, 0.28), (0.30, 0.32),
    (0.32, 0.35), (0.30, 0.40), (0.27, 0.43), (0.25, 0.46), (0.22, 0.47), (0.20, 0.45),
    (0.18, 0.42), (0.16, 0.38), (0.14, 0.35), (0.15, 0.30),
];

const SOUTH_AMERICA: &[(f32, f32)] = &[
    (0.27, 0.48), (0.30, 0.50), (0.32, 0.55), (0.31, 0.60), (0.28, 0.65), (0.26, 0.70),
    (0.24, 0.67), (0.23, 0.64), (0.22, 0.60), (0.23, 0.55), (0.25, 0.50), (0.27, 0.48),
];

const EUROPE: &[(f32, f32)] = &[
    (0.50, 0.27), (0.53, 0.25), (0.56, 0.27), (0.58, 0.30), (0.56, 0.33), (0.54, 0.35),
    (0.52, 0.37), (0.50, 0.35), (0.48, 0.33), (0.47, 0.30), (0.50, 0.27),
];

const ASIA: &[(f32, f32)] = &[
    (0.58, 0.27), (0.63, 0.25), (0.70, 0.27), (0.75, 0.30), (0.80, 0.35), (0.77, 0.40),
    (0.73, 0.45), (0.68, 0.47), (0.65, 0.45), (0.62, 0.42), (0.60, 0.38), (0.58, 0.35),
    (0.56, 0.33), (0.58, 0.30), (0.58, 0.27),
];

const AFRICA: &[(f32, f32)] = &[
    (0.50, 0.37), (0.54, 0.40), (0.58, 0.43), (0.56, 0.47), (0.54, 0.53), (0.52, 0.58),
    (0.49, 0.60), (0.46, 0.57), (0.44, 0.53), (0.46, 0.48), (0.48, 0.44), (0.47, 0.40),
    (0.50, 0.37),
];

const AUSTRALIA: &[(f32, f32)] = &[
    (0.78, 0.55), (0.82, 0.57), (0.85, 0.60), (0.83, 0.63), (0.80, 0.65), (0.77, 0.64),
    (0.75, 0.62), (0.76, 0.58), (0.78, 0.55),
];

const ANTARCTICA: &[(f32, f32)] = &[
    (0.30, 0.85), (0.40, 0.87), (0.50, 0.88), (0.60, 0.87), (0.70, 0.85), (0.65, 0.83),
    (0.55, 0.82), (0.45, 0.82), (0.35, 0.83), (0.30, 0.85),
];

#[rustfmt::skip]
pub const CONTINENTS: [Continent; 7] = [
    Continent { name: "north_america", color: [0.20, 0.70, 0.30, 1.0], outline: NORTH_AMERICA },
    Continent { name: "south_america", color: [0.30, 0.80, 0.20, 1.0], outline: SOUTH_AMERICA },
    Continent { name: "europe",        color: [0.40, 0.75, 0.25, 1.0], outline: EUROPE },
    Continent { name: "asia",          color: [0.25, 0.70, 0.25, 1.0], outline: ASIA },
    Continent { name: "africa",        color: [0.85, 0.75, 0.35, 1.0], outline: AFRICA },
    Continent { name: "australia",     color: [0.80, 0.60, 0.30, 1.0], outline: AUSTRALIA },
    Continent { name: "antarctica",    color: [1.00, 1.00, 1.00, 1.0], outline: ANTARCTICA },
];

/// Himalayas, Andes, Rockies.
pub const MOUNTAIN_RANGES: [[(f32, f32); 3]; 3] = [
    [(0.70, 0.40), (0.73, 0.38), (0.75, 0.40)],
    [(0.25, 0.50), (0.27, 0.60), (0.24, 0.63)],
    [(0.15, 0.35), (0.17, 0.38), (0.14, 0.40)],
];

#[rustfmt::skip]
pub const MAJOR_CITIES: [City; 10] = [
    City { name: "new_york",    u: 0.29, v: 0.36, radius_px: 6.0 },
    City { name: "los_angeles", u: 0.22, v: 0.38, radius_px: 5.0 },
    City { name: "london",      u: 0.54, v: 0.33, radius_px: 6.0 },
    City { name: "paris",       u: 0.56, v: 0.33, radius_px: 5.0 },
    City { name: "tokyo",       u: 0.70, v: 0.38, radius_px: 7.0 },
    City { name: "beijing",     u: 0.68, v: 0.35, radius_px: 6.0 },
    City { name: "mumbai",      u: 0.67, v: 0.43, radius_px: 5.0 },
    City { name: "cairo",       u: 0.57, v: 0.49, radius_px: 4.0 },
    City { name: "sao_paulo",   u: 0.26, v: 0.55, radius_px: 4.0 },
    City { name: "sydney",      u: 0.77, v: 0.66, radius_px: 3.0 },
];

pub const OCEAN: Rgba = [0.0, 0.2, 0.6, 1.0];
pub const OCEAN_DEEP: Rgba = [0.0, 0.1, 0.5, 0.3];
pub const OCEAN_SHALLOW: Rgba = [0.0, 0.3, 0.7, 0.3];
pub const MOUNTAIN: Rgba = [0.4, 0.35, 0.3, 0.4];
pub const COASTLINE: Rgba = [0.9, 0.9, 0.9, 0.7];
pub const CLOUD: Rgba = [1.0, 1.0, 1.0, 0.3];
pub const ICE: Rgba = [0.95, 0.95, 0.95, 0.8];
pub const CITY_LIGHT: Rgba = [1.0, 0.9, 0.6, 1.0];
pub const NIGHT_SKY: Rgba = [0.0, 0.0, 0.0, 1.0];
pub const NORMAL_FLAT: Rgba = [0.5, 0.5, 1.0, 1.0];
pub const NORMAL_RAISED: Rgba = [0.65, 0.65, 1.0, 1.0];
pub const SPECULAR_WATER: Rgba = [0.8, 0.8, 0.8, 1.0];
pub const SPECULAR_LAND: Rgba = [0.2, 0.2, 0.2, 1.0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlines_are_closed_and_normalised() {
        for c in &CONTINENTS {
            assert!(c.outline.len() >= 4, "{}", c.name);
            assert_eq!(c.outline.first(), c.outline.last(), "{}", c.name);
            assert!(c
                .outline
                .iter()
                .all(|&(u, v)| (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn cities_sit_on_the_map() {
        for c in &MAJOR_CITIES {
            assert!((0.0..1.0).contains(&c.u) && (0.0..1.0).contains(&c.v), "{}", c.name);
            assert!(c.radius_px > 0.0);
        }
    }
}
