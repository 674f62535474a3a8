pub mod blit;
pub mod earth;
pub mod markers;
pub mod stars;
