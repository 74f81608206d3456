pub mod geometry;
pub mod hit_index;
pub mod record;
pub mod sample;
