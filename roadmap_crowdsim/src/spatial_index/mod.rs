pub mod location_hash_2d;
pub mod spatial_index;
