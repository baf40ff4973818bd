pub mod ids;
pub mod json_canonical;
pub mod time_range;
