pub mod entrance_shuffle;
pub mod fill;
pub mod generate;
pub mod helpers;
pub mod search;
pub mod spoiler_log;
