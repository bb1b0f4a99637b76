pub mod autoplay;
pub mod chart;
pub mod clock;
pub mod gameplay;
pub mod hold;
pub mod input;
pub mod judgment;
pub mod life;
pub mod note;
pub mod parsing;
pub mod replay;
pub mod schedule;
pub mod stage_stats;
pub mod timing;
pub mod timing_stats;
pub mod timing_windows;
