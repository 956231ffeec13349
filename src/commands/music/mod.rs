pub mod join;
pub mod leave;
pub mod modes;
pub mod move_track;
pub mod pause;
pub mod play;
pub mod playlist;
pub mod queue;
pub mod resume;
pub mod skip;
pub mod volume;
