pub mod controls;
pub mod on_error;
pub mod track_end;
pub mod voice_disconnect;
