pub mod alias;
pub mod config;
pub mod error;
pub mod music_ui;
pub mod notice;
pub mod play;
pub mod player;
pub mod playlist;
pub mod queue;
pub mod session;
pub mod sink;
pub mod track;
pub mod types;
pub mod ytdlp;

#[cfg(test)]
pub mod testing;
