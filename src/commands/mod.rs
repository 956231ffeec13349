pub mod create_commands;
pub mod help;
pub mod music;
