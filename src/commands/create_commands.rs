use crate::{
    commands::{help, music},
    models::data::Data,
    util::alias::Error,
};

pub fn create_commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        music::join::join(),
        music::leave::leave(),
        music::play::play(),
        music::skip::skip(),
        music::pause::pause(),
        music::resume::resume(),
        music::queue::nowplaying(),
        music::queue::queue(),
        music::volume::volume(),
        music::queue::remove(),
        music::queue::clear(),
        music::move_track::move_track(),
        music::modes::repeat(),
        music::modes::shuffle(),
        music::modes::autoplay(),
        music::playlist::save_playlist(),
        music::playlist::load_playlist(),
        music::playlist::delete_playlist(),
        music::playlist::view_playlists(),
        help::comandos(),
    ]
}
