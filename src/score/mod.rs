pub mod notation_parser;
pub mod song;
#[cfg(test)]
pub mod song_fixtures;
