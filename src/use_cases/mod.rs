pub mod game_set_storage;
pub mod game_sets;
pub mod login;
pub mod logout;
pub mod maps;
pub mod pawns;
pub mod register;
pub mod sweeper;
pub mod verify_token;

#[cfg(test)]
pub(crate) mod test_support;

/// Non-empty, at most `max_len` characters, no surrounding whitespace.
pub(crate) fn is_bounded_text(value: &str, max_len: usize) -> bool {
    let len = value.chars().count();
    len >= 1 && len <= max_len && value.trim() == value
}
