use serde::{Deserialize, Serialize};

// Registered account record.
#[derive(Clone, Debug)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
        }
    }
}

// Public identity embedded in game sets and pawns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
}

// Fields required to create an account.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
}

// Grid map owned by a user, optionally backed by an uploaded image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Map {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub len_x: i32,
    pub len_y: i32,
    pub image: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PawnKind {
    #[default]
    Movable,
    Static,
}

impl PawnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PawnKind::Movable => "movable",
            PawnKind::Static => "static",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "movable" => Some(PawnKind::Movable),
            "static" => Some(PawnKind::Static),
            _ => None,
        }
    }
}

// Lowercase `#rrggbb` color.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Color(String);

impl Color {
    /// Accepts `#rgb` or `#rrggbb` (case-insensitive) and normalizes to
    /// lowercase `#rrggbb`.
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let hex = hex.to_ascii_lowercase();
        match hex.len() {
            6 => Some(Color(format!("#{hex}"))),
            3 => {
                let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                Some(Color(format!("#{expanded}")))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Placement and appearance of a pawn on the current map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PawnMeta {
    pub visibility: bool,
    pub kind: PawnKind,
    pub size_x: i32,
    pub size_y: i32,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pawn {
    pub id: i64,
    pub name: String,
    pub owner: UserSummary,
    pub meta: PawnMeta,
}

// Fields required to insert a pawn into a game set.
#[derive(Clone, Debug)]
pub struct NewPawn {
    pub game_set_id: i64,
    pub owner: UserSummary,
    pub name: String,
    pub meta: PawnMeta,
}

// Full game-set aggregate held resident in memory and flushed to storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSet {
    pub id: i64,
    pub name: String,
    pub owner: UserSummary,
    pub map: Option<Map>,
    pub pawns: Vec<Pawn>,
    pub players: Vec<UserSummary>,
}

impl GameSet {
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner.id == user_id
    }

    pub fn is_player(&self, user_id: i64) -> bool {
        self.players.iter().any(|player| player.id == user_id)
    }

    pub fn is_member(&self, user_id: i64) -> bool {
        self.is_owner(user_id) || self.is_player(user_id)
    }

    pub fn pawn(&self, name: &str) -> Option<&Pawn> {
        self.pawns.iter().find(|pawn| pawn.name == name)
    }

    pub fn pawn_mut(&mut self, name: &str) -> Option<&mut Pawn> {
        self.pawns.iter_mut().find(|pawn| pawn.name == name)
    }

    /// Copy of the game set as seen by `user_id`: the owner sees every pawn,
    /// players see their own pawns and visible ones.
    pub fn view_for(&self, user_id: i64) -> GameSet {
        let mut view = self.clone();
        if !self.is_owner(user_id) {
            view.pawns
                .retain(|pawn| pawn.owner.id == user_id || pawn.meta.visibility);
        }
        view
    }
}

// Issued bearer token record.
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub user_id: i64,
    pub username: String,
    pub expires_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str) -> UserSummary {
        UserSummary {
            id,
            username: name.to_string(),
            full_name: None,
        }
    }

    fn pawn(id: i64, owner: UserSummary, visibility: bool) -> Pawn {
        Pawn {
            id,
            name: format!("pawn-{id}"),
            owner,
            meta: PawnMeta {
                visibility,
                kind: PawnKind::Movable,
                size_x: 2,
                size_y: 2,
                x: None,
                y: None,
                color: Color::parse("#fff").unwrap(),
            },
        }
    }

    #[test]
    fn when_color_is_short_hex_then_it_is_expanded_and_lowercased() {
        assert_eq!(Color::parse("#A1f").unwrap().as_str(), "#aa11ff");
        assert_eq!(Color::parse("#00FF7f").unwrap().as_str(), "#00ff7f");
    }

    #[test]
    fn when_color_is_malformed_then_parse_returns_none() {
        assert!(Color::parse("white").is_none());
        assert!(Color::parse("#12345").is_none());
        assert!(Color::parse("#gg0000").is_none());
    }

    #[test]
    fn when_player_views_game_set_then_hidden_pawns_of_others_are_dropped() {
        let owner = user(1, "owner");
        let player = user(2, "player");
        let game_set = GameSet {
            id: 7,
            name: "Keep".to_string(),
            owner: owner.clone(),
            map: None,
            pawns: vec![
                pawn(1, owner.clone(), false),
                pawn(2, owner.clone(), true),
                pawn(3, player.clone(), false),
            ],
            players: vec![player],
        };

        let player_view = game_set.view_for(2);
        let ids: Vec<i64> = player_view.pawns.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);

        assert_eq!(game_set.view_for(1).pawns.len(), 3);
    }
}
