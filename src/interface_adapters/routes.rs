use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::interface_adapters::handlers::auth::{login, logout, register};
use crate::interface_adapters::handlers::game_sets::{
    create_game_set, delete_game_set, get_game_set, join_game_set, update_game_set,
};
use crate::interface_adapters::handlers::health::health;
use crate::interface_adapters::handlers::maps::{create_map, map_image, upload_map_image};
use crate::interface_adapters::handlers::pawns::{create_pawn, move_pawn};
use crate::interface_adapters::handlers::users::{user_game_sets, user_in_games, user_maps};
use crate::interface_adapters::protocol::MAP_IMAGE_ROUTE_PREFIX;
use crate::interface_adapters::state::AppState;
use crate::use_cases::maps::MAX_IMAGE_BYTES;

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/register/", put(register))
        .route("/login/token", post(login))
        .route("/logout", post(logout))
        .route("/user/maps", get(user_maps))
        .route("/user/game_sets", get(user_game_sets))
        .route("/user/in_games", get(user_in_games))
        .route("/maps/{map_name}", put(create_map))
        .route(
            "/maps/{map_name}/image",
            put(upload_map_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/game_set/", put(create_game_set))
        .route(
            "/game_set/{short_url}/",
            get(get_game_set)
                .patch(update_game_set)
                .delete(delete_game_set),
        )
        .route("/game_set/join/{short_url}/", post(join_game_set))
        .route("/pawn/{short_url}/{pawn_name}", put(create_pawn).patch(move_pawn));

    Router::new()
        .route("/health", get(health))
        .route(&format!("{MAP_IMAGE_ROUTE_PREFIX}/{{image}}"), get(map_image))
        .nest("/api/v1", api)
        .with_state(state)
}
