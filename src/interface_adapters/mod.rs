// Interface adapters: HTTP surface and storage backends.

pub mod crypto;
pub mod handlers;
pub mod images;
pub mod memory;
pub mod postgres;
pub mod protocol;
pub mod routes;
pub mod state;
