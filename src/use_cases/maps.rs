use crate::domain::entities::Map;
use crate::domain::errors::{MapError, StorageError};
use crate::domain::ports::{ImageStore, MapRepository};
use crate::use_cases::game_set_storage::GameSetStorage;
use crate::use_cases::is_bounded_text;

pub const MAX_MAP_NAME_LEN: usize = 30;
pub const MAX_MAP_SIDE: i32 = 1000;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Content type of a supported image, judged by its leading bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

// Map workflows with injected dependencies.
pub struct MapsUseCase<'a> {
    pub maps: &'a dyn MapRepository,
    pub images: &'a dyn ImageStore,
    pub storage: &'a GameSetStorage,
}

impl MapsUseCase<'_> {
    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        len_x: i32,
        len_y: i32,
    ) -> Result<Map, MapError> {
        if !is_bounded_text(name, MAX_MAP_NAME_LEN) {
            return Err(MapError::InvalidName);
        }
        let side = 1..=MAX_MAP_SIDE;
        if !side.contains(&len_x) || !side.contains(&len_y) {
            return Err(MapError::InvalidDimensions);
        }

        self.maps
            .create(user_id, name, len_x, len_y)
            .await
            .map_err(|err| match err {
                StorageError::Conflict => MapError::AlreadyExists,
                other => storage_failure(other),
            })
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Map>, MapError> {
        self.maps.list_by_user(user_id).await.map_err(storage_failure)
    }

    /// Stores `bytes` as the image of the caller's map `name` and refreshes
    /// every resident game set showing that map.
    pub async fn upload_image(
        &self,
        user_id: i64,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Map, MapError> {
        if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES || sniff_image(&bytes).is_none() {
            return Err(MapError::InvalidImage);
        }
        let mut map = self
            .maps
            .find_by_name(user_id, name)
            .await
            .map_err(storage_failure)?
            .ok_or(MapError::NotFound)?;

        let image = self.images.save(bytes).await.map_err(storage_failure)?;
        self.maps
            .set_image(map.id, &image)
            .await
            .map_err(storage_failure)?;
        map.image = Some(image);

        let mut refreshed = 0usize;
        for (_, handle) in self.storage.snapshot().await {
            let mut entry = handle.lock().await;
            let shows_map = entry
                .game_set()
                .map
                .as_ref()
                .is_some_and(|current| current.id == map.id);
            if shows_map {
                entry.modify(|game_set| game_set.map = Some(map.clone()));
                refreshed += 1;
            }
        }
        tracing::info!(map_id = map.id, refreshed, "map image uploaded");

        Ok(map)
    }

    pub async fn load_image(&self, image: &str) -> Result<Vec<u8>, MapError> {
        self.images
            .load(image)
            .await
            .map_err(storage_failure)?
            .ok_or(MapError::NotFound)
    }
}

fn storage_failure(err: StorageError) -> MapError {
    tracing::error!(error = %err, "map storage failure");
    MapError::StorageFailure
}
