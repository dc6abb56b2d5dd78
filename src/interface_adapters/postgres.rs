// PostgreSQL-backed storage adapters.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::entities::{
    Color, GameSet, Map, NewPawn, NewUser, Pawn, PawnKind, PawnMeta, User, UserSummary,
};
use crate::domain::errors::StorageError;
use crate::domain::ports::{GameSetPersister, GameSetRepository, MapRepository, UserRepository};

fn storage_error(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Backend(err.to_string()),
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    full_name: Option<String>,
    hashed_password: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.hashed_password,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserSummaryRow {
    id: i64,
    username: String,
    full_name: Option<String>,
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        UserSummary {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MapRow {
    id: i64,
    user_id: i64,
    name: String,
    len_x: i32,
    len_y: i32,
    image_short_url: Option<String>,
}

impl From<MapRow> for Map {
    fn from(row: MapRow) -> Self {
        Map {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            len_x: row.len_x,
            len_y: row.len_y,
            image: row.image_short_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GameSetRow {
    id: i64,
    name: String,
    owner_id: i64,
    map_id: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct PawnRow {
    id: i64,
    name: String,
    visibility: bool,
    kind: String,
    size_x: i32,
    size_y: i32,
    x: Option<i32>,
    y: Option<i32>,
    color: String,
    user_id: i64,
    username: String,
    full_name: Option<String>,
}

impl TryFrom<PawnRow> for Pawn {
    type Error = StorageError;

    fn try_from(row: PawnRow) -> Result<Self, Self::Error> {
        let kind = PawnKind::parse(&row.kind)
            .ok_or_else(|| StorageError::Backend(format!("unknown pawn kind {}", row.kind)))?;
        let color = Color::parse(&row.color)
            .ok_or_else(|| StorageError::Backend(format!("invalid pawn color {}", row.color)))?;
        Ok(Pawn {
            id: row.id,
            name: row.name,
            owner: UserSummary {
                id: row.user_id,
                username: row.username,
                full_name: row.full_name,
            },
            meta: PawnMeta {
                visibility: row.visibility,
                kind,
                size_x: row.size_x,
                size_y: row.size_y,
                x: row.x,
                y: row.y,
                color,
            },
        })
    }
}

const MAP_COLUMNS: &str = "id, user_id, name, len_x, len_y, image_short_url";

#[derive(Clone)]
pub struct PostgresUserRepository {
    pub db: PgPool,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StorageError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, full_name, hashed_password)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, full_name, hashed_password
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map(User::from)
        .map_err(storage_error)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, full_name, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map(|row| row.map(User::from))
        .map_err(storage_error)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StorageError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, full_name, hashed_password FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map(|row| row.map(User::from))
        .map_err(storage_error)
    }
}

#[derive(Clone)]
pub struct PostgresMapRepository {
    pub db: PgPool,
}

#[async_trait]
impl MapRepository for PostgresMapRepository {
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        len_x: i32,
        len_y: i32,
    ) -> Result<Map, StorageError> {
        sqlx::query_as::<_, MapRow>(&format!(
            "INSERT INTO maps (user_id, name, len_x, len_y) VALUES ($1, $2, $3, $4) RETURNING {MAP_COLUMNS}"
        ))
        .bind(user_id)
        .bind(name)
        .bind(len_x)
        .bind(len_y)
        .fetch_one(&self.db)
        .await
        .map(Map::from)
        .map_err(storage_error)
    }

    async fn find_by_name(&self, user_id: i64, name: &str) -> Result<Option<Map>, StorageError> {
        sqlx::query_as::<_, MapRow>(&format!(
            "SELECT {MAP_COLUMNS} FROM maps WHERE user_id = $1 AND name = $2"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .map(|row| row.map(Map::from))
        .map_err(storage_error)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Map>, StorageError> {
        sqlx::query_as::<_, MapRow>(&format!(
            "SELECT {MAP_COLUMNS} FROM maps WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map(|rows| rows.into_iter().map(Map::from).collect())
        .map_err(storage_error)
    }

    async fn set_image(&self, map_id: i64, image: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE maps SET image_short_url = $2, updated_at = now() WHERE id = $1")
            .bind(map_id)
            .bind(image)
            .execute(&self.db)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresGameSetRepository {
    pub db: PgPool,
}

impl PostgresGameSetRepository {
    // Build the full aggregate for a game-set row.
    async fn assemble(&self, row: GameSetRow) -> Result<GameSet, StorageError> {
        let owner = sqlx::query_as::<_, UserSummaryRow>(
            "SELECT id, username, full_name FROM users WHERE id = $1",
        )
        .bind(row.owner_id)
        .fetch_one(&self.db)
        .await
        .map_err(storage_error)?;

        let map = match row.map_id {
            Some(map_id) => sqlx::query_as::<_, MapRow>(&format!(
                "SELECT {MAP_COLUMNS} FROM maps WHERE id = $1"
            ))
            .bind(map_id)
            .fetch_optional(&self.db)
            .await
            .map_err(storage_error)?
            .map(Map::from),
            None => None,
        };

        let pawns = sqlx::query_as::<_, PawnRow>(
            r#"
            SELECT p.id, p.name, p.visibility, p.kind, p.size_x, p.size_y, p.x, p.y, p.color,
                   u.id AS user_id, u.username, u.full_name
            FROM pawns p
            JOIN users u ON u.id = p.user_id
            WHERE p.game_set_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.db)
        .await
        .map_err(storage_error)?
        .into_iter()
        .map(Pawn::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let players = sqlx::query_as::<_, UserSummaryRow>(
            r#"
            SELECT u.id, u.username, u.full_name
            FROM users_in_game_sets g
            JOIN users u ON u.id = g.user_id
            WHERE g.game_set_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.db)
        .await
        .map_err(storage_error)?
        .into_iter()
        .map(UserSummary::from)
        .collect();

        Ok(GameSet {
            id: row.id,
            name: row.name,
            owner: owner.into(),
            map,
            pawns,
            players,
        })
    }

    async fn assemble_all(&self, rows: Vec<GameSetRow>) -> Result<Vec<GameSet>, StorageError> {
        let mut game_sets = Vec::with_capacity(rows.len());
        for row in rows {
            game_sets.push(self.assemble(row).await?);
        }
        Ok(game_sets)
    }
}

#[async_trait]
impl GameSetRepository for PostgresGameSetRepository {
    async fn create(
        &self,
        owner_id: i64,
        name: &str,
        map_id: Option<i64>,
    ) -> Result<i64, StorageError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO game_sets (name, owner_id, map_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(owner_id)
        .bind(map_id)
        .fetch_one(&self.db)
        .await
        .map_err(storage_error)
    }

    async fn load(&self, id: i64) -> Result<Option<GameSet>, StorageError> {
        let row = sqlx::query_as::<_, GameSetRow>(
            "SELECT id, name, owner_id, map_id FROM game_sets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => self.assemble(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM game_sets WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn add_player(&self, game_set_id: i64, user_id: i64) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO users_in_game_sets (user_id, game_set_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(game_set_id)
            .execute(&self.db)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn add_pawn(&self, pawn: NewPawn) -> Result<Pawn, StorageError> {
        let meta = &pawn.meta;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO pawns (game_set_id, user_id, name, visibility, kind, size_x, size_y, x, y, color)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(pawn.game_set_id)
        .bind(pawn.owner.id)
        .bind(&pawn.name)
        .bind(meta.visibility)
        .bind(meta.kind.as_str())
        .bind(meta.size_x)
        .bind(meta.size_y)
        .bind(meta.x)
        .bind(meta.y)
        .bind(meta.color.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(storage_error)?;

        Ok(Pawn {
            id,
            name: pawn.name,
            owner: pawn.owner,
            meta: pawn.meta,
        })
    }

    async fn list_owned(&self, user_id: i64) -> Result<Vec<GameSet>, StorageError> {
        let rows = sqlx::query_as::<_, GameSetRow>(
            "SELECT id, name, owner_id, map_id FROM game_sets WHERE owner_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(storage_error)?;
        self.assemble_all(rows).await
    }

    async fn list_joined(&self, user_id: i64) -> Result<Vec<GameSet>, StorageError> {
        let rows = sqlx::query_as::<_, GameSetRow>(
            r#"
            SELECT g.id, g.name, g.owner_id, g.map_id
            FROM game_sets g
            JOIN users_in_game_sets m ON m.game_set_id = g.id
            WHERE m.user_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(storage_error)?;
        self.assemble_all(rows).await
    }
}

#[async_trait]
impl GameSetPersister for PostgresGameSetRepository {
    // Writes the mutable fields of the aggregate in one transaction. A game
    // set deleted in the meantime updates zero rows and is reported as
    // `NotFound`; the dropped transaction rolls back.
    async fn persist(&self, game_set: &GameSet) -> Result<(), StorageError> {
        let mut tx = self.db.begin().await.map_err(storage_error)?;

        let updated = sqlx::query(
            "UPDATE game_sets SET name = $2, map_id = $3, updated_at = now() WHERE id = $1",
        )
        .bind(game_set.id)
        .bind(&game_set.name)
        .bind(game_set.map.as_ref().map(|map| map.id))
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        for pawn in &game_set.pawns {
            let meta = &pawn.meta;
            sqlx::query(
                r#"
                UPDATE pawns
                SET visibility = $3, kind = $4, size_x = $5, size_y = $6, x = $7, y = $8,
                    color = $9, updated_at = now()
                WHERE id = $1 AND game_set_id = $2
                "#,
            )
            .bind(pawn.id)
            .bind(game_set.id)
            .bind(meta.visibility)
            .bind(meta.kind.as_str())
            .bind(meta.size_x)
            .bind(meta.size_y)
            .bind(meta.x)
            .bind(meta.y)
            .bind(meta.color.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)
    }
}
