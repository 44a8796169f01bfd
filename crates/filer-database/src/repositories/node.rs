//! PostgreSQL tree store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use filer_core::error::{AppError, ErrorKind};
use filer_core::result::AppResult;
use filer_core::types::{FileId, FolderId, UserId};
use filer_entity::file::{File, ImageInfo, SubjectLocation};
use filer_entity::folder::{Folder, Subtree};
use filer_entity::node::{Node, NodeRef};

use crate::store::{Change, ChangeSet, TreeStore, sort_by_name, subtree_too_deep};

const FOLDER_COLUMNS: &str = "id, parent_id, name, owner_id, created_at, updated_at";

const FILE_COLUMNS: &str = "id, folder_id, name, original_filename, mime_type, size_bytes, \
     content_ref, is_public, owner_id, width, height, subject_x, subject_y, created_at, updated_at";

/// SQL expression for a file's effective name.
const FILE_EFFECTIVE_NAME: &str =
    "CASE WHEN btrim(COALESCE(name, '')) = '' THEN original_filename ELSE name END";

/// Advisory lock key serialising changes among root-level siblings.
const ROOT_LOCK_KEY: i64 = 0x6669_6c65_7200;

/// Row shape of the `files` table.
#[derive(Debug, FromRow)]
struct FileRow {
    id: FileId,
    folder_id: Option<FolderId>,
    name: Option<String>,
    original_filename: String,
    mime_type: Option<String>,
    size_bytes: i64,
    content_ref: String,
    is_public: bool,
    owner_id: Option<UserId>,
    width: Option<i32>,
    height: Option<i32>,
    subject_x: Option<i32>,
    subject_y: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FileRow> for File {
    fn from(row: FileRow) -> Self {
        let image = row.width.zip(row.height).map(|(w, h)| ImageInfo {
            width: clamp_u32(w),
            height: clamp_u32(h),
            subject_location: row
                .subject_x
                .zip(row.subject_y)
                .map(|(x, y)| SubjectLocation::new(clamp_u32(x), clamp_u32(y))),
        });
        Self {
            id: row.id,
            folder_id: row.folder_id,
            name: row.name,
            original_filename: row.original_filename,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            content_ref: row.content_ref,
            is_public: row.is_public,
            owner_id: row.owner_id,
            image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A folder row tagged with the chain it belongs to.
#[derive(Debug, FromRow)]
struct ChainRow {
    #[sqlx(flatten)]
    folder: Folder,
    start_id: FolderId,
}

fn clamp_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_i32(value: u32, what: &str) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|_| AppError::validation(format!("{what} {value} exceeds the storable range")))
}

fn folder_uuids(ids: &[FolderId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.into_uuid()).collect()
}

/// A folder row from the subtree query with its distance from the root.
#[derive(Debug, FromRow)]
struct SubtreeRow {
    #[sqlx(flatten)]
    folder: Folder,
    depth: i32,
}

/// Tree store over the `folders` and `files` tables.
#[derive(Debug, Clone)]
pub struct PgTreeStore {
    pool: PgPool,
    max_depth: i32,
}

impl PgTreeStore {
    /// Create a new tree store. Recursive queries stop after `max_depth`
    /// levels.
    pub fn new(pool: PgPool, max_depth: usize) -> Self {
        Self {
            pool,
            max_depth: i32::try_from(max_depth).unwrap_or(i32::MAX),
        }
    }

    /// Lock every parent receiving children so concurrent writers to the
    /// same folder serialise on the name check.
    async fn lock_parents(
        tx: &mut Transaction<'_, Postgres>,
        parents: &[Option<FolderId>],
    ) -> AppResult<()> {
        let mut ordered = parents.to_vec();
        ordered.sort();
        for parent in ordered {
            match parent {
                Some(id) => {
                    sqlx::query("SELECT 1 FROM folders WHERE id = $1 FOR UPDATE")
                        .bind(id)
                        .fetch_optional(&mut **tx)
                        .await?;
                }
                None => {
                    sqlx::query("SELECT pg_advisory_xact_lock($1)")
                        .bind(ROOT_LOCK_KEY)
                        .execute(&mut **tx)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn apply_change(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        change: Change,
    ) -> AppResult<()> {
        let target = change.target();
        let affected = match change {
            Change::InsertFolder(f) => {
                sqlx::query(
                    "INSERT INTO folders (id, parent_id, name, owner_id, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(f.id)
                .bind(f.parent_id)
                .bind(&f.name)
                .bind(f.owner_id)
                .bind(f.created_at)
                .bind(f.updated_at)
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            Change::UpdateFolder(f) => {
                if let Some(parent) = f.parent_id {
                    let cyclic: bool = sqlx::query_scalar(
                        "WITH RECURSIVE up AS ( \
                             SELECT id, parent_id, 0 AS depth FROM folders WHERE id = $1 \
                             UNION ALL \
                             SELECT p.id, p.parent_id, up.depth + 1 FROM folders p \
                             JOIN up ON p.id = up.parent_id WHERE up.depth < $3 \
                         ) SELECT EXISTS (SELECT 1 FROM up WHERE id = $2)",
                    )
                    .bind(parent)
                    .bind(f.id)
                    .bind(self.max_depth)
                    .fetch_one(&mut **tx)
                    .await?;
                    if cyclic {
                        return Err(AppError::validation(format!(
                            "Folder {} cannot be placed inside itself",
                            f.id
                        )));
                    }
                }
                sqlx::query(
                    "UPDATE folders SET parent_id = $2, name = $3, owner_id = $4, updated_at = $5 \
                     WHERE id = $1",
                )
                .bind(f.id)
                .bind(f.parent_id)
                .bind(&f.name)
                .bind(f.owner_id)
                .bind(f.updated_at)
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            Change::DeleteFolder(id) => sqlx::query("DELETE FROM folders WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
            Change::InsertFile(f) => {
                let (width, height, sx, sy) = image_columns(&f)?;
                sqlx::query(
                    "INSERT INTO files (id, folder_id, name, original_filename, mime_type, \
                     size_bytes, content_ref, is_public, owner_id, width, height, subject_x, \
                     subject_y, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                )
                .bind(f.id)
                .bind(f.folder_id)
                .bind(&f.name)
                .bind(&f.original_filename)
                .bind(&f.mime_type)
                .bind(f.size_bytes)
                .bind(&f.content_ref)
                .bind(f.is_public)
                .bind(f.owner_id)
                .bind(width)
                .bind(height)
                .bind(sx)
                .bind(sy)
                .bind(f.created_at)
                .bind(f.updated_at)
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            Change::UpdateFile(f) => {
                let (width, height, sx, sy) = image_columns(&f)?;
                sqlx::query(
                    "UPDATE files SET folder_id = $2, name = $3, original_filename = $4, \
                     mime_type = $5, size_bytes = $6, content_ref = $7, is_public = $8, \
                     owner_id = $9, width = $10, height = $11, subject_x = $12, subject_y = $13, \
                     updated_at = $14 WHERE id = $1",
                )
                .bind(f.id)
                .bind(f.folder_id)
                .bind(&f.name)
                .bind(&f.original_filename)
                .bind(&f.mime_type)
                .bind(f.size_bytes)
                .bind(&f.content_ref)
                .bind(f.is_public)
                .bind(f.owner_id)
                .bind(width)
                .bind(height)
                .bind(sx)
                .bind(sy)
                .bind(f.updated_at)
                .execute(&mut **tx)
                .await?
                .rows_affected()
            }
            Change::DeleteFile(id) => sqlx::query("DELETE FROM files WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
        };

        if affected == 0 {
            return Err(AppError::not_found(format!("{target} not found")));
        }
        Ok(())
    }

    async fn duplicate_name(
        tx: &mut Transaction<'_, Postgres>,
        parent: Option<FolderId>,
    ) -> AppResult<Option<String>> {
        let sql = format!(
            "SELECT n FROM ( \
                 SELECT name AS n FROM folders WHERE parent_id IS NOT DISTINCT FROM $1 \
                 UNION ALL \
                 SELECT {FILE_EFFECTIVE_NAME} FROM files WHERE folder_id IS NOT DISTINCT FROM $1 \
             ) s GROUP BY n HAVING COUNT(*) > 1 LIMIT 1"
        );
        Ok(sqlx::query_scalar::<_, String>(&sql)
            .bind(parent)
            .fetch_optional(&mut **tx)
            .await?)
    }
}

type ImageColumns = (Option<i32>, Option<i32>, Option<i32>, Option<i32>);

fn image_columns(file: &File) -> AppResult<ImageColumns> {
    let Some(image) = &file.image else {
        return Ok((None, None, None, None));
    };
    let (sx, sy) = match image.subject_location {
        Some(loc) => (
            Some(to_i32(loc.x, "Subject x")?),
            Some(to_i32(loc.y, "Subject y")?),
        ),
        None => (None, None),
    };
    Ok((
        Some(to_i32(image.width, "Width")?),
        Some(to_i32(image.height, "Height")?),
        sx,
        sy,
    ))
}

#[async_trait]
impl TreeStore for PgTreeStore {
    async fn folder(&self, id: FolderId) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>(&format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
    }

    async fn file(&self, id: FileId) -> AppResult<Option<File>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = $1");
        let row = sqlx::query_as::<_, FileRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))?;
        Ok(row.map(File::from))
    }

    async fn folders(&self, ids: &[FolderId]) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ANY($1)"
        ))
        .bind(folder_uuids(ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load folders", e))
    }

    async fn files(&self, ids: &[FileId]) -> AppResult<Vec<File>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ANY($1)"
        ))
        .bind(ids.iter().map(|id| id.into_uuid()).collect::<Vec<Uuid>>())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load files", e))?;
        Ok(rows.into_iter().map(File::from).collect())
    }

    async fn ancestors_of(&self, ids: &[FolderId]) -> AppResult<HashMap<FolderId, Vec<Folder>>> {
        // The depth bound keeps a corrupt cycle from recursing forever; the
        // repeated rows it produces are detected by the caller.
        let rows = sqlx::query_as::<_, ChainRow>(
            "WITH RECURSIVE chain AS ( \
                 SELECT id, parent_id, name, owner_id, created_at, updated_at, \
                        id AS start_id, 0 AS depth \
                 FROM folders WHERE id = ANY($1) \
                 UNION ALL \
                 SELECT p.id, p.parent_id, p.name, p.owner_id, p.created_at, p.updated_at, \
                        c.start_id, c.depth + 1 \
                 FROM folders p JOIN chain c ON p.id = c.parent_id \
                 WHERE c.depth < $2 \
             ) \
             SELECT id, parent_id, name, owner_id, created_at, updated_at, start_id \
             FROM chain ORDER BY start_id, depth",
        )
        .bind(folder_uuids(ids))
        .bind(self.max_depth)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load ancestors", e))?;

        let mut chains: HashMap<FolderId, Vec<Folder>> = HashMap::with_capacity(ids.len());
        for row in rows {
            chains.entry(row.start_id).or_default().push(row.folder);
        }
        debug!(requested = ids.len(), resolved = chains.len(), "Loaded ancestor chains");
        Ok(chains)
    }

    async fn children(&self, parent: Option<FolderId>) -> AppResult<Vec<Node>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id IS NOT DISTINCT FROM $1"
        ))
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list folders", e))?;

        let files = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE folder_id IS NOT DISTINCT FROM $1"
        ))
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))?;

        let mut nodes: Vec<Node> = folders
            .into_iter()
            .map(Node::Folder)
            .chain(files.into_iter().map(|r| Node::File(r.into())))
            .collect();
        sort_by_name(&mut nodes);
        Ok(nodes)
    }

    async fn descendants(&self, id: FolderId) -> AppResult<Option<Subtree>> {
        // One level past the limit so a cut-off subtree can be told apart.
        let rows = sqlx::query_as::<_, SubtreeRow>(
            "WITH RECURSIVE sub AS ( \
                 SELECT id, parent_id, name, owner_id, created_at, updated_at, 0 AS depth \
                 FROM folders WHERE id = $1 \
                 UNION ALL \
                 SELECT f.id, f.parent_id, f.name, f.owner_id, f.created_at, f.updated_at, \
                        s.depth + 1 \
                 FROM folders f JOIN sub s ON f.parent_id = s.id \
                 WHERE s.depth <= $2 \
             ) \
             SELECT id, parent_id, name, owner_id, created_at, updated_at, depth \
             FROM sub ORDER BY depth, name",
        )
        .bind(id)
        .bind(self.max_depth)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load subtree", e))?;

        if rows.iter().any(|r| r.depth > self.max_depth) {
            warn!(folder_id = %id, max_depth = self.max_depth, "Subtree exceeds depth limit");
            return Err(subtree_too_deep(id, self.max_depth));
        }
        let mut folders: Vec<Folder> = rows.into_iter().map(|r| r.folder).collect();
        if folders.first().is_none_or(|f| f.id != id) {
            return Ok(None);
        }
        let root = folders.remove(0);

        let folder_ids: Vec<Uuid> = std::iter::once(root.id)
            .chain(folders.iter().map(|f| f.id))
            .map(FolderId::into_uuid)
            .collect();
        let files = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE folder_id = ANY($1)"
        ))
        .bind(folder_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load subtree files", e))?
        .into_iter()
        .map(File::from)
        .collect();

        Ok(Some(Subtree { root, folders, files }))
    }

    async fn sibling_named(
        &self,
        parent: Option<FolderId>,
        name: &str,
        exclude: Option<NodeRef>,
    ) -> AppResult<Option<NodeRef>> {
        let rows: Vec<(bool, Uuid)> = sqlx::query_as(&format!(
            "SELECT TRUE, id FROM folders WHERE parent_id IS NOT DISTINCT FROM $1 AND name = $2 \
             UNION ALL \
             SELECT FALSE, id FROM files WHERE folder_id IS NOT DISTINCT FROM $1 \
             AND {FILE_EFFECTIVE_NAME} = $2"
        ))
        .bind(parent)
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up sibling", e))?;

        Ok(rows
            .into_iter()
            .map(|(is_folder, id)| {
                if is_folder {
                    NodeRef::Folder(FolderId::from_uuid(id))
                } else {
                    NodeRef::File(FileId::from_uuid(id))
                }
            })
            .find(|r| Some(*r) != exclude))
    }

    async fn apply(&self, changes: ChangeSet) -> AppResult<()> {
        let parents = changes.touched_parents();
        let count = changes.len();
        let mut tx = self.pool.begin().await?;

        Self::lock_parents(&mut tx, &parents).await?;
        for change in changes {
            self.apply_change(&mut tx, change).await?;
        }
        for parent in parents {
            if let Some(name) = Self::duplicate_name(&mut tx, parent).await? {
                warn!(
                    parent = ?parent,
                    name = %name,
                    "Rejected change set with duplicate sibling name"
                );
                return Err(AppError::conflict(format!(
                    "A node named '{name}' already exists in this folder"
                )));
            }
        }

        tx.commit().await?;
        debug!(changes = count, "Applied change set");
        Ok(())
    }
}
