//! PostgreSQL grant store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use filer_core::error::{AppError, ErrorKind};
use filer_core::result::AppResult;
use filer_core::types::{FolderId, FolderPermissionId, GroupId, UserId};
use filer_entity::permission::{FolderPermission, GrantState, PermissionScope, Principal};

use crate::store::GrantStore;

const GRANT_COLUMNS: &str =
    "id, folder_id, user_id, group_id, scope, can_read, can_edit, can_add_children, created_at";

/// Row shape of the `folder_permissions` table.
#[derive(Debug, FromRow)]
struct GrantRow {
    id: FolderPermissionId,
    folder_id: FolderId,
    user_id: Option<UserId>,
    group_id: Option<GroupId>,
    scope: String,
    can_read: Option<bool>,
    can_edit: Option<bool>,
    can_add_children: Option<bool>,
    created_at: DateTime<Utc>,
}

impl TryFrom<GrantRow> for FolderPermission {
    type Error = AppError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        let principal = match (row.user_id, row.group_id) {
            (Some(user), None) => Principal::User(user),
            (None, Some(group)) => Principal::Group(group),
            _ => {
                return Err(AppError::internal(format!(
                    "Grant {} must name exactly one user or group",
                    row.id
                )));
            }
        };
        Ok(Self {
            id: row.id,
            folder_id: row.folder_id,
            principal,
            scope: row.scope.parse::<PermissionScope>()?,
            can_read: GrantState::from_flag(row.can_read),
            can_edit: GrantState::from_flag(row.can_edit),
            can_add_children: GrantState::from_flag(row.can_add_children),
            created_at: row.created_at,
        })
    }
}

fn into_grants(rows: Vec<GrantRow>) -> AppResult<Vec<FolderPermission>> {
    rows.into_iter().map(FolderPermission::try_from).collect()
}

/// Grant store over the `folder_permissions` table.
#[derive(Debug, Clone)]
pub struct PgGrantStore {
    pool: PgPool,
}

impl PgGrantStore {
    /// Create a new grant store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GrantStore for PgGrantStore {
    async fn grants_for(
        &self,
        folder_ids: &[FolderId],
        principals: &[Principal],
    ) -> AppResult<Vec<FolderPermission>> {
        let folders: Vec<Uuid> = folder_ids.iter().map(|id| id.into_uuid()).collect();
        let users: Vec<Uuid> = principals
            .iter()
            .filter_map(Principal::user_id)
            .map(UserId::into_uuid)
            .collect();
        let groups: Vec<Uuid> = principals
            .iter()
            .filter_map(Principal::group_id)
            .map(GroupId::into_uuid)
            .collect();

        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM folder_permissions \
             WHERE folder_id = ANY($1) AND (user_id = ANY($2) OR group_id = ANY($3)) \
             ORDER BY created_at ASC"
        ))
        .bind(folders)
        .bind(users)
        .bind(groups)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load grants", e))?;

        into_grants(rows)
    }

    async fn for_folder(&self, folder_id: FolderId) -> AppResult<Vec<FolderPermission>> {
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM folder_permissions WHERE folder_id = $1 \
             ORDER BY created_at ASC"
        ))
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list folder grants", e)
        })?;

        into_grants(rows)
    }

    async fn create(&self, grant: FolderPermission) -> AppResult<FolderPermission> {
        sqlx::query(
            "INSERT INTO folder_permissions \
             (id, folder_id, user_id, group_id, scope, \
              can_read, can_edit, can_add_children, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(grant.id)
        .bind(grant.folder_id)
        .bind(grant.principal.user_id())
        .bind(grant.principal.group_id())
        .bind(grant.scope.as_str())
        .bind(GrantState::to_flag(grant.can_read))
        .bind(GrantState::to_flag(grant.can_edit))
        .bind(GrantState::to_flag(grant.can_add_children))
        .bind(grant.created_at)
        .execute(&self.pool)
        .await?;

        Ok(grant)
    }

    async fn delete(&self, id: FolderPermissionId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM folder_permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete grant", e))?;
        Ok(result.rows_affected() > 0)
    }
}
