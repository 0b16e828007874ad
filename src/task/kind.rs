//! Task kinds and the overlap allow-list

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of server-mutating work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    NewIndex,
    ModifyIndex,
    DeleteIndex,
    VerifyIndex,
    RebuildIndex,
    NewSchemaElements,
    ModifyAttribute,
    ModifyObjectClass,
    DeleteSchemaElements,
    Backup,
    Restore,
    ExportLdif,
    ImportLdif,
    NewBaseDn,
    DeleteBaseDn,
    DeleteBackend,
    EnableWindowsService,
    DisableWindowsService,
    StartServer,
    StopServer,
    RestartServer,
}

impl TaskKind {
    pub const ALL: [TaskKind; 21] = [
        TaskKind::NewIndex,
        TaskKind::ModifyIndex,
        TaskKind::DeleteIndex,
        TaskKind::VerifyIndex,
        TaskKind::RebuildIndex,
        TaskKind::NewSchemaElements,
        TaskKind::ModifyAttribute,
        TaskKind::ModifyObjectClass,
        TaskKind::DeleteSchemaElements,
        TaskKind::Backup,
        TaskKind::Restore,
        TaskKind::ExportLdif,
        TaskKind::ImportLdif,
        TaskKind::NewBaseDn,
        TaskKind::DeleteBaseDn,
        TaskKind::DeleteBackend,
        TaskKind::EnableWindowsService,
        TaskKind::DisableWindowsService,
        TaskKind::StartServer,
        TaskKind::StopServer,
        TaskKind::RestartServer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::NewIndex => "new-index",
            TaskKind::ModifyIndex => "modify-index",
            TaskKind::DeleteIndex => "delete-index",
            TaskKind::VerifyIndex => "verify-index",
            TaskKind::RebuildIndex => "rebuild-index",
            TaskKind::NewSchemaElements => "new-schema-elements",
            TaskKind::ModifyAttribute => "modify-attribute",
            TaskKind::ModifyObjectClass => "modify-object-class",
            TaskKind::DeleteSchemaElements => "delete-schema-elements",
            TaskKind::Backup => "backup",
            TaskKind::Restore => "restore",
            TaskKind::ExportLdif => "export-ldif",
            TaskKind::ImportLdif => "import-ldif",
            TaskKind::NewBaseDn => "new-base-dn",
            TaskKind::DeleteBaseDn => "delete-base-dn",
            TaskKind::DeleteBackend => "delete-backend",
            TaskKind::EnableWindowsService => "enable-windows-service",
            TaskKind::DisableWindowsService => "disable-windows-service",
            TaskKind::StartServer => "start-server",
            TaskKind::StopServer => "stop-server",
            TaskKind::RestartServer => "restart-server",
        }
    }

    /// Read-mostly kinds allowed to run next to a verify-index task
    fn overlaps_verify(&self) -> bool {
        matches!(
            self,
            TaskKind::Backup
                | TaskKind::ExportLdif
                | TaskKind::EnableWindowsService
                | TaskKind::DisableWindowsService
        )
    }

    /// True when the two kinds may run at once on a shared backend.
    /// The relation is symmetric.
    pub fn may_overlap(a: TaskKind, b: TaskKind) -> bool {
        (a == TaskKind::VerifyIndex && b.overlaps_verify())
            || (b == TaskKind::VerifyIndex && a.overlaps_verify())
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
