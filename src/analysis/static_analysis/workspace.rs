use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::infrastructure::error::ScanError;

/// 单次请求独占的临时扫描目录
///
/// 目录名由 UUID 生成，同时运行的请求不会共享目录。正常路径下调用
/// [`ScratchWorkspace::cleanup`] 异步删除；若在此之前被丢弃（panic、future
/// 被取消），`Drop` 会同步删除目录。
#[derive(Debug)]
pub struct ScratchWorkspace {
    id: Uuid,
    path: PathBuf,
    released: bool,
}

impl ScratchWorkspace {
    /// 在 `root` 下创建新的临时目录
    pub async fn create(root: &Path) -> Result<Self, ScanError> {
        let id = Uuid::new_v4();
        let path = root.join(id.to_string());

        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            ScanError::workspace(format!("failed to create scratch directory: {}", e), Some(path.as_path()))
        })?;

        tracing::debug!(path = %path.display(), "scratch workspace created");

        Ok(Self {
            id,
            path,
            released: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 将源码原样写入 `<workspace>/<file_name>`
    pub async fn write_source(&self, file_name: &str, source: &str) -> Result<PathBuf, ScanError> {
        if !is_plain_file_name(file_name) {
            return Err(ScanError::workspace(
                format!("refusing to write '{}' outside the scratch directory", file_name),
                Some(self.path.as_path()),
            ));
        }

        let file_path = self.path.join(file_name);
        tokio::fs::write(&file_path, source.as_bytes())
            .await
            .map_err(|e| {
                ScanError::workspace(format!("failed to write {}: {}", file_name, e), Some(file_path.as_path()))
            })?;

        Ok(file_path)
    }

    /// 删除目录及其全部内容
    pub async fn cleanup(mut self) -> Result<(), ScanError> {
        self.released = true;

        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "scratch workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScanError::workspace(
                format!("failed to remove scratch directory: {}", e),
                Some(self.path.as_path()),
            )),
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // 兜底路径：正常流程都走 cleanup，只有 panic 时才会到这里
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove abandoned scratch workspace"
                );
            }
        }
    }
}

/// 只允许单个普通路径分量，防止写出临时目录
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_cleanup() {
        let root = TempDir::new().unwrap();
        let workspace = ScratchWorkspace::create(root.path()).await.unwrap();
        let path = workspace.path().to_path_buf();

        assert!(path.is_dir());
        assert!(path.starts_with(root.path()));
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), workspace.id().to_string());

        workspace.cleanup().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_write_source_verbatim() {
        let root = TempDir::new().unwrap();
        let workspace = ScratchWorkspace::create(root.path()).await.unwrap();

        let source = "public class Café {\n    // ünïcödé\n}\n";
        let file_path = workspace.write_source("Café.cls", source).await.unwrap();

        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), source);
        workspace.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_source_rejects_escaping_names() {
        let root = TempDir::new().unwrap();
        let workspace = ScratchWorkspace::create(root.path()).await.unwrap();

        for name in ["../Evil.cls", "nested/Evil.cls", "/etc/Evil.cls", "..", "."] {
            let result = workspace.write_source(name, "x").await;
            assert!(
                matches!(result, Err(ScanError::Workspace { .. })),
                "name {:?} should be refused",
                name
            );
        }

        assert!(!root.path().join("Evil.cls").exists());
        workspace.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = {
            let workspace = ScratchWorkspace::create(root.path()).await.unwrap();
            workspace.write_source("Foo.cls", "class Foo {}").await.unwrap();
            workspace.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_directory() {
        let root = TempDir::new().unwrap();
        let workspace = ScratchWorkspace::create(root.path()).await.unwrap();
        std::fs::remove_dir_all(workspace.path()).unwrap();

        assert!(workspace.cleanup().await.is_ok());
    }

    #[tokio::test]
    async fn test_create_fails_under_file() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let result = ScratchWorkspace::create(&blocker).await;
        assert!(matches!(result, Err(ScanError::Workspace { .. })));
    }

    #[tokio::test]
    async fn test_workspaces_are_disjoint() {
        let root = TempDir::new().unwrap();
        let first = ScratchWorkspace::create(root.path()).await.unwrap();
        let second = ScratchWorkspace::create(root.path()).await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_ne!(first.path(), second.path());

        first.cleanup().await.unwrap();
        second.cleanup().await.unwrap();
    }
}
