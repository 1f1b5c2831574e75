//! 使用伪造的 pmd 脚本端到端测试子进程调用
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use pmd_gemini_service::analysis::static_analysis::{
    ClassSource, PmdTool, StaticAnalysisManager, StaticAnalysisTool,
};
use pmd_gemini_service::infrastructure::{ErrorCategory, ScanError};

const FINDINGS_SCRIPT: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "PMD 7.9.0"
  exit 0
fi
[ "$1" = "check" ] && [ "$2" = "--dir" ] && [ "$4" = "--format" ] && [ "$5" = "json" ] || exit 2
[ -f "$3/Foo.cls" ] || exit 3
printf '{"files":[{"filename":"%s/Foo.cls","violations":[{"beginline":3,"endline":3,"rule":"AvoidDebugStatements","ruleset":"Performance","description":"Avoid debug statements","priority":3}]}]}' "$3"
exit 4
"#;

const CLEAN_SCRIPT: &str = "#!/bin/sh\nexit 0\n";

const BROKEN_SCRIPT: &str = "#!/bin/sh\necho 'Cannot load ruleset category/apex/bogus.xml' >&2\nexit 1\n";

const SLOW_SCRIPT: &str = "#!/bin/sh\nexec sleep 30\n";

/// 所有脚本在任何子进程启动前一次性写好，避免 ETXTBSY
fn scripts() -> &'static Path {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        for (name, body) in [
            ("findings", FINDINGS_SCRIPT),
            ("clean", CLEAN_SCRIPT),
            ("broken", BROKEN_SCRIPT),
            ("slow", SLOW_SCRIPT),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    })
    .path()
}

fn script(name: &str) -> PathBuf {
    scripts().join(name)
}

fn manager(binary: PathBuf, root: &TempDir) -> StaticAnalysisManager {
    let tool = PmdTool::new(binary, &["category/apex/performance.xml".to_string()], 4);
    StaticAnalysisManager::new(Arc::new(tool), root.path())
}

fn assert_scratch_empty(root: &TempDir) {
    let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch root not empty: {:?}", leftovers);
}

#[tokio::test]
async fn test_findings_exit_code_yields_violations() {
    let root = TempDir::new().unwrap();
    let manager = manager(script("findings"), &root);

    let violations = manager
        .analyze_batch(&[ClassSource::new("Foo", "class Foo { void m() { System.debug('x'); } }")])
        .await
        .unwrap();

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].class_name, "Foo");
    assert_eq!(violations[0].line, 3);
    assert_eq!(violations[0].rule, "AvoidDebugStatements");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn test_single_file_scan_reports_base_name() {
    let root = TempDir::new().unwrap();
    let manager = manager(script("findings"), &root);

    let files = manager.analyze_file("Foo.cls", "class Foo {}").await.unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "Foo.cls");
    assert_eq!(files[0].violations[0].rule_name, "AvoidDebugStatements");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn test_clean_exit_without_output() {
    let root = TempDir::new().unwrap();
    let manager = manager(script("clean"), &root);

    let violations = manager
        .analyze_batch(&[ClassSource::new("Bar.cls", "public class Bar {}")])
        .await
        .unwrap();

    assert!(violations.is_empty());
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn test_unexpected_exit_code_is_execution_error() {
    let root = TempDir::new().unwrap();
    let manager = manager(script("broken"), &root);

    let error = manager
        .analyze_batch(&[ClassSource::new("Foo", "class Foo {}")])
        .await
        .unwrap_err();

    assert_eq!(error.category(), ErrorCategory::Execution);
    match &error {
        ScanError::Execution {
            exit_code, stderr, ..
        } => {
            assert_eq!(*exit_code, Some(1));
            assert!(stderr.as_deref().unwrap_or_default().contains("Cannot load ruleset"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn test_slow_tool_is_killed_on_timeout() {
    let root = TempDir::new().unwrap();
    let manager = manager(script("slow"), &root)
        .with_timeouts(Duration::from_millis(300), Duration::from_millis(300));

    let start = Instant::now();
    let error = manager
        .analyze_batch(&[ClassSource::new("Foo", "class Foo {}")])
        .await
        .unwrap_err();

    assert!(matches!(error, ScanError::Timeout { .. }));
    assert_eq!(error.category(), ErrorCategory::Execution);
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn test_missing_binary() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("no-such-pmd");
    let tool = PmdTool::new(missing.clone(), &[], 4);

    let error = tool.version().await.unwrap_err();
    assert!(error.to_string().contains("failed to launch"));

    let scratch = TempDir::new().unwrap();
    let manager = manager(missing, &scratch);
    let error = manager
        .analyze_batch(&[ClassSource::new("Foo", "class Foo {}")])
        .await
        .unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Execution);
    assert_scratch_empty(&scratch);
}

#[tokio::test]
async fn test_version_probe() {
    let tool = PmdTool::new(script("findings"), &[], 4);
    assert_eq!(tool.version().await.unwrap(), "PMD 7.9.0");
}
