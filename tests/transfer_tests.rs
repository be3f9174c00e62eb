//! Transfer engine behaviour against a directory-backed remote

mod common;

use std::sync::atomic::Ordering;

use common::{LocalRootFs, LocalSession, Op, TestEnvironment};
use zscp::app::run_and_close;
use zscp::endpoint::{RemoteEndpoint, TransferDirection, TransferRequest};
use zscp::error::SftpError;
use zscp::sftp::execute;

fn request(direction: TransferDirection, remote_path: &str, local_path: &str) -> TransferRequest {
    TransferRequest {
        direction,
        remote: RemoteEndpoint {
            username: "alice".to_string(),
            target_identity: "host1".to_string(),
            path: remote_path.to_string(),
        },
        local_path: local_path.to_string(),
    }
}

fn upload(remote_path: &str, local_path: &std::path::Path) -> TransferRequest {
    request(
        TransferDirection::UploadToRemote,
        remote_path,
        &local_path.to_string_lossy(),
    )
}

fn download(remote_path: &str, local_path: &std::path::Path) -> TransferRequest {
    request(
        TransferDirection::DownloadFromRemote,
        remote_path,
        &local_path.to_string_lossy(),
    )
}

fn position(ops: &[Op], op: &Op) -> usize {
    ops.iter()
        .position(|o| o == op)
        .unwrap_or_else(|| panic!("{:?} not performed; ops: {:?}", op, ops))
}

#[tokio::test]
async fn upload_to_empty_remote_path_uses_source_name() {
    let env = TestEnvironment::new();
    let source = TestEnvironment::write_file(env.local_dir.path(), "notes.txt", b"hello");
    let fs = env.remote_fs();

    let summary = execute(&fs, &upload("", &source), false).await.unwrap();

    assert_eq!(fs.ops(), vec![Op::Write("notes.txt".to_string())]);
    assert_eq!(summary.files, 1);
    assert_eq!(summary.bytes, 5);
    assert_eq!(std::fs::read(fs.local_path("notes.txt")).unwrap(), b"hello");
}

#[tokio::test]
async fn upload_into_remote_directory_appends_source_name() {
    let env = TestEnvironment::new();
    let source = TestEnvironment::write_file(env.local_dir.path(), "notes.txt", b"hello");
    std::fs::create_dir(env.remote_dir.path().join("incoming")).unwrap();
    let fs = env.remote_fs();

    execute(&fs, &upload("/incoming", &source), false)
        .await
        .unwrap();

    assert_eq!(fs.ops(), vec![Op::Write("/incoming/notes.txt".to_string())]);
    assert_eq!(
        std::fs::read(fs.local_path("/incoming/notes.txt")).unwrap(),
        b"hello"
    );
}

#[tokio::test]
async fn upload_to_missing_remote_path_uses_it_verbatim() {
    let env = TestEnvironment::new();
    let source = TestEnvironment::write_file(env.local_dir.path(), "notes.txt", b"hello");
    let fs = env.remote_fs();

    execute(&fs, &upload("/renamed.txt", &source), false)
        .await
        .unwrap();

    assert_eq!(fs.ops(), vec![Op::Write("/renamed.txt".to_string())]);
}

#[tokio::test]
async fn upload_of_directory_without_recursive_is_rejected() {
    let env = TestEnvironment::new();
    let fs = env.remote_fs();

    let err = execute(&fs, &upload("/", env.local_dir.path()), false)
        .await
        .unwrap_err();

    assert!(matches!(err, SftpError::LocalIo(_)));
    assert!(fs.ops().is_empty());
}

#[tokio::test]
async fn recursive_upload_creates_parents_before_children() {
    let env = TestEnvironment::new();
    let root = env.local("a");
    TestEnvironment::write_file(&root, "x.txt", b"x");
    TestEnvironment::write_file(&root, "b/y.txt", b"yy");
    std::fs::create_dir(env.remote_dir.path().join("dest")).unwrap();
    let fs = env.remote_fs();

    let summary = execute(&fs, &upload("/dest", &root), true).await.unwrap();
    let ops = fs.ops();

    let mkdir_a = position(&ops, &Op::Mkdir("/dest/a".to_string()));
    let mkdir_b = position(&ops, &Op::Mkdir("/dest/a/b".to_string()));
    let write_x = position(&ops, &Op::Write("/dest/a/x.txt".to_string()));
    let write_y = position(&ops, &Op::Write("/dest/a/b/y.txt".to_string()));

    assert!(mkdir_a < mkdir_b);
    assert!(mkdir_a < write_x);
    assert!(mkdir_b < write_y);
    assert_eq!(ops.len(), 4);

    assert_eq!(summary.files, 2);
    assert_eq!(summary.directories, 2);
    assert_eq!(summary.bytes, 3);
    assert!(summary.skipped_directories.is_empty());
    assert_eq!(std::fs::read(fs.local_path("/dest/a/b/y.txt")).unwrap(), b"yy");
}

#[tokio::test]
async fn failed_directory_creation_does_not_abort_upload() {
    let env = TestEnvironment::new();
    let root = env.local("a");
    std::fs::create_dir_all(root.join("empty")).unwrap();
    TestEnvironment::write_file(&root, "x.txt", b"x");
    std::fs::create_dir(env.remote_dir.path().join("dest")).unwrap();
    let fs = env.remote_fs().deny_mkdir("/dest/a/empty");

    let summary = execute(&fs, &upload("/dest", &root), true).await.unwrap();

    assert_eq!(summary.skipped_directories, vec!["/dest/a/empty".to_string()]);
    assert_eq!(summary.directories, 1);
    assert_eq!(summary.files, 1);
    assert!(fs.ops().contains(&Op::Write("/dest/a/x.txt".to_string())));
}

#[tokio::test]
async fn failed_file_write_aborts_upload() {
    let env = TestEnvironment::new();
    let root = env.local("a");
    TestEnvironment::write_file(&root, "b/y.txt", b"y");
    TestEnvironment::write_file(&root, "z.txt", b"z");
    std::fs::create_dir(env.remote_dir.path().join("dest")).unwrap();
    let fs = env.remote_fs().deny_mkdir("/dest/a/b");

    let err = execute(&fs, &upload("/dest", &root), true)
        .await
        .unwrap_err();

    assert!(matches!(err, SftpError::Transfer(_)));
    let ops = fs.ops();
    assert_eq!(ops.last(), Some(&Op::Write("/dest/a/b/y.txt".to_string())));
    assert!(!ops.contains(&Op::Write("/dest/a/z.txt".to_string())));
}

#[cfg(unix)]
#[tokio::test]
async fn recursive_upload_follows_file_links_and_reports_the_rest() {
    use std::os::unix::fs::symlink;

    let env = TestEnvironment::new();
    let outside = TestEnvironment::write_file(env.local_dir.path(), "outside.txt", b"linked");
    let root = env.local("a");
    TestEnvironment::write_file(&root, "x.txt", b"x");
    std::fs::create_dir(env.local("elsewhere")).unwrap();
    symlink(&outside, root.join("link.txt")).unwrap();
    symlink(env.local("elsewhere"), root.join("dirlink")).unwrap();
    symlink(env.local("missing.txt"), root.join("dangling")).unwrap();
    std::fs::create_dir(env.remote_dir.path().join("dest")).unwrap();
    let fs = env.remote_fs();

    let summary = execute(&fs, &upload("/dest", &root), true).await.unwrap();

    assert_eq!(
        fs.ops(),
        vec![
            Op::Mkdir("/dest/a".to_string()),
            Op::Write("/dest/a/link.txt".to_string()),
            Op::Write("/dest/a/x.txt".to_string()),
        ]
    );
    assert_eq!(
        std::fs::read(fs.local_path("/dest/a/link.txt")).unwrap(),
        b"linked"
    );
    assert_eq!(summary.files, 2);
    assert_eq!(summary.bytes, 7);
    assert_eq!(
        summary.skipped_entries,
        vec![
            root.join("dangling").display().to_string(),
            root.join("dirlink").display().to_string(),
        ]
    );
}

#[tokio::test]
async fn download_single_file_is_byte_identical() {
    let env = TestEnvironment::new();
    let content: Vec<u8> = (0..=255u8).cycle().take(64 * 1024 + 7).collect();
    TestEnvironment::write_file(env.remote_dir.path(), "etc/motd", &content);
    let fs = env.remote_fs();

    let summary = execute(&fs, &download("/etc/motd", env.local_dir.path()), false)
        .await
        .unwrap();

    assert_eq!(fs.ops(), vec![Op::Read("/etc/motd".to_string())]);
    assert_eq!(summary.bytes, content.len() as u64);
    assert_eq!(std::fs::read(env.local("motd")).unwrap(), content);
}

#[tokio::test]
async fn download_to_named_local_file() {
    let env = TestEnvironment::new();
    TestEnvironment::write_file(env.remote_dir.path(), "etc/motd", b"welcome");
    let fs = env.remote_fs();
    let target = env.local("copy.txt");

    execute(&fs, &download("/etc/motd", &target), false)
        .await
        .unwrap();

    assert_eq!(std::fs::read(target).unwrap(), b"welcome");
}

#[tokio::test]
async fn download_of_missing_file_fails() {
    let env = TestEnvironment::new();
    let fs = env.remote_fs();

    let err = execute(&fs, &download("/nope.txt", env.local_dir.path()), false)
        .await
        .unwrap_err();

    assert!(matches!(err, SftpError::Transfer(_)));
}

#[tokio::test]
async fn download_of_directory_without_recursive_is_rejected() {
    let env = TestEnvironment::new();
    std::fs::create_dir(env.remote_dir.path().join("srv")).unwrap();
    let fs = env.remote_fs();

    let err = execute(&fs, &download("/srv", env.local_dir.path()), false)
        .await
        .unwrap_err();

    assert!(matches!(err, SftpError::Transfer(_)));
}

#[tokio::test]
async fn recursive_download_mirrors_remote_tree() {
    let env = TestEnvironment::new();
    TestEnvironment::write_file(env.remote_dir.path(), "srv/x.txt", b"x");
    TestEnvironment::write_file(env.remote_dir.path(), "srv/sub/y.txt", b"yy");
    let fs = env.remote_fs();

    let summary = execute(&fs, &download("/srv", env.local_dir.path()), true)
        .await
        .unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(summary.directories, 2);
    assert_eq!(summary.bytes, 3);
    assert_eq!(std::fs::read(env.local("srv/x.txt")).unwrap(), b"x");
    assert_eq!(std::fs::read(env.local("srv/sub/y.txt")).unwrap(), b"yy");
}

#[tokio::test]
async fn local_root_fs_maps_paths_below_root() {
    let env = TestEnvironment::new();
    let fs = LocalRootFs::new(env.remote_dir.path());
    assert_eq!(fs.local_path("/a/b"), env.remote_dir.path().join("a/b"));
    assert_eq!(fs.local_path("a"), env.remote_dir.path().join("a"));
}

#[tokio::test]
async fn session_is_closed_after_successful_transfer() {
    let env = TestEnvironment::new();
    TestEnvironment::write_file(env.remote_dir.path(), "etc/motd", b"welcome");
    let (session, closed) = LocalSession::new(env.remote_fs());

    let summary = run_and_close(session, &download("/etc/motd", env.local_dir.path()), false)
        .await
        .unwrap();

    assert_eq!(summary.files, 1);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn session_is_closed_when_transfer_fails() {
    let env = TestEnvironment::new();
    let (session, closed) = LocalSession::new(env.remote_fs());

    let err = run_and_close(session, &download("/nope.txt", env.local_dir.path()), false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("could not retrieve /nope.txt from host1"));
    assert!(err.chain().any(|cause| cause.downcast_ref::<SftpError>().is_some()));
    assert!(closed.load(Ordering::SeqCst));
}
