use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use logpanel_controller::{
    ControllerOptions, FileLocator, LogSourceController, MemorySurface, PanelStateStore, Push,
    Request, RunnerOptions, SourceHandle, SourceKind, SourceStores, WatchMode, spawn_source,
};
use tempfile::TempDir;

const INTERVAL: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(5);

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

fn start(dir: &TempDir, mode: WatchMode) -> (SourceHandle, MemorySurface, PathBuf) {
    let log = dir.path().join("server.log");
    fs::write(&log, "").unwrap();

    let state_dir = dir.path().join("state");
    let stores = SourceStores::in_dir(
        &state_dir,
        SourceKind::Server,
        100,
        PanelStateStore::in_dir(&state_dir),
    );
    let controller = LogSourceController::new(
        SourceKind::Server,
        vec![log.clone()],
        ControllerOptions::default(),
        stores,
        FileLocator::default(),
    )
    .unwrap();

    let handle = spawn_source(
        controller,
        RunnerOptions {
            refresh_interval: INTERVAL,
            watch_mode: mode,
        },
    );
    let surface = MemorySurface::new();
    assert!(handle.attach(Arc::new(surface.clone())));
    (handle, surface, log)
}

/// Collect pushes until `done` sees one it likes
async fn wait_for<F>(surface: &MemorySurface, mut done: F) -> Vec<Push>
where
    F: FnMut(&Push) -> bool,
{
    let mut seen = Vec::new();
    let found = tokio::time::timeout(WAIT, async {
        loop {
            for push in surface.take() {
                let hit = done(&push);
                seen.push(push);
                if hit {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "timed out, saw {:?}", seen);
    seen
}

fn is_log_with(push: &Push, line: &str) -> bool {
    matches!(push, Push::Log { lines, .. } if lines.iter().any(|l| l == line))
}

#[tokio::test]
async fn test_poll_mode_delivers_appended_lines() {
    let dir = TempDir::new().unwrap();
    let (handle, surface, log) = start(&dir, WatchMode::Poll);

    append(&log, "2024-05-01 10:00:02,000000 second\n2024-05-01 10:00:01,000000 first\n");

    let pushes = wait_for(&surface, |p| is_log_with(p, "2024-05-01 10:00:02,000000 second")).await;
    let Some(Push::Log { lines, .. }) = pushes.last() else {
        panic!("expected a log push");
    };
    assert_eq!(
        lines,
        &vec![
            "2024-05-01 10:00:01,000000 first".to_string(),
            "2024-05-01 10:00:02,000000 second".to_string(),
        ]
    );

    handle.dispose().await;
}

#[tokio::test]
async fn test_native_mode_delivers_appended_lines() {
    let dir = TempDir::new().unwrap();
    let (handle, surface, log) = start(&dir, WatchMode::Native);

    // Give the watcher a moment to register before writing
    tokio::time::sleep(Duration::from_millis(100)).await;
    append(&log, "watched line\n");

    wait_for(&surface, |p| is_log_with(p, "watched line")).await;
    assert_eq!(handle.buffer().len(), 1);

    handle.dispose().await;
}

#[tokio::test]
async fn test_burst_lands_in_one_batch() {
    let dir = TempDir::new().unwrap();
    let (handle, surface, log) = start(&dir, WatchMode::Poll);
    wait_for(&surface, |p| matches!(p, Push::History { .. })).await;

    handle.notify_change(log.clone());
    append(&log, "a\nb\nc\n");
    for _ in 0..5 {
        handle.notify_change(log.clone());
    }

    let pushes = wait_for(&surface, |p| is_log_with(p, "a")).await;
    let Some(Push::Log { lines, .. }) = pushes.last() else {
        panic!("expected a log push");
    };
    assert_eq!(lines, &vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    assert_eq!(handle.buffer().len(), 3);

    handle.dispose().await;
}

#[tokio::test]
async fn test_search_refreshes_with_new_lines() {
    let dir = TempDir::new().unwrap();
    let (handle, surface, log) = start(&dir, WatchMode::Poll);

    handle.send(Request::SearchLog {
        query: "needle".to_string(),
        regex: false,
        case_sensitive: false,
    });
    wait_for(&surface, |p| matches!(p, Push::SearchResult { payload } if payload.is_empty())).await;

    append(&log, "hay\nNEEDLE one\n");

    let pushes = wait_for(
        &surface,
        |p| matches!(p, Push::SearchResult { payload } if payload.len() == 1),
    )
    .await;
    let Some(Push::SearchResult { payload }) = pushes.last() else {
        panic!("expected a search result");
    };
    assert_eq!(payload[0].index, 1);
    assert_eq!(payload[0].content, "NEEDLE one");

    handle.dispose().await;
}

#[tokio::test]
async fn test_get_log_by_index_round_trip() {
    let dir = TempDir::new().unwrap();
    let (handle, surface, log) = start(&dir, WatchMode::Poll);

    let text: String = (0..20).map(|i| format!("row {}\n", i)).collect();
    append(&log, &text);
    wait_for(&surface, |p| is_log_with(p, "row 19")).await;

    handle.send(Request::GetLogByIndex {
        index: 3,
        content_hash: Some("row 12".to_string()),
    });
    let pushes = wait_for(
        &surface,
        |p| matches!(p, Push::Log { target_line_index: Some(_), .. }),
    )
    .await;
    let Some(Push::Log {
        lines,
        target_line_index: Some(target),
    }) = pushes.last()
    else {
        panic!("expected a pinned log push");
    };
    assert_eq!(lines[*target], "row 12");

    handle.dispose().await;
}

#[tokio::test]
async fn test_dispose_releases_the_source() {
    let dir = TempDir::new().unwrap();
    let (handle, surface, log) = start(&dir, WatchMode::Native);
    assert!(handle.is_running());
    let buffer = handle.buffer().clone();

    tokio::time::timeout(WAIT, handle.dispose()).await.unwrap();

    append(&log, "after dispose\n");
    tokio::time::sleep(INTERVAL * 5).await;
    assert!(buffer.is_empty());
    assert!(!surface.take().iter().any(|p| is_log_with(p, "after dispose")));
}
