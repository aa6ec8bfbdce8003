// tests/remote_mount.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use devloop::errors::DevloopError;
use devloop::fs::mock::MockFileSystem;
use devloop::remote::RemoteMountGenerator;
use devloop::vfs::VirtualFileSystem;
use devloop_test_utils::fakes::{FakeBuilder, FakeLauncher, FixedRenderer, StaticSource, Timeline};

const ROOT: &str = "/project";
const ENTRY: &str = ".devloop/generator/main.go";

struct Harness {
    vfs: VirtualFileSystem,
    fs: MockFileSystem,
    timeline: Timeline,
    builder: FakeBuilder,
    launcher: FakeLauncher,
    renderer: FixedRenderer,
    source: StaticSource,
}

fn harness() -> Harness {
    let fs = MockFileSystem::new();
    let timeline = Timeline::new();
    let builder = FakeBuilder::new().with_timeline(timeline.clone());
    let source = StaticSource::new().with_file("index.html", "<p>generated</p>");
    let launcher = FakeLauncher::new(source.clone()).with_timeline(timeline.clone());
    let renderer = FixedRenderer::new("package main // v1");

    let generator = RemoteMountGenerator::new(
        Arc::new(renderer.clone()),
        Arc::new(builder.clone()),
        launcher.clone(),
        Arc::new(fs.clone()),
    )
    .with_prefix("generated");

    let mut vfs = VirtualFileSystem::new(ROOT, Arc::new(fs.clone()));
    vfs.generate(ENTRY, &["pages/**".to_string()], generator).unwrap();

    Harness {
        vfs,
        fs,
        timeline,
        builder,
        launcher,
        renderer,
        source,
    }
}

#[tokio::test]
async fn first_sync_builds_launches_and_mounts() {
    let mut h = harness();
    h.vfs.sync().await.unwrap();

    assert_eq!(h.timeline.entries(), vec![format!("build {ENTRY}"), "start 1".to_string()]);
    assert_eq!(
        h.builder.calls(),
        vec![(PathBuf::from(ENTRY), PathBuf::from(".devloop/generator/generator"))]
    );
    assert_eq!(
        h.fs.contents(Path::new(ROOT).join(ENTRY)),
        Some(b"package main // v1".to_vec())
    );
    assert_eq!(
        h.fs.contents(Path::new(ROOT).join("generated/index.html")),
        Some(b"<p>generated</p>".to_vec())
    );
    assert_eq!(h.vfs.file(ENTRY).unwrap().data, b"package main // v1");

    h.vfs.close().await.unwrap();
}

#[tokio::test]
async fn previous_process_is_closed_before_the_next_starts() {
    let mut h = harness();
    h.vfs.sync().await.unwrap();

    for round in 2..=4 {
        h.renderer.set(&format!("package main // v{round}"));
        h.vfs.change(&["pages/about.md"]);
        h.vfs.sync().await.unwrap();
    }

    assert_eq!(
        h.timeline.entries(),
        vec![
            format!("build {ENTRY}"),
            "start 1".to_string(),
            format!("build {ENTRY}"),
            "close 1".to_string(),
            "start 2".to_string(),
            format!("build {ENTRY}"),
            "close 2".to_string(),
            "start 3".to_string(),
            format!("build {ENTRY}"),
            "close 3".to_string(),
            "start 4".to_string(),
        ]
    );
    assert_eq!(h.launcher.max_live(), 1);
    assert_eq!(h.renderer.renders(), 4);

    h.vfs.close().await.unwrap();
    assert_eq!(h.timeline.entries().last().map(String::as_str), Some("close 4"));
    assert_eq!(h.launcher.live(), 0);
}

#[tokio::test]
async fn unrelated_changes_do_not_relaunch() {
    let mut h = harness();
    h.vfs.sync().await.unwrap();

    h.source.insert("extra.html", "more");
    h.vfs.change(&["public/site.css"]);
    h.vfs.sync().await.unwrap();

    assert_eq!(h.launcher.launched(), 1);
    // The mount itself is re-read on every sync.
    assert_eq!(
        h.fs.contents(Path::new(ROOT).join("generated/extra.html")),
        Some(b"more".to_vec())
    );
    h.vfs.close().await.unwrap();
}

#[tokio::test]
async fn build_failure_keeps_the_running_helper() {
    let mut h = harness();
    h.vfs.sync().await.unwrap();

    h.builder.fail(true);
    h.vfs.change(&["pages/index.md"]);
    let err = h.vfs.sync().await.unwrap_err();
    assert!(matches!(err, DevloopError::Build { .. }), "got {err:?}");
    assert_eq!(h.launcher.launched(), 1);
    assert_eq!(h.launcher.live(), 1);

    h.vfs.close().await.unwrap();
    assert_eq!(h.launcher.live(), 0);
}

#[tokio::test]
async fn launch_failure_is_a_spawn_error_and_nothing_dangles() {
    let mut h = harness();
    h.vfs.sync().await.unwrap();

    h.launcher.fail(true);
    h.vfs.change(&["pages/index.md"]);
    let err = h.vfs.sync().await.unwrap_err();
    assert!(matches!(err, DevloopError::Spawn { .. }), "got {err:?}");
    assert_eq!(h.launcher.live(), 0);

    h.launcher.fail(false);
    h.vfs.sync().await.unwrap();
    assert_eq!(h.launcher.live(), 1);
    assert_eq!(h.launcher.max_live(), 1);

    h.vfs.close().await.unwrap();
    assert_eq!(h.launcher.live(), 0);
}

#[tokio::test]
async fn only_one_cleanup_is_registered() {
    let mut h = harness();
    for _ in 0..3 {
        h.vfs.change(&["pages/x.md"]);
        h.vfs.sync().await.unwrap();
    }
    h.vfs.close().await.unwrap();

    let closes = h
        .timeline
        .entries()
        .iter()
        .filter(|e| e.starts_with("close"))
        .count();
    assert_eq!(closes, 3);
}
