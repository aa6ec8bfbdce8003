// tests/vfs.rs

use std::path::Path;
use std::sync::{Arc, Mutex};

use devloop::errors::{DevloopError, Result};
use devloop::fs::mock::MockFileSystem;
use devloop::types::BoxFuture;
use devloop::vfs::{cleanup, GenerateContext, Generator, Origin, VirtualFileSystem};
use devloop_test_utils::fakes::{CountingGenerator, StaticSource};

const ROOT: &str = "/site";

fn setup() -> (VirtualFileSystem, MockFileSystem) {
    let fs = MockFileSystem::new();
    let vfs = VirtualFileSystem::new(ROOT, Arc::new(fs.clone()));
    (vfs, fs)
}

fn on_disk(fs: &MockFileSystem, rel: &str) -> Option<String> {
    fs.contents(Path::new(ROOT).join(rel))
        .map(|bytes| String::from_utf8(bytes).unwrap())
}

fn globs(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn sync_writes_generated_files_in_path_order() {
    let (mut vfs, fs) = setup();
    vfs.generate("gen/b.txt", &[], CountingGenerator::new("bee")).unwrap();
    vfs.generate("gen/a.txt", &[], CountingGenerator::new("ay")).unwrap();

    vfs.sync().await.unwrap();

    assert_eq!(on_disk(&fs, "gen/a.txt").as_deref(), Some("ay"));
    assert_eq!(on_disk(&fs, "gen/b.txt").as_deref(), Some("bee"));
    assert_eq!(
        fs.writes(),
        vec![
            Path::new(ROOT).join("gen/a.txt"),
            Path::new(ROOT).join("gen/b.txt"),
        ]
    );

    let file = vfs.file("gen/a.txt").expect("cached");
    assert_eq!(file.data, b"ay");
    assert_eq!(file.origin, Origin::LocalGenerator);
    assert_eq!(vfs.files().count(), 2);
}

#[tokio::test]
async fn generators_rerun_only_when_inputs_change() {
    let (mut vfs, _fs) = setup();
    let app = CountingGenerator::new("package main");
    vfs.generate(".devloop/app/main.go", &globs(&["view/**", "app.tmpl"]), app.clone())
        .unwrap();

    vfs.sync().await.unwrap();
    vfs.sync().await.unwrap();
    assert_eq!(app.runs(), 1);

    vfs.change(&["public/site.css"]);
    vfs.sync().await.unwrap();
    assert_eq!(app.runs(), 1);

    vfs.change(&["view/index.html"]);
    assert!(vfs.file(".devloop/app/main.go").is_some());
    vfs.sync().await.unwrap();
    assert_eq!(app.runs(), 2);

    vfs.change(&["app.tmpl"]);
    vfs.sync().await.unwrap();
    assert_eq!(app.runs(), 3);
}

#[tokio::test]
async fn changing_a_generated_path_invalidates_it() {
    let (mut vfs, _fs) = setup();
    let r#gen = CountingGenerator::new("x");
    vfs.generate("out/x.txt", &[], r#gen.clone()).unwrap();
    vfs.sync().await.unwrap();

    vfs.change(&["out/x.txt"]);
    assert!(vfs.file("out/x.txt").is_none());

    vfs.sync().await.unwrap();
    assert_eq!(r#gen.runs(), 2);
    assert!(vfs.file("out/x.txt").is_some());
}

#[tokio::test]
async fn mounts_are_mirrored_and_pruned() {
    let (mut vfs, fs) = setup();
    let source = StaticSource::new()
        .with_file("index.html", "<h1>hi</h1>")
        .with_file("css/site.css", "body{}");
    vfs.mount("generated", Arc::new(source.clone()));

    vfs.sync().await.unwrap();
    assert_eq!(on_disk(&fs, "generated/index.html").as_deref(), Some("<h1>hi</h1>"));
    assert_eq!(on_disk(&fs, "generated/css/site.css").as_deref(), Some("body{}"));
    assert_eq!(
        vfs.file("generated/index.html").unwrap().origin,
        Origin::RemoteSubtree {
            prefix: "generated".to_string()
        }
    );

    source.remove("css/site.css");
    source.insert("index.html", "<h1>bye</h1>");
    vfs.sync().await.unwrap();

    assert_eq!(on_disk(&fs, "generated/index.html").as_deref(), Some("<h1>bye</h1>"));
    assert_eq!(on_disk(&fs, "generated/css/site.css"), None);
    assert!(vfs.file("generated/css/site.css").is_none());
}

#[tokio::test]
async fn remounting_a_prefix_replaces_the_source() {
    let (mut vfs, fs) = setup();
    vfs.mount("gen", Arc::new(StaticSource::new().with_file("old.txt", "old")));
    vfs.sync().await.unwrap();

    vfs.mount("gen/", Arc::new(StaticSource::new().with_file("new.txt", "new")));
    vfs.sync().await.unwrap();

    assert_eq!(on_disk(&fs, "gen/new.txt").as_deref(), Some("new"));
    assert_eq!(on_disk(&fs, "gen/old.txt"), None);
}

#[tokio::test]
async fn mount_failures_name_the_prefix() {
    let (mut vfs, _fs) = setup();
    let source = StaticSource::new();
    source.fail(true);
    vfs.mount("generated", Arc::new(source));

    match vfs.sync().await {
        Err(DevloopError::Generation { path, .. }) => assert_eq!(path, "generated"),
        other => panic!("expected generation error, got {other:?}"),
    }
}

#[tokio::test]
async fn listed_paths_cannot_leave_the_mount() {
    for bad in ["../../../etc/owned", "/etc/owned", "ok/../../escape", "", "."] {
        let (mut vfs, fs) = setup();
        let source = StaticSource::new()
            .with_file("index.html", "<h1>hi</h1>")
            .with_file(bad, "x");
        vfs.mount("gen", Arc::new(source));

        match vfs.sync().await {
            Err(DevloopError::Generation { path, message }) => {
                assert_eq!(path, "gen");
                assert!(message.contains("outside the mount"), "{message}");
            }
            other => panic!("{bad:?}: expected generation error, got {other:?}"),
        }
        assert!(fs.writes().is_empty(), "{bad:?}: wrote {:?}", fs.writes());
        assert!(fs.contents("/etc/owned").is_none());
        assert!(vfs.file("gen/index.html").is_none());
    }
}

#[tokio::test]
async fn generator_errors_are_returned_as_is() {
    let (mut vfs, fs) = setup();
    let r#gen = CountingGenerator::new("x");
    r#gen.fail(true);
    vfs.generate("out/x.txt", &[], r#gen.clone()).unwrap();

    let err = vfs.sync().await.unwrap_err();
    assert!(matches!(err, DevloopError::Generation { ref path, .. } if path == "out/x.txt"));
    assert!(fs.writes().is_empty());

    // Still stale, so the next sync retries it.
    r#gen.fail(false);
    vfs.sync().await.unwrap();
    assert_eq!(r#gen.runs(), 2);
}

/// Registers a mount and a cleanup, then fails.
struct HalfDone {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Generator for HalfDone {
    fn generate<'a>(&'a mut self, cx: &'a mut GenerateContext) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            cx.mount("half", Arc::new(StaticSource::new().with_file("a", "a")));
            let log = Arc::clone(&self.log);
            cx.defer(cleanup(move || async move {
                log.lock().unwrap().push("half cleanup");
                Ok(())
            }));
            Err(DevloopError::Build {
                entry: cx.path().to_string(),
                message: "undefined: x".to_string(),
            })
        })
    }
}

#[tokio::test]
async fn cleanups_registered_by_a_failing_generator_are_kept() {
    let (mut vfs, _fs) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));
    vfs.generate("half.go", &[], HalfDone { log: Arc::clone(&log) }).unwrap();

    let err = vfs.sync().await.unwrap_err();
    assert!(matches!(err, DevloopError::Build { .. }), "got {err:?}");

    vfs.close().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["half cleanup"]);
}

#[tokio::test]
async fn close_runs_every_cleanup_once_in_order() {
    let (mut vfs, _fs) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));

    for (name, fail) in [("first", false), ("second", true), ("third", true), ("fourth", false)] {
        let log = Arc::clone(&log);
        vfs.defer(cleanup(move || async move {
            log.lock().unwrap().push(name);
            if fail {
                Err(DevloopError::Lifecycle(format!("{name} failed")))
            } else {
                Ok(())
            }
        }));
    }

    let err = vfs.close().await.unwrap_err();
    assert_eq!(err.to_string(), "process lifecycle error: second failed");
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third", "fourth"]);
    assert!(vfs.is_closed());

    vfs.close().await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn closing_cancels_the_generator_token() {
    struct KeepToken(Arc<Mutex<Option<tokio_util::sync::CancellationToken>>>);

    impl Generator for KeepToken {
        fn generate<'a>(&'a mut self, cx: &'a mut GenerateContext) -> BoxFuture<'a, Result<Vec<u8>>> {
            *self.0.lock().unwrap() = Some(cx.token().clone());
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    let (mut vfs, _fs) = setup();
    let slot = Arc::new(Mutex::new(None));
    vfs.generate("t", &[], KeepToken(Arc::clone(&slot))).unwrap();
    vfs.sync().await.unwrap();

    let token = slot.lock().unwrap().clone().unwrap();
    assert!(!token.is_cancelled());
    vfs.close().await.unwrap();
    assert!(token.is_cancelled());
}
