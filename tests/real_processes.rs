// tests/real_processes.rs
//
// End-to-end checks against real OS processes. The helpers are this test
// binary itself, re-run with a role (see `devloop_test_utils::child`).

#![cfg(unix)]

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use devloop::exec::{Builder, CommandBuilder, RealProcessBackend, Supervisor, SupervisorOptions};
use devloop::fs::mock::MockFileSystem;
use devloop::handoff::{inherited_listener, ListenerHandoff};
use devloop::remote::{serve_from_env, DirSource, MountLauncher, MountedProcess, RemoteCommand};
use devloop::vfs::{MountSource, VirtualFileSystem};
use devloop_test_utils::child::{child_role, only_test, test_binary, CHILD_ROLE_ENV};
use devloop_test_utils::{init_tracing, with_timeout};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

const APP_ROLE: &str = "app";
const MOUNT_ROLE: &str = "mount";

/// App role: answer every connection on the inherited listener with
/// `<pid> <local addr>`.
#[test]
fn app_child() {
    if child_role().as_deref() != Some(APP_ROLE) {
        return;
    }
    let listener = inherited_listener("web")
        .expect("inherited listener")
        .expect("handoff marker is set");
    let addr = listener.local_addr().expect("local addr");
    for stream in listener.incoming() {
        let mut stream = stream.expect("accept");
        let _ = writeln!(stream, "{} {}", std::process::id(), addr);
    }
}

/// Mount role: serve a small tree back to the parent.
#[tokio::test]
async fn mount_child() {
    if child_role().as_deref() != Some(MOUNT_ROLE) {
        return;
    }
    let fs = MockFileSystem::new();
    fs.add_file("/tree/index.html", "<h1>generated</h1>");
    fs.add_file("/tree/posts/first.html", "first");
    serve_from_env(&DirSource::new(Arc::new(fs), "/tree"))
        .await
        .expect("serve parent");
}

async fn ask(addr: SocketAddr) -> (u32, SocketAddr) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).await.unwrap();
    let (pid, served) = line.trim().split_once(' ').expect("pid and addr");
    (pid.parse().unwrap(), served.parse().unwrap())
}

fn app_supervisor(handoff: Arc<ListenerHandoff>, dir: &Path) -> Supervisor<RealProcessBackend> {
    let mut options = SupervisorOptions::new(dir);
    options.args = only_test("app_child");
    options.env.push((CHILD_ROLE_ENV.to_string(), APP_ROLE.to_string()));
    options.shutdown_timeout = Duration::from_secs(2);
    Supervisor::new(RealProcessBackend::new(), options).with_handoff(handoff)
}

#[cfg(target_os = "linux")]
fn fd_target(pid: &str, fd: i32) -> Option<String> {
    std::fs::read_link(format!("/proc/{pid}/fd/{fd}"))
        .ok()
        .map(|p| p.display().to_string())
}

#[tokio::test]
async fn app_processes_share_one_listener_across_a_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let handoff = Arc::new(ListenerHandoff::bind("127.0.0.1:0", 1, "web").unwrap());
    let addr = handoff.local_addr();
    let mut sup = app_supervisor(Arc::clone(&handoff), dir.path());

    let mut first = sup.start(&test_binary()).await.unwrap();
    let (pid, served) = with_timeout(ask(addr)).await;
    assert_eq!(Some(pid), first.pid());
    assert_eq!(served, addr);

    #[cfg(target_os = "linux")]
    {
        let ours = fd_target("self", handoff.handle()).expect("listener fd");
        assert!(ours.starts_with("socket:"), "{ours}");
        assert_eq!(fd_target(&pid.to_string(), handoff.handle()), Some(ours));
    }

    // Nobody accepts between close and start; the connect must still land.
    sup.close(&mut first).await.unwrap();
    let waiting = tokio::spawn(ask(addr));

    let mut second = sup.restart(first).await.unwrap();
    assert_eq!(second.generation(), 2);

    let (pid, served) = with_timeout(waiting).await.unwrap();
    assert_eq!(Some(pid), second.pid());
    assert_eq!(served, addr);

    sup.close(&mut second).await.unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn builds_do_not_inherit_the_listener() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let handoff = ListenerHandoff::bind("127.0.0.1:0", 1, "web").unwrap();
    let fd = handoff.handle();
    let ours = fd_target("self", fd).expect("listener fd");

    let builder = CommandBuilder::new(
        format!("readlink /proc/self/fd/{fd} > {{output}} 2>/dev/null; true"),
        dir.path(),
    );
    builder
        .build(Path::new("main.go"), Path::new("seen"))
        .await
        .unwrap();

    let seen = std::fs::read_to_string(dir.path().join("seen")).unwrap();
    assert_ne!(seen.trim(), ours, "build child holds the public listener");
}

#[tokio::test]
async fn remote_helper_connects_back_and_is_mounted() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let env = BTreeMap::from([(CHILD_ROLE_ENV.to_string(), MOUNT_ROLE.to_string())]);
    let mut launcher = RemoteCommand::new(dir.path())
        .with_args(only_test("mount_child"))
        .with_env(env)
        .with_connect_timeout(Duration::from_secs(4))
        .with_shutdown_timeout(Duration::from_secs(2));

    let mut helper = match with_timeout(launcher.launch(&test_binary())).await {
        Ok(helper) => helper,
        Err(e) => panic!("helper did not connect: {e}"),
    };

    let source = helper.source();
    let paths = with_timeout(source.list()).await.unwrap();
    assert_eq!(paths, vec!["index.html", "posts/first.html"]);

    let fs = MockFileSystem::new();
    let mut vfs = VirtualFileSystem::new("/site", Arc::new(fs.clone()));
    vfs.mount("gen", source);
    with_timeout(vfs.sync()).await.unwrap();
    assert_eq!(
        fs.contents("/site/gen/index.html"),
        Some(b"<h1>generated</h1>".to_vec())
    );
    assert_eq!(fs.contents("/site/gen/posts/first.html"), Some(b"first".to_vec()));

    with_timeout(helper.close()).await.unwrap();
    with_timeout(vfs.close()).await.unwrap();
}
