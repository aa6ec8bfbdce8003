// tests/build.rs

use std::path::Path;

use devloop::errors::DevloopError;
use devloop::exec::{Builder, CommandBuilder};
use devloop_test_utils::init_tracing;

#[test]
fn command_line_substitutes_and_quotes_paths() {
    let builder = CommandBuilder::new("go build -o {output} {entry}", "/project");

    assert_eq!(
        builder.command_line(Path::new(".devloop/app/main.go"), Path::new(".devloop/app/app")),
        "go build -o .devloop/app/app .devloop/app/main.go"
    );

    #[cfg(unix)]
    assert_eq!(
        builder.command_line(Path::new("my app/main.go"), Path::new("out")),
        "go build -o out 'my app/main.go'"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn successful_command_creates_the_output_directory() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.txt"), "binary").unwrap();

    let builder = CommandBuilder::new("cp {entry} {output}", dir.path());
    builder
        .build(Path::new("main.txt"), Path::new("out/bin/app"))
        .await
        .unwrap();

    let built = std::fs::read_to_string(dir.path().join("out/bin/app")).unwrap();
    assert_eq!(built, "binary");
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_reports_stderr() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let builder = CommandBuilder::new("echo 'main.go:3: syntax error' >&2; exit 2", dir.path());
    let err = builder
        .build(Path::new("main.go"), Path::new("app"))
        .await
        .unwrap_err();

    match err {
        DevloopError::Build { entry, message } => {
            assert_eq!(entry, "main.go");
            assert_eq!(message, "main.go:3: syntax error");
        }
        other => panic!("expected a build error, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn silent_failure_names_the_exit_code() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let builder = CommandBuilder::new("exit 3", dir.path());
    let err = builder
        .build(Path::new("main.go"), Path::new("app"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("exited with 3"), "{err}");
}

#[cfg(unix)]
#[tokio::test]
async fn configured_env_reaches_the_command() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let env = [("GOFLAGS".to_string(), "-mod=vendor".to_string())]
        .into_iter()
        .collect();
    let builder = CommandBuilder::new("printf %s \"$GOFLAGS\" > {output}", dir.path()).with_env(env);
    builder
        .build(Path::new("main.go"), Path::new("flags"))
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(dir.path().join("flags")).unwrap(), "-mod=vendor");
}
