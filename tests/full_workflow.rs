use std::{
    cell::RefCell,
    fs::{self, File},
    io::{self, Write},
    path::Path,
    process::Command,
};

use anyhow::Result;
use bundle_launcher::{
    config::BootstrapConfig,
    pipeline::run,
    run::{LaunchPlan, ProcessSpawner, Spawner},
};
use httpmock::prelude::*;
use temp_dir::TempDir;
use tokio::process::Child;
use zip::{ZipWriter, write::SimpleFileOptions};

const BOOT_SCRIPT: &str = "pwd > cwd.txt\nprintf %s \"$NODE_ENV\" > env.txt\n";

/// Spawns for real, but remembers what it was asked to start.
#[derive(Default)]
struct RecordingSpawner {
    plans: RefCell<Vec<LaunchPlan>>,
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, plan: &LaunchPlan) -> io::Result<Child> {
        self.plans.borrow_mut().push(plan.clone());
        ProcessSpawner.spawn(plan)
    }
}

fn bundle_zip(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
    let source = TempDir::new().unwrap();
    let path = source.path().join("app-main.zip");
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default();

    for (name, contents) in entries {
        if let Some(contents) = contents {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        } else {
            zip.add_directory(*name, options).unwrap();
        }
    }

    zip.finish().unwrap();
    fs::read(path).unwrap()
}

fn launcher() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bundle-launcher"))
}

#[tokio::test]
async fn full_workflow_test() -> Result<()> {
    let workdir = TempDir::new()?;
    let server = MockServer::start_async().await;
    let body = bundle_zip(&[
        ("app-main/", None),
        ("app-main/index.sh", Some(BOOT_SCRIPT)),
        ("app-main/plugins/", None),
        ("app-main/plugins/hello.sh", Some("echo hello")),
    ]);
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/owner/app/archive/main.zip");
            then.status(200).body(body);
        })
        .await;

    let mut config = BootstrapConfig::new(
        &server.url("/owner/app/archive/main.zip"),
        workdir.path().join("staging"),
    );
    config.local_settings = workdir.path().join("settings.js");
    config.runner = "sh".to_owned();
    config.entry = "index.sh".to_owned();

    let spawner = RecordingSpawner::default();
    let status = run(&config, &spawner).await?;

    mock.assert_async().await;
    assert!(status.is_some_and(|status| status.success()));

    let extract_dir = workdir.path().join("staging/app-main");
    assert_eq!(config.extract_dir(), extract_dir);
    assert_eq!(spawner.plans.borrow().len(), 1);
    assert_eq!(spawner.plans.borrow()[0].current_dir, extract_dir);

    let cwd = fs::read_to_string(extract_dir.join("cwd.txt"))?;
    assert_eq!(
        fs::canonicalize(cwd.trim())?,
        fs::canonicalize(&extract_dir)?
    );
    assert_eq!(fs::read_to_string(extract_dir.join("env.txt"))?, "production");

    assert!(extract_dir.join("plugins/hello.sh").exists());
    assert!(!extract_dir.join("settings.js").exists());
    assert!(!config.archive_path().exists());

    Ok(())
}

#[tokio::test]
async fn rerun_replaces_previous_bundle() -> Result<()> {
    let workdir = TempDir::new()?;
    let server = MockServer::start_async().await;
    let body = bundle_zip(&[("app/index.sh", Some("exit 0"))]);
    server
        .mock_async(|when, then| {
            when.path("/app.zip");
            then.status(200).body(body);
        })
        .await;

    let mut config = BootstrapConfig::new(&server.url("/app.zip"), workdir.path().join("staging"));
    config.local_settings = workdir.path().join("settings.js");
    config.runner = "sh".to_owned();
    config.entry = "index.sh".to_owned();

    let leftover = config.extract_dir().join("leftover.txt");
    fs::create_dir_all(config.extract_dir())?;
    fs::write(&leftover, "from a previous run")?;

    run(&config, &ProcessSpawner).await?;

    assert!(!leftover.exists());
    assert!(config.entry_point().exists());

    Ok(())
}

fn run_launcher(server: &MockServer, workdir: &Path, extra_args: &[&str]) -> std::process::Output {
    launcher()
        .arg("--url")
        .arg(server.url("/app.zip"))
        .arg("--staging-dir")
        .arg(workdir.join("staging"))
        .arg("--settings")
        .arg(workdir.join("settings.js"))
        .args(["--runner", "sh", "--entry", "index.sh"])
        .args(extra_args)
        .env_remove("BUNDLE_DIR")
        .env_remove("CLICOLOR_FORCE")
        .output()
        .unwrap()
}

#[test]
fn success_logs_each_stage_in_order() {
    let workdir = TempDir::new().unwrap();
    let server = MockServer::start();
    let body = bundle_zip(&[
        ("app/index.sh", Some("exit 0")),
        ("app/plugins/", None),
    ]);
    server.mock(|when, then| {
        when.path("/app.zip");
        then.status(200).body(body);
    });

    let output = run_launcher(&server, workdir.path(), &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0));
    let positions: Vec<usize> = [
        "Download complete.",
        "Plugins folder found.",
        "No local settings",
        "Starting",
    ]
    .iter()
    .map(|line| {
        stdout
            .find(line)
            .unwrap_or_else(|| panic!("{line:?} missing from:\n{stdout}"))
    })
    .collect();
    assert!(positions.is_sorted(), "out of order:\n{stdout}");
}

#[test]
fn entry_outside_bundle_is_rejected() {
    let workdir = TempDir::new().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path("/app.zip");
        then.status(200);
    });

    let output = run_launcher(&server, workdir.path(), &["--entry", "../index.sh"]);

    assert_eq!(output.status.code(), Some(1));
    mock.assert_hits(0);
}

#[test]
fn http_error_exits_with_failure() {
    let workdir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/app.zip");
        then.status(500);
    });

    let output = run_launcher(&server, workdir.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[FATAL]"));
    assert!(!workdir.path().join("staging/app").exists());
    assert!(!workdir.path().join("staging/repo.zip").exists());
}

#[test]
fn missing_entry_point_exits_with_failure() {
    let workdir = TempDir::new().unwrap();
    let server = MockServer::start();
    let body = bundle_zip(&[("app/", None), ("app/README.md", Some("no entry point"))]);
    server.mock(|when, then| {
        when.path("/app.zip");
        then.status(200).body(body);
    });

    let output = run_launcher(&server, workdir.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!workdir.path().join("staging/repo.zip").exists());
}

#[test]
fn child_exit_code_is_only_forwarded_on_request() {
    let workdir = TempDir::new().unwrap();
    let server = MockServer::start();
    let body = bundle_zip(&[("app/index.sh", Some("exit 7"))]);
    server.mock(|when, then| {
        when.path("/app.zip");
        then.status(200).body(body);
    });

    let output = run_launcher(&server, workdir.path(), &[]);
    assert_eq!(output.status.code(), Some(0));

    let output = run_launcher(&server, workdir.path(), &["--propagate-exit-code"]);
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn local_settings_reach_the_bundle() {
    let workdir = TempDir::new().unwrap();
    let server = MockServer::start();
    let body = bundle_zip(&[("app/index.sh", Some("cp config/settings.js seen.js"))]);
    server.mock(|when, then| {
        when.path("/app.zip");
        then.status(200).body(body);
    });
    fs::write(workdir.path().join("settings.js"), "module.exports = { port: 8080 }").unwrap();

    let output = run_launcher(
        &server,
        workdir.path(),
        &["--settings-dest", "config/settings.js", "--propagate-exit-code"],
    );

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        fs::read_to_string(workdir.path().join("staging/app/seen.js")).unwrap(),
        "module.exports = { port: 8080 }"
    );
}
