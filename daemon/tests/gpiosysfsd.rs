// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::io::Read;
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn spawn(base: &Path, args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_gpiosysfsd"))
        .arg("--base")
        .arg(base)
        .args(args)
        .env("RUST_LOG", "info")
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

fn wait_for<F: FnMut() -> bool>(mut f: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

// Collect stderr once the daemon exits, or kill it if it doesn't.
fn output(mut child: Child) -> String {
    let exited = wait_for(|| matches!(child.try_wait(), Ok(Some(_))));
    if !exited {
        _ = child.kill();
        _ = child.wait();
    }
    let mut stderr = String::new();
    child
        .stderr
        .take()
        .unwrap()
        .read_to_string(&mut stderr)
        .unwrap();
    assert!(exited, "daemon did not exit: {}", stderr);
    stderr
}

#[test]
fn reports_requests() {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("export");
    let unexport = dir.path().join("unexport");
    // left over from an earlier run
    std::fs::write(&export, "").unwrap();

    let child = spawn(dir.path(), &["--num-events", "2", "--timeout", "1"]);
    assert!(wait_for(|| !export.is_file() && export.exists() && unexport.exists()));

    let client = UnixDatagram::unbound().unwrap();
    client.send_to(b"4\n", &export).unwrap();
    client.send_to(b"4\n", &unexport).unwrap();

    let stderr = output(child);
    assert!(stderr.contains("Exporting '4'"), "{}", stderr);
    assert!(stderr.contains("Unexporting '4'"), "{}", stderr);
    // sockets are removed on exit
    assert!(!export.exists());
    assert!(!unexport.exists());
}

#[test]
fn missing_base() {
    let dir = tempfile::tempdir().unwrap();
    let child = spawn(&dir.path().join("missing"), &[]);

    let stderr = output(child);
    assert!(stderr.contains("cannot find base directory"), "{}", stderr);
}

#[test]
fn detached_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("export");
    let unexport = dir.path().join("unexport");
    let log = dir.path().join("gpiosysfsd.log");

    let mut child = spawn(
        dir.path(),
        &["-z", "--log-file", log.to_str().unwrap(), "--num-events", "1"],
    );
    // the parent exits once the daemon has detached
    assert!(child.wait().unwrap().success());
    assert!(wait_for(|| export.exists() && unexport.exists()));

    let client = UnixDatagram::unbound().unwrap();
    client.send_to(b"9\n", &export).unwrap();

    // the daemon exits after the request, removing its sockets
    assert!(wait_for(|| !export.exists()));
    let logged = std::fs::read_to_string(&log).unwrap();
    assert!(logged.contains("Exporting '9'"), "{}", logged);
}
