// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A daemon standing in for the sysfs export and unexport attributes.
//!
//! Listens on datagram sockets named `export` and `unexport` in the base
//! directory and reports the pin named by each datagram received.

use anyhow::{Context, Result};
use clap::Parser;
use daemonize::Daemonize;
use gpiosysfs::backend::{BASE_ENV, DEFAULT_BASE};
use gpiosysfs::line::Channel;
use log::{debug, error, info, warn};
use mio::net::UnixDatagram;
use mio::{Events, Interest, Poll, Token};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// The largest datagram read, anything beyond is discarded.
const MAX_DATAGRAM: usize = 1024;

fn main() -> ExitCode {
    let opts = Opts::parse();
    let filter = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gpiosysfsd",
    about = "Report the GPIO lines requested through sysfs style export and unexport sockets.",
    version
)]
struct Opts {
    /// The directory to create the sockets in.
    #[arg(short, long, value_name = "dir", env = BASE_ENV, default_value = DEFAULT_BASE)]
    base: PathBuf,

    /// The period to wait for requests before checking in, in seconds.
    #[arg(short, long, value_name = "secs", default_value_t = 30)]
    timeout: u64,

    /// Exit after the specified number of requests.
    ///
    /// If not specified then listening will continue indefinitely.
    #[arg(short, long, value_name = "num")]
    num_events: Option<u32>,

    /// Detach from the controlling terminal once the sockets are bound.
    ///
    /// The log is discarded once detached, unless a log file is provided.
    #[arg(short = 'z', long)]
    daemonize: bool,

    /// The file the log is appended to once detached.
    #[arg(short, long, value_name = "file", requires = "daemonize")]
    log_file: Option<PathBuf>,

    /// Log the internal workings of the daemon.
    #[arg(short, long)]
    verbose: bool,
}

fn run(opts: &Opts) -> Result<()> {
    let base = fs::canonicalize(&opts.base)
        .with_context(|| format!("cannot find base directory {}", opts.base.display()))?;
    let mut poll = Poll::new().context("failed to create poll")?;
    let mut listeners = Vec::new();
    for (idx, channel) in [Channel::Export, Channel::Unexport].into_iter().enumerate() {
        let mut l = Listener::bind(channel, base.join(channel.file_name()))?;
        poll.registry()
            .register(&mut l.socket, Token(idx), Interest::READABLE)
            .with_context(|| format!("failed to register {} with poll", l.path.display()))?;
        info!("Listening on {}", l.path.display());
        listeners.push(l);
    }
    if opts.daemonize {
        let mut daemon = Daemonize::new();
        if let Some(path) = &opts.log_file {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            daemon = daemon.stderr(file);
        }
        daemon.start()?;
    }

    let timeout = Duration::from_secs(opts.timeout);
    let mut events = Events::with_capacity(listeners.len());
    let mut buf = [0; MAX_DATAGRAM];
    let mut count = 0;
    loop {
        match poll.poll(&mut events, Some(timeout)) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("poll failed"),
            Ok(()) => {}
        }
        if events.is_empty() {
            debug!("no requests in the last {}s", opts.timeout);
            continue;
        }
        for event in &events {
            let l = &listeners[event.token().0];
            for pin in l.drain(&mut buf)? {
                report(l.channel, &pin);
                count += 1;
                if opts.num_events.is_some_and(|n| count >= n) {
                    return Ok(());
                }
            }
        }
    }
}

fn report(channel: Channel, pin: &str) {
    match channel {
        Channel::Export => info!("Exporting '{}'", pin),
        _ => info!("Unexporting '{}'", pin),
    }
}

/// A bound socket standing in for one of the export channels.
///
/// The socket file is removed when the listener is dropped.
struct Listener {
    channel: Channel,
    path: PathBuf,
    socket: UnixDatagram,
}

impl Listener {
    /// Bind the socket, replacing any stale socket left at the path.
    fn bind(channel: Channel, path: PathBuf) -> Result<Self> {
        remove_stale(&path)?;
        let socket = UnixDatagram::bind(&path)
            .with_context(|| format!("failed to bind {}", path.display()))?;
        Ok(Listener {
            channel,
            path,
            socket,
        })
    }

    /// Read all pending datagrams, each trimmed of surrounding whitespace.
    fn drain(&self, buf: &mut [u8]) -> Result<Vec<String>> {
        let mut requests = Vec::new();
        loop {
            match self.socket.recv(buf) {
                Ok(n) => requests.push(String::from_utf8_lossy(&buf[..n]).trim().to_string()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(requests),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to read from {}", self.path.display()))
                }
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove stale {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixDatagram as StdDatagram;

    #[test]
    fn bind_replaces_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export");
        fs::write(&path, "stale").unwrap();

        let l = Listener::bind(Channel::Export, path.clone()).unwrap();
        assert!(!path.is_file());
        drop(l);
        assert!(!path.exists());
    }

    #[test]
    fn drain_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unexport");
        let l = Listener::bind(Channel::Unexport, path.clone()).unwrap();
        let mut buf = [0; MAX_DATAGRAM];
        assert!(l.drain(&mut buf).unwrap().is_empty());

        let client = StdDatagram::unbound().unwrap();
        client.send_to(b"17\n", &path).unwrap();
        client.send_to(b" 4 ", &path).unwrap();
        client.send_to(b"", &path).unwrap();
        assert_eq!(l.drain(&mut buf).unwrap(), vec!["17", "4", ""]);
    }

    #[test]
    fn drain_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export");
        let l = Listener::bind(Channel::Export, path.clone()).unwrap();
        let mut buf = [0; 4];

        let client = StdDatagram::unbound().unwrap();
        client.send_to(b"123456", &path).unwrap();
        assert_eq!(l.drain(&mut buf).unwrap(), vec!["1234"]);
    }

    #[test]
    fn opts() {
        let opts = Opts::try_parse_from(["gpiosysfsd", "-b", "/tmp", "-t", "5", "-n", "2"]).unwrap();
        assert_eq!(opts.base, PathBuf::from("/tmp"));
        assert_eq!(opts.timeout, 5);
        assert_eq!(opts.num_events, Some(2));
        assert!(!opts.daemonize);
        assert!(opts.log_file.is_none());

        let opts =
            Opts::try_parse_from(["gpiosysfsd", "-z", "--log-file", "/tmp/gpiosysfsd.log"])
                .unwrap();
        assert!(opts.daemonize);
        assert_eq!(opts.log_file, Some(PathBuf::from("/tmp/gpiosysfsd.log")));
        // the log file only applies once detached
        assert!(Opts::try_parse_from(["gpiosysfsd", "--log-file", "/tmp/x.log"]).is_err());
    }
}
