//! Shared helpers for the integration tests

use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Local readiness endpoint answering every request with a settable status.
pub struct ReadyServer {
    port: u16,
    status: Arc<AtomicU16>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ReadyServer {
    pub fn start(initial_status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
        listener
            .set_nonblocking(true)
            .expect("Failed to set listener non-blocking");
        let port = listener.local_addr().unwrap().port();
        let status = Arc::new(AtomicU16::new(initial_status));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let status = Arc::clone(&status);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((stream, _)) => {
                            stream.set_nonblocking(false).ok();
                            let mut reader = BufReader::new(stream.try_clone().unwrap());
                            let mut line = String::new();
                            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                                if line == "\r\n" {
                                    break;
                                }
                                line.clear();
                            }
                            let code = status.load(Ordering::SeqCst);
                            let mut stream = stream;
                            let _ = write!(
                                stream,
                                "HTTP/1.1 {code} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            );
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        Self {
            port,
            status,
            stop,
            worker: Some(worker),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_status(&self, code: u16) {
        self.status.store(code, Ordering::SeqCst);
    }
}

impl Drop for ReadyServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Write a config directory: `main.toml` plus one file per camera.
pub fn write_config(dir: &Path, main: &str, cameras: &[(&str, &str)]) {
    fs::create_dir_all(dir).expect("Failed to create config dir");
    fs::write(dir.join("main.toml"), main).expect("Failed to write main.toml");
    for (file, content) in cameras {
        fs::write(dir.join(file), content).expect("Failed to write camera config");
    }
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// TOML string literal for a path
pub fn toml_path(path: &Path) -> String {
    format!("{:?}", path.display().to_string())
}
