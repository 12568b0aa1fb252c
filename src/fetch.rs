//! Fetching catalog and document resources over HTTP or from disk
//!
//! Every network call goes through one `ureq` agent with an overall timeout,
//! so a stalled server turns into a `FetchError::Transport` instead of a hang.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use tempfile::NamedTempFile;

const USER_AGENT: &str = concat!("arsip/", env!("CARGO_PKG_VERSION"));

/// Where a resource lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Remote(String),
    Local(PathBuf),
}

impl Location {
    /// Interpret a catalog or asset string. URLs stay remote, `file://` and
    /// plain paths become local; relative paths resolve against `root`.
    pub fn parse(raw: &str, root: &Path) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Location::Remote(raw.to_string());
        }

        let path = Path::new(raw.strip_prefix("file://").unwrap_or(raw));
        if path.is_absolute() {
            Location::Local(path.to_path_buf())
        } else {
            Location::Local(root.join(path.strip_prefix("./").unwrap_or(path)))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Location::Remote(url) => url.clone(),
            Location::Local(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A document available on the local filesystem, either in place or as a
/// downloaded temporary copy that is removed on drop
#[derive(Debug)]
pub enum LocalCopy {
    InPlace(PathBuf),
    Downloaded(NamedTempFile),
}

impl LocalCopy {
    pub fn path(&self) -> &Path {
        match self {
            LocalCopy::InPlace(path) => path,
            LocalCopy::Downloaded(file) => file.path(),
        }
    }
}

/// Blocking fetcher with a bounded timeout
#[derive(Clone)]
pub struct Fetcher {
    agent: ureq::Agent,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }

    pub fn read_to_string(&self, location: &Location) -> Result<String, FetchError> {
        match location {
            Location::Remote(url) => {
                debug!("GET {url}");
                self.get(url)?
                    .into_string()
                    .map_err(|e| FetchError::Transport {
                        url: url.clone(),
                        detail: e.to_string(),
                    })
            }
            Location::Local(path) => fs::read_to_string(path).map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            }),
        }
    }

    pub fn read_bytes(&self, location: &Location) -> Result<Vec<u8>, FetchError> {
        match location {
            Location::Remote(url) => {
                debug!("GET {url}");
                let mut body = Vec::new();
                self.get(url)?
                    .into_reader()
                    .read_to_end(&mut body)
                    .map_err(|e| FetchError::Transport {
                        url: url.clone(),
                        detail: e.to_string(),
                    })?;
                Ok(body)
            }
            Location::Local(path) => fs::read(path).map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            }),
        }
    }

    /// Make a document readable from disk, downloading it if remote
    pub fn materialize(&self, location: &Location) -> Result<LocalCopy, FetchError> {
        match location {
            Location::Local(path) => {
                if path.is_file() {
                    Ok(LocalCopy::InPlace(path.clone()))
                } else {
                    Err(FetchError::Io {
                        path: path.clone(),
                        source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
                    })
                }
            }
            Location::Remote(url) => {
                debug!("Downloading {url}");
                let response = self.get(url)?;
                let mut file = NamedTempFile::new().map_err(|source| FetchError::Io {
                    path: std::env::temp_dir(),
                    source,
                })?;
                let mut reader = response.into_reader();
                io::copy(&mut reader, file.as_file_mut()).map_err(|e| FetchError::Transport {
                    url: url.clone(),
                    detail: e.to_string(),
                })?;
                Ok(LocalCopy::Downloaded(file))
            }
        }
    }

    fn get(&self, url: &str) -> Result<ureq::Response, FetchError> {
        match self.agent.get(url).call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, _)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport {
                url: url.to_string(),
                detail: transport.to_string(),
            }),
        }
    }
}

/// Write `contents` to `path`, creating parent directories
pub fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    io::Write::write_all(&mut file, contents.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    /// Accepts one connection and never answers it
    fn stalled_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((_stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(10));
            }
        });
        format!("http://{addr}/publications.json")
    }

    /// Answers one request with `body`
    fn one_shot_server(body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = io::Write::write_all(&mut stream, head.as_bytes());
                let _ = io::Write::write_all(&mut stream, body);
            }
        });
        format!("http://{addr}/page.jpg")
    }

    #[test]
    fn stalled_server_times_out_as_transport_error() {
        let url = stalled_server();
        let fetcher = Fetcher::new(Duration::from_secs(1));

        let started = Instant::now();
        let result = fetcher.read_to_string(&Location::Remote(url.clone()));
        let elapsed = started.elapsed();

        match result {
            Err(FetchError::Transport { url: failed, .. }) => assert_eq!(failed, url),
            other => panic!("expected a transport error, got {other:?}"),
        }
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    #[test]
    fn remote_bytes_are_read_whole() {
        let url = one_shot_server(b"\xff\xd8abc");
        let fetcher = Fetcher::new(Duration::from_secs(5));
        let body = fetcher.read_bytes(&Location::Remote(url)).unwrap();
        assert_eq!(body, b"\xff\xd8abc");
    }

    #[test]
    fn parse_keeps_urls_remote() {
        let loc = Location::parse("https://cdn.example.org/a.pdf", Path::new("/srv"));
        assert_eq!(loc, Location::Remote("https://cdn.example.org/a.pdf".into()));
    }

    #[test]
    fn parse_resolves_relative_paths_against_root() {
        let loc = Location::parse("./pdfs/a.pdf", Path::new("/srv/site"));
        assert_eq!(loc, Location::Local(PathBuf::from("/srv/site/pdfs/a.pdf")));
    }

    #[test]
    fn parse_strips_file_scheme() {
        let loc = Location::parse("file:///tmp/a.pdf", Path::new("/srv"));
        assert_eq!(loc, Location::Local(PathBuf::from("/tmp/a.pdf")));
    }

    #[test]
    fn read_local_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, "[]").unwrap();

        let fetcher = Fetcher::new(Duration::from_secs(1));
        let body = fetcher.read_to_string(&Location::Local(path)).unwrap();
        assert_eq!(body, "[]");
    }

    #[test]
    fn missing_local_document_is_an_io_error() {
        let fetcher = Fetcher::new(Duration::from_secs(1));
        let result = fetcher.materialize(&Location::Local(PathBuf::from("/nonexistent/x.pdf")));
        assert!(matches!(result, Err(FetchError::Io { .. })));
    }

    #[test]
    fn write_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("publications.json");
        write_file(&path, "[]").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "[]");
    }
}
