//! FTP source
//!
//! One control session is opened on first use (normally the startup
//! `probe`) and kept for the life of the process. A dropped session is not
//! re-established; every later operation fails until restart.

use std::str::FromStr;

use async_trait::async_trait;
use suppaftp::list::File;
use suppaftp::types::FileType;
use suppaftp::AsyncFtpStream;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::compat::FuturesAsyncReadCompatExt;

use super::error::StoreError;
use super::traits::{SourceEntry, SourceStore};

const DEFAULT_PORT: u16 = 21;

pub struct FtpStore {
    address: String,
    username: String,
    password: String,
    session: Mutex<Option<AsyncFtpStream>>,
    name: String,
}

/// `host` or `host:port`; the port defaults to 21
fn with_port(hostname: &str) -> String {
    if hostname.contains(':') {
        hostname.to_string()
    } else {
        format!("{hostname}:{DEFAULT_PORT}")
    }
}

/// Parse `LIST` output, skipping lines no known format matches (e.g. `total 8`)
fn parse_listing(lines: &[String]) -> Vec<SourceEntry> {
    let mut entries = Vec::new();
    for line in lines {
        match File::from_str(line) {
            Ok(file) if file.name() == "." || file.name() == ".." => {}
            Ok(file) => entries.push(SourceEntry {
                name: file.name().to_string(),
                is_directory: file.is_directory(),
            }),
            Err(_) => log::debug!("skipping listing line {line:?}"),
        }
    }
    entries
}

impl FtpStore {
    pub fn new(hostname: &str, username: &str, password: &str) -> Self {
        let address = with_port(hostname);
        Self {
            name: format!("ftp:{address}"),
            address,
            username: username.to_string(),
            password: password.to_string(),
            session: Mutex::new(None),
        }
    }

    async fn login(&self) -> Result<AsyncFtpStream, StoreError> {
        let mut ftp = AsyncFtpStream::connect(self.address.as_str()).await?;
        ftp.login(&self.username, &self.password).await?;
        ftp.transfer_type(FileType::Binary).await?;
        log::info!("Logged in to {} as {}", self.address, self.username);
        Ok(ftp)
    }

    /// The shared session, logging in if this is the first use
    async fn session(&self) -> Result<MutexGuard<'_, Option<AsyncFtpStream>>, StoreError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.login().await?);
        }
        Ok(guard)
    }
}

fn connected<'a>(
    guard: &'a mut MutexGuard<'_, Option<AsyncFtpStream>>,
) -> Result<&'a mut AsyncFtpStream, StoreError> {
    guard
        .as_mut()
        .ok_or_else(|| StoreError::Other("ftp session not established".to_string()))
}

#[async_trait]
impl SourceStore for FtpStore {
    async fn list_root(&self) -> Result<Vec<SourceEntry>, StoreError> {
        let mut guard = self.session().await?;
        let lines = connected(&mut guard)?.list(Some("/")).await?;
        Ok(parse_listing(&lines))
    }

    async fn retrieve_into(
        &self,
        name: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), StoreError> {
        let mut guard = self.session().await?;
        let ftp = connected(&mut guard)?;

        let mut data = ftp.retr_as_stream(name).await?.compat();
        let copied = tokio::io::copy(&mut data, writer).await?;
        ftp.finalize_retr_stream(data.into_inner()).await?;
        writer.flush().await?;

        log::debug!("RETR {name} ({copied} bytes)");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut guard = self.session().await?;
        connected(&mut guard)?.rm(name).await?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), StoreError> {
        self.session().await.map(|_| ())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex as StdMutex};

    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    const LISTING: &[&str] = &[
        "total 2",
        "drwxr-xr-x 1 ftp ftp 0 Jan 01 00:00 archive",
        "-rw-r--r-- 1 ftp ftp 1000 Jan 01 00:00 a.jpg",
    ];

    /// Single-session FTP server answering from a fixed listing and file set
    async fn serve(files: HashMap<String, Vec<u8>>) -> (String, Arc<StdMutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let commands = Arc::new(StdMutex::new(Vec::new()));

        let log = commands.clone();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut control) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut passive: Option<TcpListener> = None;

            control.write_all(b"220 ready\r\n").await.unwrap();
            while let Some(line) = lines.next_line().await.unwrap() {
                log.lock().unwrap().push(line.clone());
                let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));

                let payload = match verb {
                    "LIST" => Some(format!("{}\r\n", LISTING.join("\r\n")).into_bytes()),
                    "RETR" => files.get(arg).cloned(),
                    _ => None,
                };
                let reply = match verb {
                    "USER" => "331 password required".to_string(),
                    "PASS" if arg == "secret" => "230 logged in".to_string(),
                    "PASS" => "530 login incorrect".to_string(),
                    "TYPE" => "200 type set".to_string(),
                    "PASV" => {
                        let data = TcpListener::bind("127.0.0.1:0").await.unwrap();
                        let port = data.local_addr().unwrap().port();
                        passive = Some(data);
                        format!("227 Entering Passive Mode (127,0,0,1,{},{})", port >> 8, port & 0xff)
                    }
                    "LIST" | "RETR" => match (payload, passive.take()) {
                        (Some(payload), Some(data)) => {
                            control.write_all(b"150 opening data connection\r\n").await.unwrap();
                            let (mut stream, _) = data.accept().await.unwrap();
                            stream.write_all(&payload).await.unwrap();
                            stream.shutdown().await.unwrap();
                            drop(stream);
                            "226 transfer complete".to_string()
                        }
                        _ => "550 no such file".to_string(),
                    },
                    "DELE" => "250 deleted".to_string(),
                    "QUIT" => "221 bye".to_string(),
                    _ => "502 not implemented".to_string(),
                };
                control.write_all(format!("{reply}\r\n").as_bytes()).await.unwrap();
            }
        });

        (address, commands)
    }

    #[test]
    fn test_default_port() {
        assert_eq!(with_port("ftp.example.com"), "ftp.example.com:21");
        assert_eq!(with_port("ftp.example.com:2121"), "ftp.example.com:2121");
        assert_eq!(FtpStore::new("camera", "me", "pw").name(), "ftp:camera:21");
    }

    #[test]
    fn test_parse_listing_marks_directories() {
        let lines: Vec<String> = LISTING.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            parse_listing(&lines),
            vec![SourceEntry::directory("archive"), SourceEntry::file("a.jpg")]
        );
    }

    #[tokio::test]
    async fn test_list_retrieve_delete_over_one_session() {
        let files = HashMap::from([("a.jpg".to_string(), vec![0xAB; 1000])]);
        let (address, commands) = serve(files).await;
        let store = FtpStore::new(&address, "me", "secret");

        store.probe().await.unwrap();
        let entries = store.list_root().await.unwrap();
        let mut content = Vec::new();
        store.retrieve_into("a.jpg", &mut content).await.unwrap();
        store.delete("a.jpg").await.unwrap();

        assert_eq!(
            entries,
            vec![SourceEntry::directory("archive"), SourceEntry::file("a.jpg")]
        );
        assert_eq!(content, vec![0xAB; 1000]);

        let commands = commands.lock().unwrap();
        assert_eq!(commands.iter().filter(|c| c.starts_with("USER")).count(), 1);
        for expected in ["PASS secret", "TYPE I", "LIST /", "RETR a.jpg", "DELE a.jpg"] {
            assert!(commands.iter().any(|c| c == expected), "{expected} not sent");
        }
    }

    #[tokio::test]
    async fn test_rejected_login_fails_probe() {
        let (address, _) = serve(HashMap::new()).await;
        let store = FtpStore::new(&address, "me", "wrong");

        assert!(matches!(store.probe().await, Err(StoreError::Ftp(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let (address, _) = serve(HashMap::new()).await;
        let store = FtpStore::new(&address, "me", "secret");

        let mut content = Vec::new();
        assert!(store.retrieve_into("gone.jpg", &mut content).await.is_err());
        assert!(content.is_empty());
    }
}
