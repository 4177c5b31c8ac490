//! In-process FTP server used by the tests.
//!
//! It keeps an in-memory filesystem and speaks just enough of RFC 959 for the harness:
//! USER, PASS, TYPE, NOOP, PWD, MKD, CWD, CDUP, DELE, RMD, PASV, PORT, REST, STOR, RETR, NLST, QUIT.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::config::HarnessConfig;

/// How the server treats the password step
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicy {
    /// Reply 331 to USER and accept only a literal empty password
    #[default]
    EmptyOnly,
    /// Reply 331 to USER and accept any password
    Any,
    /// Reply 230 straight to USER
    NotRequired,
}

#[derive(Debug, Default, Clone)]
pub struct ServerOptions {
    pub password: PasswordPolicy,
    /// Amount of USER commands answered with 421 before logins are accepted
    pub reject_logins: usize,
    /// Flip the first byte of every retrieved file
    pub corrupt_retr: bool,
    /// Accept REST but always send files from the start
    pub ignore_rest: bool,
    /// Answer NLST with 550
    pub refuse_nlst: bool,
    /// Directories existing at startup, relative to `/`
    pub directories: Vec<&'static str>,
    /// Reply 550 to DELE
    pub refuse_dele: bool,
    /// Reply 550 to CWD
    pub refuse_cwd: bool,
    /// Open the data connection for STOR, then reply 550
    pub refuse_stor: bool,
    /// Reply 530 to USER and never answer QUIT, keeping the connection open
    pub stall_after_denial: bool,
}

/// A data transfer the server went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub command: String,
    pub passive: bool,
}

#[derive(Debug, Default)]
struct Filesystem {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    logins: usize,
    passwords: Vec<String>,
    transfers: Vec<Transfer>,
}

pub struct TestServer {
    port: u16,
    state: Arc<Mutex<Filesystem>>,
}

impl TestServer {
    pub fn start(options: ServerOptions) -> Self {
        let listener =
            TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("failed to bind test server");
        let port = listener
            .local_addr()
            .expect("failed to get test server address")
            .port();
        let mut fs = Filesystem::default();
        fs.dirs.insert("/".to_string());
        for dir in options.directories.iter() {
            fs.dirs.insert(format!("/{dir}"));
        }
        let state = Arc::new(Mutex::new(fs));
        let options = Arc::new(options);
        let server_state = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(err) => {
                        error!("test server failed to accept client: {err}");
                        break;
                    }
                };
                let client = ClientSession::new(stream, server_state.clone(), options.clone());
                thread::spawn(move || {
                    if let Err(err) = client.and_then(ClientSession::run) {
                        debug!("test server client terminated: {err}");
                    }
                });
            }
        });
        info!("test server listening on 127.0.0.1:{port}");

        Self { port, state }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Harness configuration pointing at this server, with short delays
    pub fn config(&self) -> HarnessConfig {
        HarnessConfig::default()
            .port(self.port)
            .retry_delay(Duration::from_millis(10))
            .connect_timeout(Duration::from_secs(2))
            .active_timeout(Duration::from_secs(5))
    }

    pub fn files(&self) -> Vec<String> {
        self.fs().files.keys().cloned().collect()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs().files.get(path).cloned()
    }

    /// Directories besides the root
    pub fn directories(&self) -> Vec<String> {
        self.fs().dirs.iter().filter(|x| *x != "/").cloned().collect()
    }

    pub fn logins(&self) -> usize {
        self.fs().logins
    }

    pub fn passwords(&self) -> Vec<String> {
        self.fs().passwords.clone()
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.fs().transfers.clone()
    }

    fn fs(&self) -> MutexGuard<'_, Filesystem> {
        self.state.lock().expect("test server state poisoned")
    }
}

enum DataChannel {
    Passive(TcpListener),
    Active(SocketAddr),
}

impl DataChannel {
    fn is_passive(&self) -> bool {
        matches!(self, Self::Passive(_))
    }

    fn open(self) -> io::Result<TcpStream> {
        match self {
            Self::Passive(listener) => listener.accept().map(|(stream, _)| stream),
            Self::Active(addr) => TcpStream::connect_timeout(&addr, Duration::from_secs(5)),
        }
    }
}

struct ClientSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    state: Arc<Mutex<Filesystem>>,
    options: Arc<ServerOptions>,
    pending_user: bool,
    logged_in: bool,
    cwd: String,
    data: Option<DataChannel>,
    rest: usize,
}

impl ClientSession {
    fn new(
        stream: TcpStream,
        state: Arc<Mutex<Filesystem>>,
        options: Arc<ServerOptions>,
    ) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            state,
            options,
            pending_user: false,
            logged_in: false,
            cwd: "/".to_string(),
            data: None,
            rest: 0,
        })
    }

    fn run(mut self) -> io::Result<()> {
        self.reply(220, "ftpcheck test server ready")?;
        loop {
            let mut raw = String::new();
            if self.reader.read_line(&mut raw)? == 0 {
                return Ok(());
            }
            let line = raw.trim_end_matches(['\r', '\n']);
            trace!("test server IN: {line}");
            let (verb, arg) = line.split_once(' ').unwrap_or((line, ""));
            let verb = verb.to_ascii_uppercase();
            if !self.logged_in && !matches!(verb.as_str(), "USER" | "PASS" | "QUIT") {
                self.reply(530, "Please login with USER and PASS")?;
                continue;
            }
            match verb.as_str() {
                "USER" if self.options.stall_after_denial => {
                    self.fs().logins += 1;
                    self.reply(530, "Login incorrect")?;
                }
                "QUIT" if self.options.stall_after_denial => {
                    trace!("test server ignoring QUIT");
                }
                "USER" => {
                    let rejected = {
                        let mut fs = self.fs();
                        fs.logins += 1;
                        fs.logins <= self.options.reject_logins
                    };
                    if rejected {
                        self.reply(421, "Service not available, try again later")?;
                        return Ok(());
                    }
                    if self.options.password == PasswordPolicy::NotRequired {
                        self.logged_in = true;
                        self.reply(230, "Anonymous access granted")?;
                    } else {
                        self.pending_user = true;
                        self.reply(331, "User name okay, need password")?;
                    }
                }
                "PASS" => self.pass(arg)?,
                "QUIT" => return self.reply(221, "Goodbye"),
                "NOOP" => self.reply(200, "NOOP ok")?,
                "TYPE" => self.reply(200, "Type set")?,
                "PWD" => {
                    let msg = format!("\"{}\" is the current directory", self.cwd);
                    self.reply(257, &msg)?;
                }
                "MKD" => self.mkd(arg)?,
                "CWD" => {
                    let target = if arg == ".." {
                        parent(&self.cwd)
                    } else {
                        resolve(&self.cwd, arg)
                    };
                    if !self.options.refuse_cwd && self.fs().dirs.contains(&target) {
                        self.cwd = target;
                        self.reply(250, "Directory successfully changed")?;
                    } else {
                        self.reply(550, "Failed to change directory")?;
                    }
                }
                "CDUP" => {
                    self.cwd = parent(&self.cwd);
                    self.reply(250, "Directory successfully changed")?;
                }
                "DELE" => {
                    let path = resolve(&self.cwd, arg);
                    let removed =
                        !self.options.refuse_dele && self.fs().files.remove(&path).is_some();
                    if removed {
                        self.reply(250, "Delete operation successful")?;
                    } else {
                        self.reply(550, "Delete operation failed")?;
                    }
                }
                "RMD" => self.rmd(arg)?,
                "PASV" => {
                    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
                    let port = listener.local_addr()?.port();
                    self.data = Some(DataChannel::Passive(listener));
                    let msg = format!(
                        "Entering Passive Mode (127,0,0,1,{},{})",
                        port >> 8,
                        port & 0xff
                    );
                    self.reply(227, &msg)?;
                }
                "PORT" => match parse_port(arg) {
                    Some(addr) => {
                        self.data = Some(DataChannel::Active(SocketAddr::V4(addr)));
                        self.reply(200, "PORT command successful")?;
                    }
                    None => self.reply(501, "Illegal PORT command")?,
                },
                "REST" => match arg.parse::<usize>() {
                    Ok(offset) => {
                        self.rest = offset;
                        let msg = format!("Restarting at {offset}. Send STORE or RETR to resume.");
                        self.reply(350, &msg)?;
                    }
                    Err(_) => self.reply(501, "Syntax error in parameters or arguments")?,
                },
                "STOR" => self.stor(arg)?,
                "RETR" => self.retr(arg)?,
                "NLST" => self.nlst()?,
                _ => self.reply(502, "Command not implemented")?,
            }
        }
    }

    fn pass(&mut self, password: &str) -> io::Result<()> {
        if !self.pending_user {
            return self.reply(503, "Login with USER first");
        }
        self.pending_user = false;
        self.fs().passwords.push(password.to_string());
        let accepted = match self.options.password {
            PasswordPolicy::EmptyOnly => password.is_empty(),
            PasswordPolicy::Any | PasswordPolicy::NotRequired => true,
        };
        if accepted {
            self.logged_in = true;
            self.reply(230, "Login successful")
        } else {
            self.reply(530, "Login incorrect")
        }
    }

    fn mkd(&mut self, arg: &str) -> io::Result<()> {
        let path = resolve(&self.cwd, arg);
        let created = {
            let mut fs = self.fs();
            let exists = fs.dirs.contains(&path) || fs.files.contains_key(&path);
            !exists && fs.dirs.contains(&parent(&path)) && fs.dirs.insert(path.clone())
        };
        if created {
            let msg = format!("\"{path}\" created");
            self.reply(257, &msg)
        } else {
            self.reply(550, "Create directory operation failed")
        }
    }

    fn rmd(&mut self, arg: &str) -> io::Result<()> {
        let path = resolve(&self.cwd, arg);
        let prefix = format!("{path}/");
        let removed = {
            let mut fs = self.fs();
            let empty = !fs.files.keys().any(|x| x.starts_with(&prefix))
                && !fs.dirs.iter().any(|x| x.starts_with(&prefix));
            path != "/" && empty && fs.dirs.remove(&path)
        };
        if removed {
            self.reply(250, "Remove directory operation successful")
        } else {
            self.reply(550, "Remove directory operation failed")
        }
    }

    fn stor(&mut self, arg: &str) -> io::Result<()> {
        let Some(channel) = self.data.take() else {
            return self.reply(425, "Use PORT or PASV first");
        };
        let path = resolve(&self.cwd, arg);
        let passive = channel.is_passive();
        let mut stream = channel.open()?;
        if self.options.refuse_stor {
            drop(stream);
            self.rest = 0;
            return self.reply(550, "Permission denied");
        }
        self.reply(150, "Ok to send data")?;
        let mut content = Vec::new();
        stream.read_to_end(&mut content)?;
        drop(stream);
        self.rest = 0;
        {
            let mut fs = self.fs();
            fs.transfers.push(Transfer {
                command: format!("STOR {path}"),
                passive,
            });
            fs.files.insert(path, content);
        }
        self.reply(226, "Transfer complete")
    }

    fn retr(&mut self, arg: &str) -> io::Result<()> {
        let Some(channel) = self.data.take() else {
            return self.reply(425, "Use PORT or PASV first");
        };
        let path = resolve(&self.cwd, arg);
        let passive = channel.is_passive();
        let offset = if self.options.ignore_rest { 0 } else { self.rest };
        self.rest = 0;
        // the data connection is opened before replying, so a refusal keeps the control channel in sync
        let mut stream = channel.open()?;
        let content = self.fs().files.get(&path).cloned();
        let Some(content) = content else {
            drop(stream);
            return self.reply(550, "Failed to open file");
        };
        let mut content = content.get(offset..).unwrap_or_default().to_vec();
        if self.options.corrupt_retr {
            if let Some(byte) = content.first_mut() {
                *byte ^= 0xff;
            }
        }
        self.reply(150, "Opening BINARY mode data connection")?;
        stream.write_all(&content)?;
        drop(stream);
        self.fs().transfers.push(Transfer {
            command: format!("RETR {path}"),
            passive,
        });
        self.reply(226, "Transfer complete")
    }

    fn nlst(&mut self) -> io::Result<()> {
        let Some(channel) = self.data.take() else {
            return self.reply(425, "Use PORT or PASV first");
        };
        let mut stream = channel.open()?;
        if self.options.refuse_nlst {
            drop(stream);
            return self.reply(550, "Permission denied");
        }
        let names = {
            let fs = self.fs();
            let names: Vec<String> = fs
                .dirs
                .iter()
                .chain(fs.files.keys())
                .filter(|x| *x != "/" && parent(x) == self.cwd)
                .map(|x| basename(x).to_string())
                .collect();
            names
        };
        self.reply(150, "Here comes the directory listing")?;
        for name in names {
            stream.write_all(format!("{name}\r\n").as_bytes())?;
        }
        drop(stream);
        self.reply(226, "Directory send OK")
    }

    fn reply(&mut self, code: u32, text: &str) -> io::Result<()> {
        trace!("test server OUT: {code} {text}");
        self.writer
            .write_all(format!("{code} {text}\r\n").as_bytes())
    }

    fn fs(&self) -> MutexGuard<'_, Filesystem> {
        self.state.lock().expect("test server state poisoned")
    }
}

fn resolve(cwd: &str, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else if cwd == "/" {
        format!("/{name}")
    } else {
        format!("{cwd}/{name}")
    }
}

fn parent(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((head, _)) => head.to_string(),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parse_port(arg: &str) -> Option<SocketAddrV4> {
    let parts = arg
        .split(',')
        .map(|x| x.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .ok()?;
    match parts.as_slice() {
        [a, b, c, d, msb, lsb] => Some(SocketAddrV4::new(
            Ipv4Addr::new(*a, *b, *c, *d),
            (u16::from(*msb) << 8) | u16::from(*lsb),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_resolve_paths() {
        assert_eq!(resolve("/", "py").as_str(), "/py");
        assert_eq!(resolve("/py", "a.bin").as_str(), "/py/a.bin");
        assert_eq!(resolve("/py", "/b.bin").as_str(), "/b.bin");
        assert_eq!(parent("/py/a.bin").as_str(), "/py");
        assert_eq!(parent("/py").as_str(), "/");
        assert_eq!(parent("/").as_str(), "/");
        assert_eq!(basename("/py/a.bin"), "a.bin");
    }

    #[test]
    fn should_parse_port_argument() {
        assert_eq!(
            parse_port("127,0,0,1,117,56"),
            Some(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 30008))
        );
        assert_eq!(parse_port("127,0,0,1,117"), None);
        assert_eq!(parse_port("127,0,0,1,117,300"), None);
    }
}
