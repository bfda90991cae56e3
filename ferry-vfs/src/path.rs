use std::{
    fmt,
    hash::{Hash, Hasher},
    path::{Path, PathBuf, MAIN_SEPARATOR},
    str::FromStr,
};

use crate::error::{VfsError, VfsResult};

pub const FTP_DEFAULT_PORT: u16 = 21;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BackendKind {
    Ftp,
    Local,
    Memory,
}

impl BackendKind {
    pub fn scheme(&self) -> &'static str {
        match self {
            BackendKind::Ftp => "ftp",
            BackendKind::Local => "file",
            BackendKind::Memory => "mem",
        }
    }
}

#[derive(Clone, Default, Eq, PartialEq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_owned(),
            password: password.to_owned(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials({:?}, ***)", self.user)
    }
}

#[derive(Clone, Debug)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn same_host(&self, other: &Endpoint) -> bool {
        self.host.eq_ignore_ascii_case(&other.host) && self.port == other.port
    }
}

/// A backend qualified, normalized absolute path.
///
/// Equality and hashing only consider the location: backend kind, host and port,
/// memory volume, drive and segments. Credentials and a trailing separator are carried
/// along but never compared.
#[derive(Clone, Debug)]
pub struct VfsPath {
    kind: BackendKind,
    endpoint: Option<Endpoint>,
    volume: Option<String>,
    drive: Option<String>,
    segments: Vec<String>,
    trailing_separator: bool,
}

impl VfsPath {
    pub fn parse(input: &str) -> VfsResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VfsError::InvalidPath(input.to_owned()));
        }

        if let Some((scheme, rest)) = trimmed.split_once("://") {
            return match scheme.to_ascii_lowercase().as_str() {
                "ftp" => parse_ftp(rest, input),
                "mem" => parse_memory(rest, input),
                "file" => parse_local(rest, input),
                _ => Err(VfsError::InvalidPath(input.to_owned())),
            };
        }

        parse_local(trimmed, input)
    }

    pub fn from_local(path: &Path) -> VfsResult<Self> {
        Self::parse(&path.to_string_lossy())
    }

    pub fn local_root(drive: Option<&str>) -> Self {
        Self {
            kind: BackendKind::Local,
            endpoint: None,
            volume: None,
            drive: drive.map(|drive| drive.to_ascii_uppercase()),
            segments: Vec::new(),
            trailing_separator: false,
        }
    }

    pub fn ftp(endpoint: Endpoint) -> Self {
        Self {
            kind: BackendKind::Ftp,
            endpoint: Some(endpoint),
            volume: None,
            drive: None,
            segments: Vec::new(),
            trailing_separator: false,
        }
    }

    pub fn memory(volume: &str) -> Self {
        Self {
            kind: BackendKind::Memory,
            endpoint: None,
            volume: Some(volume.to_owned()),
            drive: None,
            segments: Vec::new(),
            trailing_separator: false,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.endpoint
            .as_ref()
            .and_then(|endpoint| endpoint.credentials.as_ref())
    }

    pub fn volume(&self) -> Option<&str> {
        self.volume.as_deref()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|segment| segment.as_str())
    }

    pub fn has_trailing_separator(&self) -> bool {
        self.trailing_separator
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn root(&self) -> Self {
        Self {
            segments: Vec::new(),
            trailing_separator: false,
            ..self.clone()
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        let mut parent = self.clone();
        parent.segments.pop();
        parent.trailing_separator = false;
        Some(parent)
    }

    /// Appends a relative path. `..` never climbs above the root.
    pub fn join(&self, relative: &str) -> Self {
        let mut joined = self.clone();
        push_normalized(&mut joined.segments, relative, self.kind);
        joined.trailing_separator = ends_with_separator(relative, self.kind) && !joined.is_root();
        joined
    }

    /// Resolves user input against this path. Absolute input and input with a scheme
    /// replace the path, everything else is relative to it.
    pub fn resolve(&self, input: &str) -> VfsResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VfsError::InvalidPath(input.to_owned()));
        }

        if trimmed.contains("://") {
            return Self::parse(trimmed);
        }

        if self.kind == BackendKind::Local && is_local_absolute(trimmed) {
            return Self::parse(trimmed);
        }

        if trimmed.starts_with(|c| is_separator(c, self.kind)) {
            return Ok(self.root().join(trimmed));
        }

        Ok(self.join(trimmed))
    }

    pub fn same_location(&self, other: &VfsPath) -> bool {
        let same_endpoint = match (&self.endpoint, &other.endpoint) {
            (Some(left), Some(right)) => left.same_host(right),
            (None, None) => true,
            _ => false,
        };

        self.kind == other.kind
            && same_endpoint
            && self.volume == other.volume
            && self.drive == other.drive
    }

    /// True for the path itself and everything below it.
    pub fn starts_with(&self, base: &VfsPath) -> bool {
        self.same_location(base) && self.segments.starts_with(&base.segments)
    }

    pub fn relative_to(&self, base: &VfsPath) -> Option<&[String]> {
        if self.starts_with(base) {
            Some(&self.segments[base.segments.len()..])
        } else {
            None
        }
    }

    /// Path part as understood by remote servers, always `/` separated.
    pub fn remote_path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn to_local_path(&self) -> Option<PathBuf> {
        if self.kind != BackendKind::Local {
            return None;
        }

        let mut path = match &self.drive {
            Some(drive) => PathBuf::from(format!("{}{}", drive, MAIN_SEPARATOR)),
            None => PathBuf::from(MAIN_SEPARATOR.to_string()),
        };

        for segment in &self.segments {
            path.push(segment);
        }

        Some(path)
    }
}

impl PartialEq for VfsPath {
    fn eq(&self, other: &Self) -> bool {
        self.same_location(other) && self.segments == other.segments
    }
}

impl Eq for VfsPath {}

impl Hash for VfsPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        if let Some(endpoint) = &self.endpoint {
            endpoint.host.to_ascii_lowercase().hash(state);
            endpoint.port.hash(state);
        }
        self.volume.hash(state);
        self.drive.hash(state);
        self.segments.hash(state);
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BackendKind::Local => {
                let separator = MAIN_SEPARATOR.to_string();
                if let Some(drive) = &self.drive {
                    write!(f, "{}", drive)?;
                }
                write!(f, "{}{}", separator, self.segments.join(&separator))
            }
            BackendKind::Ftp => {
                write!(f, "ftp://")?;
                if let Some(endpoint) = &self.endpoint {
                    if let Some(credentials) = &endpoint.credentials {
                        write!(f, "{}@", credentials.user)?;
                    }
                    if endpoint.host.contains(':') {
                        write!(f, "[{}]", endpoint.host)?;
                    } else {
                        write!(f, "{}", endpoint.host)?;
                    }
                    if endpoint.port != FTP_DEFAULT_PORT {
                        write!(f, ":{}", endpoint.port)?;
                    }
                }
                write!(f, "{}", self.remote_path())
            }
            BackendKind::Memory => write!(
                f,
                "mem://{}{}",
                self.volume.as_deref().unwrap_or_default(),
                self.remote_path()
            ),
        }
    }
}

impl FromStr for VfsPath {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Rejects empty names, dot entries, separators, control characters and the given
/// backend specific reserved characters.
pub fn is_valid_name(name: &str, reserved: &[char]) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }

    !name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control() || reserved.contains(&c))
}

fn is_separator(c: char, kind: BackendKind) -> bool {
    c == '/' || (cfg!(windows) && kind == BackendKind::Local && c == '\\')
}

fn ends_with_separator(raw: &str, kind: BackendKind) -> bool {
    raw.ends_with(|c| is_separator(c, kind))
}

fn push_normalized(segments: &mut Vec<String>, raw: &str, kind: BackendKind) {
    for part in raw.split(|c| is_separator(c, kind)) {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name.to_owned()),
        }
    }
}

fn is_local_absolute(raw: &str) -> bool {
    if raw == "~" || raw.starts_with("~/") || raw.starts_with("~\\") {
        return true;
    }

    if cfg!(windows) {
        split_drive(raw).0.is_some()
    } else {
        raw.starts_with('/')
    }
}

fn split_drive(raw: &str) -> (Option<String>, &str) {
    if !cfg!(windows) {
        return (None, raw);
    }

    let candidate = match raw.strip_prefix('/') {
        Some(stripped) if stripped.as_bytes().get(1) == Some(&b':') => stripped,
        _ => raw,
    };

    let bytes = candidate.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = candidate[..2].to_ascii_uppercase();
        (Some(drive), &candidate[2..])
    } else {
        (None, raw)
    }
}

fn expand_home(raw: &str) -> Option<String> {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => return Some(raw.to_owned()),
    };

    let home = dirs::home_dir()?;
    Some(format!("{}{}", home.to_string_lossy(), rest))
}

fn parse_local(raw: &str, input: &str) -> VfsResult<VfsPath> {
    let expanded = match expand_home(raw) {
        Some(it) => it,
        None => return Err(VfsError::InvalidPath(input.to_owned())),
    };

    let (drive, rest) = split_drive(&expanded);
    let rooted = rest.starts_with(|c| is_separator(c, BackendKind::Local));
    if drive.is_none() && !rooted {
        return Err(VfsError::InvalidPath(input.to_owned()));
    }
    if drive.is_some() && !rest.is_empty() && !rooted {
        return Err(VfsError::InvalidPath(input.to_owned()));
    }

    let mut segments = Vec::new();
    push_normalized(&mut segments, rest, BackendKind::Local);

    Ok(VfsPath {
        kind: BackendKind::Local,
        endpoint: None,
        volume: None,
        drive,
        trailing_separator: ends_with_separator(rest, BackendKind::Local) && !segments.is_empty(),
        segments,
    })
}

fn parse_ftp(rest: &str, input: &str) -> VfsResult<VfsPath> {
    let invalid = || VfsError::InvalidPath(input.to_owned());

    let (authority, path) = match rest.find('/') {
        Some(index) => (&rest[..index], &rest[index..]),
        None => (rest, ""),
    };

    let (credentials, host_port) = match authority.rsplit_once('@') {
        Some((user_info, host_port)) => {
            let credentials = match user_info.split_once(':') {
                Some((user, password)) => Credentials::new(user, password),
                None => Credentials::new(user_info, ""),
            };
            (Some(credentials), host_port)
        }
        None => (None, authority),
    };

    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, remainder) = bracketed.split_once(']').ok_or_else(invalid)?;
        let port = match remainder.strip_prefix(':') {
            Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
            None if remainder.is_empty() => FTP_DEFAULT_PORT,
            None => return Err(invalid()),
        };
        (host, port)
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (host_port, FTP_DEFAULT_PORT),
        }
    };

    if host.is_empty() || credentials.as_ref().is_some_and(|c| c.user.is_empty()) {
        return Err(invalid());
    }

    let mut endpoint = Endpoint::new(host, port);
    endpoint.credentials = credentials;

    Ok(VfsPath::ftp(endpoint).join(path))
}

fn parse_memory(rest: &str, input: &str) -> VfsResult<VfsPath> {
    let (volume, path) = match rest.find('/') {
        Some(index) => (&rest[..index], &rest[index..]),
        None => (rest, ""),
    };

    if volume.is_empty() {
        return Err(VfsError::InvalidPath(input.to_owned()));
    }

    Ok(VfsPath::memory(volume).join(path))
}
