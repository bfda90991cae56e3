use std::{
    fmt,
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use suppaftp::{types::FileType as TransferType, FtpError, FtpStream};

use crate::{
    backend::{self, ByteSink, ByteSource, DeleteReport, Filesystem},
    entry::{DirectoryEntry, EntryKind},
    error::{VfsError, VfsResult},
    path::{self, BackendKind, Credentials, Endpoint, VfsPath},
    settings::Timeouts,
};

type Session = Arc<Mutex<Option<FtpStream>>>;

/// FTP connector with one control connection per instance. The connection is opened
/// lazily on first use once credentials are known; without them every operation fails
/// with `NotConnected`. Sockets carry deadlines from `Timeouts`, so a stalled server
/// releases the session instead of holding it.
pub struct FtpFs {
    endpoint: Endpoint,
    credentials: Arc<Mutex<Option<Credentials>>>,
    session: Session,
    timeouts: Timeouts,
}

impl fmt::Debug for FtpFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpFs")
            .field("endpoint", &self.endpoint.address())
            .field("credentials", &self.credentials.lock().is_some())
            .finish()
    }
}

impl FtpFs {
    pub fn new(endpoint: Endpoint) -> Self {
        let credentials = endpoint.credentials.clone();
        Self {
            endpoint,
            credentials: Arc::new(Mutex::new(credentials)),
            session: Arc::new(Mutex::new(None)),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    async fn with_stream<T, F>(&self, operation: F) -> VfsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> VfsResult<T> + Send + 'static,
    {
        let credentials = self.credentials.lock().clone();
        let endpoint = self.endpoint.clone();
        let session = self.session.clone();
        let timeouts = self.timeouts;

        blocking(move || {
            let mut guard = session.lock();
            if guard.is_none() {
                let credentials = match credentials {
                    Some(it) => it,
                    None => return Err(VfsError::NotConnected),
                };
                *guard = Some(connect(&endpoint, &credentials, timeouts)?);
            }

            let stream = match guard.as_mut() {
                Some(it) => it,
                None => return Err(VfsError::NotConnected),
            };

            let result = operation(stream);
            if let Err(VfsError::NotConnected | VfsError::Timeout) = result {
                tracing::debug!("ftp session to {} dropped", endpoint.address());
                *guard = None;
            }

            result
        })
        .await
    }
}

#[async_trait]
impl Filesystem for FtpFs {
    fn kind(&self) -> BackendKind {
        BackendKind::Ftp
    }

    fn root(&self) -> VfsPath {
        VfsPath::ftp(self.endpoint.clone())
    }

    fn requires_login(&self) -> bool {
        self.credentials.lock().is_none()
    }

    #[tracing::instrument(skip(self, credentials))]
    async fn login(&self, credentials: Credentials) -> VfsResult<()> {
        let endpoint = self.endpoint.clone();
        let session = self.session.clone();
        let attempt = credentials.clone();
        let timeouts = self.timeouts;

        blocking(move || {
            let stream = connect(&endpoint, &attempt, timeouts)?;
            if let Some(mut previous) = session.lock().replace(stream) {
                let _ = previous.quit();
            }
            Ok(())
        })
        .await?;

        *self.credentials.lock() = Some(credentials);
        Ok(())
    }

    async fn list(&self, path: &VfsPath) -> VfsResult<Vec<DirectoryEntry>> {
        backend::ensure_served(self, path)?;

        let remote = path.remote_path();
        let parent = path.clone();
        self.with_stream(move |stream| {
            let lines = stream
                .list(Some(&remote))
                .map_err(|err| map_ftp_error(err, &remote))?;

            Ok(lines
                .iter()
                .filter_map(|line| parse_list_line(line))
                .map(|item| item.into_entry(&parent))
                .collect())
        })
        .await
    }

    async fn stat(&self, path: &VfsPath) -> VfsResult<DirectoryEntry> {
        backend::ensure_served(self, path)?;

        let (parent, name) = match (path.parent(), path.name()) {
            (Some(parent), Some(name)) => (parent, name.to_owned()),
            _ => return Ok(DirectoryEntry::new(path, "", EntryKind::Directory, 0)),
        };

        let entries = self.list(&parent).await?;
        entries
            .into_iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    async fn create_directory(&self, parent: &VfsPath, name: &str) -> VfsResult<VfsPath> {
        backend::ensure_served(self, parent)?;
        backend::ensure_valid_name(self, name)?;

        let path = parent.join(name);
        let remote = path.remote_path();
        let remote_parent = parent.remote_path();
        let child = name.to_owned();
        self.with_stream(move |stream| match stream.mkdir(&remote) {
            Ok(()) => Ok(()),
            Err(err) if response_code(&err) == Some(550) => {
                if contains(stream, &remote_parent, &child) {
                    Err(VfsError::AlreadyExists(remote))
                } else {
                    Err(map_ftp_error(err, &remote))
                }
            }
            Err(err) => Err(map_ftp_error(err, &remote)),
        })
        .await?;

        Ok(path)
    }

    async fn delete(&self, paths: &[VfsPath]) -> DeleteReport {
        let mut report = DeleteReport::default();
        for path in paths {
            let result = if path.is_root() {
                Err(VfsError::PermissionDenied(path.to_string()))
            } else if let Err(err) = backend::ensure_served(self, path) {
                Err(err)
            } else {
                let remote = path.remote_path();
                self.with_stream(move |stream| delete_recursive(stream, &remote))
                    .await
            };

            match result {
                Ok(()) => report.deleted.push(path.clone()),
                Err(err) => report.failures.push((path.clone(), err)),
            }
        }

        report
    }

    async fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSource>> {
        backend::ensure_served(self, path)?;

        let remote = path.remote_path();
        let chunk = self.timeouts.chunk;
        let data = self
            .with_stream(move |stream| {
                let data = stream
                    .retr_as_stream(&remote)
                    .map_err(|err| map_ftp_error(err, &remote))?;
                data.get_ref()
                    .set_read_timeout(Some(chunk))
                    .map_err(|err| VfsError::from_io(err, &remote))?;

                Ok(Box::new(data) as Box<dyn Read + Send>)
            })
            .await?;

        Ok(Box::new(FtpReader {
            session: self.session.clone(),
            data: Some(data),
            display: path.to_string(),
            open: true,
        }))
    }

    async fn open_write(&self, path: &VfsPath) -> VfsResult<Box<dyn ByteSink>> {
        backend::ensure_served(self, path)?;

        let remote = path.remote_path();
        let chunk = self.timeouts.chunk;
        let data = self
            .with_stream(move |stream| {
                let data = stream
                    .put_with_stream(&remote)
                    .map_err(|err| map_ftp_error(err, &remote))?;
                data.get_ref()
                    .set_write_timeout(Some(chunk))
                    .map_err(|err| VfsError::from_io(err, &remote))?;

                Ok(Box::new(data) as Box<dyn Write + Send>)
            })
            .await?;

        Ok(Box::new(FtpWriter {
            session: self.session.clone(),
            data: Some(data),
            display: path.to_string(),
            open: true,
        }))
    }

    fn duplicate(&self) -> Box<dyn Filesystem> {
        let mut endpoint = self.endpoint.clone();
        endpoint.credentials = self.credentials.lock().clone();

        Box::new(FtpFs::new(endpoint).with_timeouts(self.timeouts))
    }
}

/// Drops the control connection after a data transfer ended without its closing reply.
fn invalidate(session: &Session) {
    match session.try_lock() {
        Some(mut guard) => {
            guard.take();
        }
        None => tracing::warn!("ftp session busy, unable to reset after aborted transfer"),
    }
}

struct FtpReader {
    session: Session,
    data: Option<Box<dyn Read + Send>>,
    display: String,
    open: bool,
}

impl FtpReader {
    fn take_data(&mut self) -> VfsResult<Box<dyn Read + Send>> {
        self.data
            .take()
            .ok_or_else(|| VfsError::Unknown(format!("{}: data connection closed", self.display)))
    }
}

#[async_trait]
impl ByteSource for FtpReader {
    async fn read_chunk(&mut self, max: usize) -> VfsResult<Vec<u8>> {
        let mut data = self.take_data()?;
        let display = self.display.clone();

        let (data, result) = tokio::task::spawn_blocking(move || {
            let mut buffer = vec![0; max];
            let result = data
                .read(&mut buffer)
                .map(|read| {
                    buffer.truncate(read);
                    buffer
                })
                .map_err(|err| VfsError::from_io(err, &display));

            (data, result)
        })
        .await
        .map_err(|err| VfsError::Unknown(err.to_string()))?;

        self.data = Some(data);
        result
    }

    async fn finish(&mut self) -> VfsResult<()> {
        let data = self.take_data()?;
        let session = self.session.clone();
        let display = self.display.clone();

        blocking(move || match session.lock().as_mut() {
            Some(stream) => stream
                .finalize_retr_stream(data)
                .map_err(|err| map_ftp_error(err, &display)),
            None => Err(VfsError::NotConnected),
        })
        .await?;

        self.open = false;
        Ok(())
    }
}

impl Drop for FtpReader {
    fn drop(&mut self) {
        if self.open {
            invalidate(&self.session);
        }
    }
}

struct FtpWriter {
    session: Session,
    data: Option<Box<dyn Write + Send>>,
    display: String,
    open: bool,
}

impl FtpWriter {
    fn take_data(&mut self) -> VfsResult<Box<dyn Write + Send>> {
        self.data
            .take()
            .ok_or_else(|| VfsError::Unknown(format!("{}: data connection closed", self.display)))
    }
}

#[async_trait]
impl ByteSink for FtpWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> VfsResult<()> {
        let mut data = self.take_data()?;
        let display = self.display.clone();
        let chunk = chunk.to_vec();

        let (data, result) = tokio::task::spawn_blocking(move || {
            let result = data
                .write_all(&chunk)
                .map_err(|err| VfsError::from_io(err, &display));

            (data, result)
        })
        .await
        .map_err(|err| VfsError::Unknown(err.to_string()))?;

        self.data = Some(data);
        result
    }

    async fn finish(&mut self) -> VfsResult<()> {
        let data = self.take_data()?;
        let session = self.session.clone();
        let display = self.display.clone();

        blocking(move || match session.lock().as_mut() {
            Some(stream) => stream
                .finalize_put_stream(data)
                .map_err(|err| map_ftp_error(err, &display)),
            None => Err(VfsError::NotConnected),
        })
        .await?;

        self.open = false;
        Ok(())
    }
}

impl Drop for FtpWriter {
    fn drop(&mut self) {
        if self.open {
            invalidate(&self.session);
        }
    }
}

async fn blocking<T, F>(operation: F) -> VfsResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> VfsResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|err| VfsError::Unknown(err.to_string()))?
}

fn connect(
    endpoint: &Endpoint,
    credentials: &Credentials,
    timeouts: Timeouts,
) -> VfsResult<FtpStream> {
    tracing::debug!("connecting to ftp://{}", endpoint.address());

    let address = endpoint.address();
    let socket = address
        .to_socket_addrs()
        .map_err(|err| VfsError::from_io(err, &address))?
        .next()
        .ok_or_else(|| VfsError::NotFound(address.clone()))?;

    // deadlines are set before the greeting is read
    let control = TcpStream::connect_timeout(&socket, timeouts.operation)
        .and_then(|control| {
            control.set_read_timeout(Some(timeouts.operation))?;
            control.set_write_timeout(Some(timeouts.operation))?;
            Ok(control)
        })
        .map_err(|err| VfsError::from_io(err, &address))?;

    let mut stream =
        FtpStream::connect_with_stream(control).map_err(|err| map_ftp_error(err, &address))?;
    stream
        .login(&credentials.user, &credentials.password)
        .map_err(|err| map_ftp_error(err, &address))?;
    stream
        .transfer_type(TransferType::Binary)
        .map_err(|err| map_ftp_error(err, &address))?;

    Ok(stream)
}

fn contains(stream: &mut FtpStream, remote_parent: &str, name: &str) -> bool {
    let lines = match stream.list(Some(remote_parent)) {
        Ok(lines) => lines,
        Err(_) => return false,
    };

    lines
        .iter()
        .filter_map(|line| parse_list_line(line))
        .any(|item| item.name == name)
}

fn delete_recursive(stream: &mut FtpStream, remote: &str) -> VfsResult<()> {
    if stream.rm(remote).is_ok() {
        return Ok(());
    }

    let lines = stream
        .list(Some(remote))
        .map_err(|err| map_ftp_error(err, remote))?;

    for item in lines.iter().filter_map(|line| parse_list_line(line)) {
        let child = format!("{}/{}", remote.trim_end_matches('/'), item.name);
        if item.kind == EntryKind::Directory {
            delete_recursive(stream, &child)?;
        } else {
            stream.rm(&child).map_err(|err| map_ftp_error(err, &child))?;
        }
    }

    stream.rmdir(remote).map_err(|err| map_ftp_error(err, remote))
}

fn response_code(error: &FtpError) -> Option<u32> {
    match error {
        FtpError::UnexpectedResponse(response) => Some(response.status.code()),
        _ => None,
    }
}

fn map_ftp_error(error: FtpError, path: &str) -> VfsError {
    match error {
        FtpError::ConnectionError(err) => VfsError::from_io(err, path),
        FtpError::UnexpectedResponse(response) => {
            let code = response.status.code();
            let body = String::from_utf8_lossy(&response.body).trim().to_string();
            match code {
                421 | 425 | 426 => VfsError::NotConnected,
                530 => VfsError::PermissionDenied(format!("{}: login incorrect", path)),
                550 => VfsError::NotFound(path.to_owned()),
                451 | 552 | 553 => VfsError::PermissionDenied(path.to_owned()),
                _ => VfsError::Unknown(format!("ftp error {} on {}: {}", code, path, body)),
            }
        }
        other => VfsError::Unknown(format!("{}: {}", path, other)),
    }
}

struct ListedItem {
    name: String,
    kind: EntryKind,
    size: u64,
    modified: Option<SystemTime>,
}

impl ListedItem {
    fn into_entry(self, parent: &VfsPath) -> DirectoryEntry {
        DirectoryEntry::new(parent, &self.name, self.kind, self.size).with_modified(self.modified)
    }
}

/// Parses one line of a `LIST` reply in unix or DOS style. Names that could address
/// anything but a direct child of the listed directory are dropped.
fn parse_list_line(line: &str) -> Option<ListedItem> {
    let item = match line.trim_start().chars().next() {
        Some(first) if first.is_ascii_digit() => parse_dos_line(line)?,
        Some(_) => parse_unix_line(line)?,
        None => return None,
    };

    if !path::is_valid_name(&item.name, &[]) {
        tracing::debug!("skipping listed name {:?}", item.name);
        return None;
    }

    Some(item)
}

fn parse_unix_line(line: &str) -> Option<ListedItem> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 {
        return None;
    }

    let kind = match parts[0].chars().next() {
        Some('d') => EntryKind::Directory,
        Some('l') => EntryKind::Symlink,
        _ => EntryKind::File,
    };

    let size: u64 = parts[4].parse().unwrap_or(0);

    // names may contain whitespace, so they are cut from the raw line
    let name_start = nth_field_offset(line, 8)?;
    let mut name = &line[name_start..];
    if kind == EntryKind::Symlink {
        if let Some((link, _target)) = name.split_once(" -> ") {
            name = link;
        }
    }

    Some(ListedItem {
        name: name.to_owned(),
        kind,
        size,
        modified: parse_ftp_date(parts[5], parts[6], parts[7]),
    })
}

/// `MM-DD-YY  HH:MMAM  <DIR>|size  name` as sent by IIS.
fn parse_dos_line(line: &str) -> Option<ListedItem> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    let (kind, size) = if parts[2].eq_ignore_ascii_case("<DIR>") {
        (EntryKind::Directory, 0)
    } else {
        (EntryKind::File, parts[2].parse().ok()?)
    };

    let name_start = nth_field_offset(line, 3)?;
    Some(ListedItem {
        name: line[name_start..].to_owned(),
        kind,
        size,
        modified: parse_dos_date(parts[0], parts[1]),
    })
}
fn nth_field_offset(line: &str, field: usize) -> Option<usize> {
    let mut seen = 0;
    let mut in_field = false;
    for (index, character) in line.char_indices() {
        if character.is_whitespace() {
            in_field = false;
        } else if !in_field {
            if seen == field {
                return Some(index);
            }
            seen += 1;
            in_field = true;
        }
    }

    None
}

fn parse_ftp_date(month: &str, day: &str, time_or_year: &str) -> Option<SystemTime> {
    let month = match month.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };

    let day: u32 = day.parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }

    let (year, hour, minute) = match time_or_year.split_once(':') {
        Some((hour, minute)) => (current_year(), hour.parse().ok()?, minute.parse().ok()?),
        None => (time_or_year.parse().ok()?, 0u64, 0u64),
    };

    let days = days_since_epoch(year, month, day)?;
    let seconds = days * 86_400 + hour * 3_600 + minute * 60;

    Some(UNIX_EPOCH + Duration::from_secs(seconds))
}

fn parse_dos_date(date: &str, time: &str) -> Option<SystemTime> {
    let mut fields = date.split('-');
    let month: u32 = fields.next()?.parse().ok()?;
    let day: u32 = fields.next()?.parse().ok()?;
    let listed: u64 = fields.next()?.parse().ok()?;
    let year = match listed {
        0..=69 => 2000 + listed,
        70..=99 => 1900 + listed,
        _ => listed,
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let upper = time.to_ascii_uppercase();
    let (clock, afternoon) = match upper.strip_suffix("PM") {
        Some(clock) => (clock, true),
        None => (upper.strip_suffix("AM").unwrap_or(&upper), false),
    };

    let (hour, minute) = clock.split_once(':')?;
    let mut hour: u64 = hour.parse().ok()?;
    let minute: u64 = minute.parse().ok()?;
    if hour == 12 {
        hour = 0;
    }
    if afternoon {
        hour += 12;
    }

    let days = days_since_epoch(year, month, day)?;
    Some(UNIX_EPOCH + Duration::from_secs(days * 86_400 + hour * 3_600 + minute * 60))
}

fn is_leap(year: u64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn days_in_year(year: u64) -> u64 {
    if is_leap(year) {
        366
    } else {
        365
    }
}

fn current_year() -> u64 {
    let mut days = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() / 86_400)
        .unwrap_or_default();

    let mut year = 1970;
    while days >= days_in_year(year) {
        days -= days_in_year(year);
        year += 1;
    }

    year
}

fn days_since_epoch(year: u64, month: u32, day: u32) -> Option<u64> {
    if year < 1970 {
        return None;
    }

    let month_days = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut days: u64 = (1970..year).map(days_in_year).sum();
    for (index, length) in month_days.iter().enumerate().take(month as usize - 1) {
        days += length;
        if index == 1 && is_leap(year) {
            days += 1;
        }
    }

    Some(days + u64::from(day) - 1)
}
