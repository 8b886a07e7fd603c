// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Server - Upload receiving
//
// Streams a length-bounded request body into the destination file and
// restores the sender's modification time.

use bytes::Bytes;
use filetime::FileTime;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use wireless_copy_core::protocol::CHUNK_SIZE;

/// Byte accounting for one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveReport {
    /// Length announced by the client
    pub declared: u64,
    /// Bytes that actually reached the file
    pub written: u64,
}

impl ReceiveReport {
    /// The connection ended before the declared length arrived
    pub fn is_truncated(&self) -> bool {
        self.written < self.declared
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("destination exists and overwrite was not allowed")]
    AlreadyExists,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Map a client-supplied relative path under `root`.
///
/// Only plain segments are accepted; `..`, absolute paths and drive
/// prefixes return `None`.
pub fn resolve_destination(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut segments = 0;

    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                segments += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (segments > 0).then_some(path)
}

/// Copy at most `declared` bytes from `stream` into `writer`.
///
/// Reading stops at the declared length even if the stream has more. A
/// stream that ends early or fails is not an error: the bytes received so
/// far stay written and the report shows the shortfall.
pub async fn write_bounded<S, E, W>(
    stream: &mut S,
    writer: &mut W,
    declared: u64,
) -> io::Result<ReceiveReport>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
    W: AsyncWrite + Unpin,
{
    let mut remaining = declared;

    while remaining > 0 {
        let data = match stream.next().await {
            Some(Ok(data)) => data,
            Some(Err(e)) => {
                tracing::warn!("Body stream failed after {} bytes: {}", declared - remaining, e);
                break;
            }
            None => break,
        };

        let take = data.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        for piece in data[..take].chunks(CHUNK_SIZE) {
            writer.write_all(piece).await?;
        }
        remaining -= take as u64;
    }

    Ok(ReceiveReport {
        declared,
        written: declared - remaining,
    })
}

/// Store an upload at `dest` and stamp it with `last_edit`.
///
/// An existing file is only replaced when `allow_overwrite` is set; when it
/// is not, nothing on disk is touched. The access time is left as it was.
pub async fn receive_file<S, E>(
    dest: &Path,
    allow_overwrite: bool,
    last_edit: i64,
    declared: u64,
    stream: &mut S,
) -> Result<ReceiveReport, ReceiveError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    if !allow_overwrite && fs::metadata(dest).await.map(|m| m.is_file()).unwrap_or(false) {
        return Err(ReceiveError::AlreadyExists);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)
        .await?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);

    let report = write_bounded(stream, &mut writer, declared).await?;

    writer.flush().await?;
    writer.get_mut().sync_all().await?;
    drop(writer);

    if report.is_truncated() {
        // Short bodies are kept as received; there is no rollback.
        tracing::warn!(
            "Truncated write for {}: expected {} bytes, received {}",
            dest.display(),
            report.declared,
            report.written
        );
    }

    filetime::set_file_mtime(dest, FileTime::from_unix_time(last_edit, 0))?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, io::Error>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::copy_from_slice(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_resolve_destination_accepts_nested_paths() {
        let root = Path::new("/data");
        assert_eq!(
            resolve_destination(root, "notes/todo.txt"),
            Some(PathBuf::from("/data/notes/todo.txt"))
        );
        assert_eq!(
            resolve_destination(root, "./a.txt"),
            Some(PathBuf::from("/data/a.txt"))
        );
    }

    #[test]
    fn test_resolve_destination_rejects_escapes() {
        let root = Path::new("/data");
        assert_eq!(resolve_destination(root, "../etc/passwd"), None);
        assert_eq!(resolve_destination(root, "notes/../../x"), None);
        assert_eq!(resolve_destination(root, "/etc/passwd"), None);
        assert_eq!(resolve_destination(root, ""), None);
        assert_eq!(resolve_destination(root, "."), None);
    }

    #[tokio::test]
    async fn test_write_bounded_stops_at_declared_length() {
        let mut out = Vec::new();
        let mut body = chunks(&[b"hello ", b"world", b"!!!"]);

        let report = write_bounded(&mut body, &mut out, 8).await.unwrap();

        assert_eq!(out, b"hello wo");
        assert_eq!(report, ReceiveReport { declared: 8, written: 8 });
        assert!(!report.is_truncated());
    }

    #[tokio::test]
    async fn test_write_bounded_reports_short_body() {
        let mut out = Vec::new();
        let mut body = chunks(&[b"abc"]);

        let report = write_bounded(&mut body, &mut out, 10).await.unwrap();

        assert_eq!(out, b"abc");
        assert!(report.is_truncated());
        assert_eq!(report.written, 3);
    }

    #[tokio::test]
    async fn test_write_bounded_treats_stream_error_as_truncation() {
        let mut out = Vec::new();
        let mut body = stream::iter(vec![
            Ok(Bytes::from_static(b"abcd")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"efgh")),
        ]);

        let report = write_bounded(&mut body, &mut out, 8).await.unwrap();

        assert_eq!(out, b"abcd");
        assert_eq!(report.written, 4);
    }

    #[tokio::test]
    async fn test_write_bounded_handles_large_chunks() {
        let big = vec![7u8; CHUNK_SIZE * 3 + 11];
        let mut out = Vec::new();
        let mut body = chunks(&[big.as_slice()]);

        let report = write_bounded(&mut body, &mut out, big.len() as u64).await.unwrap();

        assert_eq!(report.written, big.len() as u64);
        assert_eq!(out, big);
    }

    #[tokio::test]
    async fn test_receive_file_creates_dirs_and_sets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("notes/todo.txt");
        let mut body = chunks(&[&[b'x'; 500][..]]);

        let report = receive_file(&dest, false, 1_700_000_000, 500, &mut body)
            .await
            .unwrap();

        assert_eq!(report.written, 500);
        let metadata = std::fs::metadata(&dest).unwrap();
        assert_eq!(metadata.len(), 500);
        assert_eq!(
            FileTime::from_last_modification_time(&metadata).unix_seconds(),
            1_700_000_000
        );
    }

    #[tokio::test]
    async fn test_receive_file_refuses_existing_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.txt");
        std::fs::write(&dest, b"original").unwrap();
        filetime::set_file_mtime(&dest, FileTime::from_unix_time(1_000, 0)).unwrap();

        let mut body = chunks(&[b"replacement"]);
        let result = receive_file(&dest, false, 2_000, 11, &mut body).await;

        assert!(matches!(result, Err(ReceiveError::AlreadyExists)));
        assert_eq!(std::fs::read(&dest).unwrap(), b"original");
        let metadata = std::fs::metadata(&dest).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&metadata).unix_seconds(),
            1_000
        );
    }

    #[tokio::test]
    async fn test_receive_file_overwrites_and_keeps_atime() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.txt");
        std::fs::write(&dest, b"a much longer original body").unwrap();
        filetime::set_file_times(
            &dest,
            FileTime::from_unix_time(1_600_000_000, 0),
            FileTime::from_unix_time(1_000, 0),
        )
        .unwrap();

        let mut body = chunks(&[b"new"]);
        receive_file(&dest, true, 1_700_000_000, 3, &mut body)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
        let metadata = std::fs::metadata(&dest).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&metadata).unix_seconds(),
            1_700_000_000
        );
        assert_eq!(
            FileTime::from_last_access_time(&metadata).unix_seconds(),
            1_600_000_000
        );
    }

    #[tokio::test]
    async fn test_receive_file_keeps_truncated_body() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("short.bin");
        let mut body = chunks(&[b"12345"]);

        let report = receive_file(&dest, false, 1_700_000_000, 100, &mut body)
            .await
            .unwrap();

        assert!(report.is_truncated());
        assert_eq!(std::fs::read(&dest).unwrap(), b"12345");
    }
}
