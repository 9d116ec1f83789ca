//! Installer strategies over the OS package-session port.
//!
//! Two ways to get package bytes into an install session:
//!
//! - [`StreamInstaller`] pipes a network response straight into the
//!   session, no intermediate file. Used when the payload is fetched by
//!   this process rather than the OS download manager.
//! - [`FileInstaller`] copies an already-complete local file into the
//!   session. Used after a download-manager fetch.
//!
//! Both share the [`InstallerControl`] contract for cancellation and
//! session queries, which is all the lifecycle coordinator needs once a
//! session exists.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

use trove_core::{InstallerError, PackageSessionPort};

/// Session-level operations common to both strategies.
#[async_trait]
pub trait InstallerControl: Send + Sync {
    /// Try to cancel a running install session.
    ///
    /// Safe to call after the session has completed: returns `false`
    /// instead of erroring. A `false` from a live session means the OS
    /// refused the abandon and the install may still finish.
    async fn try_cancel(&self, session_id: i32) -> bool;

    /// Whether a session is still active. `None` when the OS cannot
    /// say; callers must treat that as unknown, not as inactive.
    async fn is_installing(&self, session_id: i32) -> Option<bool>;
}

/// Pipes bytes from a reader directly into an install session.
pub struct StreamInstaller {
    sessions: Arc<dyn PackageSessionPort>,
}

impl StreamInstaller {
    /// Create a stream installer over the session port.
    pub fn new(sessions: Arc<dyn PackageSessionPort>) -> Self {
        Self { sessions }
    }

    /// Open a session sized to the expected payload length.
    ///
    /// Sizing up front lets storage exhaustion surface here, before any
    /// bytes move, as [`InstallerError::InsufficientStorage`].
    pub async fn open_session(&self, expected_size: Option<u64>) -> Result<i32, InstallerError> {
        self.sessions.create_session(expected_size).await
    }

    /// Stream the payload into the session and commit it.
    ///
    /// Any write failure abandons the session before returning;
    /// allocation failures are reported as the distinguished
    /// storage-exhaustion kind so the UI can suggest freeing space.
    pub async fn stream_and_commit<R>(
        &self,
        session_id: i32,
        mut source: R,
    ) -> Result<(), InstallerError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut writer = match self.sessions.open_writer(session_id).await {
            Ok(writer) => writer,
            Err(e) => {
                self.abandon_quietly(session_id).await;
                return Err(e);
            }
        };

        let copy_result = tokio::io::copy(&mut source, &mut writer).await;
        let flush_result = match copy_result {
            Ok(_) => writer.shutdown().await,
            Err(e) => Err(e),
        };

        if let Err(e) = flush_result {
            self.abandon_quietly(session_id).await;
            return Err(InstallerError::from_io_error(&e));
        }
        drop(writer);

        self.sessions.commit(session_id).await
    }

    async fn abandon_quietly(&self, session_id: i32) {
        if let Err(e) = self.sessions.abandon(session_id).await {
            warn!(session = session_id, error = %e, "could not abandon install session");
        }
    }
}

#[async_trait]
impl InstallerControl for StreamInstaller {
    async fn try_cancel(&self, session_id: i32) -> bool {
        match self.sessions.abandon(session_id).await {
            Ok(()) => true,
            Err(e) => {
                debug!(session = session_id, error = %e, "abandon refused");
                false
            }
        }
    }

    async fn is_installing(&self, session_id: i32) -> Option<bool> {
        self.sessions.is_active(session_id).await
    }
}

/// Copies a complete local file into an install session.
pub struct FileInstaller {
    sessions: Arc<dyn PackageSessionPort>,
}

impl FileInstaller {
    /// Create a file installer over the session port.
    pub fn new(sessions: Arc<dyn PackageSessionPort>) -> Self {
        Self { sessions }
    }

    /// Open a session sized to the file on disk.
    pub async fn open_session_for(&self, path: &Path) -> Result<i32, InstallerError> {
        let size = crate::dirs::file_size(path)
            .await
            .map_err(|e| InstallerError::from_io_error(&e))?;
        self.sessions.create_session(Some(size)).await
    }

    /// Copy the file into the session and commit it, abandoning the
    /// session on any copy exception.
    pub async fn copy_and_commit(&self, session_id: i32, path: &Path) -> Result<(), InstallerError> {
        let open_result = async {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| InstallerError::from_io_error(&e))?;
            self.sessions.open_writer(session_id).await.map(|w| (file, w))
        }
        .await;

        let (mut file, mut writer) = match open_result {
            Ok(pair) => pair,
            Err(e) => {
                self.abandon_quietly(session_id).await;
                return Err(e);
            }
        };

        let copy_result = tokio::io::copy(&mut file, &mut writer).await;
        let flush_result = match copy_result {
            Ok(_) => writer.shutdown().await,
            Err(e) => Err(e),
        };

        if let Err(e) = flush_result {
            self.abandon_quietly(session_id).await;
            return Err(InstallerError::from_io_error(&e));
        }
        drop(writer);

        self.sessions.commit(session_id).await
    }

    async fn abandon_quietly(&self, session_id: i32) {
        if let Err(e) = self.sessions.abandon(session_id).await {
            warn!(session = session_id, error = %e, "could not abandon install session");
        }
    }
}

#[async_trait]
impl InstallerControl for FileInstaller {
    async fn try_cancel(&self, session_id: i32) -> bool {
        match self.sessions.abandon(session_id).await {
            Ok(()) => true,
            Err(e) => {
                debug!(session = session_id, error = %e, "abandon refused");
                false
            }
        }
    }

    async fn is_installing(&self, session_id: i32) -> Option<bool> {
        self.sessions.is_active(session_id).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::AsyncWrite;

    /// What the fake session's writer should do with bytes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum WriterBehavior {
        /// Accept everything.
        Accept,
        /// Fail every write with an allocation-failure message.
        FailNoSpace,
        /// Fail every write with a generic I/O error.
        FailIo,
    }

    #[derive(Clone, Debug, Default)]
    pub struct SessionState {
        pub committed: bool,
        pub abandoned: bool,
        pub written: Vec<u8>,
    }

    /// In-memory fake of the OS package-session port.
    pub struct FakeSessions {
        next_id: Mutex<i32>,
        states: Arc<Mutex<HashMap<i32, SessionState>>>,
        writer_behavior: WriterBehavior,
        refuse_abandon: bool,
        /// Answer for `is_active`, keyed by session; missing key = None.
        pub active: Mutex<HashMap<i32, bool>>,
    }

    impl FakeSessions {
        pub fn new() -> Self {
            Self {
                next_id: Mutex::new(1),
                states: Arc::new(Mutex::new(HashMap::new())),
                writer_behavior: WriterBehavior::Accept,
                refuse_abandon: false,
                active: Mutex::new(HashMap::new()),
            }
        }

        pub fn with_writer_behavior(mut self, behavior: WriterBehavior) -> Self {
            self.writer_behavior = behavior;
            self
        }

        /// Make `abandon` fail, as the OS does when permission is gone.
        pub fn with_refused_abandon(mut self) -> Self {
            self.refuse_abandon = true;
            self
        }

        pub fn state_of(&self, session_id: i32) -> SessionState {
            self.states
                .lock()
                .unwrap()
                .get(&session_id)
                .expect("unknown session")
                .clone()
        }
    }

    struct FakeWriter {
        session_id: i32,
        behavior: WriterBehavior,
        sink: Arc<Mutex<HashMap<i32, SessionState>>>,
    }

    impl AsyncWrite for FakeWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            match self.behavior {
                WriterBehavior::Accept => {
                    let mut states = self.sink.lock().unwrap();
                    states
                        .entry(self.session_id)
                        .or_default()
                        .written
                        .extend_from_slice(buf);
                    Poll::Ready(Ok(buf.len()))
                }
                WriterBehavior::FailNoSpace => Poll::Ready(Err(io::Error::other(
                    "Failed to allocate 52428800 bytes: not enough space",
                ))),
                WriterBehavior::FailIo => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "session pipe closed",
                ))),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[async_trait]
    impl PackageSessionPort for FakeSessions {
        async fn create_session(&self, _expected_size: Option<u64>) -> Result<i32, InstallerError> {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            self.states
                .lock()
                .unwrap()
                .insert(id, SessionState::default());
            Ok(id)
        }

        async fn open_writer(
            &self,
            session_id: i32,
        ) -> Result<Box<dyn AsyncWrite + Send + Unpin>, InstallerError> {
            Ok(Box::new(FakeWriter {
                session_id,
                behavior: self.writer_behavior,
                sink: Arc::clone(&self.states),
            }))
        }

        async fn commit(&self, session_id: i32) -> Result<(), InstallerError> {
            self.states
                .lock()
                .unwrap()
                .entry(session_id)
                .or_default()
                .committed = true;
            Ok(())
        }

        async fn abandon(&self, session_id: i32) -> Result<(), InstallerError> {
            if self.refuse_abandon {
                return Err(InstallerError::session("abandon refused by OS"));
            }
            self.states
                .lock()
                .unwrap()
                .entry(session_id)
                .or_default()
                .abandoned = true;
            Ok(())
        }

        async fn is_active(&self, session_id: i32) -> Option<bool> {
            self.active.lock().unwrap().get(&session_id).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeSessions, WriterBehavior};
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn stream_install_pipes_and_commits() {
        let sessions = Arc::new(FakeSessions::new());
        let installer = StreamInstaller::new(sessions.clone());

        let session_id = installer.open_session(Some(11)).await.unwrap();
        installer
            .stream_and_commit(session_id, &b"package-bytes"[..])
            .await
            .unwrap();

        let state = sessions.state_of(session_id);
        assert!(state.committed);
        assert!(!state.abandoned);
        assert_eq!(state.written, b"package-bytes");
    }

    #[tokio::test]
    async fn stream_install_no_space_is_distinguished_and_abandons() {
        let sessions =
            Arc::new(FakeSessions::new().with_writer_behavior(WriterBehavior::FailNoSpace));
        let installer = StreamInstaller::new(sessions.clone());

        let session_id = installer.open_session(Some(1024)).await.unwrap();
        let err = installer
            .stream_and_commit(session_id, &b"bytes"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, InstallerError::InsufficientStorage { .. }));
        let state = sessions.state_of(session_id);
        assert!(state.abandoned);
        assert!(!state.committed);
    }

    #[tokio::test]
    async fn stream_install_generic_io_error_stays_generic() {
        let sessions = Arc::new(FakeSessions::new().with_writer_behavior(WriterBehavior::FailIo));
        let installer = StreamInstaller::new(sessions.clone());

        let session_id = installer.open_session(None).await.unwrap();
        let err = installer
            .stream_and_commit(session_id, &b"bytes"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, InstallerError::Io { .. }));
        assert!(sessions.state_of(session_id).abandoned);
    }

    #[tokio::test]
    async fn file_install_copies_and_commits() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.as_file().write_all(b"apk contents").unwrap();

        let sessions = Arc::new(FakeSessions::new());
        let installer = FileInstaller::new(sessions.clone());

        let session_id = installer.open_session_for(tmp.path()).await.unwrap();
        installer.copy_and_commit(session_id, tmp.path()).await.unwrap();

        let state = sessions.state_of(session_id);
        assert!(state.committed);
        assert_eq!(state.written, b"apk contents");
    }

    #[tokio::test]
    async fn file_install_abandons_on_missing_file() {
        let sessions = Arc::new(FakeSessions::new());
        let installer = FileInstaller::new(sessions.clone());

        let session_id = sessions.create_session(None).await.unwrap();
        let err = installer
            .copy_and_commit(session_id, std::path::Path::new("/nonexistent/file.apk"))
            .await
            .unwrap_err();

        assert!(matches!(err, InstallerError::Io { .. }));
        let state = sessions.state_of(session_id);
        assert!(state.abandoned);
        assert!(!state.committed);
    }

    #[tokio::test]
    async fn try_cancel_reports_refusal_without_erroring() {
        let refusing = Arc::new(FakeSessions::new().with_refused_abandon());
        let installer = StreamInstaller::new(refusing);
        assert!(!installer.try_cancel(1).await);

        let accepting = Arc::new(FakeSessions::new());
        let session_id = accepting.create_session(None).await.unwrap();
        let installer = StreamInstaller::new(accepting.clone());
        assert!(installer.try_cancel(session_id).await);
        assert!(accepting.state_of(session_id).abandoned);
    }

    #[tokio::test]
    async fn is_installing_unknown_is_none() {
        let sessions = Arc::new(FakeSessions::new());
        sessions.active.lock().unwrap().insert(7, true);

        let installer = FileInstaller::new(sessions);
        assert_eq!(installer.is_installing(7).await, Some(true));
        assert_eq!(installer.is_installing(8).await, None);
    }
}

