//! Named-pipe pair bindings.
//!
//! A named-pipe connection uses two one-way pipes derived from a base name:
//! the server reads from `<root>/<base>.incoming` and writes to
//! `<root>/<base>.outgoing`; the client does the opposite.
//!
//! - Unix: Unix domain sockets under the pipe root (default: the temp dir).
//! - Windows: named pipes under `\\.\pipe\`.

use std::{
    io,
    path::{Path, PathBuf},
};

use super::{StreamReceiver, StreamSender, TransportPair};

/// Suffix of the pipe the server reads from.
pub const INCOMING_SUFFIX: &str = ".incoming";
/// Suffix of the pipe the server writes to.
pub const OUTGOING_SUFFIX: &str = ".outgoing";

/// Platform default directory that hosts pipe endpoints.
#[must_use]
pub fn default_pipe_root() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from(r"\\.\pipe\")
    }
    #[cfg(not(windows))]
    {
        std::env::temp_dir()
    }
}

/// Resolved locations of the incoming and outgoing pipes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipePaths {
    incoming: PathBuf,
    outgoing: PathBuf,
}

impl PipePaths {
    /// Derive the pipe pair for `base_name` under `root`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    ///
    /// use streamframe::transport::named_pipe::PipePaths;
    ///
    /// let paths = PipePaths::new("/tmp", "bot");
    /// assert_eq!(paths.incoming(), Path::new("/tmp/bot.incoming"));
    /// assert_eq!(paths.outgoing(), Path::new("/tmp/bot.outgoing"));
    /// ```
    pub fn new(root: impl AsRef<Path>, base_name: &str) -> Self {
        let root = root.as_ref();
        Self {
            incoming: root.join(format!("{base_name}{INCOMING_SUFFIX}")),
            outgoing: root.join(format!("{base_name}{OUTGOING_SUFFIX}")),
        }
    }

    /// Pipe carrying client-to-server bytes.
    #[must_use]
    pub fn incoming(&self) -> &Path { &self.incoming }

    /// Pipe carrying server-to-client bytes.
    #[must_use]
    pub fn outgoing(&self) -> &Path { &self.outgoing }
}

#[cfg(unix)]
mod unix_impl {
    use std::path::Path;

    use tokio::net::{UnixListener, UnixStream};

    use super::*;

    /// Listening side of a pipe pair.
    ///
    /// Socket files are removed when the listener is dropped.
    #[derive(Debug)]
    pub struct PipeListener {
        incoming: UnixListener,
        outgoing: UnixListener,
        paths: PipePaths,
    }

    impl PipeListener {
        /// Bind both pipes.
        ///
        /// A stale socket file left behind by a dead server is replaced; a
        /// live server on the same paths yields
        /// [`io::ErrorKind::AddrInUse`].
        ///
        /// # Errors
        ///
        /// Returns any I/O error raised while binding.
        pub async fn bind(paths: &PipePaths) -> io::Result<Self> {
            let incoming = bind_socket(paths.incoming()).await?;
            let outgoing = bind_socket(paths.outgoing()).await?;
            Ok(Self {
                incoming,
                outgoing,
                paths: paths.clone(),
            })
        }

        /// Wait for a client to connect to both pipes.
        ///
        /// # Errors
        ///
        /// Returns any I/O error raised while accepting.
        pub async fn accept(&self) -> io::Result<TransportPair> {
            let (reader, _) = self.incoming.accept().await?;
            let (writer, _) = self.outgoing.accept().await?;
            Ok((
                Box::new(StreamSender::new(writer)),
                Box::new(StreamReceiver::new(reader)),
            ))
        }

        /// Paths this listener is bound to.
        #[must_use]
        pub fn paths(&self) -> &PipePaths { &self.paths }
    }

    impl Drop for PipeListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(self.paths.incoming());
            let _ = std::fs::remove_file(self.paths.outgoing());
        }
    }

    async fn bind_socket(path: &Path) -> io::Result<UnixListener> {
        if path.exists() {
            if UnixStream::connect(path).await.is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("address already in use: {}", path.display()),
                ));
            }
            std::fs::remove_file(path)?;
        }
        UnixListener::bind(path)
    }

    /// Connect to a listening pipe pair as a client.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while connecting.
    pub async fn connect(paths: &PipePaths) -> io::Result<TransportPair> {
        let writer = UnixStream::connect(paths.incoming()).await?;
        let reader = UnixStream::connect(paths.outgoing()).await?;
        Ok((
            Box::new(StreamSender::new(writer)),
            Box::new(StreamReceiver::new(reader)),
        ))
    }
}

#[cfg(windows)]
mod windows_impl {
    use tokio::{
        net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions},
        sync::Mutex,
    };

    use super::*;

    /// Listening side of a pipe pair.
    #[derive(Debug)]
    pub struct PipeListener {
        instances: Mutex<(NamedPipeServer, NamedPipeServer)>,
        paths: PipePaths,
    }

    impl PipeListener {
        /// Create the first instance of both pipes.
        ///
        /// # Errors
        ///
        /// Returns [`io::ErrorKind::AddrInUse`]-style errors when another
        /// server already owns the pipe names.
        pub async fn bind(paths: &PipePaths) -> io::Result<Self> {
            let incoming = ServerOptions::new()
                .first_pipe_instance(true)
                .create(paths.incoming())?;
            let outgoing = ServerOptions::new()
                .first_pipe_instance(true)
                .create(paths.outgoing())?;
            Ok(Self {
                instances: Mutex::new((incoming, outgoing)),
                paths: paths.clone(),
            })
        }

        /// Wait for a client to connect to both pipes.
        ///
        /// # Errors
        ///
        /// Returns any I/O error raised while connecting or re-creating the
        /// pipe instances.
        pub async fn accept(&self) -> io::Result<TransportPair> {
            let mut instances = self.instances.lock().await;
            instances.0.connect().await?;
            instances.1.connect().await?;
            let next = (
                ServerOptions::new().create(self.paths.incoming())?,
                ServerOptions::new().create(self.paths.outgoing())?,
            );
            let (reader, writer) = std::mem::replace(&mut *instances, next);
            Ok((
                Box::new(StreamSender::new(writer)),
                Box::new(StreamReceiver::new(reader)),
            ))
        }

        /// Paths this listener is bound to.
        #[must_use]
        pub fn paths(&self) -> &PipePaths { &self.paths }
    }

    /// Connect to a listening pipe pair as a client.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while opening the pipes.
    pub async fn connect(paths: &PipePaths) -> io::Result<TransportPair> {
        let writer = ClientOptions::new().open(paths.incoming())?;
        let reader = ClientOptions::new().open(paths.outgoing())?;
        Ok((
            Box::new(StreamSender::new(writer)),
            Box::new(StreamReceiver::new(reader)),
        ))
    }
}

#[cfg(unix)]
pub use unix_impl::{PipeListener, connect};
#[cfg(windows)]
pub use windows_impl::{PipeListener, connect};
