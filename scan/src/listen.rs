//! A plain TCP receiver of DICOM Part 10 streams.
//!
//! Each peer sends the bytes of one stream and closes the connection.
//! The bytes are saved as they came before being decoded.
use crate::batch::decode_reader;
use crate::report::Summary;
use crate::{
    BindSnafu, CreateDirSnafu, Error, ReceiveSnafu, ReserveFileSnafu, TooLargeSnafu,
    WriteFileSnafu,
};
use dicom_stream_object::OpenFileOptions;
use snafu::{ensure, Report, ResultExt};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// The default bound on the number of bytes accepted from one peer.
pub const DEFAULT_MAX_SIZE: u64 = 1 << 30;

/// Options for receiving streams.
#[derive(Debug, Copy, Clone)]
pub struct ListenOptions {
    /// how to decode each received stream
    pub open: OpenFileOptions,
    /// the maximum number of bytes accepted from one peer
    pub max_size: u64,
}

impl Default for ListenOptions {
    fn default() -> Self {
        ListenOptions {
            open: OpenFileOptions::default(),
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// Bind to the given address and handle incoming connections
/// until the listener fails.
pub fn listen(addr: SocketAddr, out_dir: &Path, options: ListenOptions) -> Result<(), Error> {
    std::fs::create_dir_all(out_dir).with_context(|_| CreateDirSnafu {
        path: out_dir.to_path_buf(),
    })?;
    let listener = TcpListener::bind(addr).context(BindSnafu { addr })?;
    info!("listening on: tcp://{}", addr);
    serve(listener, out_dir, options);
    Ok(())
}

/// Handle each incoming connection on its own thread.
pub fn serve(listener: TcpListener, out_dir: &Path, options: ListenOptions) {
    let mut counter = 0_u64;
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                error!("{}", Report::from_error(e));
                continue;
            }
        };
        // reserved on the accepting thread, so that numbers are never shared
        let (file, out_file) = match reserve_file(out_dir, &mut counter) {
            Ok(reserved) => reserved,
            Err(e) => {
                error!("{}", Report::from_error(e));
                continue;
            }
        };
        std::thread::spawn(move || {
            if let Err(e) = handle_connection(stream, file, &out_file, options) {
                error!("{}", Report::from_error(e));
            }
        });
    }
}

/// Create the next `received-<n>.dcm` file which does not exist yet.
fn reserve_file(out_dir: &Path, counter: &mut u64) -> Result<(File, PathBuf), Error> {
    loop {
        *counter += 1;
        let path = out_dir.join(format!("received-{}.dcm", counter));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).context(ReserveFileSnafu { path }),
        }
    }
}

/// Read everything the peer sends, up to `max_size` bytes.
fn receive<R: Read>(reader: R, max_size: u64, peer: &str) -> Result<Vec<u8>, Error> {
    let mut data = Vec::new();
    reader
        .take(max_size.saturating_add(1))
        .read_to_end(&mut data)
        .context(ReceiveSnafu { peer })?;
    ensure!(
        data.len() as u64 <= max_size,
        TooLargeSnafu {
            peer,
            max: max_size
        }
    );
    Ok(data)
}

fn handle_connection(
    stream: TcpStream,
    mut file: File,
    out_file: &Path,
    options: ListenOptions,
) -> Result<Summary, Error> {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| String::from("unknown peer"));
    info!("New connection from {}", peer);

    let data = match receive(stream, options.max_size, &peer) {
        Ok(data) => data,
        Err(e) => {
            drop(file);
            if let Err(e) = std::fs::remove_file(out_file) {
                warn!("Could not remove {}: {}", out_file.display(), e);
            }
            return Err(e);
        }
    };

    file.write_all(&data)
        .and_then(|_| file.flush())
        .with_context(|_| WriteFileSnafu {
            path: PathBuf::from(out_file),
        })?;
    info!(
        "Received {} bytes from {}, saved to {}",
        data.len(),
        peer,
        out_file.display()
    );

    let (dataset, bytes) = decode_reader(&data[..], options.open)?;
    let summary = Summary::of(&dataset, bytes);
    info!("{}: {}", out_file.display(), summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{receive, reserve_file, serve, ListenOptions};
    use crate::Error;
    use std::io::Write;
    use std::net::{Shutdown, TcpListener, TcpStream};
    use std::time::{Duration, Instant};

    #[test]
    fn saves_received_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().to_path_buf();
        // left from a previous run
        std::fs::write(dir.path().join("received-1.dcm"), b"old").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || serve(listener, &out_dir, ListenOptions::default()));

        // not even a valid stream, saved anyway
        let payload = b"not a DICOM stream".to_vec();
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(&payload).unwrap();
        client.shutdown(Shutdown::Write).unwrap();
        drop(client);

        let expected = dir.path().join("received-2.dcm");
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Ok(contents) = std::fs::read(&expected) {
                if contents == payload {
                    break;
                }
            }
            assert!(Instant::now() < deadline, "file was not saved in time");
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(
            std::fs::read(dir.path().join("received-1.dcm")).unwrap(),
            b"old"
        );
    }

    #[test]
    fn reserved_files_are_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("received-2.dcm"), b"").unwrap();

        let mut counter = 0;
        let (_, first) = reserve_file(dir.path(), &mut counter).unwrap();
        let (_, second) = reserve_file(dir.path(), &mut counter).unwrap();
        assert_eq!(first, dir.path().join("received-1.dcm"));
        assert_eq!(second, dir.path().join("received-3.dcm"));
    }

    #[test]
    fn receive_is_bounded() {
        let data = b"0123456789";
        assert_eq!(receive(&data[..], 10, "peer").unwrap(), data.to_vec());
        assert!(matches!(
            receive(&data[..], 9, "peer"),
            Err(Error::TooLarge { max: 9, .. })
        ));
    }
}
