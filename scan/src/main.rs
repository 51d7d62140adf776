//! A CLI tool for decoding DICOM Part 10 element streams,
//! either from files on disk or from peers over plain TCP.
use clap::{Parser, Subcommand};
use snafu::{Report, ResultExt, Snafu, Whatever};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

mod batch;
mod discover;
mod listen;
mod report;

use batch::{decode_all, BatchOptions};
use listen::ListenOptions;
use dicom_stream_object::{OpenFileOptions, ReadPreamble};

/// Decode DICOM Part 10 element streams
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// Verbose mode
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode files and directories of files
    Scan {
        /// The files or directories to decode
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Decode every file found in directories,
        /// not only those ending in `.dcm`
        #[arg(long = "all-files")]
        all_files: bool,
        /// Print the element tree of each data set
        #[arg(long)]
        dump: bool,
        /// The number of files to decode at the same time
        /// (default is one per core)
        #[arg(short = 'j', long = "jobs")]
        jobs: Option<usize>,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Receive streams over TCP, save them and decode them
    Listen {
        /// Which port to listen on
        #[arg(short, long, default_value = "11112")]
        port: u16,
        /// Which address to listen on
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        host: IpAddr,
        /// Output directory for incoming streams
        #[arg(short = 'o', long = "out-dir", default_value = ".")]
        out_dir: PathBuf,
        /// The maximum number of bytes accepted from one peer
        #[arg(long = "max-size", default_value_t = listen::DEFAULT_MAX_SIZE)]
        max_size: u64,
        #[command(flatten)]
        read: ReadArgs,
    },
}

/// Options on how each stream is read
#[derive(Debug, clap::Args)]
struct ReadArgs {
    /// The maximum number of nested sequences admitted
    #[arg(long = "max-depth", default_value = "64")]
    max_depth: usize,
    /// Require the 128-byte preamble to be filled with zeros
    #[arg(long = "strict-preamble", conflicts_with = "no_preamble")]
    strict_preamble: bool,
    /// Assume that the stream starts at the first element,
    /// without preamble nor magic code
    #[arg(long = "no-preamble")]
    no_preamble: bool,
}

impl ReadArgs {
    fn to_options(&self) -> OpenFileOptions {
        let read_preamble = if self.no_preamble {
            ReadPreamble::Never
        } else {
            ReadPreamble::Always
        };
        OpenFileOptions::new()
            .read_preamble(read_preamble)
            .strict_preamble(self.strict_preamble)
            .max_depth(self.max_depth)
    }
}

/// An error which may occur while scanning or receiving streams.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Could not open file {}", path.display()))]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not decode data set"))]
    Decode { source: dicom_stream_object::Error },
    #[snafu(display("Could not create output directory {}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not listen on {}", addr))]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[snafu(display("Could not receive data from {}", peer))]
    Receive {
        peer: String,
        source: std::io::Error,
    },
    #[snafu(display("Peer {} sent more than {} bytes", peer, max))]
    TooLarge { peer: String, max: u64 },
    #[snafu(display("Could not create file {}", path.display()))]
    ReserveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Could not write file {}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn main() {
    let app = App::parse();

    let level = if app.verbose { "debug" } else { "info" };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if app.verbose {
                Level::DEBUG
            } else {
                Level::INFO
            })
            .with_env_filter(
                ["dicom_scan", "dicom_stream_object", "dicom_stream_parser"]
                    .into_iter()
                    .filter_map(|target| format!("{}={}", target, level).parse::<Directive>().ok())
                    .fold(EnvFilter::from_default_env(), EnvFilter::add_directive),
            )
            .with_writer(std::io::stderr)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    match run(app) {
        Ok(failures) => std::process::exit(failures),
        Err(e) => {
            error!("{}", Report::from_error(e));
            std::process::exit(-2);
        }
    }
}

/// Run the requested command,
/// returning the number of files which could not be decoded.
fn run(app: App) -> Result<i32, Whatever> {
    match app.command {
        Command::Scan {
            paths,
            all_files,
            dump,
            jobs,
            read,
        } => {
            let files = discover::collect_files(paths, all_files);
            if files.is_empty() {
                warn!("No files to decode");
                return Ok(0);
            }
            let options = BatchOptions {
                open: read.to_options(),
                dump,
            };

            let outcomes = match jobs {
                Some(jobs) => rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build()
                    .whatever_context("Could not set up worker threads")?
                    .install(|| decode_all(&files, options)),
                None => decode_all(&files, options),
            };

            let mut failures = 0;
            for outcome in outcomes {
                match outcome.result {
                    Ok(decoded) => {
                        info!("{}: {}", outcome.path.display(), decoded.summary);
                        if let Some(dump) = decoded.dump {
                            println!("{}:", outcome.path.display());
                            print!("{}", dump);
                        }
                    }
                    Err(e) => {
                        error!("{}: {}", outcome.path.display(), Report::from_error(e));
                        failures += 1;
                    }
                }
            }
            Ok(failures)
        }
        Command::Listen {
            port,
            host,
            out_dir,
            max_size,
            read,
        } => {
            let options = ListenOptions {
                open: read.to_options(),
                max_size,
            };
            listen::listen(SocketAddr::new(host, port), &out_dir, options)
                .whatever_context("Listener failed")?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{App, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }

    #[test]
    fn listen_defaults() {
        let app = App::try_parse_from(["dicom-scan", "listen"]).unwrap();
        match app.command {
            Command::Listen {
                port,
                host,
                out_dir,
                max_size,
                read,
            } => {
                assert_eq!(port, 11112);
                assert_eq!(max_size, 1 << 30);
                assert_eq!(host.to_string(), "0.0.0.0");
                assert_eq!(out_dir.to_str(), Some("."));
                assert_eq!(read.max_depth, 64);
            }
            c => panic!("unexpected command {:?}", c),
        }
    }

    #[test]
    fn listen_max_size() {
        let app =
            App::try_parse_from(["dicom-scan", "listen", "--max-size", "4096"]).unwrap();
        match app.command {
            Command::Listen { max_size, .. } => assert_eq!(max_size, 4096),
            c => panic!("unexpected command {:?}", c),
        }
    }

    #[test]
    fn preamble_flags_conflict() {
        assert!(App::try_parse_from([
            "dicom-scan",
            "scan",
            "--strict-preamble",
            "--no-preamble",
            "a.dcm"
        ])
        .is_err());
    }
}
