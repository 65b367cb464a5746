use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autoipfs::{
    choose, detect, Backend, BackendKind, ByteSource, DetectOptions, GetOpts, IpfsUri,
};
use clap::{ArgAction, Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon API URL to probe instead of the default
    #[arg(long, value_name = "URL")]
    daemon_url: Option<String>,

    /// web3.storage API token
    #[arg(long, value_name = "TOKEN")]
    web3_storage_token: Option<String>,

    /// Estuary API token
    #[arg(long, value_name = "TOKEN")]
    estuary_token: Option<String>,

    /// Public gateway URL for read-only access
    #[arg(long, value_name = "URL")]
    gateway_url: Option<String>,

    /// Never fall back to a read-only public gateway
    #[arg(long, action = ArgAction::SetTrue)]
    no_readonly: bool,

    /// Probe timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    timeout: u64,

    /// Force a backend kind (daemon, web3.storage, estuary, readonly)
    #[arg(short, long, value_name = "KIND")]
    backend: Option<String>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the environment and list usable backends
    Detect,
    /// Read content and write it to stdout or a file
    Get {
        /// Content URI, e.g. ipfs://<cid>/file.txt
        uri: String,
        /// First byte offset to read
        #[arg(long)]
        start: Option<u64>,
        /// Last byte offset to read (inclusive)
        #[arg(long)]
        end: Option<u64>,
        /// Alternative block encoding, e.g. "car"
        #[arg(long)]
        format: Option<String>,
        /// Write to a file instead of stdout
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Print the size of content in bytes
    Size { uri: String },
    /// Upload a file
    Add {
        path: PathBuf,
        /// Name to address the upload by; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Upload a CAR archive and print one URI per root
    ImportCar { path: PathBuf },
    /// Remove previously uploaded content where the backend supports it
    Rm { uri: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let opts = DetectOptions {
        daemon_url: cli.daemon_url.clone(),
        web3_storage_token: cli.web3_storage_token.clone(),
        estuary_token: cli.estuary_token.clone(),
        gateway_url: cli.gateway_url.clone(),
        readonly: !cli.no_readonly,
        timeout_ms: cli.timeout,
        ..Default::default()
    };
    let kind = cli
        .backend
        .as_deref()
        .map(str::parse::<BackendKind>)
        .transpose()?;

    let detected = detect(&opts).await?;
    if let Commands::Detect = cli.cmd {
        println!("{}", serde_json::to_string_pretty(&detected)?);
        return Ok(());
    }

    let backend = choose(&detected, kind, None).context("no usable backend detected")?;
    tracing::debug!("using the {} backend", backend.kind());

    match cli.cmd {
        Commands::Detect => unreachable!(),
        Commands::Get {
            uri,
            start,
            end,
            format,
            out,
        } => run_get(&*backend, &uri, start, end, format, out).await,
        Commands::Size { uri } => {
            let uri: IpfsUri = uri.parse()?;
            let size = backend.get_size(&uri, None).await?;
            println!("{size}");
            Ok(())
        }
        Commands::Add { path, name } => run_add(&*backend, &path, name).await,
        Commands::ImportCar { path } => {
            let roots = backend.upload_car(file_source(&path).await?, None).await?;
            for root in roots {
                println!("{root}");
            }
            Ok(())
        }
        Commands::Rm { uri } => {
            let uri: IpfsUri = uri.parse()?;
            backend.clear(&uri, None).await?;
            println!("removed {uri}");
            Ok(())
        }
    }
}

async fn run_get(
    backend: &dyn Backend,
    uri: &str,
    start: Option<u64>,
    end: Option<u64>,
    format: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let uri: IpfsUri = uri.parse()?;
    let opts = GetOpts {
        start,
        end,
        format,
        signal: None,
    };
    let mut stream = backend.get(&uri, opts).await?;

    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin> = match &out {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    while let Some(chunk) = stream.next().await {
        writer.write_all(&chunk?).await?;
    }
    writer.flush().await?;
    Ok(())
}

async fn run_add(backend: &dyn Backend, path: &Path, name: Option<String>) -> Result<()> {
    let name = name.or_else(|| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
    });
    let uri = backend
        .upload_file(file_source(path).await?, name.as_deref(), None)
        .await
        .context("upload failed")?;
    println!("{uri}");
    Ok(())
}

async fn file_source(path: &Path) -> Result<ByteSource> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(ByteSource::stream(ReaderStream::new(file)))
}
