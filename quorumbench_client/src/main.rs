//! Quorumbench client executable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use tokio::runtime::Builder;

use quorumbench::{
    logger_init, pf_error, pf_info, BenchClient, BenchError, BenchProtocol,
    RunParams, RunStats,
};

/// Command line arguments definition.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Name of protocol spoken by the servers: abd|fastpath.
    #[arg(short, long)]
    protocol: String,

    /// Run parameters TOML string.
    /// Every '+' is treated as newline.
    #[arg(long, default_value_t = String::from(""))]
    params: String,

    /// Run parameters TOML file; takes precedence over `--params`.
    #[arg(long)]
    params_file: Option<PathBuf>,

    /// Server address 'ip:port' to connect to.
    #[arg(short, long)]
    server: SocketAddr,

    /// Client ID; seeds the workload and staggers startup.
    #[arg(short, long, default_value_t = 0)]
    id: u64,

    /// Directory to create output files in.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Number of tokio worker threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,
}

impl CliArgs {
    /// Sanitize command line arguments, return `Ok(protocol)` on success
    /// or `Err(BenchError)` on any error.
    fn sanitize(&self) -> Result<BenchProtocol, BenchError> {
        if self.threads < 2 {
            Err(BenchError::msg(format!(
                "invalid number of threads {}",
                self.threads
            )))
        } else {
            BenchProtocol::parse_name(&self.protocol).ok_or(BenchError::msg(
                format!("protocol name '{}' unrecognized", self.protocol),
            ))
        }
    }

    /// Loads run parameters from the file if given, else from the string.
    fn load_params(&mut self) -> Result<RunParams, BenchError> {
        if let Some(path) = &self.params_file {
            return RunParams::from_config_file(path);
        }
        let params_str = if self.params.is_empty() {
            None
        } else {
            self.params = self.params.replace('+', "\n");
            Some(&self.params[..])
        };
        RunParams::from_config_str(params_str)
    }
}

/// Actual main function of the client executable.
fn client_main() -> Result<(), BenchError> {
    // read in and parse command line arguments
    let mut args = CliArgs::parse();
    let protocol = args.sanitize()?;
    let params = Arc::new(args.load_params()?);

    // create tokio multi-threaded runtime
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .worker_threads(args.threads)
        .thread_name("tokio-worker-client")
        .build()?;

    // enter tokio runtime, connect to the server, and do work
    runtime.block_on(async move {
        let client =
            BenchClient::new(args.id, params.clone(), protocol, args.server)
                .with_output_dir(&args.output_dir);
        let summary = client.run().await?;

        let stats = RunStats::aggregate(&summary, params.duration_s);
        println!("{}", stats);

        if params.dump_latency {
            let path = client.latency_file_path();
            RunStats::write_latency_file(&summary, &path)?;
            pf_info!(args.id; "dumped {} latencies to {}",
                              summary.lat_array.len(), path.display());
        }

        Ok::<(), BenchError>(()) // give type hint for this async closure
    })
}

/// Main function of the client executable.
fn main() -> ExitCode {
    logger_init();

    if let Err(ref e) = client_main() {
        pf_error!("c"; "client_main exitted: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
