use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tonic::transport::Channel;
use tracing_subscriber::EnvFilter;

use dispatchd::config::{RetryPolicy, SchedulerConfig};
use dispatchd::node::SchedulerNode;
use dispatchd::proto::driver_scheduler_client::DriverSchedulerClient;
use dispatchd::proto::{
    DriverInfo, GetDriverStatusRequest, GetSchedulerStateRequest, KillDriverRequest,
    SubmitDriverRequest,
};

#[derive(Parser, Debug)]
#[command(name = "dispatchd")]
#[command(version)]
#[command(about = "A cluster-mode driver submission scheduler")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the scheduler server
    Server(ServerArgs),

    /// Driver management commands
    Driver {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: DriverCommands,
    },

    /// Show the scheduler's lifecycle collections
    State {
        #[command(flatten)]
        client: ClientArgs,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Address to listen on for gRPC
    #[arg(long, default_value = "127.0.0.1:7077")]
    listen: SocketAddr,

    /// Directory for durable submission records. Without it the scheduler
    /// runs with the no-durability black-hole engine.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Prefix for generated submission ids
    #[arg(long, default_value = "driver")]
    submission_prefix: String,

    /// Retry budget for supervised drivers
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Backoff before the first supervised retry, in milliseconds
    #[arg(long, default_value = "1000")]
    retry_backoff_ms: u64,

    /// How many terminated drivers to retain for status queries
    #[arg(long, default_value = "200")]
    retained_drivers: usize,
}

// =============================================================================
// Client Arguments (shared by driver and state commands)
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Server address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:7077")]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Driver Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum DriverCommands {
    /// Submit a new driver to the cluster
    Submit {
        /// Application name
        #[arg(long)]
        app_name: String,

        /// Main entry point (binary or main class)
        #[arg(long)]
        entrypoint: String,

        /// Requested memory in MB
        #[arg(long, default_value = "1024")]
        memory_mb: u64,

        /// Requested core count
        #[arg(long, default_value = "1")]
        cores: u32,

        /// Resubmit automatically on non-user failure
        #[arg(long)]
        supervise: bool,

        /// Environment variable (KEY=VALUE, repeatable)
        #[arg(long = "env", value_parser = parse_key_val)]
        environment: Vec<(String, String)>,

        /// Classpath entry (repeatable)
        #[arg(long = "classpath")]
        classpath_entries: Vec<String>,

        /// Library path entry (repeatable)
        #[arg(long = "library-path")]
        library_path_entries: Vec<String>,

        /// Scheduler property (KEY=VALUE, repeatable)
        #[arg(long = "property", value_parser = parse_key_val)]
        properties: Vec<(String, String)>,

        /// Arguments passed to the driver entry point
        #[arg(trailing_var_arg = true)]
        arguments: Vec<String>,
    },
    /// Kill a queued or launched driver
    Kill {
        /// The submission id
        submission_id: String,
    },
    /// Get status of a specific submission
    Status {
        /// The submission id
        submission_id: String,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct SubmitOutput {
    success: bool,
    submission_id: String,
    message: String,
}

#[derive(Serialize)]
struct KillOutput {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct StatusOutput {
    found: bool,
    submission_id: String,
    status: String,
    retry_count: u32,
    last_failure: String,
    submitted_at_ms: i64,
}

#[derive(Serialize)]
struct DriverListItem {
    submission_id: String,
    app_name: String,
    status: String,
    retry_count: u32,
    submitted_at_ms: i64,
}

#[derive(Serialize)]
struct StateOutput {
    ready: bool,
    queued: Vec<DriverListItem>,
    launched: Vec<DriverListItem>,
    retrying: Vec<DriverListItem>,
    terminal: Vec<DriverListItem>,
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = SchedulerConfig::new(args.listen).with_retry(RetryPolicy {
        max_retries: args.max_retries,
        initial_backoff_ms: args.retry_backoff_ms,
        ..RetryPolicy::default()
    });
    config.submission_prefix = args.submission_prefix;
    config.retained_drivers = args.retained_drivers;
    if let Some(dir) = args.state_dir {
        config = config.with_state_dir(dir);
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        persistence = ?config.persistence,
        max_retries = config.retry.max_retries,
        "Starting dispatchd"
    );

    SchedulerNode::new(config).run().await
}

// =============================================================================
// Client Command Handlers
// =============================================================================

async fn connect(args: &ClientArgs) -> Result<DriverSchedulerClient<Channel>, Box<dyn std::error::Error>> {
    Ok(DriverSchedulerClient::connect(args.addr.clone()).await?)
}

async fn handle_driver_command(
    client_args: ClientArgs,
    command: DriverCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect(&client_args).await?;

    match command {
        DriverCommands::Submit {
            app_name,
            entrypoint,
            memory_mb,
            cores,
            supervise,
            environment,
            classpath_entries,
            library_path_entries,
            properties,
            arguments,
        } => {
            let resp = client
                .submit_driver(SubmitDriverRequest {
                    app_name,
                    entrypoint,
                    arguments,
                    environment: environment.into_iter().collect(),
                    classpath_entries,
                    library_path_entries,
                    memory_mb,
                    cores,
                    supervise,
                    properties: properties.into_iter().collect(),
                })
                .await?
                .into_inner();

            match client_args.output {
                OutputFormat::Json => {
                    let output = SubmitOutput {
                        success: resp.success,
                        submission_id: resp.submission_id,
                        message: resp.message,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Table => {
                    if resp.success {
                        println!("Driver submitted successfully!");
                        println!("Submission ID: {}", resp.submission_id);
                    } else {
                        println!("Submission failed: {}", resp.message);
                    }
                }
            }
        }
        DriverCommands::Kill { submission_id } => {
            let resp = client
                .kill_driver(KillDriverRequest { submission_id })
                .await?
                .into_inner();

            match client_args.output {
                OutputFormat::Json => {
                    let output = KillOutput {
                        success: resp.success,
                        message: resp.message,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Table => {
                    if resp.success {
                        println!("Kill accepted: {}", resp.message);
                    } else {
                        println!("Kill failed: {}", resp.message);
                    }
                }
            }
        }
        DriverCommands::Status { submission_id } => {
            let resp = client
                .get_driver_status(GetDriverStatusRequest { submission_id })
                .await?
                .into_inner();

            match client_args.output {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        found: resp.found,
                        submission_id: resp.submission_id,
                        status: resp.status,
                        retry_count: resp.retry_count,
                        last_failure: resp.last_failure,
                        submitted_at_ms: resp.submitted_at_ms,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Table => {
                    if !resp.found {
                        println!("Driver not found: {}", resp.submission_id);
                    } else {
                        println!("Submission ID: {}", resp.submission_id);
                        println!("Status: {}", resp.status);
                        println!("Retries: {}", resp.retry_count);
                        if !resp.last_failure.is_empty() {
                            println!("Last failure: {}", resp.last_failure);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn list_item(info: &DriverInfo) -> DriverListItem {
    DriverListItem {
        submission_id: info.submission_id.clone(),
        app_name: info.app_name.clone(),
        status: info.status.clone(),
        retry_count: info.retry_count,
        submitted_at_ms: info.submitted_at_ms,
    }
}

fn print_section(title: &str, drivers: &[DriverInfo]) {
    println!("{} ({}):", title, drivers.len());
    for driver in drivers {
        println!(
            "  {:<44} {:<10} retries={} {}",
            driver.submission_id, driver.status, driver.retry_count, driver.app_name
        );
    }
}

async fn handle_state_command(client_args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect(&client_args).await?;
    let resp = client
        .get_scheduler_state(GetSchedulerStateRequest {})
        .await?
        .into_inner();

    match client_args.output {
        OutputFormat::Json => {
            let output = StateOutput {
                ready: resp.ready,
                queued: resp.queued.iter().map(list_item).collect(),
                launched: resp.launched.iter().map(list_item).collect(),
                retrying: resp.retrying.iter().map(list_item).collect(),
                terminal: resp.terminal.iter().map(list_item).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("Ready: {}", resp.ready);
            print_section("Queued", &resp.queued);
            print_section("Launched", &resp.launched);
            print_section("Retrying", &resp.retrying);
            print_section("Terminal", &resp.terminal);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await,
        Commands::Driver { client, command } => handle_driver_command(client, command).await,
        Commands::State { client } => handle_state_command(client).await,
    }
}
