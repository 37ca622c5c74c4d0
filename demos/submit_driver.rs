use clap::Parser;
use dispatchd::proto::driver_scheduler_client::DriverSchedulerClient;
use dispatchd::proto::{
    GetDriverStatusRequest, GetSchedulerStateRequest, KillDriverRequest, SubmitDriverRequest,
};

#[derive(Parser, Debug)]
#[command(name = "submit-driver")]
#[command(about = "CLI client for the dispatchd scheduler")]
struct Args {
    /// Server address
    #[arg(long, default_value = "http://127.0.0.1:7077")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Submit a new driver
    Submit {
        /// Application name
        #[arg(long, default_value = "demo-app")]
        app_name: String,

        /// Main entry point
        #[arg(long)]
        entrypoint: String,
    },
    /// Get status of a submission
    Status {
        /// The submission id
        #[arg(long)]
        submission_id: String,
    },
    /// Kill a submission
    Kill {
        /// The submission id
        #[arg(long)]
        submission_id: String,
    },
    /// Show all lifecycle collections
    State,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut client = DriverSchedulerClient::connect(args.addr.clone()).await?;

    match args.command {
        Commands::Submit {
            app_name,
            entrypoint,
        } => {
            let response = client
                .submit_driver(SubmitDriverRequest {
                    app_name,
                    entrypoint,
                    memory_mb: 512,
                    cores: 1,
                    ..Default::default()
                })
                .await?
                .into_inner();

            if response.success {
                println!("Driver submitted successfully!");
                println!("Submission ID: {}", response.submission_id);
            } else {
                println!("Submission failed: {}", response.message);
            }
        }
        Commands::Status { submission_id } => {
            let response = client
                .get_driver_status(GetDriverStatusRequest { submission_id })
                .await?
                .into_inner();

            if response.found {
                println!("Submission ID: {}", response.submission_id);
                println!("Status: {}", response.status);
                println!("Retries: {}", response.retry_count);
                if !response.last_failure.is_empty() {
                    println!("Last failure: {}", response.last_failure);
                }
            } else {
                println!("Driver not found: {}", response.submission_id);
            }
        }
        Commands::Kill { submission_id } => {
            let response = client
                .kill_driver(KillDriverRequest { submission_id })
                .await?
                .into_inner();

            println!(
                "{}: {}",
                if response.success { "OK" } else { "FAILED" },
                response.message
            );
        }
        Commands::State => {
            let response = client
                .get_scheduler_state(GetSchedulerStateRequest {})
                .await?
                .into_inner();

            println!("Ready: {}", response.ready);
            println!("{:<44} {:<10} {}", "SUBMISSION ID", "STATUS", "APP");
            println!("{}", "-".repeat(70));
            for driver in response
                .queued
                .iter()
                .chain(&response.launched)
                .chain(&response.retrying)
                .chain(&response.terminal)
            {
                println!(
                    "{:<44} {:<10} {}",
                    driver.submission_id, driver.status, driver.app_name
                );
            }
        }
    }

    Ok(())
}
