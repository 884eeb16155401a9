use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use chrono::{Duration, Local, Timelike};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use quickaway::{EcobeeClient, Engine, Error, PingProbe, Result};

#[derive(Parser)]
#[command(name = "quickaway")]
#[command(about = "Switch ecobee thermostats between home and away based on sensed occupancy")]
#[command(version)]
struct Cli {
    /// Authorize this application to access your thermostats. Use this the
    /// first time you run the application.
    #[arg(long)]
    install: bool,

    /// Also ping these network addresses to check for presence.
    #[arg(long, value_name = "ADDR", num_args = 1..)]
    ping: Vec<String>,

    /// Token file path.
    #[arg(long, default_value = "ecobee-tokens.json")]
    tokens: String,

    /// Append an NDJSON trace of outbound API calls to this file.
    #[arg(long, value_name = "PATH")]
    api_log: Option<String>,

    /// Run this many minutes and then exit. If omitted, run forever.
    minutes: Option<i64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut builder = EcobeeClient::builder(cli.tokens.as_str());
    if let Some(path) = &cli.api_log {
        builder = builder.api_log(path.as_str());
    }
    let mut client = builder.build()?;

    if cli.install {
        return install(&mut client).await;
    }

    if !cli.ping.is_empty() {
        info!(addrs = ?cli.ping, "also pinging addresses to check for presence");
    }
    let deadline = cli.minutes.map(|m| Local::now() + Duration::minutes(m));
    if let Some(end) = deadline {
        info!("run until {}", end.format("%Y-%m-%d %H:%M:%S"));
    }

    let mut engine = Engine::new(client, PingProbe::default(), cli.ping);

    loop {
        match engine.run_cycle().await {
            Ok(report) => {
                if report.changed > 0 {
                    info!(
                        changed = report.changed,
                        holds = report.holds,
                        failed = report.failed,
                        "cycle complete"
                    );
                }
            }
            // Without a refresh token every future cycle fails the same way.
            Err(Error::NotAuthorized) => return Err(Error::NotAuthorized),
            Err(e) => error!(error = %e, "cycle failed"),
        }
        if let Some(end) = deadline
            && Local::now() > end
        {
            break;
        }
        let pause = 60 - u64::from(Local::now().second());
        tokio::time::sleep(std::time::Duration::from_secs(pause)).await;
    }
    Ok(())
}

async fn install(client: &mut EcobeeClient) -> Result<()> {
    let challenge = client.request_pin().await?;
    println!("Please log onto the ecobee web portal, select the menu item in");
    println!("the top right (3 lines), and select MY APPS.");
    println!("Next, click Add Application and enter the following");
    println!("authorization code: {}", challenge.pin);
    println!("Then follow the prompts to add the application.");
    println!("You have {} minutes.", challenge.expires_in);
    println!();
    print!("Hit enter when done: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    client.complete_install(&challenge.code).await?;
    println!("Installation is complete. Now run this program without --install");
    println!("to control your thermostats.");
    Ok(())
}
