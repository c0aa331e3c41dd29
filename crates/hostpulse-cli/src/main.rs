//! CLI for hostpulse: periodic host metrics to the console, a broker or an HTTP API.

mod commands;

use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use hostpulse_transports::{http, mqtt};

#[derive(Parser)]
#[command(name = "hostpulse")]
#[command(about = "hostpulse: sample CPU, memory, network, disk and filesystem counters and ship them with deltas")]
#[command(version = hostpulse_core::VERSION)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory to read proc files from
    #[arg(long, default_value = "/proc", global = true)]
    proc_root: String,

    /// Comma-separated filesystem device names to skip (replaces the defaults)
    #[arg(long, value_delimiter = ',', global = true)]
    ignore_fsname: Option<Vec<String>>,

    /// Comma-separated filesystem types to skip (replaces the defaults)
    #[arg(long, value_delimiter = ',', global = true)]
    ignore_fstype: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every reading and delta to stdout
    Console {
        /// Check for new values every SEC seconds
        #[arg(short = 'C', long, default_value = "10")]
        check_interval: u64,
    },

    /// Publish readings as BSON documents to an MQTT broker
    Mqtt {
        /// Client id used in topics; the broker sees "<ID>client"
        #[arg(short, long)]
        client_id: String,

        /// Broker host
        #[arg(short = 'H', long, default_value = mqtt::DEFAULT_HOST)]
        host: String,

        /// Broker port
        #[arg(short = 'P', long, default_value_t = mqtt::DEFAULT_PORT)]
        port: u16,

        /// Keepalive in seconds
        #[arg(long, default_value = "60")]
        keepalive: u64,

        /// Topic pattern with {client_id} and {metric} placeholders
        #[arg(long, default_value = hostpulse_core::topic::DEFAULT_TEMPLATE)]
        topic_template: String,

        /// Check for new values every SEC seconds
        #[arg(short = 'C', long, default_value = "10")]
        check_interval: u64,
    },

    /// Post readings as JSON events to an HTTP API
    Http {
        /// Client id sent as the event item
        #[arg(short, long)]
        client_id: String,

        /// Username to log in with
        #[arg(short, long)]
        username: String,

        /// Password to log in with; prompted for when not given
        #[arg(short, long, env = "HOSTPULSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// API host
        #[arg(short = 'H', long, default_value = http::DEFAULT_HOST)]
        host: String,

        /// API port
        #[arg(short = 'P', long, default_value_t = http::DEFAULT_PORT)]
        port: u16,

        /// Path events are posted to
        #[arg(short, long, default_value = http::DEFAULT_DATA_PATH)]
        endpoint: String,

        /// Path to log in at
        #[arg(short, long, default_value = http::DEFAULT_LOGIN_PATH)]
        login_endpoint: String,

        /// Max retries per event (accepted, not yet used)
        #[arg(short, long, default_value_t = http::DEFAULT_MAX_RETRIES)]
        retries: u32,

        /// Header carrying the session token
        #[arg(long, default_value = http::DEFAULT_SESSION_HEADER)]
        session_header: String,

        /// Topic pattern used as the event type
        #[arg(long, default_value = hostpulse_core::topic::DEFAULT_TEMPLATE)]
        topic_template: String,

        /// Check for new values every SEC seconds
        #[arg(short = 'C', long, default_value = "10")]
        check_interval: u64,
    },

    /// Subscribe to the topics a publisher writes and print what arrives
    Listen {
        /// Client id whose topics to follow
        #[arg(short, long)]
        client_id: String,

        /// Broker host
        #[arg(short = 'H', long, default_value = mqtt::DEFAULT_HOST)]
        host: String,

        /// Broker port
        #[arg(short = 'P', long, default_value_t = mqtt::DEFAULT_PORT)]
        port: u16,

        /// Topic pattern with {client_id} and {metric} placeholders
        #[arg(long, default_value = hostpulse_core::topic::DEFAULT_TEMPLATE)]
        topic_template: String,

        /// Comma-separated metrics to follow (default: all)
        #[arg(long, value_delimiter = ',')]
        metrics: Option<Vec<hostpulse_core::MetricName>>,
    },

    /// Print every reading, wait, then print every delta
    Snapshot {
        /// Seconds between the two samples
        #[arg(long, default_value = "1", value_parser = parse_wait)]
        wait: Duration,
    },

    /// Show host information
    Info,
}

fn parse_wait(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging(cli.global.verbose);
    let sampling = commands::SamplingArgs::from_cli(
        &cli.global.proc_root,
        cli.global.ignore_fsname,
        cli.global.ignore_fstype,
    );

    match cli.command {
        Commands::Console { check_interval } => commands::console::run(&sampling, check_interval),
        Commands::Mqtt {
            client_id,
            host,
            port,
            keepalive,
            topic_template,
            check_interval,
        } => commands::mqtt::run(commands::mqtt::MqttCommandConfig {
            sampling: &sampling,
            client_id,
            host,
            port,
            keepalive,
            topic_template,
            check_interval,
        }),
        Commands::Http {
            client_id,
            username,
            password,
            host,
            port,
            endpoint,
            login_endpoint,
            retries,
            session_header,
            topic_template,
            check_interval,
        } => commands::http::run(commands::http::HttpCommandConfig {
            sampling: &sampling,
            client_id,
            username,
            password,
            host,
            port,
            endpoint,
            login_endpoint,
            retries,
            session_header,
            topic_template,
            check_interval,
        }),
        Commands::Listen {
            client_id,
            host,
            port,
            topic_template,
            metrics,
        } => commands::listen::run(
            client_id,
            host,
            port,
            topic_template,
            metrics.unwrap_or_else(|| hostpulse_core::MetricName::ALL.to_vec()),
        ),
        Commands::Snapshot { wait } => commands::snapshot::run(&sampling, wait),
        Commands::Info => commands::info::run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mqtt_defaults() {
        let cli = Cli::parse_from(["hostpulse", "mqtt", "-c", "abc"]);
        let Commands::Mqtt {
            client_id,
            port,
            keepalive,
            check_interval,
            ..
        } = cli.command
        else {
            panic!("expected mqtt");
        };
        assert_eq!(client_id, "abc");
        assert_eq!(port, 1883);
        assert_eq!(keepalive, 60);
        assert_eq!(check_interval, 10);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "hostpulse",
            "console",
            "-vv",
            "--ignore-fstype",
            "tmpfs,overlay",
        ]);
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(
            cli.global.ignore_fstype,
            Some(vec!["tmpfs".to_string(), "overlay".to_string()])
        );
    }

    #[test]
    fn snapshot_wait_accepts_fractions() {
        let cli = Cli::parse_from(["hostpulse", "snapshot", "--wait", "0.25"]);
        let Commands::Snapshot { wait } = cli.command else {
            panic!("expected snapshot");
        };
        assert_eq!(wait, Duration::from_millis(250));
    }

    #[test]
    fn snapshot_wait_rejects_unrepresentable_values() {
        for bad in ["inf", "-1", "NaN", "1e30", "soon"] {
            assert!(
                Cli::try_parse_from(["hostpulse", "snapshot", "--wait", bad]).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn http_password_is_optional() {
        assert!(Cli::try_parse_from(["hostpulse", "http", "-c", "abc", "-u", "me"]).is_ok());
    }

    #[test]
    fn listen_parses_metric_names() {
        let cli = Cli::parse_from(["hostpulse", "listen", "-c", "abc", "--metrics", "cpu,fs"]);
        let Commands::Listen { metrics, .. } = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(
            metrics,
            Some(vec![
                hostpulse_core::MetricName::Cpu,
                hostpulse_core::MetricName::Fs
            ])
        );
    }
}
