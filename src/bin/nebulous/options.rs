use nebulous::library::helpers::parse_seconds;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(about = "Request and response over message queues.")]
pub struct MainOptions {
    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "info",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,

    /// Format of log output
    ///
    /// Formats: text, compact, json
    #[structopt(long, global = true, default_value = "text", value_name = "format")]
    pub log_format: LogFormat,

    /// Configuration file containing connection details and targets
    #[structopt(
        short,
        long,
        global = true,
        env = "NEBULOUS_CONFIG",
        default_value = "nebulous.yaml",
        parse(from_os_str)
    )]
    pub config: PathBuf,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug)]
pub enum LogFormat {
    Text,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format {}", s)),
        }
    }
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Send a request to a target and print the response
    Request(RequestOptions),
    /// Log every message arriving on a queue
    Listen(QueueOptions),
    /// Answer every request on a queue with its own content
    Echo(QueueOptions),
}

#[derive(Debug, StructOpt)]
pub struct RequestOptions {
    /// Name of the target as defined in the configuration
    pub target: String,

    /// Verb of the request
    pub verb: String,

    /// Parameters of the request
    #[structopt(short, long)]
    pub parameters: Option<String>,

    /// Description of the request
    #[structopt(short, long)]
    pub description: Option<String>,

    /// Seconds to wait for a reply, overrides the configured timeout
    #[structopt(short, long, parse(try_from_str = parse_seconds), value_name = "seconds")]
    pub timeout: Option<Duration>,

    /// Always perform a round trip and leave the cache untouched
    #[structopt(long)]
    pub no_cache: bool,
}

#[derive(Debug, StructOpt)]
pub struct QueueOptions {
    /// Queue to subscribe to
    pub queue: String,
}
