use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use nebulous::domain::{
    Config, MessageContent, Request, RequestProcessor, Responder, Response, SharedCache,
};
use nebulous::library::cache::RedisCache;
use nebulous::library::communication::implementation::redis::RedisBrokerFactory;
use nebulous::library::communication::{InboundMessage, MessageConsumer, TransportHandler};
use nebulous::library::{BoxedError, EmptyResult};
use options::{Command, LogFormat, QueueOptions, RequestOptions};
use std::sync::Arc;
use structopt::StructOpt;
use tracing::{info, warn};

mod options;

type Transport = Arc<TransportHandler<RedisBrokerFactory>>;

#[tokio::main]
async fn main() -> Result<()> {
    let (command, config) = init()?;
    let transport = transport(&config)?;

    match command {
        Command::Request(options) => request(&config, transport.clone(), options).await?,
        Command::Listen(options) => serve(transport.clone(), options, MessageLogger).await?,
        Command::Echo(options) => {
            let responder = Responder::new(transport.clone(), EchoProcessor);
            serve(transport.clone(), options, responder).await?
        }
    };

    transport.disconnect().await?;

    Ok(())
}

fn init() -> Result<(Command, Config)> {
    let options = options::MainOptions::from_args();

    let formatter = tracing_subscriber::fmt().with_env_filter(options.log);

    match options.log_format {
        LogFormat::Text => formatter.init(),
        LogFormat::Compact => formatter.compact().init(),
        LogFormat::Json => formatter.json().init(),
    };

    info!("nebulous {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&options.config)
        .with_context(|| format!("unable to load {}", options.config.display()))?;

    Ok((options.command, config))
}

fn transport(config: &Config) -> Result<Transport> {
    let handler = match config.broker_url() {
        Some(url) => TransportHandler::new(RedisBrokerFactory::new(url).map_err(|e| anyhow!(e))?),
        None => {
            warn!("No broker configured, messages will not be sent");
            TransportHandler::disabled()
        }
    };

    Ok(Arc::new(handler))
}

async fn request(config: &Config, transport: Transport, options: RequestOptions) -> Result<()> {
    let content = MessageContent {
        verb: options.verb,
        parameters: options.parameters,
        description: options.description,
    };

    let mut request = Request::new(config, &options.target, content, transport)?;

    let response = if options.no_cache {
        request.send_no_cache(options.timeout).await?
    } else {
        if let Some(url) = config.cache_url() {
            let cache: SharedCache = Arc::new(RedisCache::new(url).map_err(|e| anyhow!(e))?);
            request = request.with_cache(cache);
        }

        request.send(options.timeout, None).await?
    };

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

async fn serve<C>(transport: Transport, options: QueueOptions, consumer: C) -> Result<()>
where
    C: MessageConsumer + Send + Sync + 'static,
{
    let listener = match transport.listen(&options.queue, consumer).await? {
        Some(listener) => listener,
        None => bail!("no broker configured"),
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    listener.stop().await;

    Ok(())
}

struct MessageLogger;

#[async_trait]
impl MessageConsumer for MessageLogger {
    async fn consume(&self, message: InboundMessage) -> EmptyResult {
        let response = Response::from_transport_message(&message);

        info!(
            headers = ?response.headers,
            verb = ?response.verb,
            parameters = ?response.parameters,
            description = ?response.description,
            "{}",
            response.body
        );

        Ok(())
    }
}

struct EchoProcessor;

#[async_trait]
impl RequestProcessor for EchoProcessor {
    async fn process(&self, request: &Response) -> Result<Option<MessageContent>, BoxedError> {
        Ok(MessageContent::from_response(request))
    }
}
