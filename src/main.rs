use std::sync::Arc;

use eyre::{
    Result,
    WrapErr,
};
use structopt::StructOpt as _;

use runtime::{
    BlockReply,
    CommsPipeline,
    LinkController,
    LinkSession,
    LogSink,
    RetryPolicy,
    SerialTransport,
    State,
};
use util::build;

pub use crate::options::Options;

mod command;
mod options;
mod repl;
mod trace;

use options::Command;

fn render(replies: &[BlockReply]) -> String {
    replies
        .iter()
        .enumerate()
        .map(|(i, reply)| format!("block {}: {}", i, reply))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn open_link(options: &Options) -> Result<LinkController<SerialTransport>> {
    let config = options.link_config();

    let sink = LogSink::open(&options.log_file)
        .await
        .wrap_err_with(|| format!("opening log file {}", options.log_file.display()))?;

    let transport = SerialTransport::open(options.port()?, config.baud, config.read_timeout)?;
    let pipeline = Arc::new(CommsPipeline::new(&config)?);
    let session = LinkSession::new(pipeline, config).with_sink(sink);

    Ok(LinkController::new(transport, session))
}

fn list_ports() -> Result<()> {
    for port in tokio_serial::available_ports()? {
        println!("{}\t{:?}", port.port_name, port.port_type);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    util::bootstrap!("starting {}", util::banner());

    let options: Options = Options::from_args();

    trace::init(options.verbose);

    tracing::info!(
        application = build::PACKAGE,
        version = build::VERSION,
        build_commit = build::COMMIT_HASH,
        built_at = build::BUILD_TIMESTAMP,
        using_rustc = build::RUSTC_COMMIT_HASH,
        "tracing subsystem initialized"
    );

    let retry = RetryPolicy::default();

    match &options.command {
        Command::ListPorts => list_ports()?,

        Command::Connect => {
            let mut link = open_link(&options).await?;
            let ack = runtime::connect_with_retry(&mut link, &retry).await?;

            println!("connected: {}", ack);
        },

        Command::Send(args) => {
            let commands = args.commands()?;
            let mut link = open_link(&options).await?;

            runtime::connect_with_retry(&mut link, &retry).await?;
            let replies = link.send(&commands).await;

            if link.state() == State::Uplinking {
                util::trace_catch!(link.disconnect().await, "disconnecting after uplink");
            }

            println!("{}", render(&replies?));
        },

        Command::Disconnect => {
            let mut link = open_link(&options).await?;

            runtime::connect_with_retry(&mut link, &retry).await?;
            link.disconnect().await?;

            println!("disconnected");
        },

        Command::Emergency(args) => {
            let commands = args.commands()?;
            let mut link = open_link(&options).await?;

            println!("{}", render(&link.emergency(&commands).await?));
        },

        Command::Poll => {
            let mut link = open_link(&options).await?;
            link.start_polling().await?;

            tracing::info!(log_file = %options.log_file.display(), "polling until interrupted");
            tokio::signal::ctrl_c().await?;

            link.stop_polling().await?;
        },

        Command::Repl => repl::run(open_link(&options).await?).await?,
    }

    Ok(())
}
