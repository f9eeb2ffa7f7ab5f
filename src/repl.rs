use std::ffi::OsString;

use async_compat::CompatExt;
use rustyline_async::{
    Readline,
    ReadlineError,
};
use structopt::StructOpt;
use tokio::io::AsyncWriteExt;

use runtime::{
    LinkController,
    RetryPolicy,
    State,
    Transport,
};

use crate::{
    options::SendArgs,
    render,
};

#[derive(Debug, structopt::StructOpt)]
#[structopt(setting = structopt::clap::AppSettings::NoBinaryName)]
enum ReplCommand {
    Connect,
    Send(SendArgs),
    Disconnect,
    Emergency(SendArgs),
    Poll(PollAction),
    State,
    #[structopt(alias = "exit")]
    Quit,
}

#[derive(Debug, structopt::StructOpt)]
enum PollAction {
    Start,
    Stop,
}

pub async fn run<T>(mut controller: LinkController<T>) -> eyre::Result<()>
where
    T: Transport + 'static,
{
    let (mut rl, w) = Readline::new("gslink> ".to_owned())?;
    let mut w = w.compat();

    loop {
        w.flush().await?;

        let line = match rl.readline().await {
            Ok(line) => line,

            Err(ReadlineError::Closed) | Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,

            e @ Err(ReadlineError::IO(_)) => e?,
        };

        let words = match shlex::split(&line) {
            Some(x) if x.is_empty() => continue,
            Some(x) => x,
            None => {
                w.write_all(b"failed to split line\n").await?;
                continue;
            },
        };

        let command = match ReplCommand::from_iter_safe(words.into_iter().map(OsString::from)) {
            Ok(c) => c,
            Err(e) => {
                w.write_all(format!("command error: {}\n", e).as_bytes()).await?;
                continue;
            },
        };

        let output = match execute(&mut controller, command).await {
            Ok(Some(output)) => output,
            Ok(None) => break,
            Err(e) => format!("error: {}", e),
        };

        w.write_all(format!("{}\n", output).as_bytes()).await?;
    }

    if controller.state() == State::Uplinking {
        util::trace_catch!(controller.disconnect().await, "disconnecting on exit");
    }

    util::trace_catch!(controller.stop_polling().await, "stopping log poller on exit");

    Ok(())
}

async fn execute<T>(controller: &mut LinkController<T>, command: ReplCommand) -> eyre::Result<Option<String>>
where
    T: Transport + 'static,
{
    let output = match command {
        ReplCommand::Connect => {
            let ack = runtime::connect_with_retry(controller, &RetryPolicy::default()).await?;
            format!("connected: {}", ack)
        },
        ReplCommand::Send(args) => render(&controller.send(&args.commands()?).await?),
        ReplCommand::Disconnect => {
            controller.disconnect().await?;
            "disconnected".to_owned()
        },
        ReplCommand::Emergency(args) => render(&controller.emergency(&args.commands()?).await?),
        ReplCommand::Poll(PollAction::Start) => {
            controller.start_polling().await?;
            "log polling started".to_owned()
        },
        ReplCommand::Poll(PollAction::Stop) => {
            controller.stop_polling().await?;
            "log polling stopped".to_owned()
        },
        ReplCommand::State => controller.state().to_string(),
        ReplCommand::Quit => return Ok(None),
    };

    Ok(Some(output))
}
