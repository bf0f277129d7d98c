//! Ask command - one-shot question to an assistant.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use console::Style;

use yuanqi_client::{
    CancellationToken, Chat, ChatType, Error, FileUrl, Message, Role, Session, StreamState,
};
use yuanqi_config::YuanqiConfig;

use super::Context;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question or prompt to send
    #[arg(required = true)]
    pub prompt: String,

    /// Print the reply as it is generated
    #[arg(short, long)]
    pub stream: bool,

    /// Attach a file by URL
    #[arg(long)]
    pub file_url: Option<String>,

    /// Kind of the attached file (e.g. image)
    #[arg(long, requires = "file_url")]
    pub file_type: Option<String>,

    /// Which assistant build to talk to: published or preview
    #[arg(long)]
    pub chat_type: Option<String>,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config();
    config.validate()?;

    let chat_type = args
        .chat_type
        .as_deref()
        .or(config.chat_type.as_deref())
        .map(str::parse::<ChatType>)
        .transpose()?
        .unwrap_or_default();

    let chat = build_chat(config)?;
    let session = chat
        .session()
        .with_chat_type(chat_type)
        .with_stream(args.stream)
        .add_message(question(&args));

    if ctx.verbose {
        let dim = Style::new().dim();
        eprintln!("{}", dim.apply_to(format!("Sending to: {}", session.endpoint())));
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "Assistant: {} ({})",
                session.assistant_id(),
                session.chat_type()
            ))
        );
        eprintln!();
    }

    // Ctrl-C aborts the in-flight request instead of killing the process
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handler_token.cancel();
        }
    });

    if args.stream {
        print_stream(session, &cancel, ctx).await
    } else {
        print_complete(session, &cancel, ctx).await
    }
}

/// Build a chat from resolved configuration.
fn build_chat(config: &YuanqiConfig) -> Result<Chat> {
    let mut builder = Chat::builder()
        .assistant_id(config.assistant_id.clone().unwrap_or_default())
        .user_id(config.user_id.clone().unwrap_or_default())
        .token(config.token.clone().unwrap_or_default());

    if let Some(version) = &config.version {
        builder = builder.version(version.clone());
    }
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }

    Ok(builder.build()?)
}

/// The user message: the prompt, followed by the attachment if one was given.
fn question(args: &AskArgs) -> Message {
    let mut builder = Message::builder(Role::User).text(args.prompt.clone());
    if let Some(url) = &args.file_url {
        let mut file = FileUrl::new(url.clone());
        if let Some(kind) = &args.file_type {
            file = file.with_kind(kind.clone());
        }
        builder = builder.file_url(file);
    }
    builder.build()
}

async fn print_complete(session: Session, cancel: &CancellationToken, ctx: &Context) -> Result<()> {
    let response = match session.request(cancel).await {
        Ok(response) => response,
        Err(e) => return Err(report(e)),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.text());

    if ctx.verbose {
        let dim = Style::new().dim();
        if let Some(reason) = response.finish_reason() {
            eprintln!("{}", dim.apply_to(format!("[finish: {}]", reason.as_str())));
        }
        let usage = response.usage;
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "[tokens: {} prompt + {} completion = {}]",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            ))
        );
    }

    Ok(())
}

async fn print_stream(session: Session, cancel: &CancellationToken, ctx: &Context) -> Result<()> {
    let mut stream = session.stream_request(cancel);

    // Track if we've printed anything (for final newline)
    let mut has_output = false;

    while let Some(event) = stream.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                if has_output {
                    println!();
                }
                return Err(report(e));
            }
        };

        if ctx.json_output {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }

        let text = event.text();
        if !text.is_empty() {
            print!("{}", text);
            std::io::stdout().flush()?;
            has_output = true;
        }
    }

    if has_output {
        println!();
    }

    tracing::debug!(state = ?stream.state(), "Stream closed");
    if stream.state() != StreamState::Completed {
        anyhow::bail!("stream ended in state {:?}", stream.state());
    }
    Ok(())
}

/// Print a client error in red and hand it back for the exit status.
fn report(err: Error) -> anyhow::Error {
    let red = Style::new().red();
    eprintln!("{} {}", red.apply_to("Error:"), err);

    if let Error::Status(response) = &err {
        let body = response.body_text();
        if !body.trim().is_empty() {
            eprintln!("{}", Style::new().dim().apply_to(body.trim()));
        }
        if err.is_auth_error() {
            eprintln!("Check the token (--token or YUANQI_TOKEN).");
        }
    } else if matches!(err, Error::Cancelled) {
        eprintln!("Interrupted.");
    }

    err.into()
}
