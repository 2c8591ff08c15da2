//! Demo server binary.
//!
//! Registers two endpoints and serves them:
//! - `/echo` answers every text and binary frame
//! - `/chat/{room}` greets by room name, with a query-parameter fallback

use std::path::PathBuf;

use clap::Parser;

use wsgate::config::{load_config, EndpointConfig, ServerConfig};
use wsgate::endpoint::{HandlerSpec, MethodDecl, ParamSpec, Role};
use wsgate::server::{self, EndpointRegistry};

#[derive(Parser, Debug)]
#[command(name = "wsgate", about = "WebSocket endpoint server")]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Default)]
struct EchoServer {
    frames: u64,
}

fn echo_spec() -> HandlerSpec {
    HandlerSpec::new("EchoServer", EchoServer::default)
        .method(
            MethodDecl::new("on_open")
                .role(Role::OnOpen)
                .param(ParamSpec::session())
                .param(ParamSpec::headers())
                .handler::<EchoServer, _>(|_, args| {
                    let agent = args
                        .headers(1)?
                        .get("user-agent")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown")
                        .to_owned();
                    tracing::info!(agent, "echo client connected");
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_message")
                .role(Role::OnMessage)
                .param(ParamSpec::session())
                .param(ParamSpec::text())
                .handler::<EchoServer, _>(|state, args| {
                    state.frames += 1;
                    let reply = format!("echo[{}]: {}", state.frames, args.text(1)?);
                    args.session(0)?.send_text(&reply)?;
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_binary")
                .role(Role::OnBinary)
                .param(ParamSpec::session())
                .param(ParamSpec::binary())
                .handler::<EchoServer, _>(|state, args| {
                    state.frames += 1;
                    args.session(0)?.send_binary(args.binary(1)?.clone())?;
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_error")
                .role(Role::OnError)
                .param(ParamSpec::session())
                .param(ParamSpec::error())
                .handler::<EchoServer, _>(|_, args| {
                    tracing::warn!(error = %args.error(1)?, "echo connection errored");
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_event")
                .role(Role::OnEvent)
                .param(ParamSpec::session())
                .param(ParamSpec::event())
                .handler::<EchoServer, _>(|_, args| {
                    if let Some(event) = args.event(1)? {
                        tracing::info!(event = event.label(), "echo connection idle");
                    }
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_close")
                .role(Role::OnClose)
                .param(ParamSpec::session())
                .handler::<EchoServer, _>(|state, _| {
                    tracing::info!(frames = state.frames, "echo client disconnected");
                    Ok(())
                }),
        )
}

#[derive(Default)]
struct ChatRoom {
    room: String,
}

fn chat_spec() -> HandlerSpec {
    HandlerSpec::new("ChatRoom", ChatRoom::default)
        .method(
            MethodDecl::new("on_open")
                .role(Role::OnOpen)
                .param(ParamSpec::session())
                .param(ParamSpec::path_param("room").with_default("lobby"))
                .handler::<ChatRoom, _>(|state, args| {
                    state.room = args.str_opt(1)?.unwrap_or("lobby").to_owned();
                    args.session(0)?
                        .send_text(&format!("welcome to {}", state.room))?;
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_message")
                .role(Role::OnMessage)
                .param(ParamSpec::session())
                .param(ParamSpec::text())
                .handler::<ChatRoom, _>(|state, args| {
                    let line = format!("[{}] {}", state.room, args.text(1)?);
                    args.session(0)?.send_text(&line)?;
                    Ok(())
                }),
        )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    wsgate::observability::init();

    tracing::info!("wsgate v0.1.0 starting");

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    // The blocking pool is shared; size it for the largest worker-pool ask.
    let pool_threads = config
        .endpoints
        .iter()
        .filter(|e| e.use_worker_pool)
        .map(|e| e.worker_pool_threads)
        .max();

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(threads) = pool_threads {
        runtime.max_blocking_threads(threads);
    }
    runtime.build()?.block_on(run(config))
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = config.endpoints.first().cloned().unwrap_or_default();

    tracing::info!(
        host = %endpoint.host,
        port = endpoint.port,
        max_frame_payload = endpoint.max_frame_payload,
        use_worker_pool = endpoint.use_worker_pool,
        "Configuration loaded"
    );

    let mut registry = EndpointRegistry::new();
    registry.register(&endpoint, "/echo", &echo_spec())?;
    registry.register(&endpoint, "/chat/{room}", &chat_spec())?;
    if config.endpoints.len() > 1 {
        register_extra_listeners(&mut registry, &config.endpoints[1..])?;
    }

    let mut tasks = Vec::new();
    for group in registry.build() {
        tasks.push(tokio::spawn(server::serve(group)));
    }
    for task in tasks {
        task.await??;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Additional configured listeners each get their own echo endpoint.
fn register_extra_listeners(
    registry: &mut EndpointRegistry,
    endpoints: &[EndpointConfig],
) -> Result<(), Box<dyn std::error::Error>> {
    for endpoint in endpoints {
        registry.register(endpoint, "/echo", &echo_spec())?;
    }
    Ok(())
}
