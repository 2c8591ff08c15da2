//! End-to-end dispatch tests against the in-process core: admission,
//! lifecycle ordering, argument binding, and failure isolation.

use std::sync::Arc;

use wsgate::admission::{Admission, UpgradeGate};
use wsgate::dispatch::{Connection, EventPayload, EventRouter, EventRouterBuilder, Transport};
use wsgate::endpoint::{HandlerSpec, MethodDecl, ParamSpec, Role, ScalarType};

mod common;
use common::RecordingTransport;

/// Handler that narrates its lifecycle onto the transport.
#[derive(Default)]
struct Narrator;

fn narrator_spec() -> HandlerSpec {
    HandlerSpec::new("Narrator", Narrator::default)
        .method(
            MethodDecl::new("on_open")
                .role(Role::OnOpen)
                .param(ParamSpec::session())
                .handler::<Narrator, _>(|_, args| {
                    args.session(0)?.send_text("open")?;
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_message")
                .role(Role::OnMessage)
                .param(ParamSpec::session())
                .param(ParamSpec::text())
                .handler::<Narrator, _>(|_, args| {
                    let text = args.text(1)?;
                    if text == "boom" {
                        return Err("handler exploded".into());
                    }
                    args.session(0)?.send_text(&format!("echo:{text}"))?;
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_error")
                .role(Role::OnError)
                .param(ParamSpec::session())
                .param(ParamSpec::error())
                .handler::<Narrator, _>(|_, args| {
                    args.session(0)?
                        .send_text(&format!("error:{}", args.error(1)?))?;
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_event")
                .role(Role::OnEvent)
                .param(ParamSpec::session())
                .param(ParamSpec::event())
                .handler::<Narrator, _>(|_, args| {
                    if let Some(event) = args.event(1)? {
                        args.session(0)?.send_text(&format!("event:{}", event.label()))?;
                    }
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_close")
                .role(Role::OnClose)
                .param(ParamSpec::session())
                .handler::<Narrator, _>(|_, args| {
                    args.session(0)?.send_text("close")?;
                    Ok(())
                }),
        )
}

fn narrator_router() -> Arc<EventRouter> {
    let mut builder = EventRouterBuilder::new();
    builder.register("/narrate", &narrator_spec()).unwrap();
    Arc::new(builder.build())
}

fn admit_and_open(router: &Arc<EventRouter>, conn: &Connection, path: &str) -> String {
    let gate = UpgradeGate::new(Arc::clone(router));
    let req = common::upgrade_request(path);
    match gate.admit(conn, &req) {
        Admission::Accept(accepted) => {
            router.do_on_open(conn, &req, &accepted.pattern);
            accepted.pattern
        }
        other => panic!("admission failed: {other:?}"),
    }
}

#[test]
fn lifecycle_events_arrive_in_order() {
    let router = narrator_router();
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());

    admit_and_open(&router, &conn, "/narrate");
    router.do_on_message(&conn, "hi");
    router.do_on_event(&conn, &EventPayload::ReaderIdle);
    router.do_on_close(&conn);

    assert_eq!(transport.sent(), ["open", "echo:hi", "event:reader-idle", "close"]);
}

#[test]
fn handler_failure_does_not_poison_the_connection() {
    let router = narrator_router();
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());

    admit_and_open(&router, &conn, "/narrate");
    router.do_on_message(&conn, "boom");
    router.do_on_message(&conn, "ping");

    assert_eq!(transport.sent(), ["open", "echo:ping"]);
    assert!(transport.is_active());
}

#[test]
fn errors_reach_the_error_method() {
    let router = narrator_router();
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());

    admit_and_open(&router, &conn, "/narrate");
    let error: Arc<dyn std::error::Error + Send + Sync> =
        Arc::new(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer vanished"));
    router.do_on_error(&conn, &error);

    assert_eq!(transport.sent(), ["open", "error:peer vanished"]);
}

#[test]
fn close_is_terminal_and_idempotent() {
    let router = narrator_router();
    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());

    admit_and_open(&router, &conn, "/narrate");
    router.do_on_close(&conn);
    router.do_on_close(&conn);
    router.do_on_message(&conn, "late");
    router.do_on_event(&conn, &EventPayload::AllIdle);

    assert_eq!(transport.sent(), ["open", "close"]);
    assert_eq!(router.online(), 0);
}

#[test]
fn online_counter_tracks_open_connections() {
    let router = narrator_router();
    let first = Connection::new(Arc::new(RecordingTransport::default()));
    let second = Connection::new(Arc::new(RecordingTransport::default()));

    admit_and_open(&router, &first, "/narrate");
    admit_and_open(&router, &second, "/narrate");
    assert_eq!(router.online(), 2);

    router.do_on_close(&first);
    assert_eq!(router.online(), 1);
    router.do_on_close(&second);
    assert_eq!(router.online(), 0);
}

#[test]
fn path_variables_bind_from_the_template() {
    #[derive(Default)]
    struct Greeter;
    let spec = HandlerSpec::new("Greeter", Greeter::default).method(
        MethodDecl::new("on_open")
            .role(Role::OnOpen)
            .param(ParamSpec::session())
            .param(ParamSpec::path_param("room").with_default("lobby"))
            .handler::<Greeter, _>(|_, args| {
                let room = args.str_opt(1)?.unwrap_or("none").to_owned();
                args.session(0)?.send_text(&format!("room={room}"))?;
                Ok(())
            }),
    );
    let mut builder = EventRouterBuilder::new();
    builder.register("/chat/{room}", &spec).unwrap();
    let router = Arc::new(builder.build());

    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());
    let pattern = admit_and_open(&router, &conn, "/chat/ops");

    assert_eq!(pattern, "/chat/{room}");
    assert_eq!(transport.sent(), ["room=ops"]);
}

#[test]
fn missing_path_parameter_falls_back_to_its_default() {
    #[derive(Default)]
    struct Greeter;
    let spec = HandlerSpec::new("Greeter", Greeter::default).method(
        MethodDecl::new("on_open")
            .role(Role::OnOpen)
            .param(ParamSpec::session())
            .param(ParamSpec::path_param("room").with_default("lobby"))
            .handler::<Greeter, _>(|_, args| {
                let room = args.str_opt(1)?.unwrap_or("none").to_owned();
                args.session(0)?.send_text(&format!("room={room}"))?;
                Ok(())
            }),
    );
    let mut builder = EventRouterBuilder::new();
    builder.register("/join", &spec).unwrap();
    let router = Arc::new(builder.build());

    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());
    admit_and_open(&router, &conn, "/join");

    assert_eq!(transport.sent(), ["room=lobby"]);
}

#[test]
fn typed_query_parameter_binds_on_open() {
    #[derive(Default)]
    struct Counter;
    let spec = HandlerSpec::new("Counter", Counter::default).method(
        MethodDecl::new("on_open")
            .role(Role::OnOpen)
            .param(ParamSpec::session())
            .param(ParamSpec::path_param("limit").typed(ScalarType::I64))
            .handler::<Counter, _>(|_, args| {
                let limit = args.int_opt(1)?.unwrap_or(-1);
                args.session(0)?.send_text(&format!("limit={limit}"))?;
                Ok(())
            }),
    );
    let mut builder = EventRouterBuilder::new();
    builder.register("/feed", &spec).unwrap();
    let router = Arc::new(builder.build());

    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());
    admit_and_open(&router, &conn, "/feed?limit=42");

    assert_eq!(transport.sent(), ["limit=42"]);
}

#[test]
fn binary_frames_dispatch_to_the_binary_method() {
    #[derive(Default)]
    struct Mirror;
    let spec = HandlerSpec::new("Mirror", Mirror::default)
        .method(
            MethodDecl::new("on_open")
                .role(Role::OnOpen)
                .param(ParamSpec::session())
                .handler::<Mirror, _>(|_, _| Ok(())),
        )
        .method(
            MethodDecl::new("on_binary")
                .role(Role::OnBinary)
                .param(ParamSpec::session())
                .param(ParamSpec::binary())
                .handler::<Mirror, _>(|_, args| {
                    args.session(0)?.send_binary(args.binary(1)?.clone())?;
                    Ok(())
                }),
        );
    let mut builder = EventRouterBuilder::new();
    builder.register("/mirror", &spec).unwrap();
    let router = Arc::new(builder.build());

    let transport = Arc::new(RecordingTransport::default());
    let conn = Connection::new(transport.clone());
    admit_and_open(&router, &conn, "/mirror");
    router.do_on_binary(&conn, &bytes::Bytes::from_static(b"\x01\x02\x03"));

    assert_eq!(transport.sent(), ["bin:3"]);
}

#[test]
fn per_connection_state_is_isolated() {
    #[derive(Default)]
    struct Tally {
        seen: u64,
    }
    let spec = HandlerSpec::new("Tally", Tally::default)
        .method(
            MethodDecl::new("on_open")
                .role(Role::OnOpen)
                .param(ParamSpec::session())
                .handler::<Tally, _>(|_, _| Ok(())),
        )
        .method(
            MethodDecl::new("on_message")
                .role(Role::OnMessage)
                .param(ParamSpec::session())
                .param(ParamSpec::text())
                .handler::<Tally, _>(|state, args| {
                    state.seen += 1;
                    args.session(0)?.send_text(&format!("seen={}", state.seen))?;
                    Ok(())
                }),
        );
    let mut builder = EventRouterBuilder::new();
    builder.register("/tally", &spec).unwrap();
    let router = Arc::new(builder.build());

    let first_transport = Arc::new(RecordingTransport::default());
    let first = Connection::new(first_transport.clone());
    let second_transport = Arc::new(RecordingTransport::default());
    let second = Connection::new(second_transport.clone());

    admit_and_open(&router, &first, "/tally");
    admit_and_open(&router, &second, "/tally");

    router.do_on_message(&first, "a");
    router.do_on_message(&first, "b");
    router.do_on_message(&second, "x");

    assert_eq!(first_transport.sent(), ["seen=1", "seen=2"]);
    assert_eq!(second_transport.sent(), ["seen=1"]);
}
