use keel_rpc::prelude::*;
use keel_rpc::server::{ServerState, HTTP_SERVICE_NAME};
use keel_rpc::service::PayloadDecoder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct Echo;

impl ServiceObject for Echo {
    fn methods(set: &mut MethodSet<Self>) {
        set.method("Say", |_: Arc<Self>, _: Context, msg: String| async move {
            HandlerResult::Ok(msg)
        });
    }
}

fn new_server() -> Server {
    Server::new(ServerOptions::new().transport(InProcess), &PluginCatalog::new())
}

async fn wait_for(server: &Server, state: ServerState) {
    for _ in 0..100 {
        if server.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never reached {state:?}, still {:?}", server.state());
}

#[test]
fn states_only_move_forward() {
    let server = new_server();
    assert_eq!(server.state(), ServerState::Created);

    server.register_service("Echo", Echo).unwrap();
    assert_eq!(server.state(), ServerState::Registered);

    server.register_service("Echo", Echo).unwrap();
    assert_eq!(server.state(), ServerState::Registered);
}

#[tokio::test]
async fn serve_runs_until_shutdown_then_closes() {
    let server = new_server();
    server.register_service("Echo", Echo).unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let serving = tokio::spawn({
        let server = server.clone();
        async move { server.serve_with_shutdown(rx).await }
    });
    wait_for(&server, ServerState::Serving).await;

    let reply = server
        .dispatch(Context::new("Echo", "Say"), &mut PayloadDecoder::new(r#""up""#))
        .await
        .unwrap();
    assert_eq!(reply.downcast_ref::<String>().unwrap(), "up");

    tx.send(()).unwrap();
    serving.await.unwrap().unwrap();
    assert_eq!(server.state(), ServerState::Closed);
}

#[tokio::test]
async fn serve_returns_when_closed_elsewhere() {
    let server = new_server();
    server.register_service("Echo", Echo).unwrap();

    let serving = tokio::spawn({
        let server = server.clone();
        async move { server.serve_with_shutdown(futures::future::pending::<()>()).await }
    });
    wait_for(&server, ServerState::Serving).await;

    server.close().await;

    serving.await.unwrap().unwrap();
    assert_eq!(server.state(), ServerState::Closed);
}

#[tokio::test]
async fn serving_twice_is_rejected() {
    let server = new_server();
    let serving = tokio::spawn({
        let server = server.clone();
        async move { server.serve_with_shutdown(futures::future::pending::<()>()).await }
    });
    wait_for(&server, ServerState::Serving).await;

    let err = server.serve_with_shutdown(async {}).await.unwrap_err();

    assert!(matches!(err, ServeError::InvalidState(ServerState::Serving)));
    server.close().await;
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn closed_servers_cannot_serve() {
    let server = new_server();
    server.close().await;

    let err = server.serve_with_shutdown(async {}).await.unwrap_err();

    assert!(matches!(err, ServeError::InvalidState(ServerState::Closed)));
}

#[tokio::test]
async fn close_is_idempotent() {
    let server = new_server();
    server.register_service("Echo", Echo).unwrap();

    tokio::join!(server.close(), server.close());
    server.close().await;

    assert_eq!(server.state(), ServerState::Closed);
}

#[tokio::test]
async fn serve_http_installs_the_sentinel_service() {
    let server = new_server();
    server.register_service("Echo", Echo).unwrap();

    let serving = tokio::spawn({
        let server = server.clone();
        async move { server.serve_http().await }
    });
    wait_for(&server, ServerState::Serving).await;

    assert_eq!(server.service_name(), HTTP_SERVICE_NAME);
    assert!(server.method_names().is_empty());
    let err = server
        .dispatch(Context::new(HTTP_SERVICE_NAME, "Say"), &mut PayloadDecoder::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::NotFound { .. }));

    server.close().await;
    serving.await.unwrap().unwrap();
}

#[test]
fn config_is_loaded_from_json() {
    let config = ServerConfig::from_json(
        r#"{
            "address": "0.0.0.0:9000",
            "plugin_names": ["memory"],
            "shutdown_timeout_ms": 250
        }"#,
    )
    .unwrap();

    let server = Server::new(
        ServerOptions::new().config(config).transport(InProcess),
        &PluginCatalog::new(),
    );

    assert_eq!(server.config().address, "0.0.0.0:9000");
    assert_eq!(server.config().plugin_names, ["memory"]);
    assert_eq!(server.config().shutdown_timeout, Duration::from_millis(250));
    assert_eq!(server.config().tracing_span_name, "keel-rpc");
    assert!(server.plugin_names().is_empty());
}
