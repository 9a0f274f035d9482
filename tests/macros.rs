use keel_rpc::prelude::*;
use keel_rpc::service::PayloadDecoder;
use std::sync::atomic::{AtomicU64, Ordering};

// Should compile
#[keel_rpc::service]
trait MyService {
    async fn my_handler(input: String) -> HandlerResult<String>;

    async fn unit_output(input: u64) -> HandlerResult<()>;

    async fn std_result(input: String) -> Result<(), std::io::Error>;

    async fn std_result_with_handler_error(input: String) -> Result<(), HandlerError>;
}

#[keel_rpc::service]
#[name = "myRenamedService"]
trait MyRenamedService {
    #[name = "myRenamedHandler"]
    async fn my_handler(input: String) -> HandlerResult<String>;
}

struct MyRenamedServiceImpl;

impl MyRenamedService for MyRenamedServiceImpl {
    async fn my_handler(&self, ctx: Context, input: String) -> HandlerResult<String> {
        Ok(format!("{input} via {}", ctx.method_name()))
    }
}

#[test]
fn renamed_service_handler() {
    let desc = MyRenamedServiceImpl::service_desc();

    assert_eq!(desc.service_name(), "myRenamedService");
    assert_eq!(desc.methods()[0].name(), "myRenamedHandler");
    assert_eq!(
        desc.handler_type().name(),
        std::any::type_name::<MyRenamedServiceImpl>()
    );
}

#[tokio::test]
async fn generated_services_dispatch() {
    let server = Server::new(ServerOptions::new().transport(InProcess), &PluginCatalog::new());
    MyRenamedServiceImpl.register(&server).unwrap();

    let reply = server
        .dispatch(
            Context::new("myRenamedService", "myRenamedHandler"),
            &mut PayloadDecoder::new(r#""hello""#),
        )
        .await
        .unwrap();

    assert_eq!(server.service_name(), "myRenamedService");
    assert_eq!(
        reply.downcast_ref::<String>().unwrap(),
        "hello via myRenamedHandler"
    );
}

#[keel_rpc::service]
trait Counter {
    async fn add(by: u64) -> HandlerResult<u64>;

    async fn get(input: ()) -> HandlerResult<u64>;
}

#[derive(Default)]
struct CounterImpl {
    value: AtomicU64,
}

impl Counter for CounterImpl {
    async fn add(&self, _: Context, by: u64) -> HandlerResult<u64> {
        Ok(self.value.fetch_add(by, Ordering::SeqCst) + by)
    }

    async fn get(&self, _: Context, _: ()) -> HandlerResult<u64> {
        Ok(self.value.load(Ordering::SeqCst))
    }
}

#[tokio::test]
async fn generated_services_share_one_instance() {
    let server = Server::new(ServerOptions::new().transport(InProcess), &PluginCatalog::new());
    CounterImpl::default().register(&server).unwrap();

    for by in ["2", "3"] {
        server
            .dispatch(Context::new("Counter", "add"), &mut PayloadDecoder::new(by))
            .await
            .unwrap();
    }
    let total = server
        .dispatch(Context::new("Counter", "get"), &mut PayloadDecoder::default())
        .await
        .unwrap();

    assert_eq!(total.downcast_ref::<u64>(), Some(&5));
    assert_eq!(server.method_names(), ["add", "get"]);
}

#[test]
fn descriptors_reject_foreign_instances() {
    let server = Server::new(ServerOptions::new().transport(InProcess), &PluginCatalog::new());

    let err = server
        .register(
            MyRenamedServiceImpl::service_desc(),
            std::sync::Arc::new(CounterImpl::default()),
        )
        .unwrap_err();

    assert!(matches!(err, RegistrationError::CapabilityMismatch { .. }));
}
