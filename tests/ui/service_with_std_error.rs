use keel_rpc::prelude::*;

#[keel_rpc::service]
pub trait Files {
    async fn read(path: String) -> Result<Vec<u8>, std::io::Error>;
}

struct FilesImpl;

impl Files for FilesImpl {
    async fn read(&self, _: Context, path: String) -> Result<Vec<u8>, std::io::Error> {
        std::fs::read(path)
    }
}

fn main() {
    let server = Server::new(ServerOptions::new().transport(InProcess), &PluginCatalog::new());
    FilesImpl.register(&server).unwrap();
}
