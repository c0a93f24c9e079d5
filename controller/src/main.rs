mod alarm;
mod api;
mod climate;
mod door;
mod hardware;
mod host;
mod site;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
