mod accessory;
mod api;
mod cache;
mod client;
mod gateway;
mod host;
#[cfg(test)]
mod mock;
mod mqtt;
mod platform;
mod sync;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
