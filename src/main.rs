#[tokio::main]
async fn main() {
    lousa::start_server().await;
}
