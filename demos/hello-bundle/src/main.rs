use hello_bundle::HelloServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lambdagate_adapter_aws::run::<HelloServer>().await
}
