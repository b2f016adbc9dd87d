use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zevbit_flywheel::config::lambda::{LambdaConfig, S3Storage};
use zevbit_flywheel::utils::{logger, validation::Validate};
use zevbit_flywheel::{Flywheel, SignalType};

#[derive(Deserialize)]
pub struct Request {
    pub signal_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub signal_id: String,
    pub object_key: Option<String>,
    pub triggers: usize,
}

async fn function_handler(
    flywheel: Arc<Flywheel<S3Storage>>,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    let signal_type: SignalType = event.payload.signal_type.parse()?;
    tracing::info!("Capturing {} signal", signal_type);

    let receipt = flywheel
        .capture()
        .capture_manual_signal(signal_type, event.payload.data)
        .await?;
    // Lambda 實例隨時可能被回收，批次模式下立即送出
    flywheel.shutdown().await?;

    Ok(Response {
        message: "Signal captured".to_string(),
        signal_id: receipt.signal.id.to_string(),
        object_key: receipt.object_key,
        triggers: receipt.triggers.len(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    let lambda_config = LambdaConfig::from_env()?;
    lambda_config.validate()?;

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .region(Region::new(lambda_config.s3_region.clone()))
        .build();
    let s3_client = S3Client::from_conf(s3_config);

    let storage = S3Storage::new(s3_client, lambda_config.s3_bucket.clone());
    let flywheel = Arc::new(Flywheel::new(storage, lambda_config.flywheel)?);

    run(service_fn(move |event: LambdaEvent<Request>| {
        let flywheel = flywheel.clone();
        async move { function_handler(flywheel, event).await }
    }))
    .await
}
