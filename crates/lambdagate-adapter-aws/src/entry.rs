use std::future::Future;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use anyhow::{anyhow, Context as _};
use lambda_runtime::LambdaEvent;
use lambdagate_core::config::ServerConfig;
use lambdagate_core::middleware::{Pipeline, RequestLogger};
use lambdagate_core::server::{FrameworkServer, ServerCell};
use tower_layer::Layer;
use tower_service::Service;

use crate::logging::init_logger;
use crate::options::ShimOptions;
use crate::profile::{AwsFunctionUrl, ProviderProfile};
use crate::settings::{AdapterSettings, SettingsLoader};
use crate::shim::Shim;
use crate::trace::{InvocationTraceLayer, TraceAnnotation, TracingMode};

static SERVER: ServerCell = ServerCell::new();

/// Directory holding the running executable, which is where the bundle is unpacked.
pub fn bundle_root() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable {} has no parent directory", exe.display()))
}

/// Construct the framework server in `cell` and compose the entry service around it.
pub fn bootstrap<S>(
    cell: &ServerCell,
    bundle_root: &Path,
    settings: &AdapterSettings,
) -> anyhow::Result<LambdaEntry>
where
    S: FrameworkServer,
{
    let ready = cell.get_or_try_init::<S, _>(|| ServerConfig::load(bundle_root))?;

    let mut pipeline = Pipeline::new(Arc::clone(&ready.handler));
    if settings.tracing.mode == TracingMode::Annotate {
        pipeline = pipeline.with(TraceAnnotation);
    }
    let pipeline = pipeline.with(RequestLogger);

    let options = ShimOptions::function_url().with_binary(settings.binary_policy());
    Ok(LambdaEntry::new(Shim::new(Arc::new(pipeline), options)))
}

/// Serve the framework server `S` from the bundle next to the running executable.
pub async fn run<S>() -> anyhow::Result<()>
where
    S: FrameworkServer,
{
    let root = bundle_root()?;
    run_with_root::<S>(&root).await
}

/// Load settings, install logging and construct the framework server from `bundle_root`.
///
/// Everything that can fail at startup happens here, before the first event is polled.
pub fn prepare<S>(bundle_root: &Path) -> anyhow::Result<(AdapterSettings, LambdaEntry)>
where
    S: FrameworkServer,
{
    let settings = SettingsLoader::load_or_default(bundle_root)?.into_settings();
    init_logger(&settings.logging);

    let entry = bootstrap::<S>(&SERVER, bundle_root, &settings).map_err(|err| {
        tracing::error!("failed to start framework server: {:#}", err);
        err
    })?;
    Ok((settings, entry))
}

/// Serve the framework server `S` from `bundle_root`.
pub async fn run_with_root<S>(bundle_root: &Path) -> anyhow::Result<()>
where
    S: FrameworkServer,
{
    let (settings, entry) = prepare::<S>(bundle_root)?;

    tracing::info!(
        "serving {} invocations tracing={:?}",
        AwsFunctionUrl::NAME,
        settings.tracing.mode
    );
    let result = match settings.tracing.mode {
        TracingMode::Decorate => lambda_runtime::run(InvocationTraceLayer::new().layer(entry)).await,
        TracingMode::Annotate | TracingMode::Off => lambda_runtime::run(entry).await,
    };
    result.map_err(|err| anyhow!(err))
}

/// Tower service handed to the Lambda runtime.
pub struct LambdaEntry<P = AwsFunctionUrl> {
    shim: Arc<Shim<P>>,
    _profile: PhantomData<fn() -> P>,
}

impl<P: ProviderProfile> LambdaEntry<P> {
    pub fn new(shim: Shim<P>) -> Self {
        Self {
            shim: Arc::new(shim),
            _profile: PhantomData,
        }
    }

    pub fn shim(&self) -> &Shim<P> {
        &self.shim
    }
}

impl<P> Clone for LambdaEntry<P> {
    fn clone(&self) -> Self {
        Self {
            shim: Arc::clone(&self.shim),
            _profile: PhantomData,
        }
    }
}

impl<P: ProviderProfile> Service<LambdaEvent<P::Event>> for LambdaEntry<P> {
    type Response = P::Output;
    type Error = lambda_runtime::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: LambdaEvent<P::Event>) -> Self::Future {
        let shim = Arc::clone(&self.shim);
        Box::pin(async move {
            let LambdaEvent { payload, context } = event;
            shim.dispatch(payload, &context).await.map_err(|err| {
                tracing::error!("failed to adapt invocation {}: {}", context.request_id, err);
                lambda_runtime::Error::from(err)
            })
        })
    }
}
