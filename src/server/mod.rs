//! HTTP/JSON surface of the sampler.

use crate::config::{Config, SamplerSettings};
use crate::error::{Error, Result};
use crate::gibbs::{derive, plot_data, sample, validate, HistogramGrid, ValidationOutcome};
use crate::symbolic::{Engine, SymbolicEngine};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;

pub mod catalogue;
pub mod protocol;

use catalogue::ExampleCatalogue;
use protocol::{DensityRequest, ErrorResponse, SampleRequest, SampleResponse, Samples};

pub const BANNER: &str = "Gibbs Sampler API v2.0 - Analytic method";

/// Shared handler state. The generator is the only mutable piece; each
/// request seeds its own generator from it, so concurrent requests never
/// interleave draws.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    engine: Engine,
    rng: Arc<Mutex<StdRng>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let rng = match config.sampler.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            engine: Engine::with_limits(config.limits()),
            config: Arc::new(config),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn request_seed(&self, requested: Option<u64>) -> u64 {
        requested.unwrap_or_else(|| self.rng.lock().gen())
    }

    /// Run CPU-bound work on the blocking pool under the configured timeout.
    async fn run_blocking<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(Engine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine;
        let task = tokio::task::spawn_blocking(move || job(engine));
        match tokio::time::timeout(self.config.timeout(), task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_error)) => Err(Error::Task(join_error.to_string())),
            Err(_) => Err(Error::Timeout(self.config.derivation.timeout_ms)),
        }
    }
}

/// Maps crate errors onto HTTP responses: caller mistakes become 422.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/validate", post(validate_density))
        .route("/sample", post(sample_density))
        .route("/examples", get(list_examples))
        .with_state(state)
}

/// Bind the configured address and serve until the process stops.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;
    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gibbs sampler listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": BANNER }))
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn validate_density(
    State(state): State<AppState>,
    Json(request): Json<DensityRequest>,
) -> std::result::Result<Json<ValidationOutcome>, ApiError> {
    request.check(&state.config.sampler)?;
    let spec = request.spec();
    let outcome = match state.run_blocking(move |engine| validate(&engine, &spec)).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("Validation of '{}' aborted: {}", request.expression, err);
            ValidationOutcome::failure(format!("Error during validation: {}", err))
        }
    };
    Ok(Json(outcome))
}

pub async fn sample_density(
    State(state): State<AppState>,
    Json(request): Json<SampleRequest>,
) -> std::result::Result<Json<SampleResponse>, ApiError> {
    let settings = state.config.sampler.clone();
    request.check(&settings)?;
    let seed = state.request_seed(request.seed);
    info!(
        "Sampling '{}' (seed {})",
        request.density.expression, seed
    );

    let job_request = request.clone();
    let response = state
        .run_blocking(move |engine| {
            let mut rng = StdRng::seed_from_u64(seed);
            sample_response(&engine, &job_request, &settings, &mut rng)
        })
        .await;

    Ok(Json(match response {
        Ok(mut response) => {
            if response.success {
                response.seed = Some(seed);
            }
            response
        }
        Err(err) => {
            warn!("Sampling '{}' aborted: {}", request.density.expression, err);
            SampleResponse::failed(err)
        }
    }))
}

pub async fn list_examples() -> Json<ExampleCatalogue> {
    Json(catalogue::examples())
}

/// Validate, derive, sample and bin one request synchronously.
pub fn sample_response<E, R>(
    engine: &E,
    request: &SampleRequest,
    settings: &SamplerSettings,
    rng: &mut R,
) -> SampleResponse
where
    E: SymbolicEngine + ?Sized,
    R: Rng + ?Sized,
{
    let spec = request.density.spec();
    let derivation = derive(engine, &spec);
    let validation = ValidationOutcome::from_derivation(&derivation);
    let model = match derivation.model {
        Some(model) if validation.is_valid => model,
        _ => return SampleResponse::rejected(validation),
    };

    let (trace, statistics) = match sample(
        engine,
        &model,
        request.start(),
        request.n_samples(settings),
        request.burn_in(settings),
        rng,
    ) {
        Ok(result) => result,
        Err(err) => return SampleResponse::failed(err),
    };

    let grid = HistogramGrid::from_samples(
        &trace.x,
        &trace.y,
        &spec.x_bounds,
        &spec.y_bounds,
        settings.histogram_bins,
    );
    let plot = plot_data(&trace, &grid);

    SampleResponse {
        success: true,
        validation,
        execution_time: Some(statistics.execution_time),
        statistics: Some(statistics),
        samples: Some(Samples {
            x: trace.x,
            y: trace.y,
        }),
        plot_data: Some(plot),
        seed: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_api_error_status() {
        let response = ApiError(Error::InvalidRequest("bad".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let response = ApiError(Error::Timeout(5)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_sample_response_for_invalid_density() {
        let request = SampleRequest::new(DensityRequest::new("x*z", (0.0, 1.0), (0.0, 1.0)));
        let mut rng = StdRng::seed_from_u64(0);
        let settings = SamplerSettings::default();
        let response = sample_response(&Engine::new(), &request, &settings, &mut rng);
        assert!(!response.success);
        assert!(response.samples.is_none());
        assert_eq!(response.validation.errors[0], "Disallowed symbols: ['z']");
    }

    #[test]
    fn test_seeded_requests_are_reproducible() {
        let state = AppState::new(Config::default());
        assert_eq!(state.request_seed(Some(9)), 9);

        let mut request = SampleRequest::new(DensityRequest::new("4*x*y", (0.1, 0.9), (0.1, 0.9)));
        request.n_samples = Some(50);
        request.burn_in = Some(10);
        let settings = SamplerSettings::default();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            sample_response(&Engine::new(), &request, &settings, &mut rng).samples
        };
        assert_eq!(run(11), run(11));
        assert_eq!(run(11).map(|s| s.x.len()), Some(50));
    }
}
