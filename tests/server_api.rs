use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use densim::server::protocol::{DensityRequest, SampleRequest};
use densim::server::{
    health_check, list_examples, root, router, sample_density, validate_density, AppState, BANNER,
};
use densim::Config;
use pretty_assertions::assert_eq;

fn state() -> AppState {
    let mut config = Config::default();
    config.sampler.seed = Some(1);
    AppState::new(config)
}

#[tokio::test]
async fn banner_and_health() {
    let Json(banner) = root().await;
    assert_eq!(banner["message"], BANNER);
    assert_eq!(health_check().await, "OK");
    let _app = router(state());
}

#[tokio::test]
async fn validate_reports_outcome() {
    let request = DensityRequest::new("(2*x+3*y+2)/28", (0.0, 2.0), (0.0, 2.0));
    let Json(outcome) = validate_density(State(state()), Json(request)).await.unwrap();
    assert!(outcome.is_valid);

    let request = DensityRequest::new("x*z", (0.0, 1.0), (0.0, 1.0));
    let Json(outcome) = validate_density(State(state()), Json(request)).await.unwrap();
    assert!(!outcome.is_valid);
    assert_eq!(outcome.errors[0], "Disallowed symbols: ['z']");
}

#[tokio::test]
async fn reversed_bounds_are_unprocessable() {
    let request = DensityRequest::new("4*x*y", (0.9, 0.1), (0.1, 0.9));
    let err = validate_density(State(state()), Json(request)).await.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn sample_returns_requested_count() {
    let mut request = SampleRequest::new(DensityRequest::new("4*x*y", (0.1, 0.9), (0.1, 0.9)));
    request.n_samples = Some(400);
    request.burn_in = Some(100);
    request.seed = Some(12);

    let Json(response) = sample_density(State(state()), Json(request)).await.unwrap();
    assert!(response.success);
    assert_eq!(response.seed, Some(12));
    let samples = response.samples.unwrap();
    assert_eq!(samples.x.len(), 400);
    assert_eq!(samples.y.len(), 400);
    assert!(samples.x.iter().all(|x| (0.1..=0.9).contains(x)));
    assert_eq!(response.statistics.unwrap().total_samples, 400);
    assert!(response.execution_time.is_some());

    let plot = response.plot_data.unwrap();
    assert_eq!(plot["histogram_3d"]["z"].as_array().unwrap().len(), 20);
    assert_eq!(plot["scatter_2d"]["x"].as_array().unwrap().len(), 400);
}

#[tokio::test]
async fn sample_defaults_match_configuration() {
    let request = SampleRequest::new(DensityRequest::new("4*x*(1-y)", (0.1, 0.9), (0.1, 0.9)));
    let Json(response) = sample_density(State(state()), Json(request)).await.unwrap();
    assert!(response.success);
    assert_eq!(response.samples.unwrap().x.len(), 1000);
}

#[tokio::test]
async fn invalid_density_is_not_sampled() {
    let request = SampleRequest::new(DensityRequest::new("x - y", (0.0, 1.0), (0.0, 1.0)));
    let Json(response) = sample_density(State(state()), Json(request)).await.unwrap();
    assert!(!response.success);
    assert!(!response.validation.is_valid);
    assert!(response.samples.is_none());
    assert!(response.statistics.is_none());

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("samples").is_none());
}

#[tokio::test]
async fn oversized_request_is_unprocessable() {
    let mut request = SampleRequest::new(DensityRequest::new("4*x*y", (0.1, 0.9), (0.1, 0.9)));
    request.n_samples = Some(1_000_000);
    let err = sample_density(State(state()), Json(request)).await.unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn examples_catalogue() {
    let Json(catalogue) = list_examples().await;
    let names: Vec<_> = catalogue.examples.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Linear Distribution", "Quadratic Distribution", "Mixed Distribution"]
    );
    assert_eq!(catalogue.examples[1].expression, "4*x*y");
}
