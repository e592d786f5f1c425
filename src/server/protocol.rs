use crate::config::SamplerSettings;
use crate::error::{Error, Result};
use crate::gibbs::{Bounds, DensitySpec, SampleStatistics, ValidationOutcome};
use serde::{Deserialize, Serialize};

/// Body of `POST /validate`: an expression and its rectangular support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityRequest {
    pub expression: String,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl DensityRequest {
    pub fn new(expression: impl Into<String>, x: (f64, f64), y: (f64, f64)) -> Self {
        Self {
            expression: expression.into(),
            x_min: x.0,
            x_max: x.1,
            y_min: y.0,
            y_max: y.1,
        }
    }

    /// Reject requests no derivation could make sense of.
    pub fn check(&self, settings: &SamplerSettings) -> Result<()> {
        let length = self.expression.chars().count();
        if length > settings.max_expression_len {
            return Err(Error::InvalidRequest(format!(
                "expression is {} characters long, the limit is {}",
                length, settings.max_expression_len
            )));
        }
        check_axis("x", self.x_min, self.x_max)?;
        check_axis("y", self.y_min, self.y_max)
    }

    pub fn spec(&self) -> DensitySpec {
        DensitySpec::new(
            self.expression.clone(),
            Bounds::new(self.x_min, self.x_max),
            Bounds::new(self.y_min, self.y_max),
        )
    }
}

fn check_axis(axis: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() {
        return Err(Error::InvalidRequest(format!(
            "{} bounds must be finite numbers",
            axis
        )));
    }
    if min >= max {
        return Err(Error::InvalidRequest(format!(
            "{axis}_min must be less than {axis}_max, got {min} >= {max}"
        )));
    }
    Ok(())
}

/// Body of `POST /sample`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    #[serde(flatten)]
    pub density: DensityRequest,
    #[serde(default)]
    pub x_initial: Option<f64>,
    #[serde(default)]
    pub y_initial: Option<f64>,
    #[serde(default)]
    pub n_samples: Option<usize>,
    #[serde(default)]
    pub burn_in: Option<usize>,
    /// Makes the run reproducible when present.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SampleRequest {
    pub fn new(density: DensityRequest) -> Self {
        Self {
            density,
            x_initial: None,
            y_initial: None,
            n_samples: None,
            burn_in: None,
            seed: None,
        }
    }

    pub fn n_samples(&self, settings: &SamplerSettings) -> usize {
        self.n_samples.unwrap_or(settings.default_n_samples)
    }

    pub fn burn_in(&self, settings: &SamplerSettings) -> usize {
        self.burn_in.unwrap_or(settings.default_burn_in)
    }

    /// Starting point, defaulting to the centre of the support.
    pub fn start(&self) -> (f64, f64) {
        let spec = self.density.spec();
        (
            self.x_initial.unwrap_or_else(|| spec.x_bounds.midpoint()),
            self.y_initial.unwrap_or_else(|| spec.y_bounds.midpoint()),
        )
    }

    pub fn check(&self, settings: &SamplerSettings) -> Result<()> {
        self.density.check(settings)?;
        let n_samples = self.n_samples(settings);
        if n_samples == 0 {
            return Err(Error::InvalidRequest(
                "n_samples must be at least 1".to_string(),
            ));
        }
        let total = n_samples.saturating_add(self.burn_in(settings));
        if total > settings.max_iterations {
            return Err(Error::InvalidRequest(format!(
                "n_samples + burn_in = {} exceeds the limit of {}",
                total, settings.max_iterations
            )));
        }
        for (name, value) in [("x_initial", self.x_initial), ("y_initial", self.y_initial)] {
            if value.map_or(false, |v| !v.is_finite()) {
                return Err(Error::InvalidRequest(format!(
                    "{} must be a finite number",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Samples {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Body returned by `POST /sample`. Everything but `success` and
/// `validation` is omitted when sampling did not happen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleResponse {
    pub success: bool,
    pub validation: ValidationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Samples>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<SampleStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SampleResponse {
    /// The density failed validation; nothing was sampled.
    pub fn rejected(validation: ValidationOutcome) -> Self {
        Self {
            success: false,
            validation,
            samples: None,
            statistics: None,
            execution_time: None,
            plot_data: None,
            seed: None,
        }
    }

    /// Sampling failed after validation passed.
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::rejected(ValidationOutcome::failure(format!(
            "Error during sampling: {}",
            message
        )))
    }
}

/// Error body for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request() -> SampleRequest {
        SampleRequest::new(DensityRequest::new("4*x*y", (0.1, 0.9), (0.1, 0.9)))
    }

    #[test]
    fn test_sample_request_defaults() {
        let parsed: SampleRequest = serde_json::from_value(serde_json::json!({
            "expression": "4*x*y",
            "x_min": 0.1, "x_max": 0.9, "y_min": 0.1, "y_max": 0.9
        }))
        .unwrap();
        assert_eq!(parsed, request());
        let settings = SamplerSettings::default();
        assert_eq!(parsed.n_samples(&settings), 1000);
        assert_eq!(parsed.burn_in(&settings), 500);
        assert_eq!(parsed.start(), (0.5, 0.5));
    }

    #[test]
    fn test_request_checks() {
        let settings = SamplerSettings::default();
        assert!(request().check(&settings).is_ok());

        let mut reversed = request();
        reversed.density.x_min = 2.0;
        assert!(reversed.check(&settings).unwrap_err().is_client_error());

        let mut empty = request();
        empty.n_samples = Some(0);
        assert!(empty.check(&settings).is_err());

        let mut huge = request();
        huge.n_samples = Some(settings.max_iterations);
        huge.burn_in = Some(1);
        assert!(huge.check(&settings).is_err());

        let mut long = request();
        long.density.expression = "x+".repeat(300) + "y";
        assert!(long.check(&settings).is_err());

        let mut nan = request();
        nan.density.y_max = f64::NAN;
        assert!(nan.check(&settings).is_err());
    }

    #[test]
    fn test_failed_response_omits_payload() {
        let json = serde_json::to_value(SampleResponse::failed("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["validation"]["errors"][0], "Error during sampling: boom");
        assert!(json.get("samples").is_none());
        assert!(json.get("plot_data").is_none());
    }
}
