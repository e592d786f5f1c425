//! Densities known to derive and sample cleanly.

use super::protocol::DensityRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    pub expression: String,
    pub bounds: ExampleBounds,
    pub description: String,
}

impl Example {
    fn new(name: &str, expression: &str, bounds: [f64; 4], description: &str) -> Self {
        let [x_min, x_max, y_min, y_max] = bounds;
        Example {
            name: name.to_string(),
            expression: expression.to_string(),
            bounds: ExampleBounds {
                x_min,
                x_max,
                y_min,
                y_max,
            },
            description: description.to_string(),
        }
    }

    pub fn request(&self) -> DensityRequest {
        DensityRequest::new(
            self.expression.clone(),
            (self.bounds.x_min, self.bounds.x_max),
            (self.bounds.y_min, self.bounds.y_max),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleCatalogue {
    pub examples: Vec<Example>,
}

pub fn examples() -> ExampleCatalogue {
    ExampleCatalogue {
        examples: vec![
            Example::new(
                "Linear Distribution",
                "(2*x + 3*y + 2)/28",
                [0.0, 2.0, 0.0, 2.0],
                "Linear joint density function",
            ),
            Example::new(
                "Quadratic Distribution",
                "4*x*y",
                [0.1, 0.9, 0.1, 0.9],
                "Simple quadratic function",
            ),
            Example::new(
                "Mixed Distribution",
                "4*x*(1-y)",
                [0.1, 0.9, 0.1, 0.9],
                "Linear-quadratic combination",
            ),
        ],
    }
}
