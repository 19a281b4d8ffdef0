//! HTTP API handlers

pub mod compose;
pub mod face;
pub mod health;
pub mod models;
pub mod recognize;

pub use compose::compose_routes;
pub use face::face_routes;
pub use health::health_routes;
pub use models::model_routes;
pub use recognize::{recognize_routes, ImageRequest, RecognitionResponse};
