use crate::models::FEATURE_NAMES;
use actix_web::{web, HttpResponse, Responder};
use serde_json::{json, Map, Value};

pub const API_TITLE: &str = "Heart Disease Risk Predictor";

const DOCS_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>Heart Disease Risk Predictor - Swagger UI</title>
  <meta charset="utf-8"/>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/docs", web::get().to(docs_page))
        .route("/openapi.json", web::get().to(openapi_json));
}

async fn docs_page() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(DOCS_PAGE)
}

async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(openapi_document())
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
    })
}

/// OpenAPI 3 description of the HTTP surface
pub fn openapi_document() -> Value {
    let mut properties = Map::new();
    for name in FEATURE_NAMES {
        properties.insert(name.to_string(), json!({"type": "number", "title": name}));
    }

    let health = json!({
        "summary": "Health check",
        "responses": {
            "200": {
                "description": "Service and model status",
                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/HealthResponse"}}}
            }
        }
    });

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": API_TITLE,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/": {"get": health.clone()},
            "/health": {"get": health.clone()},
            "/healthz": {"get": health},
            "/predict": {
                "post": {
                    "summary": "Predict heart disease risk",
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/PatientRecord"}}}
                    },
                    "responses": {
                        "200": {
                            "description": "Risk prediction",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/PredictionResult"}}}
                        },
                        "422": error_response("Invalid patient record"),
                        "500": error_response("Prediction failed"),
                        "503": error_response("Model not loaded"),
                    }
                }
            },
            "/reload-model": {
                "post": {
                    "summary": "Reload the latest trained model",
                    "responses": {
                        "200": {
                            "description": "Reload outcome",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ReloadResponse"}}}
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "PatientRecord": {
                    "type": "object",
                    "properties": properties,
                    "required": FEATURE_NAMES,
                },
                "PredictionResult": {
                    "type": "object",
                    "properties": {
                        "risk": {"type": "integer", "enum": [0, 1]},
                        "risk_level": {"type": "string", "enum": ["low", "high"]}
                    },
                    "required": ["risk", "risk_level"]
                },
                "HealthResponse": {
                    "type": "object",
                    "properties": {
                        "message": {"type": "string"},
                        "status": {"type": "string", "enum": ["healthy", "unhealthy"]},
                        "model_loaded": {"type": "boolean"}
                    }
                },
                "ReloadResponse": {
                    "type": "object",
                    "properties": {
                        "message": {"type": "string"},
                        "status": {"type": "string", "enum": ["success", "no_model"]},
                        "previous_model_loaded": {"type": "boolean"},
                        "current_model_loaded": {"type": "boolean"}
                    }
                },
                "ErrorResponse": {
                    "type": "object",
                    "properties": {"detail": {"type": "string"}}
                }
            }
        }
    })
}
