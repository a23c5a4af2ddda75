//! Request correlation and logging middleware.
//!
//! Every request gets a fresh correlation ID. It is available to handlers
//! through [`current_correlation_id`], attached to every log line through a
//! `request` span, and returned to the client in `X-Correlation-ID`.

use actix_web::body::{BodySize, EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, USER_AGENT};
use actix_web::middleware::Next;
use actix_web::{web, Error};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Correlation ID of the request being handled on this task, if any
pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID.try_with(|id| id.clone()).ok()
}

/// Paths treated as health checks, which are only logged when they fail
#[derive(Debug, Clone)]
pub struct HealthCheckFilter {
    paths: Vec<String>,
}

impl HealthCheckFilter {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths = paths
            .into_iter()
            .map(|p| {
                let p: String = p.into();
                match p.trim_end_matches('/') {
                    "" => "/".to_string(),
                    trimmed => trimmed.to_string(),
                }
            })
            .collect();
        Self { paths }
    }

    /// Exact match, or a match on whole leading path segments
    /// (`/health` covers `/health/live` but not `/healthy`)
    pub fn is_health_check(&self, path: &str) -> bool {
        self.paths.iter().any(|p| {
            path == p
                || (p != "/"
                    && path
                        .strip_prefix(p.as_str())
                        .map(|rest| rest.starts_with('/'))
                        .unwrap_or(false))
        })
    }
}

impl Default for HealthCheckFilter {
    fn default() -> Self {
        Self::new(["/", "/health", "/healthz"])
    }
}

fn header_str<'a>(req: &'a ServiceRequest, name: HeaderName, fallback: &'a str) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(fallback)
}

/// Correlation ID, request span and access logging; use with
/// `actix_web::middleware::from_fn`.
///
/// Reads an optional `web::Data<HealthCheckFilter>` from app data to decide
/// which requests are logged quietly.
pub async fn request_logging(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let correlation_id = Uuid::new_v4().to_string();
    let quiet = req
        .app_data::<web::Data<HealthCheckFilter>>()
        .map(|filter| filter.is_health_check(req.path()))
        .unwrap_or(false);

    let span = tracing::info_span!("request", correlation_id = %correlation_id);
    let handled = handle(req, next, correlation_id.clone(), quiet).instrument(span);
    CORRELATION_ID.scope(correlation_id, handled).await
}

async fn handle<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
    correlation_id: String,
    quiet: bool,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let method = req.method().to_string();
    let path = req.path().to_string();
    let started = Instant::now();

    if !quiet {
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        tracing::info!(
            event = "request_start",
            method = %method,
            path = %path,
            client_ip = %client_ip,
            user_agent = header_str(&req, USER_AGENT, "unknown"),
            request_size = header_str(&req, CONTENT_LENGTH, "0"),
            "Request started"
        );
    }

    let http_req = req.request().clone();
    let result = next.call(req).await;
    let process_time_ms = started.elapsed().as_secs_f64() * 1000.0;

    let mut res = match result {
        Ok(res) => {
            let status = res.status().as_u16();
            if quiet {
                if status >= 400 {
                    tracing::warn!(
                        event = "health_check_failed",
                        path = %path,
                        status_code = status,
                        "Health check failed"
                    );
                }
            } else {
                let response_size = match res.response().body().size() {
                    BodySize::Sized(n) => n,
                    _ => 0,
                };
                match res.response().error() {
                    Some(err) if status >= 500 => tracing::error!(
                        event = "request_error",
                        method = %method,
                        path = %path,
                        status_code = status,
                        process_time_ms,
                        error_message = %err,
                        "Request failed"
                    ),
                    _ => tracing::info!(
                        event = "request_complete",
                        method = %method,
                        path = %path,
                        status_code = status,
                        process_time_ms,
                        response_size,
                        "Request completed"
                    ),
                }
            }
            res.map_into_left_body()
        }
        Err(err) => {
            tracing::error!(
                event = if quiet { "health_check_error" } else { "request_error" },
                method = %method,
                path = %path,
                status_code = err.error_response().status().as_u16(),
                process_time_ms,
                error_message = %err,
                "Request failed"
            );
            ServiceResponse::from_err(err, http_req).map_into_right_body()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        res.headers_mut()
            .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::BoxBody;
    use actix_web::middleware::from_fn;
    use actix_web::{App, HttpResponse};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<Value> {
            String::from_utf8_lossy(&self.0.lock())
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn json_subscriber(out: &Captured) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(out.clone())
            .finish()
    }

    fn events<'a>(lines: &'a [Value], name: &str) -> Vec<&'a Value> {
        lines.iter().filter(|l| l["fields"]["event"] == name).collect()
    }

    fn header(res: &ServiceResponse<impl MessageBody>) -> String {
        res.headers()
            .get(CORRELATION_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn failing_service(
        _req: ServiceRequest,
        _next: Next<impl MessageBody>,
    ) -> Result<ServiceResponse<BoxBody>, Error> {
        Err(actix_web::error::ErrorInternalServerError("store exploded"))
    }

    #[test]
    fn test_default_health_paths() {
        let filter = HealthCheckFilter::default();
        assert!(filter.is_health_check("/"));
        assert!(filter.is_health_check("/health"));
        assert!(filter.is_health_check("/healthz"));
        assert!(filter.is_health_check("/health/live"));
        assert!(!filter.is_health_check("/healthy"));
        assert!(!filter.is_health_check("/predict"));
        assert!(!filter.is_health_check("/reload-model"));
    }

    #[test]
    fn test_custom_paths_normalised() {
        let filter = HealthCheckFilter::new(vec!["/status/", "/ping"]);
        assert!(filter.is_health_check("/status"));
        assert!(filter.is_health_check("/status/db"));
        assert!(filter.is_health_check("/ping"));
        assert!(!filter.is_health_check("/"));
    }

    #[tokio::test]
    async fn test_correlation_id_scope() {
        assert!(current_correlation_id().is_none());

        let seen = CORRELATION_ID
            .scope("abc-123".to_string(), async { current_correlation_id() })
            .await;
        assert_eq!(seen.as_deref(), Some("abc-123"));

        assert!(current_correlation_id().is_none());
    }

    #[actix_web::test]
    async fn test_request_events_carry_correlation_id() {
        let out = Captured::default();
        let _default = tracing::subscriber::set_default(json_subscriber(&out));

        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(HealthCheckFilter::default()))
                .wrap(from_fn(request_logging))
                .route(
                    "/work",
                    web::get().to(|| async {
                        tracing::info!("inside handler");
                        HttpResponse::Ok().body("done")
                    }),
                ),
        )
        .await;

        let req = actix_web::test::TestRequest::get().uri("/work").to_request();
        let res = actix_web::test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);
        let id = header(&res);

        let lines = out.lines();
        assert_eq!(events(&lines, "request_start").len(), 1);
        assert_eq!(events(&lines, "request_complete").len(), 1);
        assert_eq!(events(&lines, "request_complete")[0]["fields"]["response_size"], 4);

        let handler_line = lines
            .iter()
            .find(|l| l["fields"]["message"] == "inside handler")
            .unwrap();
        assert_eq!(handler_line["span"]["correlation_id"], id.as_str());
        assert!(lines.iter().all(|l| l["span"]["correlation_id"] == id.as_str()));
    }

    #[actix_web::test]
    async fn test_health_checks_logged_only_on_failure() {
        let out = Captured::default();
        let _default = tracing::subscriber::set_default(json_subscriber(&out));

        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(HealthCheckFilter::default()))
                .wrap(from_fn(request_logging))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .route(
                    "/health",
                    web::get().to(|| async { HttpResponse::ServiceUnavailable().finish() }),
                ),
        )
        .await;

        let req = actix_web::test::TestRequest::get().uri("/").to_request();
        let res = actix_web::test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);
        assert!(out.lines().is_empty());

        let req = actix_web::test::TestRequest::get().uri("/health").to_request();
        let res = actix_web::test::call_service(&app, req).await;
        assert_eq!(res.status(), 503);

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["fields"]["event"], "health_check_failed");
        assert_eq!(lines[0]["fields"]["status_code"], 503);
        assert_eq!(lines[0]["span"]["correlation_id"], header(&res).as_str());
    }

    #[actix_web::test]
    async fn test_inner_service_error_still_gets_correlation_id() {
        let out = Captured::default();
        let _default = tracing::subscriber::set_default(json_subscriber(&out));

        let app = actix_web::test::init_service(
            App::new()
                .wrap(from_fn(failing_service))
                .wrap(from_fn(request_logging))
                .route("/predict", web::post().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = actix_web::test::TestRequest::post().uri("/predict").to_request();
        let res = actix_web::test::call_service(&app, req).await;
        assert_eq!(res.status(), 500);
        let id = header(&res);
        assert!(Uuid::parse_str(&id).is_ok());

        let lines = out.lines();
        let failed = events(&lines, "request_error");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["fields"]["status_code"], 500);
        assert_eq!(failed[0]["span"]["correlation_id"], id.as_str());
    }
}
