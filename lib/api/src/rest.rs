use crate::error::{ApiError, ApiResult};
use crate::settings::ServerSettings;
use actix_cors::Cors;
use actix_web::dev::Service;
use actix_web::{web, App, HttpResponse, HttpServer};
use cinesim_core::{IndexKind, RecommendationEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Serialize)]
pub struct RecommendationRequest {
    pub title: String,
    pub num_recommendations: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct MovieRecommendation {
    pub title: String,
    /// Similarity distance, lower is more similar
    pub distance: f32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RecommendationResponse {
    pub query: String,
    pub recommendations: Vec<MovieRecommendation>,
    pub count: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
    limit: Option<usize>,
}

pub struct RestApi;

impl RestApi {
    /// Bind and serve until the server stops. The engine must already be
    /// loaded; a bind failure is returned to the caller.
    pub async fn start(
        engine: Arc<RecommendationEngine>,
        settings: ServerSettings,
    ) -> std::io::Result<()> {
        let (host, port) = (settings.host.clone(), settings.port);
        info!("Binding HTTP API on {}:{}", host, port);

        let server = HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .wrap_fn(|req, srv| {
                    let started = Instant::now();
                    let method = req.method().to_string();
                    let path = req.path().to_string();
                    let fut = srv.call(req);
                    async move {
                        let res = fut.await;
                        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                        match &res {
                            Ok(response) => info!(
                                "{} {} | {} | {:.2}ms",
                                method,
                                path,
                                response.status().as_u16(),
                                elapsed_ms
                            ),
                            Err(e) => warn!("{} {} | error: {} | {:.2}ms", method, path, e, elapsed_ms),
                        }
                        res
                    }
                })
                .app_data(web::Data::new(engine.clone()))
                .app_data(web::Data::new(settings.clone()))
                .configure(routes)
        })
        .bind((host.as_str(), port))?;

        info!("Ready to serve requests on http://{}:{}/", host, port);
        server.run().await
    }
}

/// Route table; expects `Arc<RecommendationEngine>` and `ServerSettings` as app data
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health_check))
        .route("/info", web::get().to(info_page))
        .route("/recommend", web::post().to(recommend_movies))
        .route("/search", web::get().to(search_movies))
        .route("/stats", web::get().to(get_stats));
}

async fn health_check(
    engine: web::Data<Arc<RecommendationEngine>>,
    settings: web::Data<ServerSettings>,
) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        message: format!(
            "Movie Recommender is running with {} movies.",
            engine.total_items()
        ),
        version: settings.api_version.clone(),
    })
}

async fn info_page(settings: web::Data<ServerSettings>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Hello from cinesim!",
        "title": settings.api_title,
        "description": settings.api_description,
        "version": settings.api_version,
        "health": "/"
    }))
}

async fn recommend_movies(
    engine: web::Data<Arc<RecommendationEngine>>,
    settings: web::Data<ServerSettings>,
    req: web::Json<RecommendationRequest>,
) -> ApiResult<HttpResponse> {
    let req = req.into_inner();
    if req.title.trim().is_empty() {
        return Err(ApiError::InvalidInput("title must not be empty".to_string()));
    }
    let k = req
        .num_recommendations
        .unwrap_or(settings.default_recommendations);
    check_bounds("num_recommendations", k, &settings)?;

    let results = engine
        .recommend(&req.title, k)?
        .ok_or_else(|| ApiError::MovieNotFound(req.title.clone()))?;

    let recommendations: Vec<MovieRecommendation> = results
        .into_iter()
        .map(|rec| MovieRecommendation {
            title: rec.title,
            distance: rec.distance,
        })
        .collect();

    Ok(HttpResponse::Ok().json(RecommendationResponse {
        query: req.title,
        count: recommendations.len(),
        recommendations,
    }))
}

async fn search_movies(
    engine: web::Data<Arc<RecommendationEngine>>,
    settings: web::Data<ServerSettings>,
    query: web::Query<SearchQuery>,
) -> ApiResult<HttpResponse> {
    // Blank-but-present queries match every title once normalized
    if query.query.is_empty() {
        return Err(ApiError::InvalidInput("query must not be empty".to_string()));
    }
    let limit = query.limit.unwrap_or(settings.default_recommendations);
    check_bounds("limit", limit, &settings)?;

    Ok(HttpResponse::Ok().json(engine.search(&query.query, limit)))
}

async fn get_stats(engine: web::Data<Arc<RecommendationEngine>>) -> HttpResponse {
    let stats = engine.stats();
    let index_type = match stats.index_kind {
        IndexKind::Hnsw => "HNSW ANN",
        IndexKind::Exact => "Exact brute-force",
    };
    HttpResponse::Ok().json(serde_json::json!({
        "total_movies": stats.total_items,
        "total_titles": stats.total_titles,
        "dimension": stats.dimension,
        "weights": {
            "sentence": stats.weights.embedding,
            "genre": stats.weights.categorical,
            "numeric": stats.weights.numeric,
        },
        "index_type": index_type
    }))
}

fn check_bounds(field: &str, value: usize, settings: &ServerSettings) -> ApiResult<()> {
    if value < settings.min_recommendations || value > settings.max_recommendations {
        return Err(ApiError::InvalidInput(format!(
            "{} must be between {} and {}, got {}",
            field, settings.min_recommendations, settings.max_recommendations, value
        )));
    }
    Ok(())
}
