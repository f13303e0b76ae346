//! A small application exercising every built-in middleware.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8080/api/hello
//!   curl 'http://localhost:8080/api/user/123?search=engineer'
//!   curl -X POST http://localhost:8080/api/user \
//!        -H 'content-type: application/json' -d '{"name":"A"}'
//!   curl http://localhost:8080/api/job/all
//!   curl http://localhost:8080/api/fail
//!   curl -b 'theme=dark' http://localhost:8080/api/show-cookies
//!   curl -F 'name=ada' -F 'avatar=@face.png;type=image/png' \
//!        http://localhost:8080/api/user/upload

use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use weft::{App, Config, Router, Server, handler, middleware};

#[tokio::main]
async fn main() -> Result<(), weft::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::var("WEFT_CONFIG") {
        Ok(path) => Config::load(path.as_ref())?,
        Err(_) => Config::default().with_env_overrides()?,
    };

    let jobs = Router::new().get("/all", handler::sync(|_, res| {
        res.json(&json!({ "message": "All job list" }))?;
        handler::done()
    }));

    let app = App::with_config(&config)
        .use_middleware(middleware::logger())
        .use_middleware(middleware::cookies())
        .use_middleware(middleware::json())
        .use_middleware(middleware::static_files(&config.public_dir))
        .use_middleware(middleware::templates(&config.templates_dir))
        .use_middleware(middleware::multipart(config.upload.clone()))
        .use_middleware(middleware::cors(config.cors.clone()))
        .mount("/api/job", &jobs)
        .get("/api/hello", handler::sync(|_, res| {
            res.json(&json!({ "message": "Hello, world!" }))?;
            handler::done()
        }))
        .get("/api/fail", handler::sync(|_, _| {
            Err(weft::Error::value(json!({ "message": "This is a test error" })))
        }))
        .get("/api/show-cookies", handler::sync(|req, res| {
            res.json(&json!({ "cookies": req.cookies() }))?;
            handler::done()
        }))
        .get("/api/user/:id", handler::sync(|req, res| {
            res.json(&json!({ "userId": req.param("id"), "q": req.query("search") }))?;
            handler::done()
        }))
        .post("/api/user", handler::sync(|req, res| {
            res.status(201).json(&req.body())?;
            handler::done()
        }))
        .post("/api/user/upload", handler::sync(|req, res| {
            let files: Vec<_> = req
                .files()
                .unwrap_or_default()
                .iter()
                .map(|f| json!({ "field": f.field, "name": f.file_name, "size": f.size }))
                .collect();
            info!(files = files.len(), "upload received");
            res.status(201).json(&json!({ "body": req.body(), "files": files }))?;
            handler::done()
        }))
        .get("/pages/user_page", handler::from_fn(|_, res| Box::pin(async move {
            res.render("user.html", &json!({ "title": "User Page", "name": "John Doe", "age": 30 }))
                .await?;
            handler::done()
        })))
        .use_error_middleware(handler::error_sync(|err, req, res| {
            error!(path = req.path(), error = %err, "request failed");
            res.status(500).json(&json!({ "error": err.message() }))?;
            handler::done()
        }));

    Server::from_config(&config)?.serve(app).await
}
