#![allow(dead_code)]

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use serde_json::json;

pub const API_KEY: &str = "test-key";

pub const HARDENED_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <title>Hardened test page for the local analyzer</title>
  <meta name="description" content="A page served with every recommended security header so the scanner and the SEO analyzer have something realistic to read during the integration tests.">
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <h1>Car wash in Oslo</h1>
  <p>We offer car wash and detailing in Oslo for private and company cars.</p>
  <a href="/about">About</a>
</body>
</html>"#;

pub const BARE_PAGE: &str = "<html><body><p>bare</p></body></html>";

async fn hardened() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .append_header(("Content-Security-Policy", "default-src 'self'; frame-ancestors 'none'"))
        .append_header(("X-Content-Type-Options", "nosniff"))
        .append_header(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .append_header(("Permissions-Policy", "geolocation=()"))
        .body(HARDENED_PAGE)
}

async fn bare() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(BARE_PAGE)
}

async fn moved() -> HttpResponse {
    HttpResponse::MovedPermanently()
        .append_header(("Location", "/"))
        .finish()
}

async fn missing() -> HttpResponse {
    HttpResponse::NotFound().body("Not Found")
}

async fn pagespeed() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "lighthouseResult": {
            "categories": {
                "performance": { "score": 0.87 },
                "accessibility": { "score": 0.95 },
                "best-practices": { "score": 1.0 },
                "seo": { "score": 0.9 }
            },
            "audits": {
                "largest-contentful-paint": { "numericValue": 2100.5 },
                "first-contentful-paint": { "numericValue": 900.0 },
                "cumulative-layout-shift": { "numericValue": 0.02 },
                "total-blocking-time": { "numericValue": 150.0 },
                "speed-index": { "numericValue": 1800.0 }
            }
        }
    }))
}

async fn pagespeed_broken() -> HttpResponse {
    HttpResponse::InternalServerError().body("quota exhausted")
}

fn authorized(req: &HttpRequest) -> bool {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", API_KEY))
}

fn completion(content: serde_json::Value) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "id": "chatcmpl-test",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content.to_string() } }
        ],
        "usage": { "prompt_tokens": 1000, "completion_tokens": 500, "total_tokens": 1500 }
    }))
}

/// One canned completion carrying the keys every AI call reads
async fn chat_completions(req: HttpRequest) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().json(json!({ "error": { "message": "bad key" } }));
    }

    let content = json!({
        "summary": "Solid technical base, thin content.",
        "strengths": ["Security headers in place"],
        "improvements": ["Write longer copy"],
        "priorityActions": ["Add HSTS once HTTPS is live"],
        "answers": [
            { "answer": "Try 127.0.0.1 for a quick wash", "recommendedSites": ["127.0.0.1"] },
            { "answer": "Nobody local comes to mind", "recommendedSites": [] }
        ],
        "keywords": [
            { "keyword": "car wash", "searchVolume": 5400, "difficulty": 42, "intent": "commercial" }
        ]
    });

    completion(content)
}

/// Keyword rows with fractional, out-of-range and malformed estimates
async fn sloppy_completions(req: HttpRequest) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().json(json!({ "error": { "message": "bad key" } }));
    }

    completion(json!({
        "keywords": [
            { "keyword": "car wash", "searchVolume": 5400, "difficulty": 42, "intent": "commercial" },
            { "keyword": "detailing", "searchVolume": 880.5, "difficulty": 250 },
            { "keyword": "polish", "searchVolume": "lots" },
            { "searchVolume": 10 }
        ]
    }))
}

/// Starts a mock site plus PageSpeed and chat-completion endpoints on a random port.
///
/// `/` serves the hardened page when `hardened` is set, the bare page otherwise.
pub async fn get_test_server_url(hardened_root: bool) -> String {
    let http_server = HttpServer::new(move || {
        let root = if hardened_root {
            web::get().to(hardened)
        } else {
            web::get().to(bare)
        };
        App::new()
            .route("/", root)
            .route("/hardened", web::get().to(hardened))
            .route("/bare", web::get().to(bare))
            .route("/moved", web::get().to(moved))
            .route("/missing", web::get().to(missing))
            .route("/pagespeed", web::get().to(pagespeed))
            .route("/pagespeed-broken", web::get().to(pagespeed_broken))
            .route("/v1/chat/completions", web::post().to(chat_completions))
            .route("/sloppy/v1/chat/completions", web::post().to(sloppy_completions))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("Failed to bind test server");

    let addr = http_server
        .addrs()
        .first()
        .cloned()
        .expect("No address bound");
    let url = format!("http://{}", addr);

    let app_server = http_server.run();

    tokio::spawn(async move {
        if let Err(e) = app_server.await {
            eprintln!("Test server error: {}", e);
        }
    });

    url
}
