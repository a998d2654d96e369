//! services/api/src/bin/openapi.rs
//!
//! Dumps the OpenAPI 3.0 document for the REST API to disk so it can be
//! versioned or fed to client generators without a running server.

use api_lib::web::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // An alternative output path may be given as the first argument.
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}
