use loanline_api::router::ApiDoc;
use utoipa::OpenApi;

/// Writes the OpenAPI specification to the given path (or `openapi.json`).
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, spec_json)?;
    println!("Wrote OpenAPI specification to {}", path);
    Ok(())
}
