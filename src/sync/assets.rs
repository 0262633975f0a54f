// src/sync/assets.rs

//! Bundled dashboard assets.
//!
//! A fixed set of paths compiled into the binary; content type is derived
//! from the file extension. Anything else is a 404. This is deliberately not
//! a general static file server.

/// One embedded asset.
#[derive(Debug, Clone, Copy)]
pub struct Asset {
    pub content_type: &'static str,
    pub body: &'static [u8],
}

/// Resolve a request path to a bundled asset.
pub fn lookup(path: &str) -> Option<Asset> {
    let file: &'static [u8] = match path {
        "/" | "/index.html" => include_bytes!("../../assets/index.html"),
        "/assets/app.css" => include_bytes!("../../assets/app.css"),
        "/assets/app.js" => include_bytes!("../../assets/app.js"),
        "/assets/img/logo.svg" => include_bytes!("../../assets/img/logo.svg"),
        "/assets/img/circle.svg" => include_bytes!("../../assets/img/circle.svg"),
        "/components/project.html" => include_bytes!("../../assets/components/project.html"),
        "/components/settings.html" => include_bytes!("../../assets/components/settings.html"),
        _ => return None,
    };

    Some(Asset {
        content_type: content_type_for(path),
        body: file,
    })
}

/// Map a path to a content type by extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext {
        "css" => "text/css",
        "js" => "application/javascript; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "json" => "application/json",
        _ => "text/html; charset=utf-8",
    }
}
