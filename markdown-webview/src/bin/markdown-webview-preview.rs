use markdown_webview::{BridgeError, HeadlessRenderer, MarkdownWebViewBuilder, ViewConfig};
use std::env;
use std::fs;
use std::process;
use std::sync::{Arc, Mutex};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: markdown-webview-preview <file.md>...");
        eprintln!();
        eprintln!("Renders each file the way the embedded view would and prints");
        eprintln!("the reported content height followed by the rendered HTML.");
        eprintln!("Set MARKDOWN_WEBVIEW_CONFIG to a JSON file to change view options.");
        process::exit(1);
    }

    let config = match ViewConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            process::exit(1);
        }
    };

    let mut exit_code = 0;
    for file_path in &args[1..] {
        match preview_file(file_path, &config) {
            Ok(preview) => {
                println!("== {} (height {})", file_path, preview.height);
                print!("{}", preview.html);
            }
            Err(e) => {
                eprintln!("✗ {}: {}", file_path, e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

struct Preview {
    height: f64,
    html: String,
}

fn preview_file(path: &str, config: &ViewConfig) -> Result<Preview, BridgeError> {
    let markdown = fs::read_to_string(path).map_err(|e| BridgeError::AssetUnreadable {
        name: path.to_string(),
        reason: e.to_string(),
    })?;

    let rendered = Arc::new(Mutex::new(String::new()));
    let sink = rendered.clone();

    let (renderer, mut events) = HeadlessRenderer::new();
    let mut view = MarkdownWebViewBuilder::new()
        .config(config.clone())
        .on_rendered(move |html| {
            if let Ok(mut out) = sink.lock() {
                *out = html.to_string();
            }
        })
        .build(renderer);

    view.set_content(&markdown);
    // replies are queued synchronously while pumping, so one pass drains them too
    view.pump(&mut events);

    if view.is_detached() {
        return Err(BridgeError::Renderer("page bootstrap failed".to_string()));
    }

    let html = rendered
        .lock()
        .map(|html| html.clone())
        .unwrap_or_default();
    Ok(Preview {
        height: view.content_height(),
        html,
    })
}
