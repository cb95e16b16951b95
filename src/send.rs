use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use upbox::config::Config;
use upbox::humanize::format_bytes;
use upbox::transport::HttpConfig;
use upbox::{
    EventHub, EventKind, HttpTransporter, PathPicker, UploadEvent, UploadOrchestrator,
    UploadOutcome, UrlParams, UserData,
};

use crate::cli::SendArgs;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(args: SendArgs, config_path: Option<PathBuf>) -> Result<(), AnyError> {
    let mut config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let transporter = HttpTransporter::new(HttpConfig::from(&config.transport))?;
    let hub = console_hooks(args.json);
    let orchestrator = UploadOrchestrator::new(config.upload, hub, Arc::new(transporter));

    let params = match (args.url, args.param.is_empty()) {
        (Some(url), _) => Some(UrlParams::Replace(url)),
        (None, false) => Some(UrlParams::Query(args.param)),
        (None, true) => None,
    };
    let user_data: UserData = args.field.into_iter().collect();
    let picker = PathPicker::new(args.files);

    let outcome = orchestrator.choose_files(&picker, params, user_data).await?;
    info!(metrics = ?orchestrator.metrics().snapshot(), "Upload finished");

    match outcome {
        Some(UploadOutcome::Completed(_)) => Ok(()),
        Some(UploadOutcome::NotReady(reason)) => {
            Err(format!("upload not started: {:?}", reason).into())
        }
        Some(UploadOutcome::Vetoed) => Err("upload aborted".into()),
        Some(UploadOutcome::Rejected(err)) => Err(err.into()),
        Some(UploadOutcome::Failed(err)) => Err(err.into()),
        None => Err("no files selected".into()),
    }
}

fn apply_overrides(config: &mut Config, args: &SendArgs) {
    if let Some(endpoint) = &args.endpoint {
        config.upload.endpoint = endpoint.clone();
    }
    if let Some(max_files) = args.max_files {
        config.upload.max_files = max_files;
    }
    if let Some(max_bytes) = args.max_bytes {
        config.upload.max_bytes = max_bytes;
    }
    if !args.accept.is_empty() {
        config.upload.accept = args.accept.clone();
    }
}

/// Hooks that print lifecycle events to the terminal
fn console_hooks(as_json: bool) -> EventHub {
    let mut hub = EventHub::empty();

    hub.set(EventKind::Start, move |event: &UploadEvent<'_>| {
        if let UploadEvent::Start { files, .. } = event {
            if as_json {
                let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
                println!("{}", json!({ "event": "start", "files": names }));
            } else {
                println!(
                    "Uploading {} file(s), {}",
                    files.len(),
                    format_bytes(files.total_bytes())
                );
            }
        }
    });

    hub.set(EventKind::Progress, move |event: &UploadEvent<'_>| {
        if let UploadEvent::Progress { report, .. } = event {
            if as_json {
                println!("{}", json!({ "event": "progress", "report": report }));
            } else {
                println!(
                    "{:>4}  {} of {}  {}  {}",
                    report.percent,
                    report.bytes_sent_human,
                    report.bytes_total_human,
                    report.rate_human,
                    if report.eta_human.is_empty() {
                        String::new()
                    } else {
                        format!("{} remaining", report.eta_human)
                    }
                );
            }
        }
    });

    hub.set(EventKind::Complete, move |event: &UploadEvent<'_>| {
        if let UploadEvent::Complete { response, .. } = event {
            if as_json {
                println!("{}", json!({ "event": "complete", "response": response }));
            } else {
                println!("Done: HTTP {} {}", response.code, response.status_line);
                if !response.body.is_empty() {
                    println!("{}", response.body);
                }
            }
        }
    });

    hub.set(EventKind::Error, move |event: &UploadEvent<'_>| {
        if let UploadEvent::Error { error, .. } = event {
            if as_json {
                println!(
                    "{}",
                    json!({ "event": "error", "kind": error.kind(), "message": error.to_string() })
                );
            } else {
                eprintln!("Upload error: {}", error);
            }
        }
    });

    hub
}
