//! `emberchat chat` — Interactive conversation loop.

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use emberchat_backend::OllamaBackend;
use emberchat_config::AppConfig;
use emberchat_core::event::{DomainEvent, EventBus};
use emberchat_core::message::ConversationId;
use emberchat_core::store::ConversationStore;
use emberchat_engine::{ConnectivityMonitor, TurnDraft, TurnError, TurnOrchestrator};
use emberchat_store::{FsImageStore, SqliteStore};

pub async fn run(
    model: Option<String>,
    conversation: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let model = model.unwrap_or_else(|| config.default_model.clone());

    let database_path = config.database_path();
    if let Some(parent) = database_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let store = Arc::new(SqliteStore::new(&database_path.to_string_lossy()).await?);
    let images = Arc::new(FsImageStore::new(config.images_dir())?);

    // Drop image files no message references anymore.
    match store.referenced_image_paths().await {
        Ok(referenced) => match images.sweep_orphans(&referenced) {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "swept orphaned attachment files"),
            Err(e) => warn!(error = %e, "orphan sweep failed"),
        },
        Err(e) => warn!(error = %e, "could not list referenced images, skipping sweep"),
    }

    let backend = Arc::new(OllamaBackend::new(
        &config.backend_url,
        Duration::from_secs(config.generation_timeout_secs),
    ));
    let events = Arc::new(EventBus::default());

    let orchestrator = TurnOrchestrator::new(
        store.clone(),
        images.clone(),
        backend.clone(),
        events.clone(),
    )
    .with_generation_timeout(Duration::from_secs(config.generation_timeout_secs));

    let monitor = ConnectivityMonitor::new(backend.clone(), events.clone())
        .with_interval(Duration::from_secs(config.probe_interval_secs));
    monitor.start();

    // Surface connectivity transitions between prompts.
    let mut event_rx = events.subscribe();
    let _event_task = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            if let DomainEvent::ConnectivityChanged { state, .. } = event.as_ref() {
                eprintln!("  [connectivity: {state:?}]");
            }
        }
    });

    let conversation = match conversation {
        Some(id) => {
            let id = ConversationId(id);
            // Fail early if the id is stale.
            store.list_messages(id).await?;
            id
        }
        None => {
            // Listing failures only lose the hint, never block the session.
            let earlier = store.list_conversations().await.unwrap_or_else(|e| {
                warn!(error = %e, "could not list conversations");
                Vec::new()
            });
            if let Some(latest) = earlier.first() {
                println!(
                    "  ({} earlier conversation(s); resume the last with --conversation {})",
                    earlier.len(),
                    latest.id
                );
            }
            store.create_conversation().await?
        }
    };

    println!();
    println!("  Emberchat — conversation {conversation}");
    println!("  Model: {model}");
    println!("  Backend: {}", config.backend_url);
    println!();
    println!("  Type a message and press Enter.");
    println!("  /attach <path>  stage an image for the next message");
    println!("  /detach         drop the staged image");
    println!("  /quit           exit");
    println!();

    // Replay what came before when resuming.
    for message in store.list_messages(conversation).await? {
        print_transcript_line(message.role.as_str(), &message.content);
    }

    let mut draft = TurnDraft::with_attachment_limit(config.max_attachment_bytes);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt(&draft)?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();

        if line == "/quit" || line == "exit" {
            break;
        }
        if line == "/detach" {
            draft.attachment_mut().clear();
            println!("  (attachment dropped)");
            prompt(&draft)?;
            continue;
        }
        if let Some(path) = line.strip_prefix("/attach ") {
            attach(&mut draft, path.trim()).await;
            prompt(&draft)?;
            continue;
        }
        if line.is_empty() && !draft.attachment().has_staged() {
            prompt(&draft)?;
            continue;
        }

        draft.set_text(line);
        eprint!("  ...");
        match orchestrator.submit(Some(conversation), &mut draft, &model).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                for reply_line in outcome.assistant_text.lines() {
                    println!("  Assistant > {reply_line}");
                }
                if outcome.vision_advisory {
                    println!();
                    println!("  [note: {model} answered without the image — it does not support vision]");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                match &e {
                    TurnError::AttachmentPersist(_) => {
                        eprintln!("  [Error] {e} (attachment still staged, try again)");
                    }
                    _ => eprintln!("  [Error] {e}"),
                }
                println!();
            }
        }

        prompt(&draft)?;
    }

    monitor.shutdown();
    println!();
    println!("  Goodbye!");
    Ok(())
}

fn prompt(draft: &TurnDraft) -> std::io::Result<()> {
    if let Some(staged) = draft.attachment().staged() {
        print!("  You [{}] > ", staged.filename());
    } else {
        print!("  You > ");
    }
    std::io::stdout().flush()
}

async fn attach(draft: &mut TurnDraft, path: &str) {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("  [Error] could not read {path}: {e}");
            return;
        }
    };
    let filename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let media_type = media_type_for(&filename);

    match draft.attachment_mut().stage(bytes, &media_type, &filename) {
        Ok(()) => {
            if let Some(staged) = draft.attachment().staged() {
                match staged.preview().path() {
                    Some(preview) => println!(
                        "  (staged {} — {} bytes, preview at {})",
                        staged.filename(),
                        staged.byte_size(),
                        preview.display()
                    ),
                    None => println!(
                        "  (staged {} — {} bytes)",
                        staged.filename(),
                        staged.byte_size()
                    ),
                }
            }
        }
        Err(e) => eprintln!("  [Error] {e}"),
    }
}

/// Media type from the file extension. Unknown extensions map to a
/// non-image type so staging rejects them with a clear message.
fn media_type_for(filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_ascii_lowercase().to_string_lossy().into_owned())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".into(),
        "png" => "image/png".into(),
        "gif" => "image/gif".into(),
        "webp" => "image/webp".into(),
        "bmp" => "image/bmp".into(),
        _ => "application/octet-stream".into(),
    }
}

fn print_transcript_line(role: &str, content: &str) {
    for line in content.lines() {
        println!("  {role} > {line}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_from_extension() {
        assert_eq!(media_type_for("cat.PNG"), "image/png");
        assert_eq!(media_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(media_type_for("photo.jpg"), "image/jpeg");
        assert_eq!(media_type_for("notes.txt"), "application/octet-stream");
        assert_eq!(media_type_for("no_extension"), "application/octet-stream");
    }
}
