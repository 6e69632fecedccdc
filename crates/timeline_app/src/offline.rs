use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Value};
use timeline_core::{merge, normalize_username, now_millis};
use timeline_engine::{
    import_resume_file, write_export, Background, ExportOptions, ExportSummary,
    FileLastExportStore, FileSettingsStore,
};

use crate::cli::MergeArgs;

const INSPECT_SAMPLE: usize = 5;

/// Merges two files the way a resumed run would: `previous` first, then `new`.
pub fn merge_files(args: &MergeArgs) -> anyhow::Result<ExportSummary> {
    let expected = args.username.as_deref();
    let previous = import_resume_file(&args.previous, expected)?;
    let new = import_resume_file(&args.new, expected)?;

    let username = expected
        .and_then(normalize_username)
        .or(previous.username)
        .or(new.username);
    let outcome = merge(&previous.tweets, &new.tweets, username.as_deref());
    let options = ExportOptions {
        output_dir: args.out.clone(),
        minimal_data: args.minimal,
    };
    Ok(write_export(&outcome, &options, now_millis())?)
}

pub fn inspect_file(path: &Path) -> anyhow::Result<Value> {
    let parsed = import_resume_file(path, None)?;
    let sample: Vec<&str> = parsed
        .tweets
        .iter()
        .take(INSPECT_SAMPLE)
        .map(|item| item.id())
        .collect();
    Ok(json!({
        "username": parsed.username,
        "itemCount": parsed.tweets.len(),
        "meta": parsed.meta,
        "firstIds": sample,
    }))
}

pub fn send_bus_request(state_dir: &Path, raw: &str) -> anyhow::Result<Value> {
    let request: Value = serde_json::from_str(raw).context("bus request is not JSON")?;
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let mut background = Background::new(
        Arc::new(FileSettingsStore::new(state_dir.to_path_buf())),
        Arc::new(FileLastExportStore::new(state_dir.to_path_buf())),
    );
    Ok(runtime.block_on(background.handle_raw(&request)))
}
