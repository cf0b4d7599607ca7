use anyhow::{bail, Context as _};
use medisync_terminology::{
    ingest as ingest_table, parse_delimiter, BundleProcessor, DiscardSink, EntryValidator,
    IndexHandle, IngestRequest, IngestionReport, ProcessError, SearchIndex, ValidationMode,
};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// `ingest`: CodeSystem JSON with the embedded outcome
pub fn ingest(
    file: &Path,
    name: &str,
    url: &str,
    delimiter: Option<&str>,
) -> anyhow::Result<String> {
    let report = load(file, name, url, delimiter)?;
    tracing::info!(
        count = report.code_system.count(),
        rejected = report.errors.len(),
        "ingested {}",
        file.display()
    );
    pretty(&report.to_fhir().to_value()?)
}

/// `search`: ValueSet expansion over a single file
pub fn search(
    file: &Path,
    url: &str,
    query: &str,
    limit: usize,
    offset: usize,
    delimiter: Option<&str>,
) -> anyhow::Result<String> {
    let report = load(file, &system_name(file), url, delimiter)?;
    let index = SearchIndex::build([Arc::new(report.code_system)]);
    let page = index.search(query, limit, offset);
    pretty(&serde_json::to_value(page.to_value_set(query, limit))?)
}

/// `validate`: batch-response for a bundle, nothing persisted
pub async fn validate(
    bundle: &Path,
    codes: &[std::path::PathBuf],
    urls: &[String],
    strict: bool,
) -> anyhow::Result<String> {
    if codes.len() != urls.len() {
        bail!(
            "got {} --codes files but {} --url values; pass one url per file",
            codes.len(),
            urls.len()
        );
    }

    let mut snapshots = Vec::with_capacity(codes.len());
    for (file, url) in codes.iter().zip(urls) {
        let report = load(file, &system_name(file), url, None)?;
        snapshots.push(Arc::new(report.code_system));
    }
    let index = Arc::new(IndexHandle::new());
    index.rebuild(snapshots);

    let mode = if strict {
        ValidationMode::Strict
    } else {
        ValidationMode::Advisory
    };
    let processor = BundleProcessor::new(EntryValidator::new(index).with_mode(mode));

    let reader = BufReader::new(
        File::open(bundle).with_context(|| format!("open {}", bundle.display()))?,
    );
    let payload: Value = serde_json::from_reader(reader)
        .with_context(|| format!("{} is not valid JSON", bundle.display()))?;

    match processor.process(&payload, &DiscardSink).await {
        Ok(processed) => {
            tracing::info!(
                total = processed.summary.total,
                accepted = processed.summary.accepted,
                rejected = processed.summary.rejected,
                "bundle validated"
            );
            pretty(&processed.to_fhir().to_value()?)
        }
        Err(ProcessError::Malformed(malformed)) => pretty(&malformed.to_outcome().to_value()),
        Err(e) => Err(e.into()),
    }
}

fn load(
    file: &Path,
    name: &str,
    url: &str,
    delimiter: Option<&str>,
) -> anyhow::Result<IngestionReport> {
    let delimiter = match delimiter {
        Some(raw) => {
            parse_delimiter(raw).with_context(|| format!("unsupported delimiter '{raw}'"))?
        }
        None if is_tsv(file) => b'\t',
        None => b',',
    };
    let reader = File::open(file).with_context(|| format!("open {}", file.display()))?;
    let request = IngestRequest::new(name, url).with_delimiter(delimiter);
    ingest_table(BufReader::new(reader), &request, 0)
        .with_context(|| format!("ingest {}", file.display()))
}

fn system_name(file: &Path) -> String {
    file.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("codes")
        .to_string()
}

fn is_tsv(file: &Path) -> bool {
    file.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"))
}

fn pretty(value: &Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
