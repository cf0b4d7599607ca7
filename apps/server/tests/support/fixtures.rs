use super::TestApp;
use anyhow::Context as _;
use axum::http::StatusCode;

/// Common test constants
pub mod constants {
    pub const NAMASTE_SYSTEM: &str = "http://terminology.india.gov.in/namaste";
    pub const UNANI_SYSTEM: &str = "http://terminology.india.gov.in/unani";
    pub const ICD11_SYSTEM: &str = "http://id.who.int/icd11/mms";
}

/// Small NAMASTE extract
pub const NAMASTE_CSV: &str = "\
code,display,definition,synonyms
NAM001,Vataja Jvara,Fever due to vata dosha,vata fever;vata jwara
NAM002,Pittaja Jvara,Fever due to pitta dosha,
NAM003,Kaphaja Kasa,Cough due to kapha dosha,
NAM004,Amavata,,rheumatism
";

/// Same table, tab separated
pub const NAMASTE_TSV: &str = "code\tdisplay\nNAM001\tVataja Jvara\nNAM002\tPittaja Jvara\n";

/// One bad row (missing code) and one duplicate code
pub const NAMASTE_CSV_WITH_PROBLEMS: &str = "\
code,display,notes
NAM001,Vataja Jvara,a
,Orphan display,b
NAM002,Pittaja Jvara,c
NAM001,Vataja Jvara (revised),d
";

pub const UNANI_CSV: &str = "code,display\nUNN001,Humma-e-Yaumiya\nUNN002,Sual\n";

/// Ingest [`NAMASTE_CSV`] and return the created CodeSystem
pub async fn seed_namaste(app: &TestApp) -> anyhow::Result<serde_json::Value> {
    let (status, body) = app
        .ingest("NAMASTE", constants::NAMASTE_SYSTEM, NAMASTE_CSV)
        .await
        .context("seed NAMASTE")?;
    assert_eq!(status, StatusCode::CREATED, "seed NAMASTE: {body}");
    Ok(body)
}
