use anyhow::Result;
use clap::Args;

use sessfit_core::config::PipelineConfig;

#[derive(Args)]
pub struct Status {
    /// Job hash to look up
    #[arg(long)]
    pub job_hash: String,
}

impl Status {
    pub async fn execute(self) -> Result<()> {
        let config = PipelineConfig::default();
        let docs = super::build_doc_store(&config).await?;

        let records = docs
            .find_by_job_hash(&config.docdb_collection, &self.job_hash)
            .await?;
        if records.is_empty() {
            println!("No records found for job {}", self.job_hash);
            return Ok(());
        }

        println!("Records for job {}:", self.job_hash);
        println!("{:<10} {:<26} {:<26} {}", "Status", "Started", "Finished", "docDB id");
        println!("{}", "-".repeat(90));
        for record in records {
            println!(
                "{:<10} {:<26} {:<26} {}",
                field(&record, "status"),
                field(&record, "started_at"),
                field(&record, "finished_at"),
                field(&record, "docDB_id"),
            );
        }
        Ok(())
    }
}

fn field(record: &serde_json::Value, key: &str) -> String {
    match record.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}
