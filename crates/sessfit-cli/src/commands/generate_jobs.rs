use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sessfit_analyses::job_specs::stock_analysis_specs;
use sessfit_core::config::PipelineConfig;
use sessfit_core::job::JobDescriptor;

#[derive(Args)]
pub struct GenerateJobs {
    /// Session input files the jobs will reference
    #[arg(long, num_args = 1.., required = true)]
    pub sessions: Vec<String>,

    /// Directory the job files are written into (defaults to the data root)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl GenerateJobs {
    pub async fn execute(self) -> Result<()> {
        let out = self
            .out
            .unwrap_or_else(|| PipelineConfig::default().data_root);
        let specs = stock_analysis_specs();

        let mut written = 0usize;
        for session in &self.sessions {
            for spec in &specs {
                let job = JobDescriptor::new(session.clone(), spec.clone());
                let path = job.write_to_dir(&out).await?;
                println!("  {}", path.display());
                written += 1;
            }
        }
        println!("✓ Wrote {written} job file(s) to {}", out.display());
        Ok(())
    }
}
