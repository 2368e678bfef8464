use std::path::PathBuf;

use super::Fs;

/// Utility fns for making common paths in the output directory.
impl Fs {
    /// $OUTPUT/pbs_scripts
    pub fn script_dir(&self) -> PathBuf {
        self.output_prefix.join("pbs_scripts")
    }

    /// $OUTPUT/pbs_scripts/job_name.pbs
    pub fn script_path(&self, job_name: &str) -> PathBuf {
        self.script_dir().join(format!("{job_name}.pbs"))
    }

    /// $OUTPUT/stage_dir
    pub fn stage_dir(&self, dir_name: &str) -> PathBuf {
        self.output_prefix.join(dir_name)
    }

    /// $OUTPUT/summary_report.json
    pub fn summary_json(&self) -> PathBuf {
        self.output_prefix.join("summary_report.json")
    }

    /// $OUTPUT/summary_report.txt
    pub fn summary_txt(&self) -> PathBuf {
        self.output_prefix.join("summary_report.txt")
    }
}
